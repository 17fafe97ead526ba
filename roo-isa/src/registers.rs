//! x86-64 general-purpose register set (§4.5), matching the target's `x64.hpp`/`x64.cpp` exactly:
//! declaration order, ModR/M opcode offsets, and which registers are available to the colorer.

use roo_air::TargetAbi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Reg {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rsp,
    Rbp,
    Rsi,
    Rdi,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

pub const NUM_REGISTERS: usize = 16;

impl Reg {
    pub const ALL: [Reg; NUM_REGISTERS] = [
        Reg::Rax,
        Reg::Rbx,
        Reg::Rcx,
        Reg::Rdx,
        Reg::Rsp,
        Reg::Rbp,
        Reg::Rsi,
        Reg::Rdi,
        Reg::R8,
        Reg::R9,
        Reg::R10,
        Reg::R11,
        Reg::R12,
        Reg::R13,
        Reg::R14,
        Reg::R15,
    ];

    /// The color this register is assigned in `roo-air`'s allocator; the enum's own declaration
    /// order, which is not the same as its ModR/M opcode offset below.
    pub fn color(self) -> u32 {
        self as u32
    }

    pub fn from_color(color: u32) -> Self {
        Self::ALL[color as usize]
    }

    /// RSP/RBP are reserved for the stack frame and never handed to the colorer.
    pub fn is_general(self) -> bool {
        !matches!(self, Reg::Rsp | Reg::Rbp)
    }

    /// The register's actual ModR/M/SIB/opcode-offset encoding, distinct from its declaration
    /// order (`x64.cpp`'s `REGISTER(...)` table).
    pub fn mod_rm_offset(self) -> u8 {
        match self {
            Reg::Rax => 0,
            Reg::Rbx => 3,
            Reg::Rcx => 1,
            Reg::Rdx => 2,
            Reg::Rsp => 4,
            Reg::Rbp => 5,
            Reg::Rsi => 6,
            Reg::Rdi => 7,
            Reg::R8 => 8,
            Reg::R9 => 9,
            Reg::R10 => 10,
            Reg::R11 => 11,
            Reg::R12 => 12,
            Reg::R13 => 13,
            Reg::R14 => 14,
            Reg::R15 => 15,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Reg::Rax => "rax",
            Reg::Rbx => "rbx",
            Reg::Rcx => "rcx",
            Reg::Rdx => "rdx",
            Reg::Rsp => "rsp",
            Reg::Rbp => "rbp",
            Reg::Rsi => "rsi",
            Reg::Rdi => "rdi",
            Reg::R8 => "r8",
            Reg::R9 => "r9",
            Reg::R10 => "r10",
            Reg::R11 => "r11",
            Reg::R12 => "r12",
            Reg::R13 => "r13",
            Reg::R14 => "r14",
            Reg::R15 => "r15",
        }
    }
}

/// The registers that must be saved around a call site if live across it (`codeGenerator.cpp`'s
/// `CallInstruction` visitor); `RSP` is excluded since a function is only meant to leave it
/// balanced across a call by construction.
pub const CALLER_SAVED: [Reg; 9] = [
    Reg::Rax,
    Reg::Rcx,
    Reg::Rdx,
    Reg::Rsi,
    Reg::Rdi,
    Reg::R8,
    Reg::R9,
    Reg::R10,
    Reg::R11,
];

/// The calling-convention/register-color parameters `TargetMachine_x64`'s constructor publishes.
pub fn x86_64_abi() -> TargetAbi {
    TargetAbi {
        general_registers: Reg::ALL.iter().copied().filter(|r| r.is_general()).map(Reg::color).collect(),
        int_param_colors: [Reg::Rdi, Reg::Rsi, Reg::Rdx, Reg::Rcx, Reg::R8, Reg::R9]
            .iter()
            .copied()
            .map(Reg::color)
            .collect(),
        return_color: Reg::Rax.color(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_registers_exclude_stack_and_base_pointer() {
        let abi = x86_64_abi();
        assert_eq!(abi.general_registers.len(), 14);
        assert!(!abi.general_registers.contains(&Reg::Rsp.color()));
        assert!(!abi.general_registers.contains(&Reg::Rbp.color()));
    }

    #[test]
    fn mod_rm_offset_matches_target_table() {
        assert_eq!(Reg::Rax.mod_rm_offset(), 0);
        assert_eq!(Reg::Rbx.mod_rm_offset(), 3);
        assert_eq!(Reg::R15.mod_rm_offset(), 15);
    }

    #[test]
    fn int_param_colors_match_system_v_order() {
        let abi = x86_64_abi();
        assert_eq!(
            abi.int_param_colors,
            vec![Reg::Rdi.color(), Reg::Rsi.color(), Reg::Rdx.color(), Reg::Rcx.color(), Reg::R8.color(), Reg::R9.color()]
        );
    }
}
