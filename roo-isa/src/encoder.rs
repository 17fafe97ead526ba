//! Instruction encoder (§4.5): ModR/M, SIB, and the literal opcode bytes for every x86-64
//! instruction this backend emits, ported straight from the original's `x64/emitter.cpp`.
//!
//! ```text
//! ModR/M: | mod(2) | reg(3) | r/m(3) |     mod=0b11 is register-direct addressing.
//! SIB:    | scale(2) | index(3) | base(3) |     scale is encoded as log2(scale).
//! ```

use crate::registers::Reg;
use roo_diagnostics::{ErrorKind, ErrorState, Location};
use roo_elf::ElfThing;

fn register_modrm(thing: &mut ElfThing, reg: Reg, rm: Reg) {
    let byte = 0b11_000_000 | (reg.mod_rm_offset() << 3) | rm.mod_rm_offset();
    thing.push_u8(byte);
}

fn extension_modrm(thing: &mut ElfThing, extension: u8, rm: Reg) {
    let byte = 0b11_000_000 | (extension << 3) | rm.mod_rm_offset();
    thing.push_u8(byte);
}

/// `reg` is the ModR/M `reg` field; `base`/`displacement` address `[base + displacement]`.
fn indirect_modrm(thing: &mut ElfThing, reg: Reg, base: Reg, displacement: u32) {
    let mut byte = reg.mod_rm_offset() << 3;
    byte |= base.mod_rm_offset();
    // a one-byte displacement suffices below 0xfe (the original's `(2 << 7) - 1`).
    if displacement >= 0xfe {
        byte |= 0b10_000_000;
    } else {
        byte |= 0b01_000_000;
    }
    thing.push_u8(byte);

    if displacement >= 0xfe {
        thing.push_u32_le(displacement);
    } else {
        thing.push_u8(displacement as u8);
    }
}

pub fn cmp_reg_reg(thing: &mut ElfThing, a: Reg, b: Reg) {
    thing.push_u8(0x39);
    register_modrm(thing, a, b);
}

pub fn cmp_rax_imm32(thing: &mut ElfThing, imm: u32) {
    thing.push_u8(0x3d);
    thing.push_u32_le(imm);
}

pub fn push_reg(thing: &mut ElfThing, r: Reg) {
    thing.push_u8(0x50 + r.mod_rm_offset());
}

pub fn pop_reg(thing: &mut ElfThing, r: Reg) {
    thing.push_u8(0x58 + r.mod_rm_offset());
}

pub fn add_reg_reg(thing: &mut ElfThing, dest: Reg, src: Reg) {
    thing.push_u8(0x48);
    thing.push_u8(0x01);
    register_modrm(thing, src, dest);
}

pub fn sub_reg_reg(thing: &mut ElfThing, dest: Reg, src: Reg) {
    thing.push_u8(0x48);
    thing.push_u8(0x29);
    register_modrm(thing, src, dest);
}

pub fn mul_reg_reg(thing: &mut ElfThing, dest: Reg, src: Reg) {
    thing.push_u8(0x48);
    thing.push_u8(0x0f);
    thing.push_u8(0xaf);
    register_modrm(thing, src, dest);
}

/// Signed-integer division on x64 is left unimplemented, matching the original's own
/// `"Division is actually physically impossible on the x64"` — division is rejected here as an
/// internal compiler error rather than silently miscompiled, since nothing upstream currently
/// constructs a `Div` AIR node from source (`roo-ir`'s operator pool has no built-in divide
/// operator to resolve `BinaryOp::Div` through).
pub fn div_reg_reg(_thing: &mut ElfThing, errors: &mut ErrorState) {
    errors.raise(
        Location::unknown(),
        ErrorKind::Ice {
            where_: "encoder::div_reg_reg".to_string(),
            detail: "signed integer division is not implemented for this target".to_string(),
        },
    );
}

pub fn xor_reg_reg(thing: &mut ElfThing, dest: Reg, src: Reg) {
    thing.push_u8(0x48);
    thing.push_u8(0x31);
    register_modrm(thing, src, dest);
}

pub fn add_reg_imm32(thing: &mut ElfThing, result: Reg, imm: u32) {
    thing.push_u8(0x48);
    thing.push_u8(0x81);
    extension_modrm(thing, 0, result);
    thing.push_u32_le(imm);
}

pub fn sub_reg_imm32(thing: &mut ElfThing, result: Reg, imm: u32) {
    thing.push_u8(0x48);
    thing.push_u8(0x81);
    extension_modrm(thing, 5, result);
    thing.push_u32_le(imm);
}

/// Only byte-wide immediates are supported, matching the original's own restriction.
pub fn mul_reg_imm32(thing: &mut ElfThing, result: Reg, imm: u32, errors: &mut ErrorState) {
    if imm >= 256 {
        errors.raise(
            Location::unknown(),
            ErrorKind::Ice {
                where_: "encoder::mul_reg_imm32".to_string(),
                detail: "multiplication is only supported with byte-wide immediates".to_string(),
            },
        );
        return;
    }
    thing.push_u8(0x48);
    thing.push_u8(0x6b);
    register_modrm(thing, result, result);
    thing.push_u8(imm as u8);
}

pub fn div_reg_imm32(_thing: &mut ElfThing, errors: &mut ErrorState) {
    errors.raise(
        Location::unknown(),
        ErrorKind::Ice {
            where_: "encoder::div_reg_imm32".to_string(),
            detail: "signed integer division is not implemented for this target".to_string(),
        },
    );
}

pub fn mov_reg_reg(thing: &mut ElfThing, dest: Reg, src: Reg) {
    thing.push_u8(0x48);
    thing.push_u8(0x89);
    register_modrm(thing, src, dest);
}

pub fn mov_reg_imm32(thing: &mut ElfThing, dest: Reg, imm: u32) {
    thing.push_u8(0xb8 + dest.mod_rm_offset());
    thing.push_u32_le(imm);
}

pub fn mov_reg_imm64(thing: &mut ElfThing, dest: Reg, imm: u64) {
    thing.push_u8(0x48);
    thing.push_u8(0xb8 + dest.mod_rm_offset());
    thing.push_u64_le(imm);
}

pub fn mov_reg_base_disp(thing: &mut ElfThing, dest: Reg, base: Reg, displacement: u32) {
    thing.push_u8(0x48);
    thing.push_u8(0x8b);
    indirect_modrm(thing, dest, base, displacement);
}

pub fn mov_base_disp_reg(thing: &mut ElfThing, base: Reg, displacement: u32, src: Reg) {
    thing.push_u8(0x48);
    thing.push_u8(0x89);
    indirect_modrm(thing, src, base, displacement);
}

pub fn mov_base_disp_imm32(thing: &mut ElfThing, base: Reg, displacement: u32, imm: u32) {
    thing.push_u8(0xc7);
    indirect_modrm(thing, Reg::Rax, base, displacement);
    thing.push_u32_le(imm);
}

pub fn mov_base_disp_imm64(thing: &mut ElfThing, base: Reg, displacement: u32, imm: u64) {
    thing.push_u8(0x48);
    thing.push_u8(0xc7);
    indirect_modrm(thing, Reg::Rax, base, displacement);
    thing.push_u64_le(imm);
}

pub fn inc_reg(thing: &mut ElfThing, r: Reg) {
    thing.push_u8(0xff);
    extension_modrm(thing, 0, r);
}

pub fn dec_reg(thing: &mut ElfThing, r: Reg) {
    thing.push_u8(0xff);
    extension_modrm(thing, 1, r);
}

pub fn not_reg(thing: &mut ElfThing, r: Reg) {
    thing.push_u8(0xf7);
    extension_modrm(thing, 2, r);
}

pub fn neg_reg(thing: &mut ElfThing, r: Reg) {
    thing.push_u8(0xf7);
    extension_modrm(thing, 3, r);
}

/// Emits the call opcode plus a placeholder relocated by the caller.
pub fn call32_placeholder(thing: &mut ElfThing) {
    thing.push_u8(0xe8);
}

pub fn int_imm8(thing: &mut ElfThing, number: u8) {
    thing.push_u8(0xcd);
    thing.push_u8(number);
}

pub fn leave(thing: &mut ElfThing) {
    thing.push_u8(0xc9);
}

pub fn ret(thing: &mut ElfThing) {
    thing.push_u8(0xc3);
}

/// Emits the jump opcode plus a placeholder relocated by the caller; `JMP` is the unconditional
/// form, the rest mirror `roo_air::JumpCond`.
pub fn jmp_placeholder(thing: &mut ElfThing) {
    thing.push_u8(0xe9);
}

/// Opcode byte for each conditional jump, in `JE,JNE,JO,JNO,JS,JNS,JG,JGE,JL,JLE,JPE,JPO` order.
const CONDITIONAL_JUMPS: [u8; 12] = [0x84, 0x85, 0x80, 0x81, 0x88, 0x89, 0x8f, 0x8d, 0x8c, 0x8e, 0x8a, 0x8b];

pub fn jcc_placeholder(thing: &mut ElfThing, cond: roo_air::JumpCond) {
    use roo_air::JumpCond::*;
    let index = match cond {
        Unconditional => {
            jmp_placeholder(thing);
            return;
        }
        IfEqual => 0,
        IfNotEqual => 1,
        IfOverflow => 2,
        IfNotOverflow => 3,
        IfSign => 4,
        IfNotSign => 5,
        IfGreater => 6,
        IfGreaterOrEqual => 7,
        IfLesser => 8,
        IfLesserOrEqual => 9,
        IfParityEven => 10,
        IfParityOdd => 11,
    };
    thing.push_u8(0x0f);
    thing.push_u8(CONDITIONAL_JUMPS[index]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mov_reg_imm32_uses_plus_r_encoding() {
        let mut thing = ElfThing::new("f");
        mov_reg_imm32(&mut thing, Reg::Rdi, 7);
        assert_eq!(thing.bytes[0], 0xb8 + Reg::Rdi.mod_rm_offset());
        assert_eq!(&thing.bytes[1..5], &7u32.to_le_bytes());
    }

    #[test]
    fn add_reg_reg_matches_opcode_and_modrm() {
        let mut thing = ElfThing::new("f");
        add_reg_reg(&mut thing, Reg::Rax, Reg::Rbx);
        assert_eq!(thing.bytes, vec![0x48, 0x01, 0b11_000_000 | (Reg::Rbx.mod_rm_offset() << 3) | Reg::Rax.mod_rm_offset()]);
    }

    #[test]
    fn mul_reg_imm32_rejects_wide_immediates() {
        let mut thing = ElfThing::new("f");
        let mut errors = ErrorState::new();
        mul_reg_imm32(&mut thing, Reg::Rax, 300, &mut errors);
        assert!(errors.has_errored());
    }

    #[test]
    fn push_pop_use_plus_r_encoding() {
        let mut thing = ElfThing::new("f");
        push_reg(&mut thing, Reg::R10);
        pop_reg(&mut thing, Reg::R10);
        assert_eq!(thing.bytes, vec![0x50 + Reg::R10.mod_rm_offset(), 0x58 + Reg::R10.mod_rm_offset()]);
    }
}
