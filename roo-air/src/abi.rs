//! Target ABI parameters the AIR generator and register allocator need but shouldn't have to know
//! the concrete ISA to get (§4.3 "canonical integer-parameter color", §4.4 pre-coloring).
//!
//! Grounded in the original's `codegen_target` construction (`x64.cpp`'s `TargetMachine_x64`
//! constructor): a target publishes its general-purpose "colors" (here, plain `u32`s handed out
//! by `roo-isa`, not yet register names), the subset and order used for integer call parameters,
//! and the color reserved for a function's return value.

/// Colors are opaque as far as `roo-air` is concerned; `roo-isa` is the only crate that knows
/// which physical register a given color number names.
#[derive(Debug, Clone)]
pub struct TargetAbi {
    /// Every color available to the greedy colorer, in the target's canonical order (§4.4:
    /// "restricted to `[0, numGeneralRegisters)`" means restricted to *this* set, not to small
    /// numeric values — the original's x64 target reserves two registers, RSP and RBP, for the
    /// stack/frame pointers and excludes them here even though their encodings fall in the
    /// middle of the full register range).
    pub general_registers: Vec<u32>,
    /// The color assigned to the k-th integer-class call argument (§4.3 "Call").
    pub int_param_colors: Vec<u32>,
    /// The color a function's return value is pre-colored to (§4.3 "Call").
    pub return_color: u32,
}

impl TargetAbi {
    pub fn num_general_registers(&self) -> usize {
        self.general_registers.len()
    }
}
