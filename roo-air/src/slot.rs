//! `Slot` (§3): the unit of value storage the AIR generator, interference-graph builder, and
//! register allocator all operate over.
//!
//! Grounded in the original's `Slot` class hierarchy (`VariableSlot`/`ParameterSlot`/
//! `MemberSlot`/`TemporarySlot`/`ReturnResultSlot`/`ConstantSlot<T>`): rather than a base class
//! with per-kind subclasses and virtual `Use`/`ChangeValue` methods, `SlotKind` is a plain enum
//! and the "use"/"define" operations below live on `Slot` itself.

use crate::live_range::LiveRange;
use roo_entity::{entity_ref, PrimaryMap};
use roo_ir::{Literal, ScopeId, Storage};
use smallvec::SmallVec;

entity_ref!(
    /// Index of a `Slot` within a `CodeThing`'s slot set.
    pub struct SlotId
);

/// What a slot refers to. Constants never interfere and are never colored (§3 "Constants never
/// interfere"); every other kind participates in live-range tracking.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotKind {
    Param(usize),
    Local { scope: ScopeId, index: usize },
    /// A member of a parent variable slot, e.g. `p.x`; `member_index` indexes the parent
    /// variable's `VariableDef::members` (populated during IR completion, §4.2 step e).
    Member { parent: SlotId, member_index: usize },
    /// A compiler-synthesized intermediate value, tagged in allocation order.
    Temporary(u32),
    /// The result of a `Call`, tagged in allocation order; pre-colored to the callee's
    /// return-value color (§4.3 "Call").
    ReturnResult(u32),
    Constant(Literal),
    StringConstant(roo_ir::StringId),
}

#[derive(Debug, Clone)]
pub struct Slot {
    pub kind: SlotKind,
    pub storage: Storage,
    /// `None` until colored; constants are never colored.
    pub color: Option<u32>,
    /// Almost every slot in a small function interferes with only a handful of others, so this
    /// stays inline instead of heap-allocating a `Vec` per slot.
    pub interferences: SmallVec<[SlotId; 8]>,
    pub live_ranges: Vec<LiveRange>,
}

impl Slot {
    pub fn new(kind: SlotKind, storage: Storage) -> Self {
        Self {
            kind,
            storage,
            color: None,
            interferences: SmallVec::new(),
            live_ranges: Vec::new(),
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, SlotKind::Constant(_) | SlotKind::StringConstant(_))
    }

    /// Only register-storage, non-constant slots take part in interference and coloring;
    /// stack-resident locals already have a fixed frame offset from IR completion and
    /// parameters are pre-colored by the AIR generator before coloring ever runs (§4.4).
    pub fn needs_coloring(&self) -> bool {
        !self.is_constant() && matches!(self.storage, Storage::Register) && self.color.is_none()
    }

    /// Record a use of this slot at `instruction_index`: extends the most recent open live
    /// range's last-use. Raises (via the caller, which owns the error state) `UsedBeforeInit` if
    /// no range is open yet.
    pub fn mark_used(&mut self, instruction_index: u32) -> bool {
        if self.is_constant() {
            return true;
        }
        match self.live_ranges.last_mut() {
            Some(range) => {
                range.last_use = Some(instruction_index);
                true
            }
            None => false,
        }
    }

    /// Record a definition of this slot at `instruction_index`: opens a new live range.
    pub fn mark_defined(&mut self, instruction_index: u32) {
        if self.is_constant() {
            return;
        }
        self.live_ranges.push(LiveRange::starting_at(instruction_index));
    }
}

pub type SlotSet = PrimaryMap<SlotId, Slot>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_never_interfere_or_get_colored() {
        let slot = Slot::new(SlotKind::Constant(Literal::Int(1)), Storage::Register);
        assert!(!slot.needs_coloring());
    }

    #[test]
    fn use_before_def_reports_failure() {
        let mut slot = Slot::new(SlotKind::Temporary(0), Storage::Register);
        assert!(!slot.mark_used(0));
        slot.mark_defined(0);
        assert!(slot.mark_used(1));
    }
}
