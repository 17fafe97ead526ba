//! Register allocation by graph coloring (§4.4).
//!
//! Two passes, mirroring the original's split between a target-specific pre-colorer and a
//! generic greedy colorer: parameters, call arguments, and call results are already pre-colored
//! by the AIR generator itself (§4.3's `parameterize`), since those constraints come from the
//! calling convention, not from the interference graph. This module's `precolor_check` just
//! verifies none of those fixed colors already conflict with each other, then `color_slots` fills
//! in every remaining uncolored slot greedily.

use crate::slot::SlotSet;
use crate::{abi::TargetAbi, interference::used_colors};
use roo_diagnostics::{ErrorKind, ErrorState, Location};

/// Verify no two interfering slots were pre-colored (by the generator) to the same color. This
/// can only happen if two live call-argument/parameter slots of the same color are simultaneously
/// live, which would mean the generator's own parameterization was wrong — an internal error, not
/// a user-facing one.
pub fn precolor_check(slots: &SlotSet, errors: &mut ErrorState) {
    for (id, slot) in slots.iter() {
        let Some(color) = slot.color else { continue };
        for &other in &slot.interferences {
            if slots[other].color == Some(color) && other > id {
                errors.raise(
                    Location::unknown(),
                    ErrorKind::Ice {
                        where_: "precolor_check".to_string(),
                        detail: format!("slots {id:?} and {other:?} share color {color} while interfering"),
                    },
                );
            }
        }
    }
}

/// Greedily color every slot that still needs one (§4.4): for each, in slot-allocation order, the
/// lowest color in the target's general-register set not already used by one of its colored
/// interferees. Slots needing more registers than the target has left uncolored are reported as
/// spills via the caller (not modeled here; this backend has no stack-spill path, so running out
/// is an internal error for the programs this compiler accepts).
pub fn color_slots(slots: &mut SlotSet, abi: &TargetAbi, errors: &mut ErrorState) {
    let order: Vec<_> = slots
        .iter()
        .filter(|(_, s)| s.needs_coloring())
        .map(|(id, _)| id)
        .collect();

    for id in order {
        let used = used_colors(slots, id);
        let chosen = abi.general_registers.iter().copied().find(|c| !used.contains(c));
        match chosen {
            Some(color) => slots[id].color = Some(color),
            None => {
                errors.raise(
                    Location::unknown(),
                    ErrorKind::Ice {
                        where_: "color_slots".to_string(),
                        detail: format!("ran out of registers coloring {id:?}"),
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interference::build_interference_graph;
    use crate::live_range::LiveRange;
    use crate::slot::{Slot, SlotKind};
    use roo_ir::Storage;

    fn test_abi() -> TargetAbi {
        TargetAbi {
            general_registers: vec![0, 1, 2],
            int_param_colors: vec![0, 1],
            return_color: 0,
        }
    }

    #[test]
    fn interfering_slots_get_distinct_colors() {
        let mut slots = SlotSet::new();
        let a = slots.push(Slot::new(SlotKind::Temporary(0), Storage::Register));
        let b = slots.push(Slot::new(SlotKind::Temporary(1), Storage::Register));
        slots[a].live_ranges.push(LiveRange { def: Some(0), last_use: Some(5) });
        slots[b].live_ranges.push(LiveRange { def: Some(2), last_use: Some(8) });
        build_interference_graph(&mut slots);

        let mut errors = ErrorState::new();
        color_slots(&mut slots, &test_abi(), &mut errors);
        assert!(!errors.has_errored());
        assert_ne!(slots[a].color, slots[b].color);
        assert!(slots[a].color.is_some());
        assert!(slots[b].color.is_some());
    }

    #[test]
    fn non_interfering_slots_may_share_a_color() {
        let mut slots = SlotSet::new();
        let a = slots.push(Slot::new(SlotKind::Temporary(0), Storage::Register));
        let b = slots.push(Slot::new(SlotKind::Temporary(1), Storage::Register));
        slots[a].live_ranges.push(LiveRange { def: Some(0), last_use: Some(2) });
        slots[b].live_ranges.push(LiveRange { def: Some(3), last_use: Some(5) });
        build_interference_graph(&mut slots);

        let mut errors = ErrorState::new();
        color_slots(&mut slots, &test_abi(), &mut errors);
        assert_eq!(slots[a].color, Some(0));
        assert_eq!(slots[b].color, Some(0));
    }

    #[test]
    fn precolored_non_conflicting_slots_pass_check() {
        let mut slots = SlotSet::new();
        let a = slots.push(Slot::new(SlotKind::Param(0), Storage::Register));
        slots[a].color = Some(0);
        let mut errors = ErrorState::new();
        precolor_check(&slots, &mut errors);
        assert!(!errors.has_errored());
    }
}
