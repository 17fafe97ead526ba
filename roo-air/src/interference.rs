//! Interference graph construction (§4.4): two non-constant slots interfere when their live
//! ranges overlap, by the formula in `live_range.rs`. Built once per code-thing, after AIR
//! generation and before coloring.

use crate::slot::{SlotId, SlotSet};
use std::collections::BTreeSet;

/// Populate `slots[*].interferences` from each pair's live ranges. A slot can carry more than one
/// live range (it can be defined, used out, and redefined later in the same stream), so two slots
/// interfere if *any* range on one overlaps *any* range on the other.
pub fn build_interference_graph(slots: &mut SlotSet) {
    let candidates: Vec<SlotId> = slots
        .iter()
        .filter(|(_, s)| !s.is_constant())
        .map(|(id, _)| id)
        .collect();

    let mut pairs: Vec<(SlotId, SlotId)> = Vec::new();
    for (i, &a) in candidates.iter().enumerate() {
        for &b in &candidates[i + 1..] {
            if slot_ranges_overlap(slots, a, b) {
                pairs.push((a, b));
            }
        }
    }

    for (a, b) in pairs {
        add_edge(slots, a, b);
    }
}

fn slot_ranges_overlap(slots: &SlotSet, a: SlotId, b: SlotId) -> bool {
    let ranges_a = &slots[a].live_ranges;
    let ranges_b = &slots[b].live_ranges;
    ranges_a
        .iter()
        .any(|ra| ranges_b.iter().any(|rb| ra.overlaps(rb)))
}

fn add_edge(slots: &mut SlotSet, a: SlotId, b: SlotId) {
    if !slots[a].interferences.contains(&b) {
        slots[a].interferences.push(b);
    }
    if !slots[b].interferences.contains(&a) {
        slots[b].interferences.push(a);
    }
}

/// The set of colors already in use among `slot`'s interferences, for the greedy colorer.
pub fn used_colors(slots: &SlotSet, slot: SlotId) -> BTreeSet<u32> {
    slots[slot]
        .interferences
        .iter()
        .filter_map(|&other| slots[other].color)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live_range::LiveRange;
    use crate::slot::{Slot, SlotKind};
    use roo_ir::Storage;

    #[test]
    fn overlapping_slots_interfere() {
        let mut slots = SlotSet::new();
        let a = slots.push(Slot::new(SlotKind::Temporary(0), Storage::Register));
        let b = slots.push(Slot::new(SlotKind::Temporary(1), Storage::Register));
        slots[a].live_ranges.push(LiveRange { def: Some(0), last_use: Some(5) });
        slots[b].live_ranges.push(LiveRange { def: Some(3), last_use: Some(8) });

        build_interference_graph(&mut slots);
        assert!(slots[a].interferences.contains(&b));
        assert!(slots[b].interferences.contains(&a));
    }

    #[test]
    fn disjoint_slots_do_not_interfere() {
        let mut slots = SlotSet::new();
        let a = slots.push(Slot::new(SlotKind::Temporary(0), Storage::Register));
        let b = slots.push(Slot::new(SlotKind::Temporary(1), Storage::Register));
        slots[a].live_ranges.push(LiveRange { def: Some(0), last_use: Some(2) });
        slots[b].live_ranges.push(LiveRange { def: Some(3), last_use: Some(5) });

        build_interference_graph(&mut slots);
        assert!(slots[a].interferences.is_empty());
        assert!(slots[b].interferences.is_empty());
    }

    #[test]
    fn constants_are_skipped_entirely() {
        let mut slots = SlotSet::new();
        let a = slots.push(Slot::new(SlotKind::Constant(roo_ir::Literal::Int(1)), Storage::Register));
        let b = slots.push(Slot::new(SlotKind::Temporary(0), Storage::Register));
        slots[b].live_ranges.push(LiveRange { def: Some(0), last_use: Some(5) });

        build_interference_graph(&mut slots);
        assert!(slots[a].interferences.is_empty());
        assert!(slots[b].interferences.is_empty());
    }
}
