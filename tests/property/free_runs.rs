// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Rack Slots
//!
//! Slot overlap and the largest free run, checked against a unit-by-unit
//! occupancy model of the rack.

use cim_dcim_allocation::domain::{max_free_run, SlotRange};
use proptest::prelude::*;

fn slot_range(limit: u32) -> impl Strategy<Value = SlotRange> {
    (0..limit, 0..limit).prop_map(|(a, b)| {
        SlotRange::new(a.min(b), a.max(b)).expect("ordered ends")
    })
}

/// Keep slots in arrival order, dropping any that collide with one kept
fn disjoint(height: u32, candidates: Vec<SlotRange>) -> Vec<SlotRange> {
    let mut kept: Vec<SlotRange> = Vec::new();
    for candidate in candidates {
        if candidate.fit(height).is_ok() && kept.iter().all(|k| !k.overlaps(&candidate)) {
            kept.push(candidate);
        }
    }
    kept
}

fn longest_free_by_units(height: u32, slots: &[SlotRange]) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    for unit in 0..height {
        if slots.iter().any(|s| s.front() <= unit && unit <= s.back()) {
            run = 0;
        } else {
            run += 1;
            longest = longest.max(run);
        }
    }
    longest
}

proptest! {
    #[test]
    fn overlap_matches_shared_units(a in slot_range(20), b in slot_range(20)) {
        let shared = (a.front()..=a.back()).any(|unit| b.front() <= unit && unit <= b.back());
        prop_assert_eq!(a.overlaps(&b), shared);
    }

    #[test]
    fn max_free_run_matches_unit_scan(
        height in 1u32..=48,
        candidates in prop::collection::vec(slot_range(48), 0..8),
    ) {
        let slots = disjoint(height, candidates);
        prop_assert_eq!(max_free_run(height, &slots), longest_free_by_units(height, &slots));
    }
}
