// Copyright (c) 2025 - Cowboy AI, Inc.
//! Rack Slot Value Object
//!
//! A slot is a closed interval of rack units `[front, back]`. Both ends are
//! occupied, so `[0, 1]` and `[1, 2]` overlap.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Slot validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlotError {
    #[error("Invalid slot: front position {front} is after back position {back}")]
    Inverted { front: u32, back: u32 },

    #[error("Invalid slot: {slot} does not fit a rack of height {height}")]
    OutOfBounds { slot: SlotRange, height: u32 },
}

/// Closed rack-unit interval occupied by one server
///
/// Invariants:
/// - `front <= back`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawSlot")]
pub struct SlotRange {
    front: u32,
    back: u32,
}

#[derive(Deserialize)]
struct RawSlot {
    front: u32,
    back: u32,
}

impl TryFrom<RawSlot> for SlotRange {
    type Error = SlotError;

    fn try_from(raw: RawSlot) -> Result<Self, Self::Error> {
        SlotRange::new(raw.front, raw.back)
    }
}

impl SlotRange {
    pub fn new(front: u32, back: u32) -> Result<Self, SlotError> {
        if front > back {
            return Err(SlotError::Inverted { front, back });
        }
        Ok(Self { front, back })
    }

    pub fn front(&self) -> u32 {
        self.front
    }

    pub fn back(&self) -> u32 {
        self.back
    }

    /// Number of rack units covered
    pub fn units(&self) -> u32 {
        self.back - self.front + 1
    }

    /// Closed-interval overlap: `!(b < c || d < a)` for `[a, b]` and `[c, d]`
    pub fn overlaps(&self, other: &SlotRange) -> bool {
        !(self.back < other.front || other.back < self.front)
    }

    /// Ensure the slot lies inside `[0, height)`
    pub fn fit(&self, height: u32) -> Result<(), SlotError> {
        if self.back >= height {
            return Err(SlotError::OutOfBounds {
                slot: *self,
                height,
            });
        }
        Ok(())
    }
}

impl fmt::Display for SlotRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.front, self.back)
    }
}

/// Largest contiguous run of free units in a rack of `height` units
///
/// Slots may be given in any order but must be pairwise disjoint. The run
/// before the first slot is `first.front`, between neighbours it is
/// `next.front - prev.back - 1`, and after the last slot it is
/// `height - last.back - 1`. An empty rack is entirely free.
pub fn max_free_run(height: u32, slots: &[SlotRange]) -> u32 {
    let mut sorted: Vec<&SlotRange> = slots.iter().collect();
    sorted.sort_by_key(|slot| slot.front);

    let (first, last) = match (sorted.first(), sorted.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return height,
    };

    let leading = first.front;
    let trailing = height.saturating_sub(last.back.saturating_add(1));
    let between = sorted
        .windows(2)
        .map(|pair| pair[1].front.saturating_sub(pair[0].back.saturating_add(1)))
        .max()
        .unwrap_or(0);

    leading.max(between).max(trailing).min(height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn slot(front: u32, back: u32) -> SlotRange {
        SlotRange::new(front, back).unwrap()
    }

    #[test]
    fn test_new_rejects_inverted_range() {
        assert_eq!(
            SlotRange::new(5, 4),
            Err(SlotError::Inverted { front: 5, back: 4 })
        );
        assert_eq!(slot(3, 3).units(), 1);
    }

    #[test_case(0, 1, 1, 2, true ; "touching endpoints")]
    #[test_case(0, 1, 2, 3, false ; "adjacent")]
    #[test_case(4, 10, 5, 6, true ; "contained")]
    #[test_case(5, 6, 0, 4, false ; "before")]
    #[test_case(7, 7, 7, 7, true ; "same unit")]
    fn test_overlaps(a: u32, b: u32, c: u32, d: u32, expected: bool) {
        assert_eq!(slot(a, b).overlaps(&slot(c, d)), expected);
        assert_eq!(slot(c, d).overlaps(&slot(a, b)), expected);
    }

    #[test]
    fn test_fit() {
        assert!(slot(0, 41).fit(42).is_ok());
        assert!(matches!(
            slot(40, 42).fit(42),
            Err(SlotError::OutOfBounds { height: 42, .. })
        ));
    }

    #[test]
    fn test_max_free_run_empty_rack_is_height() {
        assert_eq!(max_free_run(42, &[]), 42);
    }

    #[test]
    fn test_max_free_run_single_slot_at_bottom() {
        assert_eq!(max_free_run(42, &[slot(0, 9)]), 32);
    }

    #[test]
    fn test_max_free_run_gap_between_slots() {
        // free: 0..=1 (2), 5..=19 (15), 26..=29 (4)
        let slots = [slot(20, 25), slot(2, 4)];
        assert_eq!(max_free_run(30, &slots), 15);
    }

    #[test]
    fn test_max_free_run_full_rack() {
        assert_eq!(max_free_run(4, &[slot(0, 1), slot(2, 3)]), 0);
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: SlotRange = serde_json::from_str(r#"{"front":1,"back":2}"#).unwrap();
        assert_eq!(ok, slot(1, 2));
        assert!(serde_json::from_str::<SlotRange>(r#"{"front":3,"back":2}"#).is_err());
    }
}
