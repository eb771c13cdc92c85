// Copyright (c) 2025 - Cowboy AI, Inc.
//! Structured advisory lock keys
//!
//! A key names one inventory entity by kind and id. Id 0 is never assigned to
//! a row, so `(kind, 0)` names the whole collection of that kind; creating a
//! pool takes `(Pool, 0)` so overlap checks cannot interleave.
//!
//! # Numeric form
//!
//! Stores that only offer integer advisory locks get a collision-free `i64`:
//!
//! ```text
//!  63      56 55                                    0
//! ┌──────────┬──────────────────────────────────────┐
//! │ kind tag │ entity id (< 2^56)                   │
//! └──────────┴──────────────────────────────────────┘
//! ```
//!
//! Distinct kinds occupy disjoint ranges and the top bit is never set, so
//! the value is always positive.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::domain::{EntityKind, FabId, PoolId, RackId, RoomId, ServerId};
use crate::errors::{AllocationError, AllocationResult};

const ID_BITS: u32 = 56;
const MAX_ID: u64 = (1 << ID_BITS) - 1;

/// Name of one lockable entity (or, with id 0, of a whole collection)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockKey {
    pub kind: EntityKind,
    pub id: u64,
}

impl LockKey {
    pub fn new(kind: EntityKind, id: u64) -> Self {
        Self { kind, id }
    }

    /// The key covering every entity of `kind`
    pub fn collection(kind: EntityKind) -> Self {
        Self { kind, id: 0 }
    }

    pub fn fab(id: FabId) -> Self {
        Self::new(EntityKind::Fab, id.get())
    }

    pub fn room(id: RoomId) -> Self {
        Self::new(EntityKind::Room, id.get())
    }

    pub fn rack(id: RackId) -> Self {
        Self::new(EntityKind::Rack, id.get())
    }

    pub fn server(id: ServerId) -> Self {
        Self::new(EntityKind::Server, id.get())
    }

    pub fn pool(id: PoolId) -> Self {
        Self::new(EntityKind::Pool, id.get())
    }

    /// Packed `i64` form for integer advisory-lock backends
    pub fn advisory_id(&self) -> AllocationResult<i64> {
        if self.id > MAX_ID {
            return Err(AllocationError::InvalidInput(format!(
                "{} id {} does not fit an advisory lock key",
                self.kind, self.id
            )));
        }
        let tag = u64::from(self.kind.rank()) + 1;
        Ok(((tag << ID_BITS) | self.id) as i64)
    }
}

impl Ord for LockKey {
    /// Canonical acquisition order: hierarchy rank first, then id
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .rank()
            .cmp(&other.kind.rank())
            .then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for LockKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id == 0 {
            write!(f, "{}:*", self.kind)
        } else {
            write!(f, "{}:{}", self.kind, self.id)
        }
    }
}
