// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory identifiers
//!
//! Row identifiers are store-assigned, start at 1 and are never reused.
//! Each entity gets its own newtype so a rack id can never be passed where a
//! pool id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of inventory entity that can be locked, looked up or counted.
///
/// The declaration order is the lock hierarchy: an operation that needs more
/// than one lock acquires them from the top of this list downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Fab,
    Room,
    Rack,
    Server,
    Pool,
}

impl EntityKind {
    /// Position in the lock hierarchy (lower is acquired first).
    pub fn rank(self) -> u8 {
        match self {
            EntityKind::Fab => 0,
            EntityKind::Room => 1,
            EntityKind::Rack => 2,
            EntityKind::Server => 3,
            EntityKind::Pool => 4,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Fab => write!(f, "fab"),
            EntityKind::Room => write!(f, "room"),
            EntityKind::Rack => write!(f, "rack"),
            EntityKind::Server => write!(f, "server"),
            EntityKind::Pool => write!(f, "pool"),
        }
    }
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident => $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const KIND: EntityKind = $kind;

            pub fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> u64 {
                id.0
            }
        }
    };
}

entity_id!(
    /// Facility ("fab") identifier
    FabId => EntityKind::Fab
);
entity_id!(
    /// Room identifier
    RoomId => EntityKind::Room
);
entity_id!(
    /// Rack identifier
    RackId => EntityKind::Rack
);
entity_id!(
    /// Server identifier; a server row is also the persisted form of a slot
    ServerId => EntityKind::Server
);
entity_id!(
    /// Address pool identifier
    PoolId => EntityKind::Pool
);
