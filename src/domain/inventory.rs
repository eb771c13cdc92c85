// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory Entities
//!
//! The physical hierarchy is fab → room → rack → server. Address pools sit
//! beside it, keyed by service name. Rows are plain data; the rules that keep
//! them consistent live in [`crate::domain::invariants`] and the services.
//!
//! ```text
//! Fab ──< Room ──< Rack ──< Server >── AddressPool
//!  room_count  rack_count   slot          used_addresses
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::IpAddr;

use super::cidr::CidrBlock;
use super::ids::{FabId, PoolId, RackId, RoomId, ServerId};
use super::slot::SlotRange;

/// A per-service block of assignable addresses
///
/// Invariants:
/// - `used_addresses` only holds usable hosts of `cidr`
/// - No two pools' blocks overlap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressPool {
    pub id: PoolId,
    pub service: String,
    pub cidr: CidrBlock,
    pub used_addresses: BTreeSet<IpAddr>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AddressPool {
    /// First usable host not yet handed out, scanning upwards
    pub fn first_free(&self) -> Option<IpAddr> {
        self.cidr
            .usable_hosts()
            .find(|candidate| !self.used_addresses.contains(candidate))
    }

    pub fn free_count(&self) -> u128 {
        self.cidr
            .usable_count()
            .saturating_sub(self.used_addresses.len() as u128)
    }
}

/// A facility
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fab {
    pub id: FabId,
    pub name: String,
    /// Number of rooms currently in the fab
    pub room_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A room inside a fab
///
/// Invariants:
/// - `rack_count <= rack_capacity`
/// - Every rack in the room is at most `height` units tall
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub fab_id: FabId,
    pub name: String,
    pub rack_capacity: u32,
    pub rack_count: u32,
    pub height: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    pub fn free_rack_positions(&self) -> u32 {
        self.rack_capacity.saturating_sub(self.rack_count)
    }
}

/// A rack inside a room
///
/// `max_empty` caches the largest free run of units. It is fresh while
/// `max_empty_revision == slot_revision`; every slot mutation bumps
/// `slot_revision` and `slots_changed_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rack {
    pub id: RackId,
    pub fab_id: FabId,
    pub room_id: RoomId,
    pub name: String,
    pub service: String,
    pub height: u32,
    pub max_empty: u32,
    pub slot_revision: u64,
    pub max_empty_revision: u64,
    pub slots_changed_at: DateTime<Utc>,
    pub max_empty_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rack {
    pub fn max_empty_is_stale(&self) -> bool {
        self.max_empty_revision != self.slot_revision
    }

    /// Record that the rack's set of slots changed
    pub fn touch_slots(&mut self, now: DateTime<Utc>) {
        self.slot_revision += 1;
        self.slots_changed_at = now;
        self.updated_at = now;
    }
}

/// An address handed out from a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    pub address: IpAddr,
    pub pool_id: PoolId,
}

/// A server occupying one slot of a rack
///
/// `assignment` is `None` once the server's address has gone back to its pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: ServerId,
    pub name: String,
    pub service: String,
    pub fab_id: FabId,
    pub room_id: RoomId,
    pub rack_id: RackId,
    pub slot: SlotRange,
    pub assignment: Option<Assignment>,
    pub healthy: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a new address pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPool {
    pub service: String,
    pub cidr: CidrBlock,
}

/// Input for a new fab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFab {
    pub name: String,
}

/// Input for a new room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoom {
    pub name: String,
    pub rack_capacity: u32,
    pub height: u32,
}

/// Input for a new rack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRack {
    pub name: String,
    pub service: String,
    pub height: u32,
}

/// Input for a new server row; placement fills in the location and address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewServer {
    pub name: String,
    pub service: String,
    pub fab_id: FabId,
    pub room_id: RoomId,
    pub rack_id: RackId,
    pub slot: SlotRange,
    pub assignment: Assignment,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(cidr: &str, used: &[&str]) -> AddressPool {
        let now = Utc::now();
        AddressPool {
            id: PoolId::new(1),
            service: "web".to_string(),
            cidr: CidrBlock::new(cidr).unwrap(),
            used_addresses: used.iter().map(|a| a.parse().unwrap()).collect(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_first_free_skips_used() {
        let p = pool("10.0.0.0/29", &["10.0.0.1", "10.0.0.2", "10.0.0.4"]);
        assert_eq!(p.first_free(), Some("10.0.0.3".parse().unwrap()));
        assert_eq!(p.free_count(), 3);
    }

    #[test]
    fn test_first_free_none_when_full() {
        let p = pool("10.0.0.0/30", &["10.0.0.1", "10.0.0.2"]);
        assert_eq!(p.first_free(), None);
        assert_eq!(p.free_count(), 0);
    }

    #[test]
    fn test_rack_staleness_follows_revisions() {
        let now = Utc::now();
        let mut rack = Rack {
            id: RackId::new(1),
            fab_id: FabId::new(1),
            room_id: RoomId::new(1),
            name: "r1".to_string(),
            service: "web".to_string(),
            height: 42,
            max_empty: 42,
            slot_revision: 0,
            max_empty_revision: 0,
            slots_changed_at: now,
            max_empty_at: now,
            created_at: now,
            updated_at: now,
        };
        assert!(!rack.max_empty_is_stale());
        rack.touch_slots(now);
        assert!(rack.max_empty_is_stale());
        assert_eq!(rack.slot_revision, 1);
    }
}
