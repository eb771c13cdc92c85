// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory Domain Models
//!
//! Value objects and entities for the DCIM inventory and its two finite
//! resource spaces: addresses grouped into per-service pools, and rack units
//! grouped into slots.
//!
//! # Value Objects
//!
//! - [`CidrBlock`]: validated, canonical CIDR block with host arithmetic
//! - [`SlotRange`]: closed rack-unit interval
//! - Identifier newtypes ([`PoolId`], [`RackId`], ...)
//!
//! # Entities
//!
//! - [`AddressPool`], [`Fab`], [`Room`], [`Rack`], [`Server`]
//!
//! # Invariants
//!
//! Pure rule functions live in [`invariants`] and are shared by every
//! service that mutates the inventory.

pub mod cidr;
pub mod ids;
pub mod inventory;
pub mod invariants;
pub mod slot;

pub use cidr::{CidrBlock, NetworkError};
pub use ids::{EntityKind, FabId, PoolId, RackId, RoomId, ServerId};
pub use inventory::{
    AddressPool, Assignment, Fab, NewFab, NewPool, NewRack, NewRoom, NewServer, Rack, Room,
    Server,
};
pub use slot::{max_free_run, SlotError, SlotRange};
