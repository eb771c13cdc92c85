// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for allocation operations
//!
//! Every failure aborts the surrounding transaction and releases held locks
//! before it reaches the caller. Mapping to a transport (HTTP status, NATS
//! reply code) is the caller's business.

use thiserror::Error;

use crate::domain::{EntityKind, NetworkError, RackId, RoomId, ServerId, SlotError, SlotRange};

/// Errors that can occur in allocation operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// A new resource collides with an existing one (overlapping CIDR, duplicate name)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A referenced entity does not exist
    #[error("{kind} not found: {key}")]
    NotFound { kind: EntityKind, key: String },

    /// A room has no free rack positions for the requested racks
    #[error(
        "Capacity exceeded in room {room}: {rack_count} of {capacity} positions used, {requested} requested"
    )]
    CapacityExceeded {
        room: RoomId,
        rack_count: u32,
        capacity: u32,
        requested: u32,
    },

    /// A rack is taller than the room that would hold it
    #[error("Height exceeded in room {room}: rack height {height} over room height {limit}")]
    HeightExceeded { room: RoomId, height: u32, limit: u32 },

    /// An entity still has children
    #[error("{kind} {id} is not empty: {remaining} {child} remaining")]
    NotEmpty {
        kind: EntityKind,
        id: u64,
        child: EntityKind,
        remaining: usize,
    },

    /// No pool for the service has a free address
    #[error("Resource exhausted: no free address for service {service}")]
    ResourceExhausted { service: String },

    /// A slot was requested for a service the rack does not host
    #[error("Rack {rack} hosts service {rack_service}, not {requested}")]
    IncompatibleService {
        rack: RackId,
        rack_service: String,
        requested: String,
    },

    /// A slot overlaps one already occupied in the rack
    #[error("Slot {requested} in rack {rack} overlaps {occupied} held by server {occupied_by}")]
    SlotConflict {
        rack: RackId,
        requested: SlotRange,
        occupied_by: ServerId,
        occupied: SlotRange,
    },

    /// Persisted state contradicts itself
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Malformed caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Backing store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Event publishing error
    #[error("Publish error: {0}")]
    Publish(String),

    /// Subscribing to an event subject failed
    #[error("Subscribe error: {0}")]
    Subscribe(String),
}

/// Result type for allocation operations
pub type AllocationResult<T> = Result<T, AllocationError>;

impl AllocationError {
    pub fn not_found(kind: EntityKind, key: impl ToString) -> Self {
        AllocationError::NotFound {
            kind,
            key: key.to_string(),
        }
    }
}

impl From<NetworkError> for AllocationError {
    fn from(err: NetworkError) -> Self {
        AllocationError::InvalidInput(err.to_string())
    }
}

impl From<SlotError> for AllocationError {
    fn from(err: SlotError) -> Self {
        AllocationError::InvalidInput(err.to_string())
    }
}

impl From<async_nats::Error> for AllocationError {
    fn from(err: async_nats::Error) -> Self {
        AllocationError::Publish(err.to_string())
    }
}

impl From<serde_json::Error> for AllocationError {
    fn from(err: serde_json::Error) -> Self {
        AllocationError::Serialization(err.to_string())
    }
}
