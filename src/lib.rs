// Copyright (c) 2025 - Cowboy AI, Inc.
//! DCIM resource allocation
//!
//! Hands out the two finite resources of a data-center inventory without
//! double-booking them under concurrent requests: IP addresses from
//! per-service pools, and rack-unit slots within racks. Structural limits of
//! the fab → room → rack hierarchy are enforced before anything is written.
//!
//! All state lives behind the [`store::InventoryStore`] seam; every
//! read-then-write runs under advisory locks from
//! [`coordination::ConcurrencyCoordinator`]. Committed changes are published
//! as [`events::AllocationEvent`]s over NATS when a publisher is configured.

pub mod config;
pub mod coordination;
pub mod domain;
pub mod errors;
pub mod events;
pub mod manifest;
pub mod nats;
pub mod service;
pub mod store;
pub mod subjects;
pub mod telemetry;

// Re-export commonly used types
pub use config::AllocationConfig;
pub use coordination::{ConcurrencyCoordinator, LockKey};
pub use errors::{AllocationError, AllocationResult};
pub use events::{AllocationEvent, EventSink};
pub use nats::{NatsClient, NatsConfig};
pub use service::AllocationServices;
pub use store::{InventoryStore, MemoryStore};
