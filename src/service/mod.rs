// Copyright (c) 2025 - Cowboy AI, Inc.
//! Allocation Service Layer
//!
//! Stateless services that hold only injected handles (coordinator, config,
//! event sink) and run every read-then-write inside a locked scope.
//!
//! # Architecture
//!
//! ```text
//! Caller
//!     ↓
//! Service (this module)
//!     ↓
//! ConcurrencyCoordinator → advisory locks + store transaction
//!     ↓
//! Pure invariants (domain::invariants, CapacityGuard)
//!     ↓
//! commit → release locks → EventSink (best-effort NATS publish)
//! ```
//!
//! # Services
//!
//! - [`AddressPoolRegistry`]: pools and address assignment
//! - [`SlotAllocator`]: slot checks, moves, cached free runs
//! - [`CapacityGuard`]: structural limits, called inside other services' scopes
//! - [`InventoryService`]: fabs, rooms, racks and server placement
//!
//! [`AllocationServices`] wires all of them over one store.
//!
//! # Example
//!
//! ```rust
//! use cim_dcim_allocation::config::AllocationConfig;
//! use cim_dcim_allocation::domain::CidrBlock;
//! use cim_dcim_allocation::service::AllocationServices;
//! use cim_dcim_allocation::store::MemoryStore;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let services = AllocationServices::new(Arc::new(MemoryStore::new()), AllocationConfig::default());
//! let cidr = CidrBlock::new("10.0.0.0/24").unwrap();
//! services.pools.create_pool("web", cidr).await.unwrap();
//!
//! let assignment = services.pools.assign("web").await.unwrap();
//! assert_eq!(assignment.address.to_string(), "10.0.0.1");
//! # });
//! ```

use std::sync::Arc;
use tracing::debug;

use crate::config::AllocationConfig;
use crate::coordination::{ConcurrencyCoordinator, LockKey, LockedScope};
use crate::domain::{EntityKind, Server, ServerId};
use crate::errors::{AllocationError, AllocationResult};
use crate::events::EventSink;
use crate::store::InventoryStore;

pub mod address_pool;
pub mod capacity;
pub mod inventory;
pub mod slot_allocator;

pub use address_pool::AddressPoolRegistry;
pub use capacity::CapacityGuard;
pub use inventory::{InventoryService, PlaceServer};
pub use slot_allocator::SlotAllocator;

/// Every allocation service over one store and one lock table
#[derive(Clone)]
pub struct AllocationServices {
    pub pools: AddressPoolRegistry,
    pub slots: SlotAllocator,
    pub inventory: InventoryService,
    coordinator: ConcurrencyCoordinator,
}

impl AllocationServices {
    /// Services with event publishing disabled
    pub fn new(store: Arc<dyn InventoryStore>, config: AllocationConfig) -> Self {
        Self::with_events(store, config, EventSink::disabled())
    }

    pub fn with_events(
        store: Arc<dyn InventoryStore>,
        config: AllocationConfig,
        events: EventSink,
    ) -> Self {
        let coordinator = ConcurrencyCoordinator::new(store);
        let config = Arc::new(config);

        let pools = AddressPoolRegistry::new(coordinator.clone(), config.clone(), events.clone());
        let slots = SlotAllocator::new(coordinator.clone(), config.clone(), events.clone());
        let inventory = InventoryService::new(coordinator.clone(), pools.clone(), config, events);

        Self {
            pools,
            slots,
            inventory,
            coordinator,
        }
    }

    pub fn coordinator(&self) -> &ConcurrencyCoordinator {
        &self.coordinator
    }
}

/// Lock a server together with the rack it currently sits in
///
/// The rack is only known after reading the server, and the rack lock ranks
/// above the server lock, so the read happens unlocked and is confirmed once
/// both locks are held. A server that changed racks in between is retried,
/// up to `attempts` times in total. `extra` keys join the same scope.
///
/// # Errors
///
/// - `NotFound` if the server does not exist
/// - `Conflict` if the server never held still
pub(crate) async fn lock_server_in_rack(
    coordinator: &ConcurrencyCoordinator,
    server_id: ServerId,
    extra: &[LockKey],
    attempts: u32,
) -> AllocationResult<(LockedScope, Server)> {
    for attempt in 1..=attempts.max(1) {
        let seen = coordinator
            .snapshot()
            .await?
            .server(server_id)
            .await?
            .ok_or_else(|| AllocationError::not_found(EntityKind::Server, server_id))?;

        let mut keys = vec![LockKey::rack(seen.rack_id), LockKey::server(server_id)];
        keys.extend_from_slice(extra);
        let mut scope = coordinator.scope(keys).await?;

        let current = scope.tx().server(server_id).await?;
        match current {
            Some(server) if server.rack_id == seen.rack_id => return Ok((scope, server)),
            Some(server) => {
                debug!(
                    "Server {} moved from rack {} to {} before locking (attempt {})",
                    server_id, seen.rack_id, server.rack_id, attempt
                );
                scope.rollback().await;
            }
            None => {
                scope.rollback().await;
                return Err(AllocationError::not_found(EntityKind::Server, server_id));
            }
        }
    }

    Err(AllocationError::Conflict(format!(
        "server {server_id} kept changing racks while being locked"
    )))
}
