// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory Store Abstraction
//!
//! This module defines the persistence interface the allocation services run
//! against. A store hands out transactions; every read and write of an
//! operation goes through one transaction, which is committed or rolled back
//! as a unit.
//!
//! # Architecture
//!
//! ```text
//! Service → ConcurrencyCoordinator → lock(s) → StoreTransaction → commit
//!                                                   ↓
//!                                           InventoryStore backend
//! ```
//!
//! # Store Requirements
//!
//! 1. **Atomic commit**: all staged writes become visible together or not at all
//! 2. **Rollback on drop**: a transaction dropped without `commit` leaves no trace
//! 3. **Store-assigned ids**: ascending, starting at 1, never reused
//! 4. **Unique constraints**: fab names and server names are unique; a
//!    violation is a `Conflict`. Address uniqueness belongs to the pools.
//!
//! Isolation is read-committed. Read-modify-write correctness comes from the
//! advisory locks held around the transaction, not from the store.
//!
//! # Example
//!
//! ```rust
//! use cim_dcim_allocation::store::{InventoryStore, MemoryStore};
//! use cim_dcim_allocation::domain::NewFab;
//!
//! # tokio_test::block_on(async {
//! let store = MemoryStore::new();
//! let mut tx = store.begin().await.unwrap();
//! let fab = tx.insert_fab(NewFab { name: "dc-1".to_string() }).await.unwrap();
//! tx.commit().await.unwrap();
//!
//! let mut read = store.begin().await.unwrap();
//! assert_eq!(read.fab(fab.id).await.unwrap().unwrap().name, "dc-1");
//! # });
//! ```

use async_trait::async_trait;

use crate::domain::{
    AddressPool, Fab, FabId, NewFab, NewPool, NewRack, NewRoom, NewServer, PoolId, Rack, RackId,
    Room, RoomId, Server, ServerId,
};
use crate::errors::AllocationResult;

pub mod memory;

pub use memory::MemoryStore;

/// Source of transactions over the inventory
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Open a transaction
    ///
    /// Reads see committed state plus the transaction's own staged writes.
    async fn begin(&self) -> AllocationResult<Box<dyn StoreTransaction>>;
}

/// One unit of work against the inventory
///
/// Lookups return `Ok(None)` for missing rows; turning that into `NotFound`
/// is the caller's decision. Scans return rows in ascending id order.
#[async_trait]
pub trait StoreTransaction: Send {
    // Address pools

    async fn pool(&mut self, id: PoolId) -> AllocationResult<Option<AddressPool>>;

    /// All pools, or only those serving `service`
    async fn pools(&mut self, service: Option<&str>) -> AllocationResult<Vec<AddressPool>>;

    async fn insert_pool(&mut self, pool: NewPool) -> AllocationResult<AddressPool>;

    async fn save_pool(&mut self, pool: &AddressPool) -> AllocationResult<()>;

    // Fabs

    async fn fab(&mut self, id: FabId) -> AllocationResult<Option<Fab>>;

    async fn fabs(&mut self) -> AllocationResult<Vec<Fab>>;

    /// Insert a fab
    ///
    /// # Errors
    ///
    /// - `Conflict` if a fab with the same name exists
    async fn insert_fab(&mut self, fab: NewFab) -> AllocationResult<Fab>;

    async fn save_fab(&mut self, fab: &Fab) -> AllocationResult<()>;

    async fn delete_fab(&mut self, id: FabId) -> AllocationResult<()>;

    // Rooms

    async fn room(&mut self, id: RoomId) -> AllocationResult<Option<Room>>;

    async fn rooms_in_fab(&mut self, fab_id: FabId) -> AllocationResult<Vec<Room>>;

    async fn insert_room(&mut self, fab_id: FabId, room: NewRoom) -> AllocationResult<Room>;

    async fn save_room(&mut self, room: &Room) -> AllocationResult<()>;

    async fn delete_room(&mut self, id: RoomId) -> AllocationResult<()>;

    // Racks

    async fn rack(&mut self, id: RackId) -> AllocationResult<Option<Rack>>;

    async fn racks_in_room(&mut self, room_id: RoomId) -> AllocationResult<Vec<Rack>>;

    /// Insert a rack into `room`; the new rack starts entirely free
    async fn insert_rack(&mut self, room: &Room, rack: NewRack) -> AllocationResult<Rack>;

    async fn save_rack(&mut self, rack: &Rack) -> AllocationResult<()>;

    async fn delete_rack(&mut self, id: RackId) -> AllocationResult<()>;

    // Servers

    async fn server(&mut self, id: ServerId) -> AllocationResult<Option<Server>>;

    async fn servers_in_rack(&mut self, rack_id: RackId) -> AllocationResult<Vec<Server>>;

    /// Servers filtered by health flag
    async fn servers_by_health(&mut self, healthy: bool) -> AllocationResult<Vec<Server>>;

    /// Insert a server
    ///
    /// # Errors
    ///
    /// - `Conflict` if the name is already taken
    async fn insert_server(&mut self, server: NewServer) -> AllocationResult<Server>;

    async fn save_server(&mut self, server: &Server) -> AllocationResult<()>;

    async fn delete_server(&mut self, id: ServerId) -> AllocationResult<()>;

    // Completion

    /// Make every staged write visible atomically
    ///
    /// # Errors
    ///
    /// - `Conflict` if a unique constraint was violated by a concurrent commit
    /// - `Store` if the backend fails
    async fn commit(self: Box<Self>) -> AllocationResult<()>;

    /// Discard every staged write
    async fn rollback(self: Box<Self>) -> AllocationResult<()>;
}
