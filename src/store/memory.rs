// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-process Inventory Store
//!
//! Committed rows live in ordered maps behind one `RwLock`. Each transaction
//! keeps a private write-set (`Some(row)` for an upsert, `None` for a delete)
//! that is overlaid on committed rows when reading and applied under the write
//! lock on commit. Dropping a transaction discards its write-set.
//!
//! The lock is never held across an `.await`.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};
use tracing::debug;

use super::{InventoryStore, StoreTransaction};
use crate::domain::{
    AddressPool, EntityKind, Fab, FabId, NewFab, NewPool, NewRack, NewRoom, NewServer, PoolId,
    Rack, RackId, Room, RoomId, Server, ServerId,
};
use crate::errors::{AllocationError, AllocationResult};

type Table<T> = BTreeMap<u64, T>;
type WriteSet<T> = BTreeMap<u64, Option<T>>;

#[derive(Debug, Default)]
struct Tables {
    pools: Table<AddressPool>,
    fabs: Table<Fab>,
    rooms: Table<Room>,
    racks: Table<Rack>,
    servers: Table<Server>,
}

#[derive(Debug, Default)]
struct Staged {
    pools: WriteSet<AddressPool>,
    fabs: WriteSet<Fab>,
    rooms: WriteSet<Room>,
    racks: WriteSet<Rack>,
    servers: WriteSet<Server>,
}

impl Staged {
    fn len(&self) -> usize {
        self.pools.len() + self.fabs.len() + self.rooms.len() + self.racks.len() + self.servers.len()
    }
}

#[derive(Debug, Default)]
struct Sequences {
    pools: AtomicU64,
    fabs: AtomicU64,
    rooms: AtomicU64,
    racks: AtomicU64,
    servers: AtomicU64,
}

fn next_id(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::SeqCst) + 1
}

#[derive(Debug, Default)]
struct Shared {
    tables: RwLock<Tables>,
    sequences: Sequences,
}

/// Inventory store kept in process memory
///
/// Cloning is cheap and yields a handle to the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn begin(&self) -> AllocationResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(MemoryTransaction {
            shared: Arc::clone(&self.shared),
            staged: Staged::default(),
        }))
    }
}

/// A transaction over a [`MemoryStore`]
pub struct MemoryTransaction {
    shared: Arc<Shared>,
    staged: Staged,
}

fn poisoned<E>(_: E) -> AllocationError {
    AllocationError::Store("inventory table lock poisoned".to_string())
}

fn read_row<T: Clone>(committed: &Table<T>, staged: &WriteSet<T>, id: u64) -> Option<T> {
    match staged.get(&id) {
        Some(entry) => entry.clone(),
        None => committed.get(&id).cloned(),
    }
}

fn scan_rows<T: Clone>(
    committed: &Table<T>,
    staged: &WriteSet<T>,
    keep: impl Fn(&T) -> bool,
) -> Vec<T> {
    let mut merged: BTreeMap<u64, T> = committed
        .iter()
        .filter(|(id, row)| !staged.contains_key(*id) && keep(*row))
        .map(|(id, row)| (*id, row.clone()))
        .collect();

    for (id, entry) in staged {
        if let Some(row) = entry {
            if keep(row) {
                merged.insert(*id, row.clone());
            }
        }
    }

    merged.into_values().collect()
}

fn row_exists<T>(committed: &Table<T>, staged: &WriteSet<T>, id: u64) -> bool {
    match staged.get(&id) {
        Some(entry) => entry.is_some(),
        None => committed.contains_key(&id),
    }
}

/// First key shared by two rows of the post-commit view
fn first_duplicate<T: Clone, K: Ord>(
    committed: &Table<T>,
    staged: &WriteSet<T>,
    key: impl Fn(&T) -> K,
) -> Option<K> {
    if staged.values().all(Option::is_none) {
        return None;
    }
    let mut seen = BTreeSet::new();
    for row in scan_rows(committed, staged, |_| true) {
        let k = key(&row);
        if seen.contains(&k) {
            return Some(k);
        }
        seen.insert(k);
    }
    None
}

fn apply<T>(committed: &mut Table<T>, staged: WriteSet<T>) {
    for (id, entry) in staged {
        match entry {
            Some(row) => {
                committed.insert(id, row);
            }
            None => {
                committed.remove(&id);
            }
        }
    }
}

impl MemoryTransaction {
    fn committed(&self) -> AllocationResult<RwLockReadGuard<'_, Tables>> {
        self.shared.tables.read().map_err(poisoned)
    }

    fn check_unique(tables: &Tables, staged: &Staged) -> AllocationResult<()> {
        if let Some(name) = first_duplicate(&tables.fabs, &staged.fabs, |f| f.name.clone()) {
            return Err(AllocationError::Conflict(format!(
                "fab name {name} already exists"
            )));
        }
        if let Some(name) = first_duplicate(&tables.servers, &staged.servers, |s| s.name.clone())
        {
            return Err(AllocationError::Conflict(format!(
                "server name {name} already exists"
            )));
        }
        Ok(())
    }

    fn stage_update<T: Clone>(
        committed: &Table<T>,
        staged: &mut WriteSet<T>,
        kind: EntityKind,
        id: u64,
        row: &T,
    ) -> AllocationResult<()> {
        if !row_exists(committed, staged, id) {
            return Err(AllocationError::not_found(kind, id));
        }
        staged.insert(id, Some(row.clone()));
        Ok(())
    }

    fn stage_delete<T>(
        committed: &Table<T>,
        staged: &mut WriteSet<T>,
        kind: EntityKind,
        id: u64,
    ) -> AllocationResult<()> {
        if !row_exists(committed, staged, id) {
            return Err(AllocationError::not_found(kind, id));
        }
        staged.insert(id, None);
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn pool(&mut self, id: PoolId) -> AllocationResult<Option<AddressPool>> {
        let tables = self.committed()?;
        Ok(read_row(&tables.pools, &self.staged.pools, id.get()))
    }

    async fn pools(&mut self, service: Option<&str>) -> AllocationResult<Vec<AddressPool>> {
        let tables = self.committed()?;
        Ok(scan_rows(&tables.pools, &self.staged.pools, |pool| {
            service.map_or(true, |s| pool.service == s)
        }))
    }

    async fn insert_pool(&mut self, pool: NewPool) -> AllocationResult<AddressPool> {
        let now = Utc::now();
        let row = AddressPool {
            id: PoolId::new(next_id(&self.shared.sequences.pools)),
            service: pool.service,
            cidr: pool.cidr,
            used_addresses: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        };
        self.staged.pools.insert(row.id.get(), Some(row.clone()));
        Ok(row)
    }

    async fn save_pool(&mut self, pool: &AddressPool) -> AllocationResult<()> {
        let tables = self.shared.tables.read().map_err(poisoned)?;
        Self::stage_update(
            &tables.pools,
            &mut self.staged.pools,
            EntityKind::Pool,
            pool.id.get(),
            pool,
        )
    }

    async fn fab(&mut self, id: FabId) -> AllocationResult<Option<Fab>> {
        let tables = self.committed()?;
        Ok(read_row(&tables.fabs, &self.staged.fabs, id.get()))
    }

    async fn fabs(&mut self) -> AllocationResult<Vec<Fab>> {
        let tables = self.committed()?;
        Ok(scan_rows(&tables.fabs, &self.staged.fabs, |_| true))
    }

    async fn insert_fab(&mut self, fab: NewFab) -> AllocationResult<Fab> {
        {
            let tables = self.committed()?;
            let taken = scan_rows(&tables.fabs, &self.staged.fabs, |f| f.name == fab.name);
            if !taken.is_empty() {
                return Err(AllocationError::Conflict(format!(
                    "fab name {} already exists",
                    fab.name
                )));
            }
        }
        let now = Utc::now();
        let row = Fab {
            id: FabId::new(next_id(&self.shared.sequences.fabs)),
            name: fab.name,
            room_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.staged.fabs.insert(row.id.get(), Some(row.clone()));
        Ok(row)
    }

    async fn save_fab(&mut self, fab: &Fab) -> AllocationResult<()> {
        let tables = self.shared.tables.read().map_err(poisoned)?;
        Self::stage_update(&tables.fabs, &mut self.staged.fabs, EntityKind::Fab, fab.id.get(), fab)
    }

    async fn delete_fab(&mut self, id: FabId) -> AllocationResult<()> {
        let tables = self.shared.tables.read().map_err(poisoned)?;
        Self::stage_delete(&tables.fabs, &mut self.staged.fabs, EntityKind::Fab, id.get())
    }

    async fn room(&mut self, id: RoomId) -> AllocationResult<Option<Room>> {
        let tables = self.committed()?;
        Ok(read_row(&tables.rooms, &self.staged.rooms, id.get()))
    }

    async fn rooms_in_fab(&mut self, fab_id: FabId) -> AllocationResult<Vec<Room>> {
        let tables = self.committed()?;
        Ok(scan_rows(&tables.rooms, &self.staged.rooms, |r| r.fab_id == fab_id))
    }

    async fn insert_room(&mut self, fab_id: FabId, room: NewRoom) -> AllocationResult<Room> {
        let now = Utc::now();
        let row = Room {
            id: RoomId::new(next_id(&self.shared.sequences.rooms)),
            fab_id,
            name: room.name,
            rack_capacity: room.rack_capacity,
            rack_count: 0,
            height: room.height,
            created_at: now,
            updated_at: now,
        };
        self.staged.rooms.insert(row.id.get(), Some(row.clone()));
        Ok(row)
    }

    async fn save_room(&mut self, room: &Room) -> AllocationResult<()> {
        let tables = self.shared.tables.read().map_err(poisoned)?;
        Self::stage_update(
            &tables.rooms,
            &mut self.staged.rooms,
            EntityKind::Room,
            room.id.get(),
            room,
        )
    }

    async fn delete_room(&mut self, id: RoomId) -> AllocationResult<()> {
        let tables = self.shared.tables.read().map_err(poisoned)?;
        Self::stage_delete(&tables.rooms, &mut self.staged.rooms, EntityKind::Room, id.get())
    }

    async fn rack(&mut self, id: RackId) -> AllocationResult<Option<Rack>> {
        let tables = self.committed()?;
        Ok(read_row(&tables.racks, &self.staged.racks, id.get()))
    }

    async fn racks_in_room(&mut self, room_id: RoomId) -> AllocationResult<Vec<Rack>> {
        let tables = self.committed()?;
        Ok(scan_rows(&tables.racks, &self.staged.racks, |r| r.room_id == room_id))
    }

    async fn insert_rack(&mut self, room: &Room, rack: NewRack) -> AllocationResult<Rack> {
        let now = Utc::now();
        let row = Rack {
            id: RackId::new(next_id(&self.shared.sequences.racks)),
            fab_id: room.fab_id,
            room_id: room.id,
            name: rack.name,
            service: rack.service,
            height: rack.height,
            max_empty: rack.height,
            slot_revision: 0,
            max_empty_revision: 0,
            slots_changed_at: now,
            max_empty_at: now,
            created_at: now,
            updated_at: now,
        };
        self.staged.racks.insert(row.id.get(), Some(row.clone()));
        Ok(row)
    }

    async fn save_rack(&mut self, rack: &Rack) -> AllocationResult<()> {
        let tables = self.shared.tables.read().map_err(poisoned)?;
        Self::stage_update(
            &tables.racks,
            &mut self.staged.racks,
            EntityKind::Rack,
            rack.id.get(),
            rack,
        )
    }

    async fn delete_rack(&mut self, id: RackId) -> AllocationResult<()> {
        let tables = self.shared.tables.read().map_err(poisoned)?;
        Self::stage_delete(&tables.racks, &mut self.staged.racks, EntityKind::Rack, id.get())
    }

    async fn server(&mut self, id: ServerId) -> AllocationResult<Option<Server>> {
        let tables = self.committed()?;
        Ok(read_row(&tables.servers, &self.staged.servers, id.get()))
    }

    async fn servers_in_rack(&mut self, rack_id: RackId) -> AllocationResult<Vec<Server>> {
        let tables = self.committed()?;
        Ok(scan_rows(&tables.servers, &self.staged.servers, |s| {
            s.rack_id == rack_id
        }))
    }

    async fn servers_by_health(&mut self, healthy: bool) -> AllocationResult<Vec<Server>> {
        let tables = self.committed()?;
        Ok(scan_rows(&tables.servers, &self.staged.servers, |s| {
            s.healthy == healthy
        }))
    }

    async fn insert_server(&mut self, server: NewServer) -> AllocationResult<Server> {
        {
            let tables = self.committed()?;
            let taken = scan_rows(&tables.servers, &self.staged.servers, |s| s.name == server.name);
            if !taken.is_empty() {
                return Err(AllocationError::Conflict(format!(
                    "server name {} already exists",
                    server.name
                )));
            }
        }
        let now = Utc::now();
        let row = Server {
            id: ServerId::new(next_id(&self.shared.sequences.servers)),
            name: server.name,
            service: server.service,
            fab_id: server.fab_id,
            room_id: server.room_id,
            rack_id: server.rack_id,
            slot: server.slot,
            assignment: Some(server.assignment),
            healthy: true,
            created_at: now,
            updated_at: now,
        };
        self.staged.servers.insert(row.id.get(), Some(row.clone()));
        Ok(row)
    }

    async fn save_server(&mut self, server: &Server) -> AllocationResult<()> {
        let tables = self.shared.tables.read().map_err(poisoned)?;
        Self::stage_update(
            &tables.servers,
            &mut self.staged.servers,
            EntityKind::Server,
            server.id.get(),
            server,
        )
    }

    async fn delete_server(&mut self, id: ServerId) -> AllocationResult<()> {
        let tables = self.shared.tables.read().map_err(poisoned)?;
        Self::stage_delete(
            &tables.servers,
            &mut self.staged.servers,
            EntityKind::Server,
            id.get(),
        )
    }

    async fn commit(self: Box<Self>) -> AllocationResult<()> {
        let MemoryTransaction { shared, staged } = *self;
        let writes = staged.len();
        let mut tables = shared.tables.write().map_err(poisoned)?;

        Self::check_unique(&tables, &staged)?;

        apply(&mut tables.pools, staged.pools);
        apply(&mut tables.fabs, staged.fabs);
        apply(&mut tables.rooms, staged.rooms);
        apply(&mut tables.racks, staged.racks);
        apply(&mut tables.servers, staged.servers);

        debug!("Committed {} staged row writes", writes);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AllocationResult<()> {
        debug!("Rolled back {} staged row writes", self.staged.len());
        Ok(())
    }
}
