// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory Service
//!
//! Structural changes to the fab → room → rack hierarchy and the server
//! lifecycle. Each operation takes its locks in hierarchy order, consults
//! [`CapacityGuard`] before writing, and keeps the parent's counter in step
//! with its children inside the same transaction.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::address_pool::AddressPoolRegistry;
use super::capacity::CapacityGuard;
use super::lock_server_in_rack;
use super::slot_allocator::SlotAllocator;
use crate::config::AllocationConfig;
use crate::coordination::{ConcurrencyCoordinator, LockKey};
use crate::domain::invariants::{validate_name, validate_new_rack, validate_new_room};
use crate::domain::{
    Assignment, EntityKind, Fab, FabId, NewFab, NewRack, NewRoom, NewServer, Rack, RackId, Room,
    RoomId, Server, ServerId, SlotRange,
};
use crate::errors::{AllocationError, AllocationResult};
use crate::events::{AllocationEvent, EventSink};

/// Request to put a new server into a rack slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceServer {
    pub name: String,
    pub service: String,
    pub rack_id: RackId,
    pub slot: SlotRange,
}

#[derive(Clone)]
pub struct InventoryService {
    coordinator: ConcurrencyCoordinator,
    pools: AddressPoolRegistry,
    config: Arc<AllocationConfig>,
    events: EventSink,
}

impl InventoryService {
    pub fn new(
        coordinator: ConcurrencyCoordinator,
        pools: AddressPoolRegistry,
        config: Arc<AllocationConfig>,
        events: EventSink,
    ) -> Self {
        Self {
            coordinator,
            pools,
            config,
            events,
        }
    }

    /// Create a fab; names are unique
    pub async fn create_fab(&self, name: &str) -> AllocationResult<Fab> {
        validate_name(EntityKind::Fab, name)?;
        let name = name.to_string();

        let fab = self
            .coordinator
            .with_entity_lock(EntityKind::Fab, 0, move |tx| {
                Box::pin(async move { tx.insert_fab(NewFab { name }).await })
            })
            .await?;

        info!("Created fab {} ({})", fab.id, fab.name);
        self.events
            .emit(AllocationEvent::FabCreated {
                fab_id: fab.id,
                name: fab.name.clone(),
            })
            .await;
        Ok(fab)
    }

    /// Delete a fab that has no rooms left
    pub async fn delete_fab(&self, fab_id: FabId) -> AllocationResult<()> {
        self.coordinator
            .with_entity_lock(EntityKind::Fab, fab_id.get(), move |tx| {
                Box::pin(async move {
                    CapacityGuard::before_delete_fab(tx, fab_id).await?;
                    tx.delete_fab(fab_id).await
                })
            })
            .await?;

        info!("Deleted fab {}", fab_id);
        self.events
            .emit(AllocationEvent::FabDeleted { fab_id })
            .await;
        Ok(())
    }

    /// Add rooms to a fab in one transaction
    ///
    /// Either every room is created and `room_count` grows by their number,
    /// or nothing is written.
    pub async fn create_rooms(
        &self,
        fab_id: FabId,
        rooms: Vec<NewRoom>,
    ) -> AllocationResult<Vec<Room>> {
        for room in &rooms {
            validate_new_room(room)?;
        }

        let created = self
            .coordinator
            .with_entity_lock(EntityKind::Fab, fab_id.get(), move |tx| {
                Box::pin(async move {
                    let mut fab = CapacityGuard::before_create_rooms(tx, fab_id, rooms.len()).await?;

                    let mut created = Vec::with_capacity(rooms.len());
                    for room in rooms {
                        created.push(tx.insert_room(fab_id, room).await?);
                    }

                    fab.room_count += created.len() as u32;
                    fab.updated_at = Utc::now();
                    tx.save_fab(&fab).await?;
                    Ok::<_, AllocationError>(created)
                })
            })
            .await?;

        info!("Created {} room(s) in fab {}", created.len(), fab_id);
        self.events
            .emit(AllocationEvent::RoomsCreated {
                fab_id,
                room_ids: created.iter().map(|room| room.id).collect(),
            })
            .await;
        Ok(created)
    }

    /// Delete a room that has no racks left
    pub async fn delete_room(&self, room_id: RoomId) -> AllocationResult<()> {
        let fab_id = self
            .coordinator
            .snapshot()
            .await?
            .room(room_id)
            .await?
            .ok_or_else(|| AllocationError::not_found(EntityKind::Room, room_id))?
            .fab_id;

        self.coordinator
            .with_entity_locks(
                vec![LockKey::fab(fab_id), LockKey::room(room_id)],
                move |tx| {
                    Box::pin(async move {
                        CapacityGuard::before_delete_room(tx, room_id).await?;
                        tx.delete_room(room_id).await?;

                        let mut fab = tx
                            .fab(fab_id)
                            .await?
                            .ok_or_else(|| AllocationError::not_found(EntityKind::Fab, fab_id))?;
                        fab.room_count = fab.room_count.saturating_sub(1);
                        fab.updated_at = Utc::now();
                        tx.save_fab(&fab).await
                    })
                },
            )
            .await?;

        info!("Deleted room {} of fab {}", room_id, fab_id);
        self.events
            .emit(AllocationEvent::RoomDeleted { fab_id, room_id })
            .await;
        Ok(())
    }

    /// Add racks to a room in one transaction
    ///
    /// # Errors
    ///
    /// - `CapacityExceeded` / `HeightExceeded` from the capacity check, in
    ///   which case no rack is written
    pub async fn create_racks(
        &self,
        room_id: RoomId,
        racks: Vec<NewRack>,
    ) -> AllocationResult<Vec<Rack>> {
        for rack in &racks {
            validate_new_rack(rack)?;
        }
        let heights: Vec<u32> = racks.iter().map(|rack| rack.height).collect();

        let created = self
            .coordinator
            .with_entity_lock(EntityKind::Room, room_id.get(), move |tx| {
                Box::pin(async move {
                    let mut room = CapacityGuard::before_create_racks(tx, room_id, &heights).await?;

                    let mut created = Vec::with_capacity(racks.len());
                    for rack in racks {
                        created.push(tx.insert_rack(&room, rack).await?);
                    }

                    room.rack_count += created.len() as u32;
                    room.updated_at = Utc::now();
                    tx.save_room(&room).await?;
                    Ok::<_, AllocationError>(created)
                })
            })
            .await
            .map_err(|e| {
                warn!("Rack creation in room {} rejected: {}", room_id, e);
                e
            })?;

        info!("Created {} rack(s) in room {}", created.len(), room_id);
        self.events
            .emit(AllocationEvent::RacksCreated {
                room_id,
                rack_ids: created.iter().map(|rack| rack.id).collect(),
            })
            .await;
        Ok(created)
    }

    /// Delete a rack that holds no servers
    pub async fn delete_rack(&self, rack_id: RackId) -> AllocationResult<()> {
        let room_id = self
            .coordinator
            .snapshot()
            .await?
            .rack(rack_id)
            .await?
            .ok_or_else(|| AllocationError::not_found(EntityKind::Rack, rack_id))?
            .room_id;

        self.coordinator
            .with_entity_locks(
                vec![LockKey::room(room_id), LockKey::rack(rack_id)],
                move |tx| {
                    Box::pin(async move {
                        CapacityGuard::before_delete_rack(tx, rack_id).await?;
                        tx.delete_rack(rack_id).await?;

                        let mut room = tx
                            .room(room_id)
                            .await?
                            .ok_or_else(|| AllocationError::not_found(EntityKind::Room, room_id))?;
                        room.rack_count = room.rack_count.saturating_sub(1);
                        room.updated_at = Utc::now();
                        tx.save_room(&room).await
                    })
                },
            )
            .await?;

        info!("Deleted rack {} of room {}", rack_id, room_id);
        self.events
            .emit(AllocationEvent::RackDeleted { room_id, rack_id })
            .await;
        Ok(())
    }

    /// Seat a new server: slot check, address assignment and insert in one
    /// transaction
    ///
    /// The rack lock is held throughout; the pool lock of the assigned
    /// address joins the scope and is held until commit.
    ///
    /// # Errors
    ///
    /// - slot errors as in [`SlotAllocator::reserve`]
    /// - `ResourceExhausted` if the service has no free address
    /// - `Conflict` if the server name is taken
    pub async fn place_server(&self, request: PlaceServer) -> AllocationResult<Server> {
        validate_name(EntityKind::Server, &request.name)?;
        let mut scope = self
            .coordinator
            .scope([LockKey::rack(request.rack_id)])
            .await?;

        let result: AllocationResult<(Server, Assignment)> = async {
            let mut rack = SlotAllocator::check_within(
                scope.tx(),
                request.rack_id,
                &request.service,
                &request.slot,
                None,
            )
            .await?;

            let assignment = self.pools.assign_within(&mut scope, &request.service).await?;

            let tx = scope.tx();
            rack.touch_slots(Utc::now());
            tx.save_rack(&rack).await?;
            let server = tx
                .insert_server(NewServer {
                    name: request.name.clone(),
                    service: request.service.clone(),
                    fab_id: rack.fab_id,
                    room_id: rack.room_id,
                    rack_id: rack.id,
                    slot: request.slot,
                    assignment,
                })
                .await?;
            Ok((server, assignment))
        }
        .await;

        let (server, assignment) = scope.finish(result).await.map_err(|e| {
            warn!(
                "Placing {} in rack {} slot {} failed: {}",
                request.name, request.rack_id, request.slot, e
            );
            e
        })?;

        info!(
            "Placed server {} ({}) in rack {} slot {} with {}",
            server.id, server.name, server.rack_id, server.slot, assignment.address
        );
        self.events
            .emit_all([
                AllocationEvent::AddressAssigned {
                    pool_id: assignment.pool_id,
                    service: server.service.clone(),
                    address: assignment.address,
                },
                AllocationEvent::ServerPlaced {
                    server_id: server.id,
                    name: server.name.clone(),
                    rack_id: server.rack_id,
                    slot: server.slot,
                    pool_id: assignment.pool_id,
                    address: assignment.address,
                },
            ])
            .await;
        Ok(server)
    }

    /// Take a server out: return its address if it still holds one, free its
    /// slot, delete the row
    pub async fn remove_server(&self, server_id: ServerId) -> AllocationResult<Server> {
        let (mut scope, server) = lock_server_in_rack(
            &self.coordinator,
            server_id,
            &[],
            self.config.move_retry_limit,
        )
        .await?;

        let result: AllocationResult<()> = async {
            if let Some(assignment) = server.assignment {
                self.pools.return_to_pool(&mut scope, server.id, assignment).await?;
            }

            let tx = scope.tx();
            tx.delete_server(server.id).await?;
            let mut rack = tx
                .rack(server.rack_id)
                .await?
                .ok_or_else(|| AllocationError::not_found(EntityKind::Rack, server.rack_id))?;
            rack.touch_slots(Utc::now());
            tx.save_rack(&rack).await
        }
        .await;

        scope.finish(result).await.map_err(|e| {
            warn!("Removing server {} failed: {}", server_id, e);
            e
        })?;

        let address = server.assignment.map(|a| a.address);
        match address {
            Some(address) => info!(
                "Removed server {} from rack {}, released {}",
                server.id, server.rack_id, address
            ),
            None => info!("Removed server {} from rack {}", server.id, server.rack_id),
        }
        let released = server.assignment.map(|a| AllocationEvent::AddressReleased {
            pool_id: a.pool_id,
            server_id: server.id,
            address: a.address,
        });
        let removed = AllocationEvent::ServerRemoved {
            server_id: server.id,
            rack_id: server.rack_id,
            address,
        };
        self.events
            .emit_all(released.into_iter().chain(std::iter::once(removed)))
            .await;
        Ok(server)
    }

    /// Flag a server healthy (repaired) or broken
    pub async fn mark_server_health(
        &self,
        server_id: ServerId,
        healthy: bool,
    ) -> AllocationResult<Server> {
        let (server, changed) = self
            .coordinator
            .with_entity_lock(EntityKind::Server, server_id.get(), move |tx| {
                Box::pin(async move {
                    let mut server = tx
                        .server(server_id)
                        .await?
                        .ok_or_else(|| AllocationError::not_found(EntityKind::Server, server_id))?;
                    if server.healthy == healthy {
                        return Ok((server, false));
                    }
                    server.healthy = healthy;
                    server.updated_at = Utc::now();
                    tx.save_server(&server).await?;
                    Ok::<_, AllocationError>((server, true))
                })
            })
            .await?;

        if changed {
            info!(
                "Server {} marked {}",
                server.id,
                if healthy { "healthy" } else { "broken" }
            );
            self.events
                .emit(AllocationEvent::ServerHealthChanged {
                    server_id: server.id,
                    healthy,
                })
                .await;
        }
        Ok(server)
    }

    /// Servers currently marked broken
    pub async fn broken_servers(&self) -> AllocationResult<Vec<Server>> {
        self.coordinator
            .snapshot()
            .await?
            .servers_by_health(false)
            .await
    }

    pub async fn server(&self, server_id: ServerId) -> AllocationResult<Server> {
        self.coordinator
            .snapshot()
            .await?
            .server(server_id)
            .await?
            .ok_or_else(|| AllocationError::not_found(EntityKind::Server, server_id))
    }

    pub async fn rack(&self, rack_id: RackId) -> AllocationResult<Rack> {
        self.coordinator
            .snapshot()
            .await?
            .rack(rack_id)
            .await?
            .ok_or_else(|| AllocationError::not_found(EntityKind::Rack, rack_id))
    }

    pub async fn servers_in_rack(&self, rack_id: RackId) -> AllocationResult<Vec<Server>> {
        self.coordinator
            .snapshot()
            .await?
            .servers_in_rack(rack_id)
            .await
    }
}
