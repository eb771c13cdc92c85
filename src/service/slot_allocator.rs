// Copyright (c) 2025 - Cowboy AI, Inc.
//! Slot Allocator
//!
//! Rack unit reservations, server moves and the cached largest free run.
//!
//! Slots are closed ranges of rack units; `[0, 1]` and `[1, 2]` collide.
//! Every check runs under the rack lock so the occupant list read for the
//! overlap test is still true when the caller writes.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::lock_server_in_rack;
use crate::config::AllocationConfig;
use crate::coordination::{ConcurrencyCoordinator, LockKey};
use crate::domain::invariants::check_slot_placement;
use crate::domain::{max_free_run, EntityKind, Rack, RackId, Server, ServerId, SlotRange};
use crate::errors::{AllocationError, AllocationResult};
use crate::events::{AllocationEvent, EventSink};
use crate::store::StoreTransaction;

#[derive(Clone)]
pub struct SlotAllocator {
    coordinator: ConcurrencyCoordinator,
    config: Arc<AllocationConfig>,
    events: EventSink,
}

impl SlotAllocator {
    pub fn new(
        coordinator: ConcurrencyCoordinator,
        config: Arc<AllocationConfig>,
        events: EventSink,
    ) -> Self {
        Self {
            coordinator,
            config,
            events,
        }
    }

    /// Check that `slot` is free for `service` in the rack
    ///
    /// Runs under the rack lock and writes nothing; placing a server into the
    /// slot is [`InventoryService::place_server`](super::InventoryService::place_server).
    ///
    /// # Errors
    ///
    /// - `NotFound` if the rack does not exist
    /// - `IncompatibleService` if the rack hosts another service
    /// - `InvalidInput` if the slot does not fit the rack
    /// - `SlotConflict` if the slot overlaps an occupied one
    pub async fn reserve(
        &self,
        rack_id: RackId,
        service: &str,
        slot: SlotRange,
    ) -> AllocationResult<()> {
        let requested = service.to_string();
        self.coordinator
            .with_entity_lock(EntityKind::Rack, rack_id.get(), move |tx| {
                Box::pin(async move {
                    Self::check_within(tx, rack_id, &requested, &slot, None).await?;
                    Ok::<_, AllocationError>(())
                })
            })
            .await
            .map_err(|e| {
                debug!("Slot {} in rack {} refused: {}", slot, rack_id, e);
                e
            })?;

        self.events
            .emit(AllocationEvent::SlotReserved {
                rack_id,
                service: service.to_string(),
                slot,
            })
            .await;
        Ok(())
    }

    /// Slot checks against a rack, inside a transaction whose caller holds
    /// the rack lock
    ///
    /// `exclude` names a server whose own slot does not count as occupied.
    pub async fn check_within(
        tx: &mut dyn StoreTransaction,
        rack_id: RackId,
        service: &str,
        slot: &SlotRange,
        exclude: Option<ServerId>,
    ) -> AllocationResult<Rack> {
        let rack = tx
            .rack(rack_id)
            .await?
            .ok_or_else(|| AllocationError::not_found(EntityKind::Rack, rack_id))?;
        let occupants = tx.servers_in_rack(rack_id).await?;
        check_slot_placement(&rack, service, slot, &occupants, exclude)?;
        Ok(rack)
    }

    /// Move a server to `slot` of `new_rack_id`, serving `new_service`
    ///
    /// Source rack, destination rack and server are locked together. If the
    /// server changes racks between reading it and locking, the attempt is
    /// retried up to `move_retry_limit` times.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the server or destination rack does not exist
    /// - `Conflict` if the server kept moving under concurrent updates
    /// - the slot errors of [`reserve`](Self::reserve)
    pub async fn move_server(
        &self,
        server_id: ServerId,
        new_rack_id: RackId,
        new_service: &str,
        slot: SlotRange,
    ) -> AllocationResult<Server> {
        let (mut scope, current) = lock_server_in_rack(
            &self.coordinator,
            server_id,
            &[LockKey::rack(new_rack_id)],
            self.config.move_retry_limit,
        )
        .await?;
        let from_rack = current.rack_id;

        let result: AllocationResult<Server> = async {
            let tx = scope.tx();
            let mut target =
                Self::check_within(tx, new_rack_id, new_service, &slot, Some(server_id)).await?;

            let now = Utc::now();
            let mut moved = current;
            moved.rack_id = target.id;
            moved.room_id = target.room_id;
            moved.fab_id = target.fab_id;
            moved.service = new_service.to_string();
            moved.slot = slot;
            moved.updated_at = now;
            tx.save_server(&moved).await?;

            if from_rack != target.id {
                let mut source = tx
                    .rack(from_rack)
                    .await?
                    .ok_or_else(|| AllocationError::not_found(EntityKind::Rack, from_rack))?;
                source.touch_slots(now);
                tx.save_rack(&source).await?;
            }
            target.touch_slots(now);
            tx.save_rack(&target).await?;
            Ok(moved)
        }
        .await;

        let moved = scope.finish(result).await.map_err(|e| {
            warn!("Move of server {} to rack {} failed: {}", server_id, new_rack_id, e);
            e
        })?;

        info!(
            "Moved server {} from rack {} to rack {} slot {}",
            moved.id, from_rack, moved.rack_id, moved.slot
        );
        self.events
            .emit(AllocationEvent::ServerMoved {
                server_id: moved.id,
                from_rack,
                to_rack: moved.rack_id,
                slot: moved.slot,
            })
            .await;
        Ok(moved)
    }

    /// Largest contiguous free run of units in the rack
    ///
    /// Served from the rack's cache while no slot changed since the last
    /// computation; otherwise recomputed and written back.
    pub async fn compute_max_empty(&self, rack_id: RackId) -> AllocationResult<u32> {
        let (max_empty, recomputed) = self
            .coordinator
            .with_entity_lock(EntityKind::Rack, rack_id.get(), move |tx| {
                Box::pin(async move {
                    let mut rack = tx
                        .rack(rack_id)
                        .await?
                        .ok_or_else(|| AllocationError::not_found(EntityKind::Rack, rack_id))?;
                    if !rack.max_empty_is_stale() {
                        return Ok((rack.max_empty, false));
                    }

                    let slots: Vec<SlotRange> = tx
                        .servers_in_rack(rack_id)
                        .await?
                        .iter()
                        .map(|server| server.slot)
                        .collect();
                    rack.max_empty = max_free_run(rack.height, &slots);
                    rack.max_empty_revision = rack.slot_revision;
                    rack.max_empty_at = Utc::now();
                    tx.save_rack(&rack).await?;
                    Ok::<_, AllocationError>((rack.max_empty, true))
                })
            })
            .await?;

        if recomputed {
            debug!("Rack {} max empty recomputed as {}", rack_id, max_empty);
            self.events
                .emit(AllocationEvent::MaxEmptyRecomputed { rack_id, max_empty })
                .await;
        }
        Ok(max_empty)
    }
}
