// Copyright (c) 2025 - Cowboy AI, Inc.
//! Capacity Guard
//!
//! Checks run inside the caller's locked transaction, before any structural
//! row is written. Each check loads what it needs through the transaction
//! and delegates the decision to the pure rules in
//! [`crate::domain::invariants`]; on success it hands back the row it loaded
//! so the caller can update counters in the same transaction.

use crate::domain::invariants::{
    check_fab_empty, check_rack_capacity, check_rack_empty, check_room_empty,
};
use crate::domain::{EntityKind, Fab, FabId, Rack, RackId, Room, RoomId};
use crate::errors::{AllocationError, AllocationResult};
use crate::store::StoreTransaction;

/// Stateless structural-limit checks
pub struct CapacityGuard;

impl CapacityGuard {
    /// Gate for adding one rack per entry of `candidate_heights` to a room
    ///
    /// Caller holds the room lock.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the room does not exist
    /// - `CapacityExceeded` if the room lacks free positions
    /// - `HeightExceeded` if any rack is taller than the room
    pub async fn before_create_racks(
        tx: &mut dyn StoreTransaction,
        room_id: RoomId,
        candidate_heights: &[u32],
    ) -> AllocationResult<Room> {
        let room = tx
            .room(room_id)
            .await?
            .ok_or_else(|| AllocationError::not_found(EntityKind::Room, room_id))?;
        check_rack_capacity(&room, candidate_heights)?;
        Ok(room)
    }

    /// Gate for adding `count` rooms to a fab
    ///
    /// There is no room cap; the check exists so the fab is loaded, and its
    /// room counter updated, in the same transaction as the inserts.
    pub async fn before_create_rooms(
        tx: &mut dyn StoreTransaction,
        fab_id: FabId,
        count: usize,
    ) -> AllocationResult<Fab> {
        if count == 0 {
            return Err(AllocationError::InvalidInput(
                "at least one room must be requested".to_string(),
            ));
        }
        tx.fab(fab_id)
            .await?
            .ok_or_else(|| AllocationError::not_found(EntityKind::Fab, fab_id))
    }

    /// Gate for deleting a room: it must hold no racks
    pub async fn before_delete_room(
        tx: &mut dyn StoreTransaction,
        room_id: RoomId,
    ) -> AllocationResult<Room> {
        let room = tx
            .room(room_id)
            .await?
            .ok_or_else(|| AllocationError::not_found(EntityKind::Room, room_id))?;
        let racks = tx.racks_in_room(room_id).await?;
        check_room_empty(&room, racks.len())?;
        Ok(room)
    }

    /// Gate for deleting a rack: it must hold no servers
    pub async fn before_delete_rack(
        tx: &mut dyn StoreTransaction,
        rack_id: RackId,
    ) -> AllocationResult<Rack> {
        let rack = tx
            .rack(rack_id)
            .await?
            .ok_or_else(|| AllocationError::not_found(EntityKind::Rack, rack_id))?;
        let servers = tx.servers_in_rack(rack_id).await?;
        check_rack_empty(&rack, servers.len())?;
        Ok(rack)
    }

    /// Gate for deleting a fab: it must hold no rooms
    pub async fn before_delete_fab(
        tx: &mut dyn StoreTransaction,
        fab_id: FabId,
    ) -> AllocationResult<Fab> {
        let fab = tx
            .fab(fab_id)
            .await?
            .ok_or_else(|| AllocationError::not_found(EntityKind::Fab, fab_id))?;
        let rooms = tx.rooms_in_fab(fab_id).await?;
        check_fab_empty(&fab, rooms.len())?;
        Ok(fab)
    }
}
