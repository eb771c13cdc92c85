// Copyright (c) 2025 - Cowboy AI, Inc.
//! Allocation Domain Events
//!
//! One variant per committed state change. Payloads carry ids and the values
//! that changed, never whole rows.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::domain::{CidrBlock, FabId, PoolId, RackId, RoomId, ServerId, SlotRange};
use crate::subjects::{AggregateType, Operation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AllocationEvent {
    PoolCreated {
        pool_id: PoolId,
        service: String,
        cidr: CidrBlock,
    },
    AddressAssigned {
        pool_id: PoolId,
        service: String,
        address: IpAddr,
    },
    AddressReleased {
        pool_id: PoolId,
        server_id: ServerId,
        address: IpAddr,
    },
    SlotReserved {
        rack_id: RackId,
        service: String,
        slot: SlotRange,
    },
    ServerPlaced {
        server_id: ServerId,
        name: String,
        rack_id: RackId,
        slot: SlotRange,
        pool_id: PoolId,
        address: IpAddr,
    },
    ServerMoved {
        server_id: ServerId,
        from_rack: RackId,
        to_rack: RackId,
        slot: SlotRange,
    },
    /// `address` is `None` when the server's address was released earlier
    ServerRemoved {
        server_id: ServerId,
        rack_id: RackId,
        address: Option<IpAddr>,
    },
    ServerHealthChanged {
        server_id: ServerId,
        healthy: bool,
    },
    MaxEmptyRecomputed {
        rack_id: RackId,
        max_empty: u32,
    },
    FabCreated {
        fab_id: FabId,
        name: String,
    },
    FabDeleted {
        fab_id: FabId,
    },
    RoomsCreated {
        fab_id: FabId,
        room_ids: Vec<RoomId>,
    },
    RoomDeleted {
        fab_id: FabId,
        room_id: RoomId,
    },
    RacksCreated {
        room_id: RoomId,
        rack_ids: Vec<RackId>,
    },
    RackDeleted {
        room_id: RoomId,
        rack_id: RackId,
    },
}

impl AllocationEvent {
    /// Aggregate and operation tokens of the event's subject
    pub fn routing(&self) -> (AggregateType, Operation) {
        use AllocationEvent::*;

        match self {
            PoolCreated { .. } => (AggregateType::Ipam, Operation::Created),
            AddressAssigned { .. } => (AggregateType::Ipam, Operation::Assigned),
            AddressReleased { .. } => (AggregateType::Ipam, Operation::Released),
            SlotReserved { .. } => (AggregateType::Rack, Operation::Reserved),
            MaxEmptyRecomputed { .. } => (AggregateType::Rack, Operation::Recomputed),
            RacksCreated { .. } => (AggregateType::Rack, Operation::Created),
            RackDeleted { .. } => (AggregateType::Rack, Operation::Deleted),
            ServerPlaced { .. } => (AggregateType::Server, Operation::Placed),
            ServerMoved { .. } => (AggregateType::Server, Operation::Moved),
            ServerRemoved { .. } => (AggregateType::Server, Operation::Removed),
            ServerHealthChanged { .. } => (AggregateType::Server, Operation::HealthChanged),
            FabCreated { .. } => (AggregateType::Fab, Operation::Created),
            FabDeleted { .. } => (AggregateType::Fab, Operation::Deleted),
            RoomsCreated { .. } => (AggregateType::Room, Operation::Created),
            RoomDeleted { .. } => (AggregateType::Room, Operation::Deleted),
        }
    }

    /// Get human-readable event type name
    pub fn event_type_name(&self) -> &'static str {
        use AllocationEvent::*;

        match self {
            PoolCreated { .. } => "PoolCreated",
            AddressAssigned { .. } => "AddressAssigned",
            AddressReleased { .. } => "AddressReleased",
            SlotReserved { .. } => "SlotReserved",
            ServerPlaced { .. } => "ServerPlaced",
            ServerMoved { .. } => "ServerMoved",
            ServerRemoved { .. } => "ServerRemoved",
            ServerHealthChanged { .. } => "ServerHealthChanged",
            MaxEmptyRecomputed { .. } => "MaxEmptyRecomputed",
            FabCreated { .. } => "FabCreated",
            FabDeleted { .. } => "FabDeleted",
            RoomsCreated { .. } => "RoomsCreated",
            RoomDeleted { .. } => "RoomDeleted",
            RacksCreated { .. } => "RacksCreated",
            RackDeleted { .. } => "RackDeleted",
        }
    }
}
