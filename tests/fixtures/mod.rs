// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-dcim-allocation
//!
//! Builds service stacks over a fresh `MemoryStore` and seeds small
//! inventories. Every test gets its own store and lock table.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use cim_dcim_allocation::config::AllocationConfig;
use cim_dcim_allocation::domain::{
    CidrBlock, Fab, NewRack, NewRoom, Rack, Room, Server, SlotRange,
};
use cim_dcim_allocation::errors::AllocationResult;
use cim_dcim_allocation::events::{EventEnvelope, EventPublisher, EventSink};
use cim_dcim_allocation::service::{AllocationServices, PlaceServer};
use cim_dcim_allocation::store::MemoryStore;

pub const WEB: &str = "web";
pub const DB: &str = "db";
pub const RACK_HEIGHT: u32 = 42;

/// Publisher that keeps every published subject in memory
#[derive(Default)]
pub struct RecordingPublisher {
    seen: Mutex<Vec<(String, EventEnvelope)>>,
}

impl RecordingPublisher {
    pub fn subjects(&self) -> Vec<String> {
        self.seen
            .lock()
            .map(|seen| seen.iter().map(|(subject, _)| subject.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, subject: &str, envelope: &EventEnvelope) -> AllocationResult<()> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((subject.to_string(), envelope.clone()));
        }
        Ok(())
    }
}

pub fn services() -> AllocationServices {
    AllocationServices::new(Arc::new(MemoryStore::new()), AllocationConfig::default())
}

pub fn recorded_services() -> (AllocationServices, Arc<RecordingPublisher>) {
    let recorder = Arc::new(RecordingPublisher::default());
    let services = AllocationServices::with_events(
        Arc::new(MemoryStore::new()),
        AllocationConfig::default(),
        EventSink::new(recorder.clone(), "infrastructure"),
    );
    (services, recorder)
}

pub fn cidr(block: &str) -> CidrBlock {
    CidrBlock::new(block).expect("Invalid CIDR in test fixture")
}

pub fn slot(front: u32, back: u32) -> SlotRange {
    SlotRange::new(front, back).expect("Invalid slot in test fixture")
}

pub fn new_room(name: &str, rack_capacity: u32) -> NewRoom {
    NewRoom {
        name: name.to_string(),
        rack_capacity,
        height: RACK_HEIGHT,
    }
}

pub fn new_rack(name: &str, service: &str) -> NewRack {
    NewRack {
        name: name.to_string(),
        service: service.to_string(),
        height: RACK_HEIGHT,
    }
}

/// One fab with one room of `rack_capacity` positions
pub async fn seed_room(services: &AllocationServices, rack_capacity: u32) -> (Fab, Room) {
    let fab = services
        .inventory
        .create_fab("dc1")
        .await
        .expect("fab fixture");
    let room = services
        .inventory
        .create_rooms(fab.id, vec![new_room("hall-a", rack_capacity)])
        .await
        .expect("room fixture")
        .remove(0);
    (fab, room)
}

/// One fab, one room and one 42U rack serving `service`
pub async fn seed_rack(services: &AllocationServices, service: &str) -> Rack {
    let (_, room) = seed_room(services, 4).await;
    services
        .inventory
        .create_racks(room.id, vec![new_rack("a01", service)])
        .await
        .expect("rack fixture")
        .remove(0)
}

pub async fn place(
    services: &AllocationServices,
    rack: &Rack,
    name: &str,
    at: SlotRange,
) -> AllocationResult<Server> {
    services
        .inventory
        .place_server(PlaceServer {
            name: name.to_string(),
            service: rack.service.clone(),
            rack_id: rack.id,
            slot: at,
        })
        .await
}
