// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory manifests
//!
//! A manifest describes an inventory to build (pools, fabs with their rooms
//! and racks) and a list of servers to place. Applying it drives the public
//! services in hierarchy order and reports what fit.
//!
//! ```json
//! {
//!   "pools": [{ "service": "web", "cidr": "10.0.0.0/24" }],
//!   "fabs": [{
//!     "name": "dc1",
//!     "rooms": [{
//!       "name": "hall-a", "rack_capacity": 10, "height": 42,
//!       "racks": [{ "name": "a01", "service": "web", "height": 42 }]
//!     }]
//!   }],
//!   "placements": [{
//!     "name": "web-1", "service": "web",
//!     "fab": "dc1", "room": "hall-a", "rack": "a01",
//!     "slot": { "front": 0, "back": 1 }
//!   }]
//! }
//! ```
//!
//! Structural errors (overlapping pools, rooms over capacity) abort the
//! apply. Placement errors are collected into the report instead.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use tracing::{info, warn};

use crate::domain::{CidrBlock, NewRack, NewRoom, PoolId, RackId, ServerId, SlotRange};
use crate::errors::{AllocationError, AllocationResult};
use crate::service::{AllocationServices, PlaceServer};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryManifest {
    #[serde(default)]
    pub pools: Vec<PoolSpec>,
    #[serde(default)]
    pub fabs: Vec<FabSpec>,
    #[serde(default)]
    pub placements: Vec<PlacementSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSpec {
    pub service: String,
    pub cidr: CidrBlock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabSpec {
    pub name: String,
    #[serde(default)]
    pub rooms: Vec<RoomSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSpec {
    pub name: String,
    pub rack_capacity: u32,
    pub height: u32,
    #[serde(default)]
    pub racks: Vec<NewRack>,
}

/// A server to place, addressed by fab, room and rack names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementSpec {
    pub name: String,
    pub service: String,
    pub fab: String,
    pub room: String,
    pub rack: String,
    pub slot: SlotRange,
}

/// Outcome of applying a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementReport {
    pub placed: Vec<PlacedServer>,
    pub failures: Vec<PlacementFailure>,
    pub racks: Vec<RackUsage>,
    pub pools: Vec<PoolUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedServer {
    pub server_id: ServerId,
    pub name: String,
    pub rack_id: RackId,
    pub slot: SlotRange,
    pub address: IpAddr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementFailure {
    pub name: String,
    pub error: String,
}

/// Largest free run of one rack after placement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RackUsage {
    pub rack_id: RackId,
    pub path: String,
    pub height: u32,
    pub max_empty: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolUsage {
    pub pool_id: PoolId,
    pub service: String,
    pub cidr: CidrBlock,
    pub used: usize,
    /// Usable hosts still free, saturating at `u64::MAX`
    pub free: u64,
}

impl InventoryManifest {
    pub fn from_json(json: &str) -> AllocationResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build the inventory and place every requested server
    pub async fn apply(&self, services: &AllocationServices) -> AllocationResult<PlacementReport> {
        for pool in &self.pools {
            services.pools.create_pool(&pool.service, pool.cidr).await?;
        }

        let mut racks: HashMap<(String, String, String), RackId> = HashMap::new();
        let mut rack_order = Vec::new();
        for fab_spec in &self.fabs {
            let fab = services.inventory.create_fab(&fab_spec.name).await?;
            if fab_spec.rooms.is_empty() {
                continue;
            }

            let new_rooms = fab_spec
                .rooms
                .iter()
                .map(|room| NewRoom {
                    name: room.name.clone(),
                    rack_capacity: room.rack_capacity,
                    height: room.height,
                })
                .collect();
            let rooms = services.inventory.create_rooms(fab.id, new_rooms).await?;

            for (room, room_spec) in rooms.iter().zip(&fab_spec.rooms) {
                if room_spec.racks.is_empty() {
                    continue;
                }
                let created = services
                    .inventory
                    .create_racks(room.id, room_spec.racks.clone())
                    .await?;
                for rack in created {
                    let key = (fab.name.clone(), room.name.clone(), rack.name.clone());
                    rack_order.push((format!("{}/{}/{}", key.0, key.1, key.2), rack.id));
                    racks.insert(key, rack.id);
                }
            }
        }

        let mut report = PlacementReport::default();
        for placement in &self.placements {
            let key = (
                placement.fab.clone(),
                placement.room.clone(),
                placement.rack.clone(),
            );
            let Some(&rack_id) = racks.get(&key) else {
                report.failures.push(PlacementFailure {
                    name: placement.name.clone(),
                    error: format!(
                        "rack {}/{}/{} is not in the manifest",
                        key.0, key.1, key.2
                    ),
                });
                continue;
            };

            let request = PlaceServer {
                name: placement.name.clone(),
                service: placement.service.clone(),
                rack_id,
                slot: placement.slot,
            };
            let placed = services
                .inventory
                .place_server(request)
                .await
                .and_then(|server| {
                    let assignment = server.assignment.ok_or_else(|| {
                        AllocationError::InvariantViolation(format!(
                            "placed server {} holds no address",
                            server.id
                        ))
                    })?;
                    Ok(PlacedServer {
                        server_id: server.id,
                        name: server.name,
                        rack_id: server.rack_id,
                        slot: server.slot,
                        address: assignment.address,
                    })
                });
            match placed {
                Ok(server) => report.placed.push(server),
                Err(e) => {
                    warn!("Could not place {}: {}", placement.name, e);
                    report.failures.push(PlacementFailure {
                        name: placement.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        for (path, rack_id) in rack_order {
            let max_empty = services.slots.compute_max_empty(rack_id).await?;
            let rack = services.inventory.rack(rack_id).await?;
            report.racks.push(RackUsage {
                rack_id,
                path,
                height: rack.height,
                max_empty,
            });
        }

        for pool in services.pools.list_all_pools().await? {
            report.pools.push(PoolUsage {
                pool_id: pool.id,
                service: pool.service.clone(),
                cidr: pool.cidr,
                used: pool.used_addresses.len(),
                free: u64::try_from(pool.free_count()).unwrap_or(u64::MAX),
            });
        }

        info!(
            "Manifest applied: {} placed, {} failed",
            report.placed.len(),
            report.failures.len()
        );
        Ok(report)
    }
}
