// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pure Validation Functions - Inventory Invariants
//!
//! The rules applied before structural mutations of the inventory and before
//! a slot is taken. All functions are pure: they look only at the rows handed
//! to them and never touch a store or a lock.
//!
//! # Invariant Categories
//!
//! 1. **Capacity**: rooms hold at most `rack_capacity` racks, no taller than the room
//! 2. **Emptiness**: fabs, rooms and racks are only deleted once childless
//! 3. **Placement**: slots fit the rack, match its service and never overlap

use crate::domain::{EntityKind, Fab, NewRack, NewRoom, Rack, Room, Server, ServerId, SlotRange};
use crate::errors::{AllocationError, AllocationResult};

/// Validate that `candidate_heights.len()` more racks fit into `room`
///
/// # Rules
/// - `rack_count + count <= rack_capacity`, else `CapacityExceeded`
/// - every candidate height `<= room.height`, else `HeightExceeded`
pub fn check_rack_capacity(room: &Room, candidate_heights: &[u32]) -> AllocationResult<()> {
    let requested = u32::try_from(candidate_heights.len()).unwrap_or(u32::MAX);

    if room.rack_count.saturating_add(requested) > room.rack_capacity {
        return Err(AllocationError::CapacityExceeded {
            room: room.id,
            rack_count: room.rack_count,
            capacity: room.rack_capacity,
            requested,
        });
    }

    if let Some(&height) = candidate_heights.iter().find(|&&h| h > room.height) {
        return Err(AllocationError::HeightExceeded {
            room: room.id,
            height,
            limit: room.height,
        });
    }

    Ok(())
}

pub fn check_fab_empty(fab: &Fab, rooms_remaining: usize) -> AllocationResult<()> {
    if rooms_remaining > 0 {
        return Err(AllocationError::NotEmpty {
            kind: EntityKind::Fab,
            id: fab.id.get(),
            child: EntityKind::Room,
            remaining: rooms_remaining,
        });
    }
    Ok(())
}

pub fn check_room_empty(room: &Room, racks_remaining: usize) -> AllocationResult<()> {
    if racks_remaining > 0 {
        return Err(AllocationError::NotEmpty {
            kind: EntityKind::Room,
            id: room.id.get(),
            child: EntityKind::Rack,
            remaining: racks_remaining,
        });
    }
    Ok(())
}

pub fn check_rack_empty(rack: &Rack, servers_remaining: usize) -> AllocationResult<()> {
    if servers_remaining > 0 {
        return Err(AllocationError::NotEmpty {
            kind: EntityKind::Rack,
            id: rack.id.get(),
            child: EntityKind::Server,
            remaining: servers_remaining,
        });
    }
    Ok(())
}

/// Validate that `slot` can be taken in `rack` by `service`
///
/// # Rules
/// - the rack hosts `service`, else `IncompatibleService`
/// - the slot lies inside `[0, rack.height)`, else `InvalidInput`
/// - the slot overlaps no slot in `occupants` (ignoring `exclude`), else `SlotConflict`
pub fn check_slot_placement(
    rack: &Rack,
    service: &str,
    slot: &SlotRange,
    occupants: &[Server],
    exclude: Option<ServerId>,
) -> AllocationResult<()> {
    if rack.service != service {
        return Err(AllocationError::IncompatibleService {
            rack: rack.id,
            rack_service: rack.service.clone(),
            requested: service.to_string(),
        });
    }

    slot.fit(rack.height)?;

    let clash = occupants
        .iter()
        .filter(|server| Some(server.id) != exclude)
        .find(|server| server.slot.overlaps(slot));

    if let Some(server) = clash {
        return Err(AllocationError::SlotConflict {
            rack: rack.id,
            requested: *slot,
            occupied_by: server.id,
            occupied: server.slot,
        });
    }

    Ok(())
}

/// Validate a display name: non-empty after trimming
pub fn validate_name(kind: EntityKind, name: &str) -> AllocationResult<()> {
    if name.trim().is_empty() {
        return Err(AllocationError::InvalidInput(format!(
            "{kind} name cannot be empty"
        )));
    }
    Ok(())
}

pub fn validate_new_room(room: &NewRoom) -> AllocationResult<()> {
    validate_name(EntityKind::Room, &room.name)?;
    if room.height == 0 {
        return Err(AllocationError::InvalidInput(format!(
            "room {} must be at least one unit tall",
            room.name
        )));
    }
    Ok(())
}

pub fn validate_new_rack(rack: &NewRack) -> AllocationResult<()> {
    validate_name(EntityKind::Rack, &rack.name)?;
    if rack.height == 0 {
        return Err(AllocationError::InvalidInput(format!(
            "rack {} must be at least one unit tall",
            rack.name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Assignment, FabId, PoolId, RackId, RoomId};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn room(rack_capacity: u32, rack_count: u32, height: u32) -> Room {
        let now = Utc::now();
        Room {
            id: RoomId::new(1),
            fab_id: FabId::new(1),
            name: "hall-a".to_string(),
            rack_capacity,
            rack_count,
            height,
            created_at: now,
            updated_at: now,
        }
    }

    fn rack(service: &str, height: u32) -> Rack {
        let now = Utc::now();
        Rack {
            id: RackId::new(5),
            fab_id: FabId::new(1),
            room_id: RoomId::new(1),
            name: "r5".to_string(),
            service: service.to_string(),
            height,
            max_empty: height,
            slot_revision: 0,
            max_empty_revision: 0,
            slots_changed_at: now,
            max_empty_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    fn server(id: u64, front: u32, back: u32) -> Server {
        let now = Utc::now();
        Server {
            id: ServerId::new(id),
            name: format!("srv-{id}"),
            service: "web".to_string(),
            fab_id: FabId::new(1),
            room_id: RoomId::new(1),
            rack_id: RackId::new(5),
            slot: SlotRange::new(front, back).unwrap(),
            assignment: Some(Assignment {
                address: format!("10.0.0.{id}").parse().unwrap(),
                pool_id: PoolId::new(1),
            }),
            healthy: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_rack_capacity_accepts_exact_fit() {
        assert_eq!(check_rack_capacity(&room(4, 2, 42), &[42, 40]), Ok(()));
    }

    #[test]
    fn test_rack_capacity_rejects_overflow() {
        assert_eq!(
            check_rack_capacity(&room(4, 3, 42), &[10, 10]),
            Err(AllocationError::CapacityExceeded {
                room: RoomId::new(1),
                rack_count: 3,
                capacity: 4,
                requested: 2,
            })
        );
    }

    #[test]
    fn test_rack_capacity_rejects_tall_rack() {
        assert_eq!(
            check_rack_capacity(&room(4, 0, 42), &[42, 48]),
            Err(AllocationError::HeightExceeded {
                room: RoomId::new(1),
                height: 48,
                limit: 42,
            })
        );
    }

    #[test]
    fn test_emptiness_checks() {
        assert!(check_room_empty(&room(4, 0, 42), 0).is_ok());
        assert!(matches!(
            check_room_empty(&room(4, 1, 42), 1),
            Err(AllocationError::NotEmpty {
                kind: EntityKind::Room,
                remaining: 1,
                ..
            })
        ));
        assert!(matches!(
            check_rack_empty(&rack("web", 42), 3),
            Err(AllocationError::NotEmpty {
                child: EntityKind::Server,
                ..
            })
        ));
    }

    #[test]
    fn test_slot_placement_rules() {
        let r = rack("web", 42);
        let occupants = vec![server(1, 0, 1)];
        let wanted = SlotRange::new(1, 2).unwrap();

        assert!(matches!(
            check_slot_placement(&r, "db", &wanted, &occupants, None),
            Err(AllocationError::IncompatibleService { .. })
        ));
        assert!(matches!(
            check_slot_placement(&r, "web", &wanted, &occupants, None),
            Err(AllocationError::SlotConflict {
                occupied_by,
                ..
            }) if occupied_by == ServerId::new(1)
        ));
        assert_eq!(
            check_slot_placement(&r, "web", &wanted, &occupants, Some(ServerId::new(1))),
            Ok(())
        );
        assert!(matches!(
            check_slot_placement(&r, "web", &SlotRange::new(41, 42).unwrap(), &[], None),
            Err(AllocationError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_new_room_and_rack_validation() {
        let bad_room = NewRoom {
            name: "hall".to_string(),
            rack_capacity: 1,
            height: 0,
        };
        assert!(validate_new_room(&bad_room).is_err());

        let bad_rack = NewRack {
            name: "  ".to_string(),
            service: "web".to_string(),
            height: 42,
        };
        assert!(validate_new_rack(&bad_rack).is_err());
    }
}
