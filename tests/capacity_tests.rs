// Copyright (c) 2025 - Cowboy AI, Inc.
//! Structural limits of the fab → room → rack hierarchy

mod fixtures;

use cim_dcim_allocation::domain::{EntityKind, NewRack};
use cim_dcim_allocation::errors::AllocationError;
use fixtures::*;
use pretty_assertions::assert_eq;

/// A rejected batch leaves no rack behind
///
/// Acceptance Criteria:
/// - Exceeding the room's rack capacity is `CapacityExceeded`
/// - A rack taller than the room is `HeightExceeded`
/// - Neither writes any rack row nor moves the room counter
#[tokio::test]
async fn test_rejected_rack_batch_writes_nothing() {
    let s = services();
    let (_, room) = seed_room(&s, 2).await;

    let over_capacity = s
        .inventory
        .create_racks(
            room.id,
            vec![new_rack("a01", WEB), new_rack("a02", WEB), new_rack("a03", WEB)],
        )
        .await;
    assert_eq!(
        over_capacity,
        Err(AllocationError::CapacityExceeded {
            room: room.id,
            rack_count: 0,
            capacity: 2,
            requested: 3,
        })
    );

    let too_tall = s
        .inventory
        .create_racks(
            room.id,
            vec![
                new_rack("a01", WEB),
                NewRack {
                    name: "a02".to_string(),
                    service: WEB.to_string(),
                    height: RACK_HEIGHT + 1,
                },
            ],
        )
        .await;
    assert!(matches!(too_tall, Err(AllocationError::HeightExceeded { .. })));

    let mut read = s.coordinator().snapshot().await.unwrap();
    assert!(read.racks_in_room(room.id).await.unwrap().is_empty());
    assert_eq!(read.room(room.id).await.unwrap().unwrap().rack_count, 0);
}

#[tokio::test]
async fn test_capacity_counts_existing_racks() {
    let s = services();
    let (_, room) = seed_room(&s, 2).await;
    s.inventory
        .create_racks(room.id, vec![new_rack("a01", WEB)])
        .await
        .unwrap();

    assert!(matches!(
        s.inventory
            .create_racks(room.id, vec![new_rack("a02", WEB), new_rack("a03", WEB)])
            .await,
        Err(AllocationError::CapacityExceeded { rack_count: 1, .. })
    ));
    assert!(s
        .inventory
        .create_racks(room.id, vec![new_rack("a02", WEB)])
        .await
        .is_ok());
}

#[tokio::test]
async fn test_deletes_require_empty_children() {
    let s = services();
    let (fab, room) = seed_room(&s, 2).await;
    let rack = s
        .inventory
        .create_racks(room.id, vec![new_rack("a01", WEB)])
        .await
        .unwrap()
        .remove(0);
    s.pools.create_pool(WEB, cidr("10.0.0.0/29")).await.unwrap();
    let server = place(&s, &rack, "web-1", slot(0, 1)).await.unwrap();

    assert!(matches!(
        s.inventory.delete_fab(fab.id).await,
        Err(AllocationError::NotEmpty {
            kind: EntityKind::Fab,
            child: EntityKind::Room,
            ..
        })
    ));
    assert!(matches!(
        s.inventory.delete_room(room.id).await,
        Err(AllocationError::NotEmpty {
            kind: EntityKind::Room,
            ..
        })
    ));
    assert!(matches!(
        s.inventory.delete_rack(rack.id).await,
        Err(AllocationError::NotEmpty {
            kind: EntityKind::Rack,
            remaining: 1,
            ..
        })
    ));

    // Tear down bottom-up
    s.inventory.remove_server(server.id).await.unwrap();
    s.inventory.delete_rack(rack.id).await.unwrap();
    s.inventory.delete_room(room.id).await.unwrap();
    s.inventory.delete_fab(fab.id).await.unwrap();

    let mut read = s.coordinator().snapshot().await.unwrap();
    assert!(read.fabs().await.unwrap().is_empty());
    assert_eq!(s.coordinator().locks().active(), 0);
}

#[tokio::test]
async fn test_delete_rack_frees_room_position() {
    let s = services();
    let (_, room) = seed_room(&s, 1).await;
    let rack = s
        .inventory
        .create_racks(room.id, vec![new_rack("a01", WEB)])
        .await
        .unwrap()
        .remove(0);

    s.inventory.delete_rack(rack.id).await.unwrap();
    assert!(s
        .inventory
        .create_racks(room.id, vec![new_rack("a02", WEB)])
        .await
        .is_ok());
}

#[tokio::test]
async fn test_rooms_need_existing_fab() {
    let s = services();
    assert!(matches!(
        s.inventory
            .create_rooms(
                cim_dcim_allocation::domain::FabId::new(5),
                vec![new_room("hall", 1)]
            )
            .await,
        Err(AllocationError::NotFound {
            kind: EntityKind::Fab,
            ..
        })
    ));
}
