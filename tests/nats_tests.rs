// Copyright (c) 2025 - Cowboy AI, Inc.
//! Publishing allocation events to a live NATS server
//!
//! Run with: NATS_URL=nats://localhost:4222 cargo test --test nats_tests -- --ignored

use cim_dcim_allocation::config::AllocationConfig;
use cim_dcim_allocation::domain::CidrBlock;
use cim_dcim_allocation::events::{EventEnvelope, EventSink};
use cim_dcim_allocation::nats::{NatsClient, NatsConfig};
use cim_dcim_allocation::service::AllocationServices;
use cim_dcim_allocation::store::MemoryStore;
use cim_dcim_allocation::subjects::{AggregateType, SubjectBuilder};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

fn nats_url() -> String {
    std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string())
}

/// User Story: allocation events on the message bus
///
/// As an operator
/// I want every committed allocation published to NATS
/// So that downstream inventories can follow along
///
/// Acceptance Criteria:
/// - Assignments arrive on `{root}.ipam.assigned`
/// - The payload is a versioned envelope
#[tokio::test]
#[ignore = "requires a running NATS server"]
async fn test_assignment_reaches_subscriber() -> Result<(), Box<dyn std::error::Error>> {
    // Given a subscriber on a private root
    let root = format!("dcim-test-{}", uuid::Uuid::now_v7().simple());
    let client = NatsClient::new(NatsConfig::with_server(nats_url())).await?;
    let mut subscriber = client
        .subscribe(
            &SubjectBuilder::new()
                .root(root.clone())
                .aggregate(AggregateType::Ipam)
                .build_wildcard(),
        )
        .await?;

    // When a pool is created and an address assigned
    let services = AllocationServices::with_events(
        Arc::new(MemoryStore::new()),
        AllocationConfig::default(),
        EventSink::new(Arc::new(client.clone()), root.clone()),
    );
    services
        .pools
        .create_pool("web", CidrBlock::new("10.0.0.0/29")?)
        .await?;
    services.pools.assign("web").await?;
    client.flush().await?;

    // Then both events arrive in order
    let mut subjects = Vec::new();
    for _ in 0..2 {
        let message = tokio::time::timeout(Duration::from_secs(5), subscriber.next())
            .await?
            .ok_or("subscription closed")?;
        let envelope: EventEnvelope = serde_json::from_slice(&message.payload)?;
        assert_eq!(envelope.event_version, 1);
        subjects.push(message.subject.to_string());
    }
    assert_eq!(
        subjects,
        vec![format!("{root}.ipam.created"), format!("{root}.ipam.assigned")]
    );
    Ok(())
}

#[tokio::test]
async fn test_unreachable_server_is_publish_error() {
    let config = NatsConfig {
        connect_timeout: Duration::from_millis(200),
        ..NatsConfig::with_server("nats://127.0.0.1:1")
    };
    let result = tokio::time::timeout(Duration::from_secs(5), NatsClient::new(config)).await;
    if let Ok(connected) = result {
        assert!(connected.is_err());
    }
}
