// Copyright (c) 2025 - Cowboy AI, Inc.
//! Placement Planner
//!
//! Dry-run capacity planner: loads an inventory manifest, applies it to a
//! fresh in-memory store and prints the placement report as JSON.
//!
//! Run with: cargo run --bin placement-planner -- manifest.json
//!
//! Environment:
//! - `DCIM_MANIFEST`: manifest path when no argument is given
//! - `DCIM_PUBLISH_EVENTS=true`: publish allocation events to `NATS_URL`
//! - `RUST_LOG`: log filter (default `info`)

use anyhow::{Context, Result};
use cim_dcim_allocation::{
    config::AllocationConfig,
    events::EventSink,
    manifest::InventoryManifest,
    nats::{NatsClient, NatsConfig},
    service::AllocationServices,
    store::MemoryStore,
    telemetry,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let config = AllocationConfig::from_env().context("Invalid DCIM_* configuration")?;
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("DCIM_MANIFEST").ok())
        .context("No manifest given. Pass a path or set DCIM_MANIFEST")?;

    let json = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read manifest {path}"))?;
    let manifest = InventoryManifest::from_json(&json)
        .with_context(|| format!("Failed to parse manifest {path}"))?;
    info!(
        "Loaded manifest {}: {} pool(s), {} fab(s), {} placement(s)",
        path,
        manifest.pools.len(),
        manifest.fabs.len(),
        manifest.placements.len()
    );

    let nats = if config.events.enabled {
        info!("Publishing allocation events to {}", config.events.nats_url);
        let client = NatsClient::new(NatsConfig::with_server(&config.events.nats_url))
            .await
            .context("Failed to connect to NATS")?;
        Some(client)
    } else {
        None
    };
    let events = match &nats {
        Some(client) => EventSink::new(
            Arc::new(client.clone()),
            config.events.subject_root.clone(),
        ),
        None => EventSink::disabled(),
    };

    let services = AllocationServices::with_events(Arc::new(MemoryStore::new()), config, events);
    let report = manifest
        .apply(&services)
        .await
        .context("Failed to build the inventory")?;

    if let Some(client) = &nats {
        client.flush().await.context("Failed to flush events")?;
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.failures.is_empty() {
        info!("{} placement(s) did not fit", report.failures.len());
    }
    Ok(())
}
