// Copyright (c) 2025 - Cowboy AI, Inc.
//! Allocation configuration
//!
//! Defaults work out of the box; `from_env` overrides them from `DCIM_*`
//! variables, and the serde form lets the same struct be embedded in a larger
//! JSON configuration.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::{AllocationError, AllocationResult};

/// Settings shared by the allocation services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Largest number of addresses `list_addresses` will enumerate
    pub max_enumerated_addresses: u64,
    /// Attempts at pinning a server's current rack before a move gives up
    pub move_retry_limit: u32,
    /// Allocation event publishing
    pub events: EventsConfig,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_enumerated_addresses: 65_536,
            move_retry_limit: 3,
            events: EventsConfig::default(),
        }
    }
}

/// Where and whether allocation events are published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub enabled: bool,
    pub nats_url: String,
    /// First token of every published subject
    pub subject_root: String,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            nats_url: "nats://localhost:4222".to_string(),
            subject_root: crate::subjects::INFRASTRUCTURE_ROOT.to_string(),
        }
    }
}

impl AllocationConfig {
    /// Load configuration from environment variables
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `DCIM_MAX_ENUMERATED_ADDRESSES` | `max_enumerated_addresses` |
    /// | `DCIM_MOVE_RETRY_LIMIT` | `move_retry_limit` |
    /// | `DCIM_PUBLISH_EVENTS` | `events.enabled` |
    /// | `NATS_URL` | `events.nats_url` |
    /// | `DCIM_SUBJECT_ROOT` | `events.subject_root` |
    pub fn from_env() -> AllocationResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AllocationResult<Self> {
        let defaults = Self::default();

        let max_enumerated_addresses = parse_var(
            &lookup,
            "DCIM_MAX_ENUMERATED_ADDRESSES",
            defaults.max_enumerated_addresses,
        )?;
        let move_retry_limit =
            parse_var(&lookup, "DCIM_MOVE_RETRY_LIMIT", defaults.move_retry_limit)?;
        let enabled = parse_var(&lookup, "DCIM_PUBLISH_EVENTS", defaults.events.enabled)?;
        let nats_url = lookup("NATS_URL").unwrap_or(defaults.events.nats_url);
        let subject_root = lookup("DCIM_SUBJECT_ROOT").unwrap_or(defaults.events.subject_root);

        Ok(Self {
            max_enumerated_addresses,
            move_retry_limit,
            events: EventsConfig {
                enabled,
                nats_url,
                subject_root,
            },
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> AllocationResult<T> {
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            AllocationError::InvalidInput(format!("{name} has an invalid value: {raw}"))
        }),
        None => Ok(default),
    }
}
