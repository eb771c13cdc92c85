// Copyright (c) 2025 - Cowboy AI, Inc.
//! NATS client for publishing allocation events

use async_nats::{Client, ConnectOptions, Subscriber};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::{AllocationError, AllocationResult};
use crate::events::{EventEnvelope, EventPublisher};

/// Configuration for NATS connection
#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// NATS server URLs
    pub servers: Vec<String>,
    /// Client name
    pub name: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Request timeout
    pub request_timeout: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            name: "dcim-allocation".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl NatsConfig {
    /// Default settings pointed at one server
    pub fn with_server(url: impl Into<String>) -> Self {
        Self {
            servers: vec![url.into()],
            ..Self::default()
        }
    }
}

/// NATS client wrapper
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
}

impl NatsClient {
    /// Create a new NATS client with the given configuration
    pub async fn new(config: NatsConfig) -> AllocationResult<Self> {
        let connect_options = ConnectOptions::new()
            .name(&config.name)
            .connection_timeout(config.connect_timeout)
            .request_timeout(Some(config.request_timeout));

        let client = async_nats::connect_with_options(config.servers.join(","), connect_options)
            .await
            .map_err(|e| AllocationError::Publish(format!("connect failed: {e}")))?;

        info!("Connected to NATS at {:?}", config.servers);

        Ok(Self { client })
    }

    /// Publish a JSON message to a subject
    pub async fn publish<T>(&self, subject: &str, message: &T) -> AllocationResult<()>
    where
        T: Serialize,
    {
        let payload = serde_json::to_vec(message)?;

        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| AllocationError::Publish(e.to_string()))?;

        debug!("Published message to subject: {}", subject);
        Ok(())
    }

    /// Subscribe to a subject
    pub async fn subscribe(&self, subject: &str) -> AllocationResult<Subscriber> {
        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| AllocationError::Subscribe(format!("{subject}: {e}")))?;

        info!("Subscribed to subject: {}", subject);
        Ok(subscriber)
    }

    /// Wait until everything published so far has reached the server
    pub async fn flush(&self) -> AllocationResult<()> {
        self.client
            .flush()
            .await
            .map_err(|e| AllocationError::Publish(e.to_string()))
    }
}

#[async_trait]
impl EventPublisher for NatsClient {
    async fn publish(&self, subject: &str, envelope: &EventEnvelope) -> AllocationResult<()> {
        NatsClient::publish(self, subject, envelope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_with_server() {
        let config = NatsConfig::with_server("nats://nats.dc1:4222");
        assert_eq!(config.servers, vec!["nats://nats.dc1:4222".to_string()]);
        assert_eq!(config.name, "dcim-allocation");
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }
}
