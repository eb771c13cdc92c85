// Copyright (c) 2025 - Cowboy AI, Inc.
//! Allocation Events
//!
//! Every committed allocation produces an [`AllocationEvent`], wrapped in an
//! [`EventEnvelope`] and handed to an [`EventPublisher`] through an
//! [`EventSink`].
//!
//! # Event Flow
//!
//! ```text
//! Service → commit → EventSink::emit → EventPublisher → NATS subject
//!                                                  {root}.{aggregate}.{operation}
//! ```
//!
//! # Delivery
//!
//! Events are emitted after the transaction commits and locks are released.
//! Publishing is best-effort: a failed publish is logged and never undoes the
//! allocation it describes. Consumers that need an exact ledger read the
//! store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::AllocationResult;
use crate::subjects::SubjectBuilder;

pub mod allocation;

pub use allocation::AllocationEvent;

/// Current envelope schema version
pub const EVENT_VERSION: u32 = 1;

/// Metadata wrapper around a published event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_version: u32,
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: AllocationEvent,
}

impl EventEnvelope {
    pub fn new(event: AllocationEvent) -> Self {
        Self {
            event_version: EVENT_VERSION,
            event_id: Uuid::now_v7(),
            timestamp: Utc::now(),
            event,
        }
    }

    pub fn subject(&self, root: &str) -> String {
        let (aggregate, operation) = self.event.routing();
        SubjectBuilder::new()
            .root(root)
            .aggregate(aggregate)
            .operation(operation)
    }
}

/// Destination for allocation events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, subject: &str, envelope: &EventEnvelope) -> AllocationResult<()>;
}

/// Best-effort event emitter shared by the services
#[derive(Clone)]
pub struct EventSink {
    publisher: Option<Arc<dyn EventPublisher>>,
    root: String,
}

impl EventSink {
    /// A sink that drops every event
    pub fn disabled() -> Self {
        Self {
            publisher: None,
            root: crate::subjects::INFRASTRUCTURE_ROOT.to_string(),
        }
    }

    pub fn new(publisher: Arc<dyn EventPublisher>, root: impl Into<String>) -> Self {
        Self {
            publisher: Some(publisher),
            root: root.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.publisher.is_some()
    }

    pub async fn emit(&self, event: AllocationEvent) {
        let Some(publisher) = &self.publisher else {
            return;
        };

        let envelope = EventEnvelope::new(event);
        let subject = envelope.subject(&self.root);
        match publisher.publish(&subject, &envelope).await {
            Ok(()) => debug!("Published {} to {}", envelope.event.event_type_name(), subject),
            Err(e) => warn!(
                "Failed to publish {} to {}: {}",
                envelope.event.event_type_name(),
                subject,
                e
            ),
        }
    }

    pub async fn emit_all(&self, events: impl IntoIterator<Item = AllocationEvent>) {
        for event in events {
            self.emit(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RackId;
    use crate::errors::AllocationError;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(String, EventEnvelope)>>,
    }

    #[async_trait]
    impl EventPublisher for Recorder {
        async fn publish(&self, subject: &str, envelope: &EventEnvelope) -> AllocationResult<()> {
            self.seen
                .lock()
                .await
                .push((subject.to_string(), envelope.clone()));
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventPublisher for Failing {
        async fn publish(&self, _: &str, _: &EventEnvelope) -> AllocationResult<()> {
            Err(AllocationError::Publish("nats down".to_string()))
        }
    }

    fn recomputed() -> AllocationEvent {
        AllocationEvent::MaxEmptyRecomputed {
            rack_id: RackId::new(3),
            max_empty: 10,
        }
    }

    #[tokio::test]
    async fn test_emit_routes_to_subject() {
        let recorder = Arc::new(Recorder::default());
        let sink = EventSink::new(recorder.clone(), "dc1");
        sink.emit(recomputed()).await;

        let seen = recorder.seen.lock().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "dc1.rack.recomputed");
        assert_eq!(seen[0].1.event_version, EVENT_VERSION);
    }

    #[tokio::test]
    async fn test_publish_failure_is_swallowed() {
        let sink = EventSink::new(Arc::new(Failing), "infrastructure");
        sink.emit(recomputed()).await;
        assert!(sink.is_enabled());
    }

    #[tokio::test]
    async fn test_disabled_sink_is_silent() {
        let sink = EventSink::disabled();
        assert!(!sink.is_enabled());
        sink.emit(recomputed()).await;
    }
}
