// Copyright (c) 2025 - Cowboy AI, Inc.

//! NATS subject hierarchy for allocation events
//!
//! Defines the semantic subject patterns used for allocation event routing.
//!
//! # Subject Pattern
//!
//! All allocation events follow the hierarchical pattern:
//!
//! ```text
//! {root}.{aggregate}.{operation}
//! ```
//!
//! with `root` defaulting to `infrastructure`. This allows for:
//! - Precise subscriptions (`infrastructure.ipam.assigned`)
//! - Aggregate-level wildcards (`infrastructure.rack.>`)
//! - Operation-level wildcards (`infrastructure.*.deleted`)
//! - Global subscriptions (`infrastructure.>`)
//!
//! # Examples
//!
//! ```rust
//! use cim_dcim_allocation::subjects::{SubjectBuilder, AggregateType, Operation};
//!
//! let subject = SubjectBuilder::new()
//!     .aggregate(AggregateType::Ipam)
//!     .operation(Operation::Assigned);
//! assert_eq!(subject, "infrastructure.ipam.assigned");
//!
//! let wildcard = SubjectBuilder::new()
//!     .aggregate(AggregateType::Rack)
//!     .build_wildcard();
//! assert_eq!(wildcard, "infrastructure.rack.>");
//! ```

use std::fmt;

/// Default root namespace for all allocation subjects
pub const INFRASTRUCTURE_ROOT: &str = "infrastructure";

/// Allocation aggregate types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateType {
    /// Address pools and their assignments
    Ipam,
    /// Facilities
    Fab,
    /// Rooms
    Room,
    /// Racks and their slot layout
    Rack,
    /// Servers (slot holders)
    Server,
}

impl fmt::Display for AggregateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateType::Ipam => write!(f, "ipam"),
            AggregateType::Fab => write!(f, "fab"),
            AggregateType::Room => write!(f, "room"),
            AggregateType::Rack => write!(f, "rack"),
            AggregateType::Server => write!(f, "server"),
        }
    }
}

/// Allocation operations (event types)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Created,
    Deleted,
    /// An address was handed out
    Assigned,
    /// An address was returned to its pool
    Released,
    /// A slot was validated as free
    Reserved,
    Placed,
    Moved,
    Removed,
    HealthChanged,
    /// A rack's cached free run was refreshed
    Recomputed,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Created => write!(f, "created"),
            Operation::Deleted => write!(f, "deleted"),
            Operation::Assigned => write!(f, "assigned"),
            Operation::Released => write!(f, "released"),
            Operation::Reserved => write!(f, "reserved"),
            Operation::Placed => write!(f, "placed"),
            Operation::Moved => write!(f, "moved"),
            Operation::Removed => write!(f, "removed"),
            Operation::HealthChanged => write!(f, "health_changed"),
            Operation::Recomputed => write!(f, "recomputed"),
        }
    }
}

/// Builder for allocation NATS subjects
#[derive(Debug, Clone)]
pub struct SubjectBuilder {
    root: String,
    aggregate: Option<AggregateType>,
}

impl SubjectBuilder {
    pub fn new() -> Self {
        Self {
            root: INFRASTRUCTURE_ROOT.to_string(),
            aggregate: None,
        }
    }

    /// Replace the root namespace
    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    pub fn aggregate(mut self, aggregate: AggregateType) -> Self {
        self.aggregate = Some(aggregate);
        self
    }

    /// Complete subject for `operation`
    ///
    /// Without an aggregate the aggregate token is `*`, which subscribes to
    /// that operation across all aggregates.
    pub fn operation(self, operation: Operation) -> String {
        match self.aggregate {
            Some(aggregate) => format!("{}.{}.{}", self.root, aggregate, operation),
            None => format!("{}.*.{}", self.root, operation),
        }
    }

    /// Subscription for every operation on the aggregate, or on everything
    /// under the root when no aggregate is set
    pub fn build_wildcard(self) -> String {
        match self.aggregate {
            Some(aggregate) => format!("{}.{}.>", self.root, aggregate),
            None => format!("{}.>", self.root),
        }
    }
}

impl Default for SubjectBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_builder() {
        let subject = SubjectBuilder::new()
            .aggregate(AggregateType::Rack)
            .operation(Operation::Recomputed);
        assert_eq!(subject, "infrastructure.rack.recomputed");
    }

    #[test]
    fn test_custom_root() {
        let subject = SubjectBuilder::new()
            .root("dc1")
            .aggregate(AggregateType::Server)
            .operation(Operation::HealthChanged);
        assert_eq!(subject, "dc1.server.health_changed");
    }

    #[test]
    fn test_wildcards() {
        assert_eq!(
            SubjectBuilder::new()
                .aggregate(AggregateType::Ipam)
                .build_wildcard(),
            "infrastructure.ipam.>"
        );
        assert_eq!(SubjectBuilder::new().build_wildcard(), "infrastructure.>");
        assert_eq!(
            SubjectBuilder::new().operation(Operation::Deleted),
            "infrastructure.*.deleted"
        );
    }
}
