// Copyright (c) 2025 - Cowboy AI, Inc.
//! Address Pool Registry
//!
//! Owns the lifecycle of per-service address pools: creation with overlap
//! detection, first-free assignment, release, and read-only enumeration.
//!
//! # Assignment
//!
//! ```text
//! pools(service) ascending id
//!   └─ for each: lock pool → reload → first free usable host?
//!         ├─ yes: mark used, save, keep lock until commit
//!         └─ no:  release lock, next pool
//! none left → ResourceExhausted
//! ```
//!
//! Exhaustion fails fast; pools are never created implicitly.

use chrono::Utc;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::AllocationConfig;
use crate::coordination::{ConcurrencyCoordinator, LockKey, LockedScope};
use crate::domain::invariants::validate_name;
use crate::domain::{
    AddressPool, Assignment, CidrBlock, EntityKind, NewPool, Server, ServerId,
};
use crate::errors::{AllocationError, AllocationResult};
use crate::events::{AllocationEvent, EventSink};

/// Pool lifecycle and address assignment
#[derive(Clone)]
pub struct AddressPoolRegistry {
    coordinator: ConcurrencyCoordinator,
    config: Arc<AllocationConfig>,
    events: EventSink,
}

impl AddressPoolRegistry {
    pub fn new(
        coordinator: ConcurrencyCoordinator,
        config: Arc<AllocationConfig>,
        events: EventSink,
    ) -> Self {
        Self {
            coordinator,
            config,
            events,
        }
    }

    /// Create a pool for `service` over `cidr`
    ///
    /// Holds the pool collection lock so two creations cannot both pass the
    /// overlap check.
    ///
    /// # Errors
    ///
    /// - `Conflict` if `cidr` overlaps any existing pool, whatever its service
    /// - `InvalidInput` if `service` is blank
    pub async fn create_pool(
        &self,
        service: &str,
        cidr: CidrBlock,
    ) -> AllocationResult<AddressPool> {
        validate_name(EntityKind::Pool, service)?;
        let service = service.to_string();

        let created = self
            .coordinator
            .with_entity_lock(EntityKind::Pool, 0, move |tx| {
                Box::pin(async move {
                    let existing = tx.pools(None).await?;
                    if let Some(clash) = existing.iter().find(|pool| pool.cidr.overlaps(&cidr)) {
                        return Err(AllocationError::Conflict(format!(
                            "{} overlaps pool {} ({}) of service {}",
                            cidr, clash.id, clash.cidr, clash.service
                        )));
                    }
                    tx.insert_pool(NewPool { service, cidr }).await
                })
            })
            .await;

        let pool = created.map_err(|e| {
            warn!("Pool creation for {} rejected: {}", cidr, e);
            e
        })?;

        info!("Created pool {} for {} over {}", pool.id, pool.service, pool.cidr);
        self.events
            .emit(AllocationEvent::PoolCreated {
                pool_id: pool.id,
                service: pool.service.clone(),
                cidr: pool.cidr,
            })
            .await;
        Ok(pool)
    }

    /// Hand out the lowest free address of the lowest-id pool serving `service`
    ///
    /// The address is marked used in its own transaction; recording which
    /// server holds it is the caller's business.
    ///
    /// # Errors
    ///
    /// - `ResourceExhausted` if no pool for `service` has a free address
    pub async fn assign(&self, service: &str) -> AllocationResult<Assignment> {
        let mut scope = self.coordinator.scope(Vec::new()).await?;
        let result = self.assign_within(&mut scope, service).await;
        let assignment = scope.finish(result).await.map_err(|e| {
            warn!("Assignment for {} failed: {}", service, e);
            e
        })?;

        info!(
            "Assigned {} from pool {} to {}",
            assignment.address, assignment.pool_id, service
        );
        self.events
            .emit(AllocationEvent::AddressAssigned {
                pool_id: assignment.pool_id,
                service: service.to_string(),
                address: assignment.address,
            })
            .await;
        Ok(assignment)
    }

    /// Assignment inside a caller's scope
    ///
    /// The winning pool's lock joins the scope and is held until the caller
    /// commits; locks of pools with nothing free are released straight away.
    pub async fn assign_within(
        &self,
        scope: &mut LockedScope,
        service: &str,
    ) -> AllocationResult<Assignment> {
        let candidates = scope.tx().pools(Some(service)).await?;

        for candidate in candidates {
            let key = LockKey::pool(candidate.id);
            let already_held = scope.holds(key);
            scope.lock(key).await?;

            // Reload under the lock; the unlocked scan may be stale.
            let Some(mut pool) = scope.tx().pool(candidate.id).await? else {
                if !already_held {
                    scope.unlock(key);
                }
                continue;
            };

            match pool.first_free() {
                Some(address) => {
                    pool.used_addresses.insert(address);
                    pool.updated_at = Utc::now();
                    scope.tx().save_pool(&pool).await?;
                    debug!("Pool {} yields {} for {}", pool.id, address, service);
                    return Ok(Assignment {
                        address,
                        pool_id: pool.id,
                    });
                }
                None => {
                    debug!("Pool {} for {} is full", pool.id, service);
                    if !already_held {
                        scope.unlock(key);
                    }
                }
            }
        }

        Err(AllocationError::ResourceExhausted {
            service: service.to_string(),
        })
    }

    /// Return a server's address to its pool
    ///
    /// The pool entry and the server row change together: afterwards the
    /// server holds no address.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the server or its pool does not exist
    /// - `InvariantViolation` if the server holds no address, or its pool
    ///   does not list the address as used
    pub async fn release(&self, server_id: ServerId) -> AllocationResult<IpAddr> {
        let mut scope = self.coordinator.scope([LockKey::server(server_id)]).await?;

        let result: AllocationResult<Assignment> = async {
            let mut server = scope
                .tx()
                .server(server_id)
                .await?
                .ok_or_else(|| AllocationError::not_found(EntityKind::Server, server_id))?;
            self.release_within(&mut scope, &mut server).await
        }
        .await;

        let released = scope.finish(result).await.map_err(|e| {
            warn!("Release for server {} failed: {}", server_id, e);
            e
        })?;

        info!(
            "Released {} of server {} back to pool {}",
            released.address, server_id, released.pool_id
        );
        self.events
            .emit(AllocationEvent::AddressReleased {
                pool_id: released.pool_id,
                server_id,
                address: released.address,
            })
            .await;
        Ok(released.address)
    }

    /// Release inside a caller's scope, clearing the server's assignment
    ///
    /// The caller must hold the server's lock; the pool lock joins the scope.
    pub async fn release_within(
        &self,
        scope: &mut LockedScope,
        server: &mut Server,
    ) -> AllocationResult<Assignment> {
        let assignment = server.assignment.ok_or_else(|| {
            AllocationError::InvariantViolation(format!("server {} holds no address", server.id))
        })?;
        self.return_to_pool(scope, server.id, assignment).await?;

        server.assignment = None;
        server.updated_at = Utc::now();
        scope.tx().save_server(server).await?;
        Ok(assignment)
    }

    /// Drop `assignment` from its pool's used set
    pub(crate) async fn return_to_pool(
        &self,
        scope: &mut LockedScope,
        server_id: ServerId,
        assignment: Assignment,
    ) -> AllocationResult<()> {
        scope.lock(LockKey::pool(assignment.pool_id)).await?;

        let mut pool = scope
            .tx()
            .pool(assignment.pool_id)
            .await?
            .ok_or_else(|| AllocationError::not_found(EntityKind::Pool, assignment.pool_id))?;

        if !pool.used_addresses.remove(&assignment.address) {
            error!(
                "Pool {} does not list {} held by server {}",
                pool.id, assignment.address, server_id
            );
            return Err(AllocationError::InvariantViolation(format!(
                "address {} of server {} is not marked used in pool {}",
                assignment.address, server_id, pool.id
            )));
        }

        pool.updated_at = Utc::now();
        scope.tx().save_pool(&pool).await
    }

    /// Every address of every pool serving `service`, network and broadcast
    /// addresses included, in pool order
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the pools hold more addresses than
    ///   `max_enumerated_addresses`
    pub async fn list_addresses(&self, service: &str) -> AllocationResult<Vec<IpAddr>> {
        let pools = self.list_pools(service).await?;
        let total = pools
            .iter()
            .fold(0u128, |sum, pool| sum.saturating_add(pool.cidr.size()));
        if total > u128::from(self.config.max_enumerated_addresses) {
            return Err(AllocationError::InvalidInput(format!(
                "pools for {} hold {} addresses, more than the enumeration limit of {}",
                service, total, self.config.max_enumerated_addresses
            )));
        }

        Ok(pools
            .iter()
            .flat_map(|pool| pool.cidr.addresses())
            .collect())
    }

    /// Addresses currently handed out from pools serving `service`
    ///
    /// # Errors
    ///
    /// - `NotFound` if no pool serves `service`
    pub async fn list_used_addresses(&self, service: &str) -> AllocationResult<Vec<IpAddr>> {
        let pools = self.list_pools(service).await?;
        if pools.is_empty() {
            return Err(AllocationError::not_found(
                EntityKind::Pool,
                format!("service {service}"),
            ));
        }
        Ok(pools
            .into_iter()
            .flat_map(|pool| pool.used_addresses.into_iter())
            .collect())
    }

    pub async fn list_pools(&self, service: &str) -> AllocationResult<Vec<AddressPool>> {
        self.coordinator.snapshot().await?.pools(Some(service)).await
    }

    pub async fn list_all_pools(&self) -> AllocationResult<Vec<AddressPool>> {
        self.coordinator.snapshot().await?.pools(None).await
    }
}
