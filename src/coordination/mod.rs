// Copyright (c) 2025 - Cowboy AI, Inc.
//! Concurrency Coordination
//!
//! Every allocation that reads state and then writes based on it runs inside
//! a [`LockedScope`]: one or more advisory locks plus one store transaction.
//!
//! ```text
//! scope(keys) ── acquire locks (canonical order) ── begin tx
//!     │
//!     ├─ Ok  ─→ commit ─→ release locks
//!     └─ Err ─→ rollback ─→ release locks ─→ propagate
//! ```
//!
//! # Lock hierarchy
//!
//! Locks are taken fab → room → rack → server → pool. Multi-key scopes sort
//! their keys into this order themselves; nested acquisitions through
//! [`LockedScope::lock`] are expected to follow it and log a warning when
//! they do not.
//!
//! # Cancellation
//!
//! There is no cancel primitive. Dropping a scope (for instance because a
//! caller's `tokio::time::timeout` fired) drops the transaction, which rolls
//! it back, and then the guards, which release the locks.

use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::warn;

use crate::domain::EntityKind;
use crate::errors::AllocationResult;
use crate::store::{InventoryStore, StoreTransaction};

pub mod advisory;
pub mod lock_key;

pub use advisory::{AdvisoryLocks, EntityLockGuard};
pub use lock_key::LockKey;

/// Scoped lock-plus-transaction provider shared by the allocation services
///
/// Cloning is cheap; clones share the store and the lock table.
#[derive(Clone)]
pub struct ConcurrencyCoordinator {
    store: Arc<dyn InventoryStore>,
    locks: Arc<AdvisoryLocks>,
}

impl ConcurrencyCoordinator {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self {
            store,
            locks: Arc::new(AdvisoryLocks::new()),
        }
    }

    pub fn locks(&self) -> &AdvisoryLocks {
        &self.locks
    }

    /// A transaction with no locks, for best-effort reads
    pub async fn snapshot(&self) -> AllocationResult<Box<dyn StoreTransaction>> {
        self.store.begin().await
    }

    /// Acquire `keys` in canonical order, then open a transaction
    ///
    /// Duplicate keys are acquired once.
    pub async fn scope(
        &self,
        keys: impl IntoIterator<Item = LockKey>,
    ) -> AllocationResult<LockedScope> {
        let mut keys: Vec<LockKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            key.advisory_id()?;
            guards.push(self.locks.acquire(key).await);
        }

        let tx = self.store.begin().await?;
        Ok(LockedScope {
            tx,
            guards,
            locks: Arc::clone(&self.locks),
        })
    }

    /// Run `op` under the lock for one entity inside one transaction
    ///
    /// Commits when `op` succeeds, rolls back when it fails; the lock is
    /// released on both paths and on cancellation. `op` may only borrow the
    /// transaction, so it must own whatever else it captures.
    ///
    /// ```rust
    /// use cim_dcim_allocation::coordination::ConcurrencyCoordinator;
    /// use cim_dcim_allocation::domain::{EntityKind, NewFab};
    /// use cim_dcim_allocation::errors::AllocationError;
    /// use cim_dcim_allocation::store::MemoryStore;
    /// use std::sync::Arc;
    ///
    /// # tokio_test::block_on(async {
    /// let coordinator = ConcurrencyCoordinator::new(Arc::new(MemoryStore::new()));
    /// let name = "dc-1".to_string();
    /// let fab = coordinator
    ///     .with_entity_lock(EntityKind::Fab, 0, move |tx| {
    ///         Box::pin(async move {
    ///             let fab = tx.insert_fab(NewFab { name }).await?;
    ///             Ok::<_, AllocationError>(fab)
    ///         })
    ///     })
    ///     .await
    ///     .unwrap();
    /// assert_eq!(fab.name, "dc-1");
    /// # });
    /// ```
    pub async fn with_entity_lock<T, F>(
        &self,
        kind: EntityKind,
        id: u64,
        op: F,
    ) -> AllocationResult<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut dyn StoreTransaction) -> BoxFuture<'t, AllocationResult<T>>
            + Send,
    {
        self.with_entity_locks(vec![LockKey::new(kind, id)], op)
            .await
    }

    /// [`with_entity_lock`](Self::with_entity_lock) over several entities
    pub async fn with_entity_locks<T, F>(&self, keys: Vec<LockKey>, op: F) -> AllocationResult<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut dyn StoreTransaction) -> BoxFuture<'t, AllocationResult<T>>
            + Send,
    {
        let mut scope = self.scope(keys).await?;
        let result = op(scope.tx()).await;
        scope.finish(result).await
    }
}

/// Held locks plus the transaction they protect
///
/// Fields drop in declaration order: the transaction (rollback) goes before
/// the guards (release).
pub struct LockedScope {
    tx: Box<dyn StoreTransaction>,
    guards: Vec<EntityLockGuard>,
    locks: Arc<AdvisoryLocks>,
}

impl LockedScope {
    pub fn tx(&mut self) -> &mut dyn StoreTransaction {
        self.tx.as_mut()
    }

    pub fn holds(&self, key: LockKey) -> bool {
        self.guards.iter().any(|guard| guard.key() == key)
    }

    /// Take one more lock for the rest of the scope
    pub async fn lock(&mut self, key: LockKey) -> AllocationResult<()> {
        if self.holds(key) {
            return Ok(());
        }
        key.advisory_id()?;

        if let Some(highest) = self.guards.iter().map(EntityLockGuard::key).max() {
            if key < highest {
                warn!(
                    "Lock {} taken after {} is out of hierarchy order",
                    key, highest
                );
            }
        }

        let guard = self.locks.acquire(key).await;
        self.guards.push(guard);
        Ok(())
    }

    /// Release a nested lock early
    ///
    /// Only sound when nothing was written under that lock in this scope.
    pub fn unlock(&mut self, key: LockKey) {
        self.guards.retain(|guard| guard.key() != key);
    }

    pub async fn commit(self) -> AllocationResult<()> {
        let LockedScope { tx, guards, .. } = self;
        let result = tx.commit().await;
        drop(guards);
        result
    }

    pub async fn rollback(self) {
        let LockedScope { tx, guards, .. } = self;
        if let Err(e) = tx.rollback().await {
            warn!("Rollback failed: {}", e);
        }
        drop(guards);
    }

    /// Commit on `Ok`, roll back on `Err`, release every lock either way
    pub async fn finish<T>(self, result: AllocationResult<T>) -> AllocationResult<T> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(e) => {
                self.rollback().await;
                Err(e)
            }
        }
    }
}
