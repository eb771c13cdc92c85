// Copyright (c) 2025 - Cowboy AI, Inc.
//! Per-key async advisory locks with automatic cleanup
//!
//! One `tokio::sync::Mutex` per [`LockKey`], created on first use and held in
//! the table only through a weak reference. The last guard to drop for a key
//! removes the entry, so the table never grows beyond the keys in use.

use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::lock_key::LockKey;

type LockTable = DashMap<LockKey, Weak<Mutex<()>>>;

/// Exclusive hold on one [`LockKey`], released on drop
pub struct EntityLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    arc: Arc<Mutex<()>>,
    key: LockKey,
    table: Arc<LockTable>,
}

impl EntityLockGuard {
    pub fn key(&self) -> LockKey {
        self.key
    }
}

impl Drop for EntityLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        // Runs under the shard lock `get_or_create` upgrades under, so the
        // count cannot grow between the check and the removal.
        let mutex = Arc::as_ptr(&self.arc);
        self.table.remove_if(&self.key, |_, weak| {
            std::ptr::eq(weak.as_ptr(), mutex) && Arc::strong_count(&self.arc) == 1
        });
        debug!("Released lock {}", self.key);
    }
}

/// Table of advisory locks keyed by entity
///
/// Same-key acquisitions serialize in FIFO order; different keys proceed in
/// parallel.
#[derive(Default)]
pub struct AdvisoryLocks {
    table: Arc<LockTable>,
}

impl AdvisoryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive ownership of `key`
    pub async fn acquire(&self, key: LockKey) -> EntityLockGuard {
        let arc = self.get_or_create(key);
        let held = Arc::clone(&arc);
        let guard = arc.lock_owned().await;
        debug!("Acquired lock {}", key);

        EntityLockGuard {
            guard: Some(guard),
            arc: held,
            key,
            table: Arc::clone(&self.table),
        }
    }

    fn get_or_create(&self, key: LockKey) -> Arc<Mutex<()>> {
        loop {
            match self.table.entry(key) {
                Entry::Occupied(occupied) => {
                    if let Some(strong) = occupied.get().upgrade() {
                        return strong;
                    }
                    occupied.remove();
                }
                Entry::Vacant(vacant) => {
                    let strong = Arc::new(Mutex::new(()));
                    vacant.insert(Arc::downgrade(&strong));
                    return strong;
                }
            }
        }
    }

    /// Number of keys currently held or waited on
    pub fn active(&self) -> usize {
        self.table
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .count()
    }
}
