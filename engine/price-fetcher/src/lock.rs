//! Per-region refresh locks
//!
//! Each lock guards the snapshot the last leader ended up with, so callers
//! that waited for a leader get exactly what it returned.

use price_model::{PriceSnapshot, Region};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Snapshot left behind by the last leader of a region
pub type RefreshSlot = Option<Arc<PriceSnapshot>>;

/// Guard held by the refresh leader; dropping it releases the region
pub type RefreshGuard = OwnedMutexGuard<RefreshSlot>;

/// One lock per region so regions refresh independently
#[derive(Debug, Clone)]
pub struct RefreshLocks {
    locks: Arc<HashMap<Region, Arc<Mutex<RefreshSlot>>>>,
}

impl RefreshLocks {
    pub fn new() -> Self {
        let locks = Region::ALL.iter().map(|region| (*region, Arc::new(Mutex::new(None)))).collect();
        Self { locks: Arc::new(locks) }
    }

    /// Take the lock only if it is free right now
    pub fn try_acquire(&self, region: Region) -> Option<RefreshGuard> {
        self.lock_for(region).try_lock_owned().ok()
    }

    /// Wait up to `timeout` for the lock
    pub async fn acquire_within(&self, region: Region, timeout: Duration) -> Option<RefreshGuard> {
        tokio::time::timeout(timeout, self.lock_for(region).lock_owned()).await.ok()
    }

    fn lock_for(&self, region: Region) -> Arc<Mutex<RefreshSlot>> {
        // every region gets a lock in `new`
        match self.locks.get(&region) {
            Some(lock) => Arc::clone(lock),
            None => Arc::new(Mutex::new(None)),
        }
    }
}

impl Default for RefreshLocks {
    fn default() -> Self {
        Self::new()
    }
}
