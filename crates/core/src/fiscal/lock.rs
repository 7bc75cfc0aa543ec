//! Serialization of voucher-number allocation.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tesoro_shared::AppResult;
use tesoro_shared::types::AgencyId;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::types::VoucherType;

/// The numbering sequence an allocation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocationKey {
    /// Agency.
    pub agency_id: AgencyId,
    /// Point of sale.
    pub pto_vta: i32,
    /// Voucher type.
    pub cbte_tipo: VoucherType,
}

impl AllocationKey {
    /// Stable 64-bit key for database advisory locks.
    #[must_use]
    pub fn advisory_key(&self) -> i64 {
        // FNV-1a over the agency uuid, point of sale and voucher type.
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        let bytes = self
            .agency_id
            .into_inner()
            .into_bytes()
            .into_iter()
            .chain(self.pto_vta.to_be_bytes())
            .chain(self.cbte_tipo.code().to_be_bytes());
        for byte in bytes {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        i64::from_ne_bytes(hash.to_ne_bytes())
    }
}

/// Held for the duration of an allocation; dropping it releases the lock.
pub struct AllocationGuard {
    _held: Box<dyn Send>,
}

impl AllocationGuard {
    /// Wraps whatever keeps the lock alive.
    #[must_use]
    pub fn new<T: Send + 'static>(held: T) -> Self {
        Self {
            _held: Box::new(held),
        }
    }
}

impl std::fmt::Debug for AllocationGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocationGuard").finish_non_exhaustive()
    }
}

/// Mutual exclusion per [`AllocationKey`].
#[async_trait]
pub trait AllocationLock: Send + Sync {
    /// Waits until the key is free and takes it.
    async fn acquire(&self, key: AllocationKey) -> AppResult<AllocationGuard>;
}

type LockTable = DashMap<AllocationKey, Arc<Mutex<()>>>;

/// In-process locks, one async mutex per key.
///
/// A key's mutex is dropped from the table once nobody holds or waits on it.
#[derive(Debug, Default)]
pub struct LocalAllocationLocks {
    locks: Arc<LockTable>,
}

impl LocalAllocationLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys with a live mutex.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no key is held or awaited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

struct LocalGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockTable>,
    key: AllocationKey,
}

impl Drop for LocalGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters and new acquirers hold their own clone of the Arc.
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[async_trait]
impl AllocationLock for LocalAllocationLocks {
    async fn acquire(&self, key: AllocationKey) -> AppResult<AllocationGuard> {
        // Clone the Arc out so the map shard is not held across the await.
        let mutex = self.locks.entry(key).or_default().value().clone();
        let guard = mutex.lock_owned().await;
        Ok(AllocationGuard::new(LocalGuard {
            guard: Some(guard),
            locks: self.locks.clone(),
            key,
        }))
    }
}

/// Local lock first, then a cross-process one (e.g. a Postgres advisory lock).
pub struct LayeredAllocationLock {
    local: LocalAllocationLocks,
    remote: Arc<dyn AllocationLock>,
}

impl LayeredAllocationLock {
    /// Creates a layered lock over `remote`.
    #[must_use]
    pub fn new(remote: Arc<dyn AllocationLock>) -> Self {
        Self {
            local: LocalAllocationLocks::new(),
            remote,
        }
    }
}

#[async_trait]
impl AllocationLock for LayeredAllocationLock {
    async fn acquire(&self, key: AllocationKey) -> AppResult<AllocationGuard> {
        let local = self.local.acquire(key).await?;
        let remote = self.remote.acquire(key).await?;
        // Remote is released before local.
        Ok(AllocationGuard::new((remote, local)))
    }
}
