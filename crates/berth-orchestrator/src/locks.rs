//! Per-tenant exclusive locks.
//!
//! Every lifecycle transition, health check and metrics collection for a
//! tenant runs while holding that tenant's lock. Work for different tenants
//! proceeds in parallel.
//!
//! Entries only live while someone holds or waits for them, so the registry
//! stays as large as the number of tenants with work in flight.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type Registry = DashMap<Uuid, Arc<Mutex<()>>>;

/// Registry of lock handles keyed by tenant id.
#[derive(Default, Clone)]
pub struct TenantLocks {
    locks: Arc<Registry>,
}

/// Exclusive access to one tenant. Releasing it drops the registry entry
/// when nobody else is waiting.
pub struct TenantLockGuard {
    tenant_id: Uuid,
    locks: Arc<Registry>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TenantLockGuard {
    fn drop(&mut self) {
        // The mutex must be unlocked before the handle count is checked.
        drop(self.guard.take());
        release(&self.locks, self.tenant_id);
    }
}

/// Removes the entry if the registry holds the only handle. The shard lock
/// taken by `remove_if` keeps new waiters from cloning it meanwhile.
fn release(locks: &Registry, tenant_id: Uuid) {
    locks.remove_if(&tenant_id, |_, handle| Arc::strong_count(handle) == 1);
}

impl TenantLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, tenant_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(tenant_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn guard(&self, tenant_id: Uuid, guard: OwnedMutexGuard<()>) -> TenantLockGuard {
        TenantLockGuard {
            tenant_id,
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    /// Waits for exclusive access to `tenant_id`.
    pub async fn acquire(&self, tenant_id: Uuid) -> TenantLockGuard {
        let guard = self.handle(tenant_id).lock_owned().await;
        self.guard(tenant_id, guard)
    }

    /// Takes the lock only if nobody holds it.
    pub fn try_acquire(&self, tenant_id: Uuid) -> Option<TenantLockGuard> {
        let attempt = self.handle(tenant_id).try_lock_owned();
        match attempt {
            Ok(guard) => Some(self.guard(tenant_id, guard)),
            Err(_) => {
                // The holder may have released while our handle was alive.
                release(&self.locks, tenant_id);
                None
            }
        }
    }

    /// Number of tenants with a held or awaited lock.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
