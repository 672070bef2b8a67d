//! External port allocation.
//!
//! Ports are handed out sequentially from a fixed base: the next port is one
//! above the highest port currently allocated. [`PortAllocator::next_available_port`]
//! is only a read; callers that act on the answer must go through
//! [`TenantStore::create_with_next_port`], which repeats the computation inside
//! the store's serialized unit of work.

use std::sync::Arc;

use crate::error::OrchestratorError;
use crate::store::{next_port, TenantStore};

pub const DEFAULT_BASE_PORT: u16 = 3001;

#[derive(Clone)]
pub struct PortAllocator {
    store: Arc<dyn TenantStore>,
    base_port: u16,
}

impl PortAllocator {
    pub fn new(store: Arc<dyn TenantStore>, base_port: u16) -> Self {
        Self { store, base_port }
    }

    pub fn base_port(&self) -> i32 {
        self.base_port as i32
    }

    /// The port the next provisioned tenant would receive.
    pub fn next_available_port(&self) -> Result<i32, OrchestratorError> {
        let current_max = self.store.max_external_port()?;
        next_port(current_max, self.base_port())
    }
}
