//! Tenant provisioning.
//!
//! Provisioning validates the tenant configuration, allocates an external
//! port, renders the tenant's descriptor and inserts the container row in
//! `provisioning` together with a pending `provision` deployment record.
//! Nothing is started.

use std::sync::Arc;

use berth_models::models::{container_name_for, NewTenantContainer, TenantConfig};
use berth_utils::logging::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::descriptor::{DescriptorInput, DescriptorRenderer};
use crate::error::OrchestratorError;
use crate::ports::PortAllocator;
use crate::store::TenantStore;

/// What a caller learns from a successful provision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionResult {
    /// Identifier of the container record.
    pub container_id: Uuid,
    pub tenant_id: Uuid,
    pub container_name: String,
    #[schema(example = 3001)]
    pub external_port: i32,
    #[schema(example = "http://localhost:3001")]
    pub tenant_url: String,
}

pub struct Provisioner {
    store: Arc<dyn TenantStore>,
    ports: PortAllocator,
    descriptors: Arc<DescriptorRenderer>,
    public_host: String,
    /// Serializes allocation across all tenants in this process.
    allocation_lock: Mutex<()>,
}

impl Provisioner {
    pub fn new(
        store: Arc<dyn TenantStore>,
        ports: PortAllocator,
        descriptors: Arc<DescriptorRenderer>,
        public_host: impl Into<String>,
    ) -> Self {
        Self {
            store,
            ports,
            descriptors,
            public_host: public_host.into(),
            allocation_lock: Mutex::new(()),
        }
    }

    pub fn tenant_url(&self, port: i32) -> String {
        format!("http://{}:{}", self.public_host, port)
    }

    pub async fn provision(&self, config: &TenantConfig) -> Result<ProvisionResult, OrchestratorError> {
        let valid = config.validate()?;
        let tenant_id = valid.tenant_id;

        if self.store.get_container(tenant_id)?.is_some() {
            return Err(OrchestratorError::DuplicateTenant(tenant_id));
        }

        let container_name = container_name_for(tenant_id);
        let internal_port = self.descriptors.internal_port() as i32;

        let _allocation = self.allocation_lock.lock().await;
        let container = self.store.create_with_next_port(
            tenant_id,
            self.ports.base_port(),
            Some(self.descriptors.image()),
            &mut |port| {
                let input = DescriptorInput {
                    tenant_id,
                    tenant_name: valid.tenant_name.clone(),
                    container_name: container_name.clone(),
                    cpu_limit: valid.cpu_limit,
                    memory_limit_mb: valid.memory_limit_mb,
                    external_port: port,
                };
                let descriptor_path = self.descriptors.write(&input)?;

                NewTenantContainer::new(
                    tenant_id,
                    valid.tenant_name.clone(),
                    container_name.clone(),
                    port,
                    internal_port,
                    self.tenant_url(port),
                    valid.cpu_limit,
                    valid.memory_limit_mb,
                    valid.disk_limit_mb,
                    descriptor_path.to_string_lossy().into_owned(),
                )
                .map_err(|reason| OrchestratorError::Validation {
                    field: "container".to_string(),
                    reason,
                })
            },
        )?;

        info!(
            tenant_id = %tenant_id,
            container_name = %container.container_name,
            external_port = container.external_port,
            "tenant provisioned"
        );

        Ok(ProvisionResult {
            container_id: container.id,
            tenant_id,
            container_name: container.container_name,
            external_port: container.external_port,
            tenant_url: container.tenant_url,
        })
    }
}
