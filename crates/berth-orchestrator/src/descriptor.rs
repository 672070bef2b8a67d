//! Deployment descriptor rendering.
//!
//! Each tenant gets a compose file rendered from a Tera template. Values
//! that come from the process environment (credentials, API keys) are
//! passed through by name from configuration and never appear in the
//! template itself.
//!
//! Rendering is deterministic: the same input and environment always
//! produce byte-identical output.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use berth_utils::logging::prelude::*;
use serde::Serialize;
use tera::{Context, Tera};
use uuid::Uuid;

use crate::error::OrchestratorError;

/// Template used when no override is configured.
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/docker-compose.yml.tera");

/// File name of every rendered descriptor.
pub const DESCRIPTOR_FILE: &str = "docker-compose.yml";

const TEMPLATE_NAME: &str = "descriptor";

/// Per-tenant values substituted into the template.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorInput {
    pub tenant_id: Uuid,
    pub tenant_name: String,
    pub container_name: String,
    pub cpu_limit: f64,
    pub memory_limit_mb: i32,
    pub external_port: i32,
}

#[derive(Serialize)]
struct TemplateVars<'a> {
    tenant_id: String,
    tenant_name: &'a str,
    container_name: &'a str,
    image: &'a str,
    cpu_limit: f64,
    memory_limit: String,
    external_port: i32,
    internal_port: u16,
    env: &'a BTreeMap<String, String>,
}

/// Renders and writes tenant descriptors.
pub struct DescriptorRenderer {
    tera: Tera,
    descriptor_dir: PathBuf,
    image: String,
    internal_port: u16,
    passthrough_env: Vec<String>,
}

impl DescriptorRenderer {
    /// Creates a renderer, failing fast if the template does not parse.
    pub fn new(
        template: &str,
        descriptor_dir: impl Into<PathBuf>,
        image: impl Into<String>,
        internal_port: u16,
        passthrough_env: Vec<String>,
    ) -> Result<Self, OrchestratorError> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, template)
            .map_err(|e| OrchestratorError::Descriptor(format!("invalid template: {}", e)))?;

        Ok(Self {
            tera,
            descriptor_dir: descriptor_dir.into(),
            image: image.into(),
            internal_port,
            passthrough_env,
        })
    }

    /// Loads the template from `template_path`, or uses the embedded default.
    pub fn load_template(template_path: Option<&str>) -> Result<String, OrchestratorError> {
        match template_path {
            Some(path) => fs::read_to_string(path).map_err(|e| {
                OrchestratorError::Descriptor(format!("cannot read template {}: {}", path, e))
            }),
            None => Ok(DEFAULT_TEMPLATE.to_string()),
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn internal_port(&self) -> u16 {
        self.internal_port
    }

    /// Collects the configured passthrough variables from the process environment.
    ///
    /// Unset variables are skipped with a warning.
    pub fn collect_env(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        for name in &self.passthrough_env {
            match std::env::var(name) {
                Ok(value) => {
                    env.insert(name.clone(), value);
                }
                Err(_) => warn!(variable = %name, "passthrough variable is not set"),
            }
        }
        env
    }

    /// Renders the descriptor for `input` with the given environment.
    pub fn render(
        &self,
        input: &DescriptorInput,
        env: &BTreeMap<String, String>,
    ) -> Result<String, OrchestratorError> {
        let vars = TemplateVars {
            tenant_id: input.tenant_id.to_string(),
            tenant_name: &input.tenant_name,
            container_name: &input.container_name,
            image: &self.image,
            cpu_limit: input.cpu_limit,
            memory_limit: format!("{}M", input.memory_limit_mb),
            external_port: input.external_port,
            internal_port: self.internal_port,
            env,
        };
        let context = Context::from_serialize(&vars)?;
        let rendered = self.tera.render(TEMPLATE_NAME, &context)?;

        serde_yaml::from_str::<serde_yaml::Value>(&rendered).map_err(|e| {
            OrchestratorError::Descriptor(format!("rendered descriptor is not valid YAML: {}", e))
        })?;

        Ok(rendered)
    }

    /// Location of a tenant's descriptor.
    pub fn descriptor_path(&self, container_name: &str) -> PathBuf {
        self.descriptor_dir.join(container_name).join(DESCRIPTOR_FILE)
    }

    /// Renders the descriptor and writes it, overwriting any previous copy.
    pub fn write(&self, input: &DescriptorInput) -> Result<PathBuf, OrchestratorError> {
        let rendered = self.render(input, &self.collect_env())?;
        let path = self.descriptor_path(&input.container_name);
        write_file(&path, &rendered)?;
        debug!(tenant_id = %input.tenant_id, path = %path.display(), "descriptor written");
        Ok(path)
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), OrchestratorError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            OrchestratorError::Descriptor(format!("cannot create {}: {}", parent.display(), e))
        })?;
    }
    fs::write(path, contents).map_err(|e| {
        OrchestratorError::Descriptor(format!("cannot write {}: {}", path.display(), e))
    })
}
