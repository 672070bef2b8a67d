//! Docker binding of the container runtime interface.
//!
//! Descriptors are compose files, so `up`/`down` go through the compose CLI.
//! Everything that reads state (container ids, status, stats) goes through
//! the engine API instead of scraping CLI output.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, StatsOptions};
use bollard::errors::Error as DockerError;
use bollard::Docker;
use berth_utils::logging::prelude::*;
use futures::StreamExt;
use tokio::process::Command;
use tokio::sync::RwLock;

use super::{stats, ContainerRuntime, ContainerStats, RuntimeStatus};
use crate::error::OrchestratorError;

/// Runtime that drives the local Docker daemon.
#[derive(Clone)]
pub struct DockerRuntime {
    compose_command: String,
    timeout: Duration,
    /// Engine connection, created on first use.
    docker: Arc<RwLock<Option<Docker>>>,
}

impl DockerRuntime {
    pub fn new(compose_command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            compose_command: compose_command.into(),
            timeout,
            docker: Arc::new(RwLock::new(None)),
        }
    }

    async fn docker(&self) -> Result<Docker, OrchestratorError> {
        {
            let guard = self.docker.read().await;
            if let Some(ref d) = *guard {
                return Ok(d.clone());
            }
        }
        let docker = Docker::connect_with_local_defaults().map_err(|e| {
            OrchestratorError::RuntimeQuery(format!("cannot connect to docker: {}", e))
        })?;
        *self.docker.write().await = Some(docker.clone());
        Ok(docker)
    }

    /// Runs `<compose_command> compose -f <descriptor> -p <project> <args..>`.
    async fn compose(
        &self,
        descriptor: &Path,
        project: &str,
        args: &[&str],
    ) -> Result<String, OrchestratorError> {
        let mut cmd = Command::new(&self.compose_command);
        cmd.arg("compose")
            .arg("-f")
            .arg(descriptor)
            .arg("-p")
            .arg(project)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(project = %project, descriptor = %descriptor.display(), ?args, "invoking compose");

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                OrchestratorError::RuntimeInvocation(format!(
                    "compose {} timed out after {}s",
                    args.join(" "),
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                OrchestratorError::RuntimeInvocation(format!(
                    "failed to run {}: {}",
                    self.compose_command, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OrchestratorError::RuntimeInvocation(format!(
                "compose {} exited with {}: {}",
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn is_not_found(e: &DockerError) -> bool {
    matches!(
        e,
        DockerError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn up(&self, descriptor: &Path, project: &str) -> Result<String, OrchestratorError> {
        self.compose(descriptor, project, &["up", "-d"]).await?;

        // The descriptor pins `container_name` to the project name.
        let docker = self.docker().await?;
        let inspect = docker
            .inspect_container(project, None::<InspectContainerOptions>)
            .await
            .map_err(|e| {
                OrchestratorError::RuntimeInvocation(format!(
                    "container {} not found after up: {}",
                    project, e
                ))
            })?;

        inspect.id.filter(|id| !id.is_empty()).ok_or_else(|| {
            OrchestratorError::RuntimeInvocation(format!(
                "runtime returned no id for container {}",
                project
            ))
        })
    }

    async fn down(&self, descriptor: &Path, project: &str) -> Result<(), OrchestratorError> {
        self.compose(descriptor, project, &["down"]).await?;
        Ok(())
    }

    async fn query_status(&self, container_id: &str) -> Result<RuntimeStatus, OrchestratorError> {
        let docker = self.docker().await?;
        match docker
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
        {
            Ok(inspect) => Ok(match inspect.state.and_then(|s| s.running) {
                Some(true) => RuntimeStatus::Running,
                Some(false) => RuntimeStatus::Stopped,
                None => RuntimeStatus::Unknown,
            }),
            Err(e) if is_not_found(&e) => Ok(RuntimeStatus::Stopped),
            Err(e) => Err(OrchestratorError::RuntimeQuery(format!(
                "inspect {}: {}",
                container_id, e
            ))),
        }
    }

    async fn query_stats(&self, container_id: &str) -> Result<ContainerStats, OrchestratorError> {
        let docker = self.docker().await?;
        // A non-streaming request waits for two samples so the CPU delta is populated.
        let options = StatsOptions {
            stream: false,
            one_shot: false,
        };
        let mut samples = Box::pin(docker.stats(container_id, Some(options)));
        let sample = tokio::time::timeout(self.timeout, samples.next())
            .await
            .map_err(|_| {
                OrchestratorError::RuntimeQuery(format!("stats for {} timed out", container_id))
            })?
            .ok_or_else(|| {
                OrchestratorError::RuntimeQuery(format!("no stats sample for {}", container_id))
            })?
            .map_err(|e| {
                OrchestratorError::RuntimeQuery(format!("stats {}: {}", container_id, e))
            })?;

        stats::normalize(&sample)
    }
}
