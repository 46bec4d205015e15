//! Container runtime abstraction.
//!
//! The orchestrator talks to containers only through [`ContainerRuntime`].
//! [`DockerCli`] drives a local docker daemon; [`MemoryRuntime`] records
//! what would have happened and is used for dry runs and tests.

mod docker;
mod memory;

pub use docker::DockerCli;
pub use memory::{MemoryContainer, MemoryRuntime};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{RegistryAuth, RuntimeConfig, RuntimeKind};
use crate::error::ControlResult;

/// A host port bound to a container port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    /// Host address the port is bound on.
    pub host_ip: String,
    /// Published host port.
    pub host_port: u16,
    /// Port inside the container.
    pub container_port: u16,
}

/// Everything needed to create and start one container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container name.
    pub name: String,
    /// Hostname on the shared network.
    pub hostname: String,
    /// Image reference.
    pub image: String,
    /// `KEY=VALUE` environment entries.
    pub env: Vec<String>,
    /// Network the container joins.
    pub network: String,
    /// Restart policy.
    pub restart_policy: String,
    /// Published ports.
    pub ports: Vec<PortBinding>,
    /// Memory limit in MB.
    pub memory_mb: u32,
    /// CPU quota.
    pub cpus: Option<f64>,
    /// Labels attached to the container.
    pub labels: BTreeMap<String, String>,
}

impl ContainerSpec {
    /// Container ports exposed by this container.
    #[must_use]
    pub fn exposed_ports(&self) -> Vec<u16> {
        self.ports.iter().map(|binding| binding.container_port).collect()
    }
}

/// A container as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    /// Runtime container id.
    pub id: String,
    /// Container name.
    pub name: String,
    /// Image the container runs.
    pub image: String,
    /// Runtime state, e.g. `running` or `exited`.
    pub state: String,
    /// Labels attached to the container.
    pub labels: BTreeMap<String, String>,
}

impl ContainerSummary {
    /// Whether the container is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.eq_ignore_ascii_case("running")
    }

    /// Value of label `key`.
    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Operations the orchestrator needs from a container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Pull an image, authenticating first when credentials are given.
    async fn pull_image(&self, image: &str, auth: Option<&RegistryAuth>) -> ControlResult<()>;

    /// Create and start a container, replacing one with the same name.
    ///
    /// Returns the container id.
    async fn create_and_start(&self, spec: &ContainerSpec) -> ControlResult<String>;

    /// Stop a container.
    async fn stop(&self, id: &str) -> ControlResult<()>;

    /// Remove a stopped container.
    async fn remove(&self, id: &str) -> ControlResult<()>;

    /// List containers whose name contains `pattern`, stopped ones included.
    async fn list_containers(&self, pattern: &str) -> ControlResult<Vec<ContainerSummary>>;

    /// Combined output log of a container.
    async fn logs(&self, name: &str) -> ControlResult<String>;

    /// Run a command inside a running container and return its stdout.
    async fn exec(&self, name: &str, args: &[String]) -> ControlResult<String>;
}

/// Create a container runtime from configuration.
#[must_use]
pub fn create_runtime(config: &RuntimeConfig) -> Arc<dyn ContainerRuntime> {
    match config.kind {
        RuntimeKind::Docker => Arc::new(DockerCli::new(config)),
        RuntimeKind::Memory => Arc::new(MemoryRuntime::new()),
    }
}
