//! In-memory container runtime for dry runs and testing.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::info;

use super::{ContainerRuntime, ContainerSpec, ContainerSummary};
use crate::config::RegistryAuth;
use crate::error::{ControlError, ControlResult};

/// A container held by [`MemoryRuntime`].
#[derive(Debug, Clone)]
pub struct MemoryContainer {
    /// Generated container id.
    pub id: String,
    /// Spec the container was created from.
    pub spec: ContainerSpec,
    /// Whether the container is running.
    pub running: bool,
}

#[derive(Debug, Default)]
struct State {
    containers: BTreeMap<String, MemoryContainer>,
    pulls: Vec<String>,
    next_id: u64,
}

/// Container runtime that only records what it is asked to do.
///
/// Creation can be made to fail for chosen container names, and logs and
/// exec output can be scripted per container.
#[derive(Debug, Default)]
pub struct MemoryRuntime {
    state: RwLock<State>,
    failing: RwLock<BTreeSet<String>>,
    logs: RwLock<HashMap<String, String>>,
    exec_output: RwLock<HashMap<String, VecDeque<ControlResult<String>>>>,
}

impl MemoryRuntime {
    /// Create an empty runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make creation of the container named `name` fail.
    pub fn fail_on(&self, name: impl Into<String>) -> ControlResult<()> {
        self.failing
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?
            .insert(name.into());
        Ok(())
    }

    /// Set the log returned for container `name`.
    pub fn set_logs(&self, name: impl Into<String>, logs: impl Into<String>) -> ControlResult<()> {
        self.logs
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?
            .insert(name.into(), logs.into());
        Ok(())
    }

    /// Queue the result of the next exec in container `name`.
    pub fn push_exec(
        &self,
        name: impl Into<String>,
        result: ControlResult<String>,
    ) -> ControlResult<()> {
        self.exec_output
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?
            .entry(name.into())
            .or_default()
            .push_back(result);
        Ok(())
    }

    /// Every container created so far, keyed by name.
    pub fn containers(&self) -> ControlResult<BTreeMap<String, MemoryContainer>> {
        let state = self
            .state
            .read()
            .map_err(|_| ControlError::internal("lock poisoned"))?;
        Ok(state.containers.clone())
    }

    /// Images pulled so far, in pull order.
    pub fn pulls(&self) -> ControlResult<Vec<String>> {
        let state = self
            .state
            .read()
            .map_err(|_| ControlError::internal("lock poisoned"))?;
        Ok(state.pulls.clone())
    }
}

#[async_trait]
impl ContainerRuntime for MemoryRuntime {
    async fn pull_image(&self, image: &str, _auth: Option<&RegistryAuth>) -> ControlResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?;
        state.pulls.push(image.to_owned());
        Ok(())
    }

    async fn create_and_start(&self, spec: &ContainerSpec) -> ControlResult<String> {
        let failing = self
            .failing
            .read()
            .map_err(|_| ControlError::internal("lock poisoned"))?
            .contains(&spec.name);
        if failing {
            return Err(ControlError::runtime(format!(
                "failed to create container {}",
                spec.name
            )));
        }

        let mut state = self
            .state
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        state.next_id += 1;
        let id = format!("mem-{:012x}", state.next_id);
        state.containers.insert(
            spec.name.clone(),
            MemoryContainer {
                id: id.clone(),
                spec: spec.clone(),
                running: true,
            },
        );

        info!(container = %spec.name, id = %id, "started in-memory container");
        Ok(id)
    }

    async fn stop(&self, id: &str) -> ControlResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        let container = state
            .containers
            .values_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| ControlError::runtime(format!("no such container: {id}")))?;
        container.running = false;
        Ok(())
    }

    async fn remove(&self, id: &str) -> ControlResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        let before = state.containers.len();
        state.containers.retain(|_, c| c.id != id);
        if state.containers.len() == before {
            return Err(ControlError::runtime(format!("no such container: {id}")));
        }
        Ok(())
    }

    async fn list_containers(&self, pattern: &str) -> ControlResult<Vec<ContainerSummary>> {
        let state = self
            .state
            .read()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        Ok(state
            .containers
            .values()
            .filter(|c| c.spec.name.contains(pattern))
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                name: c.spec.name.clone(),
                image: c.spec.image.clone(),
                state: if c.running { "running" } else { "exited" }.to_owned(),
                labels: c.spec.labels.clone(),
            })
            .collect())
    }

    async fn logs(&self, name: &str) -> ControlResult<String> {
        let logs = self
            .logs
            .read()
            .map_err(|_| ControlError::internal("lock poisoned"))?;
        logs.get(name)
            .cloned()
            .ok_or_else(|| ControlError::runtime(format!("no such container: {name}")))
    }

    async fn exec(&self, name: &str, _args: &[String]) -> ControlResult<String> {
        let mut outputs = self
            .exec_output
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?;
        outputs
            .get_mut(name)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(ControlError::runtime(format!("no exec output for {name}"))))
    }
}
