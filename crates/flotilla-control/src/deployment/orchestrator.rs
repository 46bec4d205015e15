//! Deployment passes over a container set.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::containers::{
    ContainerNaming, ContainerSet, ContainerSettings, ModulePair, LABEL_KIND, LABEL_PROFILE,
};
use super::images::ImageCache;
use crate::config::RegistryAuth;
use crate::environment::EnvironmentContext;
use crate::error::{ControlError, ControlResult};
use crate::runtime::{ContainerRuntime, ContainerSpec, ContainerSummary};
use crate::types::{ModuleKind, ModulePorts};

/// Creates, lists and removes the containers of a deployment pass.
pub struct DeploymentOrchestrator {
    runtime: Arc<dyn ContainerRuntime>,
    naming: ContainerNaming,
    settings: ContainerSettings,
    images: Arc<ImageCache>,
    auth: Option<RegistryAuth>,
}

impl DeploymentOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        naming: ContainerNaming,
        settings: ContainerSettings,
        auth: Option<RegistryAuth>,
    ) -> Self {
        Self {
            runtime,
            naming,
            settings,
            images: Arc::new(ImageCache::new()),
            auth,
        }
    }

    /// Container naming in use.
    #[must_use]
    pub const fn naming(&self) -> &ContainerNaming {
        &self.naming
    }

    /// Deploy every module of `set`.
    ///
    /// Module containers are created one after another in name order. Each
    /// sidecar is created by its own task as soon as its module container is
    /// up. The pass succeeds only when every module and every sidecar has been
    /// created. The first failure ends the pass, and sidecar tasks still in
    /// flight are cancelled.
    ///
    /// Returns the published ports of each deployed module.
    pub async fn deploy_all(
        &self,
        set: &ContainerSet,
        env: &EnvironmentContext,
    ) -> ControlResult<BTreeMap<String, ModulePorts>> {
        let kind = set.kind();
        info!(kind = %kind, modules = set.deployable().count(), "starting deployment pass");

        let cancel = CancellationToken::new();
        let _cancel_on_exit = cancel.clone().drop_guard();
        let mut sidecars = JoinSet::new();
        let mut ports = BTreeMap::new();

        for descriptor in set.deployable() {
            let name = descriptor.name();
            let pair = ModulePair::build(descriptor, &self.naming, &self.settings, env);

            if !descriptor.local_image {
                self.images
                    .ensure(self.runtime.as_ref(), &descriptor.image, self.auth.as_ref())
                    .await?;
            }

            if let Err(e) = self.runtime.create_and_start(&pair.module).await {
                error!(module = %name, error = %e, "module container failed");
                return Err(e);
            }
            debug!(module = %name, port = descriptor.port, "module container started");

            if let Some(sidecar) = pair.sidecar {
                sidecars.spawn(deploy_sidecar(
                    Arc::clone(&self.runtime),
                    Arc::clone(&self.images),
                    self.auth.clone(),
                    sidecar,
                    cancel.clone(),
                ));
            }

            ports.insert(
                name.to_owned(),
                ModulePorts {
                    module: descriptor.port,
                    sidecar: descriptor.private_port.filter(|_| descriptor.has_sidecar()),
                },
            );
        }

        while let Some(joined) = sidecars.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(e) => return Err(ControlError::internal(format!("sidecar task failed: {e}"))),
            }
        }

        info!(kind = %kind, deployed = ports.len(), "deployment pass complete");
        Ok(ports)
    }

    /// Stop and remove every container of the `kind` pass.
    ///
    /// Stopping is best effort, since a container may already have exited.
    /// Returns the names of the removed containers.
    pub async fn undeploy(&self, kind: ModuleKind) -> ControlResult<Vec<String>> {
        let containers = self.list(kind).await?;
        info!(kind = %kind, containers = containers.len(), "removing containers");

        let mut removed = Vec::with_capacity(containers.len());
        for container in containers {
            if container.is_running() {
                if let Err(e) = self.runtime.stop(&container.id).await {
                    warn!(container = %container.name, error = %e, "failed to stop container");
                }
            }
            self.runtime.remove(&container.id).await?;
            debug!(container = %container.name, "removed container");
            removed.push(container.name);
        }

        Ok(removed)
    }

    /// Containers of the `kind` pass under the current profile.
    pub async fn list(&self, kind: ModuleKind) -> ControlResult<Vec<ContainerSummary>> {
        let containers = self
            .runtime
            .list_containers(&self.naming.prefix())
            .await?;

        Ok(containers
            .into_iter()
            .filter(|c| c.label(LABEL_PROFILE) == Some(self.naming.profile()))
            .filter(|c| c.label(LABEL_KIND) == Some(kind.as_str()))
            .collect())
    }
}

async fn deploy_sidecar(
    runtime: Arc<dyn ContainerRuntime>,
    images: Arc<ImageCache>,
    auth: Option<RegistryAuth>,
    spec: ContainerSpec,
    cancel: CancellationToken,
) -> ControlResult<()> {
    let create = async {
        images
            .ensure(runtime.as_ref(), &spec.image, auth.as_ref())
            .await?;
        runtime.create_and_start(&spec).await
    };

    tokio::select! {
        () = cancel.cancelled() => {
            warn!(container = %spec.name, "sidecar deployment cancelled");
            Err(ControlError::runtime(format!("sidecar {} cancelled", spec.name)))
        }
        created = create => match created {
            Ok(_) => {
                debug!(container = %spec.name, "sidecar container started");
                Ok(())
            }
            Err(e) => {
                error!(container = %spec.name, error = %e, "sidecar container failed");
                Err(e)
            }
        },
    }
}
