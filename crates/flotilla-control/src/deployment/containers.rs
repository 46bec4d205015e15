//! Container naming, module pairs and per-pass container sets.

use std::collections::BTreeMap;

use crate::config::PlatformConfig;
use crate::environment::EnvironmentContext;
use crate::runtime::{ContainerSpec, PortBinding};
use crate::types::{ModuleDescriptor, ModuleKind, CONTAINER_PORT};

/// Suffix of sidecar container names and hostnames.
pub const SIDECAR_SUFFIX: &str = "-sc";

/// Label holding the module a container belongs to.
pub const LABEL_MODULE: &str = "flotilla.module";
/// Label holding the deployment pass of a container.
pub const LABEL_KIND: &str = "flotilla.kind";
/// Label holding the profile a container was deployed under.
pub const LABEL_PROFILE: &str = "flotilla.profile";
/// Label marking sidecar containers.
pub const LABEL_SIDECAR: &str = "flotilla.sidecar";

/// Derives container names and hostnames from the deployment profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerNaming {
    profile: String,
}

impl ContainerNaming {
    /// Naming for `profile`.
    #[must_use]
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
        }
    }

    /// Profile name.
    #[must_use]
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Prefix shared by every container of the profile.
    #[must_use]
    pub fn prefix(&self) -> String {
        format!("{}-", self.profile)
    }

    /// `<profile>-<module>`.
    #[must_use]
    pub fn module_container(&self, module: &str) -> String {
        format!("{}-{module}", self.profile)
    }

    /// `<profile>-<module>-sc`.
    #[must_use]
    pub fn sidecar_container(&self, module: &str) -> String {
        format!("{}-{module}{SIDECAR_SUFFIX}", self.profile)
    }

    /// Hostname of the module container.
    #[must_use]
    pub fn module_host(&self, module: &str) -> String {
        module.to_owned()
    }

    /// Hostname of the sidecar container.
    #[must_use]
    pub fn sidecar_host(&self, module: &str) -> String {
        format!("{module}{SIDECAR_SUFFIX}")
    }
}

/// Container settings shared by every module of a run.
#[derive(Debug, Clone)]
pub struct ContainerSettings {
    /// Network containers join.
    pub network: String,
    /// Restart policy.
    pub restart_policy: String,
    /// Host address ports are published on.
    pub bind_host: String,
    /// Sidecar image reference.
    pub sidecar_image: String,
    /// Sidecar memory limit in MB.
    pub sidecar_memory_mb: u32,
}

impl ContainerSettings {
    /// Settings from configuration.
    #[must_use]
    pub fn from_config(config: &PlatformConfig) -> Self {
        Self {
            network: config.network.name.clone(),
            restart_policy: config.network.restart_policy.clone(),
            bind_host: config.network.bind_host.clone(),
            sidecar_image: config.sidecar.image_ref(),
            sidecar_memory_mb: config.sidecar.memory_mb,
        }
    }
}

/// A module container and, when configured, its sidecar.
#[derive(Debug, Clone, PartialEq)]
pub struct ModulePair {
    /// Module container.
    pub module: ContainerSpec,
    /// Sidecar container.
    pub sidecar: Option<ContainerSpec>,
}

impl ModulePair {
    /// Build the container specs for `descriptor`.
    #[must_use]
    pub fn build(
        descriptor: &ModuleDescriptor,
        naming: &ContainerNaming,
        settings: &ContainerSettings,
        env: &EnvironmentContext,
    ) -> Self {
        let name = descriptor.name();
        let module_host = naming.module_host(name);
        let labels = |sidecar: bool| {
            BTreeMap::from([
                (LABEL_MODULE.to_owned(), name.to_owned()),
                (LABEL_KIND.to_owned(), descriptor.kind().as_str().to_owned()),
                (LABEL_PROFILE.to_owned(), naming.profile().to_owned()),
                (LABEL_SIDECAR.to_owned(), sidecar.to_string()),
            ])
        };

        let module = ContainerSpec {
            name: naming.module_container(name),
            hostname: module_host.clone(),
            image: descriptor.image.clone(),
            env: env.compose_module(descriptor),
            network: settings.network.clone(),
            restart_policy: settings.restart_policy.clone(),
            ports: vec![PortBinding {
                host_ip: settings.bind_host.clone(),
                host_port: descriptor.port,
                container_port: CONTAINER_PORT,
            }],
            memory_mb: descriptor.resources.memory_mb,
            cpus: descriptor.resources.cpus,
            labels: labels(false),
        };

        let sidecar = descriptor
            .private_port
            .filter(|_| descriptor.has_sidecar())
            .map(|port| {
                let sidecar_host = naming.sidecar_host(name);
                ContainerSpec {
                    name: naming.sidecar_container(name),
                    env: env.compose_sidecar(descriptor, &module_host, &sidecar_host),
                    hostname: sidecar_host,
                    image: settings.sidecar_image.clone(),
                    network: settings.network.clone(),
                    restart_policy: settings.restart_policy.clone(),
                    ports: vec![PortBinding {
                        host_ip: settings.bind_host.clone(),
                        host_port: port,
                        container_port: CONTAINER_PORT,
                    }],
                    memory_mb: settings.sidecar_memory_mb,
                    cpus: None,
                    labels: labels(true),
                }
            });

        Self { module, sidecar }
    }
}

/// Resolved modules of one deployment pass.
#[derive(Debug, Clone)]
pub struct ContainerSet {
    kind: ModuleKind,
    modules: BTreeMap<String, ModuleDescriptor>,
}

impl ContainerSet {
    /// Management modules out of `resolved`.
    #[must_use]
    pub fn management(resolved: &BTreeMap<String, ModuleDescriptor>) -> Self {
        Self::of_kind(ModuleKind::Management, resolved)
    }

    /// Business modules out of `resolved`.
    #[must_use]
    pub fn business(resolved: &BTreeMap<String, ModuleDescriptor>) -> Self {
        Self::of_kind(ModuleKind::Business, resolved)
    }

    /// Modules of `kind` out of `resolved`.
    #[must_use]
    pub fn of_kind(kind: ModuleKind, resolved: &BTreeMap<String, ModuleDescriptor>) -> Self {
        let modules = resolved
            .iter()
            .filter(|(_, descriptor)| descriptor.kind() == kind)
            .map(|(name, descriptor)| (name.clone(), descriptor.clone()))
            .collect();

        Self { kind, modules }
    }

    /// Which pass this set belongs to.
    #[must_use]
    pub const fn kind(&self) -> ModuleKind {
        self.kind
    }

    /// Every module of the pass, deployed or not.
    #[must_use]
    pub const fn modules(&self) -> &BTreeMap<String, ModuleDescriptor> {
        &self.modules
    }

    /// Modules whose container is deployed, in name order.
    pub fn deployable(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.modules
            .values()
            .filter(|descriptor| descriptor.flags.deploy_module)
    }

    /// Whether the pass has nothing to deploy.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deployable().next().is_none()
    }
}
