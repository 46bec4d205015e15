//! Module descriptor resolution.
//!
//! Configuration-declared modules are merged with a remote registry listing
//! into deployable [`ModuleDescriptor`]s. The listing itself is fetched
//! through the [`ModuleRegistry`] collaborator.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::clients::http::HttpClient;
use crate::config::{ModuleOverrides, ModuleSpec, PlatformConfig};
use crate::error::{ControlError, ControlResult};
use crate::ports::PortAllocator;
use crate::types::{DeploymentFlags, ModuleDescriptor, ModuleId, RegistryModule, ResourceLimits};

/// Source of the remote module listing.
#[async_trait]
pub trait ModuleRegistry: Send + Sync {
    /// Fetch every listed module.
    async fn fetch(&self) -> ControlResult<Vec<RegistryModule>>;
}

/// Registry listing served as JSON arrays of `{ "id", "action" }`.
#[derive(Debug, Clone)]
pub struct HttpModuleRegistry {
    http: HttpClient,
    urls: Vec<String>,
}

impl HttpModuleRegistry {
    /// Create a registry client over one or more listing URLs.
    #[must_use]
    pub fn new(http: HttpClient, urls: Vec<String>) -> Self {
        Self { http, urls }
    }
}

#[async_trait]
impl ModuleRegistry for HttpModuleRegistry {
    async fn fetch(&self) -> ControlResult<Vec<RegistryModule>> {
        let mut listing = Vec::new();
        for url in &self.urls {
            let entries: Vec<RegistryModule> =
                self.http.json("registry", |c| c.get(url)).await?;
            debug!(url = %url, count = entries.len(), "fetched registry listing");
            listing.extend(entries);
        }
        Ok(listing)
    }
}

/// Fixed listing, used when no registry is configured and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    modules: Vec<RegistryModule>,
}

impl StaticRegistry {
    /// Create a registry serving `modules`.
    #[must_use]
    pub fn new(modules: Vec<RegistryModule>) -> Self {
        Self { modules }
    }
}

#[async_trait]
impl ModuleRegistry for StaticRegistry {
    async fn fetch(&self) -> ControlResult<Vec<RegistryModule>> {
        Ok(self.modules.clone())
    }
}

/// Merges configuration entries with a registry listing.
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    namespace: String,
}

impl ModuleResolver {
    /// Create a resolver that names pulled images `<namespace>/<name>:<version>`.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Create a resolver from platform configuration.
    #[must_use]
    pub fn from_config(config: &PlatformConfig) -> Self {
        Self::new(config.registry.namespace.clone())
    }

    /// Resolve module entries into descriptors.
    ///
    /// A name that occurs more than once is merged field by field, later
    /// entries winning. Explicit ports are reserved before any port is
    /// auto-allocated, and auto-allocation walks modules in name order.
    pub fn resolve<I>(
        &self,
        entries: I,
        listing: &[RegistryModule],
        allocator: &mut PortAllocator,
    ) -> ControlResult<BTreeMap<String, ModuleDescriptor>>
    where
        I: IntoIterator<Item = (String, ModuleSpec)>,
    {
        let mut merged: BTreeMap<String, ModuleSpec> = BTreeMap::new();
        for (name, spec) in entries {
            let entry = merged.remove(&name).unwrap_or_default();
            merged.insert(name, entry.merge(spec));
        }

        let registry_versions = registry_versions(listing);

        let mut pending = Vec::with_capacity(merged.len());
        for (name, spec) in &merged {
            pending.push(self.resolve_one(name, spec, &registry_versions)?);
        }

        for module in &pending {
            if !module.descriptor.flags.deploy_module {
                continue;
            }
            if let Some(port) = module.explicit_port {
                allocator.reserve(port)?;
            }
            if let Some(port) = module.explicit_private_port {
                allocator.reserve(port)?;
            }
        }

        let mut resolved = BTreeMap::new();
        for module in pending {
            let mut descriptor = module.descriptor;
            if descriptor.flags.deploy_module {
                descriptor.port = match module.explicit_port {
                    Some(port) => port,
                    None => allocator.allocate()?,
                };
                if descriptor.flags.deploy_sidecar {
                    descriptor.private_port = Some(match module.explicit_private_port {
                        Some(port) => port,
                        None => allocator.allocate()?,
                    });
                }
            }

            info!(
                module = %descriptor.id.name,
                version = %descriptor.id.version,
                port = descriptor.port,
                sidecar_port = ?descriptor.private_port,
                "resolved module"
            );
            resolved.insert(descriptor.id.name.clone(), descriptor);
        }

        Ok(resolved)
    }

    fn resolve_one(
        &self,
        name: &str,
        spec: &ModuleSpec,
        registry_versions: &BTreeMap<String, String>,
    ) -> ControlResult<PendingModule> {
        let empty = ModuleOverrides::default();
        let overrides = spec.overrides().unwrap_or(&empty);

        let defaults = DeploymentFlags::defaults_for(name);
        let flags = DeploymentFlags {
            deploy_module: overrides.deploy_module.unwrap_or(defaults.deploy_module),
            deploy_sidecar: overrides.deploy_sidecar.unwrap_or(defaults.deploy_sidecar),
            use_vault: overrides.use_vault.unwrap_or(defaults.use_vault),
            use_gateway_url: overrides.use_gateway_url.unwrap_or(defaults.use_gateway_url),
            disable_system_user: overrides
                .disable_system_user
                .unwrap_or(defaults.disable_system_user),
        };

        let version = match (&overrides.version, registry_versions.get(name)) {
            (Some(fixed), _) => fixed.clone(),
            (None, Some(listed)) => listed.clone(),
            (None, None) if flags.deploy_module => {
                return Err(ControlError::ModuleVersionUnresolved {
                    module: name.to_owned(),
                });
            }
            (None, None) => {
                warn!(module = %name, "module has no version and is not deployed");
                String::new()
            }
        };

        let local_path = overrides.local_path.clone();
        if let Some(path) = &local_path {
            validate_local_path(name, path)?;
        }

        let image = if local_path.is_some() {
            format!("{name}:{version}")
        } else {
            format!("{}/{name}:{version}", self.namespace)
        };

        let defaults = ResourceLimits::default();
        let descriptor = ModuleDescriptor {
            id: ModuleId::new(name, version),
            flags,
            resources: ResourceLimits {
                memory_mb: overrides.memory_mb.unwrap_or(defaults.memory_mb),
                cpus: overrides.cpus.or(defaults.cpus),
            },
            port: 0,
            private_port: None,
            image,
            local_image: local_path.is_some(),
            local_path,
            environment: overrides.environment.clone().unwrap_or_default(),
            sidecar_environment: overrides.sidecar_environment.clone().unwrap_or_default(),
        };

        Ok(PendingModule {
            descriptor,
            explicit_port: overrides.port,
            explicit_private_port: overrides.private_port,
        })
    }
}

struct PendingModule {
    descriptor: ModuleDescriptor,
    explicit_port: Option<u16>,
    explicit_private_port: Option<u16>,
}

/// Latest enabled version per module name.
///
/// Entries whose id carries no version are not modules this resolver can
/// deploy; they are skipped rather than failing the whole listing.
fn registry_versions(listing: &[RegistryModule]) -> BTreeMap<String, String> {
    let mut versions = BTreeMap::new();
    for entry in listing.iter().filter(|entry| !entry.is_disable()) {
        match ModuleId::parse(&entry.id) {
            Ok(id) => {
                versions.insert(id.name, id.version);
            }
            Err(_) => warn!(id = %entry.id, "skipping malformed registry id"),
        }
    }
    versions
}

fn validate_local_path(module: &str, path: &Path) -> ControlResult<()> {
    if path.is_dir() {
        return Ok(());
    }
    Err(ControlError::InvalidLocalPath {
        module: module.to_owned(),
        path: path.display().to_string(),
    })
}
