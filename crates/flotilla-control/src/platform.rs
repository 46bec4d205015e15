//! Command pipeline.
//!
//! [`Platform`] owns the configuration and every collaborator, and exposes
//! one method per command. Commands run strictly in sequence; the only
//! concurrency lives inside a deployment pass and a readiness check.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info};

use crate::capability::CapabilitySaga;
use crate::clients::{
    ApiGateway, ApplicationDescriptor, BrokerAdmin, HttpClient, IdentityProvider, KafkaCliAdmin,
    KeycloakClient, KongAdminClient, ManagementClient, ManagementService, MemoryIdentityProvider,
    MemoryManagementService, ModuleDiscovery, ModuleRef, ScriptedBroker, SecretStore,
    StaticGateway, StaticSecretStore, TenantRecord, VaultLogScanner,
};
use crate::config::{PlatformConfig, RuntimeKind};
use crate::deployment::{ContainerNaming, ContainerSet, ContainerSettings, DeploymentOrchestrator};
use crate::environment::EnvironmentContext;
use crate::error::ControlResult;
use crate::ports::PortAllocator;
use crate::readiness::{create_probe, ReadinessProbe, ReadinessVerifier, StaticProbe};
use crate::registry::{HttpModuleRegistry, ModuleRegistry, ModuleResolver, StaticRegistry};
use crate::runtime::{create_runtime, ContainerRuntime, ContainerSummary};
use crate::tenants::{TenantAuth, TenantContext, TenantPartitioner, Traversal};
use crate::types::{ModuleDescriptor, ModuleKind, ModulePorts, Token, CONTAINER_PORT};

/// Root token announced by the in-memory secret store.
const DRY_RUN_TOKEN: &str = "dry-run-root-token";

/// Every external collaborator of a [`Platform`].
pub struct Collaborators {
    /// Container runtime.
    pub runtime: Arc<dyn ContainerRuntime>,
    /// Remote module listing.
    pub registry: Arc<dyn ModuleRegistry>,
    /// Readiness probe.
    pub probe: Arc<dyn ReadinessProbe>,
    /// Identity provider.
    pub identity: Arc<dyn IdentityProvider>,
    /// Management service.
    pub management: Arc<dyn ManagementService>,
    /// Message broker administration.
    pub broker: Arc<dyn BrokerAdmin>,
    /// API gateway.
    pub gateway: Arc<dyn ApiGateway>,
    /// Secret store.
    pub secrets: Arc<dyn SecretStore>,
}

impl Collaborators {
    /// Wire collaborators as selected by `config.runtime.kind`.
    ///
    /// The memory runtime wires in-memory services throughout, except that a
    /// configured registry is still consulted for module versions.
    pub fn from_config(config: &PlatformConfig) -> ControlResult<Self> {
        let runtime = create_runtime(&config.runtime);
        let http = HttpClient::new(&config.http)?;

        let registry: Arc<dyn ModuleRegistry> = if config.registry.urls.is_empty() {
            Arc::new(StaticRegistry::default())
        } else {
            Arc::new(HttpModuleRegistry::new(
                http.clone(),
                config.registry.urls.clone(),
            ))
        };

        if config.runtime.kind == RuntimeKind::Memory {
            let token = config
                .vault
                .root_token
                .clone()
                .unwrap_or_else(|| DRY_RUN_TOKEN.to_owned());
            return Ok(Self {
                registry,
                ..Self::in_memory(runtime, Token::new(token))
            });
        }

        let secrets: Arc<dyn SecretStore> = match &config.vault.root_token {
            Some(token) => Arc::new(StaticSecretStore::new(Token::new(token.clone()))),
            None => Arc::new(VaultLogScanner::new(
                Arc::clone(&runtime),
                config.vault.container.clone(),
            )),
        };

        Ok(Self {
            registry,
            probe: create_probe(&config.readiness)?,
            identity: Arc::new(KeycloakClient::new(
                http.clone(),
                &config.identity,
                config.management.url.clone(),
            )),
            management: Arc::new(ManagementClient::new(http.clone(), &config.management.url)),
            broker: Arc::new(KafkaCliAdmin::new(Arc::clone(&runtime), &config.broker)),
            gateway: Arc::new(KongAdminClient::new(http, config.gateway.admin_url.clone())),
            secrets,
            runtime,
        })
    }

    /// In-memory collaborators around `runtime`.
    #[must_use]
    pub fn in_memory(runtime: Arc<dyn ContainerRuntime>, root_token: Token) -> Self {
        Self {
            runtime,
            registry: Arc::new(StaticRegistry::default()),
            probe: Arc::new(StaticProbe::new(true)),
            identity: Arc::new(MemoryIdentityProvider::new()),
            management: Arc::new(MemoryManagementService::new()),
            broker: Arc::new(ScriptedBroker::quiescent()),
            gateway: Arc::new(StaticGateway::new(true)),
            secrets: Arc::new(StaticSecretStore::new(root_token)),
        }
    }
}

/// Published ports of both deployment passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentReport {
    /// Ports of the management pass.
    pub management: BTreeMap<String, ModulePorts>,
    /// Ports of the business pass.
    pub business: BTreeMap<String, ModulePorts>,
}

/// The orchestrator's command surface.
pub struct Platform {
    config: PlatformConfig,
    runtime: Arc<dyn ContainerRuntime>,
    registry: Arc<dyn ModuleRegistry>,
    identity: Arc<dyn IdentityProvider>,
    management: Arc<dyn ManagementService>,
    gateway: Arc<dyn ApiGateway>,
    secrets: Arc<dyn SecretStore>,
    resolver: ModuleResolver,
    orchestrator: DeploymentOrchestrator,
    readiness: ReadinessVerifier,
    partitioner: TenantPartitioner,
    saga: CapabilitySaga,
}

impl Platform {
    /// Assemble a platform from configuration and collaborators.
    pub fn new(config: PlatformConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            runtime,
            registry,
            probe,
            identity,
            management,
            broker,
            gateway,
            secrets,
        } = collaborators;

        let orchestrator = DeploymentOrchestrator::new(
            Arc::clone(&runtime),
            ContainerNaming::new(config.profile.name.clone()),
            ContainerSettings::from_config(&config),
            config.registry.auth.clone(),
        );
        let readiness = ReadinessVerifier::new(
            probe,
            config.readiness.max_retries,
            config.readiness.retry_delay(),
        );
        let partitioner =
            TenantPartitioner::new(&config, Arc::clone(&identity), Arc::clone(&management));
        let saga = CapabilitySaga::new(broker, Arc::clone(&identity), &config.saga);

        Self {
            resolver: ModuleResolver::from_config(&config),
            config,
            runtime,
            registry,
            identity,
            management,
            gateway,
            secrets,
            orchestrator,
            readiness,
            partitioner,
            saga,
        }
    }

    /// Assemble a platform with collaborators wired from `config`.
    pub fn from_config(config: PlatformConfig) -> ControlResult<Self> {
        let collaborators = Collaborators::from_config(&config)?;
        Ok(Self::new(config, collaborators))
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &PlatformConfig {
        &self.config
    }

    /// Container runtime in use.
    #[must_use]
    pub fn runtime(&self) -> &Arc<dyn ContainerRuntime> {
        &self.runtime
    }

    /// Root token of the secret store.
    pub async fn vault_root_token(&self) -> ControlResult<Token> {
        self.secrets.root_token().await
    }

    /// Resolve configured modules against the registry listing.
    ///
    /// Ports are allocated from a fresh allocator on every call.
    pub async fn resolve_modules(&self) -> ControlResult<BTreeMap<String, ModuleDescriptor>> {
        let listing = self.registry.fetch().await?;
        let mut allocator = PortAllocator::new(self.config.ports.range());
        let resolved = self
            .resolver
            .resolve(self.config.modules.clone(), &listing, &mut allocator)?;

        debug!(modules = resolved.len(), ports = ?allocator.issued(), "resolved modules");
        Ok(resolved)
    }

    /// Run every step: deploy both passes, then provision tenants.
    pub async fn deploy_application(&self) -> ControlResult<DeploymentReport> {
        info!(profile = %self.config.profile.name, "deploying application");

        let env = self.environment().await?;
        let resolved = self.resolve_modules().await?;

        let management = self
            .deploy_pass(&ContainerSet::management(&resolved), &env)
            .await?;
        self.readiness.wait_for_gateway(self.gateway.as_ref()).await?;

        let business_set = ContainerSet::business(&resolved);
        let business = self.deploy_pass(&business_set, &env).await?;
        self.register_application(&business_set).await?;

        self.create_tenants().await?;
        self.create_tenant_entitlements().await?;
        self.create_roles().await?;
        self.create_users().await?;
        self.attach_capability_sets().await?;

        info!(profile = %self.config.profile.name, "application deployed");
        Ok(DeploymentReport {
            management,
            business,
        })
    }

    /// Deploy the management pass and wait for it to become ready.
    pub async fn deploy_management(&self) -> ControlResult<BTreeMap<String, ModulePorts>> {
        let env = self.environment().await?;
        let resolved = self.resolve_modules().await?;
        self.deploy_pass(&ContainerSet::management(&resolved), &env)
            .await
    }

    /// Deploy the business pass, wait for it and register it.
    pub async fn deploy_modules(&self) -> ControlResult<BTreeMap<String, ModulePorts>> {
        let env = self.environment().await?;
        let resolved = self.resolve_modules().await?;
        let set = ContainerSet::business(&resolved);

        let ports = self.deploy_pass(&set, &env).await?;
        self.register_application(&set).await?;
        Ok(ports)
    }

    /// Remove every management container.
    pub async fn undeploy_management(&self) -> ControlResult<Vec<String>> {
        self.orchestrator.undeploy(ModuleKind::Management).await
    }

    /// Remove every business module and sidecar container.
    pub async fn undeploy_modules(&self) -> ControlResult<Vec<String>> {
        self.orchestrator.undeploy(ModuleKind::Business).await
    }

    /// Containers of the profile, optionally restricted to one pass.
    pub async fn list_modules(
        &self,
        kind: Option<ModuleKind>,
    ) -> ControlResult<Vec<ContainerSummary>> {
        match kind {
            Some(kind) => self.orchestrator.list(kind).await,
            None => {
                let mut containers = self.orchestrator.list(ModuleKind::Management).await?;
                containers.extend(self.orchestrator.list(ModuleKind::Business).await?);
                Ok(containers)
            }
        }
    }

    /// Create configured tenants that do not exist yet, partition by partition.
    ///
    /// Returns the tenants that were created.
    pub async fn create_tenants(&self) -> ControlResult<Vec<TenantRecord>> {
        let master = self.partitioner.master_token().await?;
        let existing = self.management.list_tenants(&master).await?;
        let mut created = Vec::new();

        for partition in self.partitioner.partitions() {
            let description = partition.description();
            for name in self.partitioner.configured(&partition) {
                if existing.iter().any(|t| t.name == name) {
                    debug!(tenant = %name, "tenant already exists");
                    continue;
                }
                created.push(
                    self.management
                        .create_tenant(&master, name, &description)
                        .await?,
                );
            }
        }

        if let Some(seconds) = self.config.identity.access_token_lifespan_secs {
            for tenant in self.config.tenants.keys() {
                self.identity
                    .update_realm_access_token_lifespan(&master, tenant, seconds)
                    .await?;
            }
        }

        info!(created = created.len(), "tenants created");
        Ok(created)
    }

    /// Remove configured tenants, member partitions before central ones.
    pub async fn remove_tenants(&self) -> ControlResult<()> {
        let management = self.management.as_ref();
        self.visit_tenants(Traversal::Reverse, TenantAuth::Master, move |ctx| async move {
            management.remove_tenant(&ctx.token, &ctx.tenant.id).await
        })
        .await
    }

    /// Entitle every configured tenant to the application.
    pub async fn create_tenant_entitlements(&self) -> ControlResult<()> {
        let management = self.management.as_ref();
        let applications = vec![self.config.application.id()];
        let applications = applications.as_slice();
        self.visit_tenants(Traversal::Forward, TenantAuth::Master, move |ctx| async move {
            management
                .create_tenant_entitlement(&ctx.token, &ctx.tenant.id, applications)
                .await
        })
        .await
    }

    /// Revoke the application entitlements of every configured tenant.
    pub async fn remove_tenant_entitlements(&self) -> ControlResult<()> {
        let management = self.management.as_ref();
        let applications = vec![self.config.application.id()];
        let applications = applications.as_slice();
        self.visit_tenants(Traversal::Reverse, TenantAuth::Master, move |ctx| async move {
            management
                .remove_tenant_entitlements(&ctx.token, &ctx.tenant.id, applications)
                .await
        })
        .await
    }

    /// Create the configured roles in every tenant.
    pub async fn create_roles(&self) -> ControlResult<()> {
        let identity = self.identity.as_ref();
        let roles = &self.config.roles;
        self.visit_tenants(Traversal::Forward, TenantAuth::Tenant, move |ctx| async move {
            identity.create_roles(&ctx.token, &ctx.tenant.name, roles).await
        })
        .await
    }

    /// Remove the configured roles from every tenant.
    pub async fn remove_roles(&self) -> ControlResult<()> {
        let identity = self.identity.as_ref();
        let roles = &self.config.roles;
        self.visit_tenants(Traversal::Reverse, TenantAuth::Tenant, move |ctx| async move {
            identity.remove_roles(&ctx.token, &ctx.tenant.name, roles).await
        })
        .await
    }

    /// Create the configured users in every tenant.
    pub async fn create_users(&self) -> ControlResult<()> {
        let identity = self.identity.as_ref();
        let users = &self.config.users;
        self.visit_tenants(Traversal::Forward, TenantAuth::Tenant, move |ctx| async move {
            identity.create_users(&ctx.token, &ctx.tenant.name, users).await
        })
        .await
    }

    /// Attach capability sets in every tenant once the platform is quiescent.
    pub async fn attach_capability_sets(&self) -> ControlResult<()> {
        let saga = &self.saga;
        let roles = &self.config.roles;
        self.visit_tenants(Traversal::Forward, TenantAuth::Tenant, move |ctx| async move {
            saga.attach(&ctx.token, &ctx.tenant.name, roles).await
        })
        .await
    }

    /// Detach capability sets in every tenant, ignoring failures.
    pub async fn detach_capability_sets(&self) -> ControlResult<()> {
        let saga = &self.saga;
        let roles = &self.config.roles;
        self.visit_tenants(Traversal::Reverse, TenantAuth::Tenant, move |ctx| async move {
            saga.detach(&ctx.token, &ctx.tenant.name, roles).await;
            Ok(())
        })
        .await
    }

    async fn environment(&self) -> ControlResult<EnvironmentContext> {
        let token = self.vault_root_token().await?;
        Ok(EnvironmentContext::from_config(&self.config, Some(token)))
    }

    async fn deploy_pass(
        &self,
        set: &ContainerSet,
        env: &EnvironmentContext,
    ) -> ControlResult<BTreeMap<String, ModulePorts>> {
        if set.is_empty() {
            info!(kind = %set.kind(), "nothing to deploy");
            return Ok(BTreeMap::new());
        }

        let ports = self.orchestrator.deploy_all(set, env).await?;
        self.readiness.check_all(set.kind(), &ports).await?;
        Ok(ports)
    }

    /// Register the application descriptor and where its modules live.
    async fn register_application(&self, set: &ContainerSet) -> ControlResult<()> {
        if set.is_empty() {
            return Ok(());
        }

        let token = self.partitioner.master_token().await?;
        let application = &self.config.application;
        let naming = self.orchestrator.naming();

        let modules: Vec<ModuleRef> = set
            .deployable()
            .map(|m| ModuleRef {
                id: m.id.to_string(),
                name: m.name().to_owned(),
                version: m.version().to_owned(),
            })
            .collect();
        let descriptor = ApplicationDescriptor {
            id: application.id(),
            name: application.name.clone(),
            version: application.version.clone(),
            platform: application.platform.clone(),
            modules,
        };
        self.management.create_application(&token, &descriptor).await?;

        let discovery: Vec<ModuleDiscovery> = set
            .deployable()
            .map(|m| {
                let host = if m.has_sidecar() {
                    naming.sidecar_host(m.name())
                } else {
                    naming.module_host(m.name())
                };
                ModuleDiscovery {
                    id: m.id.to_string(),
                    name: m.name().to_owned(),
                    version: m.version().to_owned(),
                    location: format!("http://{host}:{CONTAINER_PORT}"),
                }
            })
            .collect();
        self.management.register_discovery(&token, &discovery).await
    }

    /// Run `f` for every live tenant of every partition.
    async fn visit_tenants<F, Fut>(
        &self,
        traversal: Traversal,
        auth: TenantAuth,
        f: F,
    ) -> ControlResult<()>
    where
        F: Fn(TenantContext) -> Fut,
        Fut: Future<Output = ControlResult<()>>,
    {
        let partitioner = &self.partitioner;
        let f = &f;
        partitioner
            .for_each_partition(traversal, move |partition| async move {
                partitioner.for_each_tenant(&partition, auth, f).await
            })
            .await
    }
}
