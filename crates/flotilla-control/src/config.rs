//! Configuration for flotilla.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

use crate::error::{ControlError, ControlResult};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "flotilla.toml";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "FLOTILLA_";

/// Top-level platform configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PlatformConfig {
    /// Deployment profile.
    #[serde(default)]
    pub profile: ProfileConfig,

    /// Host port allocation range.
    #[serde(default)]
    pub ports: PortsConfig,

    /// Module registry and image settings.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Sidecar image settings.
    #[serde(default)]
    pub sidecar: SidecarConfig,

    /// Container network settings.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Environment shared by every module container.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    /// Secret store settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Identity provider settings.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Management service settings.
    #[serde(default)]
    pub management: ManagementConfig,

    /// API gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Message broker settings.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Readiness probe settings.
    #[serde(default)]
    pub readiness: ReadinessConfig,

    /// Capability-set attachment settings.
    #[serde(default)]
    pub saga: SagaConfig,

    /// Shared HTTP client settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Container runtime settings.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Application descriptor settings.
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Modules to deploy, keyed by module name.
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleSpec>,

    /// Consortiums, keyed by consortium name.
    #[serde(default)]
    pub consortiums: BTreeMap<String, ConsortiumConfig>,

    /// Tenants, keyed by tenant name.
    #[serde(default)]
    pub tenants: BTreeMap<String, TenantConfig>,

    /// Roles created in every tenant, keyed by role name.
    #[serde(default)]
    pub roles: BTreeMap<String, RoleConfig>,

    /// Users created in every tenant, keyed by username.
    #[serde(default)]
    pub users: BTreeMap<String, UserConfig>,
}

impl PlatformConfig {
    /// Load configuration from the default sources.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. `flotilla.toml` in the current directory (if present)
    /// 3. Environment variables with `FLOTILLA_` prefix
    pub fn load() -> ControlResult<Self> {
        Self::from_file(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from a specific TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> ControlResult<Self> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| ControlError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants that serde cannot express.
    pub fn validate(&self) -> ControlResult<()> {
        if self.ports.start >= self.ports.end {
            return Err(ControlError::config(format!(
                "port range [{}, {}) is empty",
                self.ports.start, self.ports.end
            )));
        }

        if self.profile.name.trim().is_empty() {
            return Err(ControlError::config("profile name must not be empty"));
        }

        if self.saga.poll_interval_millis == 0 {
            return Err(ControlError::config("saga poll interval must be positive"));
        }

        let mut centrals = BTreeSet::new();
        for (tenant, config) in &self.tenants {
            match &config.consortium {
                Some(consortium) => {
                    if !self.consortiums.contains_key(consortium) {
                        return Err(ControlError::config(format!(
                            "tenant {tenant} references unknown consortium {consortium}"
                        )));
                    }
                    if config.central && !centrals.insert(consortium.as_str()) {
                        return Err(ControlError::config(format!(
                            "consortium {consortium} has more than one central tenant"
                        )));
                    }
                }
                None if config.central => {
                    return Err(ControlError::config(format!(
                        "tenant {tenant} is central but belongs to no consortium"
                    )));
                }
                None => {}
            }
        }

        Ok(())
    }
}

/// Deployment profile.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
    /// Profile name, used as the container name prefix.
    #[serde(default = "default_profile_name")]
    pub name: String,
}

fn default_profile_name() -> String {
    "flotilla".to_owned()
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            name: default_profile_name(),
        }
    }
}

/// Host port allocation range, half-open.
#[derive(Debug, Clone, Deserialize)]
pub struct PortsConfig {
    /// First port handed out.
    #[serde(default = "default_port_start")]
    pub start: u16,

    /// One past the last port handed out.
    #[serde(default = "default_port_end")]
    pub end: u16,
}

const fn default_port_start() -> u16 {
    30000
}

const fn default_port_end() -> u16 {
    31000
}

impl PortsConfig {
    /// The configured range.
    #[must_use]
    pub const fn range(&self) -> Range<u16> {
        self.start..self.end
    }
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            start: default_port_start(),
            end: default_port_end(),
        }
    }
}

/// Module registry and image settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Registry listing URLs, fetched in order.
    #[serde(default)]
    pub urls: Vec<String>,

    /// Image namespace for module images.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Credentials for pulling images.
    pub auth: Option<RegistryAuth>,
}

fn default_namespace() -> String {
    "folioci".to_owned()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            namespace: default_namespace(),
            auth: None,
        }
    }
}

/// Image registry credentials.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RegistryAuth {
    /// Registry host; empty for the default registry.
    #[serde(default)]
    pub server: String,
    /// Username.
    pub username: String,
    /// Password or token.
    pub password: String,
}

/// Sidecar image settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SidecarConfig {
    /// Sidecar image repository.
    #[serde(default = "default_sidecar_image")]
    pub image: String,

    /// Sidecar image tag.
    #[serde(default = "default_sidecar_version")]
    pub version: String,

    /// Memory limit for sidecar containers in MB.
    #[serde(default = "default_sidecar_memory_mb")]
    pub memory_mb: u32,

    /// Environment applied to every sidecar before module overrides.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

fn default_sidecar_image() -> String {
    "folioci/folio-module-sidecar".to_owned()
}

fn default_sidecar_version() -> String {
    "latest".to_owned()
}

const fn default_sidecar_memory_mb() -> u32 {
    400
}

impl SidecarConfig {
    /// Full image reference.
    #[must_use]
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.version)
    }
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            image: default_sidecar_image(),
            version: default_sidecar_version(),
            memory_mb: default_sidecar_memory_mb(),
            environment: BTreeMap::new(),
        }
    }
}

/// Container network settings.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Container network every module joins.
    #[serde(default = "default_network_name")]
    pub name: String,

    /// Restart policy applied to created containers.
    #[serde(default = "default_restart_policy")]
    pub restart_policy: String,

    /// Address the host ports are bound on.
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
}

fn default_network_name() -> String {
    "flotilla".to_owned()
}

fn default_restart_policy() -> String {
    "unless-stopped".to_owned()
}

fn default_bind_host() -> String {
    "0.0.0.0".to_owned()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: default_network_name(),
            restart_policy: default_restart_policy(),
            bind_host: default_bind_host(),
        }
    }
}

/// Secret store settings.
#[derive(Debug, Clone, Deserialize)]
pub struct VaultConfig {
    /// Address modules use to reach the secret store.
    #[serde(default = "default_vault_url")]
    pub url: String,

    /// Container whose startup log carries the root token.
    #[serde(default = "default_vault_container")]
    pub container: String,

    /// Explicit root token; skips the log scan when set.
    pub root_token: Option<String>,
}

fn default_vault_url() -> String {
    "http://vault:8200".to_owned()
}

fn default_vault_container() -> String {
    "vault".to_owned()
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            url: default_vault_url(),
            container: default_vault_container(),
            root_token: None,
        }
    }
}

/// Identity provider settings.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Address the CLI uses to reach the identity provider.
    #[serde(default = "default_identity_url")]
    pub url: String,

    /// Issuer address handed to containers.
    #[serde(default = "default_identity_internal_url")]
    pub internal_url: String,

    /// Realm holding the platform administration client.
    #[serde(default = "default_master_realm")]
    pub master_realm: String,

    /// Client used for master-realm client-credentials grants.
    #[serde(default = "default_admin_client_id")]
    pub admin_client_id: String,

    /// Secret of the administration client.
    #[serde(default)]
    pub admin_client_secret: String,

    /// Suffix appended to the tenant name to form its login client id.
    #[serde(default = "default_login_client_suffix")]
    pub login_client_suffix: String,

    /// Client id sidecars use to call each other.
    #[serde(default = "default_service_client_id")]
    pub service_client_id: String,

    /// Tenant administrator used for per-tenant password grants.
    #[serde(default = "default_tenant_admin_username")]
    pub tenant_admin_username: String,

    /// Tenant administrator password.
    #[serde(default)]
    pub tenant_admin_password: String,

    /// Access token lifespan applied to every tenant realm after creation.
    pub access_token_lifespan_secs: Option<u64>,
}

fn default_identity_url() -> String {
    "http://localhost:8080".to_owned()
}

fn default_identity_internal_url() -> String {
    "http://keycloak:8080".to_owned()
}

fn default_master_realm() -> String {
    "master".to_owned()
}

fn default_admin_client_id() -> String {
    "folio-backend-admin-client".to_owned()
}

fn default_login_client_suffix() -> String {
    "-login-app".to_owned()
}

fn default_service_client_id() -> String {
    "sidecar-module-access-client".to_owned()
}

fn default_tenant_admin_username() -> String {
    "admin".to_owned()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            url: default_identity_url(),
            internal_url: default_identity_internal_url(),
            master_realm: default_master_realm(),
            admin_client_id: default_admin_client_id(),
            admin_client_secret: String::new(),
            login_client_suffix: default_login_client_suffix(),
            service_client_id: default_service_client_id(),
            tenant_admin_username: default_tenant_admin_username(),
            tenant_admin_password: String::new(),
            access_token_lifespan_secs: None,
        }
    }
}

/// Management service settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ManagementConfig {
    /// Base URL of the tenant/application management API.
    #[serde(default = "default_management_url")]
    pub url: String,
}

fn default_management_url() -> String {
    "http://localhost:8000".to_owned()
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            url: default_management_url(),
        }
    }
}

/// API gateway settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Gateway address handed to modules with `use_gateway_url`.
    #[serde(default = "default_gateway_internal_url")]
    pub internal_url: String,

    /// Gateway admin API used for route status.
    #[serde(default = "default_gateway_admin_url")]
    pub admin_url: String,
}

fn default_gateway_internal_url() -> String {
    "http://api-gateway:8000".to_owned()
}

fn default_gateway_admin_url() -> String {
    "http://localhost:8001".to_owned()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            internal_url: default_gateway_internal_url(),
            admin_url: default_gateway_admin_url(),
        }
    }
}

/// Message broker settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Broker container used for admin commands.
    #[serde(default = "default_broker_container")]
    pub container: String,

    /// Bootstrap server as seen from inside the broker container.
    #[serde(default = "default_bootstrap_server")]
    pub bootstrap_server: String,

    /// Consumer-group admin script.
    #[serde(default = "default_consumer_groups_script")]
    pub script: String,
}

fn default_broker_container() -> String {
    "kafka".to_owned()
}

fn default_bootstrap_server() -> String {
    "kafka:9092".to_owned()
}

fn default_consumer_groups_script() -> String {
    "kafka-consumer-groups.sh".to_owned()
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            container: default_broker_container(),
            bootstrap_server: default_bootstrap_server(),
            script: default_consumer_groups_script(),
        }
    }
}

/// Readiness probe settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadinessConfig {
    /// Attempts per port before the module is declared unready.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between attempts in milliseconds.
    #[serde(default = "default_retry_delay_millis")]
    pub retry_delay_millis: u64,

    /// Kind of probe to run.
    #[serde(default)]
    pub probe: ProbeKind,

    /// Host the published ports are reachable on.
    #[serde(default = "default_probe_host")]
    pub host: String,

    /// Health endpoint for HTTP probes.
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

const fn default_max_retries() -> u32 {
    50
}

const fn default_retry_delay_millis() -> u64 {
    5000
}

fn default_probe_host() -> String {
    "localhost".to_owned()
}

fn default_health_path() -> String {
    "/admin/health".to_owned()
}

impl ReadinessConfig {
    /// Delay between attempts.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_millis)
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_millis: default_retry_delay_millis(),
            probe: ProbeKind::default(),
            host: default_probe_host(),
            health_path: default_health_path(),
        }
    }
}

/// Kind of readiness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    /// HTTP GET against the health endpoint.
    #[default]
    Http,

    /// Plain TCP connect.
    Tcp,
}

/// Capability-set attachment settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SagaConfig {
    /// Consumer group that processes capability events.
    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,

    /// Delay before polling starts, in seconds.
    #[serde(default)]
    pub initial_delay_secs: u64,

    /// Interval between polls in milliseconds.
    #[serde(default = "default_poll_interval_millis")]
    pub poll_interval_millis: u64,

    /// Total time to wait for quiescence, in seconds.
    #[serde(default = "default_saga_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_consumer_group() -> String {
    "mod-roles-keycloak-capability-group".to_owned()
}

const fn default_poll_interval_millis() -> u64 {
    10_000
}

const fn default_saga_timeout_secs() -> u64 {
    600
}

impl SagaConfig {
    /// Delay before polling starts.
    #[must_use]
    pub const fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    /// Interval between polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis)
    }

    /// Total polling budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            consumer_group: default_consumer_group(),
            initial_delay_secs: 0,
            poll_interval_millis: default_poll_interval_millis(),
            timeout_secs: default_saga_timeout_secs(),
        }
    }
}

/// Shared HTTP client settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per request, including the first.
    #[serde(default = "default_http_attempts")]
    pub attempts: u32,

    /// Delay between attempts in milliseconds.
    #[serde(default = "default_http_retry_delay_millis")]
    pub retry_delay_millis: u64,
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_http_attempts() -> u32 {
    3
}

const fn default_http_retry_delay_millis() -> u64 {
    2000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_request_timeout_secs(),
            attempts: default_http_attempts(),
            retry_delay_millis: default_http_retry_delay_millis(),
        }
    }
}

/// Container runtime settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Which runtime implementation to use.
    #[serde(default)]
    pub kind: RuntimeKind,

    /// Path to the docker binary.
    #[serde(default = "default_docker_binary")]
    pub docker_binary: String,

    /// Timeout for a single runtime command, in seconds.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

fn default_docker_binary() -> String {
    "docker".to_owned()
}

const fn default_command_timeout_secs() -> u64 {
    300
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            kind: RuntimeKind::default(),
            docker_binary: default_docker_binary(),
            command_timeout_secs: default_command_timeout_secs(),
        }
    }
}

/// Type of container runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeKind {
    /// Docker through its command-line client.
    #[default]
    Docker,

    /// In-memory runtime with in-memory collaborators (dry run).
    Memory,
}

/// Application descriptor settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationConfig {
    /// Application name.
    #[serde(default = "default_application_name")]
    pub name: String,

    /// Application version.
    #[serde(default = "default_application_version")]
    pub version: String,

    /// Platform the application targets.
    #[serde(default = "default_application_platform")]
    pub platform: String,
}

fn default_application_name() -> String {
    "app-platform".to_owned()
}

fn default_application_version() -> String {
    "1.0.0".to_owned()
}

fn default_application_platform() -> String {
    "base".to_owned()
}

impl ApplicationConfig {
    /// Application id, `name-version`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_application_name(),
            version: default_application_version(),
            platform: default_application_platform(),
        }
    }
}

/// Per-module configuration entry.
///
/// An empty table yields [`ModuleSpec::Default`]; anything else is an
/// explicit set of overrides resolved field by field.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(from = "Option<ModuleOverrides>")]
pub enum ModuleSpec {
    /// Every field takes its default.
    #[default]
    Default,

    /// Fields present here win over the defaults.
    Explicit(ModuleOverrides),
}

impl From<Option<ModuleOverrides>> for ModuleSpec {
    fn from(value: Option<ModuleOverrides>) -> Self {
        match value {
            Some(overrides) if !overrides.is_empty() => Self::Explicit(overrides),
            _ => Self::Default,
        }
    }
}

impl ModuleSpec {
    /// Overrides carried by this entry, if any.
    #[must_use]
    pub const fn overrides(&self) -> Option<&ModuleOverrides> {
        match self {
            Self::Default => None,
            Self::Explicit(overrides) => Some(overrides),
        }
    }

    /// Merge a later entry for the same module into this one.
    #[must_use]
    pub fn merge(self, later: Self) -> Self {
        match (self, later) {
            (earlier, Self::Default) => earlier,
            (Self::Default, later) => later,
            (Self::Explicit(earlier), Self::Explicit(later)) => {
                Self::Explicit(earlier.merge(later))
            }
        }
    }
}

/// Explicit per-module settings; absent fields fall back to defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ModuleOverrides {
    /// Whether the module container is deployed.
    pub deploy_module: Option<bool>,
    /// Whether a sidecar is paired with the module.
    pub deploy_sidecar: Option<bool>,
    /// Whether secret-store wiring is injected.
    pub use_vault: Option<bool>,
    /// Whether gateway and identity wiring is injected into the module.
    #[serde(alias = "use_okapi_url")]
    pub use_gateway_url: Option<bool>,
    /// Whether the module's system user is disabled.
    pub disable_system_user: Option<bool>,
    /// Fixed version; skips the registry lookup.
    pub version: Option<String>,
    /// Fixed host port for the module container.
    pub port: Option<u16>,
    /// Fixed host port for the sidecar container.
    pub private_port: Option<u16>,
    /// Memory limit in MB.
    pub memory_mb: Option<u32>,
    /// CPU quota in whole or fractional CPUs.
    pub cpus: Option<f64>,
    /// Module environment overrides.
    pub environment: Option<BTreeMap<String, String>>,
    /// Sidecar environment overrides.
    pub sidecar_environment: Option<BTreeMap<String, String>>,
    /// Local checkout the module image was built from.
    pub local_path: Option<PathBuf>,
}

impl ModuleOverrides {
    /// Whether no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Field-wise merge; fields set in `later` win, environment maps merge by key.
    #[must_use]
    pub fn merge(self, later: Self) -> Self {
        Self {
            deploy_module: later.deploy_module.or(self.deploy_module),
            deploy_sidecar: later.deploy_sidecar.or(self.deploy_sidecar),
            use_vault: later.use_vault.or(self.use_vault),
            use_gateway_url: later.use_gateway_url.or(self.use_gateway_url),
            disable_system_user: later.disable_system_user.or(self.disable_system_user),
            version: later.version.or(self.version),
            port: later.port.or(self.port),
            private_port: later.private_port.or(self.private_port),
            memory_mb: later.memory_mb.or(self.memory_mb),
            cpus: later.cpus.or(self.cpus),
            environment: merge_maps(self.environment, later.environment),
            sidecar_environment: merge_maps(self.sidecar_environment, later.sidecar_environment),
            local_path: later.local_path.or(self.local_path),
        }
    }
}

fn merge_maps(
    earlier: Option<BTreeMap<String, String>>,
    later: Option<BTreeMap<String, String>>,
) -> Option<BTreeMap<String, String>> {
    match (earlier, later) {
        (Some(mut earlier), Some(later)) => {
            earlier.extend(later);
            Some(earlier)
        }
        (earlier, later) => later.or(earlier),
    }
}

/// Consortium settings.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConsortiumConfig {
    /// Human readable name.
    pub display_name: Option<String>,
}

/// Tenant settings.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TenantConfig {
    /// Consortium the tenant belongs to.
    pub consortium: Option<String>,

    /// Whether the tenant is its consortium's central tenant.
    #[serde(default)]
    pub central: bool,
}

/// Role settings.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RoleConfig {
    /// Role description.
    #[serde(default)]
    pub description: String,

    /// Capability sets attached to the role; empty means all of them.
    #[serde(default)]
    pub capability_sets: Vec<String>,
}

/// User settings.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UserConfig {
    /// Initial password.
    #[serde(default)]
    pub password: String,

    /// Roles assigned to the user.
    #[serde(default)]
    pub roles: Vec<String>,
}
