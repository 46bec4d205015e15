//! Core module types for flotilla-control.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// Name prefix of platform-internal management modules.
pub const MANAGEMENT_PREFIX: &str = "mgr-";

/// Name prefix of edge modules, which run without a sidecar by default.
pub const EDGE_PREFIX: &str = "edge-";

/// Port every module and sidecar listens on inside its container.
pub const CONTAINER_PORT: u16 = 8081;

/// Which deployment pass a module belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    /// Platform-internal module, matched by the `mgr-` prefix.
    Management,
    /// Tenant-facing module.
    Business,
}

impl ModuleKind {
    /// Classify a module by its name.
    #[must_use]
    pub fn of(name: &str) -> Self {
        if name.starts_with(MANAGEMENT_PREFIX) {
            Self::Management
        } else {
            Self::Business
        }
    }

    /// Name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Management => "management",
            Self::Business => "business",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A module identity split into name and version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleId {
    /// Module name, e.g. `mod-users`.
    pub name: String,
    /// Module version, e.g. `19.4.0-SNAPSHOT.123`.
    pub version: String,
}

#[allow(clippy::expect_used)]
fn module_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<name>[A-Za-z][A-Za-z0-9_-]*?)-(?P<version>[0-9][0-9A-Za-z.+_-]*)$")
            .expect("module id pattern is valid")
    })
}

impl ModuleId {
    /// Create a module id from its parts.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Split a registry id such as `mod-users-19.4.0` into name and version.
    pub fn parse(id: &str) -> ControlResult<Self> {
        let captures = module_id_pattern()
            .captures(id)
            .ok_or_else(|| ControlError::InvalidModuleId(id.to_owned()))?;

        Ok(Self::new(&captures["name"], &captures["version"]))
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

/// One entry of a remote registry listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryModule {
    /// Encoded `name-version` id.
    pub id: String,
    /// Install action, typically `enable`.
    #[serde(default = "default_action")]
    pub action: String,
}

fn default_action() -> String {
    "enable".to_owned()
}

impl RegistryModule {
    /// Create an `enable` entry.
    #[must_use]
    pub fn enable(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action: default_action(),
        }
    }

    /// Whether the entry asks for the module to be removed.
    #[must_use]
    pub fn is_disable(&self) -> bool {
        self.action.eq_ignore_ascii_case("disable")
    }
}

/// Container resource limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Memory limit in MB.
    pub memory_mb: u32,
    /// CPU quota, if limited.
    pub cpus: Option<f64>,
}

/// Default memory limit for module containers.
pub const DEFAULT_MODULE_MEMORY_MB: u32 = 768;

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_mb: DEFAULT_MODULE_MEMORY_MB,
            cpus: None,
        }
    }
}

/// Deployment switches of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct DeploymentFlags {
    /// Deploy the module container.
    pub deploy_module: bool,
    /// Pair the module with a sidecar.
    pub deploy_sidecar: bool,
    /// Inject secret-store wiring.
    pub use_vault: bool,
    /// Inject gateway and identity wiring into the module itself.
    pub use_gateway_url: bool,
    /// Disable the module's system user.
    pub disable_system_user: bool,
}

impl DeploymentFlags {
    /// Defaults for a module named `name`.
    #[must_use]
    pub fn defaults_for(name: &str) -> Self {
        Self {
            deploy_module: true,
            deploy_sidecar: !(name.starts_with(MANAGEMENT_PREFIX)
                || name.starts_with(EDGE_PREFIX)),
            use_vault: true,
            use_gateway_url: false,
            disable_system_user: false,
        }
    }
}

/// A fully resolved, deployable module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Name and resolved version.
    pub id: ModuleId,
    /// Deployment switches.
    pub flags: DeploymentFlags,
    /// Resource limits.
    pub resources: ResourceLimits,
    /// Host port published for the module.
    pub port: u16,
    /// Host port published for the sidecar, when one is deployed.
    pub private_port: Option<u16>,
    /// Image the module container runs.
    pub image: String,
    /// Whether `image` is built locally and must not be pulled.
    pub local_image: bool,
    /// Local checkout the image was built from.
    pub local_path: Option<PathBuf>,
    /// Declared module environment overrides.
    pub environment: BTreeMap<String, String>,
    /// Declared sidecar environment overrides.
    pub sidecar_environment: BTreeMap<String, String>,
}

impl ModuleDescriptor {
    /// Module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.id.name
    }

    /// Resolved version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.id.version
    }

    /// Which pass deploys this module.
    #[must_use]
    pub fn kind(&self) -> ModuleKind {
        ModuleKind::of(self.name())
    }

    /// Whether a sidecar container is deployed next to the module.
    #[must_use]
    pub const fn has_sidecar(&self) -> bool {
        self.flags.deploy_module && self.flags.deploy_sidecar
    }
}

/// Host ports published for one deployed module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulePorts {
    /// Module container port.
    pub module: u16,
    /// Sidecar container port, if a sidecar runs.
    pub sidecar: Option<u16>,
}

impl ModulePorts {
    /// Every published port, module first.
    pub fn iter(&self) -> impl Iterator<Item = u16> {
        std::iter::once(self.module).chain(self.sidecar)
    }
}

/// Bearer or root token that never shows up in logs.
#[derive(Clone)]
pub struct Token {
    inner: SecretString,
}

impl Token {
    /// Wrap a raw token.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: SecretString::from(value.into()),
        }
    }

    /// Expose the raw token for use in a header or environment variable.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.inner.expose_secret()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_release_id() {
        let id = ModuleId::parse("mod-users-19.4.0").unwrap();
        assert_eq!(id.name, "mod-users");
        assert_eq!(id.version, "19.4.0");
    }

    #[test]
    fn parse_snapshot_id() {
        let id = ModuleId::parse("mod-inventory-storage-27.2.0-SNAPSHOT.1042").unwrap();
        assert_eq!(id.name, "mod-inventory-storage");
        assert_eq!(id.version, "27.2.0-SNAPSHOT.1042");
    }

    #[test]
    fn parse_underscored_and_digit_names() {
        let id = ModuleId::parse("mod_roles-1.2.3").unwrap();
        assert_eq!(id.name, "mod_roles");

        let id = ModuleId::parse("edge-sip2-3.3.0").unwrap();
        assert_eq!(id.name, "edge-sip2");
        assert_eq!(id.version, "3.3.0");
    }

    #[test]
    fn parse_rejects_missing_version() {
        assert!(matches!(
            ModuleId::parse("mod-users"),
            Err(ControlError::InvalidModuleId(_))
        ));
        assert!(ModuleId::parse("1.0.0").is_err());
    }

    #[test]
    fn module_id_display_round_trips() {
        let id = ModuleId::new("mgr-tenants", "2.0.0");
        assert_eq!(id.to_string(), "mgr-tenants-2.0.0");
        assert_eq!(ModuleId::parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn module_kind_by_prefix() {
        assert_eq!(ModuleKind::of("mgr-tenants"), ModuleKind::Management);
        assert_eq!(ModuleKind::of("mod-users"), ModuleKind::Business);
        assert_eq!(ModuleKind::of("edge-oai-pmh"), ModuleKind::Business);
    }

    #[test]
    fn sidecar_defaults() {
        assert!(DeploymentFlags::defaults_for("mod-users").deploy_sidecar);
        assert!(!DeploymentFlags::defaults_for("mgr-tenants").deploy_sidecar);
        assert!(!DeploymentFlags::defaults_for("edge-patron").deploy_sidecar);
    }

    #[test]
    fn registry_disable_action() {
        let entry = RegistryModule {
            id: "mod-a-1.0.0".to_owned(),
            action: "Disable".to_owned(),
        };
        assert!(entry.is_disable());
        assert!(!RegistryModule::enable("mod-a-1.0.0").is_disable());
    }

    #[test]
    fn token_debug_is_redacted() {
        let token = Token::new("s3cr3t");
        assert_eq!(format!("{token:?}"), "[REDACTED]");
        assert_eq!(token.expose(), "s3cr3t");
    }

    #[test]
    fn module_ports_iterate_module_first() {
        let ports = ModulePorts {
            module: 30000,
            sidecar: Some(30001),
        };
        assert_eq!(ports.iter().collect::<Vec<_>>(), vec![30000, 30001]);
    }
}
