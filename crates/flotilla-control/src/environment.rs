//! Container environment composition.
//!
//! Every container environment is built from ordered layers. A key keeps the
//! position of its first insertion and the value of its last one, so later
//! layers override earlier ones while the output stays stable between runs.
//!
//! Module layers, in order:
//!
//! 1. global shared environment
//! 2. secret store wiring, when the module uses the vault
//! 3. identity and gateway wiring, when the module uses the gateway URL
//! 4. module identity (`SERVER_PORT`, `MODULE_NAME`, `MODULE_VERSION`)
//! 5. declared module overrides, keys upper-cased
//!
//! Sidecars get the same global and vault layers, the sidecar defaults from
//! configuration, identity wiring unconditionally, then their own module
//! pointers and declared sidecar overrides.

use std::collections::BTreeMap;

use crate::config::PlatformConfig;
use crate::types::{ModuleDescriptor, Token, CONTAINER_PORT};

/// Secret store wiring injected into containers that use the vault.
#[derive(Debug, Clone)]
pub struct VaultWiring {
    /// Address containers reach the secret store on.
    pub url: String,
    /// Root token handed to containers.
    pub token: Token,
}

/// Identity provider wiring.
#[derive(Debug, Clone)]
pub struct IdentityWiring {
    /// Issuer address as seen from inside the container network.
    pub url: String,
    /// Administration client id.
    pub admin_client_id: String,
    /// Client id used for module-to-module calls.
    pub service_client_id: String,
    /// Suffix of per-tenant login clients.
    pub login_client_suffix: String,
}

/// Everything the composer needs besides the module itself.
#[derive(Debug, Clone)]
pub struct EnvironmentContext {
    /// Environment shared by every container.
    pub global: BTreeMap<String, String>,
    /// Defaults applied to every sidecar.
    pub sidecar_defaults: BTreeMap<String, String>,
    /// Secret store wiring, absent when no token is known.
    pub vault: Option<VaultWiring>,
    /// Identity provider wiring.
    pub identity: IdentityWiring,
    /// Gateway address handed to modules as `OKAPI_URL`.
    pub gateway_url: String,
}

impl EnvironmentContext {
    /// Build a context from configuration and an optional vault token.
    #[must_use]
    pub fn from_config(config: &PlatformConfig, vault_token: Option<Token>) -> Self {
        Self {
            global: config.environment.clone(),
            sidecar_defaults: config.sidecar.environment.clone(),
            vault: vault_token.map(|token| VaultWiring {
                url: config.vault.url.clone(),
                token,
            }),
            identity: IdentityWiring {
                url: config.identity.internal_url.clone(),
                admin_client_id: config.identity.admin_client_id.clone(),
                service_client_id: config.identity.service_client_id.clone(),
                login_client_suffix: config.identity.login_client_suffix.clone(),
            },
            gateway_url: config.gateway.internal_url.clone(),
        }
    }

    /// Environment of a module container.
    #[must_use]
    pub fn compose_module(&self, module: &ModuleDescriptor) -> Vec<String> {
        let mut env = EnvBuilder::default();
        env.extend(&self.global);

        if module.flags.use_vault {
            self.vault_layer(&mut env);
        }
        if module.flags.use_gateway_url {
            self.identity_layer(&mut env);
            env.set("OKAPI_URL", &self.gateway_url);
        }

        env.set("SERVER_PORT", CONTAINER_PORT.to_string());
        env.set("MODULE_NAME", module.name());
        env.set("MODULE_VERSION", module.version());
        if module.flags.disable_system_user {
            env.set("SYSTEM_USER_ENABLED", "false");
        }

        env.extend(&module.environment);
        env.build()
    }

    /// Environment of the sidecar paired with `module`.
    ///
    /// `module_host` and `sidecar_host` are the container hostnames on the
    /// shared network.
    #[must_use]
    pub fn compose_sidecar(
        &self,
        module: &ModuleDescriptor,
        module_host: &str,
        sidecar_host: &str,
    ) -> Vec<String> {
        let mut env = EnvBuilder::default();
        env.extend(&self.global);
        env.extend(&self.sidecar_defaults);

        if module.flags.use_vault {
            self.vault_layer(&mut env);
        }
        self.identity_layer(&mut env);

        env.set("MODULE_NAME", module.name());
        env.set("MODULE_VERSION", module.version());
        env.set("MODULE_URL", format!("http://{module_host}:{CONTAINER_PORT}"));
        env.set("SIDECAR_URL", format!("http://{sidecar_host}:{CONTAINER_PORT}"));
        env.set("SIDECAR_NAME", sidecar_host);

        env.extend(&module.sidecar_environment);
        env.build()
    }

    fn vault_layer(&self, env: &mut EnvBuilder) {
        if let Some(vault) = &self.vault {
            env.set("SECRET_STORE_TYPE", "VAULT");
            env.set("SECRET_STORE_VAULT_TOKEN", vault.token.expose());
            env.set("SECRET_STORE_VAULT_ADDRESS", &vault.url);
        }
    }

    fn identity_layer(&self, env: &mut EnvBuilder) {
        env.set("KC_URL", &self.identity.url);
        env.set("KC_ADMIN_CLIENT_ID", &self.identity.admin_client_id);
        env.set("KC_SERVICE_CLIENT_ID", &self.identity.service_client_id);
        env.set("KC_LOGIN_CLIENT_SUFFIX", &self.identity.login_client_suffix);
    }
}

/// Ordered, last-writer-wins `KEY=VALUE` list.
///
/// Keys are upper-cased on every layer, so keys differing only in case
/// collapse into one entry.
#[derive(Debug, Default)]
struct EnvBuilder {
    entries: Vec<(String, String)>,
}

impl EnvBuilder {
    fn set(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        let key = key.as_ref().to_uppercase();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    fn extend(&mut self, layer: &BTreeMap<String, String>) {
        for (key, value) in layer {
            self.set(key, value.as_str());
        }
    }

    fn build(self) -> Vec<String> {
        self.entries
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeploymentFlags, ModuleId, ResourceLimits};

    fn descriptor(name: &str) -> ModuleDescriptor {
        ModuleDescriptor {
            id: ModuleId::new(name, "1.2.3"),
            flags: DeploymentFlags::defaults_for(name),
            resources: ResourceLimits::default(),
            port: 30000,
            private_port: Some(30001),
            image: format!("folioci/{name}:1.2.3"),
            local_image: false,
            local_path: None,
            environment: BTreeMap::new(),
            sidecar_environment: BTreeMap::new(),
        }
    }

    fn context() -> EnvironmentContext {
        let mut config = PlatformConfig::default();
        config
            .environment
            .insert("DB_HOST".to_owned(), "postgres".to_owned());
        config
            .environment
            .insert("JAVA_OPTIONS".to_owned(), "-Xmx256m".to_owned());
        EnvironmentContext::from_config(&config, Some(Token::new("root-token")))
    }

    fn value<'a>(env: &'a [String], key: &str) -> Option<&'a str> {
        let prefix = format!("{key}=");
        env.iter().find_map(|entry| entry.strip_prefix(prefix.as_str()))
    }

    #[test]
    fn module_layers_in_order() {
        let env = context().compose_module(&descriptor("mod-users"));

        assert_eq!(env[0], "DB_HOST=postgres");
        assert_eq!(value(&env, "SECRET_STORE_TYPE"), Some("VAULT"));
        assert_eq!(value(&env, "SECRET_STORE_VAULT_TOKEN"), Some("root-token"));
        assert_eq!(value(&env, "SERVER_PORT"), Some("8081"));
        assert_eq!(value(&env, "MODULE_NAME"), Some("mod-users"));
        assert_eq!(value(&env, "MODULE_VERSION"), Some("1.2.3"));
        assert_eq!(value(&env, "KC_URL"), None);
        assert_eq!(value(&env, "SYSTEM_USER_ENABLED"), None);
    }

    #[test]
    fn gateway_wiring_only_when_requested() {
        let mut module = descriptor("mod-users");
        module.flags.use_gateway_url = true;

        let env = context().compose_module(&module);
        assert_eq!(value(&env, "OKAPI_URL"), Some("http://api-gateway:8000"));
        assert_eq!(value(&env, "KC_URL"), Some("http://keycloak:8080"));
    }

    #[test]
    fn vault_layer_skipped_when_disabled() {
        let mut module = descriptor("mod-users");
        module.flags.use_vault = false;

        let env = context().compose_module(&module);
        assert_eq!(value(&env, "SECRET_STORE_TYPE"), None);
    }

    #[test]
    fn overrides_win_and_keep_first_position() {
        let mut module = descriptor("mod-users");
        module
            .environment
            .insert("java_options".to_owned(), "-Xmx1g".to_owned());
        module
            .environment
            .insert("server_port".to_owned(), "9000".to_owned());

        let env = context().compose_module(&module);

        assert_eq!(env[1], "JAVA_OPTIONS=-Xmx1g");
        assert_eq!(value(&env, "SERVER_PORT"), Some("9000"));
        assert_eq!(env.iter().filter(|e| e.starts_with("JAVA_OPTIONS=")).count(), 1);
    }

    #[test]
    fn keys_differing_in_case_collapse() {
        let mut config = PlatformConfig::default();
        config
            .environment
            .insert("db_host".to_owned(), "postgres".to_owned());
        let context = EnvironmentContext::from_config(&config, None);

        let mut module = descriptor("mod-users");
        module
            .environment
            .insert("DB_HOST".to_owned(), "replica".to_owned());

        let env = context.compose_module(&module);
        assert_eq!(env[0], "DB_HOST=replica");
        assert_eq!(
            env.iter()
                .filter(|e| e.to_uppercase().starts_with("DB_HOST="))
                .count(),
            1
        );
    }

    #[test]
    fn disabled_system_user() {
        let mut module = descriptor("mod-users");
        module.flags.disable_system_user = true;

        let env = context().compose_module(&module);
        assert_eq!(value(&env, "SYSTEM_USER_ENABLED"), Some("false"));
    }

    #[test]
    fn sidecar_gets_identity_and_pointers() {
        let mut module = descriptor("mod-users");
        module
            .sidecar_environment
            .insert("kc_url".to_owned(), "http://other:8080".to_owned());

        let env = context().compose_sidecar(&module, "mod-users", "mod-users-sc");

        assert_eq!(value(&env, "MODULE_URL"), Some("http://mod-users:8081"));
        assert_eq!(value(&env, "SIDECAR_URL"), Some("http://mod-users-sc:8081"));
        assert_eq!(value(&env, "SIDECAR_NAME"), Some("mod-users-sc"));
        assert_eq!(value(&env, "KC_URL"), Some("http://other:8080"));
        assert_eq!(value(&env, "SECRET_STORE_TYPE"), Some("VAULT"));
        assert_eq!(value(&env, "SERVER_PORT"), None);
    }

    #[test]
    fn missing_token_skips_vault_wiring() {
        let context = EnvironmentContext::from_config(&PlatformConfig::default(), None);
        let env = context.compose_module(&descriptor("mod-users"));
        assert_eq!(value(&env, "SECRET_STORE_TYPE"), None);
    }
}
