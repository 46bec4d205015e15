//! Configuration fixtures for platform integration tests.

use flotilla_control::config::{
    ConsortiumConfig, ModuleOverrides, ModuleSpec, RoleConfig, TenantConfig, UserConfig,
};
use flotilla_control::PlatformConfig;

/// Builder for test [`PlatformConfig`]s with fast readiness and saga timing.
pub struct ConfigBuilder {
    config: PlatformConfig,
}

impl ConfigBuilder {
    /// Empty configuration.
    pub fn new() -> Self {
        let mut config = PlatformConfig::default();
        config.readiness.max_retries = 3;
        config.readiness.retry_delay_millis = 1;
        config.saga.poll_interval_millis = 10_000;
        config.saga.timeout_secs = 600;
        Self { config }
    }

    /// Module that takes every default.
    pub fn module(mut self, name: &str) -> Self {
        self.config
            .modules
            .insert(name.to_owned(), ModuleSpec::Default);
        self
    }

    /// Module with explicit overrides.
    pub fn module_with(mut self, name: &str, overrides: ModuleOverrides) -> Self {
        self.config
            .modules
            .insert(name.to_owned(), ModuleSpec::Explicit(overrides));
        self
    }

    /// Module pinned to `version`.
    pub fn pinned(self, name: &str, version: &str) -> Self {
        self.module_with(
            name,
            ModuleOverrides {
                version: Some(version.to_owned()),
                ..ModuleOverrides::default()
            },
        )
    }

    /// Tenant outside any consortium.
    pub fn tenant(mut self, name: &str) -> Self {
        self.config
            .tenants
            .insert(name.to_owned(), TenantConfig::default());
        self
    }

    /// Tenant of `consortium`, created on first use.
    pub fn consortium_tenant(mut self, name: &str, consortium: &str, central: bool) -> Self {
        self.config
            .consortiums
            .entry(consortium.to_owned())
            .or_insert_with(ConsortiumConfig::default);
        self.config.tenants.insert(
            name.to_owned(),
            TenantConfig {
                consortium: Some(consortium.to_owned()),
                central,
            },
        );
        self
    }

    /// Role with every capability set.
    pub fn role(mut self, name: &str) -> Self {
        self.config.roles.insert(
            name.to_owned(),
            RoleConfig {
                description: format!("{name} role"),
                capability_sets: Vec::new(),
            },
        );
        self
    }

    /// User holding `roles`.
    pub fn user(mut self, name: &str, roles: &[&str]) -> Self {
        self.config.users.insert(
            name.to_owned(),
            UserConfig {
                password: name.to_owned(),
                roles: roles.iter().map(|r| (*r).to_owned()).collect(),
            },
        );
        self
    }

    /// Finish the configuration.
    pub fn build(self) -> PlatformConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
