//! In-memory identity and management services for dry runs and tests.
//!
//! Both record every call in order so tests can assert on sequencing.

use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use super::{
    ApplicationDescriptor, GrantType, IdentityProvider, ManagementService, ModuleDiscovery,
    TenantRecord,
};
use crate::config::{RoleConfig, UserConfig};
use crate::error::{ControlError, ControlResult};
use crate::types::Token;

fn poisoned<T>(_: T) -> ControlError {
    ControlError::internal("lock poisoned")
}

/// Identity provider that records calls instead of making them.
#[derive(Debug, Default)]
pub struct MemoryIdentityProvider {
    calls: RwLock<Vec<String>>,
    failing: RwLock<HashSet<String>>,
}

impl MemoryIdentityProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call concerning `tenant` fail.
    pub fn fail_tenant(&self, tenant: impl Into<String>) -> ControlResult<()> {
        self.failing.write().map_err(poisoned)?.insert(tenant.into());
        Ok(())
    }

    /// Calls made so far, formatted as `operation:target[:detail]`.
    pub fn calls(&self) -> ControlResult<Vec<String>> {
        Ok(self.calls.read().map_err(poisoned)?.clone())
    }

    fn record(&self, tenant: &str, call: String) -> ControlResult<()> {
        if self.failing.read().map_err(poisoned)?.contains(tenant) {
            return Err(ControlError::Api {
                service: "identity",
                status: 500,
                body: format!("injected failure for {tenant}"),
            });
        }
        self.calls.write().map_err(poisoned)?.push(call);
        Ok(())
    }
}

fn names<'a>(keys: impl Iterator<Item = &'a String>) -> String {
    keys.map(String::as_str).collect::<Vec<_>>().join(",")
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn access_token(&self, realm: &str, grant: GrantType) -> ControlResult<Token> {
        let kind = match grant {
            GrantType::ClientCredentials => "client",
            GrantType::Password => "password",
        };
        self.record(realm, format!("token:{realm}:{kind}"))?;
        Ok(Token::new(format!("{realm}-{kind}-token")))
    }

    async fn create_roles(
        &self,
        _token: &Token,
        tenant: &str,
        roles: &BTreeMap<String, RoleConfig>,
    ) -> ControlResult<()> {
        self.record(tenant, format!("create-roles:{tenant}:{}", names(roles.keys())))
    }

    async fn remove_roles(
        &self,
        _token: &Token,
        tenant: &str,
        roles: &BTreeMap<String, RoleConfig>,
    ) -> ControlResult<()> {
        self.record(tenant, format!("remove-roles:{tenant}:{}", names(roles.keys())))
    }

    async fn create_users(
        &self,
        _token: &Token,
        tenant: &str,
        users: &BTreeMap<String, UserConfig>,
    ) -> ControlResult<()> {
        self.record(tenant, format!("create-users:{tenant}:{}", names(users.keys())))
    }

    async fn attach_capability_sets(
        &self,
        _token: &Token,
        tenant: &str,
        roles: &BTreeMap<String, RoleConfig>,
    ) -> ControlResult<()> {
        self.record(tenant, format!("attach:{tenant}:{}", names(roles.keys())))
    }

    async fn detach_capability_sets(
        &self,
        _token: &Token,
        tenant: &str,
        roles: &BTreeMap<String, RoleConfig>,
    ) -> ControlResult<()> {
        self.record(tenant, format!("detach:{tenant}:{}", names(roles.keys())))
    }

    async fn update_realm_access_token_lifespan(
        &self,
        _token: &Token,
        realm: &str,
        seconds: u64,
    ) -> ControlResult<()> {
        self.record(realm, format!("lifespan:{realm}:{seconds}"))
    }
}

#[derive(Debug, Default)]
struct ManagementState {
    tenants: Vec<TenantRecord>,
    next_id: u64,
    calls: Vec<String>,
    applications: Vec<ApplicationDescriptor>,
    discovery: Vec<ModuleDiscovery>,
}

/// Management service backed by a vector of tenants.
#[derive(Debug, Default)]
pub struct MemoryManagementService {
    state: RwLock<ManagementState>,
}

impl MemoryManagementService {
    /// Create an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutating calls made so far, formatted as `operation:target`.
    pub fn calls(&self) -> ControlResult<Vec<String>> {
        Ok(self.state.read().map_err(poisoned)?.calls.clone())
    }

    /// Tenants currently known.
    pub fn tenants(&self) -> ControlResult<Vec<TenantRecord>> {
        Ok(self.state.read().map_err(poisoned)?.tenants.clone())
    }

    /// Applications registered so far.
    pub fn applications(&self) -> ControlResult<Vec<ApplicationDescriptor>> {
        Ok(self.state.read().map_err(poisoned)?.applications.clone())
    }

    /// Discovery entries registered so far.
    pub fn discovery(&self) -> ControlResult<Vec<ModuleDiscovery>> {
        Ok(self.state.read().map_err(poisoned)?.discovery.clone())
    }

    fn tenant_name(state: &ManagementState, tenant_id: &str) -> ControlResult<String> {
        state
            .tenants
            .iter()
            .find(|t| t.id == tenant_id)
            .map(|t| t.name.clone())
            .ok_or_else(|| ControlError::Api {
                service: "management",
                status: 404,
                body: format!("tenant {tenant_id} not found"),
            })
    }
}

#[async_trait]
impl ManagementService for MemoryManagementService {
    async fn list_tenants(&self, _token: &Token) -> ControlResult<Vec<TenantRecord>> {
        self.tenants()
    }

    async fn create_tenant(
        &self,
        _token: &Token,
        name: &str,
        description: &str,
    ) -> ControlResult<TenantRecord> {
        let mut state = self.state.write().map_err(poisoned)?;
        if state.tenants.iter().any(|t| t.name == name) {
            return Err(ControlError::Api {
                service: "management",
                status: 409,
                body: format!("tenant {name} already exists"),
            });
        }

        state.next_id += 1;
        let tenant = TenantRecord {
            id: format!("tenant-{:04}", state.next_id),
            name: name.to_owned(),
            description: description.to_owned(),
        };
        state.tenants.push(tenant.clone());
        state.calls.push(format!("create-tenant:{name}"));
        Ok(tenant)
    }

    async fn remove_tenant(&self, _token: &Token, tenant_id: &str) -> ControlResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        let name = Self::tenant_name(&state, tenant_id)?;
        state.tenants.retain(|t| t.id != tenant_id);
        state.calls.push(format!("remove-tenant:{name}"));
        Ok(())
    }

    async fn create_tenant_entitlement(
        &self,
        _token: &Token,
        tenant_id: &str,
        application_ids: &[String],
    ) -> ControlResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        let name = Self::tenant_name(&state, tenant_id)?;
        state
            .calls
            .push(format!("entitle:{name}:{}", application_ids.join(",")));
        Ok(())
    }

    async fn remove_tenant_entitlements(
        &self,
        _token: &Token,
        tenant_id: &str,
        application_ids: &[String],
    ) -> ControlResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        let name = Self::tenant_name(&state, tenant_id)?;
        state
            .calls
            .push(format!("revoke:{name}:{}", application_ids.join(",")));
        Ok(())
    }

    async fn create_application(
        &self,
        _token: &Token,
        descriptor: &ApplicationDescriptor,
    ) -> ControlResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.calls.push(format!("create-application:{}", descriptor.id));
        state.applications.push(descriptor.clone());
        Ok(())
    }

    async fn register_discovery(
        &self,
        _token: &Token,
        modules: &[ModuleDiscovery],
    ) -> ControlResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.calls.push(format!("discovery:{}", modules.len()));
        state.discovery.extend_from_slice(modules);
        Ok(())
    }
}
