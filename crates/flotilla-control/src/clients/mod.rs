//! External service collaborators.
//!
//! Each service the orchestrator depends on is a trait with one production
//! implementation and one in-memory implementation for dry runs and tests.

pub mod http;

mod broker;
mod gateway;
mod identity;
mod management;
mod memory;
mod secrets;

pub use broker::{parse_consumer_group_state, KafkaCliAdmin, ScriptedBroker};
pub use gateway::{KongAdminClient, StaticGateway};
pub use http::{HttpClient, RetryPolicy};
pub use identity::KeycloakClient;
pub use management::ManagementClient;
pub use memory::{MemoryIdentityProvider, MemoryManagementService};
pub use secrets::{StaticSecretStore, VaultLogScanner, ROOT_TOKEN_MARKER};

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{RoleConfig, UserConfig};
use crate::error::ControlResult;
use crate::types::Token;

/// OAuth grant used to obtain an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    /// Client credentials of the administration client.
    ClientCredentials,
    /// Tenant administrator password grant.
    Password,
}

/// A tenant as known to the management service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRecord {
    /// Tenant id.
    pub id: String,
    /// Tenant name.
    pub name: String,
    /// Free-form description; encodes the partition the tenant belongs to.
    #[serde(default)]
    pub description: String,
}

/// A module reference inside an application descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRef {
    /// `name-version` id.
    pub id: String,
    /// Module name.
    pub name: String,
    /// Module version.
    pub version: String,
}

/// Application registered with the management service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDescriptor {
    /// `name-version` id.
    pub id: String,
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
    /// Target platform.
    pub platform: String,
    /// Business modules of the application.
    pub modules: Vec<ModuleRef>,
}

/// Where a deployed module can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDiscovery {
    /// `name-version` id.
    pub id: String,
    /// Module name.
    pub name: String,
    /// Module version.
    pub version: String,
    /// URL of the sidecar, or of the module itself when it has none.
    pub location: String,
}

/// Consumer group state reported by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerGroupState {
    /// Active members.
    pub member_count: u32,
    /// Whether a rebalance is in progress.
    pub rebalancing: bool,
}

impl ConsumerGroupState {
    /// No members and no rebalance in progress.
    #[must_use]
    pub const fn is_quiescent(&self) -> bool {
        self.member_count == 0 && !self.rebalancing
    }
}

/// Identity provider and role administration.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Obtain an access token for `realm`.
    async fn access_token(&self, realm: &str, grant: GrantType) -> ControlResult<Token>;

    /// Create the configured roles in `tenant`.
    async fn create_roles(
        &self,
        token: &Token,
        tenant: &str,
        roles: &BTreeMap<String, RoleConfig>,
    ) -> ControlResult<()>;

    /// Remove the configured roles from `tenant`.
    async fn remove_roles(
        &self,
        token: &Token,
        tenant: &str,
        roles: &BTreeMap<String, RoleConfig>,
    ) -> ControlResult<()>;

    /// Create the configured users in `tenant` and assign their roles.
    async fn create_users(
        &self,
        token: &Token,
        tenant: &str,
        users: &BTreeMap<String, UserConfig>,
    ) -> ControlResult<()>;

    /// Attach capability sets to the configured roles of `tenant`.
    async fn attach_capability_sets(
        &self,
        token: &Token,
        tenant: &str,
        roles: &BTreeMap<String, RoleConfig>,
    ) -> ControlResult<()>;

    /// Detach every capability set from the configured roles of `tenant`.
    async fn detach_capability_sets(
        &self,
        token: &Token,
        tenant: &str,
        roles: &BTreeMap<String, RoleConfig>,
    ) -> ControlResult<()>;

    /// Set the access token lifespan of `realm`.
    async fn update_realm_access_token_lifespan(
        &self,
        token: &Token,
        realm: &str,
        seconds: u64,
    ) -> ControlResult<()>;
}

/// Tenant and application lifecycle.
#[async_trait]
pub trait ManagementService: Send + Sync {
    /// Every tenant, in the order the service returns them.
    async fn list_tenants(&self, token: &Token) -> ControlResult<Vec<TenantRecord>>;

    /// Create a tenant.
    async fn create_tenant(
        &self,
        token: &Token,
        name: &str,
        description: &str,
    ) -> ControlResult<TenantRecord>;

    /// Remove a tenant.
    async fn remove_tenant(&self, token: &Token, tenant_id: &str) -> ControlResult<()>;

    /// Entitle a tenant to applications.
    async fn create_tenant_entitlement(
        &self,
        token: &Token,
        tenant_id: &str,
        application_ids: &[String],
    ) -> ControlResult<()>;

    /// Revoke a tenant's application entitlements.
    async fn remove_tenant_entitlements(
        &self,
        token: &Token,
        tenant_id: &str,
        application_ids: &[String],
    ) -> ControlResult<()>;

    /// Register an application descriptor.
    async fn create_application(
        &self,
        token: &Token,
        descriptor: &ApplicationDescriptor,
    ) -> ControlResult<()>;

    /// Register where deployed modules can be reached.
    async fn register_discovery(
        &self,
        token: &Token,
        modules: &[ModuleDiscovery],
    ) -> ControlResult<()>;
}

/// Message broker administration.
#[async_trait]
pub trait BrokerAdmin: Send + Sync {
    /// Describe the state of consumer group `group`.
    async fn describe_consumer_group(&self, group: &str) -> ControlResult<ConsumerGroupState>;
}

/// API gateway status.
#[async_trait]
pub trait ApiGateway: Send + Sync {
    /// Whether the gateway is ready to route requests.
    async fn route_status(&self) -> ControlResult<bool>;
}

/// Secret store bootstrap.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Root token of the secret store.
    async fn root_token(&self) -> ControlResult<Token>;
}
