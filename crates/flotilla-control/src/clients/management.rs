//! Management service client: tenants, entitlements, applications and discovery.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::http::{ensure_success, HttpClient};
use super::{ApplicationDescriptor, ManagementService, ModuleDiscovery, TenantRecord};
use crate::error::ControlResult;
use crate::types::Token;

const LIST_LIMIT: u32 = 10_000;

/// HTTP client for the management service.
#[derive(Debug, Clone)]
pub struct ManagementClient {
    http: HttpClient,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Tenants {
    #[serde(default)]
    tenants: Vec<TenantRecord>,
}

impl ManagementClient {
    /// Create a client for the service at `base_url`.
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }
}

#[async_trait]
impl ManagementService for ManagementClient {
    async fn list_tenants(&self, token: &Token) -> ControlResult<Vec<TenantRecord>> {
        let url = format!("{}/tenants?limit={LIST_LIMIT}", self.base_url);
        let tenants: Tenants = self
            .http
            .json("management", |c| c.get(&url).bearer_auth(token.expose()))
            .await?;

        debug!(count = tenants.tenants.len(), "listed tenants");
        Ok(tenants.tenants)
    }

    async fn create_tenant(
        &self,
        token: &Token,
        name: &str,
        description: &str,
    ) -> ControlResult<TenantRecord> {
        let url = format!("{}/tenants", self.base_url);
        let body = json!({ "name": name, "description": description });
        let tenant: TenantRecord = self
            .http
            .json("management", |c| {
                c.post(&url).bearer_auth(token.expose()).json(&body)
            })
            .await?;

        info!(tenant = %tenant.name, id = %tenant.id, "created tenant");
        Ok(tenant)
    }

    async fn remove_tenant(&self, token: &Token, tenant_id: &str) -> ControlResult<()> {
        let url = format!("{}/tenants/{tenant_id}?purgeKafkaTopics=true", self.base_url);
        let response = self
            .http
            .send_raw("management", |c| c.delete(&url).bearer_auth(token.expose()))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(id = %tenant_id, "tenant already removed");
            return Ok(());
        }
        ensure_success("management", response).await?;
        info!(id = %tenant_id, "removed tenant");
        Ok(())
    }

    async fn create_tenant_entitlement(
        &self,
        token: &Token,
        tenant_id: &str,
        application_ids: &[String],
    ) -> ControlResult<()> {
        let url = format!("{}/entitlements", self.base_url);
        let body = json!({ "tenantId": tenant_id, "applications": application_ids });
        self.http
            .send("management", |c| {
                c.post(&url).bearer_auth(token.expose()).json(&body)
            })
            .await?;

        info!(id = %tenant_id, applications = ?application_ids, "created entitlement");
        Ok(())
    }

    async fn remove_tenant_entitlements(
        &self,
        token: &Token,
        tenant_id: &str,
        application_ids: &[String],
    ) -> ControlResult<()> {
        let url = format!("{}/entitlements?purge=true", self.base_url);
        let body = json!({ "tenantId": tenant_id, "applications": application_ids });
        self.http
            .send("management", |c| {
                c.delete(&url).bearer_auth(token.expose()).json(&body)
            })
            .await?;

        info!(id = %tenant_id, applications = ?application_ids, "removed entitlements");
        Ok(())
    }

    async fn create_application(
        &self,
        token: &Token,
        descriptor: &ApplicationDescriptor,
    ) -> ControlResult<()> {
        let url = format!("{}/applications?check=false", self.base_url);
        let response = self
            .http
            .send_raw("management", |c| {
                c.post(&url).bearer_auth(token.expose()).json(descriptor)
            })
            .await?;

        if response.status() == StatusCode::CONFLICT {
            debug!(application = %descriptor.id, "application already registered");
            return Ok(());
        }
        ensure_success("management", response).await?;
        info!(
            application = %descriptor.id,
            modules = descriptor.modules.len(),
            "registered application"
        );
        Ok(())
    }

    async fn register_discovery(
        &self,
        token: &Token,
        modules: &[ModuleDiscovery],
    ) -> ControlResult<()> {
        if modules.is_empty() {
            return Ok(());
        }

        let url = format!("{}/modules/discovery", self.base_url);
        let body = json!({ "discovery": modules });
        let response = self
            .http
            .send_raw("management", |c| {
                c.post(&url).bearer_auth(token.expose()).json(&body)
            })
            .await?;

        if response.status() == StatusCode::CONFLICT {
            debug!(count = modules.len(), "discovery already registered");
            return Ok(());
        }
        ensure_success("management", response).await?;
        info!(count = modules.len(), "registered module discovery");
        Ok(())
    }
}
