//! Identity provider and role administration over HTTP.
//!
//! Tokens and realm settings come from the identity provider itself. Roles,
//! users and capability sets are managed through the gateway, addressed per
//! tenant.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::http::{ensure_success, HttpClient};
use super::{GrantType, IdentityProvider};
use crate::config::{IdentityConfig, RoleConfig, UserConfig};
use crate::error::{ControlError, ControlResult};
use crate::types::Token;

/// Page size large enough to list every role or capability set at once.
const LIST_LIMIT: u32 = 10_000;

/// Identity provider client.
#[derive(Debug, Clone)]
pub struct KeycloakClient {
    http: HttpClient,
    identity_url: String,
    gateway_url: String,
    admin_client_id: String,
    admin_client_secret: Token,
    login_client_suffix: String,
    tenant_admin_username: String,
    tenant_admin_password: Token,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Named {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Roles {
    #[serde(default)]
    roles: Vec<Named>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CapabilitySets {
    #[serde(default)]
    capability_sets: Vec<Named>,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

impl KeycloakClient {
    /// Create a client; `gateway_url` is where role and user APIs are routed.
    pub fn new(http: HttpClient, config: &IdentityConfig, gateway_url: impl Into<String>) -> Self {
        Self {
            http,
            identity_url: config.url.trim_end_matches('/').to_owned(),
            gateway_url: gateway_url.into().trim_end_matches('/').to_owned(),
            admin_client_id: config.admin_client_id.clone(),
            admin_client_secret: Token::new(config.admin_client_secret.clone()),
            login_client_suffix: config.login_client_suffix.clone(),
            tenant_admin_username: config.tenant_admin_username.clone(),
            tenant_admin_password: Token::new(config.tenant_admin_password.clone()),
        }
    }

    fn tenant_url(&self, path: &str) -> String {
        format!("{}{path}", self.gateway_url)
    }

    async fn role_ids(
        &self,
        token: &Token,
        tenant: &str,
    ) -> ControlResult<HashMap<String, String>> {
        let url = self.tenant_url(&format!("/roles?limit={LIST_LIMIT}"));
        let roles: Roles = self
            .http
            .json("roles", |c| scoped(c.get(&url), token, tenant))
            .await?;

        Ok(roles.roles.into_iter().map(|r| (r.name, r.id)).collect())
    }

    async fn capability_set_ids(
        &self,
        token: &Token,
        tenant: &str,
    ) -> ControlResult<HashMap<String, String>> {
        let url = self.tenant_url(&format!("/capability-sets?limit={LIST_LIMIT}"));
        let sets: CapabilitySets = self
            .http
            .json("capability-sets", |c| scoped(c.get(&url), token, tenant))
            .await?;

        Ok(sets
            .capability_sets
            .into_iter()
            .map(|s| (s.name, s.id))
            .collect())
    }
}

/// Attach the token and tenant headers the gateway routes on.
fn scoped(request: RequestBuilder, token: &Token, tenant: &str) -> RequestBuilder {
    request
        .bearer_auth(token.expose())
        .header("x-okapi-tenant", tenant)
        .header("x-okapi-token", token.expose())
}

#[async_trait]
impl IdentityProvider for KeycloakClient {
    async fn access_token(&self, realm: &str, grant: GrantType) -> ControlResult<Token> {
        let url = format!(
            "{}/realms/{realm}/protocol/openid-connect/token",
            self.identity_url
        );

        let form: Vec<(&str, String)> = match grant {
            GrantType::ClientCredentials => vec![
                ("grant_type", "client_credentials".to_owned()),
                ("client_id", self.admin_client_id.clone()),
                ("client_secret", self.admin_client_secret.expose().to_owned()),
            ],
            GrantType::Password => vec![
                ("grant_type", "password".to_owned()),
                ("client_id", format!("{realm}{}", self.login_client_suffix)),
                ("username", self.tenant_admin_username.clone()),
                ("password", self.tenant_admin_password.expose().to_owned()),
            ],
        };

        let response: TokenResponse = self
            .http
            .json("identity", |c: &Client| c.post(&url).form(&form))
            .await?;

        debug!(realm = %realm, grant = ?grant, "obtained access token");
        Ok(Token::new(response.access_token))
    }

    async fn create_roles(
        &self,
        token: &Token,
        tenant: &str,
        roles: &BTreeMap<String, RoleConfig>,
    ) -> ControlResult<()> {
        let url = self.tenant_url("/roles");
        for (name, role) in roles {
            let body = json!({ "name": name, "description": role.description });
            let response = self
                .http
                .send_raw("roles", |c| scoped(c.post(&url), token, tenant).json(&body))
                .await?;

            if response.status() == StatusCode::CONFLICT {
                debug!(tenant = %tenant, role = %name, "role already exists");
                continue;
            }
            ensure_success("roles", response).await?;
            info!(tenant = %tenant, role = %name, "created role");
        }
        Ok(())
    }

    async fn remove_roles(
        &self,
        token: &Token,
        tenant: &str,
        roles: &BTreeMap<String, RoleConfig>,
    ) -> ControlResult<()> {
        let existing = self.role_ids(token, tenant).await?;
        for name in roles.keys() {
            let Some(id) = existing.get(name) else {
                debug!(tenant = %tenant, role = %name, "role not present");
                continue;
            };
            let url = self.tenant_url(&format!("/roles/{id}"));
            self.http
                .send("roles", |c| scoped(c.delete(&url), token, tenant))
                .await?;
            info!(tenant = %tenant, role = %name, "removed role");
        }
        Ok(())
    }

    async fn create_users(
        &self,
        token: &Token,
        tenant: &str,
        users: &BTreeMap<String, UserConfig>,
    ) -> ControlResult<()> {
        let role_ids = self.role_ids(token, tenant).await?;
        let users_url = self.tenant_url("/users-keycloak/users");
        let credentials_url = self.tenant_url("/authn/credentials");
        let assign_url = self.tenant_url("/roles/users");

        for (username, user) in users {
            let body = json!({
                "username": username,
                "active": true,
                "type": "staff",
                "personal": { "lastName": username, "preferredContactTypeId": "002" },
            });
            let response = self
                .http
                .send_raw("users", |c| {
                    scoped(c.post(&users_url), token, tenant).json(&body)
                })
                .await?;
            if response.status() == StatusCode::CONFLICT {
                debug!(tenant = %tenant, user = %username, "user already exists");
                continue;
            }
            let created: Created = ensure_success("users", response)
                .await?
                .json()
                .await
                .map_err(ControlError::Http)?;

            let credentials = json!({
                "username": username,
                "userId": created.id,
                "password": user.password,
            });
            self.http
                .send("users", |c| {
                    scoped(c.post(&credentials_url), token, tenant).json(&credentials)
                })
                .await?;

            let mut ids = Vec::with_capacity(user.roles.len());
            for role in &user.roles {
                let id = role_ids.get(role).ok_or_else(|| {
                    ControlError::config(format!("user {username} references unknown role {role}"))
                })?;
                ids.push(id.clone());
            }
            if !ids.is_empty() {
                let assignment = json!({ "userId": created.id, "roleIds": ids });
                self.http
                    .send("roles", |c| {
                        scoped(c.post(&assign_url), token, tenant).json(&assignment)
                    })
                    .await?;
            }

            info!(tenant = %tenant, user = %username, roles = ids.len(), "created user");
        }
        Ok(())
    }

    async fn attach_capability_sets(
        &self,
        token: &Token,
        tenant: &str,
        roles: &BTreeMap<String, RoleConfig>,
    ) -> ControlResult<()> {
        let role_ids = self.role_ids(token, tenant).await?;
        let sets = self.capability_set_ids(token, tenant).await?;
        let url = self.tenant_url("/roles/capability-sets");

        for (name, role) in roles {
            let role_id = role_ids.get(name).ok_or_else(|| {
                ControlError::config(format!("role {name} does not exist in tenant {tenant}"))
            })?;

            let mut set_ids: Vec<&String> = if role.capability_sets.is_empty() {
                sets.values().collect()
            } else {
                role.capability_sets
                    .iter()
                    .filter_map(|set| {
                        let id = sets.get(set);
                        if id.is_none() {
                            warn!(
                                tenant = %tenant,
                                capability_set = %set,
                                "unknown capability set"
                            );
                        }
                        id
                    })
                    .collect()
            };
            set_ids.sort();

            if set_ids.is_empty() {
                warn!(tenant = %tenant, role = %name, "no capability sets to attach");
                continue;
            }

            let body = json!({ "roleId": role_id, "capabilitySetIds": set_ids });
            self.http
                .send("capability-sets", |c| {
                    scoped(c.post(&url), token, tenant).json(&body)
                })
                .await?;
            info!(
                tenant = %tenant,
                role = %name,
                count = set_ids.len(),
                "attached capability sets"
            );
        }
        Ok(())
    }

    async fn detach_capability_sets(
        &self,
        token: &Token,
        tenant: &str,
        roles: &BTreeMap<String, RoleConfig>,
    ) -> ControlResult<()> {
        let role_ids = self.role_ids(token, tenant).await?;
        for name in roles.keys() {
            let Some(id) = role_ids.get(name) else {
                continue;
            };
            let url = self.tenant_url(&format!("/roles/{id}/capability-sets"));
            let response = self
                .http
                .send_raw("capability-sets", |c| scoped(c.delete(&url), token, tenant))
                .await?;

            if response.status() == StatusCode::NOT_FOUND {
                debug!(tenant = %tenant, role = %name, "no capability sets attached");
                continue;
            }
            ensure_success("capability-sets", response).await?;
            info!(tenant = %tenant, role = %name, "detached capability sets");
        }
        Ok(())
    }

    async fn update_realm_access_token_lifespan(
        &self,
        token: &Token,
        realm: &str,
        seconds: u64,
    ) -> ControlResult<()> {
        let url = format!("{}/admin/realms/{realm}", self.identity_url);
        let body = json!({ "accessTokenLifespan": seconds });
        self.http
            .send("identity", |c| c.put(&url).bearer_auth(token.expose()).json(&body))
            .await?;

        info!(realm = %realm, seconds, "updated access token lifespan");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clients::http::RetryPolicy;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn client(server: &MockServer) -> KeycloakClient {
        let http = HttpClient::with_policy(Duration::from_secs(5), RetryPolicy::none()).unwrap();
        let config = IdentityConfig {
            url: server.base_url(),
            admin_client_secret: "secret".to_owned(),
            tenant_admin_password: "admin".to_owned(),
            ..IdentityConfig::default()
        };
        KeycloakClient::new(http, &config, server.base_url())
    }

    fn roles() -> BTreeMap<String, RoleConfig> {
        BTreeMap::from([(
            "admin".to_owned(),
            RoleConfig {
                description: "Administrator".to_owned(),
                capability_sets: Vec::new(),
            },
        )])
    }

    #[tokio::test]
    async fn client_credentials_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/realms/master/protocol/openid-connect/token");
                then.status(200)
                    .json_body(json!({"access_token": "master-token", "expires_in": 60}));
            })
            .await;

        let token = client(&server)
            .access_token("master", GrantType::ClientCredentials)
            .await
            .unwrap();

        assert_eq!(token.expose(), "master-token");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_grant_is_an_api_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/realms/diku/protocol/openid-connect/token");
                then.status(401).json_body(json!({"error": "invalid_grant"}));
            })
            .await;

        let err = client(&server)
            .access_token("diku", GrantType::Password)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn existing_role_is_not_an_error() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/roles")
                    .header("x-okapi-tenant", "diku");
                then.status(409);
            })
            .await;

        client(&server)
            .create_roles(&Token::new("t"), "diku", &roles())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn existing_user_is_skipped() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/roles");
                then.status(200)
                    .json_body(json!({"roles": [{"id": "r1", "name": "admin"}]}));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST).path("/users-keycloak/users");
                then.status(409);
            })
            .await;
        let credentials = server
            .mock_async(|when, then| {
                when.method(POST).path("/authn/credentials");
                then.status(201);
            })
            .await;

        let users = BTreeMap::from([(
            "diku_admin".to_owned(),
            UserConfig {
                password: "admin".to_owned(),
                roles: vec!["admin".to_owned()],
            },
        )]);
        client(&server)
            .create_users(&Token::new("t"), "diku", &users)
            .await
            .unwrap();

        create.assert_async().await;
        credentials.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn attach_all_capability_sets() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/roles");
                then.status(200)
                    .json_body(json!({"roles": [{"id": "r1", "name": "admin"}]}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/capability-sets");
                then.status(200).json_body(json!({"capabilitySets": [
                    {"id": "c1", "name": "users.manage"},
                    {"id": "c2", "name": "roles.manage"}
                ]}));
            })
            .await;
        let attach = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/roles/capability-sets")
                    .header("x-okapi-tenant", "diku");
                then.status(201);
            })
            .await;

        client(&server)
            .attach_capability_sets(&Token::new("t"), "diku", &roles())
            .await
            .unwrap();
        attach.assert_async().await;
    }

    #[tokio::test]
    async fn attach_to_missing_role_fails() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/roles");
                then.status(200).json_body(json!({"roles": []}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/capability-sets");
                then.status(200).json_body(json!({"capabilitySets": []}));
            })
            .await;

        let err = client(&server)
            .attach_capability_sets(&Token::new("t"), "diku", &roles())
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::Config(_)));
    }
}
