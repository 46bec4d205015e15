//! API gateway status.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::http::HttpClient;
use super::ApiGateway;
use crate::error::ControlResult;

/// Gateway admin API client.
#[derive(Debug, Clone)]
pub struct KongAdminClient {
    http: HttpClient,
    admin_url: String,
}

impl KongAdminClient {
    /// Create a client for the admin API at `admin_url`.
    pub fn new(http: HttpClient, admin_url: impl Into<String>) -> Self {
        Self {
            http,
            admin_url: admin_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    database: Option<DatabaseStatus>,
}

#[derive(Debug, Deserialize)]
struct DatabaseStatus {
    reachable: bool,
}

#[async_trait]
impl ApiGateway for KongAdminClient {
    async fn route_status(&self) -> ControlResult<bool> {
        let url = format!("{}/status", self.admin_url.trim_end_matches('/'));
        let response = self.http.send_raw("gateway", |c| c.get(&url)).await?;

        if !response.status().is_success() {
            debug!(status = response.status().as_u16(), "gateway status not ok");
            return Ok(false);
        }

        let status: StatusResponse = response.json().await?;
        Ok(status.database.map_or(true, |db| db.reachable))
    }
}

/// Gateway with a fixed status.
#[derive(Debug, Clone, Copy)]
pub struct StaticGateway {
    ready: bool,
}

impl StaticGateway {
    /// Gateway that always reports `ready`.
    #[must_use]
    pub const fn new(ready: bool) -> Self {
        Self { ready }
    }
}

#[async_trait]
impl ApiGateway for StaticGateway {
    async fn route_status(&self) -> ControlResult<bool> {
        Ok(self.ready)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clients::http::RetryPolicy;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    fn client(server: &MockServer) -> KongAdminClient {
        let http = HttpClient::with_policy(Duration::from_secs(5), RetryPolicy::none()).unwrap();
        KongAdminClient::new(http, server.base_url())
    }

    #[tokio::test]
    async fn ready_when_database_reachable() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/status");
                then.status(200)
                    .json_body(json!({"database": {"reachable": true}, "server": {}}));
            })
            .await;

        assert!(client(&server).route_status().await.unwrap());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn not_ready_on_unreachable_database() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/status");
                then.status(200).json_body(json!({"database": {"reachable": false}}));
            })
            .await;

        assert!(!client(&server).route_status().await.unwrap());
    }

    #[tokio::test]
    async fn not_ready_on_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/status");
                then.status(503);
            })
            .await;

        assert!(!client(&server).route_status().await.unwrap());
    }
}
