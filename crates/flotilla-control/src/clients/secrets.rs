//! Secret store root token lookup.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::SecretStore;
use crate::error::{ControlError, ControlResult};
use crate::runtime::ContainerRuntime;
use crate::types::Token;

/// Marker preceding the root token in the secret store's startup log.
pub const ROOT_TOKEN_MARKER: &str = "Root Token:";

/// Reads the root token from the startup log of the secret store container.
pub struct VaultLogScanner {
    runtime: Arc<dyn ContainerRuntime>,
    container: String,
}

impl VaultLogScanner {
    /// Scan the log of `container`.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, container: impl Into<String>) -> Self {
        Self {
            runtime,
            container: container.into(),
        }
    }
}

#[async_trait]
impl SecretStore for VaultLogScanner {
    async fn root_token(&self) -> ControlResult<Token> {
        let logs = self.runtime.logs(&self.container).await?;
        let token = scan_root_token(&logs).ok_or_else(|| {
            ControlError::runtime(format!(
                "no root token found in the log of {}",
                self.container
            ))
        })?;

        debug!(container = %self.container, "found secret store root token");
        Ok(Token::new(token))
    }
}

/// Last root token announced in `logs`.
fn scan_root_token(logs: &str) -> Option<&str> {
    logs.lines()
        .rev()
        .filter_map(|line| line.split_once(ROOT_TOKEN_MARKER))
        .map(|(_, token)| token.trim())
        .find(|token| !token.is_empty())
}

/// Secret store with a known root token.
#[derive(Debug, Clone)]
pub struct StaticSecretStore {
    token: Token,
}

impl StaticSecretStore {
    /// Store that always answers `token`.
    #[must_use]
    pub fn new(token: Token) -> Self {
        Self { token }
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn root_token(&self) -> ControlResult<Token> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::runtime::MemoryRuntime;

    const LOG: &str = "\
==> Vault server configuration:
             Api Address: http://0.0.0.0:8200
WARNING! dev mode is enabled!
Unseal Key: 1kRH2QJMgPZ8Hc/YYHxb0Q1GJgWbT3RDNv2mBrXsxg4=
Root Token: hvs.Xq6XyNplAp4vQ1AbCdEf

Development mode should NOT be used in production installations!
";

    #[test]
    fn scans_token() {
        assert_eq!(scan_root_token(LOG), Some("hvs.Xq6XyNplAp4vQ1AbCdEf"));
        assert_eq!(scan_root_token("nothing here"), None);
        assert_eq!(scan_root_token("Root Token:   "), None);
    }

    #[tokio::test]
    async fn reads_container_log() {
        let runtime = Arc::new(MemoryRuntime::new());
        runtime.set_logs("vault", LOG).unwrap();

        let token = VaultLogScanner::new(runtime, "vault")
            .root_token()
            .await
            .unwrap();
        assert_eq!(token.expose(), "hvs.Xq6XyNplAp4vQ1AbCdEf");
    }

    #[tokio::test]
    async fn missing_marker_is_an_error() {
        let runtime = Arc::new(MemoryRuntime::new());
        runtime.set_logs("vault", "starting").unwrap();

        let err = VaultLogScanner::new(runtime, "vault")
            .root_token()
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::Runtime(_)));
    }
}
