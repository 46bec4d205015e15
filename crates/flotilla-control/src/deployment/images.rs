//! Pull-once image cache shared by every task of a run.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::RegistryAuth;
use crate::error::ControlResult;
use crate::runtime::ContainerRuntime;

/// Ensures each image is pulled at most once per run.
///
/// Concurrent callers asking for the same image wait on the first pull. A
/// failed pull is not remembered, so a later caller tries again.
#[derive(Debug, Default)]
pub struct ImageCache {
    pulled: DashMap<String, Arc<OnceCell<()>>>,
}

impl ImageCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pull `image` unless it was already pulled in this run.
    pub async fn ensure(
        &self,
        runtime: &dyn ContainerRuntime,
        image: &str,
        auth: Option<&RegistryAuth>,
    ) -> ControlResult<()> {
        let cell = self.pulled.entry(image.to_owned()).or_default().clone();

        if cell.initialized() {
            debug!(image = %image, "image already pulled");
            return Ok(());
        }

        cell.get_or_try_init(|| runtime.pull_image(image, auth))
            .await?;
        Ok(())
    }

    /// Whether `image` has been pulled in this run.
    #[must_use]
    pub fn is_pulled(&self, image: &str) -> bool {
        self.pulled
            .get(image)
            .is_some_and(|cell| cell.initialized())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::runtime::MemoryRuntime;

    #[tokio::test]
    async fn pulls_once() {
        let runtime = MemoryRuntime::new();
        let cache = ImageCache::new();

        cache.ensure(&runtime, "sidecar:1", None).await.unwrap();
        cache.ensure(&runtime, "sidecar:1", None).await.unwrap();
        cache.ensure(&runtime, "mod-a:1", None).await.unwrap();

        assert_eq!(runtime.pulls().unwrap(), vec!["sidecar:1", "mod-a:1"]);
        assert!(cache.is_pulled("sidecar:1"));
        assert!(!cache.is_pulled("mod-b:1"));
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_pull() {
        let runtime = Arc::new(MemoryRuntime::new());
        let cache = Arc::new(ImageCache::new());

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let runtime = Arc::clone(&runtime);
            let cache = Arc::clone(&cache);
            tasks.spawn(async move { cache.ensure(runtime.as_ref(), "sidecar:1", None).await });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        assert_eq!(runtime.pulls().unwrap().len(), 1);
    }
}
