//! Subcommand implementations.

pub mod deploy;
pub mod inspect;
pub mod tenants;

use std::path::Path;

use anyhow::Context;
use flotilla_control::{Platform, PlatformConfig};

/// Load configuration from `path` and wire the platform.
pub fn load(path: &Path) -> anyhow::Result<Platform> {
    let config = PlatformConfig::from_file(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;

    Platform::from_config(config).context("failed to set up platform collaborators")
}
