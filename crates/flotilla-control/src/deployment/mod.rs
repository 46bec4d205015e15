//! Container deployment.
//!
//! Resolved modules are deployed in two passes that never mix: management
//! modules first, then business modules with their sidecars.

mod containers;
mod images;
mod orchestrator;

pub use containers::{
    ContainerNaming, ContainerSet, ContainerSettings, ModulePair, LABEL_KIND, LABEL_MODULE,
    LABEL_PROFILE, LABEL_SIDECAR, SIDECAR_SUFFIX,
};
pub use images::ImageCache;
pub use orchestrator::DeploymentOrchestrator;
