//! Flotilla Control
//!
//! This crate brings up a multi-module, multi-tenant platform on a container
//! runtime and provisions its tenants.
//!
//! # Architecture
//!
//! A deployment is a single sequential pipeline:
//!
//! ```text
//! secret store token ──▶ resolve modules ──▶ management pass ──▶ readiness
//!                                                                   │
//!          ┌────────────────────────────────────────────────────────┘
//!          ▼
//!   gateway ready ──▶ business pass ──▶ readiness ──▶ register application
//!                                                            │
//!          ┌─────────────────────────────────────────────────┘
//!          ▼
//!   tenants ──▶ entitlements ──▶ roles ──▶ users ──▶ capability sets
//! ```
//!
//! - **Resolution**: configured modules are merged with the registry listing
//!   into [`ModuleDescriptor`]s, drawing ports from a [`PortAllocator`]
//! - **Deployment**: the [`DeploymentOrchestrator`] creates module containers
//!   in sequence and their sidecars concurrently
//! - **Readiness**: the [`ReadinessVerifier`] probes every published port in
//!   parallel
//! - **Tenants**: the [`TenantPartitioner`] walks tenants consortium by
//!   consortium, central tenants first
//! - **Capability sets**: the [`CapabilitySaga`] waits for the platform to go
//!   quiet before attaching capability sets to roles
//!
//! Every external service is reached through a trait in [`clients`] or
//! [`runtime`], each with an in-memory implementation for dry runs and tests.
//!
//! # Example
//!
//! ```ignore
//! use flotilla_control::{Platform, PlatformConfig};
//!
//! let config = PlatformConfig::from_file("flotilla.toml")?;
//! let platform = Platform::from_config(config)?;
//! let report = platform.deploy_application().await?;
//! ```

#![forbid(unsafe_code)]

pub mod capability;
pub mod clients;
pub mod config;
pub mod deployment;
pub mod environment;
pub mod error;
pub mod platform;
pub mod ports;
pub mod readiness;
pub mod registry;
pub mod runtime;
pub mod tenants;
pub mod types;

// Re-export commonly used types at the crate root
pub use capability::CapabilitySaga;
pub use config::PlatformConfig;
pub use deployment::{ContainerSet, DeploymentOrchestrator, ModulePair};
pub use environment::EnvironmentContext;
pub use error::{ControlError, ControlResult, ErrorKind};
pub use platform::{Collaborators, DeploymentReport, Platform};
pub use ports::PortAllocator;
pub use readiness::{ReadinessReport, ReadinessVerifier};
pub use registry::ModuleResolver;
pub use runtime::ContainerRuntime;
pub use tenants::{ConsortiumKey, Partition, TenantPartitioner, TenantType};
pub use types::{ModuleDescriptor, ModuleId, ModuleKind, ModulePorts, Token};
