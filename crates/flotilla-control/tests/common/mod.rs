//! Common test utilities for platform integration tests.

#![allow(dead_code, clippy::unwrap_used)]

pub mod fixtures;

use async_trait::async_trait;
use flotilla_control::clients::{
    MemoryIdentityProvider, MemoryManagementService, ScriptedBroker, StaticGateway,
    StaticSecretStore,
};
use flotilla_control::readiness::ReadinessProbe;
use flotilla_control::registry::StaticRegistry;
use flotilla_control::runtime::MemoryRuntime;
use flotilla_control::types::RegistryModule;
use flotilla_control::{Collaborators, ControlError, ControlResult, Platform, PlatformConfig, Token};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

/// Probe that records every attempt and fails for selected ports.
#[derive(Debug, Default)]
pub struct RecordingProbe {
    unready: Mutex<BTreeSet<u16>>,
    probed: Mutex<Vec<u16>>,
}

impl RecordingProbe {
    /// Make `port` never answer.
    pub fn fail_port(&self, port: u16) {
        self.unready.lock().unwrap().insert(port);
    }

    /// Distinct ports probed so far.
    pub fn probed(&self) -> BTreeSet<u16> {
        self.probed.lock().unwrap().iter().copied().collect()
    }
}

#[async_trait]
impl ReadinessProbe for RecordingProbe {
    async fn probe(&self, port: u16) -> ControlResult<()> {
        self.probed.lock().unwrap().push(port);
        if self.unready.lock().unwrap().contains(&port) {
            Err(ControlError::runtime(format!("port {port} refused connection")))
        } else {
            Ok(())
        }
    }
}

/// Complete test platform with every collaborator in memory.
pub struct TestPlatform {
    pub platform: Platform,
    pub runtime: Arc<MemoryRuntime>,
    pub probe: Arc<RecordingProbe>,
    pub identity: Arc<MemoryIdentityProvider>,
    pub management: Arc<MemoryManagementService>,
    pub broker: Arc<ScriptedBroker>,
}

impl TestPlatform {
    /// Test platform over `config` with an always-idle broker.
    pub fn new(config: PlatformConfig, listing: Vec<RegistryModule>) -> Self {
        Self::builder(config, listing).build()
    }

    /// Start wiring a test platform.
    pub fn builder(config: PlatformConfig, listing: Vec<RegistryModule>) -> TestPlatformBuilder {
        TestPlatformBuilder {
            config,
            listing,
            probe: Arc::new(RecordingProbe::default()),
            broker: Arc::new(ScriptedBroker::quiescent()),
        }
    }

    /// Identity calls other than token requests.
    pub fn identity_actions(&self) -> Vec<String> {
        self.identity
            .calls()
            .unwrap()
            .into_iter()
            .filter(|call| !call.starts_with("token:"))
            .collect()
    }
}

/// Builder for [`TestPlatform`].
pub struct TestPlatformBuilder {
    config: PlatformConfig,
    listing: Vec<RegistryModule>,
    probe: Arc<RecordingProbe>,
    broker: Arc<ScriptedBroker>,
}

impl TestPlatformBuilder {
    /// Use `broker` for consumer group polling.
    pub fn with_broker(mut self, broker: ScriptedBroker) -> Self {
        self.broker = Arc::new(broker);
        self
    }

    /// Make `port` fail every readiness probe.
    pub fn with_unready_port(self, port: u16) -> Self {
        self.probe.fail_port(port);
        self
    }

    /// Wire the platform.
    pub fn build(self) -> TestPlatform {
        let runtime = Arc::new(MemoryRuntime::new());
        let identity = Arc::new(MemoryIdentityProvider::new());
        let management = Arc::new(MemoryManagementService::new());

        let collaborators = Collaborators {
            runtime: runtime.clone(),
            registry: Arc::new(StaticRegistry::new(self.listing)),
            probe: self.probe.clone(),
            identity: identity.clone(),
            management: management.clone(),
            broker: self.broker.clone(),
            gateway: Arc::new(StaticGateway::new(true)),
            secrets: Arc::new(StaticSecretStore::new(Token::new("root-token"))),
        };

        TestPlatform {
            platform: Platform::new(self.config, collaborators),
            runtime,
            probe: self.probe,
            identity,
            management,
            broker: self.broker,
        }
    }
}
