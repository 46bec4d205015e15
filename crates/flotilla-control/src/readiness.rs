//! Post-deployment readiness verification.
//!
//! Every published port of a pass is probed by its own task. Each task
//! retries with a constant delay until the port answers or its attempt budget
//! runs out, so a pass takes about as long as its slowest module rather than
//! the sum of all modules.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::clients::ApiGateway;
use crate::config::{ProbeKind, ReadinessConfig};
use crate::error::{ControlError, ControlResult};
use crate::types::{ModuleKind, ModulePorts};

/// Name reported when the gateway never becomes ready.
pub const GATEWAY: &str = "api-gateway";

/// Timeout of a single probe attempt.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// A single connectivity check against a published port.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// Succeed when the service behind `port` answers.
    async fn probe(&self, port: u16) -> ControlResult<()>;
}

/// Probe that expects a 2xx answer from a health endpoint.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    host: String,
    path: String,
}

impl HttpProbe {
    /// Create a probe for `http://<host>:<port><path>`.
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> ControlResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(ControlError::Http)?;

        Ok(Self {
            client,
            host: host.into(),
            path: path.into(),
        })
    }
}

#[async_trait]
impl ReadinessProbe for HttpProbe {
    async fn probe(&self, port: u16) -> ControlResult<()> {
        let url = format!("http://{}:{port}{}", self.host, self.path);
        let response = self.client.get(&url).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ControlError::Api {
                service: "health",
                status: response.status().as_u16(),
                body: String::new(),
            })
        }
    }
}

/// Probe that only checks the port accepts TCP connections.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
}

impl TcpProbe {
    /// Create a probe against `host`.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

#[async_trait]
impl ReadinessProbe for TcpProbe {
    async fn probe(&self, port: u16) -> ControlResult<()> {
        let connect = TcpStream::connect((self.host.as_str(), port));
        match tokio::time::timeout(PROBE_TIMEOUT, connect).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ControlError::Io(e)),
            Err(_) => Err(ControlError::runtime(format!(
                "connect to {}:{port} timed out",
                self.host
            ))),
        }
    }
}

/// Probe with a fixed answer, used for dry runs.
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe {
    ready: bool,
}

impl StaticProbe {
    /// Probe that always answers `ready`.
    #[must_use]
    pub const fn new(ready: bool) -> Self {
        Self { ready }
    }
}

#[async_trait]
impl ReadinessProbe for StaticProbe {
    async fn probe(&self, port: u16) -> ControlResult<()> {
        if self.ready {
            Ok(())
        } else {
            Err(ControlError::runtime(format!("port {port} is not ready")))
        }
    }
}

/// Create the probe selected by configuration.
pub fn create_probe(config: &ReadinessConfig) -> ControlResult<Arc<dyn ReadinessProbe>> {
    match config.probe {
        ProbeKind::Http => Ok(Arc::new(HttpProbe::new(
            config.host.clone(),
            config.health_path.clone(),
        )?)),
        ProbeKind::Tcp => Ok(Arc::new(TcpProbe::new(config.host.clone()))),
    }
}

/// Outcome of probing one port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessOutcome {
    /// The port answered.
    Ready {
        /// Attempts it took.
        attempts: u32,
    },
    /// The attempt budget ran out.
    TimedOut {
        /// Attempts made.
        attempts: u32,
        /// Error of the last attempt.
        last_error: String,
    },
}

impl ReadinessOutcome {
    /// Whether the port answered.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Result of one readiness pass: module name, then port, then outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessReport {
    /// Which pass was checked.
    pub kind: ModuleKind,
    /// Outcome of every probed port.
    pub records: BTreeMap<String, BTreeMap<u16, ReadinessOutcome>>,
}

impl ReadinessReport {
    /// Modules with at least one port that never answered, in name order.
    #[must_use]
    pub fn unready(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|(_, ports)| ports.values().any(|outcome| !outcome.is_ready()))
            .map(|(module, _)| module.clone())
            .collect()
    }
}

impl fmt::Display for ReadinessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ports: usize = self.records.values().map(BTreeMap::len).sum();
        write!(
            f,
            "{} pass: {} modules, {} ports, {} unready",
            self.kind,
            self.records.len(),
            ports,
            self.unready().len()
        )
    }
}

/// Probes every published port of a pass concurrently.
#[derive(Clone)]
pub struct ReadinessVerifier {
    probe: Arc<dyn ReadinessProbe>,
    max_retries: u32,
    retry_delay: Duration,
}

impl ReadinessVerifier {
    /// Create a verifier with an explicit budget.
    pub fn new(probe: Arc<dyn ReadinessProbe>, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            probe,
            max_retries: max_retries.max(1),
            retry_delay,
        }
    }

    /// Create a verifier from configuration.
    pub fn from_config(config: &ReadinessConfig) -> ControlResult<Self> {
        Ok(Self::new(
            create_probe(config)?,
            config.max_retries,
            config.retry_delay(),
        ))
    }

    /// Check every port in `ports` and fail if any module never answers.
    ///
    /// [`ControlError::ReadinessTimeout`] names every unready module.
    pub async fn check_all(
        &self,
        kind: ModuleKind,
        ports: &BTreeMap<String, ModulePorts>,
    ) -> ControlResult<ReadinessReport> {
        let total: usize = ports.values().map(|p| p.iter().count()).sum();
        info!(kind = %kind, modules = ports.len(), ports = total, "checking readiness");

        let (tx, mut rx) = mpsc::channel(total.max(1));
        let mut probes = JoinSet::new();

        for (module, module_ports) in ports {
            for port in module_ports.iter() {
                let tx = tx.clone();
                let verifier = self.clone();
                let module = module.clone();
                probes.spawn(async move {
                    let outcome = verifier.probe_until_ready(&module, port).await;
                    // Capacity equals the task count, so this never waits.
                    let _ = tx.send((module, port, outcome)).await;
                });
            }
        }
        drop(tx);

        while let Some(joined) = probes.join_next().await {
            joined.map_err(|e| {
                ControlError::internal(format!("readiness probe task failed: {e}"))
            })?;
        }

        let mut records: BTreeMap<String, BTreeMap<u16, ReadinessOutcome>> = BTreeMap::new();
        while let Ok((module, port, outcome)) = rx.try_recv() {
            records.entry(module).or_default().insert(port, outcome);
        }

        let report = ReadinessReport { kind, records };
        let unready = report.unready();
        if !unready.is_empty() {
            warn!(kind = %kind, modules = ?unready, "modules not ready");
            return Err(ControlError::ReadinessTimeout { modules: unready });
        }

        info!(kind = %kind, "all modules ready");
        Ok(report)
    }

    /// Poll the gateway until it reports ready, with the same budget.
    pub async fn wait_for_gateway(&self, gateway: &dyn ApiGateway) -> ControlResult<()> {
        for attempt in 1..=self.max_retries {
            match gateway.route_status().await {
                Ok(true) => {
                    debug!(attempt, "gateway ready");
                    return Ok(());
                }
                Ok(false) => debug!(attempt, "gateway not ready"),
                Err(e) => debug!(attempt, error = %e, "gateway status failed"),
            }
            if attempt < self.max_retries {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        warn!(attempts = self.max_retries, "gateway never became ready");
        Err(ControlError::ReadinessTimeout {
            modules: vec![GATEWAY.to_owned()],
        })
    }

    async fn probe_until_ready(&self, module: &str, port: u16) -> ReadinessOutcome {
        let mut last_error = String::new();
        for attempt in 1..=self.max_retries {
            match self.probe.probe(port).await {
                Ok(()) => {
                    debug!(module = %module, port, attempt, "module ready");
                    return ReadinessOutcome::Ready { attempts: attempt };
                }
                Err(e) => {
                    debug!(module = %module, port, attempt, error = %e, "module not ready yet");
                    last_error = e.to_string();
                }
            }
            if attempt < self.max_retries {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        warn!(module = %module, port, error = %last_error, "module never became ready");
        ReadinessOutcome::TimedOut {
            attempts: self.max_retries,
            last_error,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clients::StaticGateway;
    use dashmap::DashMap;
    use httpmock::prelude::*;
    use tokio::time::Instant;

    /// Fails a fixed number of times per port before answering.
    #[derive(Default)]
    struct ScriptedProbe {
        failures: DashMap<u16, u32>,
    }

    impl ScriptedProbe {
        fn failing(failures: &[(u16, u32)]) -> Self {
            let probe = Self::default();
            for (port, count) in failures {
                probe.failures.insert(*port, *count);
            }
            probe
        }
    }

    #[async_trait]
    impl ReadinessProbe for ScriptedProbe {
        async fn probe(&self, port: u16) -> ControlResult<()> {
            let mut remaining = self.failures.entry(port).or_insert(0);
            if *remaining == 0 {
                return Ok(());
            }
            *remaining -= 1;
            Err(ControlError::runtime("connection refused"))
        }
    }

    fn ports(entries: &[(&str, u16, Option<u16>)]) -> BTreeMap<String, ModulePorts> {
        entries
            .iter()
            .map(|(name, module, sidecar)| {
                (
                    (*name).to_owned(),
                    ModulePorts {
                        module: *module,
                        sidecar: *sidecar,
                    },
                )
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn probes_run_in_parallel() {
        let failures: Vec<(u16, u32)> = (30000..30010).map(|port| (port, 3)).collect();
        let verifier = ReadinessVerifier::new(
            Arc::new(ScriptedProbe::failing(&failures)),
            10,
            Duration::from_secs(1),
        );
        let ports = ports(&[
            ("mod-a", 30000, Some(30001)),
            ("mod-b", 30002, Some(30003)),
            ("mod-c", 30004, Some(30005)),
            ("mod-d", 30006, Some(30007)),
            ("mod-e", 30008, Some(30009)),
        ]);

        let started = Instant::now();
        let report = verifier
            .check_all(ModuleKind::Business, &ports)
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_secs(3), "took {elapsed:?}");
        assert!(elapsed < Duration::from_secs(4), "took {elapsed:?}");
        assert_eq!(report.records.len(), 5);
        assert_eq!(
            report.records["mod-a"][&30001],
            ReadinessOutcome::Ready { attempts: 4 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unready_module_fails_the_gate() {
        let verifier = ReadinessVerifier::new(
            Arc::new(ScriptedProbe::failing(&[(30001, u32::MAX)])),
            5,
            Duration::from_secs(2),
        );
        let ports = ports(&[("mod-a", 30000, Some(30001)), ("mod-b", 30002, None)]);

        let started = Instant::now();
        let err = verifier
            .check_all(ModuleKind::Business, &ports)
            .await
            .unwrap_err();

        match err {
            ControlError::ReadinessTimeout { modules } => assert_eq!(modules, vec!["mod-a"]),
            other => panic!("unexpected error: {other}"),
        }
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn empty_pass_is_ready() {
        let verifier =
            ReadinessVerifier::new(Arc::new(ScriptedProbe::default()), 1, Duration::ZERO);
        let report = verifier
            .check_all(ModuleKind::Management, &BTreeMap::new())
            .await
            .unwrap();
        assert!(report.records.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn gateway_wait_gives_up() {
        let verifier =
            ReadinessVerifier::new(Arc::new(ScriptedProbe::default()), 3, Duration::from_secs(1));

        verifier
            .wait_for_gateway(&StaticGateway::new(true))
            .await
            .unwrap();

        let err = verifier
            .wait_for_gateway(&StaticGateway::new(false))
            .await
            .unwrap_err();
        assert!(err.to_string().contains(GATEWAY));
    }

    #[tokio::test]
    async fn http_probe_hits_health_endpoint() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/admin/health");
                then.status(200).body("OK");
            })
            .await;

        let probe = HttpProbe::new("127.0.0.1", "/admin/health").unwrap();
        probe.probe(server.port()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_probe_rejects_server_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/admin/health");
                then.status(503);
            })
            .await;

        let probe = HttpProbe::new("127.0.0.1", "/admin/health").unwrap();
        let err = probe.probe(server.port()).await.unwrap_err();
        assert!(matches!(err, ControlError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn tcp_probe_connects() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        TcpProbe::new("127.0.0.1").probe(port).await.unwrap();
    }
}
