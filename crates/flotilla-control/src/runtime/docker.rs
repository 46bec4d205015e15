//! Docker runtime driven through the `docker` command-line client.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use super::{ContainerRuntime, ContainerSpec, ContainerSummary};
use crate::config::{RegistryAuth, RuntimeConfig};
use crate::error::{ControlError, ControlResult};

/// Container runtime backed by the docker CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    timeout: Duration,
}

impl DockerCli {
    /// Create a runtime from configuration.
    #[must_use]
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            binary: config.docker_binary.clone(),
            timeout: Duration::from_secs(config.command_timeout_secs),
        }
    }

    /// Run a docker subcommand and return its stdout.
    async fn run(&self, args: &[String]) -> ControlResult<String> {
        self.run_with_input(args, None).await
    }

    async fn run_with_input(&self, args: &[String], input: Option<&str>) -> ControlResult<String> {
        debug!(binary = %self.binary, args = ?redact(args), "running docker");

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ControlError::runtime(format!("failed to spawn {}: {e}", self.binary)))?;

        if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin.write_all(input.as_bytes()).await?;
            drop(stdin);
        }

        let output = tokio::select! {
            output = child.wait_with_output() => output?,
            () = tokio::time::sleep(self.timeout) => {
                return Err(ControlError::runtime(format!(
                    "docker {} timed out after {:?}",
                    args.first().map_or("", String::as_str),
                    self.timeout
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ControlError::runtime(format!(
                "docker {} failed ({}): {}",
                args.first().map_or("", String::as_str),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn login(&self, auth: &RegistryAuth) -> ControlResult<()> {
        let mut args = vec![
            "login".to_owned(),
            "--username".to_owned(),
            auth.username.clone(),
            "--password-stdin".to_owned(),
        ];
        if !auth.server.is_empty() {
            args.push(auth.server.clone());
        }

        self.run_with_input(&args, Some(&auth.password)).await?;
        debug!(server = %auth.server, "logged in to registry");
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn pull_image(&self, image: &str, auth: Option<&RegistryAuth>) -> ControlResult<()> {
        if let Some(auth) = auth {
            self.login(auth).await?;
        }

        info!(image = %image, "pulling image");
        self.run(&["pull".to_owned(), "--quiet".to_owned(), image.to_owned()])
            .await?;
        Ok(())
    }

    async fn create_and_start(&self, spec: &ContainerSpec) -> ControlResult<String> {
        // A leftover container with the same name would make `run` fail.
        if self
            .run(&["rm".to_owned(), "--force".to_owned(), spec.name.clone()])
            .await
            .is_ok()
        {
            debug!(container = %spec.name, "removed previous container");
        }

        let output = self.run(&run_args(spec)).await?;
        let id = output.trim().to_owned();

        info!(
            container = %spec.name,
            id = %short_id(&id),
            image = %spec.image,
            "started container"
        );
        Ok(id)
    }

    async fn stop(&self, id: &str) -> ControlResult<()> {
        self.run(&["stop".to_owned(), id.to_owned()]).await?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> ControlResult<()> {
        self.run(&["rm".to_owned(), "--volumes".to_owned(), id.to_owned()])
            .await?;
        Ok(())
    }

    async fn list_containers(&self, pattern: &str) -> ControlResult<Vec<ContainerSummary>> {
        let output = self
            .run(&[
                "ps".to_owned(),
                "--all".to_owned(),
                "--filter".to_owned(),
                format!("name={pattern}"),
                "--format".to_owned(),
                "{{json .}}".to_owned(),
            ])
            .await?;

        parse_ps_output(&output)
    }

    async fn logs(&self, name: &str) -> ControlResult<String> {
        // Combined output so a marker written to either stream is found.
        let output = Command::new(&self.binary)
            .args(["logs", name])
            .output()
            .await?;

        if !output.status.success() {
            return Err(ControlError::runtime(format!(
                "docker logs {name} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(combined)
    }

    async fn exec(&self, name: &str, args: &[String]) -> ControlResult<String> {
        let mut full = vec!["exec".to_owned(), name.to_owned()];
        full.extend(args.iter().cloned());
        self.run(&full).await
    }
}

/// Arguments of `docker run` for a container spec.
fn run_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec![
        "run".to_owned(),
        "--detach".to_owned(),
        "--name".to_owned(),
        spec.name.clone(),
        "--hostname".to_owned(),
        spec.hostname.clone(),
        "--network".to_owned(),
        spec.network.clone(),
        "--restart".to_owned(),
        spec.restart_policy.clone(),
        "--memory".to_owned(),
        format!("{}m", spec.memory_mb),
    ];

    if let Some(cpus) = spec.cpus {
        args.push("--cpus".to_owned());
        args.push(cpus.to_string());
    }

    for binding in &spec.ports {
        args.push("--expose".to_owned());
        args.push(binding.container_port.to_string());
        args.push("--publish".to_owned());
        args.push(format!(
            "{}:{}:{}",
            binding.host_ip, binding.host_port, binding.container_port
        ));
    }

    for (key, value) in &spec.labels {
        args.push("--label".to_owned());
        args.push(format!("{key}={value}"));
    }

    for entry in &spec.env {
        args.push("--env".to_owned());
        args.push(entry.clone());
    }

    args.push(spec.image.clone());
    args
}

#[derive(Debug, Deserialize)]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "Image")]
    image: String,
    #[serde(rename = "State", default)]
    state: String,
    #[serde(rename = "Labels", default)]
    labels: String,
}

/// Parse `docker ps --format '{{json .}}'` output, one object per line.
fn parse_ps_output(output: &str) -> ControlResult<Vec<ContainerSummary>> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| -> ControlResult<ContainerSummary> {
            let line: PsLine = serde_json::from_str(line)?;
            Ok(ContainerSummary {
                id: line.id,
                name: line.names,
                image: line.image,
                state: line.state,
                labels: parse_labels(&line.labels),
            })
        })
        .collect()
}

/// Parse the `k=v,k2=v2` label column of `docker ps`.
fn parse_labels(labels: &str) -> BTreeMap<String, String> {
    labels
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.trim().to_owned(), value.to_owned()))
        .collect()
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

/// Hide environment values from debug logs; they carry tokens.
fn redact(args: &[String]) -> Vec<&str> {
    let mut redacted = Vec::with_capacity(args.len());
    let mut hide_next = false;
    for arg in args {
        if hide_next {
            redacted.push(arg.split_once('=').map_or("***", |(key, _)| key));
            hide_next = false;
        } else {
            hide_next = arg == "--env";
            redacted.push(arg.as_str());
        }
    }
    redacted
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::runtime::PortBinding;

    fn spec() -> ContainerSpec {
        ContainerSpec {
            name: "dev-mod-users".to_owned(),
            hostname: "mod-users".to_owned(),
            image: "folioci/mod-users:19.4.0".to_owned(),
            env: vec!["A=1".to_owned(), "TOKEN=secret".to_owned()],
            network: "flotilla".to_owned(),
            restart_policy: "unless-stopped".to_owned(),
            ports: vec![PortBinding {
                host_ip: "0.0.0.0".to_owned(),
                host_port: 30000,
                container_port: 8081,
            }],
            memory_mb: 768,
            cpus: Some(1.5),
            labels: BTreeMap::from([("flotilla.kind".to_owned(), "business".to_owned())]),
        }
    }

    #[test]
    fn run_arguments() {
        let args = run_args(&spec());

        assert_eq!(args[0], "run");
        assert!(args.windows(2).any(|w| w == ["--name", "dev-mod-users"]));
        assert!(args.windows(2).any(|w| w == ["--publish", "0.0.0.0:30000:8081"]));
        assert!(args.windows(2).any(|w| w == ["--memory", "768m"]));
        assert!(args.windows(2).any(|w| w == ["--cpus", "1.5"]));
        assert!(args.windows(2).any(|w| w == ["--env", "TOKEN=secret"]));
        assert!(args.windows(2).any(|w| w == ["--label", "flotilla.kind=business"]));
        assert_eq!(args.last().unwrap(), "folioci/mod-users:19.4.0");
    }

    #[test]
    fn redacts_environment_values() {
        let args = run_args(&spec());
        let shown = redact(&args);

        assert!(shown.contains(&"TOKEN"));
        assert!(!shown.iter().any(|arg| arg.contains("secret")));
        assert!(shown.contains(&"dev-mod-users"));
    }

    #[test]
    fn parse_ps_lines() {
        let output = concat!(
            r#"{"ID":"abc123","Names":"dev-mod-users","Image":"folioci/mod-users:19.4.0","#,
            r#""State":"running","Status":"Up 2 minutes","#,
            r#""Labels":"flotilla.kind=business,flotilla.module=mod-users"}"#,
            "\n",
            r#"{"ID":"def456","Names":"dev-mod-users-sc","#,
            r#""Image":"folioci/folio-module-sidecar:latest","#,
            r#""State":"exited","Status":"Exited (1)"}"#,
            "\n",
        );
        let containers = parse_ps_output(output).unwrap();

        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].name, "dev-mod-users");
        assert!(containers[0].is_running());
        assert_eq!(containers[0].label("flotilla.module"), Some("mod-users"));
        assert!(!containers[1].is_running());
        assert!(containers[1].labels.is_empty());
    }

    #[test]
    fn parse_empty_ps_output() {
        assert!(parse_ps_output("\n").unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_binary_is_a_runtime_error() {
        let runtime = DockerCli {
            binary: "flotilla-no-such-docker-binary".to_owned(),
            timeout: Duration::from_secs(5),
        };

        let err = runtime.list_containers("dev-").await.unwrap_err();
        assert!(matches!(err, ControlError::Runtime(_)));
    }
}
