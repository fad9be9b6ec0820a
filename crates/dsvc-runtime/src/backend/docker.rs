//! Backend driving the `docker` command-line client.
//!
//! Any engine with a Docker-compatible CLI works (point `DSVC_DOCKER` at
//! `podman`, for instance). `docker inspect` output is decoded with
//! `serde_json`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use dsvc_common::constants::{DEFAULT_DOCKER_BINARY, DEFAULT_STOP_TIMEOUT, DOCKER_BINARY_VAR};
use dsvc_common::error::{Result, ServicesError};
use dsvc_common::types::{ContainerId, ContainerName};
use dsvc_compose::env::PublishedPort;
use serde::Deserialize;

use super::{ContainerBackend, ContainerConfig, ContainerInfo};
use crate::exec::{ExecOutput, run_bounded};

/// Bound on short engine calls (`run`, `inspect`, `image inspect`).
const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Backend that shells out to a Docker-compatible CLI.
#[derive(Debug, Clone)]
pub struct DockerCliBackend {
    binary: PathBuf,
    stop_timeout: Duration,
}

impl DockerCliBackend {
    /// Locates the engine binary: `DSVC_DOCKER` if set, else `docker` on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns an error if no binary can be found.
    pub fn detect() -> Result<Self> {
        if let Some(binary) = std::env::var_os(DOCKER_BINARY_VAR).filter(|v| !v.is_empty()) {
            return Ok(Self::with_binary(binary));
        }
        let binary = which::which(DEFAULT_DOCKER_BINARY).map_err(|e| ServicesError::Engine {
            operation: "detect",
            message: format!("`{DEFAULT_DOCKER_BINARY}` not found on PATH: {e}"),
        })?;
        Ok(Self::with_binary(binary))
    }

    /// Uses an explicit engine binary.
    #[must_use]
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    fn call(&self, operation: &'static str, args: &[String], timeout: Duration) -> Result<ExecOutput> {
        let mut command = Command::new(&self.binary);
        let _ = command.args(args);
        run_bounded(&mut command, timeout)?.ok_or_else(|| ServicesError::Engine {
            operation,
            message: format!("no answer within {timeout:?}"),
        })
    }

    fn call_checked(&self, operation: &'static str, args: &[String], timeout: Duration) -> Result<ExecOutput> {
        let output = self.call(operation, args, timeout)?;
        if output.success() {
            Ok(output)
        } else {
            Err(ServicesError::Engine {
                operation,
                message: output.combined(),
            })
        }
    }
}

impl ContainerBackend for DockerCliBackend {
    fn image_exists(&self, image: &str) -> Result<bool> {
        let output = self.call(
            "image inspect",
            &args(["image", "inspect", "--format", "{{.Id}}", image]),
            COMMAND_TIMEOUT,
        )?;
        if output.success() {
            Ok(true)
        } else if is_missing(&output.stderr) {
            Ok(false)
        } else {
            Err(ServicesError::Engine {
                operation: "image inspect",
                message: output.combined(),
            })
        }
    }

    fn pull_image(&self, image: &str, timeout: Duration) -> Result<()> {
        tracing::info!(image, "pulling image");
        let _ = self.call_checked("pull", &args(["pull", image]), timeout)?;
        Ok(())
    }

    fn run(&self, config: &ContainerConfig) -> Result<ContainerId> {
        tracing::info!(name = %config.name, image = %config.image, "creating container");
        let output = self.call_checked("run", &run_args(config), COMMAND_TIMEOUT)?;
        let id = output.stdout.trim();
        if id.is_empty() {
            return Err(ServicesError::Engine {
                operation: "run",
                message: "engine returned no container id".into(),
            });
        }
        Ok(ContainerId::new(id))
    }

    fn inspect(&self, id: &ContainerId) -> Result<Option<ContainerInfo>> {
        let output = self.call("inspect", &args(["inspect", id.as_str()]), COMMAND_TIMEOUT)?;
        if !output.success() {
            if is_missing(&output.stderr) {
                return Ok(None);
            }
            return Err(ServicesError::Engine {
                operation: "inspect",
                message: output.combined(),
            });
        }
        parse_inspect(&output.stdout)
    }

    fn exec(&self, id: &ContainerId, cmd: &[String], timeout: Duration) -> Result<ExecOutput> {
        tracing::debug!(id = %id, cmd = ?cmd, "exec into container");
        if cmd.is_empty() {
            return Err(ServicesError::Config {
                message: "exec command is empty".into(),
            });
        }
        let mut full = args(["exec", id.as_str()]);
        full.extend(cmd.iter().cloned());
        self.call("exec", &full, timeout)
    }

    fn stop(&self, name: &ContainerName) -> Result<()> {
        let grace = self.stop_timeout.as_secs() / 3;
        let output = self.call(
            "stop",
            &args(["stop", "--time", &grace.to_string(), name.as_str()]),
            self.stop_timeout,
        )?;
        if output.success() || is_missing(&output.stderr) {
            tracing::info!(container = %name, "container stopped");
            Ok(())
        } else {
            Err(ServicesError::Engine {
                operation: "stop",
                message: output.combined(),
            })
        }
    }

    fn is_available(&self) -> bool {
        self.binary.is_file() || which::which(&self.binary).is_ok()
    }
}

fn args<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Recognizes "does not exist" answers from Docker and Podman.
fn is_missing(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    ["no such container", "no such object", "no such image", "image not known"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// Builds the `run` argument list for a container configuration.
fn run_args(config: &ContainerConfig) -> Vec<String> {
    let mut out = args(["run", "--detach", "--name", config.name.as_str()]);
    if config.auto_remove {
        out.push("--rm".into());
    }
    if config.publish_all_ports {
        out.push("--publish-all".into());
    }
    if let Some(ref workdir) = config.workdir {
        out.push("--workdir".into());
        out.push(workdir.clone());
    }
    for (key, value) in &config.env {
        out.push("--env".into());
        out.push(format!("{key}={value}"));
    }
    out.push(config.image.clone());
    if let Some(ref command) = config.command {
        out.extend(command.iter().cloned());
    }
    out
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    state: InspectState,
    #[serde(default)]
    network_settings: Option<NetworkSettings>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    status: String,
    #[serde(default)]
    health: Option<InspectHealth>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHealth {
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkSettings {
    #[serde(default)]
    ports: Option<BTreeMap<String, Option<Vec<HostBinding>>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HostBinding {
    #[serde(default)]
    host_ip: String,
    host_port: String,
}

/// Decodes `docker inspect` output for a single container.
fn parse_inspect(json: &str) -> Result<Option<ContainerInfo>> {
    let entries: Vec<InspectEntry> = serde_json::from_str(json)?;
    let Some(entry) = entries.into_iter().next() else {
        return Ok(None);
    };

    let mut ports = Vec::new();
    let bindings = entry.network_settings.and_then(|n| n.ports).unwrap_or_default();
    for (key, hosts) in bindings {
        let (number, protocol) = key.split_once('/').unwrap_or((key.as_str(), "tcp"));
        let container_port = number.parse::<u16>().map_err(|_| ServicesError::Engine {
            operation: "inspect",
            message: format!("unexpected port key: {key}"),
        })?;
        for host in hosts.unwrap_or_default() {
            ports.push(PublishedPort {
                container_port,
                protocol: protocol.to_string(),
                host_ip: host.host_ip,
                host_port: host.host_port,
            });
        }
    }

    Ok(Some(ContainerInfo {
        status: entry.state.status,
        health: entry.state.health.map(|h| h.status),
        ports,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSPECT_RUNNING: &str = r#"[{
        "Id": "abc123",
        "State": {"Status": "running", "Running": true, "Health": {"Status": "starting", "FailingStreak": 0}},
        "NetworkSettings": {"Ports": {
            "5432/tcp": [{"HostIp": "0.0.0.0", "HostPort": "55000"}, {"HostIp": "::", "HostPort": "55000"}],
            "9999/udp": null
        }}
    }]"#;

    #[test]
    fn parse_inspect_reads_status_health_and_ports() {
        let info = parse_inspect(INSPECT_RUNNING).unwrap().unwrap();
        assert!(info.is_running());
        assert_eq!(info.health.as_deref(), Some("starting"));
        assert_eq!(info.ports.len(), 2);
        assert_eq!(info.ports[0].container_port, 5432);
        assert_eq!(info.ports[0].protocol, "tcp");
        assert_eq!(info.ports[0].host_port, "55000");
    }

    #[test]
    fn parse_inspect_without_health_or_ports() {
        let info = parse_inspect(r#"[{"State": {"Status": "created"}, "NetworkSettings": {"Ports": {}}}]"#)
            .unwrap()
            .unwrap();
        assert_eq!(info.status, "created");
        assert!(info.health.is_none());
        assert!(info.ports.is_empty());
    }

    #[test]
    fn parse_inspect_empty_array_is_none() {
        assert!(parse_inspect("[]").unwrap().is_none());
    }

    #[test]
    fn parse_inspect_rejects_garbage() {
        assert!(parse_inspect("not json").is_err());
    }

    #[test]
    fn run_args_publish_everything() {
        let config = ContainerConfig {
            name: ContainerName::generate("docker_services", "db"),
            image: "postgres:16".into(),
            command: Some(vec!["postgres".into(), "-c".into(), "fsync=off".into()]),
            workdir: Some("/data".into()),
            env: BTreeMap::from([("POSTGRES_PASSWORD".to_string(), "secret".to_string())]),
            auto_remove: true,
            publish_all_ports: true,
        };
        let args = run_args(&config);
        assert_eq!(&args[..3], ["run", "--detach", "--name"]);
        assert!(args.contains(&"--rm".to_string()));
        assert!(args.contains(&"--publish-all".to_string()));
        assert!(args.contains(&"POSTGRES_PASSWORD=secret".to_string()));
        let image_pos = args.iter().position(|a| a == "postgres:16").unwrap();
        assert_eq!(&args[image_pos + 1..], ["postgres", "-c", "fsync=off"]);
    }

    #[test]
    fn missing_container_messages() {
        assert!(is_missing("Error response from daemon: No such container: abc"));
        assert!(is_missing("Error: No such object: abc"));
        assert!(!is_missing("permission denied"));
    }

    #[test]
    fn podman_missing_messages() {
        assert!(is_missing("Error: failed to find image redis: redis: image not known"));
        assert!(is_missing("Error: no container with name or ID \"abc\" found: no such container"));
    }

    #[test]
    fn explicit_binary_that_does_not_exist_is_unavailable() {
        let backend = DockerCliBackend::with_binary("/nonexistent/dsvc-docker");
        assert!(!backend.is_available());
    }
}
