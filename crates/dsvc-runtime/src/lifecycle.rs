//! Per-service startup: create, wait running, wait healthy, run setup,
//! publish the environment.
//!
//! The lifecycle writes the container handle and the compiled environment;
//! status transitions are reported to the caller, which owns them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dsvc_common::config::OrchestratorConfig;
use dsvc_common::error::{Result, ServicesError};
use dsvc_common::types::{ContainerId, ContainerName, ServiceStatus};
use dsvc_compose::env::{EnvContext, port_variables};
use dsvc_compose::parser::ast::ServiceSpec;
use dsvc_compose::template;

use crate::backend::{ContainerBackend, ContainerConfig, ContainerInfo};
use crate::cancel::CancellationToken;
use crate::events::{EventSink, ServiceEvent};
use crate::wait::{WaitTarget, poll_until};

/// A container owned by one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    /// Engine-assigned ID, unknown until `run` answers.
    pub id: Option<ContainerId>,
    /// Generated name.
    pub name: ContainerName,
}

/// Runtime state attached to a declared service.
#[derive(Debug, Clone)]
pub struct RuntimeService {
    /// The declaration.
    pub spec: ServiceSpec,
    /// Current status.
    pub status: ServiceStatus,
    /// The service's container, once created.
    pub container: Option<ContainerHandle>,
    /// Every variable the service published.
    pub compiled_env: BTreeMap<String, String>,
    /// When the container was created.
    pub started_at: Option<DateTime<Utc>>,
}

impl RuntimeService {
    /// Wraps a declaration that has not been started.
    #[must_use]
    pub const fn new(spec: ServiceSpec) -> Self {
        Self {
            spec,
            status: ServiceStatus::NotStarted,
            container: None,
            compiled_env: BTreeMap::new(),
            started_at: None,
        }
    }
}

/// Everything a service startup needs from the run.
#[derive(Clone, Copy)]
pub struct LaunchContext<'a> {
    /// Container engine.
    pub backend: &'a dyn ContainerBackend,
    /// Run-wide settings.
    pub config: &'a OrchestratorConfig,
    /// Shared environment receiving published variables.
    pub env: &'a EnvContext,
    /// Progress reporting.
    pub events: &'a dyn EventSink,
    /// Run-wide cancellation.
    pub cancel: &'a CancellationToken,
    /// Address published in `_ADDR` variables.
    pub host_addr: &'a str,
}

/// Where a startup records its results.
pub struct LaunchSlot<'a> {
    /// Receives the container handle as soon as it exists.
    pub container: &'a mut Option<ContainerHandle>,
    /// Receives the compiled environment once published.
    pub compiled_env: &'a mut BTreeMap<String, String>,
    /// Receives the creation time.
    pub started_at: &'a mut Option<DateTime<Utc>>,
}

/// Starts one service and publishes its environment.
///
/// `inherited` holds the compiled environment of every service `spec`
/// requires. The container handle is recorded in `slot` before the engine
/// is asked to create it, so a failed startup still leaves it for teardown.
///
/// # Errors
///
/// Returns the first failing step's error: engine errors,
/// [`ServicesError::StartupTimeout`], [`ServicesError::ContainerExited`],
/// [`ServicesError::SetupCommandFailure`],
/// [`ServicesError::TemplateExpansionError`], or
/// [`ServicesError::Cancelled`].
pub fn start_service(
    ctx: &LaunchContext<'_>,
    spec: &ServiceSpec,
    inherited: &BTreeMap<String, String>,
    slot: &mut LaunchSlot<'_>,
    set_status: &mut dyn FnMut(ServiceStatus),
) -> Result<()> {
    ctx.cancel.check()?;
    set_status(ServiceStatus::Starting);
    ctx.events.emit(&ServiceEvent::Launching {
        service: spec.name.clone(),
        image: spec.image.clone(),
    });

    ensure_image(ctx, spec)?;
    ctx.cancel.check()?;

    let variables = container_variables(spec, inherited);
    let name = ContainerName::generate(&ctx.config.namespace, &spec.name);
    // The engine may have created the container even if `run` fails.
    *slot.container = Some(ContainerHandle {
        id: None,
        name: name.clone(),
    });
    let config = ContainerConfig {
        name,
        image: spec.image.clone(),
        command: spec.command.clone(),
        workdir: spec.workdir.clone(),
        env: variables.clone(),
        auto_remove: true,
        publish_all_ports: true,
    };
    let id = ctx.backend.run(&config)?;
    tracing::info!(service = %spec.name, id = %id, name = %config.name, "container started");
    *slot.started_at = Some(Utc::now());
    if let Some(handle) = slot.container.as_mut() {
        handle.id = Some(id.clone());
    }
    ctx.events.emit(&ServiceEvent::ContainerStarted {
        service: spec.name.clone(),
        container: config.name,
    });

    let mut info = wait_running(ctx, spec, &id)?;
    set_status(ServiceStatus::Running);

    if info.health.is_some() {
        ctx.events.emit(&ServiceEvent::WaitingForHealthy {
            service: spec.name.clone(),
        });
        info = wait_healthy(ctx, spec, &id)?;
        set_status(ServiceStatus::Healthy);
    }

    run_setup_commands(ctx, spec, &id)?;
    set_status(ServiceStatus::SetupComplete);

    let compiled = compile_environment(spec, &info, &variables, ctx.host_addr)?;
    ctx.env.publish(&compiled);
    ctx.events.emit(&ServiceEvent::Published {
        service: spec.name.clone(),
        variables: compiled.len(),
    });
    *slot.compiled_env = compiled;
    set_status(ServiceStatus::EnvPublished);
    Ok(())
}

fn ensure_image(ctx: &LaunchContext<'_>, spec: &ServiceSpec) -> Result<()> {
    if ctx.backend.image_exists(&spec.image)? {
        tracing::debug!(image = %spec.image, "image present locally");
        return Ok(());
    }
    ctx.events.emit(&ServiceEvent::PullingImage {
        service: spec.name.clone(),
        image: spec.image.clone(),
    });
    ctx.backend.pull_image(&spec.image, ctx.config.pull_timeout)
}

/// Variables injected into the container: inherited ones first, the
/// service's own declarations on top.
fn container_variables(spec: &ServiceSpec, inherited: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut vars = inherited.clone();
    vars.extend(spec.environment.iter().map(|(k, v)| (k.clone(), v.clone())));
    vars
}

fn inspect_live(ctx: &LaunchContext<'_>, spec: &ServiceSpec, id: &ContainerId) -> Result<ContainerInfo> {
    match ctx.backend.inspect(id)? {
        Some(info) if info.has_exited() => Err(ServicesError::ContainerExited {
            service: spec.name.clone(),
            status: info.status,
        }),
        Some(info) => Ok(info),
        None => Err(ServicesError::ContainerExited {
            service: spec.name.clone(),
            status: "removed".into(),
        }),
    }
}

fn wait_running(ctx: &LaunchContext<'_>, spec: &ServiceSpec, id: &ContainerId) -> Result<ContainerInfo> {
    let target = WaitTarget {
        service: &spec.name,
        state: "running",
    };
    poll_until(target, ctx.config.startup_timeout, ctx.config.poll_interval, ctx.cancel, || {
        let info = inspect_live(ctx, spec, id)?;
        Ok(info.is_running().then_some(info))
    })
}

fn wait_healthy(ctx: &LaunchContext<'_>, spec: &ServiceSpec, id: &ContainerId) -> Result<ContainerInfo> {
    let target = WaitTarget {
        service: &spec.name,
        state: "healthy",
    };
    poll_until(target, ctx.config.startup_timeout, ctx.config.poll_interval, ctx.cancel, || {
        let info = inspect_live(ctx, spec, id)?;
        Ok((info.health.as_deref() == Some("healthy")).then_some(info))
    })
}

fn run_setup_commands(ctx: &LaunchContext<'_>, spec: &ServiceSpec, id: &ContainerId) -> Result<()> {
    for command in &spec.setup_commands {
        ctx.cancel.check()?;
        ctx.events.emit(&ServiceEvent::RunningSetup {
            service: spec.name.clone(),
            command: command.to_string(),
        });
        let output = ctx.backend.exec(id, &command.argv(), ctx.config.setup_timeout)?;
        let combined = output.combined();
        if !combined.is_empty() {
            ctx.events.emit(&ServiceEvent::SetupOutput {
                service: spec.name.clone(),
                output: combined.clone(),
            });
        }
        if !output.success() {
            return Err(ServicesError::SetupCommandFailure {
                service: spec.name.clone(),
                command: command.to_string(),
                exit_code: output.exit_code,
                output: combined,
            });
        }
    }
    Ok(())
}

/// Builds the published environment: port variables, then the container
/// variables, then templates expanded against everything before them.
///
/// # Errors
///
/// Returns [`ServicesError::TemplateExpansionError`] if a template fails.
pub fn compile_environment(
    spec: &ServiceSpec,
    info: &ContainerInfo,
    variables: &BTreeMap<String, String>,
    host_addr: &str,
) -> Result<BTreeMap<String, String>> {
    let mut compiled = port_variables(&spec.name, &info.ports, host_addr);
    compiled.extend(variables.iter().map(|(k, v)| (k.clone(), v.clone())));
    let _ = template::expand_all(&spec.name, &spec.templates, &mut compiled)?;
    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use dsvc_compose::env::PublishedPort;

    use super::*;

    fn running_with_port(container_port: u16, host_port: &str) -> ContainerInfo {
        ContainerInfo {
            status: "running".into(),
            health: None,
            ports: vec![PublishedPort {
                container_port,
                protocol: "tcp".into(),
                host_ip: "0.0.0.0".into(),
                host_port: host_port.into(),
            }],
        }
    }

    #[test]
    fn compile_environment_publishes_ports_vars_and_templates() {
        let mut spec = ServiceSpec::new("postgres");
        let _ = spec.environment.insert("POSTGRES_DB".into(), "mydb".into());
        spec.templates = vec![(
            "DATABASE_URL".into(),
            "postgres://localhost:{env[POSTGRES_PORT_5432_TCP_PORT]}/{env[POSTGRES_DB]}".into(),
        )];
        let variables = container_variables(&spec, &BTreeMap::new());

        let env = compile_environment(&spec, &running_with_port(5432, "55000"), &variables, "127.0.0.1").unwrap();
        assert_eq!(env["POSTGRES_PORT_5432_TCP_PORT"], "55000");
        assert_eq!(env["POSTGRES_PORT_5432_TCP_ADDR"], "127.0.0.1");
        assert_eq!(env["POSTGRES_DB"], "mydb");
        assert_eq!(env["DATABASE_URL"], "postgres://localhost:55000/mydb");
    }

    #[test]
    fn compile_environment_rejects_unknown_reference() {
        let mut spec = ServiceSpec::new("web");
        spec.templates = vec![("URL".into(), "{env[NOT_THERE]}".into())];
        let err = compile_environment(&spec, &running_with_port(80, "8080"), &BTreeMap::new(), "h").unwrap_err();
        assert!(matches!(err, ServicesError::TemplateExpansionError { .. }));
    }

    #[test]
    fn own_variables_override_inherited_ones() {
        let mut spec = ServiceSpec::new("api");
        let _ = spec.environment.insert("MODE".into(), "own".into());
        let inherited = BTreeMap::from([
            ("MODE".to_string(), "inherited".to_string()),
            ("DB_PORT_5432_TCP_PORT".to_string(), "5000".to_string()),
        ]);
        let vars = container_variables(&spec, &inherited);
        assert_eq!(vars["MODE"], "own");
        assert_eq!(vars["DB_PORT_5432_TCP_PORT"], "5000");
    }

    #[test]
    fn templates_see_inherited_variables() {
        let mut spec = ServiceSpec::new("api");
        spec.templates = vec![("DB_URL".into(), "db:{env[DB_PORT_5432_TCP_PORT]}".into())];
        let inherited = BTreeMap::from([("DB_PORT_5432_TCP_PORT".to_string(), "5000".to_string())]);
        let vars = container_variables(&spec, &inherited);
        let info = ContainerInfo {
            status: "running".into(),
            health: None,
            ports: Vec::new(),
        };
        let env = compile_environment(&spec, &info, &vars, "h").unwrap();
        assert_eq!(env["DB_URL"], "db:5000");
    }
}
