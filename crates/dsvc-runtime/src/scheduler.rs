//! Wave-by-wave startup of a declared service set.
//!
//! Declaration errors (bad names, unknown dependencies, cycles) surface
//! before any container exists. Each wave runs on scoped worker threads;
//! a wave only starts once every earlier wave has published its
//! environment.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use dsvc_common::config::OrchestratorConfig;
use dsvc_common::error::{Result, ServicesError};
use dsvc_common::types::ServiceStatus;
use dsvc_compose::env::{EnvContext, resolve_host_address};
use dsvc_compose::graph::DependencyGraph;
use dsvc_compose::parser::ast::ServiceMap;

use crate::backend::ContainerBackend;
use crate::cancel::CancellationToken;
use crate::events::{EventSink, ServiceEvent};
use crate::lifecycle::{LaunchContext, LaunchSlot, RuntimeService, start_service};
use crate::session::Session;

/// Validates a declaration and returns its startup waves.
///
/// # Errors
///
/// Returns [`ServicesError::InvalidServiceName`],
/// [`ServicesError::UnknownDependency`], or
/// [`ServicesError::DependencyCycle`].
pub fn plan(services: &ServiceMap) -> Result<Vec<Vec<String>>> {
    DependencyGraph::from_services(services)?.waves()
}

/// Starts every service and returns the session owning their containers.
///
/// On failure no further wave starts, services already running in the
/// failing wave finish or fail, and every created container is stopped
/// before the first error is returned. This holds even with keep-alive set.
///
/// # Errors
///
/// Returns the declaration error, or the first startup error.
pub fn start_all(
    services: &ServiceMap,
    backend: Arc<dyn ContainerBackend>,
    config: &OrchestratorConfig,
    events: Arc<dyn EventSink>,
    cancel: &CancellationToken,
) -> Result<Session> {
    config.validate()?;
    let graph = DependencyGraph::from_services(services)?;
    let waves = graph.waves()?;

    let host_addr = resolve_host_address(config.host_override.as_deref());
    tracing::debug!(host_addr = %host_addr, "resolved host address");

    let runtime: Vec<RuntimeService> = waves
        .iter()
        .flatten()
        .filter_map(|name| services.get(name))
        .map(|spec| RuntimeService::new(spec.clone()))
        .collect();
    let env = EnvContext::new();
    let mut session = Session::new(
        Arc::clone(&backend),
        Arc::clone(&events),
        runtime,
        env.clone(),
        config.keep_alive,
    );

    let ctx = LaunchContext {
        backend: backend.as_ref(),
        config,
        env: &env,
        events: events.as_ref(),
        cancel,
        host_addr: &host_addr,
    };

    let mut offset = 0;
    for (index, wave) in waves.iter().enumerate() {
        tracing::info!(wave = index + 1, services = ?wave, "starting wave");
        let range = offset..offset + wave.len();
        offset = range.end;

        let outcome = cancel
            .check()
            .and_then(|()| run_wave(&ctx, &graph, session.services_mut(), range));
        if let Err(e) = outcome {
            if let Err(stop_err) = session.teardown() {
                tracing::error!(error = %stop_err, "teardown after failed startup was incomplete");
            }
            return Err(e);
        }
    }

    tracing::info!(services = session.services().len(), variables = env.len(), "all services ready");
    Ok(session)
}

/// Starts the services in `services[range]` concurrently.
fn run_wave(
    ctx: &LaunchContext<'_>,
    graph: &DependencyGraph,
    services: &mut [RuntimeService],
    range: std::ops::Range<usize>,
) -> Result<()> {
    let (done, rest) = services.split_at_mut(range.start);
    let wave = &mut rest[..range.len()];

    let inherited: Vec<BTreeMap<String, String>> = wave
        .iter()
        .map(|service| inherited_env(done, &graph.dependencies_of(&service.spec.name)))
        .collect();

    thread::scope(|scope| {
        let handles: Vec<_> = wave
            .iter_mut()
            .zip(inherited)
            .map(|(service, inherited)| {
                let name = service.spec.name.clone();
                let handle = thread::Builder::new()
                    .name(format!("dsvc-{name}"))
                    .spawn_scoped(scope, move || start_one(ctx, service, &inherited));
                (name, handle)
            })
            .collect();

        let mut first_error = None;
        for (name, handle) in handles {
            let result = match handle {
                Ok(handle) => handle.join().unwrap_or_else(|_| {
                    Err(ServicesError::Engine {
                        operation: "start",
                        message: format!("worker for service `{name}` panicked"),
                    })
                }),
                Err(e) => Err(ServicesError::Engine {
                    operation: "start",
                    message: format!("cannot spawn worker for service `{name}`: {e}"),
                }),
            };
            if let Err(e) = result {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    })
}

fn start_one(ctx: &LaunchContext<'_>, service: &mut RuntimeService, inherited: &BTreeMap<String, String>) -> Result<()> {
    let RuntimeService {
        spec,
        status,
        container,
        compiled_env,
        started_at,
    } = service;
    let mut slot = LaunchSlot {
        container,
        compiled_env,
        started_at,
    };
    let result = start_service(ctx, spec, inherited, &mut slot, &mut |next: ServiceStatus| {
        tracing::debug!(service = %spec.name, status = %next, "status changed");
        *status = next;
    });
    if let Err(ref e) = result {
        *status = ServiceStatus::Failed;
        ctx.events.emit(&ServiceEvent::Failed {
            service: spec.name.clone(),
            error: e.to_string(),
        });
    }
    result
}

/// Merges the compiled environments of `dependencies`.
fn inherited_env(started: &[RuntimeService], dependencies: &[String]) -> BTreeMap<String, String> {
    let mut merged = BTreeMap::new();
    for service in started.iter().filter(|s| dependencies.contains(&s.spec.name)) {
        merged.extend(service.compiled_env.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    merged
}

#[cfg(test)]
mod tests {
    use dsvc_compose::parser::ast::ServiceSpec;

    use super::*;

    fn map(specs: Vec<ServiceSpec>) -> ServiceMap {
        specs.into_iter().map(|s| (s.name.clone(), s)).collect()
    }

    #[test]
    fn plan_orders_dependencies_first() {
        let services = map(vec![
            ServiceSpec::new("app").requiring("db").requiring("cache"),
            ServiceSpec::new("db"),
            ServiceSpec::new("cache"),
            ServiceSpec::new("worker").requiring("app"),
        ]);
        let waves = plan(&services).unwrap();
        assert_eq!(waves, vec![vec!["cache", "db"], vec!["app"], vec!["worker"]]);
    }

    #[test]
    fn plan_reports_unknown_dependency() {
        let services = map(vec![ServiceSpec::new("app").requiring("ghost")]);
        assert!(matches!(plan(&services), Err(ServicesError::UnknownDependency { .. })));
    }

    #[test]
    fn inherited_env_only_takes_dependencies() {
        let mut db = RuntimeService::new(ServiceSpec::new("db"));
        let _ = db.compiled_env.insert("DB_PORT_5432_TCP_PORT".into(), "5000".into());
        let mut cache = RuntimeService::new(ServiceSpec::new("cache"));
        let _ = cache.compiled_env.insert("CACHE_PORT_6379_TCP_PORT".into(), "6000".into());

        let merged = inherited_env(&[db, cache], &["db".to_string()]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged["DB_PORT_5432_TCP_PORT"], "5000");
    }
}
