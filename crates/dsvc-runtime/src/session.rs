//! A started set of services and the containers it owns.

use std::sync::Arc;

use dsvc_common::error::{Result, ServicesError};
use dsvc_common::types::ServiceStatus;
use dsvc_compose::env::EnvContext;

use crate::backend::ContainerBackend;
use crate::events::{EventSink, ServiceEvent};
use crate::lifecycle::RuntimeService;

/// Owns the containers of one run until teardown.
///
/// Dropping the session tears it down unless keep-alive is set or
/// [`Session::teardown`] already ran.
pub struct Session {
    backend: Arc<dyn ContainerBackend>,
    events: Arc<dyn EventSink>,
    services: Vec<RuntimeService>,
    env: EnvContext,
    keep_alive: bool,
    torn_down: bool,
}

impl Session {
    /// Wraps services in start order.
    #[must_use]
    pub fn new(
        backend: Arc<dyn ContainerBackend>,
        events: Arc<dyn EventSink>,
        services: Vec<RuntimeService>,
        env: EnvContext,
        keep_alive: bool,
    ) -> Self {
        Self {
            backend,
            events,
            services,
            env,
            keep_alive,
            torn_down: false,
        }
    }

    /// Variables published by every service.
    #[must_use]
    pub const fn env(&self) -> &EnvContext {
        &self.env
    }

    /// Services in start order.
    #[must_use]
    pub fn services(&self) -> &[RuntimeService] {
        &self.services
    }

    pub(crate) fn services_mut(&mut self) -> &mut [RuntimeService] {
        &mut self.services
    }

    /// Looks a service up by name.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&RuntimeService> {
        self.services.iter().find(|s| s.spec.name == name)
    }

    /// Whether containers outlive the session.
    #[must_use]
    pub const fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Leaves containers running when the session is dropped.
    pub fn set_keep_alive(&mut self, keep_alive: bool) {
        self.keep_alive = keep_alive;
    }

    /// Stops every started container, dependents before their dependencies.
    ///
    /// Containers the engine no longer knows count as stopped. Services
    /// already stopped are skipped, so calling this again is harmless.
    ///
    /// # Errors
    ///
    /// Every container is attempted; the first stop failure is returned
    /// afterwards.
    pub fn teardown(&mut self) -> Result<()> {
        self.torn_down = true;
        let mut first_error: Option<ServicesError> = None;
        for service in self.services.iter_mut().rev() {
            if service.status == ServiceStatus::Stopped {
                continue;
            }
            let Some(ref handle) = service.container else {
                continue;
            };
            self.events.emit(&ServiceEvent::Stopping {
                service: service.spec.name.clone(),
                container: handle.name.clone(),
            });
            match self.backend.stop(&handle.name) {
                Ok(()) => service.status = ServiceStatus::Stopped,
                Err(e) => {
                    tracing::warn!(service = %service.spec.name, container = %handle.name, error = %e, "failed to stop container");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.torn_down {
            return;
        }
        if self.keep_alive {
            let kept = self
                .services
                .iter()
                .filter(|s| s.container.is_some() && s.status.has_container())
                .count();
            tracing::info!(kept, "keeping containers alive");
            return;
        }
        if let Err(e) = self.teardown() {
            tracing::error!(error = %e, "teardown on drop failed");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("services", &self.services)
            .field("env", &self.env)
            .field("keep_alive", &self.keep_alive)
            .finish_non_exhaustive()
    }
}
