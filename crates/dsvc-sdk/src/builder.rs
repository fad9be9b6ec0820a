//! Fluent API for declaring and starting services.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dsvc_common::config::OrchestratorConfig;
use dsvc_common::constants::DEFAULT_SERVICES_FILE;
use dsvc_common::error::Result;
use dsvc_compose::parser::{self, ast::ServiceMap};
use dsvc_runtime::backend::ContainerBackend;
use dsvc_runtime::cancel::CancellationToken;
use dsvc_runtime::engine::Engine;
use dsvc_runtime::events::EventSink;
use dsvc_runtime::session::Session;

/// Where the service declaration comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    File(PathBuf),
    Inline(String),
}

/// Builder for a set of services started together.
///
/// Without an explicit source the builder reads `docker-services.yml` from
/// the working directory.
pub struct ServicesBuilder {
    source: Source,
    config: OrchestratorConfig,
    backend: Option<Arc<dyn ContainerBackend>>,
    events: Option<Arc<dyn EventSink>>,
    cancel: Option<CancellationToken>,
}

impl ServicesBuilder {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            source: Source::File(PathBuf::from(DEFAULT_SERVICES_FILE)),
            config: OrchestratorConfig::default(),
            backend: None,
            events: None,
            cancel: None,
        }
    }

    /// Reads the declaration from a YAML file.
    #[must_use]
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Source::File(path.into());
        self
    }

    /// Uses a YAML declaration given as a string.
    #[must_use]
    pub fn inline(mut self, yaml: impl Into<String>) -> Self {
        self.source = Source::Inline(yaml.into());
        self
    }

    /// Sets the container name prefix.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    /// Sets the status poll interval.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Sets the bound on reaching `running` and `healthy`.
    #[must_use]
    pub const fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.config.startup_timeout = timeout;
        self
    }

    /// Sets the bound on pulling a missing image.
    #[must_use]
    pub const fn pull_timeout(mut self, timeout: Duration) -> Self {
        self.config.pull_timeout = timeout;
        self
    }

    /// Sets the bound on each setup command.
    #[must_use]
    pub const fn setup_timeout(mut self, timeout: Duration) -> Self {
        self.config.setup_timeout = timeout;
        self
    }

    /// Leaves containers running when the session is dropped.
    #[must_use]
    pub const fn keep_alive(mut self, keep: bool) -> Self {
        self.config.keep_alive = keep;
        self
    }

    /// Publishes `addr` in `_ADDR` variables instead of the detected address.
    #[must_use]
    pub fn host(mut self, addr: impl Into<String>) -> Self {
        self.config.host_override = Some(addr.into());
        self
    }

    /// Uses a specific container backend instead of the Docker CLI.
    #[must_use]
    pub fn backend(mut self, backend: Arc<dyn ContainerBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Sends lifecycle events to `events`.
    #[must_use]
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Aborts startup when `cancel` trips.
    #[must_use]
    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Parses the declaration without starting anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or parsed.
    pub fn services(&self) -> Result<ServiceMap> {
        match self.source {
            Source::File(ref path) => parser::parse_file(path),
            Source::Inline(ref yaml) => parser::parse_services(yaml),
        }
    }

    /// Starts every declared service.
    ///
    /// # Errors
    ///
    /// Returns an error if the declaration is invalid, no engine is
    /// available, or startup fails.
    pub fn start(self) -> Result<Session> {
        let services = self.services()?;
        let config = self.config.with_host_from_env();
        let mut engine = match self.backend {
            Some(backend) => Engine::with_backend(config, backend),
            None => Engine::new(config)?,
        };
        if let Some(events) = self.events {
            engine = engine.with_events(events);
        }
        if let Some(cancel) = self.cancel {
            engine = engine.with_cancellation(cancel);
        }
        tracing::debug!(source = ?self.source, "starting services from builder");
        engine.start(&services)
    }
}

impl Default for ServicesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServicesBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServicesBuilder")
            .field("source", &self.source)
            .field("config", &self.config)
            .field("custom_backend", &self.backend.is_some())
            .finish_non_exhaustive()
    }
}
