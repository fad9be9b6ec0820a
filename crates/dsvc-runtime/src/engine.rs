//! Runtime engine that starts declared services.

use std::path::Path;
use std::sync::Arc;

use dsvc_common::config::OrchestratorConfig;
use dsvc_common::error::Result;
use dsvc_compose::parser::{self, ast::ServiceMap};

use crate::backend::ContainerBackend;
use crate::backend::docker::DockerCliBackend;
use crate::cancel::CancellationToken;
use crate::events::{EventSink, TracingSink};
use crate::scheduler;
use crate::session::Session;

/// Coordinates backend, configuration, progress reporting and cancellation
/// for service startups.
pub struct Engine {
    backend: Arc<dyn ContainerBackend>,
    events: Arc<dyn EventSink>,
    config: OrchestratorConfig,
    cancel: CancellationToken,
}

impl Engine {
    /// Creates an engine driving the detected Docker CLI.
    ///
    /// # Errors
    ///
    /// Returns an error if no engine binary can be found.
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        Ok(Self::with_backend(config, Arc::new(DockerCliBackend::detect()?)))
    }

    /// Creates an engine on an explicit backend.
    #[must_use]
    pub fn with_backend(config: OrchestratorConfig, backend: Arc<dyn ContainerBackend>) -> Self {
        Self {
            backend,
            events: Arc::new(TracingSink),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Uses an existing cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts a running startup when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run-wide settings.
    #[must_use]
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Starts every service in `services`.
    ///
    /// # Errors
    ///
    /// Returns a declaration error before any container exists, or the
    /// first startup error after stopping everything that started.
    pub fn start(&self, services: &ServiceMap) -> Result<Session> {
        tracing::info!(services = services.len(), namespace = %self.config.namespace, "starting services");
        scheduler::start_all(
            services,
            Arc::clone(&self.backend),
            &self.config,
            Arc::clone(&self.events),
            &self.cancel,
        )
    }

    /// Parses a declaration file and starts its services.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// startup fails.
    pub fn start_file(&self, path: &Path) -> Result<Session> {
        let services = parser::parse_file(path)?;
        self.start(&services)
    }

    /// Validates a declaration and returns its startup waves.
    ///
    /// # Errors
    ///
    /// Returns the first declaration error.
    pub fn plan(services: &ServiceMap) -> Result<Vec<Vec<String>>> {
        scheduler::plan(services)
    }

    /// Returns whether the backend can reach an engine.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
