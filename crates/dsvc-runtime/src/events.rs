//! Service lifecycle events.
//!
//! Progress is reported as [`ServiceEvent`] values so that each front end
//! decides how to render it: the CLI prints colored lines, the SDK records
//! them, and [`TracingSink`] turns them into log records.

use std::fmt;

use dsvc_common::types::ContainerName;

/// A step in a service's life.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    /// Startup of a service began.
    Launching {
        /// Service name.
        service: String,
        /// Image reference.
        image: String,
    },
    /// The image was missing locally and is being pulled.
    PullingImage {
        /// Service name.
        service: String,
        /// Image reference.
        image: String,
    },
    /// The container was created and started.
    ContainerStarted {
        /// Service name.
        service: String,
        /// Generated container name.
        container: ContainerName,
    },
    /// The container declares a health check and startup waits on it.
    WaitingForHealthy {
        /// Service name.
        service: String,
    },
    /// A setup command is about to run.
    RunningSetup {
        /// Service name.
        service: String,
        /// The command as declared.
        command: String,
    },
    /// Output captured from a setup command.
    SetupOutput {
        /// Service name.
        service: String,
        /// Combined stdout and stderr.
        output: String,
    },
    /// Variables were published; dependents may start.
    Published {
        /// Service name.
        service: String,
        /// Number of variables the service contributed.
        variables: usize,
    },
    /// Startup of the service failed.
    Failed {
        /// Service name.
        service: String,
        /// Rendered error.
        error: String,
    },
    /// Teardown is stopping the service's container.
    Stopping {
        /// Service name.
        service: String,
        /// Generated container name.
        container: ContainerName,
    },
}

impl ServiceEvent {
    /// Returns the service the event is about.
    #[must_use]
    pub fn service(&self) -> &str {
        match self {
            Self::Launching { service, .. }
            | Self::PullingImage { service, .. }
            | Self::ContainerStarted { service, .. }
            | Self::WaitingForHealthy { service }
            | Self::RunningSetup { service, .. }
            | Self::SetupOutput { service, .. }
            | Self::Published { service, .. }
            | Self::Failed { service, .. }
            | Self::Stopping { service, .. } => service,
        }
    }
}

impl fmt::Display for ServiceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Launching { service, image } => write!(f, "{service} {image}"),
            Self::PullingImage { image, .. } => write!(f, "    pulling image: {image}"),
            Self::ContainerStarted { container, .. } => write!(f, "    container {container}"),
            Self::WaitingForHealthy { .. } => write!(f, "      waiting for healthy status"),
            Self::RunningSetup { command, .. } => write!(f, "    setup: {command}"),
            Self::SetupOutput { output, .. } => write!(f, "      {}", output.replace('\n', "\n      ")),
            Self::Published { service, variables } => {
                write!(f, "    {service} ready ({variables} variables published)")
            }
            Self::Failed { service, error } => write!(f, "    {service} failed: {error}"),
            Self::Stopping { service, container } => {
                write!(f, "Terminating service {service} {container}")
            }
        }
    }
}

/// Receives lifecycle events. Called from worker threads.
pub trait EventSink: Send + Sync {
    /// Handles one event.
    fn emit(&self, event: &ServiceEvent);
}

/// Sink that logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &ServiceEvent) {
        match event {
            ServiceEvent::Failed { service, error } => {
                tracing::error!(service = %service, error = %error, "service failed");
            }
            ServiceEvent::SetupOutput { service, output } => {
                tracing::debug!(service = %service, output = %output, "setup output");
            }
            other => tracing::info!(service = other.service(), "{}", other.to_string().trim()),
        }
    }
}
