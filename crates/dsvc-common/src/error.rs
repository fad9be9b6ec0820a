//! Unified error type for the dsvc workspace.
//!
//! Declaration and graph errors are raised before any container exists;
//! everything from `StartupTimeout` down can only happen once the run has
//! side effects.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum ServicesError {
    /// A resolved service name contains characters outside `[A-Za-z0-9_]`.
    #[error("invalid characters in service name: \"{name}\"")]
    InvalidServiceName {
        /// The offending name.
        name: String,
    },

    /// Two declarations resolve to the same service name.
    #[error("service \"{name}\" is declared more than once")]
    DuplicateService {
        /// The duplicated name.
        name: String,
    },

    /// A `requires` entry names a service that is not declared.
    #[error("service \"{service}\" requires \"{dependency}\", which doesn't exist")]
    UnknownDependency {
        /// Service carrying the bad reference.
        service: String,
        /// The missing dependency.
        dependency: String,
    },

    /// The `requires` edges contain a cycle.
    #[error("dependency cycle between services: {}", services.join(", "))]
    DependencyCycle {
        /// Services participating in the cycle.
        services: Vec<String>,
    },

    /// A container did not reach the awaited state in time.
    #[error("service \"{service}\" did not become {state} within {timeout:?}")]
    StartupTimeout {
        /// Service being started.
        service: String,
        /// State that was awaited (`running`, `healthy`, ...).
        state: &'static str,
        /// Bound that expired.
        timeout: Duration,
    },

    /// The container vanished or exited while it was being started.
    #[error("container for service \"{service}\" exited during startup (status: {status})")]
    ContainerExited {
        /// Service being started.
        service: String,
        /// Last status reported by the engine.
        status: String,
    },

    /// A setup command exited with a non-zero code.
    #[error("setup command `{command}` failed in service \"{service}\" with exit code {exit_code}: {output}")]
    SetupCommandFailure {
        /// Service the command ran in.
        service: String,
        /// The command as declared.
        command: String,
        /// Exit code reported by the engine.
        exit_code: i32,
        /// Captured output (stdout followed by stderr).
        output: String,
    },

    /// A template could not be expanded.
    #[error("cannot expand template {variable} of service \"{service}\": {reason}")]
    TemplateExpansionError {
        /// Service declaring the template.
        service: String,
        /// Variable the template was meant to produce.
        variable: String,
        /// What went wrong.
        reason: String,
    },

    /// The container engine rejected or failed an operation.
    #[error("container engine error during {operation}: {message}")]
    Engine {
        /// Operation that failed (`pull`, `run`, `inspect`, ...).
        operation: &'static str,
        /// Engine output or description.
        message: String,
    },

    /// The declaration is not valid YAML.
    #[error("invalid service declaration: {source}")]
    Parse {
        /// Underlying YAML error.
        #[from]
        source: serde_yaml::Error,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// The run was cancelled before it completed.
    #[error("startup cancelled")]
    Cancelled,

    /// Engine output could not be decoded.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl ServicesError {
    /// Returns whether this error was raised before any container was created.
    #[must_use]
    pub const fn is_declaration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidServiceName { .. }
                | Self::DuplicateService { .. }
                | Self::UnknownDependency { .. }
                | Self::DependencyCycle { .. }
                | Self::Parse { .. }
                | Self::Config { .. }
        )
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ServicesError>;
