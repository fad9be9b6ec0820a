//! Container engine abstraction.
//!
//! The orchestrator only needs a handful of engine operations; everything
//! else stays behind this trait so the scheduler can be exercised without a
//! real engine.

pub mod docker;

use std::collections::BTreeMap;
use std::time::Duration;

use dsvc_common::error::Result;
use dsvc_common::types::{ContainerId, ContainerName};
use dsvc_compose::env::PublishedPort;

use crate::exec::ExecOutput;

/// Configuration for creating and starting a container.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Generated container name.
    pub name: ContainerName,
    /// Image reference.
    pub image: String,
    /// Command overriding the image default.
    pub command: Option<Vec<String>>,
    /// Working directory inside the container.
    pub workdir: Option<String>,
    /// Environment variables.
    pub env: BTreeMap<String, String>,
    /// Remove the container once it stops.
    pub auto_remove: bool,
    /// Publish every exposed port on an ephemeral host port.
    pub publish_all_ports: bool,
}

/// What the engine reports about a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    /// Engine status (`created`, `running`, `exited`, ...).
    pub status: String,
    /// Health status if the image declares a health check.
    pub health: Option<String>,
    /// Published port bindings.
    pub ports: Vec<PublishedPort>,
}

impl ContainerInfo {
    /// Returns whether the engine reports the container as running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }

    /// Returns whether the container has stopped for good.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        matches!(self.status.as_str(), "exited" | "dead" | "removing")
    }
}

/// Operations the orchestrator needs from a container engine.
pub trait ContainerBackend: Send + Sync {
    /// Returns whether `image` is present locally.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried.
    fn image_exists(&self, image: &str) -> Result<bool>;

    /// Pulls `image`, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pull fails or times out.
    fn pull_image(&self, image: &str, timeout: Duration) -> Result<()>;

    /// Creates and starts a container, returning its engine ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be created or started.
    fn run(&self, config: &ContainerConfig) -> Result<ContainerId>;

    /// Inspects a container; `Ok(None)` means it no longer exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried.
    fn inspect(&self, id: &ContainerId) -> Result<Option<ContainerInfo>>;

    /// Executes a command inside a running container.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be run or times out. A
    /// non-zero exit is reported through [`ExecOutput::exit_code`].
    fn exec(&self, id: &ContainerId, cmd: &[String], timeout: Duration) -> Result<ExecOutput>;

    /// Stops a container by the name it was created with. Stopping a
    /// container that is already gone, or was never created, succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine refuses to stop an existing container.
    fn stop(&self, name: &ContainerName) -> Result<()>;

    /// Returns whether this backend is usable on the current host.
    fn is_available(&self) -> bool;
}
