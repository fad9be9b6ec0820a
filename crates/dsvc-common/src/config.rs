//! Run-wide configuration for the orchestrator.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{Result, ServicesError};

/// Settings shared by every stage of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Prefix of generated container names.
    pub namespace: String,
    /// Interval between status polls.
    pub poll_interval: Duration,
    /// Bound on reaching `running`, and again on reaching `healthy`.
    pub startup_timeout: Duration,
    /// Bound on pulling a missing image.
    pub pull_timeout: Duration,
    /// Bound on each setup command.
    pub setup_timeout: Duration,
    /// Leave containers running when the session ends.
    pub keep_alive: bool,
    /// Address published in `_ADDR` variables instead of the detected one.
    pub host_override: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            namespace: constants::DEFAULT_NAMESPACE.to_string(),
            poll_interval: constants::DEFAULT_POLL_INTERVAL,
            startup_timeout: constants::DEFAULT_STARTUP_TIMEOUT,
            pull_timeout: constants::DEFAULT_PULL_TIMEOUT,
            setup_timeout: constants::DEFAULT_SETUP_TIMEOUT,
            keep_alive: false,
            host_override: None,
        }
    }
}

impl OrchestratorConfig {
    /// Fills `host_override` from [`constants::HOST_OVERRIDE_VAR`] if unset.
    #[must_use]
    pub fn with_host_from_env(mut self) -> Self {
        if self.host_override.is_none() {
            self.host_override = std::env::var(constants::HOST_OVERRIDE_VAR)
                .ok()
                .filter(|v| !v.trim().is_empty());
        }
        self
    }

    /// Checks values that would make the run meaningless.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace is empty or contains a `.`, or if
    /// any interval is zero.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() || self.namespace.contains('.') {
            return Err(ServicesError::Config {
                message: format!("namespace \"{}\" must be non-empty and contain no '.'", self.namespace),
            });
        }
        for (label, value) in [
            ("poll interval", self.poll_interval),
            ("startup timeout", self.startup_timeout),
            ("pull timeout", self.pull_timeout),
            ("setup timeout", self.setup_timeout),
        ] {
            if value.is_zero() {
                return Err(ServicesError::Config {
                    message: format!("{label} must be greater than zero"),
                });
            }
        }
        Ok(())
    }
}

/// Parses durations like `500ms`, `30s`, `2m`, `1h` or a bare number of seconds.
///
/// # Errors
///
/// Returns an error if the number or the unit is not recognized.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let (num_str, unit_ms) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1000)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60 * 1000)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 60 * 60 * 1000)
    } else {
        (s, 1000)
    };
    num_str
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(unit_ms))
        .map(Duration::from_millis)
        .ok_or_else(|| ServicesError::Config {
            message: format!("invalid duration: \"{s}\""),
        })
}
