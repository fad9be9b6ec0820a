//! Domain primitive types used across the dsvc workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::CONTAINER_SUFFIX_LENGTH;

/// Engine-assigned identifier of a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name given to a container at creation: `<namespace>.<service>.<suffix>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerName(String);

impl ContainerName {
    /// Generates a fresh name with a random alphanumeric suffix.
    #[must_use]
    pub fn generate(namespace: &str, service: &str) -> Self {
        Self(format!("{namespace}.{service}.{}", random_suffix(CONTAINER_SUFFIX_LENGTH)))
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Draws `len` characters from `[a-zA-Z0-9]` using v4 UUID randomness.
fn random_suffix(len: usize) -> String {
    let mut out = String::with_capacity(len);
    while out.len() < len {
        for byte in uuid_random_bytes() {
            // 248 is the largest multiple of 62 below 256; rejecting above it keeps the draw uniform.
            if byte < 248 && out.len() < len {
                out.push(char::from(ALPHANUMERIC[usize::from(byte) % ALPHANUMERIC.len()]));
            }
        }
    }
    out
}

/// Bytes of a fresh v4 UUID, minus the two holding version and variant bits.
fn uuid_random_bytes() -> impl Iterator<Item = u8> {
    uuid::Uuid::new_v4()
        .into_bytes()
        .into_iter()
        .enumerate()
        .filter(|&(index, _)| index != 6 && index != 8)
        .map(|(_, byte)| byte)
}

/// Lifecycle status of one service during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceStatus {
    /// Declared, not yet scheduled.
    NotStarted,
    /// Image resolved, container being created.
    Starting,
    /// The engine reports the container as running.
    Running,
    /// The container's health check passed.
    Healthy,
    /// All setup commands succeeded.
    SetupComplete,
    /// Variables published; dependents may start.
    EnvPublished,
    /// Container stopped by teardown.
    Stopped,
    /// Startup failed.
    Failed,
}

impl ServiceStatus {
    /// Returns whether a container may exist for a service in this status.
    #[must_use]
    pub const fn has_container(self) -> bool {
        !matches!(self, Self::NotStarted | Self::Stopped)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Healthy => write!(f, "healthy"),
            Self::SetupComplete => write!(f, "setup complete"),
            Self::EnvPublished => write!(f, "published"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn container_name_has_three_parts() {
        let name = ContainerName::generate("docker_services", "my_service");
        let parts: Vec<&str> = name.as_str().split('.').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "docker_services");
        assert_eq!(parts[1], "my_service");
        assert_eq!(parts[2].len(), 10);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn container_names_are_unique() {
        let names: HashSet<ContainerName> = (0..1000)
            .map(|_| ContainerName::generate("ns", "svc"))
            .collect();
        assert_eq!(names.len(), 1000);
    }

    #[test]
    fn suffix_bytes_carry_no_fixed_uuid_bits() {
        let mut high_nibbles = vec![HashSet::new(); 14];
        for _ in 0..1000 {
            let bytes: Vec<u8> = uuid_random_bytes().collect();
            assert_eq!(bytes.len(), 14);
            for (seen, byte) in high_nibbles.iter_mut().zip(bytes) {
                let _ = seen.insert(byte >> 4);
            }
        }
        assert!(high_nibbles.iter().all(|seen| seen.len() == 16));
    }

    #[test]
    fn stopped_and_not_started_have_no_container() {
        assert!(!ServiceStatus::NotStarted.has_container());
        assert!(!ServiceStatus::Stopped.has_container());
        assert!(ServiceStatus::Starting.has_container());
        assert!(ServiceStatus::Failed.has_container());
    }
}
