//! System-wide constants and defaults.

use std::time::Duration;

/// Prefix of every generated container name.
pub const DEFAULT_NAMESPACE: &str = "docker_services";

/// Length of the random suffix appended to container names.
pub const CONTAINER_SUFFIX_LENGTH: usize = 10;

/// Host variable that overrides the published `_ADDR` value.
pub const HOST_OVERRIDE_VAR: &str = "DOCKER_SERVICES_HOST";

/// Variable pointing at an alternative container engine binary.
pub const DOCKER_BINARY_VAR: &str = "DSVC_DOCKER";

/// Container engine binary looked up on `PATH` by default.
pub const DEFAULT_DOCKER_BINARY: &str = "docker";

/// Address published when no outbound interface can be detected.
pub const LOOPBACK_ADDR: &str = "127.0.0.1";

/// Unroutable address used to discover the outbound interface.
///
/// Connecting a UDP socket sends no packet, so it need not be reachable.
pub const PROBE_ADDR: &str = "10.255.255.255:1";

/// Default declaration file read by the CLI.
pub const DEFAULT_SERVICES_FILE: &str = "docker-services.yml";

/// Key of the template sub-mapping inside `environment`.
pub const TEMPLATES_KEY: &str = "_templates";

/// Alternative spelling accepted for [`TEMPLATES_KEY`].
pub const TEMPLATES_KEY_ALT: &str = "templates";

/// Interval between two engine status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bound on reaching `running` and, if declared, `healthy`.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(60);

/// Bound on pulling one image.
pub const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_secs(300);

/// Bound on a single setup command.
pub const DEFAULT_SETUP_TIMEOUT: Duration = Duration::from_secs(120);

/// Bound on stopping a container during teardown.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit code used by the CLI when orchestration (not the tests) failed.
pub const ORCHESTRATION_FAILURE_EXIT_CODE: i32 = 3;
