//! Published environment: the shared context and port variable naming.
//!
//! For a service `postgres` whose container port `5432/tcp` is bound to
//! host port `55000`, the published variables are:
//! - `POSTGRES_PORT_5432_TCP_PORT=55000`
//! - `POSTGRES_PORT_5432_TCP_ADDR=<host address>`

use std::collections::BTreeMap;
use std::net::UdpSocket;
use std::sync::{Arc, PoisonError, RwLock};

use dsvc_common::constants::{LOOPBACK_ADDR, PROBE_ADDR};

/// A container port bound to a host port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPort {
    /// Port number inside the container.
    pub container_port: u16,
    /// Protocol, as reported by the engine (`tcp`, `udp`, ...).
    pub protocol: String,
    /// Host interface the engine bound to.
    pub host_ip: String,
    /// Host port, kept as the engine reports it.
    pub host_port: String,
}

/// Thread-safe key/value store of every variable published during a run.
///
/// Clones share the same storage. Entries are only ever added.
#[derive(Debug, Clone, Default)]
pub struct EnvContext {
    vars: Arc<RwLock<BTreeMap<String, String>>>,
}

impl EnvContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a batch of variables under a single write lock.
    pub fn publish<'a>(&self, vars: impl IntoIterator<Item = (&'a String, &'a String)>) {
        let mut guard = self.vars.write().unwrap_or_else(PoisonError::into_inner);
        for (k, v) in vars {
            let _ = guard.insert(k.clone(), v.clone());
        }
    }

    /// Returns the value of one variable.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.vars
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Returns a consistent copy of every published variable.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.vars.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns the number of published variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns whether nothing has been published yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds the `_PORT` and `_ADDR` variables for every published port.
#[must_use]
pub fn port_variables(service: &str, ports: &[PublishedPort], host_addr: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for port in ports {
        let prefix = format!("{service}_PORT_{}_{}", port.container_port, port.protocol).to_uppercase();
        let _ = vars.insert(format!("{prefix}_PORT"), port.host_port.clone());
        let _ = vars.insert(format!("{prefix}_ADDR"), host_addr.to_string());
    }
    vars
}

/// Resolves the address published in `_ADDR` variables.
///
/// Uses `host_override` when given, otherwise the address of the interface
/// used for outbound traffic, otherwise the loopback address.
#[must_use]
pub fn resolve_host_address(host_override: Option<&str>) -> String {
    if let Some(host) = host_override {
        return host.to_string();
    }
    match detect_outbound_address() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::warn!(error = %e, fallback = LOOPBACK_ADDR, "cannot detect host address");
            LOOPBACK_ADDR.to_string()
        }
    }
}

fn detect_outbound_address() -> std::io::Result<String> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect(PROBE_ADDR)?;
    Ok(socket.local_addr()?.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(container_port: u16, protocol: &str, host_port: &str) -> PublishedPort {
        PublishedPort {
            container_port,
            protocol: protocol.into(),
            host_ip: "0.0.0.0".into(),
            host_port: host_port.into(),
        }
    }

    #[test]
    fn port_variables_are_upper_cased() {
        let vars = port_variables("postgres", &[port(5432, "tcp", "55000")], "10.0.0.5");
        assert_eq!(vars["POSTGRES_PORT_5432_TCP_PORT"], "55000");
        assert_eq!(vars["POSTGRES_PORT_5432_TCP_ADDR"], "10.0.0.5");
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn every_binding_is_published() {
        let vars = port_variables(
            "dns",
            &[port(53, "udp", "40001"), port(53, "tcp", "40002")],
            "127.0.0.1",
        );
        assert_eq!(vars["DNS_PORT_53_UDP_PORT"], "40001");
        assert_eq!(vars["DNS_PORT_53_TCP_PORT"], "40002");
    }

    #[test]
    fn no_ports_no_variables() {
        assert!(port_variables("worker", &[], "127.0.0.1").is_empty());
    }

    #[test]
    fn override_wins() {
        assert_eq!(resolve_host_address(Some("docker.local")), "docker.local");
    }

    #[test]
    fn detected_address_is_never_empty() {
        assert!(!resolve_host_address(None).is_empty());
    }

    #[test]
    fn context_clones_share_storage() {
        let ctx = EnvContext::new();
        let other = ctx.clone();
        let vars = BTreeMap::from([("A".to_string(), "1".to_string())]);
        other.publish(&vars);
        assert_eq!(ctx.get("A").as_deref(), Some("1"));
        assert_eq!(ctx.len(), 1);
        assert!(!ctx.is_empty());
    }

    #[test]
    fn snapshot_is_detached() {
        let ctx = EnvContext::new();
        let snap = ctx.snapshot();
        ctx.publish(&BTreeMap::from([("B".to_string(), "2".to_string())]));
        assert!(snap.is_empty());
        assert_eq!(ctx.snapshot().len(), 1);
    }
}
