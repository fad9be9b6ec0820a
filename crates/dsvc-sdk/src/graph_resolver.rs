//! Validates service declarations and reports their startup waves.
//!
//! Wraps `dsvc-compose`'s parser and graph modules into a high-level API
//! for SDK consumers.

use std::path::Path;

use dsvc_common::error::Result;
use dsvc_compose::graph::DependencyGraph;
use dsvc_compose::parser::{self, ast::ServiceMap};

/// High-level resolver for service dependency graphs.
#[derive(Debug, Default)]
pub struct GraphResolver {
    services: ServiceMap,
}

impl GraphResolver {
    /// Creates a resolver with no services.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a declaration file.
    ///
    /// # Errors
    ///
    /// Returns an error if reading, parsing, or validation fails.
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        tracing::info!(path = %path.display(), "loading service declaration");
        self.load(parser::parse_file(path)?)
    }

    /// Loads a declaration given as a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails.
    pub fn load_str(&mut self, yaml: &str) -> Result<()> {
        self.load(parser::parse_services(yaml)?)
    }

    fn load(&mut self, services: ServiceMap) -> Result<()> {
        let _ = DependencyGraph::from_services(&services)?;
        self.services = services;
        Ok(())
    }

    /// The loaded services.
    #[must_use]
    pub const fn services(&self) -> &ServiceMap {
        &self.services
    }

    /// Returns the startup waves, dependencies first.
    ///
    /// # Errors
    ///
    /// Returns an error if the declaration contains a cycle.
    pub fn waves(&self) -> Result<Vec<Vec<String>>> {
        DependencyGraph::from_services(&self.services)?.waves()
    }

    /// Returns one startup order consistent with the waves.
    ///
    /// # Errors
    ///
    /// Returns an error if the declaration contains a cycle.
    pub fn startup_order(&self) -> Result<Vec<String>> {
        Ok(self.waves()?.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use dsvc_common::error::ServicesError;

    use super::*;

    #[test]
    fn resolves_waves_from_yaml() {
        let mut resolver = GraphResolver::new();
        resolver
            .load_str("web:\n  requires: [api]\napi:\n  requires: [db]\ndb: postgres\n")
            .unwrap();
        assert_eq!(resolver.startup_order().unwrap(), vec!["db", "api", "web"]);
    }

    #[test]
    fn unknown_dependency_is_rejected_on_load() {
        let mut resolver = GraphResolver::new();
        let err = resolver.load_str("web:\n  requires: [ghost]\n").unwrap_err();
        assert!(matches!(err, ServicesError::UnknownDependency { .. }));
        assert!(resolver.services().is_empty());
    }

    #[test]
    fn cycle_is_reported_by_waves() {
        let mut resolver = GraphResolver::new();
        resolver.load_str("a:\n  requires: [b]\nb:\n  requires: [a]\n").unwrap();
        assert!(matches!(resolver.waves(), Err(ServicesError::DependencyCycle { .. })));
    }
}
