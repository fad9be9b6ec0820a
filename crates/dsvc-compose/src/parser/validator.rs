//! Static checks on parsed declarations.
//!
//! Runs before the scheduler touches the container engine, so a failure
//! here leaves nothing to clean up.

use std::collections::HashSet;

use dsvc_common::error::{Result, ServicesError};

use super::ast::ServiceMap;

/// Returns whether `name` matches `^[A-Za-z0-9_]+$`.
#[must_use]
pub fn is_valid_service_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Rejects a resolved service name with characters outside `[A-Za-z0-9_]`.
///
/// # Errors
///
/// Returns [`ServicesError::InvalidServiceName`] for an invalid name.
pub fn check_service_name(name: &str) -> Result<()> {
    if is_valid_service_name(name) {
        Ok(())
    } else {
        Err(ServicesError::InvalidServiceName { name: name.to_string() })
    }
}

/// Validates a parsed service map for semantic correctness.
///
/// # Checks performed
///
/// 1. Every service name is valid.
/// 2. Every `requires` entry names a declared service.
///
/// # Errors
///
/// Returns the first failing check's error.
pub fn validate(services: &ServiceMap) -> Result<()> {
    tracing::debug!(count = services.len(), "validating service declarations");
    for spec in services.values() {
        check_service_name(&spec.name)?;
    }
    check_requires_references(services)
}

fn check_requires_references(services: &ServiceMap) -> Result<()> {
    let names: HashSet<&str> = services.keys().map(String::as_str).collect();
    for spec in services.values() {
        if let Some(missing) = spec.requires.iter().find(|d| !names.contains(d.as_str())) {
            return Err(ServicesError::UnknownDependency {
                service: spec.name.clone(),
                dependency: missing.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::ServiceSpec;

    fn map(specs: Vec<ServiceSpec>) -> ServiceMap {
        specs.into_iter().map(|s| (s.name.clone(), s)).collect()
    }

    #[test]
    fn accepts_word_characters() {
        assert!(is_valid_service_name("postgres"));
        assert!(is_valid_service_name("my_db_2"));
        assert!(is_valid_service_name("DB"));
    }

    #[test]
    fn rejects_separators_and_empty() {
        for name in ["my/service", "a.b", "a-b", "with space", ""] {
            assert!(!is_valid_service_name(name), "{name} should be invalid");
        }
    }

    #[test]
    fn check_service_name_reports_name() {
        let err = check_service_name("my/image").unwrap_err();
        assert!(matches!(err, ServicesError::InvalidServiceName { ref name } if name == "my/image"));
    }

    #[test]
    fn validate_empty_map_succeeds() {
        assert!(validate(&ServiceMap::new()).is_ok());
    }

    #[test]
    fn validate_known_dependency_succeeds() {
        let services = map(vec![
            ServiceSpec::new("db"),
            ServiceSpec::new("api").requiring("db"),
        ]);
        assert!(validate(&services).is_ok());
    }

    #[test]
    fn validate_unknown_dependency_fails() {
        let services = map(vec![ServiceSpec::new("api").requiring("ghost")]);
        let err = validate(&services).unwrap_err();
        match err {
            ServicesError::UnknownDependency { service, dependency } => {
                assert_eq!(service, "api");
                assert_eq!(dependency, "ghost");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
