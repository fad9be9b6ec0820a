//! # dsvc-compose
//!
//! Everything that can be decided before a container exists.
//!
//! Handles:
//! - **Parser**: YAML service declarations and service-name validation.
//! - **Graph**: `requires` edges, unknown-reference checks, cycle detection,
//!   and startup waves.
//! - **Env**: the shared environment context and port variable naming.
//! - **Template**: `{env[NAME]}` expansion against a service's variables.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod env;
pub mod graph;
pub mod parser;
pub mod template;
