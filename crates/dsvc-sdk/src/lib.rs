//! # dsvc-sdk
//!
//! Public SDK for using dsvc as a Rust library, typically from test
//! fixtures that need real backing services.
//!
//! Provides three main entry points:
//! - [`ServicesBuilder`](builder::ServicesBuilder): Fluent API for declaring and starting services.
//! - [`GraphResolver`](graph_resolver::GraphResolver): Validates a declaration and reports its startup waves.
//! - [`EventListener`](event::EventListener): Records lifecycle events for inspection.
//!
//! # Example
//!
//! ```rust,no_run
//! use dsvc_sdk::builder::ServicesBuilder;
//!
//! let session = ServicesBuilder::new()
//!     .inline("postgres:\n  image: postgres:16\n")
//!     .start()?;
//! let port = session.env().get("POSTGRES_PORT_5432_TCP_PORT");
//! # Ok::<(), dsvc_common::error::ServicesError>(())
//! ```

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod builder;
pub mod event;
pub mod graph_resolver;
