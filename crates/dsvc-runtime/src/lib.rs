//! Service lifecycle management for dsvc.
//!
//! The [`engine::Engine`] takes a parsed service map, starts every service
//! wave by wave through a [`backend::ContainerBackend`], and hands back a
//! [`session::Session`] that owns the containers until teardown.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod backend;
pub mod cancel;
pub mod engine;
pub mod events;
pub mod exec;
pub mod lifecycle;
pub mod scheduler;
pub mod session;
pub mod wait;
