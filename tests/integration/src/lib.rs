//! Integration test utilities for the gateway client
//!
//! This crate runs a mock gateway (WebSocket endpoints plus the REST
//! discovery route) on a local port and drives real sessions against it.

pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
