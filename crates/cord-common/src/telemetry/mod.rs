//! Telemetry and tracing setup
//!
//! Log output for the gateway client: pretty in development, JSON in production.

mod tracing_setup;

pub use tracing_setup::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
