//! Gateway endpoint resolution
//!
//! A fresh (non-resume) connect first asks a resolver where the gateway lives.

mod http;

pub use http::HttpEndpointResolver;

use crate::error::ResolveError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of endpoint discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayInfo {
    /// WebSocket URL to connect to
    pub url: String,

    /// Recommended number of shards
    #[serde(default = "default_shards")]
    pub shards: u32,
}

fn default_shards() -> u32 {
    1
}

/// Supplies the gateway URL for fresh connects
#[async_trait]
pub trait EndpointResolver: Send + Sync {
    async fn resolve(&self) -> Result<GatewayInfo, ResolveError>;
}

/// Resolver that always returns the same URL
#[derive(Debug, Clone)]
pub struct StaticResolver {
    info: GatewayInfo,
}

impl StaticResolver {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            info: GatewayInfo {
                url: url.into(),
                shards: 1,
            },
        }
    }
}

#[async_trait]
impl EndpointResolver for StaticResolver {
    async fn resolve(&self) -> Result<GatewayInfo, ResolveError> {
        Ok(self.info.clone())
    }
}
