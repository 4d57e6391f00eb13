//! Session configuration and builder

use super::handle::SessionHandle;
use super::{GatewaySession, SessionState};
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{IdentifyProperties, Intents};
use crate::resolver::{EndpointResolver, HttpEndpointResolver, StaticResolver};
use crate::sink::{EventSink, TracingSink};
use crate::transport::{Connector, WebSocketConnector};
use cord_common::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Tunables for a gateway session
#[derive(Debug, Clone)]
pub struct GatewaySessionConfig {
    /// Capability flags sent with Identify
    pub intents: Intents,
    /// Client descriptor sent with Identify
    pub properties: IdentifyProperties,
    /// Ask the server for compressed frames
    pub compress: bool,
    /// Gateway protocol version appended to socket URLs
    pub api_version: u8,
    /// Delay before retrying a failed socket open
    pub reconnect_delay: Duration,
    /// Buffer size of the handle's command channel
    pub command_buffer: usize,
}

impl Default for GatewaySessionConfig {
    fn default() -> Self {
        Self {
            intents: Intents::empty(),
            properties: IdentifyProperties::default(),
            compress: true,
            api_version: 10,
            reconnect_delay: Duration::from_millis(1000),
            command_buffer: 32,
        }
    }
}

impl GatewaySessionConfig {
    /// Socket URL for `base`, with version and encoding appended
    #[must_use]
    pub fn socket_url(&self, base: &str) -> String {
        let separator = if base.contains('?') { '&' } else { '?' };
        format!("{base}{separator}v={}&encoding=json", self.api_version)
    }
}

/// Builder for [`GatewaySession`]
pub struct GatewaySessionBuilder {
    config: GatewaySessionConfig,
    token: Option<String>,
    resolver: Option<Arc<dyn EndpointResolver>>,
    connector: Option<Arc<dyn Connector>>,
    sink: Option<Arc<dyn EventSink>>,
}

impl GatewaySessionBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: GatewaySessionConfig::default(),
            token: None,
            resolver: None,
            connector: None,
            sink: None,
        }
    }

    /// Create a builder from environment-derived client configuration
    ///
    /// Uses a fixed gateway URL when one is configured, otherwise resolves it
    /// through the REST API.
    pub fn from_config(config: &ClientConfig) -> GatewayResult<Self> {
        let resolver: Arc<dyn EndpointResolver> = match &config.session.gateway_url {
            Some(url) => Arc::new(StaticResolver::new(url.clone())),
            None => Arc::new(HttpEndpointResolver::new(
                config.api.versioned_base_url(),
                &config.api.token,
                &config.api.user_agent_suffix,
            )?),
        };

        Ok(Self::new()
            .token(config.api.token.clone())
            .resolver_arc(resolver)
            .intent_bits(&config.session.intents)
            .compress(config.session.compress)
            .api_version(config.api.version)
            .reconnect_delay(Duration::from_millis(config.session.reconnect_delay_ms)))
    }

    /// Set the authentication token
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the endpoint resolver
    #[must_use]
    pub fn resolver(self, resolver: impl EndpointResolver + 'static) -> Self {
        self.resolver_arc(Arc::new(resolver))
    }

    #[must_use]
    pub fn resolver_arc(mut self, resolver: Arc<dyn EndpointResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Set the socket connector (defaults to WebSocket)
    #[must_use]
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Set the event sink (defaults to logging only)
    #[must_use]
    pub fn sink(self, sink: impl EventSink + 'static) -> Self {
        self.sink_arc(Arc::new(sink))
    }

    #[must_use]
    pub fn sink_arc(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set capability flags; a list is OR-folded
    #[must_use]
    pub fn intents(mut self, intents: &[Intents]) -> Self {
        self.config.intents = Intents::fold(intents);
        self
    }

    /// Set capability flags from raw bit values
    #[must_use]
    pub fn intent_bits(mut self, bits: &[u64]) -> Self {
        self.config.intents = Intents::from_raw_list(bits);
        self
    }

    /// Set the client descriptor
    #[must_use]
    pub fn properties(mut self, properties: IdentifyProperties) -> Self {
        self.config.properties = properties;
        self
    }

    #[must_use]
    pub fn compress(mut self, compress: bool) -> Self {
        self.config.compress = compress;
        self
    }

    #[must_use]
    pub fn api_version(mut self, version: u8) -> Self {
        self.config.api_version = version;
        self
    }

    /// Set the delay before retrying a failed socket open
    #[must_use]
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    /// Build the session and its control handle
    ///
    /// Nothing connects until [`GatewaySession::run`] is awaited.
    pub fn build(self) -> GatewayResult<(GatewaySession, SessionHandle)> {
        let token = self
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| GatewayError::Config("token is required".to_string()))?;
        let resolver = self
            .resolver
            .ok_or_else(|| GatewayError::Config("endpoint resolver is required".to_string()))?;
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WebSocketConnector::default()));
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));

        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer.max(1));
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);

        let session = GatewaySession::new(
            token,
            self.config,
            resolver,
            connector,
            sink,
            state_tx,
            command_rx,
        );
        Ok((session, SessionHandle::new(command_tx, state_rx)))
    }
}

impl Default for GatewaySessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
