//! REST endpoint discovery (`GET /gateway/bot`)

use super::{EndpointResolver, GatewayInfo};
use crate::error::ResolveError;
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

const USER_AGENT_PREFIX: &str = concat!("DiscordBot (cord, ", env!("CARGO_PKG_VERSION"), ")");
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Error body shape returned by the REST API
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    retry_after: Option<f64>,
}

/// Resolves the gateway URL through the REST API
#[derive(Clone)]
pub struct HttpEndpointResolver {
    client: Client,
    base_url: String,
    authorization: String,
    user_agent: String,
}

impl HttpEndpointResolver {
    /// Create a resolver
    ///
    /// `base_url` is the versioned API root, e.g. `https://discord.com/api/v10`.
    pub fn new(
        base_url: impl Into<String>,
        token: &str,
        user_agent_suffix: &str,
    ) -> Result<Self, ResolveError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let user_agent = if user_agent_suffix.is_empty() {
            USER_AGENT_PREFIX.to_string()
        } else {
            format!("{USER_AGENT_PREFIX} {user_agent_suffix}")
        };

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            authorization: format!("Bot {token}"),
            user_agent,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/gateway/bot", self.base_url)
    }
}

impl fmt::Debug for HttpEndpointResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpEndpointResolver")
            .field("base_url", &self.base_url)
            .field("authorization", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

#[async_trait]
impl EndpointResolver for HttpEndpointResolver {
    async fn resolve(&self) -> Result<GatewayInfo, ResolveError> {
        let response = self
            .client
            .get(self.endpoint())
            .header(header::AUTHORIZATION, &self.authorization)
            .header(header::USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let info: GatewayInfo = response.json().await?;
            tracing::debug!(url = %info.url, shards = info.shards, "Resolved gateway endpoint");
            return Ok(info);
        }

        // Error bodies are best effort; a missing or non-JSON body still yields an error
        let body: Option<ErrorBody> = response.json().await.ok();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ResolveError::RateLimited {
                retry_after: body.and_then(|b| b.retry_after),
            });
        }

        Err(ResolveError::Status {
            status: status.as_u16(),
            message: body
                .and_then(|b| b.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string()),
        })
    }
}
