//! Gateway client entry point
//!
//! Run with:
//! ```bash
//! GATEWAY_TOKEN=... cargo run -p cord-gateway
//! ```
//!
//! Configuration is loaded from environment variables. Dispatch events are
//! logged; Ctrl-C closes the session normally.

use cord_common::{try_init_tracing_with_config, ClientConfig, TracingConfig};
use cord_gateway::{GatewaySessionBuilder, TracingSink, WebSocketConnector};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = ClientConfig::from_env();

    // Initialize tracing
    let tracing_config = match &config {
        Ok(config) => TracingConfig::for_environment(config.app.env, config.app.log_json),
        Err(_) => TracingConfig::default(),
    };
    if let Err(e) = try_init_tracing_with_config(tracing_config) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        error!(error = %e, "Gateway session ended");
        std::process::exit(1);
    }
}

async fn run(config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        name = %config.app.name,
        env = ?config.app.env,
        api_version = config.api.version,
        gateway_url = ?config.session.gateway_url,
        "Configuration loaded"
    );

    let (mut session, handle) = GatewaySessionBuilder::from_config(&config)?
        .connector(WebSocketConnector::default())
        .sink(TracingSink)
        .build()?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, closing session");
            if let Err(e) = handle.shutdown().await {
                warn!(error = %e, "Session already stopped");
            }
        }
    });

    session.run().await?;
    info!("Gateway session closed");

    Ok(())
}
