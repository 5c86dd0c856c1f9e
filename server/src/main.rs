//! Hubbub Server - Main Entry Point
//!
//! GitHub webhook to IRC relay.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinError;
use tracing::{error, info, warn};

use hubbub_server::api::{self, AppState};
use hubbub_server::config::Config;
use hubbub_server::github::{Formatter, UrlShortener};
use hubbub_server::irc::{self, IrcClient, IrcError};
use hubbub_server::observability::{self, LogFormat};
use hubbub_server::secret::WebhookSecret;
use hubbub_server::webhooks::{consumer, DeliveryQueue};

/// How long to wait for the server to close the link after QUIT.
const QUIT_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Must happen before any TLS operation
    let _ =
        rustls::crypto::CryptoProvider::install_default(rustls::crypto::ring::default_provider());

    dotenvy::dotenv().ok();
    observability::init(LogFormat::from_env());

    let config = Config::from_env().context("invalid configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Hubbub"
    );

    let secret = WebhookSecret::load_or_generate(&config.webhook_secret_file)?;

    let shortener = if config.long_url {
        None
    } else {
        Some(UrlShortener::new(config.shortener_url.as_str()).context("URL shortener setup")?)
    };
    let formatter = Formatter::new(config.format_options(), shortener);

    // IRC
    let (reader, writer) = irc::transport::connect(&config.irc)
        .await
        .with_context(|| format!("connecting to {}:{}", config.irc.host, config.irc.port))?;
    let (irc_client, session) = IrcClient::new(config.irc_settings(), reader, writer);
    let mut irc_task = tokio::spawn(session.run());

    // Delivery pipeline
    let (queue, deliveries) = DeliveryQueue::new(config.queue_capacity);
    let consumer_task = tokio::spawn(consumer::run(deliveries, formatter, irc_client.clone()));

    // HTTP
    let addr: SocketAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("invalid BIND_ADDRESS {:?}", config.bind_address))?;
    let webhook_path = config.webhook_path.clone();
    let app = api::create_router(AppState::new(config, secret, queue, irc_client.ready()));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, path = %webhook_path, "Listening for webhooks");

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(irc_client.clone()))
        .into_future();

    let result = tokio::select! {
        served = server => {
            served?;
            match tokio::time::timeout(QUIT_GRACE, &mut irc_task).await {
                Ok(joined) => irc_outcome(joined),
                Err(_) => {
                    warn!("IRC server did not close the link in time");
                    Ok(())
                }
            }
        }
        joined = &mut irc_task => irc_outcome(joined),
    };

    consumer_task.abort();
    info!("Server shutdown complete");
    result
}

fn irc_outcome(joined: Result<Result<(), IrcError>, JoinError>) -> Result<()> {
    match joined {
        Ok(Ok(())) => {
            info!("IRC session ended");
            Ok(())
        }
        Ok(Err(e)) => {
            error!(error = %e, "IRC session failed");
            Err(e.into())
        }
        Err(e) => Err(e).context("IRC session task panicked"),
    }
}

async fn shutdown_signal(irc: IrcClient) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for CTRL+C");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal, cleaning up...");

    if let Err(e) = irc.part().await {
        warn!(error = %e, "Failed to part channel");
    }
    if let Err(e) = irc.quit("Shutting down").await {
        warn!(error = %e, "Failed to send QUIT");
    }
}
