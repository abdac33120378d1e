//! OAuth 2.0 authorization server binary

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oauth_server::config::Config;
use oauth_server::{router, AppState};

#[derive(Parser, Debug)]
#[command(name = "oauth-server")]
#[command(about = "OAuth 2.0 authorization server")]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = 3001, env = "OAUTH_PORT")]
    port: u16,

    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0", env = "OAUTH_BIND")]
    bind: String,

    /// Path to config directory
    #[arg(long, default_value = "/config", env = "OAUTH_CONFIG_PATH")]
    config_path: String,

    /// Public URL for this service (used in OAuth metadata)
    #[arg(long, env = "OAUTH_PUBLIC_URL")]
    public_url: String,

    /// Override the first configured client's id
    #[arg(long, env = "OAUTH_CLIENT_ID")]
    client_id: Option<String>,

    /// Override the first configured client's secret
    #[arg(long, env = "OAUTH_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Seconds between sweeps of expired codes and tokens (0 disables)
    #[arg(long, default_value_t = 300, env = "OAUTH_SWEEP_INTERVAL_SECS")]
    sweep_interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oauth_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(&cli.config_path)?;
    config.override_client(cli.client_id.clone(), cli.client_secret.clone());
    config.validate()?;

    let state = Arc::new(AppState::new(config, &cli.public_url));

    if cli.sweep_interval_secs > 0 {
        tokio::spawn(sweep_expired(
            state.clone(),
            Duration::from_secs(cli.sweep_interval_secs),
        ));
    }

    let app = router(state);

    // Parse bind address
    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port).parse()?;

    tracing::info!("Starting oauth-server on {}", addr);
    tracing::info!("Public URL: {}", cli.public_url);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("OAuth server shut down");
    Ok(())
}

/// Periodically drop expired entries
///
/// Purely housekeeping: every lookup re-checks expiry against the clock.
async fn sweep_expired(state: Arc<AppState>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    // The first tick completes immediately
    interval.tick().await;

    loop {
        interval.tick().await;
        let now = state.clock.now();

        match state.codes.purge_expired(now).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("Cleaned up {} expired authorization codes", n),
            Err(e) => tracing::warn!("Failed to clean up authorization codes: {}", e),
        }
        match state.tokens.purge_expired(now).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("Cleaned up {} expired tokens", n),
            Err(e) => tracing::warn!("Failed to clean up tokens: {}", e),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
