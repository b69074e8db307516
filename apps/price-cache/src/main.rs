//! Price Cache Binary
//!
//! Starts the stream client, the scheduled jobs and the HTTP server.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin price-cache
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `FINNHUB_API_KEY`: Trade stream and quote API key
//! - `ALPHA_VANTAGE_API_KEY`: Market calendar API key
//!
//! ## Optional
//! - `PORT`: HTTP port (default: 3002)
//! - `MARKET_REGION`: Calendar region (default: United States)
//! - `MARKET_TIMEZONE`: Exchange timezone (default: `America/New_York`)
//! - `PRICE_CACHE_*`: Idle threshold, sweep and refresh intervals, stream tuning
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: price-cache)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use price_cache::infrastructure::telemetry;
use price_cache::{
    AlphaVantageCalendarClient, AppState, FallbackQuoteFetcher, FinnhubQuoteClient, HttpServer,
    MarketStatusConfig, MarketStatusService, OrchestratorConfig, PeriodicScheduler,
    PriceCacheConfig, PriceCacheOrchestrator, PriceStore, StreamClientConfig, StreamFeedClient,
    SubscriptionRegistry, SystemClock, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Price Cache");

    let _metrics_handle = init_metrics();

    let config = PriceCacheConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();
    let clock = Arc::new(SystemClock);
    let prices = Arc::new(PriceStore::new());

    // Provider adapters
    let calendar = Arc::new(AlphaVantageCalendarClient::new(
        config.endpoints.calendar_url.clone(),
        config.credentials.alpha_vantage_api_key(),
        config.cache.http_timeout,
    )
    .context("failed to build calendar client")?);
    let quotes = Arc::new(FinnhubQuoteClient::new(
        config.endpoints.quote_url.clone(),
        config.credentials.finnhub_api_key(),
        config.cache.http_timeout,
    )
    .context("failed to build quote client")?);
    let stream_client = Arc::new(StreamFeedClient::new(
        StreamClientConfig::from_config(&config),
        Arc::clone(&prices),
        shutdown_token.clone(),
    ));

    // Services
    let market = Arc::new(MarketStatusService::new(
        calendar,
        clock.clone(),
        MarketStatusConfig {
            region: config.market.region.clone(),
            timezone: config.market.timezone,
        },
    ));
    let fallback = Arc::new(FallbackQuoteFetcher::new(quotes, Arc::clone(&prices)));
    let registry = Arc::new(SubscriptionRegistry::new(Arc::clone(&prices)));
    let orchestrator = Arc::new(PriceCacheOrchestrator::new(
        market,
        stream_client.clone(),
        fallback,
        registry,
        clock,
        OrchestratorConfig {
            idle_threshold: config.cache.idle_threshold,
        },
    ));

    // Scheduled jobs
    let scheduler = PeriodicScheduler::new(shutdown_token.child_token());

    let refresh_target = Arc::clone(&orchestrator);
    scheduler.spawn(
        "market_status_refresh",
        config.cache.market_refresh_interval,
        true,
        move || {
            let orchestrator = Arc::clone(&refresh_target);
            async move { orchestrator.refresh_market_status().await }
        },
    );

    let sweep_target = Arc::clone(&orchestrator);
    scheduler.spawn(
        "idle_sweep",
        config.cache.sweep_interval,
        false,
        move || {
            let orchestrator = Arc::clone(&sweep_target);
            async move {
                orchestrator.sweep();
            }
        },
    );

    // Stream client
    let stream_task = {
        let client = Arc::clone(&stream_client);
        tokio::spawn(async move {
            if let Err(e) = client.run().await {
                tracing::error!(error = %e, "Stream client error");
            }
        })
    };

    // HTTP server
    let state = Arc::new(AppState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&orchestrator),
    ));
    let http_server = HttpServer::new(config.port, state, shutdown_token.clone());
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run().await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    tracing::info!(port = config.port, "Price cache ready");

    await_shutdown(shutdown_token).await;

    let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        scheduler.shutdown().await;
        let _ = stream_task.await;
        let _ = http_task.await;
    })
    .await;
    if drained.is_err() {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Shutdown timed out, exiting"
        );
    }

    tracing::info!("Price cache stopped");
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &PriceCacheConfig) {
    tracing::info!(
        port = config.port,
        region = %config.market.region,
        timezone = %config.market.timezone,
        idle_threshold_secs = config.cache.idle_threshold.as_secs(),
        sweep_interval_secs = config.cache.sweep_interval.as_secs(),
        market_refresh_interval_secs = config.cache.market_refresh_interval.as_secs(),
        "Configuration loaded"
    );
    tracing::debug!(
        stream_url = %config.endpoints.stream_url,
        quote_url = %config.endpoints.quote_url,
        calendar_url = %config.endpoints.calendar_url,
        "Provider endpoints"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
