//! Serve app startup timing and restart detection to the host over HTTP.
use std::sync::Arc;

use axum::Router;
use envconfig::Envconfig;
use eyre::Result;
use tokio::signal;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use startup::{install, LifecycleBus, LifecycleEvent, StartupTracker};

use config::Config;
use handlers::AppState;

mod config;
mod handlers;
mod metrics;

async fn shutdown() {
    let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to register SIGTERM handler");

    let mut interrupt = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("failed to register SIGINT handler");

    tokio::select! {
        _ = term.recv() => {},
        _ = interrupt.recv() => {},
    };

    tracing::info!("Shutdown status change: TERMINATING");
}

async fn listen(app: Router, bind: String) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown())
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout with a level configured by the RUST_LOG envvar (default=INFO)
    let log_layer = tracing_subscriber::fmt::layer().with_filter(
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy(),
    );
    tracing_subscriber::registry().with(log_layer).init();

    let config = Config::init_from_env()?;

    let tracker = Arc::new(StartupTracker::with_system_clock(&config.service_name));
    let bus = LifecycleBus::new();
    // Held until shutdown: dropping it would stop signal delivery.
    let _subscription = install(tracker.clone(), &bus, config.reload_policy);

    if config.signal_on_boot {
        bus.emit(LifecycleEvent::BundleLoadStarted);
    }

    let state = AppState {
        tracker,
        bus,
        track_startup: config.track_startup,
    };
    let app = handlers::add_routes(Router::new(), state);
    let app = metrics::setup_metrics_routes(app)?;

    tracing::info!(bind = %config.bind(), "starting startup-api http server");
    if let Err(e) = listen(app, config.bind()).await {
        tracing::error!("failed to start startup-api http server, {}", e);
        return Err(e);
    }

    Ok(())
}
