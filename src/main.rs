//! Process entry point: resolves configuration, wires logging, and serves
//! the `/api/smart` front-end.
//!
//! Grounded on `examples/axum-resilient-kv-store/src/main.rs`'s
//! `#[tokio::main]` + `tracing_subscriber` + `TcpListener::bind` +
//! `axum::serve` skeleton.

use std::sync::Arc;

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use hedge_proxy::config::{AppConfig, Cli};
use hedge_proxy::coordinator::HedgeCoordinator;
use hedge_proxy::events::TracingWarnListener;
use hedge_proxy::fetcher::{ReqwestUpstreamClient, UpstreamClient};
use hedge_proxy::http::{app, AppState};

#[tokio::main]
async fn main() {
    // Two sinks: stdout at the level controlled by RUST_LOG, and a
    // WARN-and-above file sink matching the Python reference's single
    // `logging.basicConfig(filename='./backend_errors.log', ...)`.
    let file_appender = tracing_appender::rolling::never(".", "backend_errors.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    let stdout_layer = tracing_subscriber::fmt::layer().with_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    );
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_filter(LevelFilter::WARN);

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let cli = Cli::parse();
    let config = match AppConfig::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fatal: {e}");
            std::process::exit(1);
        }
    };
    let port = config.port;
    let config = Arc::new(config);

    let client: Arc<dyn UpstreamClient> = Arc::new(ReqwestUpstreamClient::new());
    let coordinator =
        HedgeCoordinator::new(client, config.per_attempt_timeout).with_listener(TracingWarnListener);

    let state = AppState::new(Arc::clone(&config), coordinator);
    let router = app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {addr}: {e}"));

    tracing::info!("listening on http://{}", addr);
    tracing::info!("upstream: {}", config.upstream_url);

    axum::serve(listener, router.into_make_service())
        .await
        .expect("server error");
}
