pub mod application_state;
pub mod config;
pub mod error;
pub mod routes;
pub mod sensors;
pub mod services;
pub mod utils;

use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::{Router, routing::get};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use crate::application_state::AppStateMutex;

pub use crate::config::AppConfig;

pub fn configure_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| {
                info!("RUST_LOG not set, using default log level 'info'");
                EnvFilter::new("info") // Default log level if not set
            }),
        )
        .with_thread_ids(true)
        .with_thread_names(false)
        .with_writer(std::io::stdout) // log to stdout for compat with containerized environments
        .init();
}

/// Builds the Axum application with routes and shared state.
/// A TraceLayer is added for logging client request details.
pub fn build_app(app_state: AppStateMutex) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/status", get(routes::status::detailed_health))
        .route("/sensors", get(routes::sensors::list_sensors))
        .route(
            "/sensors/{index}/current",
            get(routes::sensors::get_sensor_current),
        )
        .with_state(app_state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_ip_addr = request
                    .extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.to_string())
                    .unwrap_or_else(|| "unknown".to_string());

                // '%' is tracing syntax used to format the span name
                tracing::span!(
                    Level::INFO,
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    client_ip = %request_ip_addr,
                )
            }),
        )
}

/// Serves the API until Ctrl+C or until `cancel_token` is cancelled elsewhere.
/// Either way the token is cancelled on the way out so the power monitor stops too.
pub async fn start_server(
    app: Router,
    config: &AppConfig,
    cancel_token: CancellationToken,
) -> anyhow::Result<()> {
    let bind_address: SocketAddr = config.api.listen_address.parse()?;
    let listener = tokio::net::TcpListener::bind(bind_address).await?;

    let shutdown_handler = async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("Received shutdown signal, shutting down gracefully..."),
                Err(e) => tracing::error!("Failed to install Ctrl+C handler: {}", e),
            },
            _ = cancel_token.cancelled() => info!("Shutdown requested, stopping server..."),
        }
        cancel_token.cancel();
    };

    info!("Starting server, API listening on {}", bind_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_handler)
    .await?;
    Ok(())
}
