use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use signal_board::{BoardConfig, HealthStatus, NormalizedSignal, SignalBoard, Transport};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

const DEFAULT_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8050);

#[tokio::main]
async fn main() {
    // Initialize logging
    init_logging();

    info!("Starting signal-board server");

    let config = match BoardConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            error!(%error, "invalid configuration");
            std::process::exit(1);
        }
    };
    info!(
        analytics_url = %config.analytics_url,
        bot_health_url = %config.bot_health_url,
        "upstream endpoints"
    );

    let board = match SignalBoard::from_config(config) {
        Ok(board) => board,
        Err(error) => {
            error!(%error, "failed to initialise signal board");
            std::process::exit(1);
        }
    };

    // Configurable via DASHBOARD_ADDR env var (default: 0.0.0.0:8050)
    let addr = bind_addr(std::env::var("DASHBOARD_ADDR").ok().as_deref());
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(error) => {
            error!(%addr, %error, "failed to bind dashboard server");
            std::process::exit(1);
        }
    };
    info!("Dashboard API listening on http://{}", addr);

    if let Err(error) = axum::serve(listener, router(board))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(%error, "dashboard server terminated");
        std::process::exit(1);
    }

    info!("signal-board server stopped");
}

/// Parse the bind address, falling back to [`DEFAULT_ADDR`] when unset or invalid.
fn bind_addr(raw: Option<&str>) -> SocketAddr {
    match raw {
        None => DEFAULT_ADDR,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(addr = raw, "invalid DASHBOARD_ADDR, using {}", DEFAULT_ADDR);
            DEFAULT_ADDR
        }),
    }
}

/// JSON routes of the dashboard API.
fn router<T>(board: SignalBoard<T>) -> Router
where
    T: Transport + ?Sized + 'static,
{
    Router::new()
        .route("/health", get(api_health))
        .route("/api/status", get(api_status::<T>))
        .route("/api/signals", get(api_signals::<T>))
        .route("/api/dashboard-data", get(api_dashboard_data::<T>))
        .with_state(board)
}

async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"ok": true}))
}

async fn api_status<T>(State(board): State<SignalBoard<T>>) -> Json<HealthStatus>
where
    T: Transport + ?Sized + 'static,
{
    Json(board.health().await)
}

async fn api_signals<T>(State(board): State<SignalBoard<T>>) -> Json<Vec<NormalizedSignal>>
where
    T: Transport + ?Sized + 'static,
{
    Json(board.signals().await)
}

async fn api_dashboard_data<T>(State(board): State<SignalBoard<T>>) -> Response
where
    T: Transport + ?Sized + 'static,
{
    match board.combined().await {
        Ok(dashboard) => Json(dashboard).into_response(),
        Err(error) => (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response(),
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Initialize logging
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // LOG_FORMAT=json switches to JSON lines
    if matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json")) {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
