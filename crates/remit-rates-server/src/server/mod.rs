//! HTTP API over the orchestrator and the rate store.

pub mod handlers;
pub mod state;

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower::ServiceBuilder;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::RateLimit;

pub use state::{AppState, SharedState};

/// Build the router with every route and layer.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let headers = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ));

    let routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/test", get(handlers::test))
        .route("/test-scraper", get(handlers::test_scraper))
        .route("/test-db", get(handlers::test_db))
        .route("/api/taux", get(handlers::get_rates))
        .route("/api/taux/history/:service", get(handlers::rates_history))
        .route("/api/taux/refresh", post(handlers::refresh_rates))
        .fallback(handlers::not_found);

    rate_limited(routes, &state.rate_limit)
        .layer(headers)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Per-client-IP quota. Over-quota requests get 429 Too Many Requests.
fn rate_limited(routes: Router<SharedState>, limit: &RateLimit) -> Router<SharedState> {
    let config = GovernorConfigBuilder::default()
        .period(limit.replenish_period())
        .burst_size(limit.max_requests)
        .finish();

    match config {
        Some(config) => routes.layer(GovernorLayer {
            config: Arc::new(config),
        }),
        None => {
            tracing::warn!(?limit, "invalid rate limit, requests are not limited");
            routes
        }
    }
}

/// Serve until Ctrl-C or SIGTERM, then give in-flight requests `grace` to
/// finish.
pub async fn serve(addr: &str, state: Arc<AppState>, grace: Duration) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("HTTP API listening on http://{}", listener.local_addr()?);
    for route in [
        "GET  /health",
        "GET  /test",
        "GET  /test-scraper",
        "GET  /test-db",
        "GET  /api/taux",
        "GET  /api/taux/history/:service",
        "POST /api/taux/refresh",
    ] {
        tracing::debug!("route {route}");
    }

    serve_with_shutdown(listener, state, shutdown_signal(), grace).await
}

/// Serve on `listener` until `signal` resolves. Requests still running
/// `grace` after the signal are abandoned and an error is returned.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    signal: F,
    grace: Duration,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();

    let signalled = Arc::new(Notify::new());
    let notify = Arc::clone(&signalled);
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.await;
            notify.notify_one();
        })
        .into_future();

    let deadline = async {
        signalled.notified().await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => result?,
        () = deadline => {
            tracing::error!(
                grace_ms = grace.as_millis() as u64,
                "graceful shutdown timed out, forcing exit"
            );
            anyhow::bail!("forced shutdown: requests still running after {grace:?}");
        }
    }

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
