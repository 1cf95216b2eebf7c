//! pgmount demo server — registers the plugin and queries through it.

use axum::{
    Json, Router,
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use pgmount::{DEFAULT_DECORATION, ExposedResourceSet, Plugin, RequestDecorations, Resources, Server};
use pgmount_core::{Settings, telemetry};
use pgmount_storage::SqlxDriver;
use serde::Serialize;
use std::{net::SocketAddr, sync::Arc};

type Connections = ExposedResourceSet<SqlxDriver>;

/// Shared application state.
struct AppState {
    connections: Arc<Connections>,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    telemetry::init();
    let settings = Settings::from_env()?;

    tracing::info!("Starting pgmount demo server");

    let mut server = Server::new();
    let plugin = Plugin::new(SqlxDriver);
    let registration = server.register(&plugin, settings.options).await?;

    tracing::info!(
        connections = registration.resources.len(),
        mode = ?registration.mode,
        "Database ready"
    );

    let state = Arc::new(AppState {
        connections: registration.resources,
    });

    let app = server.router(
        Router::new()
            .route("/test", get(now))
            .route("/test/client", get(echo))
            .route("/connections", get(connections))
            .route("/health", get(health))
            .with_state(state),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.api_port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    server.stop().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

// ─── Response Types ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    data: T,
}

type ApiError = (StatusCode, Json<ApiResponse<String>>);

fn json_ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

fn json_err(status: StatusCode, msg: &str) -> ApiError {
    (
        status,
        Json(ApiResponse {
            success: false,
            data: msg.to_string(),
        }),
    )
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    json_err(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
}

// ─── Handlers ───────────────────────────────────────────────────────────────

/// GET /test — current time from the first pool.
async fn now(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let pool = state
        .connections
        .pool
        .first()
        .ok_or_else(|| json_err(StatusCode::SERVICE_UNAVAILABLE, "No pool"))?;
    let now: String = sqlx::query_scalar("SELECT NOW()::text")
        .fetch_one(pool)
        .await
        .map_err(internal)?;
    Ok(json_ok(now))
}

/// GET /test/client — round trip through the first persistent client.
async fn echo(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let client = state
        .connections
        .client
        .as_ref()
        .and_then(Resources::first)
        .ok_or_else(|| json_err(StatusCode::SERVICE_UNAVAILABLE, "No client"))?;
    let message: String = client
        .with(|conn| {
            Box::pin(async move {
                sqlx::query_scalar("SELECT $1::text")
                    .bind("Hello world!")
                    .fetch_one(conn)
                    .await
            })
        })
        .await
        .map_err(internal)?;
    Ok(json_ok(message))
}

/// GET /connections — identities, read from the request decoration when present.
async fn connections(
    State(state): State<Arc<AppState>>,
    Extension(decorations): Extension<RequestDecorations>,
) -> impl IntoResponse {
    let connections = decorations
        .get::<Connections>(DEFAULT_DECORATION)
        .unwrap_or_else(|| state.connections.clone());
    json_ok(connections.identities().map(str::to_owned).collect::<Vec<_>>())
}

/// GET /health — ping every pool.
async fn health(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    for pool in &state.connections.pool {
        sqlx::query("SELECT 1")
            .execute(pool)
            .await
            .map_err(|e| json_err(StatusCode::SERVICE_UNAVAILABLE, &e.to_string()))?;
    }
    Ok("ok")
}
