//! HTTP server using axum.

pub mod error;
pub mod extract;
mod routes;
mod ws;

use crate::auth::SessionStore;
use crate::catalog::{BookStore, CategoryStore};
use crate::clock::{Clock, SystemClock};
use crate::config::ServerConfig;
use crate::db;
use crate::loans::LoanEngine;
use crate::metrics::Metrics;
use crate::notify::{HubHandle, NotificationHub, NotificationSink};
use crate::settings::SettingsProvider;
use crate::sweep::OverdueSweeper;
use crate::users::UserStore;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use extract::Caller;

/// Shared state for all handlers
pub struct AppState {
    pub pool: SqlitePool,
    pub clock: Arc<dyn Clock>,
    pub users: UserStore,
    pub sessions: SessionStore,
    pub session_ttl: chrono::Duration,
    pub books: BookStore,
    pub categories: CategoryStore,
    pub settings: SettingsProvider,
    pub loans: LoanEngine,
    pub notifications: NotificationSink,
    pub hub: HubHandle,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        clock: Arc<dyn Clock>,
        session_ttl: chrono::Duration,
        hub: HubHandle,
        metrics: Metrics,
    ) -> Arc<Self> {
        let settings = SettingsProvider::new(pool.clone());
        Arc::new(Self {
            users: UserStore::new(pool.clone(), clock.clone()),
            sessions: SessionStore::new(pool.clone(), session_ttl, clock.clone()),
            session_ttl,
            books: BookStore::new(pool.clone(), clock.clone()),
            categories: CategoryStore::new(pool.clone()),
            loans: LoanEngine::new(pool.clone(), settings.clone(), clock.clone()),
            notifications: NotificationSink::new(
                pool.clone(),
                hub.clone(),
                clock.clone(),
                metrics.clone(),
            ),
            settings,
            hub,
            metrics,
            clock,
            pool,
        })
    }

    pub fn sweeper(&self) -> OverdueSweeper {
        OverdueSweeper::new(
            self.loans.clone(),
            self.books.clone(),
            self.settings.clone(),
            self.notifications.clone(),
            self.clock.clone(),
            self.metrics.clone(),
        )
    }
}

pub fn router(state: Arc<AppState>, cors_allow_any: bool) -> Router {
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/ws", get(ws::ws_handler))
        .nest("/api", routes::api())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors_allow_any {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Run the server until Ctrl-C
pub async fn run(config: ServerConfig) -> Result<()> {
    let pool = db::open(&config.database_url, config.max_connections).await?;
    let metrics = Metrics::new()?;
    let hub = NotificationHub::start();
    let state = AppState::new(
        pool,
        Arc::new(SystemClock),
        config.session_ttl(),
        hub.clone(),
        metrics,
    );

    let sweep = state.sweeper().spawn(config.sweep_interval());

    let sessions = state.sessions.clone();
    let session_cleanup = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            if let Err(e) = sessions.purge_expired().await {
                tracing::warn!(error = %e, "session cleanup failed");
            }
        }
    });

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!(%addr, database = %config.database_url, "listening");

    axum::serve(listener, router(state, config.cors_allow_any))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shutting down");
    session_cleanup.abort();
    sweep.stop().await;
    hub.stop();
    hub.stopped().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    let status = if db_ok { "healthy" } else { "degraded" };
    let code = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(json!({
            "status": status,
            "database": db_ok,
            "live_connections": state.hub.connection_count(),
        })),
    )
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    state
        .metrics
        .live_connections
        .set(state.hub.connection_count() as i64);
    let body = state.metrics.render().map_err(ApiError::internal)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
