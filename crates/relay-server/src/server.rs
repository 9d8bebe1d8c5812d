//! `RelayServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use relay_core::Backend;
use relay_llm::{BackendRegistry, BackendStatus};
use relay_settings::RelaySettings;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::session::SessionStore;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::{RelayContext, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session components shared by every connection.
    pub relay: Arc<RelayContext>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// `GET /api/chatbots/config` body.
#[derive(Debug, Serialize)]
pub struct ChatbotsConfig {
    /// Backend used until a session selects one.
    pub default: Backend,
    /// Every backend and whether it can answer.
    pub backends: Vec<BackendStatus>,
}

/// The chat relay server.
pub struct RelayServer {
    settings: RelaySettings,
    relay: Arc<RelayContext>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl RelayServer {
    /// Create a server answering through `registry`.
    pub fn new(settings: RelaySettings, registry: BackendRegistry) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let relay = Arc::new(RelayContext::new(
            &settings,
            Arc::new(registry),
            shutdown.token(),
        ));
        Self {
            settings,
            relay,
            shutdown,
            metrics: None,
            start_time: Instant::now(),
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            relay: self.relay.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route(&self.settings.server.ws_path, get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/api/chatbots/config", get(chatbots_config_handler))
            .with_state(state)
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve in the background until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = format!("{}:{}", self.settings.server.host, self.settings.server.port);
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server stopped with error");
            }
        });

        info!(
            addr = %local_addr,
            ws_path = %self.settings.server.ws_path,
            "relay server listening"
        );
        Ok((local_addr, handle))
    }

    /// Live sessions.
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.relay.sessions
    }

    /// Shared session components.
    pub fn relay(&self) -> &Arc<RelayContext> {
        &self.relay
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Settings the server was built with.
    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }
}

/// GET `{ws_path}`: upgrade to the relay protocol.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let relay = state.relay;
    ws.max_message_size(relay.transport.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, relay))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let relay = &state.relay;
    Json(health::health_check(
        state.start_time,
        relay.connection_count(),
        relay.sessions.len(),
        relay.sessions.streaming_count(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// GET /api/chatbots/config
async fn chatbots_config_handler(State(state): State<AppState>) -> Json<ChatbotsConfig> {
    let registry = state.relay.coordinator.registry();
    Json(ChatbotsConfig {
        default: state.relay.sessions.default_backend(),
        backends: registry.status(),
    })
}
