//! `NetmonServer`: Axum HTTP + WebSocket server and its background workers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use netmon_core::TriggerSignal;
use netmon_runner::MeasurementRunner;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::health::{self, HealthResponse};
use crate::history::History;
use crate::pipeline::{PipelineState, RequestPipeline};
use crate::shutdown::ShutdownCoordinator;
use crate::trigger::{TriggerSender, run_periodic_trigger, trigger_channel};
use crate::websocket::broadcast::Broadcaster;
use crate::websocket::connection::ClientConnection;
use crate::websocket::registry::SessionRegistry;
use crate::websocket::session::{SessionContext, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Handed to each WebSocket session.
    pub session: SessionContext,
    /// Immutable server configuration.
    pub config: Arc<ServerConfig>,
    /// Pipeline state, for `/health`.
    pub pipeline_state: watch::Receiver<PipelineState>,
    /// Prometheus renderer, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// When the server started.
    pub start_time: Instant,
    /// Wall-clock start time.
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// The netmon server.
pub struct NetmonServer {
    config: Arc<ServerConfig>,
    registry: Arc<SessionRegistry>,
    history: Arc<History>,
    broadcaster: Broadcaster,
    triggers: TriggerSender,
    pending: Mutex<Option<(RequestPipeline, mpsc::Receiver<TriggerSignal>)>>,
    pipeline_state: watch::Receiver<PipelineState>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
    started_at: chrono::DateTime<chrono::Utc>,
}

impl NetmonServer {
    /// Create a server measuring with `runner`. Nothing runs until
    /// [`spawn_workers`](Self::spawn_workers) and [`listen`](Self::listen).
    pub fn new(config: ServerConfig, runner: Arc<dyn MeasurementRunner>) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let history = Arc::new(History::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let (triggers, trigger_rx) = trigger_channel(config.trigger_capacity);
        let pipeline = RequestPipeline::new(
            runner,
            config.server_id,
            Arc::clone(&history),
            broadcaster.clone(),
        );
        let pipeline_state = pipeline.subscribe();

        Self {
            config: Arc::new(config),
            registry,
            history,
            broadcaster,
            triggers,
            pending: Mutex::new(Some((pipeline, trigger_rx))),
            pipeline_state,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics: None,
            start_time: Instant::now(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Serve Prometheus metrics from `handle` at `/metrics`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            session: SessionContext {
                registry: Arc::clone(&self.registry),
                history: Arc::clone(&self.history),
                triggers: self.triggers.clone(),
                send_queue_capacity: self.config.send_queue_capacity,
                heartbeat_interval: self.config.heartbeat_interval,
                shutdown: self.shutdown.token(),
            },
            config: Arc::clone(&self.config),
            pipeline_state: self.pipeline_state.clone(),
            metrics: self.metrics.clone(),
            start_time: self.start_time,
            started_at: self.started_at,
        };

        let router = Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state);

        let router = match &self.config.static_dir {
            Some(dir) => router.fallback_service(ServeDir::new(dir)),
            None => router,
        };

        router
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Start the request pipeline and, if configured, the periodic trigger.
    ///
    /// Only the first call starts anything; later calls return no handles.
    pub fn spawn_workers(&self) -> Vec<JoinHandle<()>> {
        let Some((pipeline, trigger_rx)) = self.pending.lock().take() else {
            warn!("workers already started");
            return Vec::new();
        };

        let mut handles = vec![tokio::spawn(
            pipeline.run(trigger_rx, self.shutdown.token()),
        )];
        if let Some(period) = self.config.measurement_period {
            handles.push(tokio::spawn(run_periodic_trigger(
                self.triggers.clone(),
                period,
                self.shutdown.token(),
            )));
        }
        handles
    }

    /// Bind the listener and serve until shutdown.
    ///
    /// Returns the bound address and the server task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = self.config.listen_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
        });

        info!(addr = %local_addr, "netmon server listening");
        Ok((local_addr, handle))
    }

    /// Request a measurement, as a client message would.
    pub fn triggers(&self) -> &TriggerSender {
        &self.triggers
    }

    /// The connection registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// The fan-out over the registry.
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Measurement history.
    pub fn history(&self) -> &Arc<History> {
        &self.history
    }

    /// Observe pipeline state changes.
    pub fn pipeline_state(&self) -> watch::Receiver<PipelineState> {
        self.pipeline_state.clone()
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }
}

/// GET /ws
async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());
    if !state.config.origin_allowed(origin) {
        warn!(origin, "websocket upgrade rejected");
        return StatusCode::FORBIDDEN.into_response();
    }
    let conn_id = ClientConnection::next_id();
    let ctx = state.session;
    ws.on_upgrade(move |socket| run_ws_session(socket, conn_id, ctx))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let pipeline_state = *state.pipeline_state.borrow();
    Json(health::health_check(
        state.start_time,
        state.started_at,
        state.session.registry.live_count(),
        state.session.history.len(),
        pipeline_state,
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}
