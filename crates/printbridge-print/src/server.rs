// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Local HTTP print server.
//
// Web pages running in the user's browser POST jobs to
// `http://localhost:<port>/print`; each job is forwarded to the printer
// selected in the configuration.  The server is an axum router served on
// one background task with graceful shutdown.
//
// # Endpoints
//
//   - GET  /health  liveness probe with the current local time
//   - POST /print   `{"type": "pdf"|"raw"|..., "content": "..."}`
//
// # Lifecycle
//
// `start` flips the phase to Running before the listener is bound, so a
// bind failure shows up asynchronously: it is logged and the phase drops
// back to Stopped.  A generation counter keeps a stale listener task from
// stopping a newer one.  Only one listener task holds the port at a time: a
// `start` issued while a previous listener is still draining waits for it
// to release the socket before binding.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{ConnectInfo, DefaultBodyLimit, Request, State};
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http_body_util::LengthLimitError;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tracing::{debug, error, info, warn};

use printbridge_core::config::ConfigProvider;
use printbridge_core::error::{PrintBridgeError, Result};
use printbridge_core::types::{JobKind, PrintJob, ServerStatus, printer_label};

use crate::dispatcher::PrintDispatcher;
use crate::events::{EventSink, PrintEvent, timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Upper bound on the time spent on one request, printing included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024; // 64 MiB

const INVALID_JSON: &str = "Invalid JSON payload";
const MISSING_FIELDS: &str = "Missing required fields: type and content";
const BODY_TOO_LARGE: &str = "Request body too large";
const UNREADABLE_BODY: &str = "Request body could not be read";
const JOB_COMPLETED: &str = "Print job completed";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Body of `POST /print`.
#[derive(Debug, Default, Deserialize)]
pub struct PrintRequest {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Body of every `POST /print` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintResponse {
    pub success: bool,
    pub message: String,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub time: String,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Shared by the request handlers.
#[derive(Clone)]
struct HandlerContext {
    dispatcher: Arc<PrintDispatcher>,
    config: Arc<dyn ConfigProvider>,
    events: Arc<dyn EventSink>,
    body_limit: usize,
}

struct ServerState {
    phase: ServerStatus,
    port: u16,
    /// Bumped on every successful `start`.
    generation: u64,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

pub struct PrintServer {
    context: HandlerContext,
    request_timeout: Duration,
    state: Arc<Mutex<ServerState>>,
    /// Held by the listener task from bind until the socket is closed.
    listener_slot: Arc<tokio::sync::Mutex<()>>,
}

impl PrintServer {
    pub fn new(
        dispatcher: Arc<PrintDispatcher>,
        config: Arc<dyn ConfigProvider>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            context: HandlerContext {
                dispatcher,
                config,
                events,
                body_limit: MAX_BODY_BYTES,
            },
            request_timeout: REQUEST_TIMEOUT,
            state: Arc::new(Mutex::new(ServerState {
                phase: ServerStatus::Stopped,
                port: 0,
                generation: 0,
                shutdown: None,
                task: None,
            })),
            listener_slot: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.context.body_limit = limit;
        self
    }

    /// The HTTP routes with CORS, timeout and body-limit layers applied.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::ACCEPT]);

        Router::new()
            .route("/health", get(health))
            .route("/print", post(print))
            .with_state(self.context.clone())
            .layer(DefaultBodyLimit::max(self.context.body_limit))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                self.request_timeout,
            ))
            .layer(cors)
    }

    /// Begin listening on `0.0.0.0:<port>`.
    ///
    /// Returns once the listener task is spawned; bind errors are reported
    /// through the log and `is_running`.  Must be called from within a
    /// tokio runtime.
    pub fn start(&self, port: u16) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PrintBridgeError::PrintServer(format!("no async runtime: {e}")))?;

        let mut state = lock(&self.state);
        if state.phase == ServerStatus::Running {
            debug!(port = state.port, "print server already running");
            return Err(PrintBridgeError::AlreadyRunning);
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        state.generation += 1;
        state.phase = ServerStatus::Running;
        state.port = port;
        state.shutdown = Some(shutdown_tx);
        state.task = Some(runtime.spawn(serve(
            self.router(),
            port,
            state.generation,
            shutdown_rx,
            Arc::clone(&self.state),
            Arc::clone(&self.listener_slot),
        )));
        drop(state);

        info!(port, "print server starting");
        Ok(())
    }

    /// Shut down gracefully and wait for in-flight requests to finish.
    ///
    /// Stopping a server that is not running is a no-op.
    pub async fn stop(&self) -> Result<()> {
        let (shutdown, task) = {
            let mut state = lock(&self.state);
            if state.phase != ServerStatus::Running {
                return Ok(());
            }
            state.phase = ServerStatus::Stopped;
            (state.shutdown.take(), state.task.take())
        };

        if let Some(tx) = shutdown {
            // The listener may already have exited.
            let _ = tx.send(());
        }
        if let Some(handle) = task {
            handle
                .await
                .map_err(|e| PrintBridgeError::PrintServer(format!("task join: {e}")))?;
        }

        info!("print server stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.status() == ServerStatus::Running
    }

    pub fn status(&self) -> ServerStatus {
        lock(&self.state).phase
    }

    /// Port of the most recent `start`.
    pub fn port(&self) -> u16 {
        lock(&self.state).port
    }
}

fn lock(state: &Mutex<ServerState>) -> MutexGuard<'_, ServerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Listener task body.
async fn serve(
    router: Router,
    port: u16,
    generation: u64,
    shutdown: oneshot::Receiver<()>,
    state: Arc<Mutex<ServerState>>,
    slot: Arc<tokio::sync::Mutex<()>>,
) {
    let _slot = slot.lock_owned().await;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(port, error = %e, "print server failed to bind");
            mark_stopped(&state, generation);
            return;
        }
    };
    info!(%addr, "print server listening");

    let result = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = shutdown.await;
    })
    .await;

    if let Err(e) = result {
        error!(port, error = %e, "print server terminated");
        mark_stopped(&state, generation);
    }
}

/// Drop back to Stopped unless a newer `start` has taken over.
fn mark_stopped(state: &Mutex<ServerState>, generation: u64) {
    let mut state = lock(state);
    if state.generation == generation && state.phase == ServerStatus::Running {
        state.phase = ServerStatus::Stopped;
        state.shutdown = None;
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        time: timestamp(),
    })
}

/// HTTP status for a failed `POST /print`.
pub fn status_code(err: &PrintBridgeError) -> StatusCode {
    if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Whether a body read failed because the body exceeded its size limit.
fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

fn reply(status: StatusCode, success: bool, message: impl Into<String>) -> Response {
    let body = PrintResponse {
        success,
        message: message.into(),
    };
    (status, Json(body)).into_response()
}

/// Parse the request body, rejecting anything that is not a JSON object.
fn parse_request(body: &[u8]) -> Result<PrintRequest> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|_| PrintBridgeError::Validation(INVALID_JSON.into()))?;
    if !value.is_object() {
        return Err(PrintBridgeError::Validation(INVALID_JSON.into()));
    }
    serde_json::from_value(value).map_err(|_| PrintBridgeError::Validation(INVALID_JSON.into()))
}

async fn print(State(ctx): State<HandlerContext>, request: Request) -> Response {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".into());

    let body = match axum::body::to_bytes(request.into_body(), ctx.body_limit).await {
        Ok(body) => body,
        Err(e) if is_length_limit(&e) => {
            warn!(remote_addr = %remote_addr, limit = ctx.body_limit, "print request body too large");
            return reply(StatusCode::PAYLOAD_TOO_LARGE, false, BODY_TOO_LARGE);
        }
        Err(e) => {
            warn!(remote_addr = %remote_addr, error = %e, "unreadable print request body");
            return reply(StatusCode::BAD_REQUEST, false, UNREADABLE_BODY);
        }
    };

    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(remote_addr = %remote_addr, "unparseable print request");
            return reply(status_code(&e), false, e.to_string());
        }
    };

    let (kind, content) = match (request.kind, request.content) {
        (Some(kind), Some(content)) if !kind.is_empty() && !content.is_empty() => (kind, content),
        _ => return reply(StatusCode::BAD_REQUEST, false, MISSING_FIELDS),
    };

    let printer = ctx.config.config().selected_printer;
    info!(
        kind = %kind,
        content_length = content.len(),
        remote_addr = %remote_addr,
        printer = printer_label(&printer),
        "print request received"
    );
    ctx.events.emit(PrintEvent::Received {
        kind: kind.clone(),
        content: content.clone(),
        time: timestamp(),
        printer: printer.clone(),
    });

    let job = PrintJob::new(JobKind::parse(&kind), content, printer);
    match ctx.dispatcher.dispatch(&job).await {
        Ok(outcome) => {
            ctx.events.emit(PrintEvent::Success {
                kind,
                printer: outcome.printer,
                time: timestamp(),
            });
            reply(StatusCode::OK, true, JOB_COMPLETED)
        }
        Err(e) => {
            error!(job_id = %job.id, error = %e, "print job failed");
            ctx.events.emit(PrintEvent::Error {
                error: e.to_string(),
                time: timestamp(),
            });
            reply(status_code(&e), false, format!("Print failed: {e}"))
        }
    }
}
