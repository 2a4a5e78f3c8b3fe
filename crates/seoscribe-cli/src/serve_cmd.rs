use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use seoscribe_core::export::ExportWriter;
use seoscribe_core::generation::{AnthropicClient, Generator};
use seoscribe_core::presets::{self, RefineInstruction};
use seoscribe_core::session::{KeywordInputs, Session};
use seoscribe_core::workflow::state::UnknownStep;
use seoscribe_core::workflow::{
    SessionGuard, SessionStore, Step, StepInput, WorkflowController, WorkflowError,
};

use crate::config::ScribeConfig;

/// Chunks buffered between the generator and a slow SSE client.
const CHUNK_BUFFER: usize = 64;

const INDEX_HTML: &str = include_str!("../assets/index.html");

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            kind: "not_found",
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "internal",
            message: msg.into(),
        }
    }

    fn body(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.message, "kind": self.kind })
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        let status = match &err {
            WorkflowError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            WorkflowError::UnknownSession(_) => StatusCode::NOT_FOUND,
            WorkflowError::PreconditionState(_)
            | WorkflowError::InvalidStepTransition { .. }
            | WorkflowError::Busy(_) => StatusCode::CONFLICT,
            WorkflowError::Cancelled { .. } => StatusCode::REQUEST_TIMEOUT,
            WorkflowError::MalformedResponse { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            WorkflowError::GenerationService(_) => StatusCode::BAD_GATEWAY,
            WorkflowError::GenerationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            WorkflowError::ExportIo(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body())).into_response()
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// A session plus the derived step position the UI renders.
#[derive(Debug, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: Session,
    pub step: Step,
    pub step_index: u8,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            session: session.clone(),
            step: session.current_step(),
            step_index: session.step_index(),
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    controller: Arc<WorkflowController>,
    sessions: SessionStore,
}

impl AppState {
    pub fn new(controller: WorkflowController) -> Self {
        Self {
            controller: Arc::new(controller),
            sessions: SessionStore::new(),
        }
    }

    #[cfg(test)]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/presets", get(list_presets))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session).delete(delete_session))
        .route("/api/sessions/{id}/intake", post(keyword_intake))
        .route("/api/sessions/{id}/steps/{step}", post(run_step))
        .route("/api/sessions/{id}/refine", post(refine))
        .route("/api/sessions/{id}/finalize", post(finalize))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(config: ScribeConfig) -> Result<()> {
    let generator: Arc<dyn Generator> = Arc::new(
        AnthropicClient::new(config.anthropic.clone())
            .context("failed to create Anthropic client")?,
    );
    let controller = WorkflowController::new(
        generator,
        config.prompts.clone(),
        ExportWriter::new(&config.output_dir),
    );
    let app = build_router(AppState::new(controller));

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.bind, config.port))?;
    tracing::info!(
        model = %config.anthropic.model,
        output_dir = %config.output_dir.display(),
        "seoscribe serve listening on http://{addr}"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("seoscribe serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

/// A streaming operation, run on a spawned task that owns the session guard.
enum Operation {
    Advance(StepInput),
    Refine(RefineInstruction),
}

fn chunk_event(text: String) -> Event {
    Event::default()
        .event("chunk")
        .data(serde_json::json!({ "text": text }).to_string())
}

fn done_event(session: &Session) -> Event {
    let data = serde_json::to_string(&SessionView::from(session))
        .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string());
    Event::default().event("done").data(data)
}

fn error_event(err: &AppError) -> Event {
    Event::default().event("error").data(err.body().to_string())
}

/// Run `op` in the background and relay its chunks as SSE `chunk` events,
/// followed by one `done` or `error` event.
///
/// Dropping the response stream (client disconnect) closes the chunk
/// channel, which cancels the operation without committing anything.
fn stream_operation(
    controller: Arc<WorkflowController>,
    mut guard: SessionGuard,
    op: Operation,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (chunk_tx, chunk_rx) = mpsc::channel::<String>(CHUNK_BUFFER);
    let (done_tx, done_rx) = oneshot::channel::<Event>();

    tokio::spawn(async move {
        let result = match op {
            Operation::Advance(input) => {
                controller.advance(&mut guard, input, Some(&chunk_tx)).await
            }
            Operation::Refine(instruction) => {
                controller.refine(&mut guard, instruction, Some(&chunk_tx)).await
            }
        };
        // Close the chunk stream before the terminal event is sent.
        drop(chunk_tx);
        let event = match result {
            Ok(_) => done_event(&guard),
            Err(err) => error_event(&AppError::from(err)),
        };
        // The client may already be gone.
        let _ = done_tx.send(event);
    });

    let terminal = futures::stream::once(async move {
        done_rx.await.unwrap_or_else(|_| {
            error_event(&AppError::internal("step ended without a result"))
        })
    });

    let events = ReceiverStream::new(chunk_rx)
        .map(chunk_event)
        .chain(terminal)
        .map(Ok);

    Sse::new(events).keep_alive(KeepAlive::default())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn list_presets() -> Json<Vec<presets::RefinePreset>> {
    Json(presets::load_presets())
}

async fn create_session(State(state): State<AppState>) -> Response {
    let session = state.sessions.create().await;
    (StatusCode::CREATED, Json(SessionView::from(&session))).into_response()
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.sessions.snapshot(id).await?;
    Ok(Json(SessionView::from(&session)))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn keyword_intake(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(inputs): Json<KeywordInputs>,
) -> Result<Json<SessionView>, AppError> {
    let mut guard = state.sessions.acquire(id).await?;
    state
        .controller
        .advance(&mut guard, StepInput::KeywordIntake(inputs), None)
        .await?;
    Ok(Json(SessionView::from(&*guard)))
}

async fn run_step(
    State(state): State<AppState>,
    Path((id, step)): Path<(Uuid, String)>,
) -> Result<Response, AppError> {
    let step: Step = step
        .parse()
        .map_err(|e: UnknownStep| AppError::not_found(e.to_string()))?;
    let input = StepInput::for_generation_step(step).ok_or_else(|| {
        AppError::not_found(format!("{step} is not run through /steps"))
    })?;

    let guard = state.sessions.acquire(id).await?;
    // Reject out-of-order requests before committing to an event stream.
    state.controller.ensure_transition(&guard, step)?;

    tracing::debug!(session_id = %id, step = %step, "streaming step");
    let op = Operation::Advance(input);
    Ok(stream_operation(state.controller.clone(), guard, op).into_response())
}

async fn refine(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(instruction): Json<RefineInstruction>,
) -> Result<Response, AppError> {
    let guard = state.sessions.acquire(id).await?;
    state.controller.ensure_transition(&guard, Step::Refine)?;
    instruction
        .directive()
        .map_err(|msg| AppError::from(WorkflowError::InvalidInput(msg)))?;

    let op = Operation::Refine(instruction);
    Ok(stream_operation(state.controller.clone(), guard, op).into_response())
}

async fn finalize(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let mut guard = state.sessions.acquire(id).await?;
    let controller = state.controller.clone();
    // Export does blocking file I/O; keep it off the async workers. The
    // session stays locked until the blocking task drops the guard.
    let outcome = tokio::task::spawn_blocking(move || controller.finalize(&mut guard))
        .await
        .map_err(|e| AppError::internal(format!("export task failed: {e}")))??;
    Ok(Json(outcome).into_response())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
