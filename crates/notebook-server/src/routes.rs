//! HTTP + SSE routes exposing the reactive notebook engine.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, patch, post};
use axum::Router;
use futures::stream::Stream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use notebook_core::cell::{CellId, CellType, NotebookSettings};
use notebook_core::events::Event;
use notebook_core::pool::PoolManager;
use notebook_core::scheduler::Scheduler;

use crate::error::{ServerError, ServerResult};
use crate::protocol::{
    CreateCellRequest, NotebookDto, RunAck, RunRequest, SettingsRequest, TestConnectionResponse, UpdateCellRequest,
};

/// Shared state handed to every handler.
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
}

impl AppState {
    pub fn new(dsn: Option<String>) -> Arc<Self> {
        let events = Arc::new(notebook_core::events::EventBus::new());
        let pools = PoolManager::new();
        let scheduler = Arc::new(Scheduler::new(events, pools));
        if let Some(dsn) = dsn {
            let scheduler = scheduler.clone();
            tokio::spawn(async move {
                scheduler.save_settings(NotebookSettings { dsn: Some(dsn) }).await;
            });
        }
        Arc::new(Self { scheduler })
    }
}

/// Builds the `axum::Router` with every route the server exposes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/notebook", get(get_notebook))
        .route("/notebook/settings", patch(patch_settings))
        .route("/notebook/cells", post(post_cell))
        .route("/notebook/cells/{id}", patch(patch_cell))
        .route("/notebook/cells/{id}", axum::routing::delete(delete_cell))
        .route("/notebook/run", post(post_run))
        .route("/notebook/test-connection", post(post_test_connection))
        .route("/notebook/events", get(get_events))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn get_notebook(State(state): State<Arc<AppState>>) -> Json<NotebookDto> {
    Json(state.scheduler.snapshot().await.into())
}

async fn patch_settings(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SettingsRequest>,
) -> Json<NotebookDto> {
    let notebook = state.scheduler.save_settings(NotebookSettings { dsn: req.dsn }).await;
    Json(notebook.into())
}

async fn post_cell(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCellRequest>,
) -> impl IntoResponse {
    let cell = state.scheduler.create_cell(req.cell_type, req.code).await;
    (StatusCode::OK, Json(crate::protocol::CellDto::from(cell)))
}

async fn patch_cell(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(req): Json<UpdateCellRequest>,
) -> ServerResult<Json<crate::protocol::CellDto>> {
    let cell = state.scheduler.update_cell(CellId(id), req.into()).await?;
    Ok(Json(cell.into()))
}

async fn delete_cell(State(state): State<Arc<AppState>>, Path(id): Path<u64>) -> ServerResult<StatusCode> {
    state.scheduler.delete_cell(CellId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn post_run(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunRequest>,
) -> ServerResult<Json<RunAck>> {
    if state.scheduler.get_cell(req.cell_id).await.is_err() {
        return Err(ServerError::NotFound(format!("cell {} does not exist", req.cell_id)));
    }
    let run_id = state.scheduler.run(req.cell_id).await?;
    Ok(Json(RunAck { run_id }))
}

async fn post_test_connection(State(state): State<Arc<AppState>>) -> Json<TestConnectionResponse> {
    Json(state.scheduler.test_connection().await.into())
}

/// `GET /notebook/events`: SSE stream of the bus's events.
/// Pushes an immediate `notebook_state` snapshot on subscribe, then relays
/// every subsequent published event, surfacing lag as a `transport_error`.
async fn get_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let mut rx = state.scheduler.events().subscribe();
    let initial = Event::NotebookState { notebook: state.scheduler.snapshot().await };

    let stream = async_stream::stream! {
        yield Ok(to_sse(&initial));
        loop {
            match rx.recv().await {
                Ok(event) => yield Ok(to_sse(&event)),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    let notice = Event::TransportError { message: format!("dropped {n} events") };
                    yield Ok(to_sse(&notice));
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn to_sse(event: &Event) -> SseEvent {
    let mut sse = SseEvent::default().event(event.name()).json_data(event).unwrap_or_else(|_| SseEvent::default());
    if let Some(run_id) = event.run_id() {
        sse = sse.id(run_id.to_string());
    }
    sse
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn router() -> Router {
        create_router(AppState::new(None))
    }

    #[tokio::test]
    async fn get_notebook_starts_empty() {
        let response = router().oneshot(Request::get("/notebook").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_then_fetch_cell() {
        let app = router();
        let create = Request::post("/notebook/cells")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"type":"imperative","code":"x = 1"}"#))
            .unwrap();
        let response = app.clone().oneshot(create).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(Request::get("/notebook").body(Body::empty()).unwrap()).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let notebook: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(notebook["cells"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn run_on_unknown_cell_is_404() {
        let app = router();
        let body = Body::from(r#"{"cellId":999}"#);
        let req = Request::post("/notebook/run").header("content-type", "application/json").body(body).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_unknown_cell_is_404() {
        let app = router();
        let response = app.oneshot(Request::delete("/notebook/cells/42").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_connection_without_dsn_reports_error() {
        let app = router();
        let response =
            app.oneshot(Request::post("/notebook/test-connection").body(Body::empty()).unwrap()).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let result: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(result["status"], "error");
    }
}
