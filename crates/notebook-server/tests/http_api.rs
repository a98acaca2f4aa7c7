//! End-to-end HTTP API tests: drives the notebook engine entirely through
//! the `axum::Router`.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use notebook_server::routes::AppState;
use notebook_server::create_router;

fn app() -> axum::Router {
    create_router(AppState::new(None))
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn create_cell(app: &axum::Router, code: &str) -> Value {
    let req = Request::post("/notebook/cells")
        .header("content-type", "application/json")
        .body(Body::from(json!({"type": "imperative", "code": code}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await
}

async fn run_cell(app: &axum::Router, cell_id: u64) -> Value {
    let req = Request::post("/notebook/run")
        .header("content-type", "application/json")
        .body(Body::from(json!({"cellId": cell_id}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await
}

async fn get_notebook(app: &axum::Router) -> Value {
    let response = app.clone().oneshot(Request::get("/notebook").body(Body::empty()).unwrap()).await.unwrap();
    json_body(response).await
}

fn cell_by_id<'a>(notebook: &'a Value, id: u64) -> &'a Value {
    notebook["cells"].as_array().unwrap().iter().find(|c| c["id"] == id).unwrap()
}

#[tokio::test]
async fn cascade_scenario_over_http() {
    let app = app();
    let a = create_cell(&app, "x = 10").await;
    let b = create_cell(&app, "y = x + 5").await;
    let c = create_cell(&app, "z = y * 2").await;
    run_cell(&app, a["id"].as_u64().unwrap()).await;

    let patch = Request::patch(format!("/notebook/cells/{}", a["id"]))
        .header("content-type", "application/json")
        .body(Body::from(json!({"code": "x = 20"}).to_string()))
        .unwrap();
    app.clone().oneshot(patch).await.unwrap();
    run_cell(&app, a["id"].as_u64().unwrap()).await;

    let notebook = get_notebook(&app).await;
    for cell in [&a, &b, &c] {
        assert_eq!(cell_by_id(&notebook, cell["id"].as_u64().unwrap())["status"], "success");
    }
}

#[tokio::test]
async fn duplicate_definition_marks_both_cells_over_http() {
    let app = app();
    let a = create_cell(&app, "x = 1").await;
    let b = create_cell(&app, "x = 2").await;
    run_cell(&app, a["id"].as_u64().unwrap()).await;

    let notebook = get_notebook(&app).await;
    let ca = cell_by_id(&notebook, a["id"].as_u64().unwrap());
    let cb = cell_by_id(&notebook, b["id"].as_u64().unwrap());
    assert_eq!(ca["status"], "error");
    assert_eq!(cb["status"], "error");
    assert!(ca["error"].as_str().unwrap().contains("duplicate definition"));
}

#[tokio::test]
async fn skip_closure_over_http() {
    let app = app();
    let a = create_cell(&app, "x = 5").await;
    let b = create_cell(&app, "y = x + 5").await;
    let c = create_cell(&app, "z = y * 2").await;
    run_cell(&app, a["id"].as_u64().unwrap()).await;

    app.clone()
        .oneshot(Request::delete(format!("/notebook/cells/{}", a["id"])).body(Body::empty()).unwrap())
        .await
        .unwrap();
    run_cell(&app, b["id"].as_u64().unwrap()).await;

    let notebook = get_notebook(&app).await;
    assert_eq!(cell_by_id(&notebook, b["id"].as_u64().unwrap())["status"], "error");
    let cc = cell_by_id(&notebook, c["id"].as_u64().unwrap());
    assert_eq!(cc["status"], "idle");
    assert!(cc["error"].is_null());
}

#[tokio::test]
async fn settings_roundtrip_and_test_connection() {
    let app = app();
    let patch = Request::patch("/notebook/settings")
        .header("content-type", "application/json")
        .body(Body::from(json!({"dsn": "sqlite::memory:"}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(patch).await.unwrap();
    let notebook = json_body(response).await;
    assert_eq!(notebook["settings"]["dsn"], "sqlite::memory:");

    let response = app
        .clone()
        .oneshot(Request::post("/notebook/test-connection").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let result = json_body(response).await;
    assert!(result["status"] == "success" || result["status"] == "error");
}

#[tokio::test]
async fn creating_a_query_cell_round_trips_placeholders() {
    let app = app();
    let cell = create_cell_of_type(&app, "query", "SELECT * FROM users WHERE id = {{user_id}}").await;
    assert_eq!(cell["refs"].as_array().unwrap().len(), 0);
    assert_eq!(cell["type"], "query");

    let notebook = get_notebook(&app).await;
    assert_eq!(notebook["cells"].as_array().unwrap().len(), 1);
}

async fn create_cell_of_type(app: &axum::Router, kind: &str, code: &str) -> Value {
    let req = Request::post("/notebook/cells")
        .header("content-type", "application/json")
        .body(Body::from(json!({"type": kind, "code": code}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    json_body(response).await
}
