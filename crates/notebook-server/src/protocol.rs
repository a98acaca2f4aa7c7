//! Wire DTOs for the HTTP/SSE layer.
//!
//! These mirror the domain model 1:1 — no separate view-model translation
//! beyond `serde` renaming. JSON bodies use `camelCase`, matching the
//! `{cellId}` spelling the run request uses on the wire.

use serde::{Deserialize, Serialize};

use notebook_core::cell::{Cell, CellId, CellPatch, CellStatus, CellType, Notebook, NotebookSettings};

/// A cell as it appears on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellDto {
    pub id: CellId,
    #[serde(rename = "type")]
    pub cell_type: CellType,
    pub code: String,
    pub order: i64,
    pub status: CellStatus,
    pub outputs: Vec<String>,
    pub error: Option<String>,
    pub defs: Vec<String>,
    pub refs: Vec<String>,
}

impl From<Cell> for CellDto {
    fn from(cell: Cell) -> Self {
        Self {
            id: cell.id,
            cell_type: cell.cell_type,
            code: cell.code,
            order: cell.order,
            status: cell.status,
            outputs: cell.outputs,
            error: cell.error,
            defs: cell.defs.into_iter().collect(),
            refs: cell.refs.into_iter().collect(),
        }
    }
}

/// A whole-notebook snapshot as it appears on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookDto {
    pub settings: NotebookSettings,
    pub cells: Vec<CellDto>,
}

impl From<Notebook> for NotebookDto {
    fn from(notebook: Notebook) -> Self {
        Self {
            settings: notebook.settings,
            cells: notebook.cells.into_iter().map(CellDto::from).collect(),
        }
    }
}

/// `PATCH /notebook/settings` request body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRequest {
    pub dsn: Option<String>,
}

/// `POST /notebook/cells` request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCellRequest {
    #[serde(rename = "type")]
    pub cell_type: CellType,
    #[serde(default)]
    pub code: String,
}

/// `PATCH /notebook/cells/{id}` request body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCellRequest {
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub cell_type: Option<CellType>,
    pub order: Option<i64>,
}

impl From<UpdateCellRequest> for CellPatch {
    fn from(req: UpdateCellRequest) -> Self {
        CellPatch { code: req.code, cell_type: req.cell_type, order: req.order }
    }
}

/// `POST /notebook/run` request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub cell_id: CellId,
}

/// `POST /notebook/run` response: the freshly assigned `run_id`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAck {
    pub run_id: u64,
}

/// `POST /notebook/test-connection` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionResponse {
    pub status: &'static str,
    pub message: String,
}

impl From<notebook_core::pool::ConnectionTest> for TestConnectionResponse {
    fn from(result: notebook_core::pool::ConnectionTest) -> Self {
        Self { status: if result.ok { "success" } else { "error" }, message: result.message }
    }
}
