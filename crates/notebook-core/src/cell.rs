//! The notebook's data model: cells, settings, and the notebook as a whole.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Opaque unique cell identifier, assigned on creation, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(pub u64);

impl CellId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The language a cell's source is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellType {
    Imperative,
    Query,
}

/// A cell's last-known execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    #[default]
    Idle,
    Running,
    Success,
    Error,
}

/// A single cell: language tag, source, last outputs, and status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    #[serde(rename = "type")]
    pub cell_type: CellType,
    pub code: String,
    /// Display order; ties broken by `id`. Never used to imply execution order.
    pub order: i64,
    pub status: CellStatus,
    pub outputs: Vec<String>,
    pub error: Option<String>,
    /// Names defined at the cell's top level, from the last successful analysis.
    pub defs: BTreeSet<String>,
    /// Free names referenced by the cell, from the last successful analysis.
    pub refs: BTreeSet<String>,
}

impl Cell {
    pub fn new(id: CellId, cell_type: CellType, code: String, order: i64) -> Self {
        Self {
            id,
            cell_type,
            code,
            order,
            status: CellStatus::Idle,
            outputs: Vec::new(),
            error: None,
            defs: BTreeSet::new(),
            refs: BTreeSet::new(),
        }
    }

    /// `(order, id)` sort key used everywhere display order or tie-breaking is needed.
    pub fn sort_key(&self) -> (i64, u64) {
        (self.order, self.id.0)
    }
}

/// Notebook-wide settings. Only the query backend's DSN is runtime-configurable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotebookSettings {
    pub dsn: Option<String>,
}

/// A patch applied to an existing cell's mutable fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CellPatch {
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub cell_type: Option<CellType>,
    pub order: Option<i64>,
}

/// `(settings, ordered list of cells)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notebook {
    pub settings: NotebookSettings,
    pub cells: Vec<Cell>,
}
