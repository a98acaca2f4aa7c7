//! In-memory ordered collection of cells plus notebook settings.
//!
//! All operations are synchronous and complete atomically with respect to one
//! another; the repository is the single source of truth for persisted
//! fields. No transaction API is exposed — callers serialize writes via the
//! scheduler's run lock.

use std::collections::BTreeSet;

use crate::cell::{Cell, CellId, CellPatch, CellType, Notebook, NotebookSettings};
use crate::error::{Error, Result};

/// In-process cell store. Cell ids are monotonically increasing and never
/// reused after deletion.
#[derive(Debug, Default)]
pub struct Repository {
    cells: Vec<Cell>,
    settings: NotebookSettings,
    next_id: u64,
}

impl Repository {
    pub fn new() -> Self {
        Self {
            cells: Vec::new(),
            settings: NotebookSettings::default(),
            next_id: 1,
        }
    }

    /// Cells in stable `(order, id)` order.
    pub fn list_cells(&self) -> Vec<Cell> {
        let mut cells = self.cells.clone();
        cells.sort_by_key(Cell::sort_key);
        cells
    }

    pub fn get_cell(&self, id: CellId) -> Result<Cell> {
        self.cells
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| Error::CellNotFound(id.to_string()))
    }

    fn position(&self, id: CellId) -> Result<usize> {
        self.cells
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| Error::CellNotFound(id.to_string()))
    }

    /// Insert a new cell; assigns a fresh id and `order = max(existing) + 1`.
    pub fn insert_cell(&mut self, cell_type: CellType, code: String) -> Cell {
        let id = CellId(self.next_id);
        self.next_id += 1;
        let order = self.cells.iter().map(|c| c.order).max().unwrap_or(0) + 1;
        let cell = Cell::new(id, cell_type, code, order);
        self.cells.push(cell.clone());
        cell
    }

    pub fn update_cell(&mut self, id: CellId, patch: CellPatch) -> Result<Cell> {
        let idx = self.position(id)?;
        let cell = &mut self.cells[idx];
        if let Some(code) = patch.code {
            cell.code = code;
        }
        if let Some(cell_type) = patch.cell_type {
            cell.cell_type = cell_type;
        }
        if let Some(order) = patch.order {
            cell.order = order;
        }
        Ok(cell.clone())
    }

    /// Write refreshed analysis results back onto a cell.
    pub fn set_analysis(&mut self, id: CellId, defs: BTreeSet<String>, refs: BTreeSet<String>) -> Result<()> {
        let idx = self.position(id)?;
        self.cells[idx].defs = defs;
        self.cells[idx].refs = refs;
        Ok(())
    }

    pub fn set_status(&mut self, id: CellId, status: crate::cell::CellStatus) -> Result<()> {
        let idx = self.position(id)?;
        self.cells[idx].status = status;
        Ok(())
    }

    pub fn set_success(&mut self, id: CellId, outputs: Vec<String>) -> Result<()> {
        let idx = self.position(id)?;
        let cell = &mut self.cells[idx];
        cell.outputs = outputs;
        cell.error = None;
        cell.status = crate::cell::CellStatus::Success;
        Ok(())
    }

    pub fn set_error(&mut self, id: CellId, message: String) -> Result<()> {
        let idx = self.position(id)?;
        let cell = &mut self.cells[idx];
        cell.outputs = Vec::new();
        cell.error = Some(message);
        cell.status = crate::cell::CellStatus::Error;
        Ok(())
    }

    /// Reset to idle with no error, used when skipping a cell with a failed ancestor.
    pub fn set_skipped(&mut self, id: CellId) -> Result<()> {
        let idx = self.position(id)?;
        let cell = &mut self.cells[idx];
        cell.outputs = Vec::new();
        cell.error = None;
        cell.status = crate::cell::CellStatus::Idle;
        Ok(())
    }

    /// Delete a cell, returning its last-known `defs` so the caller can clear them
    /// from the shared namespace.
    pub fn delete_cell(&mut self, id: CellId) -> Result<BTreeSet<String>> {
        let idx = self.position(id)?;
        let cell = self.cells.remove(idx);
        Ok(cell.defs)
    }

    pub fn get_settings(&self) -> NotebookSettings {
        self.settings.clone()
    }

    pub fn put_settings(&mut self, settings: NotebookSettings) {
        self.settings = settings;
    }

    pub fn snapshot(&self) -> Notebook {
        Notebook {
            settings: self.get_settings(),
            cells: self.list_cells(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_assigns_fresh_ids_and_increasing_order() {
        let mut repo = Repository::new();
        let a = repo.insert_cell(CellType::Imperative, "x = 1".into());
        let b = repo.insert_cell(CellType::Imperative, "y = 2".into());
        assert_ne!(a.id, b.id);
        assert!(b.order > a.order);
    }

    #[test]
    fn list_cells_orders_by_order_then_id() {
        let mut repo = Repository::new();
        let a = repo.insert_cell(CellType::Imperative, "a".into());
        let b = repo.insert_cell(CellType::Imperative, "b".into());
        repo.update_cell(
            a.id,
            CellPatch {
                order: Some(b.order + 1),
                ..Default::default()
            },
        )
        .unwrap();
        let listed = repo.list_cells();
        assert_eq!(listed[0].id, b.id);
        assert_eq!(listed[1].id, a.id);
    }

    #[test]
    fn delete_returns_defs_for_namespace_cleanup() {
        let mut repo = Repository::new();
        let a = repo.insert_cell(CellType::Imperative, "x = 1".into());
        repo.set_analysis(a.id, BTreeSet::from(["x".to_string()]), BTreeSet::new())
            .unwrap();
        let defs = repo.delete_cell(a.id).unwrap();
        assert!(defs.contains("x"));
        assert!(repo.get_cell(a.id).is_err());
    }

    #[test]
    fn get_cell_missing_is_cell_not_found() {
        let repo = Repository::new();
        let err = repo.get_cell(CellId(999)).unwrap_err();
        matches!(err, Error::CellNotFound(_));
    }
}
