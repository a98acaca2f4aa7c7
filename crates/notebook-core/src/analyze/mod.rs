//! Pure analyzers: given a cell body, return `(defs, refs)` for its language.

pub mod imperative;
pub mod query;

use std::collections::BTreeSet;

use crate::cell::CellType;

/// Dispatches to the analyzer matching a cell's language.
pub fn analyze(cell_type: CellType, code: &str) -> (BTreeSet<String>, BTreeSet<String>) {
    match cell_type {
        CellType::Imperative => imperative::analyze(code),
        CellType::Query => query::analyze(code),
    }
}
