//! Reactive computation engine for a two-language notebook.
//!
//! This crate holds the server-side reactive execution subsystem: symbolic
//! analysis of cell bodies, the cell dependency graph, the scheduler that
//! orchestrates re-execution of the impacted subgraph with failure-skip
//! semantics, the two executors (imperative interpreter, query engine), and
//! the event bus that fans out per-run progress. It has no HTTP surface of
//! its own — see `notebook-server` for that.

pub mod analyze;
pub mod cell;
pub mod error;
pub mod events;
pub mod execute;
pub mod graph;
pub mod lang;
pub mod pool;
pub mod repository;
pub mod scheduler;
pub mod value;

pub use cell::{Cell, CellId, CellPatch, CellStatus, CellType, Notebook, NotebookSettings};
pub use error::{Error, Result};
pub use events::{Event, EventBus};
pub use graph::DependencyGraph;
pub use pool::PoolManager;
pub use repository::Repository;
pub use scheduler::Scheduler;
pub use value::{SharedNamespace, Value};
