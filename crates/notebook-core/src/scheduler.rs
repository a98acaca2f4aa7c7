//! The scheduler: orchestrates a *run* — re-analyze, rebuild the graph,
//! compute the impacted set, order it, clear stale defs, execute cells,
//! propagate skip-on-failure, and emit events. Also exposes the simple
//! repository passthroughs that publish a fresh `notebook_state` event.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::analyze;
use crate::cell::{Cell, CellId, CellPatch, CellStatus, CellType, Notebook, NotebookSettings};
use crate::error::{Error, Result};
use crate::events::{Event, EventBus};
use crate::execute::{self, ImperativeOutcome};
use crate::graph::DependencyGraph;
use crate::pool::{ConnectionTest, PoolManager};
use crate::repository::Repository;
use crate::value::SharedNamespace;

struct SchedulerState {
    repository: Repository,
    namespace: SharedNamespace,
}

/// Orchestrates runs over an in-memory notebook. Owns the repository and the
/// shared namespace behind one exclusive async lock, so REST handlers that
/// mutate-then-emit serialize with runs.
pub struct Scheduler {
    state: Mutex<SchedulerState>,
    events: Arc<EventBus>,
    pools: Arc<PoolManager>,
    next_run_id: AtomicU64,
}

impl Scheduler {
    pub fn new(events: Arc<EventBus>, pools: Arc<PoolManager>) -> Self {
        Self {
            state: Mutex::new(SchedulerState { repository: Repository::new(), namespace: SharedNamespace::new() }),
            events,
            pools,
            next_run_id: AtomicU64::new(1),
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub async fn snapshot(&self) -> Notebook {
        self.state.lock().await.repository.snapshot()
    }

    pub async fn get_cell(&self, id: CellId) -> Result<Cell> {
        self.state.lock().await.repository.get_cell(id)
    }

    pub async fn create_cell(&self, cell_type: CellType, code: String) -> Cell {
        let mut state = self.state.lock().await;
        let cell = state.repository.insert_cell(cell_type, code);
        self.publish_notebook_state(&state);
        cell
    }

    pub async fn update_cell(&self, id: CellId, patch: CellPatch) -> Result<Cell> {
        let mut state = self.state.lock().await;
        let cell = state.repository.update_cell(id, patch)?;
        self.publish_notebook_state(&state);
        Ok(cell)
    }

    /// Deletes a cell and, per invariant 6, removes its last-known defs from
    /// the namespace before any subsequent run.
    pub async fn delete_cell(&self, id: CellId) -> Result<()> {
        let mut state = self.state.lock().await;
        let defs = state.repository.delete_cell(id)?;
        state.namespace.remove_all(&defs);
        self.publish_notebook_state(&state);
        Ok(())
    }

    pub async fn save_settings(&self, settings: NotebookSettings) -> Notebook {
        let mut state = self.state.lock().await;
        let previous_dsn = state.repository.get_settings().dsn;
        state.repository.put_settings(settings.clone());
        self.publish_notebook_state(&state);
        if previous_dsn != settings.dsn {
            if let Some(dsn) = previous_dsn {
                self.pools.invalidate(&dsn).await;
            }
        }
        state.repository.snapshot()
    }

    pub async fn test_connection(&self) -> ConnectionTest {
        let dsn = { self.state.lock().await.repository.get_settings().dsn };
        match dsn {
            Some(dsn) => self.pools.test(&dsn).await,
            None => ConnectionTest { ok: false, message: "no DSN configured".to_string() },
        }
    }

    fn publish_notebook_state(&self, state: &tokio::sync::MutexGuard<'_, SchedulerState>) {
        self.events.publish(Event::NotebookState { notebook: state.repository.snapshot() });
    }

    /// Runs the scheduler's 8-step sequence for `trigger`, returning the
    /// freshly assigned `run_id`.
    #[tracing::instrument(name = "run", skip(self), fields(run_id = tracing::field::Empty, trigger = %trigger))]
    pub async fn run(&self, trigger: CellId) -> Result<u64> {
        // Step 1: acquire the run lock; assign a monotonically increasing run_id.
        let mut state = self.state.lock().await;
        let run_id = self.next_run_id.fetch_add(1, Ordering::SeqCst);
        tracing::Span::current().record("run_id", run_id);
        self.events.publish(Event::RunStarted { run_id, trigger });

        // Step 2: re-analyze every cell, writing refreshed (defs, refs) back.
        // The defs captured here are the *previously-known* ones, from before
        // re-analysis overwrites them — step 5 clears these, not the fresh
        // ones, so renaming a def doesn't orphan its old name in the namespace.
        let old_defs: HashMap<CellId, BTreeSet<String>> =
            state.repository.list_cells().into_iter().map(|c| (c.id, c.defs)).collect();
        for cell in state.repository.list_cells() {
            let (defs, refs) = analyze::analyze(cell.cell_type, &cell.code);
            state.repository.set_analysis(cell.id, defs, refs)?;
        }
        let cells = state.repository.list_cells();

        // Step 3: rebuild the graph. Duplicate-definition or cycle errors end the run here.
        let duplicates = crate::graph::duplicate_definitions(&cells);
        if !duplicates.is_empty() {
            for dup in &duplicates {
                for &cell_id in &dup.cells {
                    let others: Vec<String> =
                        dup.cells.iter().filter(|&&id| id != cell_id).map(|id| id.to_string()).collect();
                    let message = Error::DuplicateDefinition { name: dup.name.clone(), other: others.join(", ") }.to_string();
                    self.fail_cell_for_graph_error(&mut state, run_id, cell_id, message);
                }
            }
            self.events.publish(Event::RunFinished { run_id, trigger });
            self.publish_notebook_state(&state);
            return Ok(run_id);
        }

        let dep_graph = DependencyGraph::build(&cells);
        let cycles = dep_graph.cycles();
        if !cycles.is_empty() {
            for cycle in &cycles {
                let members: Vec<String> = cycle.iter().map(CellId::to_string).collect();
                let message = Error::Cycle { members: members.clone() }.to_string();
                for &cell_id in cycle {
                    self.fail_cell_for_graph_error(&mut state, run_id, cell_id, message.clone());
                }
            }
            self.events.publish(Event::RunFinished { run_id, trigger });
            self.publish_notebook_state(&state);
            return Ok(run_id);
        }

        // Step 4: compute the impacted set, ordered with (order, id) tie-breaks.
        let impacted = dep_graph.descendants(trigger);
        let order_of: HashMap<CellId, i64> = cells.iter().map(|c| (c.id, c.order)).collect();
        let ordered = dep_graph
            .topological_order(&impacted, &order_of)
            .map_err(|unresolved| Error::Cycle { members: unresolved.iter().map(CellId::to_string).collect() })?;
        let cell_by_id: HashMap<CellId, Cell> = cells.into_iter().map(|c| (c.id, c)).collect();

        // Step 5: clear stale names for every impacted cell (covers the trigger too).
        // Uses each cell's previously-known defs (from before step 2's
        // re-analysis), per spec.md's "delete its previously-known defs" —
        // not the cell's freshly re-analyzed defs, which may have renamed
        // away from the name actually bound in the namespace.
        for id in &ordered {
            if let Some(defs) = old_defs.get(id) {
                state.namespace.remove_all(defs);
            }
        }

        // Step 6: execute in order, propagating skip-on-failure.
        let mut failed: HashSet<CellId> = HashSet::new();
        let dsn = state.repository.get_settings().dsn;
        for id in ordered {
            let cell = cell_by_id.get(&id).expect("ordered id came from cell_by_id").clone();

            if dep_graph.ancestors(id).iter().any(|ancestor| failed.contains(ancestor)) {
                state.repository.set_skipped(id)?;
                self.events.publish(Event::CellStatus { run_id, cell_id: id, status: CellStatus::Idle });
                continue;
            }

            state.repository.set_status(id, CellStatus::Running)?;
            self.events.publish(Event::CellStatus { run_id, cell_id: id, status: CellStatus::Running });

            match cell.cell_type {
                CellType::Imperative => {
                    self.run_imperative_cell(&mut state, run_id, &cell, &mut failed).await?;
                }
                CellType::Query => {
                    self.run_query_cell(&mut state, run_id, &cell, dsn.as_deref(), &mut failed).await?;
                }
            }
        }

        // Step 7: emit run_finished.
        self.events.publish(Event::RunFinished { run_id, trigger });
        self.publish_notebook_state(&state);
        Ok(run_id)
        // Step 8: the run lock releases when `state` drops at the end of this scope.
    }

    fn fail_cell_for_graph_error(
        &self,
        state: &mut tokio::sync::MutexGuard<'_, SchedulerState>,
        run_id: u64,
        cell_id: CellId,
        message: String,
    ) {
        if state.repository.set_error(cell_id, message.clone()).is_ok() {
            self.events.publish(Event::CellStatus { run_id, cell_id, status: CellStatus::Error });
            self.events.publish(Event::CellError { run_id, cell_id, error: message });
        }
    }

    #[tracing::instrument(name = "cell", skip(self, state, cell, failed), fields(cell_id = %cell.id, kind = ?cell.cell_type))]
    async fn run_imperative_cell(
        &self,
        state: &mut tokio::sync::MutexGuard<'_, SchedulerState>,
        run_id: u64,
        cell: &Cell,
        failed: &mut HashSet<CellId>,
    ) -> Result<()> {
        let snapshot = state.namespace.snapshot();
        let outcome = execute::execute_imperative(cell.code.clone(), snapshot, execute::DEFAULT_TIMEOUT).await;
        match outcome {
            ImperativeOutcome::Success(success) => {
                for name in &cell.defs {
                    if let Some(value) = success.namespace.get(name) {
                        state.namespace.set(name.clone(), value.clone());
                    }
                }
                state.repository.set_success(cell.id, success.outputs.clone())?;
                self.events.publish(Event::CellOutput { run_id, cell_id: cell.id, outputs: success.outputs });
                self.events.publish(Event::CellStatus { run_id, cell_id: cell.id, status: CellStatus::Success });
            }
            ImperativeOutcome::Failure(message) => {
                self.mark_cell_failed(state, run_id, cell, message, failed)?;
            }
            ImperativeOutcome::Timeout => {
                self.mark_cell_failed(state, run_id, cell, Error::Timeout.to_string(), failed)?;
            }
        }
        Ok(())
    }

    #[tracing::instrument(name = "cell", skip(self, state, cell, dsn, failed), fields(cell_id = %cell.id, kind = ?cell.cell_type))]
    async fn run_query_cell(
        &self,
        state: &mut tokio::sync::MutexGuard<'_, SchedulerState>,
        run_id: u64,
        cell: &Cell,
        dsn: Option<&str>,
        failed: &mut HashSet<CellId>,
    ) -> Result<()> {
        let ns_snapshot = state.namespace.snapshot();
        let lookup = move |name: &str| ns_snapshot.get(name).cloned();
        let result = execute::execute_query(&cell.code, &lookup, dsn, &self.pools, execute::DEFAULT_TIMEOUT).await;
        match result {
            Ok(success) => {
                state.repository.set_success(cell.id, success.outputs.clone())?;
                self.events.publish(Event::CellOutput { run_id, cell_id: cell.id, outputs: success.outputs });
                self.events.publish(Event::CellStatus { run_id, cell_id: cell.id, status: CellStatus::Success });
                Ok(())
            }
            Err(e) => self.mark_cell_failed(state, run_id, cell, e.to_string(), failed),
        }
    }

    fn mark_cell_failed(
        &self,
        state: &mut tokio::sync::MutexGuard<'_, SchedulerState>,
        run_id: u64,
        cell: &Cell,
        message: String,
        failed: &mut HashSet<CellId>,
    ) -> Result<()> {
        state.repository.set_error(cell.id, message.clone())?;
        state.namespace.remove_all(&cell.defs);
        failed.insert(cell.id);
        self.events.publish(Event::CellError { run_id, cell_id: cell.id, error: message });
        self.events.publish(Event::CellStatus { run_id, cell_id: cell.id, status: CellStatus::Error });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_scheduler() -> Scheduler {
        Scheduler::new(Arc::new(EventBus::new()), PoolManager::new())
    }

    #[tokio::test]
    async fn cascade_scenario_recomputes_dependents() {
        let sched = new_scheduler();
        let a = sched.create_cell(CellType::Imperative, "x = 10".to_string()).await;
        let b = sched.create_cell(CellType::Imperative, "y = x + 5".to_string()).await;
        let c = sched.create_cell(CellType::Imperative, "z = y * 2".to_string()).await;
        sched.run(a.id).await.unwrap();

        sched.update_cell(a.id, CellPatch { code: Some("x = 20".to_string()), ..Default::default() }).await.unwrap();
        sched.run(a.id).await.unwrap();

        let notebook = sched.snapshot().await;
        let get = |id: CellId| notebook.cells.iter().find(|cell| cell.id == id).unwrap().clone();
        assert_eq!(get(a.id).status, CellStatus::Success);
        assert_eq!(get(b.id).status, CellStatus::Success);
        assert_eq!(get(c.id).status, CellStatus::Success);
    }

    #[tokio::test]
    async fn independent_branch_is_untouched_by_a_failing_sibling() {
        let sched = new_scheduler();
        let a = sched.create_cell(CellType::Imperative, "x = 1".to_string()).await;
        let b = sched.create_cell(CellType::Imperative, "y = undefined_name".to_string()).await;
        let c = sched.create_cell(CellType::Imperative, "w = 100".to_string()).await;
        sched.run(a.id).await.unwrap();
        sched.run(c.id).await.unwrap();
        sched.run(b.id).await.unwrap();

        let notebook = sched.snapshot().await;
        let get = |id: CellId| notebook.cells.iter().find(|cell| cell.id == id).unwrap().clone();
        assert_eq!(get(b.id).status, CellStatus::Error);
        assert_eq!(get(c.id).status, CellStatus::Success);
    }

    #[tokio::test]
    async fn skip_closure_resets_descendants_of_a_failed_ancestor() {
        let sched = new_scheduler();
        let a = sched.create_cell(CellType::Imperative, "x = 5".to_string()).await;
        let b = sched.create_cell(CellType::Imperative, "y = x + 5".to_string()).await;
        let c = sched.create_cell(CellType::Imperative, "z = y * 2".to_string()).await;
        let d = sched.create_cell(CellType::Imperative, "w = 100".to_string()).await;
        sched.run(a.id).await.unwrap();
        assert_eq!(sched.get_cell(d.id).await.unwrap().status, CellStatus::Success);

        sched.delete_cell(a.id).await.unwrap();
        sched.run(b.id).await.unwrap();

        let notebook = sched.snapshot().await;
        let get = |id: CellId| notebook.cells.iter().find(|cell| cell.id == id).unwrap().clone();
        assert_eq!(get(b.id).status, CellStatus::Error);
        assert_eq!(get(c.id).status, CellStatus::Idle);
        assert!(get(c.id).error.is_none());
        assert_eq!(get(d.id).status, CellStatus::Success);
    }

    #[tokio::test]
    async fn renaming_a_def_orphans_the_old_name_from_the_namespace() {
        let sched = new_scheduler();
        let a = sched.create_cell(CellType::Imperative, "x = 10".to_string()).await;
        sched.run(a.id).await.unwrap();

        sched.update_cell(a.id, CellPatch { code: Some("q = 20".to_string()), ..Default::default() }).await.unwrap();
        sched.run(a.id).await.unwrap();

        // A probe cell created after the rename sees the shared namespace as
        // it stands post-run: `x` must be gone, not still bound to its stale
        // value from before the rename.
        let probe = sched.create_cell(CellType::Imperative, "w = x".to_string()).await;
        sched.run(probe.id).await.unwrap();

        let notebook = sched.snapshot().await;
        let get = |id: CellId| notebook.cells.iter().find(|cell| cell.id == id).unwrap().clone();
        assert_eq!(get(a.id).status, CellStatus::Success);
        assert_eq!(get(probe.id).status, CellStatus::Error);
        assert!(get(probe.id).error.unwrap().contains('x'));
    }

    #[tokio::test]
    async fn duplicate_definition_marks_both_cells() {
        let sched = new_scheduler();
        let a = sched.create_cell(CellType::Imperative, "x = 1".to_string()).await;
        let b = sched.create_cell(CellType::Imperative, "x = 2".to_string()).await;
        sched.run(a.id).await.unwrap();

        let notebook = sched.snapshot().await;
        let get = |id: CellId| notebook.cells.iter().find(|cell| cell.id == id).unwrap().clone();
        assert_eq!(get(a.id).status, CellStatus::Error);
        assert_eq!(get(b.id).status, CellStatus::Error);
        assert!(get(a.id).error.unwrap().contains("duplicate definition of 'x'"));
    }
}
