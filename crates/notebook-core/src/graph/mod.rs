//! The cell-level dependency graph: adjacency from `(defs, refs)` across
//! cells, descendant computation, topological ordering with tie-breaks, and
//! cycle / duplicate-definition detection.
//!
//! Built on `petgraph::graph::DiGraph`. The topological sort is hand-rolled
//! Kahn's algorithm rather than `petgraph::algo::toposort`, because the
//! `(order, id)` tie-break among
//! ready nodes picks *which* ready node to emit next, not merely whether a
//! valid order exists. Whole-notebook cycle detection uses
//! `petgraph::algo::kosaraju_scc`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::algo::kosaraju_scc;
use petgraph::Direction;
use rustc_hash::FxHashMap;

use crate::cell::{Cell, CellId};

/// A name defined by more than one cell at once.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub name: String,
    pub cells: Vec<CellId>,
}

/// Finds every name bound in more than one cell's `defs`.
pub fn duplicate_definitions(cells: &[Cell]) -> Vec<DuplicateGroup> {
    let mut owners: BTreeMap<String, Vec<CellId>> = BTreeMap::new();
    for cell in cells {
        for name in &cell.defs {
            owners.entry(name.clone()).or_default().push(cell.id);
        }
    }
    owners
        .into_iter()
        .filter(|(_, cells)| cells.len() > 1)
        .map(|(name, cells)| DuplicateGroup { name, cells })
        .collect()
}

/// The ephemeral per-run dependency graph: edge `A -> B` means "B refs a name
/// A defs".
pub struct DependencyGraph {
    graph: DiGraph<CellId, ()>,
    index_of: FxHashMap<CellId, NodeIndex>,
}

impl DependencyGraph {
    /// Builds the graph from cells whose `defs` are already known to be
    /// pairwise disjoint (callers run [`duplicate_definitions`] first).
    /// An unresolved ref (no cell defines it) is not a build error — it
    /// simply produces no edge, surfacing instead at execution time.
    pub fn build(cells: &[Cell]) -> Self {
        let mut graph = DiGraph::new();
        let mut index_of = FxHashMap::default();
        for cell in cells {
            let idx = graph.add_node(cell.id);
            index_of.insert(cell.id, idx);
        }

        let mut def_owner: FxHashMap<&str, CellId> = FxHashMap::default();
        for cell in cells {
            for name in &cell.defs {
                def_owner.insert(name.as_str(), cell.id);
            }
        }

        for cell in cells {
            for r in &cell.refs {
                if let Some(&owner) = def_owner.get(r.as_str()) {
                    if owner != cell.id {
                        let a = index_of[&owner];
                        let b = index_of[&cell.id];
                        graph.update_edge(a, b, ());
                    }
                }
            }
        }

        Self { graph, index_of }
    }

    /// Every cycle in the whole-notebook graph (an SCC of size > 1, or a
    /// self-loop). Returned as groups of participating cell ids.
    pub fn cycles(&self) -> Vec<Vec<CellId>> {
        kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .map(|scc| scc.into_iter().map(|idx| self.graph[idx]).collect())
            .collect()
    }

    /// BFS over forward edges from `trigger`, inclusive of `trigger` itself.
    pub fn descendants(&self, trigger: CellId) -> BTreeSet<CellId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![trigger];
        seen.insert(trigger);
        while let Some(id) = stack.pop() {
            if let Some(&idx) = self.index_of.get(&id) {
                for neighbor in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                    let nid = self.graph[neighbor];
                    if seen.insert(nid) {
                        stack.push(nid);
                    }
                }
            }
        }
        seen
    }

    /// BFS over incoming edges from `id`, exclusive of `id` itself — the
    /// transitive ancestor set used by the scheduler's failed-ancestor check.
    pub fn ancestors(&self, id: CellId) -> BTreeSet<CellId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if let Some(&idx) = self.index_of.get(&cur) {
                for neighbor in self.graph.neighbors_directed(idx, Direction::Incoming) {
                    let nid = self.graph[neighbor];
                    if seen.insert(nid) {
                        stack.push(nid);
                    }
                }
            }
        }
        seen
    }

    /// Stable Kahn-style topological sort restricted to `nodes`, tie-broken
    /// by `(order, id)` among ready nodes so results are deterministic. A
    /// cycle within the restricted set leaves some nodes unreachable; their
    /// ids are returned as the `Err` case.
    pub fn topological_order(
        &self,
        nodes: &BTreeSet<CellId>,
        order_of: &HashMap<CellId, i64>,
    ) -> Result<Vec<CellId>, Vec<CellId>> {
        let mut indegree: HashMap<CellId, usize> = nodes.iter().map(|&id| (id, 0)).collect();
        for &id in nodes {
            let Some(&idx) = self.index_of.get(&id) else { continue };
            for neighbor in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                let nid = self.graph[neighbor];
                if let Some(d) = indegree.get_mut(&nid) {
                    *d += 1;
                }
            }
        }

        let mut ready: BTreeSet<(i64, u64, CellId)> = BTreeSet::new();
        for &id in nodes {
            if indegree[&id] == 0 {
                ready.insert((order_of.get(&id).copied().unwrap_or(0), id.get(), id));
            }
        }

        let mut result = Vec::with_capacity(nodes.len());
        while let Some(&key) = ready.iter().next() {
            ready.remove(&key);
            let id = key.2;
            result.push(id);
            let Some(&idx) = self.index_of.get(&id) else { continue };
            for neighbor in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                let nid = self.graph[neighbor];
                if let Some(d) = indegree.get_mut(&nid) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert((order_of.get(&nid).copied().unwrap_or(0), nid.get(), nid));
                    }
                }
            }
        }

        if result.len() == nodes.len() {
            Ok(result)
        } else {
            let done: BTreeSet<CellId> = result.into_iter().collect();
            Err(nodes.difference(&done).copied().collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellType;
    use std::collections::BTreeSet as Set;

    fn cell(id: u64, order: i64, defs: &[&str], refs: &[&str]) -> Cell {
        let mut c = Cell::new(CellId(id), CellType::Imperative, String::new(), order);
        c.defs = defs.iter().map(|s| s.to_string()).collect();
        c.refs = refs.iter().map(|s| s.to_string()).collect();
        c
    }

    #[test]
    fn linear_chain_descendants_and_order() {
        let cells = vec![
            cell(1, 0, &["x"], &[]),
            cell(2, 1, &["y"], &["x"]),
            cell(3, 2, &["z"], &["y"]),
        ];
        let g = DependencyGraph::build(&cells);
        let desc = g.descendants(CellId(1));
        assert_eq!(desc, Set::from([CellId(1), CellId(2), CellId(3)]));

        let order_of: HashMap<CellId, i64> = cells.iter().map(|c| (c.id, c.order)).collect();
        let order = g.topological_order(&desc, &order_of).unwrap();
        assert_eq!(order, vec![CellId(1), CellId(2), CellId(3)]);
    }

    #[test]
    fn diamond_dependency_respects_edges() {
        let cells = vec![
            cell(1, 0, &["a"], &[]),
            cell(2, 1, &["b"], &["a"]),
            cell(3, 2, &["c"], &["a"]),
            cell(4, 3, &["d"], &["b", "c"]),
        ];
        let g = DependencyGraph::build(&cells);
        let order_of: HashMap<CellId, i64> = cells.iter().map(|c| (c.id, c.order)).collect();
        let all: Set<CellId> = cells.iter().map(|c| c.id).collect();
        let order = g.topological_order(&all, &order_of).unwrap();
        let pos = |id: CellId| order.iter().position(|&x| x == id).unwrap();
        assert!(pos(CellId(1)) < pos(CellId(2)));
        assert!(pos(CellId(1)) < pos(CellId(3)));
        assert!(pos(CellId(2)) < pos(CellId(4)));
        assert!(pos(CellId(3)) < pos(CellId(4)));
    }

    #[test]
    fn cycle_detection_flags_participants() {
        let cells = vec![cell(1, 0, &["x"], &["y"]), cell(2, 1, &["y"], &["x"])];
        let g = DependencyGraph::build(&cells);
        let cycles = g.cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 2);
    }

    #[test]
    fn duplicate_definitions_are_grouped_by_name() {
        let cells = vec![cell(1, 0, &["x"], &[]), cell(2, 1, &["x"], &[])];
        let dups = duplicate_definitions(&cells);
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].name, "x");
        assert_eq!(dups[0].cells.len(), 2);
    }

    #[test]
    fn unresolved_ref_is_not_a_build_error() {
        let cells = vec![cell(1, 0, &[], &["missing"])];
        let g = DependencyGraph::build(&cells);
        assert!(g.cycles().is_empty());
        assert_eq!(g.descendants(CellId(1)), Set::from([CellId(1)]));
    }

    #[test]
    fn tie_break_orders_ready_nodes_by_order_then_id() {
        // Two independent cells with no edge between them; order decides.
        let cells = vec![cell(5, 10, &["a"], &[]), cell(2, 1, &["b"], &[])];
        let g = DependencyGraph::build(&cells);
        let order_of: HashMap<CellId, i64> = cells.iter().map(|c| (c.id, c.order)).collect();
        let all: Set<CellId> = cells.iter().map(|c| c.id).collect();
        let order = g.topological_order(&all, &order_of).unwrap();
        assert_eq!(order, vec![CellId(2), CellId(5)]);
    }
}
