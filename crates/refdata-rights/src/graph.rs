//! ---
//! refdata_section: "04-rights"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "In-memory supervision hierarchy."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Bfs;
use refdata_persistence::SupervisionSnapshot;
use uuid::Uuid;

/// Parent to child edges between supervisory nodes plus the facilities each
/// node's requisition groups cover per program.
#[derive(Debug, Default)]
pub struct SupervisionGraph {
    tree: DiGraphMap<Uuid, ()>,
    coverage: HashMap<(Uuid, Uuid), BTreeSet<Uuid>>,
    memo: HashMap<(Uuid, Uuid), Arc<BTreeSet<Uuid>>>,
}

impl SupervisionGraph {
    pub fn from_snapshot(snapshot: &SupervisionSnapshot) -> Self {
        let mut tree = DiGraphMap::new();
        for (node, parent) in &snapshot.nodes {
            tree.add_node(*node);
            if let Some(parent) = parent {
                tree.add_edge(*parent, *node, ());
            }
        }

        let mut coverage: HashMap<(Uuid, Uuid), BTreeSet<Uuid>> = HashMap::new();
        for (node, program, facility) in &snapshot.coverage {
            coverage.entry((*node, *program)).or_default().insert(*facility);
        }

        Self {
            tree,
            coverage,
            memo: HashMap::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.tree.node_count()
    }

    /// Facilities supervised by `node` for `program`: its own requisition
    /// group members plus those of every descendant. Cycles in the parent
    /// links are visited once.
    pub fn supervised_facilities(&mut self, node: Uuid, program: Uuid) -> Arc<BTreeSet<Uuid>> {
        if let Some(hit) = self.memo.get(&(node, program)) {
            return Arc::clone(hit);
        }

        let mut facilities = BTreeSet::new();
        if self.tree.contains_node(node) {
            let mut bfs = Bfs::new(&self.tree, node);
            while let Some(visited) = bfs.next(&self.tree) {
                if let Some(members) = self.coverage.get(&(visited, program)) {
                    facilities.extend(members.iter().copied());
                }
            }
        }

        let facilities = Arc::new(facilities);
        self.memo.insert((node, program), Arc::clone(&facilities));
        facilities
    }

    /// Every node below `node` in breadth-first order.
    pub fn descendants(&self, node: Uuid) -> Vec<Uuid> {
        if !self.tree.contains_node(node) {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut bfs = Bfs::new(&self.tree, node);
        // skip the start node
        bfs.next(&self.tree);
        while let Some(visited) = bfs.next(&self.tree) {
            out.push(visited);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn collects_members_of_node_and_descendants() {
        let n = ids(3);
        let program = Uuid::new_v4();
        let other = Uuid::new_v4();
        let f = ids(3);
        let snapshot = SupervisionSnapshot {
            nodes: vec![(n[0], None), (n[1], Some(n[0])), (n[2], Some(n[1]))],
            coverage: vec![
                (n[0], program, f[0]),
                (n[2], program, f[1]),
                (n[2], other, f[2]),
            ],
        };
        let mut graph = SupervisionGraph::from_snapshot(&snapshot);

        let root: Vec<_> = graph.supervised_facilities(n[0], program).iter().copied().collect();
        let mut expected = vec![f[0], f[1]];
        expected.sort();
        assert_eq!(root, expected);

        // middle node has no group of its own
        let middle = graph.supervised_facilities(n[1], program);
        assert_eq!(middle.len(), 1);
        assert!(middle.contains(&f[1]));

        assert!(graph.supervised_facilities(n[0], Uuid::new_v4()).is_empty());
        assert!(graph.supervised_facilities(Uuid::new_v4(), program).is_empty());
    }

    #[test]
    fn terminates_on_cycles() {
        let n = ids(2);
        let program = Uuid::new_v4();
        let f = ids(2);
        let snapshot = SupervisionSnapshot {
            nodes: vec![(n[0], Some(n[1])), (n[1], Some(n[0]))],
            coverage: vec![(n[0], program, f[0]), (n[1], program, f[1])],
        };
        let mut graph = SupervisionGraph::from_snapshot(&snapshot);
        assert_eq!(graph.supervised_facilities(n[0], program).len(), 2);
        assert_eq!(graph.descendants(n[0]), vec![n[1]]);
    }

    #[test]
    fn memoises_per_node_and_program() {
        let node = Uuid::new_v4();
        let program = Uuid::new_v4();
        let snapshot = SupervisionSnapshot {
            nodes: vec![(node, None)],
            coverage: vec![(node, program, Uuid::new_v4())],
        };
        let mut graph = SupervisionGraph::from_snapshot(&snapshot);
        let first = graph.supervised_facilities(node, program);
        let second = graph.supervised_facilities(node, program);
        assert!(Arc::ptr_eq(&first, &second));
    }
}
