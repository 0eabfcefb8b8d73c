// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Forward adjacency of compiled nodes and the static analyses run on it.
//!
//! # Algorithms
//!
//! ## Cycle Detection
//! Uses **Depth-First Search (DFS) with recursion stack** ("three colors"):
//! - **White (unvisited)**: Node not yet explored
//! - **Gray (in recursion stack)**: Node currently being explored
//! - **Black (visited)**: Node fully explored
//!
//! Reaching a gray node closes a cycle; the current DFS path from that node
//! onward, plus the back edge, is the reported cycle. A node that references
//! itself yields the cycle `[a, a]`.
//!
//! ## Topological Order
//! Kahn's algorithm with a min-heap over node indices, so the order is a pure
//! function of the graph and declaration order.
//!
//! **Time Complexity**: O((V + E) log V)

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashSet};

use super::NodeId;

/// Newtype over `producer -> dependents` adjacency, indexed by node id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph(pub Vec<BTreeSet<NodeId>>);

impl DependencyGraph {
    pub fn with_nodes(count: usize) -> Self {
        Self(vec![BTreeSet::new(); count])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Adds `producer -> consumer`. Duplicate edges collapse.
    pub fn add_edge(&mut self, producer: NodeId, consumer: NodeId) {
        if let Some(dependents) = self.0.get_mut(producer) {
            dependents.insert(consumer);
        }
    }

    pub fn dependents(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.0.get(node).into_iter().flatten().copied()
    }

    /// Reverse adjacency: `consumer -> producers`.
    pub fn dependencies(&self) -> Vec<BTreeSet<NodeId>> {
        let mut reversed = vec![BTreeSet::new(); self.0.len()];
        for (producer, dependents) in self.0.iter().enumerate() {
            for &consumer in dependents {
                reversed[consumer].insert(producer);
            }
        }
        reversed
    }

    /// Returns the first cycle found, walking roots in index order.
    pub fn find_cycle(&self) -> Option<Vec<NodeId>> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        (0..self.0.len()).find_map(|node| {
            if visited.contains(&node) {
                return None;
            }
            self.dfs_cycle_detection(node, &mut visited, &mut rec_stack, &mut path)
        })
    }

    fn dfs_cycle_detection(
        &self,
        node: NodeId,
        visited: &mut HashSet<NodeId>,
        rec_stack: &mut HashSet<NodeId>,
        path: &mut Vec<NodeId>,
    ) -> Option<Vec<NodeId>> {
        visited.insert(node);
        rec_stack.insert(node);
        path.push(node);

        for neighbor in self.dependents(node) {
            if !visited.contains(&neighbor) {
                if let Some(cycle) = self.dfs_cycle_detection(neighbor, visited, rec_stack, path) {
                    return Some(cycle);
                }
            } else if rec_stack.contains(&neighbor) {
                let cycle_start = path.iter().position(|&x| x == neighbor).unwrap_or(0);
                let mut cycle = path[cycle_start..].to_vec();
                cycle.push(neighbor);
                return Some(cycle);
            }
        }

        rec_stack.remove(&node);
        path.pop();
        None
    }

    /// Kahn's algorithm. Only meaningful on an acyclic graph; nodes on a
    /// cycle are left out of the result.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut in_degree = vec![0usize; self.0.len()];
        for dependents in &self.0 {
            for &consumer in dependents {
                in_degree[consumer] += 1;
            }
        }

        let mut ready: BinaryHeap<Reverse<NodeId>> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(node, _)| Reverse(node))
            .collect();

        let mut order = Vec::with_capacity(self.0.len());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for consumer in self.dependents(node) {
                in_degree[consumer] -= 1;
                if in_degree[consumer] == 0 {
                    ready.push(Reverse(consumer));
                }
            }
        }
        order
    }

    /// Groups nodes sharing an identical dependency set. Groups are listed by
    /// the topological position of their first member; members keep
    /// topological order.
    pub fn partition(&self, order: &[NodeId]) -> Vec<(BTreeSet<NodeId>, Vec<NodeId>)> {
        let dependencies = self.dependencies();
        let mut groups: BTreeMap<&BTreeSet<NodeId>, Vec<NodeId>> = BTreeMap::new();
        for &node in order {
            groups.entry(&dependencies[node]).or_default().push(node);
        }

        let position = |node: NodeId| order.iter().position(|&n| n == node).unwrap_or(usize::MAX);
        let mut partition = groups
            .into_iter()
            .map(|(deps, members)| (deps.clone(), members))
            .collect::<Vec<_>>();
        partition.sort_by_key(|(_, members)| members.first().map_or(usize::MAX, |&n| position(n)));
        partition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(count: usize, edges: &[(NodeId, NodeId)]) -> DependencyGraph {
        let mut graph = DependencyGraph::with_nodes(count);
        for &(from, to) in edges {
            graph.add_edge(from, to);
        }
        graph
    }

    #[test]
    fn acyclic_graph_has_no_cycle() {
        assert_eq!(graph(3, &[(0, 1), (1, 2), (0, 2)]).find_cycle(), None);
    }

    #[test]
    fn detects_simple_cycle() {
        let cycle = graph(3, &[(0, 1), (1, 2), (2, 0)]).find_cycle().unwrap();
        assert_eq!(cycle, vec![0, 1, 2, 0]);
    }

    #[test]
    fn detects_nested_cycle() {
        let cycle = graph(4, &[(0, 1), (1, 2), (2, 3), (3, 1)]).find_cycle().unwrap();
        assert_eq!(cycle, vec![1, 2, 3, 1]);
    }

    #[test]
    fn self_edge_is_a_cycle() {
        assert_eq!(graph(2, &[(1, 1)]).find_cycle(), Some(vec![1, 1]));
    }

    #[test]
    fn topological_order_respects_edges_and_declaration_order() {
        let order = graph(4, &[(3, 0), (2, 1)]).topological_order();
        assert_eq!(order, vec![2, 1, 3, 0]);
    }

    #[test]
    fn partition_groups_identical_dependency_sets() {
        // 0 -> {1, 2}, 3 independent, {1, 2} -> 4
        let graph = graph(5, &[(0, 1), (0, 2), (1, 4), (2, 4)]);
        let order = graph.topological_order();
        let partition = graph.partition(&order);

        let members = partition.iter().map(|(_, m)| m.clone()).collect::<Vec<_>>();
        assert_eq!(members, vec![vec![0, 3], vec![1, 2], vec![4]]);
        assert_eq!(partition[2].0, BTreeSet::from([1, 2]));
    }
}
