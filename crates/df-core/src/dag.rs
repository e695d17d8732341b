//! Dependency graph over runtime targets, used for cycle detection

use crate::error::{CoreError, CoreResult};
use crate::target::Target;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, HashSet};

/// A directed graph of action dependencies
#[derive(Debug, Default)]
pub struct ActionDag {
    /// Edges go from a dependency to its dependent
    graph: DiGraph<Target, ()>,
    node_map: BTreeMap<Target, NodeIndex>,
}

impl ActionDag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action, returning its node
    pub fn add_action(&mut self, target: &Target) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(target) {
            return idx;
        }
        let idx = self.graph.add_node(target.clone());
        self.node_map.insert(target.clone(), idx);
        idx
    }

    /// Record that `dependent` depends on `dependency`
    pub fn add_dependency(&mut self, dependent: &Target, dependency: &Target) {
        let from = self.add_action(dependency);
        let to = self.add_action(dependent);
        if !self.graph.contains_edge(from, to) {
            self.graph.add_edge(from, to, ());
        }
    }

    /// Fail with the first cycle found
    pub fn validate(&self) -> CoreResult<()> {
        match self.cycles().into_iter().next() {
            Some(cycle) => Err(CoreError::CircularDependency {
                cycle: format_cycle(&cycle),
            }),
            None => Ok(()),
        }
    }

    /// Every cycle in the graph, one per strongly connected component.
    ///
    /// Each cycle starts and ends at the smallest target of its component, so
    /// the output is deterministic.
    pub fn cycles(&self) -> Vec<Vec<Target>> {
        let mut cycles = Vec::new();
        for component in tarjan_scc(&self.graph) {
            let is_cycle = component.len() > 1
                || component
                    .first()
                    .map(|&idx| self.graph.contains_edge(idx, idx))
                    .unwrap_or(false);
            if !is_cycle {
                continue;
            }
            let members: HashSet<NodeIndex> = component.iter().copied().collect();
            let Some(&start) = component.iter().min_by(|a, b| self.graph[**a].cmp(&self.graph[**b]))
            else {
                continue;
            };
            if let Some(path) = self.find_cycle_path(start, &members) {
                cycles.push(path);
            }
        }
        cycles.sort();
        cycles
    }

    /// Depth-first search inside one component for a path back to `start`
    fn find_cycle_path(&self, start: NodeIndex, members: &HashSet<NodeIndex>) -> Option<Vec<Target>> {
        let mut stack: Vec<(NodeIndex, Vec<NodeIndex>)> = vec![(start, vec![start])];
        let mut visited = HashSet::new();
        while let Some((node, path)) = stack.pop() {
            let mut next: Vec<NodeIndex> = self
                .graph
                .neighbors(node)
                .filter(|n| members.contains(n))
                .collect();
            next.sort_by(|a, b| self.graph[*b].cmp(&self.graph[*a]));
            for neighbor in next {
                if neighbor == start {
                    let mut cycle: Vec<Target> =
                        path.iter().map(|&idx| self.graph[idx].clone()).collect();
                    cycle.push(self.graph[start].clone());
                    return Some(cycle);
                }
                if visited.insert(neighbor) {
                    let mut extended = path.clone();
                    extended.push(neighbor);
                    stack.push((neighbor, extended));
                }
            }
        }
        None
    }

    /// Targets in dependency order (dependencies first)
    pub fn topological_order(&self) -> CoreResult<Vec<Target>> {
        match toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .into_iter()
                .map(|idx| self.graph[idx].clone())
                .collect()),
            Err(_) => {
                self.validate()?;
                Ok(Vec::new())
            }
        }
    }
}

/// Render a cycle as `a > b > a`
pub fn format_cycle(cycle: &[Target]) -> String {
    cycle
        .iter()
        .map(Target::readable)
        .collect::<Vec<_>>()
        .join(" > ")
}

#[cfg(test)]
#[path = "dag_test.rs"]
mod tests;
