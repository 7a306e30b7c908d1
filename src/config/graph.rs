//! Dependency graph over service names.
//!
//! Used by topology validation to reject cycles and to derive a total startup
//! order consistent with each service's `depends_on` set.

use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    nodes: HashSet<String>,
    /// `edges[a] = [b]` means a depends on b (b must start first).
    edges: HashMap<String, Vec<String>>,
    /// `dependents[b] = [a]` means a depends on b.
    dependents: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.nodes.insert(name.clone());
        self.edges.entry(name.clone()).or_default();
        self.dependents.entry(name).or_default();
    }

    /// Record that `service` depends on `dependency`.
    pub fn add_dependency(&mut self, service: impl Into<String>, dependency: impl Into<String>) {
        let service = service.into();
        let dependency = dependency.into();
        self.add_node(service.clone());
        self.add_node(dependency.clone());
        self.edges
            .entry(service.clone())
            .or_default()
            .push(dependency.clone());
        self.dependents.entry(dependency).or_default().push(service);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains(name)
    }

    /// Kahn's algorithm. Dependencies come before their dependents; an
    /// unprocessable remainder means a cycle, reported with its path.
    pub fn startup_order(&self) -> Result<Vec<String>> {
        let mut remaining: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| (n.as_str(), self.edges.get(n).map_or(0, Vec::len)))
            .collect();

        let mut queue: VecDeque<&str> = remaining
            .iter()
            .filter(|(_, &deps)| deps == 0)
            .map(|(&n, _)| n)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(node) = queue.pop_front() {
            order.push(node.to_string());
            if let Some(dependents) = self.dependents.get(node) {
                for dependent in dependents {
                    if let Some(deps) = remaining.get_mut(dependent.as_str()) {
                        *deps -= 1;
                        if *deps == 0 {
                            queue.push_back(dependent);
                        }
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            return Err(Error::CircularDependency(self.find_cycle()));
        }
        Ok(order)
    }

    pub fn has_cycle(&self) -> bool {
        self.startup_order().is_err()
    }

    /// Locate one cycle for the error message.
    fn find_cycle(&self) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        let mut on_stack = HashSet::new();

        for node in &self.nodes {
            if !visited.contains(node.as_str()) {
                if let Some(cycle) = self.cycle_from(node, &mut visited, &mut stack, &mut on_stack)
                {
                    return cycle;
                }
            }
        }
        // Unreachable when called after a failed sort, but stay total.
        self.nodes.iter().take(2).cloned().collect()
    }

    fn cycle_from(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        stack: &mut Vec<String>,
        on_stack: &mut HashSet<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        on_stack.insert(node.to_string());
        stack.push(node.to_string());

        if let Some(deps) = self.edges.get(node) {
            for dep in deps {
                if !visited.contains(dep.as_str()) {
                    if let Some(cycle) = self.cycle_from(dep, visited, stack, on_stack) {
                        return Some(cycle);
                    }
                } else if on_stack.contains(dep.as_str()) {
                    let start = stack.iter().position(|n| n == dep).unwrap_or(0);
                    let mut cycle: Vec<String> = stack[start..].to_vec();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
            }
        }

        on_stack.remove(node);
        stack.pop();
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies_come_first() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("app", "db");
        graph.add_dependency("app", "cache");
        graph.add_dependency("worker", "app");

        let order = graph.startup_order().unwrap();
        let pos = |n: &str| order.iter().position(|s| s == n).unwrap();

        assert!(pos("db") < pos("app"));
        assert!(pos("cache") < pos("app"));
        assert!(pos("app") < pos("worker"));
    }

    #[test]
    fn detects_cycles_with_path() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("a", "b");
        graph.add_dependency("b", "c");
        graph.add_dependency("c", "a");

        assert!(graph.has_cycle());
        match graph.startup_order() {
            Err(Error::CircularDependency(path)) => {
                assert!(path.len() >= 3, "cycle path should name the members: {path:?}");
            }
            other => panic!("expected CircularDependency, got {other:?}"),
        }
    }

    #[test]
    fn isolated_nodes_sort_fine() {
        let mut graph = DependencyGraph::new();
        graph.add_node("db");
        graph.add_node("cache");
        let order = graph.startup_order().unwrap();
        assert_eq!(order.len(), 2);
    }
}
