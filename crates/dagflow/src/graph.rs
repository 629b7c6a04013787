// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Dimension dependency graph: construction, cycle detection, topological
//! sorting, and greedy levelization into parallel execution groups.
//!
//! The graph holds one node per declared dimension and one edge per declared
//! dependency (`dep -> dimension`). Dependencies naming undeclared dimensions
//! are dropped at build time, so the sort and the grouping only ever see the
//! declared set. Analytics and exports are informational and never affect
//! execution.

use crate::error::{Error, Result, StuckDimension};
use crate::types::{DimensionDescriptor, DimensionScope};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Read-only analytics over a built graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphAnalytics {
    /// Longest dependency chain, in execution order.
    pub critical_path: Vec<String>,
    /// Length of the critical path.
    pub critical_path_length: usize,
    /// Dimensions ranked by direct dependents, most depended-upon first.
    /// Only dimensions with at least one dependent appear.
    pub bottlenecks: Vec<(String, usize)>,
    /// Dimensions with no dependencies.
    pub roots: Vec<String>,
    /// Dimensions nothing depends on.
    pub leaves: Vec<String>,
    /// Size of the widest execution group.
    pub max_group_width: usize,
    /// Total dimensions.
    pub dimension_count: usize,
    /// Total dependency edges after dropping unknown references.
    pub edge_count: usize,
}

/// The dimension dependency graph.
#[derive(Debug, Clone)]
pub struct DimensionGraph {
    graph: DiGraph<String, ()>,
    scopes: HashMap<String, DimensionScope>,
    /// Declared dependencies filtered to known dimensions, in declared order.
    dependencies: HashMap<String, Vec<String>>,
    /// Declaration order of the dimensions.
    declaration_order: Vec<String>,
    /// Topological order, fixed at build time.
    sorted: Vec<String>,
}

impl DimensionGraph {
    /// Build the graph and validate acyclicity.
    ///
    /// Dependencies referencing undeclared dimensions are ignored. A cycle
    /// fails with [`Error::CircularDependency`] carrying one concrete cycle.
    pub fn build(
        dimensions: &[DimensionDescriptor],
        dependencies: &HashMap<String, Vec<String>>,
    ) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut indices = HashMap::new();
        let mut scopes = HashMap::new();
        let mut declaration_order = Vec::with_capacity(dimensions.len());

        for descriptor in dimensions {
            if indices.contains_key(&descriptor.name) {
                continue;
            }
            let index = graph.add_node(descriptor.name.clone());
            indices.insert(descriptor.name.clone(), index);
            scopes.insert(descriptor.name.clone(), descriptor.scope);
            declaration_order.push(descriptor.name.clone());
        }

        let mut filtered: HashMap<String, Vec<String>> = HashMap::new();
        for name in &declaration_order {
            let declared = dependencies.get(name).cloned().unwrap_or_default();
            let mut kept = Vec::with_capacity(declared.len());
            for dep in declared {
                if dep == *name {
                    debug!(dimension = %name, "dropping self-dependency");
                    continue;
                }
                match (indices.get(&dep), indices.get(name)) {
                    (Some(&from), Some(&to)) => {
                        if !kept.contains(&dep) {
                            graph.add_edge(from, to, ());
                            kept.push(dep);
                        }
                    }
                    _ => {
                        debug!(dimension = %name, dependency = %dep, "dropping unknown dependency");
                    }
                }
            }
            filtered.insert(name.clone(), kept);
        }

        let sorted = match toposort(&graph, None) {
            Ok(order) => order.into_iter().map(|index| graph[index].clone()).collect(),
            Err(_) => {
                return Err(Error::CircularDependency {
                    cycle: find_cycle(&declaration_order, &filtered),
                })
            }
        };

        Ok(Self {
            graph,
            scopes,
            dependencies: filtered,
            declaration_order,
            sorted,
        })
    }

    /// Topologically sorted dimension names.
    #[must_use]
    pub fn sorted_dimensions(&self) -> &[String] {
        &self.sorted
    }

    /// Declared dimensions in declaration order.
    #[must_use]
    pub fn declaration_order(&self) -> &[String] {
        &self.declaration_order
    }

    /// Scope of a dimension.
    #[must_use]
    pub fn scope_of(&self, dimension: &str) -> Option<DimensionScope> {
        self.scopes.get(dimension).copied()
    }

    /// Effective (declared and known) dependencies of a dimension.
    #[must_use]
    pub fn dependencies_of(&self, dimension: &str) -> &[String] {
        self.dependencies.get(dimension).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The full dependency map after unknown-reference filtering.
    #[must_use]
    pub fn dependency_map(&self) -> &HashMap<String, Vec<String>> {
        &self.dependencies
    }

    /// Group dimensions into parallel batches by greedy levelization.
    ///
    /// Each pass collects every remaining dimension whose dependencies are
    /// all already processed. An empty pass with dimensions remaining fails
    /// with [`Error::ExecutionGrouping`].
    pub fn execution_groups(&self) -> Result<Vec<Vec<String>>> {
        let mut processed: HashSet<&str> = HashSet::new();
        let mut remaining: Vec<&String> = self.declaration_order.iter().collect();
        let mut groups = Vec::new();

        while !remaining.is_empty() {
            let (ready, blocked): (Vec<&String>, Vec<&String>) = remaining.into_iter().partition(|name| {
                self.dependencies_of(name)
                    .iter()
                    .all(|dep| processed.contains(dep.as_str()))
            });

            if ready.is_empty() {
                let stuck = blocked
                    .iter()
                    .map(|name| StuckDimension {
                        dimension: (*name).clone(),
                        missing: self
                            .dependencies_of(name)
                            .iter()
                            .filter(|dep| !processed.contains(dep.as_str()))
                            .cloned()
                            .collect(),
                    })
                    .collect();
                return Err(Error::ExecutionGrouping { stuck });
            }

            for name in &ready {
                processed.insert(name.as_str());
            }
            groups.push(ready.into_iter().cloned().collect());
            remaining = blocked;
        }

        Ok(groups)
    }

    /// Compute read-only analytics: critical path, bottlenecks, shape.
    #[must_use]
    pub fn analytics(&self) -> GraphAnalytics {
        // Longest chain ending at each node, walked in topological order.
        let mut chain_len: HashMap<&str, usize> = HashMap::new();
        let mut predecessor: HashMap<&str, &str> = HashMap::new();
        for name in &self.sorted {
            let mut best = 0usize;
            let mut via: Option<&str> = None;
            for dep in self.dependencies_of(name) {
                let len = chain_len.get(dep.as_str()).copied().unwrap_or(1);
                if len > best {
                    best = len;
                    via = Some(dep.as_str());
                }
            }
            chain_len.insert(name.as_str(), best + 1);
            if let Some(dep) = via {
                predecessor.insert(name.as_str(), dep);
            }
        }

        let mut tail: Option<&str> = None;
        let mut longest = 0usize;
        for (name, len) in &chain_len {
            if *len > longest || (*len == longest && tail.map_or(true, |t| *name < t)) {
                longest = *len;
                tail = Some(name);
            }
        }
        let mut critical_path = Vec::new();
        let mut cursor = tail;
        while let Some(name) = cursor {
            critical_path.push(name.to_string());
            cursor = predecessor.get(name).copied();
        }
        critical_path.reverse();

        let mut dependents: HashMap<&str, usize> = HashMap::new();
        for deps in self.dependencies.values() {
            for dep in deps {
                *dependents.entry(dep.as_str()).or_insert(0) += 1;
            }
        }
        let mut bottlenecks: Vec<(String, usize)> = dependents
            .iter()
            .map(|(name, count)| ((*name).to_string(), *count))
            .collect();
        bottlenecks.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let roots = self
            .declaration_order
            .iter()
            .filter(|name| self.dependencies_of(name).is_empty())
            .cloned()
            .collect();
        let leaves = self
            .declaration_order
            .iter()
            .filter(|name| !dependents.contains_key(name.as_str()))
            .cloned()
            .collect();

        let max_group_width = self
            .execution_groups()
            .map(|groups| groups.iter().map(Vec::len).max().unwrap_or(0))
            .unwrap_or(0);

        GraphAnalytics {
            critical_path_length: longest,
            critical_path,
            bottlenecks,
            roots,
            leaves,
            max_group_width,
            dimension_count: self.declaration_order.len(),
            edge_count: self.graph.edge_count(),
        }
    }

    /// Export as Graphviz DOT. Global dimensions render as boxes, section
    /// dimensions as ellipses.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph dimensions {\n  rankdir=LR;\n");
        for name in &self.declaration_order {
            let shape = match self.scopes.get(name) {
                Some(DimensionScope::Global) => "box",
                _ => "ellipse",
            };
            dot.push_str(&format!("  \"{name}\" [shape={shape}];\n"));
        }
        for name in &self.declaration_order {
            for dep in self.dependencies_of(name) {
                dot.push_str(&format!("  \"{dep}\" -> \"{name}\";\n"));
            }
        }
        dot.push_str("}\n");
        dot
    }

    /// Export nodes and edges as JSON.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let nodes: Vec<Value> = self
            .declaration_order
            .iter()
            .map(|name| {
                json!({
                    "name": name,
                    "scope": self.scopes.get(name),
                    "dependencies": self.dependencies_of(name),
                })
            })
            .collect();
        let edges: Vec<Value> = self
            .declaration_order
            .iter()
            .flat_map(|name| {
                self.dependencies_of(name)
                    .iter()
                    .map(move |dep| json!({"from": dep, "to": name}))
            })
            .collect();
        json!({"nodes": nodes, "edges": edges})
    }
}

/// Locate one cycle by depth-first search over the filtered dependency map.
///
/// Only called when `toposort` already proved a cycle exists, so this always
/// finds one; the fallback empty vector is unreachable in practice.
fn find_cycle(order: &[String], dependencies: &HashMap<String, Vec<String>>) -> Vec<String> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        node: &'a str,
        dependencies: &'a HashMap<String, Vec<String>>,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        marks.insert(node, Mark::Visiting);
        stack.push(node);
        for dep in dependencies.get(node).map(Vec::as_slice).unwrap_or(&[]) {
            match marks.get(dep.as_str()) {
                Some(Mark::Done) => {}
                Some(Mark::Visiting) => {
                    let from = stack.iter().position(|n| *n == dep.as_str()).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        stack[from..].iter().map(|n| (*n).to_string()).collect();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
                None => {
                    if let Some(cycle) = visit(dep, dependencies, marks, stack) {
                        return Some(cycle);
                    }
                }
            }
        }
        stack.pop();
        marks.insert(node, Mark::Done);
        None
    }

    let mut marks = HashMap::new();
    let mut stack = Vec::new();
    for node in order {
        if !marks.contains_key(node.as_str()) {
            if let Some(cycle) = visit(node, dependencies, &mut marks, &mut stack) {
                return cycle;
            }
        }
    }
    Vec::new()
}
