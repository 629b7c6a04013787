// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! The execution plan produced by the planning phase.

use crate::error::Result;
use crate::graph::DimensionGraph;
use crate::types::{DimensionDescriptor, DimensionScope};
use std::collections::HashMap;

/// Planned execution: topological order, parallel groups, and the filtered
/// dependency map, plus scope lookups for every declared dimension.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// All dimensions in topological order.
    pub sorted_dimensions: Vec<String>,
    /// Ordered batches; dimensions in a batch may run concurrently.
    pub execution_groups: Vec<Vec<String>>,
    /// Dimension to dependency names (unknown references already dropped).
    pub dependency_graph: HashMap<String, Vec<String>>,
    graph: DimensionGraph,
}

impl ExecutionPlan {
    /// Plan the run: build the graph, sort, group.
    pub fn build(
        dimensions: &[DimensionDescriptor],
        dependencies: &HashMap<String, Vec<String>>,
    ) -> Result<Self> {
        let graph = DimensionGraph::build(dimensions, dependencies)?;
        let execution_groups = graph.execution_groups()?;
        Ok(Self {
            sorted_dimensions: graph.sorted_dimensions().to_vec(),
            execution_groups,
            dependency_graph: graph.dependency_map().clone(),
            graph,
        })
    }

    /// Scope of a planned dimension; undeclared names read as section scope.
    #[must_use]
    pub fn scope_of(&self, dimension: &str) -> DimensionScope {
        self.graph.scope_of(dimension).unwrap_or_default()
    }

    /// True when the dimension runs once per execution.
    #[must_use]
    pub fn is_global(&self, dimension: &str) -> bool {
        self.scope_of(dimension) == DimensionScope::Global
    }

    /// Dependencies of one dimension.
    #[must_use]
    pub fn dependencies_of(&self, dimension: &str) -> &[String] {
        self.graph.dependencies_of(dimension)
    }

    /// The underlying graph, for analytics and exports.
    #[must_use]
    pub fn graph(&self) -> &DimensionGraph {
        &self.graph
    }

    /// Split a group into its global and section subgroups, preserving order.
    #[must_use]
    pub fn split_group<'a>(&self, group: &'a [String]) -> (Vec<&'a String>, Vec<&'a String>) {
        group.iter().partition(|name| self.is_global(name))
    }

    /// Total slot count for the given section count, used to seed progress
    /// totals: one slot per global dimension, `sections` per section
    /// dimension.
    #[must_use]
    pub fn total_slots(&self, sections: usize) -> usize {
        self.sorted_dimensions
            .iter()
            .map(|name| if self.is_global(name) { 1 } else { sections })
            .sum()
    }
}
