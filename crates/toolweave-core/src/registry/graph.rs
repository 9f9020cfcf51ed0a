//! Tool-to-tool dependency graph, derived from the live catalog.
//!
//! Never stored: rebuilt from descriptors whenever a registration needs to be
//! checked for cycles. Nodes are tool names; edges merge the declared
//! dependencies of every registered version of a tool.

use petgraph::Direction;

use toolweave_types::tool::ToolDescriptor;

use super::catalog::Catalog;
use crate::graph::{NameGraph, find_cycle};

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph<'a> {
    graph: NameGraph<'a>,
}

impl<'a> DependencyGraph<'a> {
    pub(crate) fn from_catalog(catalog: &'a Catalog) -> Self {
        let mut graph = Self::default();
        for (name, versions) in catalog {
            graph.graph.add_node(name.as_str());
            for tool in versions.values() {
                graph.add_edges(&tool.descriptor);
            }
        }
        graph
    }

    /// Add a candidate descriptor that is not in the catalog yet.
    pub fn with_descriptor(mut self, descriptor: &'a ToolDescriptor) -> Self {
        self.add_edges(descriptor);
        self
    }

    fn add_edges(&mut self, descriptor: &'a ToolDescriptor) {
        self.graph.add_node(descriptor.name.as_str());
        for dep in &descriptor.dependencies {
            self.graph.add_edge(descriptor.name.as_str(), dep.name.as_str(), ());
        }
    }

    pub fn find_cycle(&self) -> Option<Vec<String>> {
        find_cycle(&self.graph)
    }

    /// Tools that declare a dependency on `name`, sorted.
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        let graph: &NameGraph<'_> = &self.graph;
        let mut dependents: Vec<String> = graph
            .neighbors_directed(name, Direction::Incoming)
            .map(str::to_string)
            .collect();
        dependents.sort_unstable();
        dependents
    }
}
