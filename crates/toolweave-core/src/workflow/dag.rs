//! Step graph and wave computation.
//!
//! Models step dependencies as a petgraph `DiGraphMap` with an edge from each
//! step to every step it depends on. The same recursion-stack DFS used for the
//! tool graph proves it acyclic, and depth-based grouping over a topological
//! order yields the waves a plan would run in: every step in a wave has all
//! its dependencies in earlier waves.

use std::collections::HashMap;

use petgraph::algo::toposort;

use super::definition::{WorkflowError, WorkflowStep};
use crate::graph::{NameGraph, find_cycle};

/// Build the step graph, rejecting references to unknown step ids.
fn step_graph(steps: &[WorkflowStep]) -> Result<NameGraph<'_>, WorkflowError> {
    let mut graph = NameGraph::new();
    for step in steps {
        graph.add_node(step.id.as_str());
    }

    for step in steps {
        for dep in &step.depends_on {
            if !graph.contains_node(dep.as_str()) {
                return Err(WorkflowError::UnknownDependency(format!(
                    "step '{}' depends on unknown step '{}'",
                    step.id, dep
                )));
            }
            graph.add_edge(step.id.as_str(), dep.as_str(), ());
        }
    }

    Ok(graph)
}

fn acyclic_step_graph(steps: &[WorkflowStep]) -> Result<NameGraph<'_>, WorkflowError> {
    let graph = step_graph(steps)?;
    match find_cycle(&graph) {
        Some(cycle) => Err(WorkflowError::CycleDetected(cycle)),
        None => Ok(graph),
    }
}

/// Check references and acyclicity without computing waves.
pub fn validate_dag(steps: &[WorkflowStep]) -> Result<(), WorkflowError> {
    acyclic_step_graph(steps).map(|_| ())
}

/// Group steps into waves.
///
/// Index 0 is the first wave. Within a wave, steps keep their definition order.
pub fn build_execution_plan(
    steps: &[WorkflowStep],
) -> Result<Vec<Vec<&WorkflowStep>>, WorkflowError> {
    if steps.is_empty() {
        return Ok(vec![]);
    }

    let graph = acyclic_step_graph(steps)?;
    // Edges point at dependencies, so the sort lists dependents first.
    let sorted = toposort(&graph, None)
        .map_err(|cycle| WorkflowError::CycleDetected(vec![cycle.node_id().to_string()]))?;

    let by_id: HashMap<&str, &WorkflowStep> = steps.iter().map(|s| (s.id.as_str(), s)).collect();
    let mut depths: HashMap<&str, usize> = HashMap::new();
    for step_id in sorted.into_iter().rev() {
        let depth = by_id[step_id]
            .depends_on
            .iter()
            .map(|dep| depths.get(dep.as_str()).copied().unwrap_or(0) + 1)
            .max()
            .unwrap_or(0);
        depths.insert(step_id, depth);
    }

    let max_depth = depths.values().copied().max().unwrap_or(0);
    let mut waves: Vec<Vec<&WorkflowStep>> = vec![vec![]; max_depth + 1];
    for step in steps {
        waves[depths[step.id.as_str()]].push(step);
    }

    Ok(waves)
}
