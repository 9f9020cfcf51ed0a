//! Cycle detection over name-keyed dependency graphs.
//!
//! Both the tool dependency graph and the step graph of a single workflow are
//! `DiGraphMap<&str, ()>` with an edge from each node to what it depends on.
//! Edges to names that were never added as nodes still create a node, which
//! simply has no outgoing edges.

use petgraph::graphmap::DiGraphMap;
use petgraph::visit::{Control, DfsEvent, depth_first_search};

/// Name-keyed dependency graph: `a -> b` means `a` depends on `b`.
pub type NameGraph<'a> = DiGraphMap<&'a str, ()>;

/// Depth-first search that tracks the current recursion stack.
///
/// Returns the first cycle found as a closed path (`a -> b -> a`), or `None`
/// if the graph is acyclic. Roots are visited in node insertion order, so
/// results are deterministic.
pub fn find_cycle(graph: &NameGraph<'_>) -> Option<Vec<String>> {
    let mut stack: Vec<&str> = Vec::new();

    let control = depth_first_search(graph, graph.nodes(), |event| match event {
        DfsEvent::Discover(node, _) => {
            stack.push(node);
            Control::Continue
        }
        DfsEvent::Finish(_, _) => {
            stack.pop();
            Control::Continue
        }
        DfsEvent::BackEdge(_, target) => {
            let start = stack.iter().position(|n| *n == target).unwrap_or(0);
            let mut path: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
            path.push(target.to_string());
            Control::Break(path)
        }
        DfsEvent::TreeEdge(_, _) | DfsEvent::CrossForwardEdge(_, _) => Control::Continue,
    });

    control.break_value()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph<'a>(pairs: &[(&'a str, &[&'a str])]) -> NameGraph<'a> {
        let mut g = NameGraph::new();
        for (node, _) in pairs {
            g.add_node(*node);
        }
        for (node, targets) in pairs {
            for target in *targets {
                g.add_edge(*node, *target, ());
            }
        }
        g
    }

    #[test]
    fn test_acyclic_graph() {
        let g = graph(&[("a", &["b", "c"]), ("b", &["c"]), ("c", &[])]);
        assert!(find_cycle(&g).is_none());
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let g = graph(&[("a", &["b", "c"]), ("b", &["d"]), ("c", &["d"]), ("d", &[])]);
        assert!(find_cycle(&g).is_none());
    }

    #[test]
    fn test_two_node_cycle() {
        let g = graph(&[("a", &["b"]), ("b", &["a"])]);
        assert_eq!(find_cycle(&g).unwrap(), vec!["a", "b", "a"]);
    }

    #[test]
    fn test_self_loop() {
        let g = graph(&[("a", &["a"])]);
        assert_eq!(find_cycle(&g).unwrap(), vec!["a", "a"]);
    }

    #[test]
    fn test_cycle_reported_from_entry_point() {
        let g = graph(&[("a", &["b"]), ("b", &["c"]), ("c", &["d"]), ("d", &["b"])]);
        assert_eq!(find_cycle(&g).unwrap(), vec!["b", "c", "d", "b"]);
    }

    #[test]
    fn test_dangling_edges_are_leaves() {
        let g = graph(&[("a", &["missing"])]);
        assert!(find_cycle(&g).is_none());
    }
}
