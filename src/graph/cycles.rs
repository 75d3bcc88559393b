// Cycle detection via Tarjan's strongly connected components.
//
// Works over any graph that can name its nodes and list successors by name:
// the raw dependency graph, or one scope of the hierarchy tree.
//
// The DFS runs on an explicit call stack, so long dependency chains cannot
// overflow the thread stack. Only components with two or more members are
// reported; a self-loop is a component of one and is tolerated silently.

use std::collections::{BTreeSet, HashMap};

/// A directed graph whose nodes are addressed by name.
pub trait NamedGraph {
    /// All node names, in the order the search should start from them.
    fn node_names(&self) -> Vec<&str>;

    /// Successors of `name`. Names unknown to `node_names` are ignored.
    fn successors(&self, name: &str) -> Vec<&str>;
}

#[derive(Debug, Clone, Default)]
pub struct CycleDetector {
    cycles: Vec<Vec<String>>,
    cyclic: BTreeSet<String>,
}

impl CycleDetector {
    /// Runs the SCC analysis over `graph`.
    pub fn for_graph<G: NamedGraph + ?Sized>(graph: &G) -> Self {
        let names = graph.node_names();
        let index_of: HashMap<&str, usize> =
            names.iter().enumerate().map(|(i, name)| (*name, i)).collect();

        let adjacency: Vec<Vec<usize>> = names
            .iter()
            .map(|name| {
                graph
                    .successors(name)
                    .into_iter()
                    .filter_map(|succ| index_of.get(succ).copied())
                    .collect()
            })
            .collect();

        let mut detector = Self::default();
        for component in strongly_connected_components(&adjacency) {
            if component.len() < 2 {
                continue;
            }
            let cycle: Vec<String> = component.iter().map(|&i| names[i].to_string()).collect();
            detector.cyclic.extend(cycle.iter().cloned());
            detector.cycles.push(cycle);
        }
        detector
    }

    /// Detected cycles, in discovery order.
    pub fn cycles(&self) -> &[Vec<String>] {
        &self.cycles
    }

    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }

    /// Whether `name` is a member of any detected cycle.
    pub fn is_cyclic(&self, name: &str) -> bool {
        self.cyclic.contains(name)
    }
}

const UNVISITED: usize = usize::MAX;

/// Iterative Tarjan. Components are returned in completion order; members of
/// each component appear in the order they were pushed on the Tarjan stack.
fn strongly_connected_components(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = adjacency.len();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut components = Vec::new();

    // (node, position of the next successor to explore)
    let mut call_stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..n {
        if index[root] != UNVISITED {
            continue;
        }

        index[root] = next_index;
        lowlink[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;
        call_stack.push((root, 0));

        while let Some(&(v, pos)) = call_stack.last() {
            if let Some(&w) = adjacency[v].get(pos) {
                let top = call_stack.len() - 1;
                call_stack[top].1 += 1;

                if index[w] == UNVISITED {
                    index[w] = next_index;
                    lowlink[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    call_stack.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
                continue;
            }

            // all successors of v explored
            call_stack.pop();
            if let Some(&(parent, _)) = call_stack.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }

            if lowlink[v] == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                component.reverse();
                components.push(component);
            }
        }
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DependencyGraph;

    fn graph_of(links: &[(&str, &str)]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for (from, to) in links {
            graph.add_link(from, to).unwrap();
        }
        graph
    }

    #[test]
    fn test_three_node_cycle() {
        let graph = graph_of(&[("A", "B"), ("B", "C"), ("C", "A")]);
        let detector = CycleDetector::for_graph(&graph);

        assert_eq!(detector.cycles().len(), 1);
        let members: BTreeSet<&str> = detector.cycles()[0].iter().map(String::as_str).collect();
        assert_eq!(members, BTreeSet::from(["A", "B", "C"]));
        assert!(detector.is_cyclic("A"));
        assert!(detector.is_cyclic("C"));
    }

    #[test]
    fn test_dag_has_no_cycles() {
        let graph = graph_of(&[("A", "B"), ("B", "C"), ("A", "C"), ("D", "C")]);
        let detector = CycleDetector::for_graph(&graph);

        assert!(!detector.has_cycles());
        assert!(!detector.is_cyclic("A"));
    }

    #[test]
    fn test_self_loop_is_not_a_cycle() {
        let graph = graph_of(&[("A", "A"), ("A", "B")]);
        let detector = CycleDetector::for_graph(&graph);

        assert!(!detector.has_cycles());
    }

    #[test]
    fn test_two_separate_cycles() {
        let graph = graph_of(&[
            ("A", "B"),
            ("B", "A"),
            ("B", "C"),
            ("C", "D"),
            ("D", "E"),
            ("E", "C"),
        ]);
        let detector = CycleDetector::for_graph(&graph);

        assert_eq!(detector.cycles().len(), 2);
        assert!(detector.is_cyclic("A"));
        assert!(detector.is_cyclic("E"));
        // C..E completes first because it is reached from inside the A/B search
        assert_eq!(detector.cycles()[0], vec!["C", "D", "E"]);
        assert_eq!(detector.cycles()[1], vec!["A", "B"]);
    }

    #[test]
    fn test_cycle_members_follow_discovery_order() {
        let graph = graph_of(&[("A", "B"), ("B", "C"), ("C", "A")]);
        let detector = CycleDetector::for_graph(&graph);

        assert_eq!(detector.cycles()[0], vec!["A", "B", "C"]);
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let mut graph = DependencyGraph::new();
        let n = 50_000;
        for i in 0..n {
            graph
                .add_link(&format!("n{i}"), &format!("n{}", i + 1))
                .unwrap();
        }
        graph.add_link(&format!("n{n}"), "n0").unwrap();

        let detector = CycleDetector::for_graph(&graph);
        assert_eq!(detector.cycles().len(), 1);
        assert_eq!(detector.cycles()[0].len(), n + 1);
    }
}
