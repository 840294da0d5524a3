//! Property tests for the dependency orderer.

use asmrelink::order::{DependencyOrderer, OrderNode};
use proptest::prelude::*;

fn build(count: usize, edges: &[(usize, usize)], keep: impl Fn(usize, usize) -> bool) -> Vec<OrderNode> {
    (0..count)
        .map(|node| {
            let dependencies: Vec<String> = edges
                .iter()
                .filter(|(from, to)| *from == node && *to < count && keep(*from, *to))
                .map(|(_, to)| format!("M{}", to))
                .collect();
            OrderNode::new(format!("M{}", node), dependencies)
        })
        .collect()
}

fn positions(order: &[usize]) -> Vec<usize> {
    let mut position = vec![0; order.len()];
    for (slot, &node) in order.iter().enumerate() {
        position[node] = slot;
    }
    position
}

fn is_permutation(order: &[usize], count: usize) -> bool {
    let mut sorted = order.to_vec();
    sorted.sort_unstable();
    sorted == (0..count).collect::<Vec<_>>()
}

proptest! {
    #[test]
    fn prop_acyclic_graphs_are_topologically_ordered(
        ranks in proptest::collection::vec(0..1000u32, 1..30),
        edges in proptest::collection::vec((0..30usize, 0..30usize), 0..80)
    ) {
        // A node only depends on nodes of strictly lower rank, so the graph is acyclic
        let nodes = build(ranks.len(), &edges, |from, to| ranks[to] < ranks[from]);
        let orderer = DependencyOrderer::new(nodes.clone());
        prop_assert!(orderer.cycles().is_empty());

        let order = orderer.order();
        prop_assert!(is_permutation(&order, nodes.len()));

        let position = positions(&order);
        for &(from, to) in &edges {
            if from < ranks.len() && to < ranks.len() && ranks[to] < ranks[from] {
                prop_assert!(position[to] < position[from]);
            }
        }
    }

    #[test]
    fn prop_cyclic_graphs_terminate_with_a_total_order(
        count in 1..30usize,
        edges in proptest::collection::vec((0..30usize, 0..30usize), 0..120)
    ) {
        let nodes = build(count, &edges, |_, _| true);
        let orderer = DependencyOrderer::new(nodes);

        let order = orderer.order();
        prop_assert!(is_permutation(&order, count));

        // Dependencies outside a node's own cycle still come first
        let mut component: Vec<usize> = (0..count).collect();
        for (group, members) in orderer.cycles().iter().enumerate() {
            for &member in members {
                component[member] = count + group;
            }
        }
        let position = positions(&order);
        for &(from, to) in &edges {
            if from < count && to < count && component[from] != component[to] {
                prop_assert!(position[to] < position[from]);
            }
        }
    }

    #[test]
    fn prop_ordering_is_deterministic(
        count in 1..20usize,
        edges in proptest::collection::vec((0..20usize, 0..20usize), 0..60)
    ) {
        let nodes = build(count, &edges, |_, _| true);
        let first = DependencyOrderer::new(nodes.clone()).order();
        let second = DependencyOrderer::new(nodes).order();
        prop_assert_eq!(first, second);
    }
}

#[test]
fn test_unknown_dependencies_are_ignored() {
    let orderer = DependencyOrderer::new(vec![
        OrderNode::new("Game", ["mscorlib", "System", "FNA"]),
        OrderNode::new("Level", ["Game"]),
    ]);
    assert_eq!(orderer.order(), vec![0, 1]);
}

#[test]
fn test_long_reversed_chain() {
    // M0 -> M1 -> ... -> M49, discovered dependents first
    let nodes: Vec<OrderNode> = (0..50)
        .map(|i| {
            let dependencies: Vec<String> = if i + 1 < 50 {
                vec![format!("M{}", i + 1)]
            } else {
                Vec::new()
            };
            OrderNode::new(format!("M{}", i), dependencies)
        })
        .collect();

    let order = DependencyOrderer::new(nodes).order();
    assert_eq!(order, (0..50).rev().collect::<Vec<_>>());
}
