//! Dependency ordering of catalog modules.
//!
//! The relink pipeline must finish a module's catalog dependencies before the module
//! itself, so that every identity decision it makes about them is already final. The
//! [`DependencyOrderer`] produces that order by repeatedly moving a module to just after
//! any dependency placed behind it, until a full pass moves nothing.
//!
//! # Cycles
//!
//! Mutually referencing modules cannot all come after each other. Edges inside a
//! strongly connected component are therefore ignored, and every member of a cycle
//! inherits the outside dependencies of the whole cycle, so the cycle is placed after
//! everything any member depends on. Which member of a cycle leads is unspecified.
//!
//! With intra-cycle edges dropped the remaining edges form a DAG, and on a DAG the
//! move-after-dependency rule reaches a fixpoint: nodes of height `k` only ever move
//! forward past the finitely many nodes of lower height, whose relative order is already
//! stable.
//!
//! # Examples
//!
//! ```rust
//! use asmrelink::order::{DependencyOrderer, OrderNode};
//!
//! let orderer = DependencyOrderer::new(vec![
//!     OrderNode::new("Game", ["Engine", "mscorlib"]),
//!     OrderNode::new("Engine", ["Core"]),
//!     OrderNode::new("Core", Vec::<String>::new()),
//! ]);
//!
//! assert_eq!(orderer.order(), vec![2, 1, 0]);
//! ```

use std::collections::HashMap;

/// A module as seen by the orderer: its name and the names it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderNode {
    /// Assembly name
    pub name: String,
    /// Names of referenced assemblies; names outside the node set are ignored
    pub dependencies: Vec<String>,
}

impl OrderNode {
    /// Create a node.
    pub fn new<I, S>(name: impl Into<String>, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            dependencies: dependencies.into_iter().map(Into::into).collect(),
        }
    }
}

/// Helper struct to group Tarjan's algorithm state
struct TarjanState {
    index_counter: usize,
    stack: Vec<usize>,
    indices: Vec<Option<usize>>,
    lowlinks: Vec<usize>,
    on_stack: Vec<bool>,
    components: Vec<usize>,
    component_count: usize,
}

impl TarjanState {
    fn new(size: usize) -> Self {
        Self {
            index_counter: 0,
            stack: Vec::new(),
            indices: vec![None; size],
            lowlinks: vec![0; size],
            on_stack: vec![false; size],
            components: vec![0; size],
            component_count: 0,
        }
    }
}

/// Computes a processing order over catalog modules.
#[derive(Debug, Clone)]
pub struct DependencyOrderer {
    nodes: Vec<OrderNode>,
    edges: Vec<Vec<usize>>,
    components: Vec<usize>,
}

impl DependencyOrderer {
    /// Build the dependency graph of `nodes`.
    ///
    /// Node names are expected to be unique; a repeated name resolves to its first node.
    #[must_use]
    pub fn new(nodes: Vec<OrderNode>) -> Self {
        let mut by_name: HashMap<&str, usize> = HashMap::new();
        for (index, node) in nodes.iter().enumerate() {
            by_name.entry(node.name.as_str()).or_insert(index);
        }

        let edges: Vec<Vec<usize>> = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| {
                let mut targets: Vec<usize> = Vec::new();
                for dependency in &node.dependencies {
                    if let Some(&target) = by_name.get(dependency.as_str()) {
                        if target != index && !targets.contains(&target) {
                            targets.push(target);
                        }
                    }
                }
                targets
            })
            .collect();

        let components = Self::tarjan_scc(&edges);
        let edges = Self::condense(&edges, &components);

        Self {
            nodes,
            edges,
            components,
        }
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether there are no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Groups of mutually dependent nodes, each as node indices in discovery order.
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<usize>> {
        let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
        for (node, component) in self.components.iter().enumerate() {
            groups.entry(*component).or_default().push(node);
        }

        let mut cycles: Vec<Vec<usize>> = groups
            .into_values()
            .filter(|members| members.len() > 1)
            .collect();
        cycles.sort();
        cycles
    }

    /// Compute the processing order as indices into the node list.
    ///
    /// Starts from discovery order. Whenever a node has a dependency placed after it, the
    /// node moves to immediately after that dependency. Passes repeat until one makes no
    /// move.
    #[must_use]
    pub fn order(&self) -> Vec<usize> {
        let count = self.nodes.len();
        let mut order: Vec<usize> = (0..count).collect();
        let mut position: Vec<usize> = (0..count).collect();

        log::debug!("[OrderModules] Unordered: ");
        self.log_order(&order);

        for cycle in self.cycles() {
            let names: Vec<&str> = cycle.iter().map(|&n| self.nodes[n].name.as_str()).collect();
            log::warn!(
                "[OrderModules] Circular dependency between {}, ordering them as one unit",
                names.join(", ")
            );
        }

        loop {
            let mut moved = false;

            for node in 0..count {
                for &dependency in &self.edges[node] {
                    if position[dependency] < position[node] {
                        continue;
                    }

                    log::debug!(
                        "[OrderModules] Reordering {} dependency {}",
                        self.nodes[node].name,
                        self.nodes[dependency].name
                    );

                    let from = position[node];
                    let to = position[dependency];
                    order.remove(from);
                    order.insert(to, node);
                    for (slot, &moved_node) in order.iter().enumerate().take(to + 1).skip(from) {
                        position[moved_node] = slot;
                    }
                    moved = true;
                }
            }

            if !moved {
                break;
            }
        }

        log::debug!("[OrderModules] Reordered: ");
        self.log_order(&order);
        order
    }

    fn log_order(&self, order: &[usize]) {
        for (slot, &node) in order.iter().enumerate() {
            log::debug!("[OrderModules] #{}: {}", slot + 1, self.nodes[node].name);
        }
    }

    /// Give every node the outside dependencies of its whole component.
    fn condense(edges: &[Vec<usize>], components: &[usize]) -> Vec<Vec<usize>> {
        let mut external: HashMap<usize, Vec<usize>> = HashMap::new();
        for (node, targets) in edges.iter().enumerate() {
            let component = components[node];
            let merged = external.entry(component).or_default();
            for &target in targets {
                if components[target] != component && !merged.contains(&target) {
                    merged.push(target);
                }
            }
        }

        components
            .iter()
            .map(|component| external.get(component).cloned().unwrap_or_default())
            .collect()
    }

    /// Tarjan's algorithm, returning the component id of every node
    fn tarjan_scc(edges: &[Vec<usize>]) -> Vec<usize> {
        let mut state = TarjanState::new(edges.len());

        for node in 0..edges.len() {
            if state.indices[node].is_none() {
                Self::tarjan_strongconnect(node, edges, &mut state);
            }
        }

        state.components
    }

    /// Recursive helper for Tarjan's algorithm
    fn tarjan_strongconnect(node: usize, edges: &[Vec<usize>], state: &mut TarjanState) {
        // Set the depth index for this node
        state.indices[node] = Some(state.index_counter);
        state.lowlinks[node] = state.index_counter;
        state.index_counter += 1;
        state.stack.push(node);
        state.on_stack[node] = true;

        // Consider successors of node
        for &successor in &edges[node] {
            match state.indices[successor] {
                None => {
                    // Successor has not yet been visited; recurse on it
                    Self::tarjan_strongconnect(successor, edges, state);
                    state.lowlinks[node] = state.lowlinks[node].min(state.lowlinks[successor]);
                }
                Some(successor_index) if state.on_stack[successor] => {
                    // Successor is in stack and hence in the current SCC
                    state.lowlinks[node] = state.lowlinks[node].min(successor_index);
                }
                Some(_) => {}
            }
        }

        // If node is a root node, pop the stack and create an SCC
        if Some(state.lowlinks[node]) == state.indices[node] {
            let component = state.component_count;
            state.component_count += 1;
            while let Some(member) = state.stack.pop() {
                state.on_stack[member] = false;
                state.components[member] = component;
                if member == node {
                    break;
                }
            }
        }
    }
}
