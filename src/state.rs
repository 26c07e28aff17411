//! The owning container for the build graph: all nodes, rules, and edges.
//!
//! Edges and nodes refer to each other by id; the maps here are the only
//! owners.  The manifest parser populates a State, and the scan reads and
//! annotates it.

use std::collections::HashMap;

use anyhow::bail;

use crate::canon::canon_path;
use crate::densemap::DenseMap;
use crate::eval::Vars;
use crate::graph::{DepKind, Edge, EdgeId, Node, NodeId, Rule, RuleId};

/// Reserved rule name for edges that merely alias their inputs; such edges
/// have no command and contribute no freshness of their own.
pub const PHONY_RULE: &str = "phony";

pub struct State {
    nodes: DenseMap<NodeId, Node>,
    /// Canonical path to node, the identity map for files.
    paths: HashMap<String, NodeId>,
    edges: DenseMap<EdgeId, Edge>,
    rules: DenseMap<RuleId, Rule>,
    rule_names: HashMap<String, RuleId>,
    /// Top-level manifest variable bindings.
    pub bindings: Vars,
}

impl State {
    pub fn new() -> State {
        let mut state = State {
            nodes: DenseMap::new(),
            paths: HashMap::new(),
            edges: DenseMap::new(),
            rules: DenseMap::new(),
            rule_names: HashMap::new(),
            bindings: Vars::default(),
        };
        let phony = state.rules.push(Rule::new(PHONY_RULE));
        state.rule_names.insert(PHONY_RULE.to_owned(), phony);
        state
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes.get_mut(id)
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        self.edges.get(id)
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> &mut Edge {
        self.edges.get_mut(id)
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        self.rules.get(id)
    }

    pub fn add_rule(&mut self, rule: Rule) -> anyhow::Result<RuleId> {
        if self.rule_names.contains_key(&rule.name) {
            bail!("duplicate rule '{}'", rule.name);
        }
        let name = rule.name.clone();
        let id = self.rules.push(rule);
        self.rule_names.insert(name, id);
        Ok(id)
    }

    pub fn lookup_rule(&self, name: &str) -> Option<RuleId> {
        self.rule_names.get(name).copied()
    }

    /// Look up or create the node for a path, canonicalizing first so every
    /// spelling of the same file lands on the same node.
    pub fn node_id(&mut self, path: impl Into<String>) -> NodeId {
        let path = canon_path(path);
        match self.paths.get(&path) {
            Some(&id) => id,
            None => {
                let id = self.nodes.push(Node::new(path.clone()));
                self.paths.insert(path, id);
                id
            }
        }
    }

    pub fn lookup_node(&self, path: impl Into<String>) -> Option<NodeId> {
        self.paths.get(&canon_path(path)).copied()
    }

    pub fn add_edge(&mut self, rule: RuleId) -> EdgeId {
        self.edges.push(Edge::new(rule))
    }

    /// Append an input of the given kind, keeping the explicit span before
    /// the implicit span before the order-only span.
    pub fn add_in(&mut self, edge_id: EdgeId, path: &str, kind: DepKind) {
        let node = self.node_id(path);
        let edge = self.edges.get_mut(edge_id);
        let pos = match kind {
            DepKind::Explicit => {
                edge.inputs.len() - edge.implicit_deps - edge.order_only_deps
            }
            DepKind::Implicit => {
                edge.implicit_deps += 1;
                edge.inputs.len() - edge.order_only_deps
            }
            DepKind::OrderOnly => {
                edge.order_only_deps += 1;
                edge.inputs.len()
            }
        };
        edge.inputs.insert(pos, node);
        self.nodes.get_mut(node).out_edges.push(edge_id);
    }

    /// Append an output.  A node can have at most one producing edge.
    pub fn add_out(&mut self, edge_id: EdgeId, path: &str) -> anyhow::Result<()> {
        let node_id = self.node_id(path);
        let node = self.nodes.get_mut(node_id);
        if node.in_edge.is_some() {
            bail!("multiple rules generate {}", node.path);
        }
        node.in_edge = Some(edge_id);
        self.edges.get_mut(edge_id).outputs.push(node_id);
        Ok(())
    }

    /// Outputs that nothing else consumes, in node-creation order (manifest
    /// order when the graph was built by a parser).
    pub fn root_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .ids()
            .filter(|&id| {
                let node = self.nodes.get(id);
                node.in_edge.is_some() && node.out_edges.is_empty()
            })
            .collect()
    }

    /// Forget all stat results and scan annotations without touching the
    /// graph structure, so the next scan starts fresh.
    pub fn reset(&mut self) {
        for node in self.nodes.values_mut() {
            node.reset_state();
        }
        for edge in self.edges.values_mut() {
            edge.outputs_ready = false;
        }
    }
}

impl Default for State {
    fn default() -> Self {
        State::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn canonicalization_unifies_nodes() {
        let mut state = State::new();
        let a = state.node_id("./foo/../a.h");
        let b = state.node_id("a.h");
        assert_eq!(a, b);
        assert_eq!(state.node(a).path, "a.h");
        assert_eq!(state.lookup_node("foo/bar/../../a.h"), Some(a));
        assert_eq!(state.lookup_node("b.h"), None);
    }

    #[test]
    fn duplicate_output_fails() {
        let mut state = State::new();
        testing::add_edge(&mut state, "cat", &["in1"], &[], &[], &["out"]).unwrap();
        let err = testing::add_edge(&mut state, "cat", &["in2"], &[], &[], &["out"])
            .unwrap_err();
        assert_eq!(err.to_string(), "multiple rules generate out");
    }

    #[test]
    fn duplicate_rule_fails() {
        let mut state = State::new();
        assert!(state.add_rule(Rule::new("cc")).is_ok());
        assert!(state.add_rule(Rule::new("cc")).is_err());
        assert!(state.add_rule(Rule::new(PHONY_RULE)).is_err());
    }

    #[test]
    fn inputs_keep_span_order_regardless_of_call_order() {
        let mut state = State::new();
        let rule = state.lookup_rule(PHONY_RULE).unwrap();
        let edge = state.add_edge(rule);
        state.add_in(edge, "oo", DepKind::OrderOnly);
        state.add_in(edge, "imp", DepKind::Implicit);
        state.add_in(edge, "a", DepKind::Explicit);
        state.add_in(edge, "b", DepKind::Explicit);

        let paths: Vec<&str> = state
            .edge(edge)
            .inputs
            .iter()
            .map(|&id| state.node(id).path.as_str())
            .collect();
        assert_eq!(paths, ["a", "b", "imp", "oo"]);
    }

    #[test]
    fn root_nodes_are_unconsumed_outputs() {
        let mut state = State::new();
        testing::add_edge(&mut state, "cat", &["in1"], &[], &[], &["out1"]).unwrap();
        testing::add_edge(&mut state, "cat", &["in1"], &[], &[], &["mid1"]).unwrap();
        testing::add_edge(&mut state, "cat", &["mid1"], &[], &[], &["out2"]).unwrap();
        testing::add_edge(&mut state, "cat", &["mid1"], &[], &[], &["out3", "out4"]).unwrap();

        let roots = state.root_nodes();
        assert_eq!(roots.len(), 4);
        for id in roots {
            assert!(state.node(id).path.starts_with("out"));
        }
    }

    #[test]
    fn reset_clears_scan_state_only() {
        let mut fs = testing::VirtualFileSystem::new();
        fs.create("in", 1, "");
        let mut state = State::new();
        let edge = testing::add_edge(&mut state, "cat", &["in"], &[], &[], &["out"]).unwrap();

        let node = state.lookup_node("in").unwrap();
        state.node_mut(node).stat(&fs).unwrap();
        state.node_mut(node).dirty = true;
        state.edge_mut(edge).outputs_ready = true;

        state.reset();
        assert!(!state.node(node).status_known());
        assert!(!state.node(node).dirty);
        assert!(!state.edge(edge).outputs_ready);
        assert_eq!(state.edge(edge).inputs.len(), 1);
    }
}
