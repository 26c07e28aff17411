//! The build graph: nodes (files), the rules that describe how to make
//! them, and the edges binding rules to inputs and outputs.

use std::borrow::Cow;

use anyhow::Context;

use crate::densemap;
use crate::eval::{Env, EvalString, Vars};
use crate::fs::FileSystem;
use crate::state::State;

/// Stat information for a file, which also models "not looked yet" and
/// "looked, absent".  The variant order gives the timestamp ordering used
/// everywhere: unexamined sorts before missing sorts before any real stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MTime {
    /// The file hasn't been examined.
    Unknown,
    /// We looked, and the file doesn't exist.
    Missing,
    /// Modification time in seconds since the epoch.
    Stamp(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);
impl From<usize> for NodeId {
    fn from(u: usize) -> NodeId {
        NodeId(u)
    }
}
impl densemap::Index for NodeId {
    fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(usize);
impl From<usize> for EdgeId {
    fn from(u: usize) -> EdgeId {
        EdgeId(u)
    }
}
impl densemap::Index for EdgeId {
    fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId(usize);
impl From<usize> for RuleId {
    fn from(u: usize) -> RuleId {
        RuleId(u)
    }
}
impl densemap::Index for RuleId {
    fn index(&self) -> usize {
        self.0
    }
}

/// A file in the graph, identified by its canonical path.
#[derive(Debug)]
pub struct Node {
    pub path: String,
    pub mtime: MTime,
    /// Out of date relative to its inputs.  Only meaningful after the edge
    /// producing this node has been scanned.
    pub dirty: bool,
    /// The edge that produces this node, if any.
    pub in_edge: Option<EdgeId>,
    /// Edges consuming this node as an input, in manifest order.
    pub out_edges: Vec<EdgeId>,
}

impl Node {
    pub fn new(path: String) -> Node {
        Node {
            path,
            mtime: MTime::Unknown,
            dirty: false,
            in_edge: None,
            out_edges: Vec::new(),
        }
    }

    /// stat() the file and record the result.  Returns whether it exists.
    pub fn stat(&mut self, fs: &dyn FileSystem) -> anyhow::Result<bool> {
        self.mtime = fs
            .stat(&self.path)
            .with_context(|| format!("stat {}", self.path))?;
        Ok(self.exists())
    }

    /// stat() unless we already have a result.  Returns whether a stat was
    /// performed.
    pub fn stat_if_necessary(&mut self, fs: &dyn FileSystem) -> anyhow::Result<bool> {
        if self.status_known() {
            return Ok(false);
        }
        self.stat(fs)?;
        Ok(true)
    }

    /// Forget stat and dirty state, as if never examined.
    pub fn reset_state(&mut self) {
        self.mtime = MTime::Unknown;
        self.dirty = false;
    }

    /// Record the file as examined-and-absent without touching the disk.
    pub fn mark_missing(&mut self) {
        self.mtime = MTime::Missing;
    }

    pub fn exists(&self) -> bool {
        matches!(self.mtime, MTime::Stamp(_))
    }

    pub fn status_known(&self) -> bool {
        self.mtime != MTime::Unknown
    }
}

/// A named recipe: an unexpanded command template plus the metadata that
/// controls rescanning of edges built with it.
#[derive(Debug, Default)]
pub struct Rule {
    pub name: String,
    pub command: EvalString,
    pub description: EvalString,
    pub depfile: EvalString,
    pub rspfile: EvalString,
    pub rspfile_content: EvalString,
    /// Edges using this rule are exempt from command-change rebuilds.
    pub generator: bool,
    /// Outputs whose mtime is unchanged after running may be treated as
    /// clean by the scheduler.
    pub restat: bool,
}

impl Rule {
    pub fn new(name: impl Into<String>) -> Rule {
        Rule {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// How an input was declared in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepKind {
    /// Listed before `|`; surfaces as `$in`.
    Explicit,
    /// Listed after `|`; affects staleness but not `$in`.
    Implicit,
    /// Listed after `||`; must exist before building but never causes
    /// rebuilds.
    OrderOnly,
}

/// One build step: a rule applied to ordered inputs to produce outputs.
///
/// The inputs are one sequence partitioned into explicit, implicit, and
/// order-only spans by two counters; a third counter records how many of
/// the implicit inputs were discovered from the depfile, so they sit
/// immediately before the order-only span.
#[derive(Debug)]
pub struct Edge {
    pub rule: RuleId,
    pub inputs: Vec<NodeId>,
    pub outputs: Vec<NodeId>,
    /// Per-edge variable bindings, consulted before the manifest scope.
    pub bindings: Vars,
    /// Cached scan result: outputs are clean and all producers are ready.
    pub outputs_ready: bool,
    pub implicit_deps: usize,
    pub order_only_deps: usize,
    pub depfile_implicit_deps: usize,
}

impl Edge {
    pub fn new(rule: RuleId) -> Edge {
        Edge {
            rule,
            inputs: Vec::new(),
            outputs: Vec::new(),
            bindings: Vars::default(),
            outputs_ready: false,
            implicit_deps: 0,
            order_only_deps: 0,
            depfile_implicit_deps: 0,
        }
    }

    pub fn is_implicit(&self, index: usize) -> bool {
        index >= self.inputs.len() - self.order_only_deps - self.implicit_deps
            && !self.is_order_only(index)
    }

    pub fn is_order_only(&self, index: usize) -> bool {
        index >= self.inputs.len() - self.order_only_deps
    }

    pub fn is_depfile_implicit(&self, index: usize) -> bool {
        index >= self.inputs.len() - self.order_only_deps - self.depfile_implicit_deps
            && !self.is_order_only(index)
    }

    /// The explicit inputs, as surfaced by `$in`.
    pub fn explicit_inputs(&self) -> &[NodeId] {
        &self.inputs[..self.inputs.len() - self.implicit_deps - self.order_only_deps]
    }

    /// Explicit and implicit inputs together: everything that contributes
    /// to staleness.
    pub fn depend_inputs(&self) -> &[NodeId] {
        &self.inputs[..self.inputs.len() - self.order_only_deps]
    }

    pub fn is_phony(&self, state: &State) -> bool {
        state.rule(self.rule).name == crate::state::PHONY_RULE
    }

    /// Expand the rule's command against this edge's scope.  With
    /// `include_rsp`, the expanded response-file content is appended after
    /// a marker so the result fully identifies what a rebuild would run.
    pub fn evaluate_command(&self, state: &State, include_rsp: bool) -> String {
        let env = EdgeEnv { edge: self, state };
        let mut command = state.rule(self.rule).command.evaluate(&[&env]);
        if include_rsp && self.has_rspfile(state) {
            command.push_str(";rspfile=");
            command.push_str(&self.rspfile_content(state));
        }
        command
    }

    pub fn evaluate_depfile(&self, state: &State) -> String {
        let env = EdgeEnv { edge: self, state };
        state.rule(self.rule).depfile.evaluate(&[&env])
    }

    pub fn description(&self, state: &State) -> String {
        let env = EdgeEnv { edge: self, state };
        state.rule(self.rule).description.evaluate(&[&env])
    }

    pub fn rspfile(&self, state: &State) -> String {
        let env = EdgeEnv { edge: self, state };
        state.rule(self.rule).rspfile.evaluate(&[&env])
    }

    pub fn rspfile_content(&self, state: &State) -> String {
        let env = EdgeEnv { edge: self, state };
        state.rule(self.rule).rspfile_content.evaluate(&[&env])
    }

    pub fn has_rspfile(&self, state: &State) -> bool {
        !self.rspfile(state).is_empty()
    }

    /// True when every input either has no producing edge or its producing
    /// edge's outputs are ready.  This is the scheduling predicate, so
    /// order-only inputs count too.
    pub fn all_inputs_ready(&self, state: &State) -> bool {
        self.inputs.iter().all(|&id| match state.node(id).in_edge {
            None => true,
            Some(edge) => state.edge(edge).outputs_ready,
        })
    }
}

/// Variable scope for expanding an edge's templates: `$in` and `$out`
/// resolve to quoted path lists, anything else falls through to the edge's
/// bindings and then the manifest scope.
struct EdgeEnv<'a> {
    edge: &'a Edge,
    state: &'a State,
}

impl Env for EdgeEnv<'_> {
    fn get_var(&self, var: &str) -> Option<Cow<str>> {
        match var {
            "in" => Some(Cow::Owned(quote_path_list(
                self.state,
                self.edge.explicit_inputs(),
            ))),
            "out" => Some(Cow::Owned(quote_path_list(self.state, &self.edge.outputs))),
            _ => self
                .edge
                .bindings
                .get_var(var)
                .or_else(|| self.state.bindings.get_var(var)),
        }
    }
}

/// Join paths with spaces, wrapping any path containing whitespace in
/// double quotes so the command line survives shell tokenization.
fn quote_path_list(state: &State, ids: &[NodeId]) -> String {
    let mut out = String::new();
    for &id in ids {
        if !out.is_empty() {
            out.push(' ');
        }
        let path = &state.node(id).path;
        if path.contains(char::is_whitespace) {
            out.push('"');
            out.push_str(path);
            out.push('"');
        } else {
            out.push_str(path);
        }
    }
    out
}
