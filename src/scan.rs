//! Dirty computation: walking an edge's inputs to decide which of its
//! outputs are out of date and must be rebuilt.

use std::collections::HashSet;
use std::sync::atomic::AtomicBool;

use anyhow::{anyhow, bail};
use tracing::debug;

use crate::build_log::BuildLog;
use crate::depfile;
use crate::fs::FileSystem;
use crate::graph::{EdgeId, MTime, NodeId};
use crate::scanner::Scanner;
use crate::state::State;

/// Gates the missing-manifest-dependency diagnostic.  The scan itself never
/// consults this; callers check it after a successful scan and run
/// [`DependencyScan::missing_dependencies`] on edges with depfiles.
pub static DEPCHECK: AtomicBool = AtomicBool::new(false);

/// Scans the files in a graph, updating the dirty and outputs-ready state
/// of nodes and edges as it goes.
pub struct DependencyScan<'a> {
    state: &'a mut State,
    build_log: Option<&'a dyn BuildLog>,
    fs: &'a dyn FileSystem,
}

impl<'a> DependencyScan<'a> {
    pub fn new(
        state: &'a mut State,
        build_log: Option<&'a dyn BuildLog>,
        fs: &'a dyn FileSystem,
    ) -> Self {
        DependencyScan {
            state,
            build_log,
            fs,
        }
    }

    /// Examine inputs, outputs, and the command line to judge whether the
    /// edge needs to re-run, updating each output's dirty flag and the
    /// edge's outputs_ready state.
    pub fn recompute_dirty(&mut self, edge_id: EdgeId) -> anyhow::Result<()> {
        let mut dirty = false;
        let mut inputs_ready = true;
        self.state.edge_mut(edge_id).outputs_ready = true;

        if !self.load_depfile(edge_id)? {
            // The depfile is gone; the implicit dependency set can only be
            // re-derived by rebuilding.
            debug!(
                "depfile of edge producing {} is missing; rebuilding",
                self.state.node(self.state.edge(edge_id).outputs[0]).path
            );
            dirty = true;
        }

        // Visit all inputs; we're dirty if any of them are.  The length is
        // re-read each pass because loading sub-edge depfiles can grow
        // input lists.
        let mut most_recent: Option<NodeId> = None;
        let mut i = 0;
        while i < self.state.edge(edge_id).inputs.len() {
            let input = self.state.edge(edge_id).inputs[i];
            if self.state.node_mut(input).stat_if_necessary(self.fs)? {
                match self.state.node(input).in_edge {
                    // First sight of this input: scan whatever produces it.
                    Some(in_edge) => self.recompute_dirty(in_edge)?,
                    // A source file is dirty only by being absent.
                    None => {
                        let missing = !self.state.node(input).exists();
                        self.state.node_mut(input).dirty = missing;
                        if missing {
                            debug!("source {} is missing", self.state.node(input).path);
                        }
                    }
                }
            }

            let is_order_only = self.state.edge(edge_id).is_order_only(i);
            if let Some(in_edge) = self.state.node(input).in_edge {
                if !is_order_only && !self.state.edge(in_edge).outputs_ready {
                    inputs_ready = false;
                }
            }
            if !is_order_only {
                if self.state.node(input).dirty {
                    dirty = true;
                } else {
                    // Track the most recent input, except that a missing
                    // output of a phony edge is an alias, not a timestamp.
                    let node = self.state.node(input);
                    let phony_missing = node.mtime == MTime::Missing
                        && node
                            .in_edge
                            .map_or(false, |e| self.state.edge(e).is_phony(self.state));
                    let newer = match most_recent {
                        None => true,
                        Some(prev) => node.mtime > self.state.node(prev).mtime,
                    };
                    if !phony_missing && newer {
                        most_recent = Some(input);
                    }
                }
            }
            i += 1;
        }

        // Stat the outputs, then judge each against the inputs and the
        // previously logged command line.
        let mut i = 0;
        while i < self.state.edge(edge_id).outputs.len() {
            let output = self.state.edge(edge_id).outputs[i];
            self.state.node_mut(output).stat_if_necessary(self.fs)?;
            i += 1;
        }

        let command = self.state.edge(edge_id).evaluate_command(self.state, true);
        let mut any_dirty = false;
        for i in 0..self.state.edge(edge_id).outputs.len() {
            let output = self.state.edge(edge_id).outputs[i];
            if dirty || self.recompute_output_dirty(edge_id, most_recent, &command, output) {
                self.state.node_mut(output).dirty = true;
                any_dirty = true;
            }
        }

        if any_dirty || !inputs_ready {
            self.state.edge_mut(edge_id).outputs_ready = false;
        }
        Ok(())
    }

    /// Decide whether a single output of an edge must be rebuilt.
    /// `most_recent` is the newest non-order-only input and `command` the
    /// edge's current command line including response-file content.
    pub fn recompute_output_dirty(
        &self,
        edge_id: EdgeId,
        most_recent: Option<NodeId>,
        command: &str,
        output: NodeId,
    ) -> bool {
        let edge = self.state.edge(edge_id);
        let out = self.state.node(output);

        if edge.is_phony(self.state) {
            // Phony edges write nothing; they are dirty only when one of
            // their real inputs is absent.  An input-less phony edge is a
            // plain alias and never dirty.
            return edge
                .depend_inputs()
                .iter()
                .any(|&id| !self.state.node(id).exists());
        }

        if !out.exists() {
            debug!("output {} is missing", out.path);
            return true;
        }

        if let Some(input) = most_recent {
            let input = self.state.node(input);
            if input.mtime > out.mtime {
                debug!("output {} is older than input {}", out.path, input.path);
                return true;
            }
        }

        if let Some(log) = self.build_log {
            if !self.state.rule(edge.rule).generator {
                match log.lookup_by_output(&out.path) {
                    Some(entry) => {
                        if entry.command != command {
                            debug!("command line for {} changed", out.path);
                            return true;
                        }
                    }
                    None => {
                        debug!("{} has never been built", out.path);
                        return true;
                    }
                }
            }
        }

        false
    }

    /// Splice implicit inputs discovered from the edge's depfile, if its
    /// rule declares one.  Returns false when the depfile should exist but
    /// is gone from disk; the caller treats that as dirty-making.  I/O and
    /// parse failures are real errors.
    pub fn load_depfile(&mut self, edge_id: EdgeId) -> anyhow::Result<bool> {
        let rule = self.state.edge(edge_id).rule;
        if self.state.rule(rule).depfile.is_empty() {
            return Ok(true);
        }
        let path = self.state.edge(edge_id).evaluate_depfile(self.state);
        if path.is_empty() {
            return Ok(true);
        }

        let mut bytes = match self.fs.read_file(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(false);
            }
            Err(err) => bail!("read {}: {}", path, err),
        };
        bytes.push(0);
        let mut scanner = Scanner::new(&bytes);
        let rules = depfile::parse(&mut scanner)
            .map_err(|err| anyhow!(scanner.format_parse_error(&path, err)))?;

        // Only the first target's prerequisites belong to this edge.
        let Some(deps) = rules.into_iter().next() else {
            return Ok(true);
        };
        for dep in deps.deps {
            let node = self.state.node_id(dep);
            let edge = self.state.edge(edge_id);
            // Already declared (or spliced on an earlier scan)?  The
            // explicit and implicit spans together cover both cases.
            if edge.depend_inputs().contains(&node) {
                continue;
            }
            let edge = self.state.edge_mut(edge_id);
            let pos = edge.inputs.len() - edge.order_only_deps;
            edge.inputs.insert(pos, node);
            edge.implicit_deps += 1;
            edge.depfile_implicit_deps += 1;
            self.state.node_mut(node).out_edges.push(edge_id);
        }
        Ok(true)
    }

    /// Does `edge` depend on `node` through manifest-declared inputs alone?
    /// Depfile-discovered inputs are skipped, so this answers whether the
    /// manifest itself justifies a dependency that showed up in a depfile,
    /// which matters when the mentioned file is generated.
    pub fn has_non_depfile_dependency(state: &State, edge_id: EdgeId, node_id: NodeId) -> bool {
        let mut visited = HashSet::new();
        Self::has_non_depfile_dependency_impl(state, edge_id, node_id, &mut visited)
    }

    fn has_non_depfile_dependency_impl(
        state: &State,
        edge_id: EdgeId,
        node_id: NodeId,
        visited: &mut HashSet<EdgeId>,
    ) -> bool {
        if !visited.insert(edge_id) {
            return false;
        }
        let edge = state.edge(edge_id);
        for (i, &input) in edge.inputs.iter().enumerate() {
            if edge.is_depfile_implicit(i) {
                continue;
            }
            if input == node_id {
                return true;
            }
            if let Some(in_edge) = state.node(input).in_edge {
                // Depending on one output of an edge manifests a dependency
                // on all of its outputs, siblings included.
                if state.edge(in_edge).outputs.contains(&node_id) {
                    return true;
                }
                if Self::has_non_depfile_dependency_impl(state, in_edge, node_id, visited) {
                    return true;
                }
            }
        }
        false
    }

    /// The depfile-discovered inputs of `edge` that are generated files yet
    /// unreachable through manifest-declared dependencies.  Such files can
    /// be rewritten after the depfile was, leaving rebuilds reading stale
    /// data; callers warn about them when [`DEPCHECK`] is set.
    pub fn missing_dependencies(state: &State, edge_id: EdgeId) -> Vec<NodeId> {
        let edge = state.edge(edge_id);
        edge.inputs
            .iter()
            .enumerate()
            .filter(|&(i, _)| edge.is_depfile_implicit(i))
            .map(|(_, &id)| id)
            .filter(|&id| state.node(id).in_edge.is_some())
            .filter(|&id| !Self::has_non_depfile_dependency(state, edge_id, id))
            .collect()
    }
}
