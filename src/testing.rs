//! Support code shared by the crate's unit tests: an in-memory file
//! system, an in-memory build log, and shorthand for assembling graphs.

use std::collections::HashMap;
use std::io;

use crate::build_log::{BuildLog, LogEntry};
use crate::eval::{EvalPart, EvalString};
use crate::fs::FileSystem;
use crate::graph::{DepKind, EdgeId, MTime, Rule, RuleId};
use crate::state::State;

struct VirtualFile {
    mtime: u64,
    contents: Vec<u8>,
}

/// An in-memory file system with explicit mtimes, standing in for the
/// real disk so scans are deterministic.
pub struct VirtualFileSystem {
    files: HashMap<String, VirtualFile>,
    /// Clock for files created through the FileSystem trait.
    now: u64,
}

impl VirtualFileSystem {
    pub fn new() -> Self {
        VirtualFileSystem {
            files: HashMap::new(),
            now: 0,
        }
    }

    pub fn create(&mut self, path: &str, mtime: u64, contents: &str) {
        self.now = self.now.max(mtime);
        self.files.insert(
            path.to_owned(),
            VirtualFile {
                mtime,
                contents: contents.as_bytes().to_vec(),
            },
        );
    }

    pub fn remove(&mut self, path: &str) {
        self.files.remove(path);
    }
}

impl FileSystem for VirtualFileSystem {
    fn stat(&self, path: &str) -> io::Result<MTime> {
        Ok(match self.files.get(path) {
            Some(file) => MTime::Stamp(file.mtime),
            None => MTime::Missing,
        })
    }

    fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        match self.files.get(path) {
            Some(file) => Ok(file.contents.clone()),
            None => Err(io::Error::from(io::ErrorKind::NotFound)),
        }
    }

    fn write_file(&mut self, path: &str, contents: &[u8]) -> io::Result<()> {
        self.now += 1;
        self.files.insert(
            path.to_owned(),
            VirtualFile {
                mtime: self.now,
                contents: contents.to_vec(),
            },
        );
        Ok(())
    }

    fn make_dirs(&mut self, _path: &str) -> io::Result<()> {
        Ok(())
    }

    fn remove_file(&mut self, path: &str) -> io::Result<bool> {
        Ok(self.files.remove(path).is_some())
    }
}

/// An in-memory build log.
pub struct MemLog {
    entries: HashMap<String, LogEntry>,
}

impl MemLog {
    pub fn new() -> Self {
        MemLog {
            entries: HashMap::new(),
        }
    }

    pub fn record(&mut self, path: &str, command: &str) {
        self.entries.insert(
            path.to_owned(),
            LogEntry {
                command: command.to_owned(),
            },
        );
    }
}

impl BuildLog for MemLog {
    fn lookup_by_output(&self, path: &str) -> Option<&LogEntry> {
        self.entries.get(path)
    }
}

/// Build an EvalString from `$var`-style text.  Variable names are
/// alphanumeric plus underscore, which is all the tests need.
pub fn eval(text: &str) -> EvalString {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            literal.push(c);
            continue;
        }
        if !literal.is_empty() {
            parts.push(EvalPart::Literal(std::mem::take(&mut literal)));
        }
        let mut name = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                chars.next();
            } else {
                break;
            }
        }
        parts.push(EvalPart::VarRef(name));
    }
    if !literal.is_empty() {
        parts.push(EvalPart::Literal(literal));
    }
    EvalString::new(parts)
}

/// Look up a rule by name, creating a `name $in > $out` rule on first use,
/// the way the test manifests all revolve around `cat`.
fn rule_id(state: &mut State, name: &str) -> RuleId {
    if let Some(id) = state.lookup_rule(name) {
        return id;
    }
    let mut rule = Rule::new(name);
    rule.command = eval(&format!("{} $in > $out", name));
    state.add_rule(rule).unwrap()
}

/// The classic compile-like rule: `cat $in > $out` with a `$out.d` depfile.
pub fn catdep_rule(state: &mut State) -> RuleId {
    if let Some(id) = state.lookup_rule("catdep") {
        return id;
    }
    let mut rule = Rule::new("catdep");
    rule.command = eval("cat $in > $out");
    rule.depfile = eval("$out.d");
    state.add_rule(rule).unwrap()
}

/// Declare one build edge the way a manifest line would.
pub fn add_edge(
    state: &mut State,
    rule: &str,
    explicit: &[&str],
    implicit: &[&str],
    order_only: &[&str],
    outs: &[&str],
) -> anyhow::Result<EdgeId> {
    let rule = rule_id(state, rule);
    let edge = state.add_edge(rule);
    for path in explicit {
        state.add_in(edge, path, DepKind::Explicit);
    }
    for path in implicit {
        state.add_in(edge, path, DepKind::Implicit);
    }
    for path in order_only {
        state.add_in(edge, path, DepKind::OrderOnly);
    }
    for path in outs {
        state.add_out(edge, path)?;
    }
    Ok(edge)
}
