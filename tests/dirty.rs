//! Dirty scans against a real directory on disk, driving the crate the way
//! an embedding build tool would: absolute paths, real stat timestamps, a
//! real depfile.

use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use stale::eval::{EvalPart, EvalString};
use stale::graph::{DepKind, Rule};
use stale::scan::DependencyScan;
use stale::state::State;

/// Some arbitrary but fixed date, so tests control mtimes exactly.
const BASE: u64 = 1_600_000_000;

/// A temporary directory with mtime-controlled files.
struct TestSpace {
    dir: tempfile::TempDir,
}

impl TestSpace {
    fn new() -> anyhow::Result<Self> {
        Ok(TestSpace {
            dir: tempfile::tempdir()?,
        })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn abs(&self, name: &str) -> String {
        self.path(name).to_str().expect("utf-8 path").to_owned()
    }

    /// Write a file and pin its mtime to BASE + offset seconds.
    fn create(&self, name: &str, offset: u64, contents: &str) -> anyhow::Result<()> {
        let path = self.path(name);
        std::fs::write(&path, contents)?;
        set_mtime(&path, BASE + offset)?;
        Ok(())
    }

    fn remove(&self, name: &str) -> anyhow::Result<()> {
        std::fs::remove_file(self.path(name))?;
        Ok(())
    }
}

fn set_mtime(path: &Path, secs: u64) -> anyhow::Result<()> {
    let file = std::fs::OpenOptions::new().write(true).open(path)?;
    file.set_modified(UNIX_EPOCH + Duration::from_secs(secs))?;
    Ok(())
}

fn eval(parts: Vec<EvalPart>) -> EvalString {
    EvalString::new(parts)
}

fn lit(text: &str) -> EvalPart {
    EvalPart::Literal(text.to_owned())
}

fn var(name: &str) -> EvalPart {
    EvalPart::VarRef(name.to_owned())
}

fn cat_rule(state: &mut State) -> anyhow::Result<stale::graph::RuleId> {
    let mut rule = Rule::new("cat");
    rule.command = eval(vec![lit("cat "), var("in"), lit(" > "), var("out")]);
    state.add_rule(rule)
}

fn catdep_rule(state: &mut State) -> anyhow::Result<stale::graph::RuleId> {
    let mut rule = Rule::new("catdep");
    rule.command = eval(vec![lit("cat "), var("in"), lit(" > "), var("out")]);
    rule.depfile = eval(vec![var("out"), lit(".d")]);
    state.add_rule(rule)
}

fn scan(state: &mut State, edge: stale::graph::EdgeId) -> anyhow::Result<()> {
    let fs = stale::fs::RealFileSystem::new();
    DependencyScan::new(state, None, &fs).recompute_dirty(edge)
}

fn is_dirty(state: &State, path: &str) -> bool {
    state.node(state.lookup_node(path).unwrap()).dirty
}

#[test]
fn output_newer_than_input_is_clean_until_input_changes() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.create("in", 0, "hello")?;
    space.create("out", 2, "hello")?;

    let mut state = State::new();
    let cat = cat_rule(&mut state)?;
    let edge = state.add_edge(cat);
    state.add_in(edge, &space.abs("in"), DepKind::Explicit);
    state.add_out(edge, &space.abs("out"))?;

    scan(&mut state, edge)?;
    assert!(!is_dirty(&state, &space.abs("out")));
    assert!(state.edge(edge).outputs_ready);

    // Touch the input and rescan; the output must now rebuild.
    set_mtime(&space.path("in"), BASE + 4)?;
    state.reset();
    scan(&mut state, edge)?;
    assert!(is_dirty(&state, &space.abs("out")));
    assert!(!state.edge(edge).outputs_ready);
    Ok(())
}

#[test]
fn depfile_discovered_header_triggers_rebuild() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.create("foo.cc", 0, "")?;
    space.create("foo.h", 0, "")?;
    space.create("out.o", 2, "")?;
    space.create(
        "out.o.d",
        2,
        &format!("{}: {}\n", space.abs("out.o"), space.abs("foo.h")),
    )?;

    let mut state = State::new();
    let catdep = catdep_rule(&mut state)?;
    let edge = state.add_edge(catdep);
    state.add_in(edge, &space.abs("foo.cc"), DepKind::Explicit);
    state.add_out(edge, &space.abs("out.o"))?;

    scan(&mut state, edge)?;
    assert!(!is_dirty(&state, &space.abs("out.o")));
    assert_eq!(state.edge(edge).depfile_implicit_deps, 1);

    // The header the compiler discovered last time has changed.
    set_mtime(&space.path("foo.h"), BASE + 4)?;
    state.reset();
    scan(&mut state, edge)?;
    assert!(is_dirty(&state, &space.abs("out.o")));
    Ok(())
}

#[test]
fn deleting_the_depfile_forces_rebuild() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.create("foo.cc", 0, "")?;
    space.create("foo.h", 0, "")?;
    space.create("out.o", 2, "")?;
    space.create(
        "out.o.d",
        2,
        &format!("{}: {}\n", space.abs("out.o"), space.abs("foo.h")),
    )?;

    let mut state = State::new();
    let catdep = catdep_rule(&mut state)?;
    let edge = state.add_edge(catdep);
    state.add_in(edge, &space.abs("foo.cc"), DepKind::Explicit);
    state.add_out(edge, &space.abs("out.o"))?;

    scan(&mut state, edge)?;
    assert!(!is_dirty(&state, &space.abs("out.o")));

    space.remove("out.o.d")?;
    state.reset();
    scan(&mut state, edge)?;
    assert!(is_dirty(&state, &space.abs("out.o")));
    Ok(())
}
