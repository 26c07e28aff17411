//! Interface to the persistent log of past builds.  The scan asks it one
//! question: what command last produced a given output?  An output the log
//! has never seen has never been built.

/// What the log remembers about the last successful build of one output.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub command: String,
}

pub trait BuildLog {
    fn lookup_by_output(&self, path: &str) -> Option<&LogEntry>;
}
