//! Abstraction over file system access, so scans can run against either
//! the real disk or an in-memory tree in tests.

use std::io;
use std::time::UNIX_EPOCH;

use crate::graph::MTime;

pub trait FileSystem {
    /// stat() a path, producing its MTime.  Absence is `MTime::Missing`,
    /// not an error; errors are real I/O failures.
    fn stat(&self, path: &str) -> io::Result<MTime>;
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>>;
    fn write_file(&mut self, path: &str, contents: &[u8]) -> io::Result<()>;
    fn make_dirs(&mut self, path: &str) -> io::Result<()>;
    /// Returns whether the file was present to remove.
    fn remove_file(&mut self, path: &str) -> io::Result<bool>;
}

pub struct RealFileSystem {}

impl RealFileSystem {
    pub fn new() -> Self {
        RealFileSystem {}
    }
}

impl Default for RealFileSystem {
    fn default() -> Self {
        RealFileSystem::new()
    }
}

impl FileSystem for RealFileSystem {
    fn stat(&self, path: &str) -> io::Result<MTime> {
        match std::fs::metadata(path) {
            Ok(meta) => {
                // Timestamps compare at seconds resolution.
                let secs = meta
                    .modified()?
                    .duration_since(UNIX_EPOCH)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?
                    .as_secs();
                Ok(MTime::Stamp(secs))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(MTime::Missing),
            Err(err) => Err(err),
        }
    }

    fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write_file(&mut self, path: &str, contents: &[u8]) -> io::Result<()> {
        std::fs::write(path, contents)
    }

    fn make_dirs(&mut self, path: &str) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn remove_file(&mut self, path: &str) -> io::Result<bool> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }
}
