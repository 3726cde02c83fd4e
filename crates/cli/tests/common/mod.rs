//! Common utilities for integration tests

pub mod cli;

use anyhow::Result;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch area holding a watched directory and a handler script
pub struct WatchFixture {
    root: TempDir,
}

impl WatchFixture {
    pub fn new() -> Result<Self> {
        let root = TempDir::new()?;
        fs::create_dir(root.path().join("drop"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Directory the watcher is pointed at
    pub fn watched(&self) -> PathBuf {
        self.root.path().join("drop")
    }

    /// File the handler appends one line to per invocation
    pub fn ledger(&self) -> PathBuf {
        self.root.path().join("ledger")
    }

    /// Write an executable handler that records each run, then exits with `code`
    pub fn handler(&self, code: i32) -> Result<PathBuf> {
        let script = self.root.path().join("handler.sh");
        let body = format!(
            "#!/bin/sh\necho run >> '{}'\nexit {}\n",
            self.ledger().display(),
            code
        );
        fs::write(&script, body)?;
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;
        Ok(script)
    }

    /// Number of handler runs recorded so far
    pub fn invocations(&self) -> usize {
        fs::read_to_string(self.ledger())
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    /// Drop a file into the watched directory
    pub fn drop_file(&self, name: &str) -> Result<()> {
        fs::write(self.watched().join(name), b"payload")?;
        Ok(())
    }
}
