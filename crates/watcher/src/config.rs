//! Watch configuration

use crate::error::WatchError;
use crate::event::{EventKind, EventMask};
use crate::Result;
use std::path::PathBuf;
use std::time::Duration;

/// Default quiet window after the first event of a burst
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

/// Everything one watcher instance needs; fixed for the process lifetime
#[derive(Debug, Clone, PartialEq)]
pub struct WatchConfig {
    /// Absolute path of the watched directory
    pub path: PathBuf,
    /// Event kinds to register for
    pub mask: EventMask,
    /// Fixed quiet window after the first event of a burst
    pub debounce: Duration,
    /// Executable run once per burst
    pub handler: PathBuf,
    /// Operator-facing name used in log lines
    pub label: String,
}

impl WatchConfig {
    pub fn new(path: impl Into<PathBuf>, handler: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "watcher".to_string());

        Self {
            path,
            mask: EventMask::default(),
            debounce: DEFAULT_DEBOUNCE,
            handler: handler.into(),
            label,
        }
    }

    pub fn with_mask(mut self, mask: EventMask) -> Self {
        self.mask = mask;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Check the invariants the session and dispatcher rely on
    pub fn validate(&self) -> Result<()> {
        if !self.path.is_absolute() {
            return Err(WatchError::InvalidConfig(format!(
                "watched path must be absolute: {}",
                self.path.display()
            )));
        }

        if self.handler.as_os_str().is_empty() {
            return Err(WatchError::InvalidConfig("handler path is empty".to_string()));
        }

        if self.mask.registration_bits().is_empty() {
            return Err(WatchError::InvalidConfig(format!(
                "no registrable event kinds selected (got: {})",
                describe_mask(self.mask)
            )));
        }

        Ok(())
    }
}

/// Comma-separated kind names for a mask
pub fn describe_mask(mask: EventMask) -> String {
    let kinds = EventKind::from_mask(mask);
    if kinds.is_empty() {
        return "none".to_string();
    }
    kinds
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
