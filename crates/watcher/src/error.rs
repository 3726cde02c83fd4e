//! Error types for the watch session and dispatcher

use nix::errno::Errno;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    /// inotify_init1 failed
    #[error("inotify_init failed: {0}")]
    ChannelCreate(#[source] Errno),

    /// inotify_add_watch failed for the watched directory
    #[error("inotify_add_watch failed for {}: {source}", path.display())]
    AddWatch {
        path: PathBuf,
        #[source]
        source: Errno,
    },

    /// Path cannot be handed to the kernel (interior NUL byte)
    #[error("path cannot be watched: {}", .0.display())]
    InvalidPath(PathBuf),

    /// poll on the notification channel failed
    #[error("waiting for events failed: {0}")]
    Wait(#[source] Errno),

    /// read on the notification channel failed
    #[error("reading events failed: {0}")]
    Read(#[source] Errno),

    /// Shutdown latch or signal handler setup failed
    #[error("shutdown signal setup failed: {0}")]
    Shutdown(#[source] std::io::Error),

    #[error("invalid watch configuration: {0}")]
    InvalidConfig(String),
}

impl WatchError {
    /// OS error code behind this error, when there is one
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Self::ChannelCreate(errno)
            | Self::Wait(errno)
            | Self::Read(errno)
            | Self::AddWatch { source: errno, .. } => Some(*errno),
            Self::Shutdown(err) => err.raw_os_error().map(Errno::from_i32),
            Self::InvalidPath(_) | Self::InvalidConfig(_) => None,
        }
    }
}
