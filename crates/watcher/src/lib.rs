//! Directory watching with debounced handler dispatch
//!
//! This crate provides:
//! - An inotify watch session over a single directory
//! - A decoder for the raw inotify event stream
//! - A fixed-window debounce dispatcher that runs one handler per burst
//! - A shutdown latch wired to SIGINT/SIGTERM

#[cfg(not(target_os = "linux"))]
compile_error!("dropwatch requires Linux inotify");

pub mod config;
pub mod decode;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod session;
pub mod shutdown;
mod sys;

// Re-exports
pub use config::WatchConfig;
pub use dispatch::{
    CommandHandler, DispatchState, DispatchStats, Dispatcher, EventSource, Exit, Handler,
};
pub use error::WatchError;
pub use event::{EventKind, EventMask, RawEvent};
pub use session::{Readiness, WatchSession};
pub use shutdown::Shutdown;

/// Result type for watcher operations
pub type Result<T> = std::result::Result<T, WatchError>;
