//! Dropwatch CLI internals
//!
//! Configuration resolution, logging setup and the command implementations
//! behind the `dropwatch` binary.

pub mod cmd;
pub mod config;
pub mod logging;

pub use config::{ConfigFile, InstanceConfig, WatchArgs};
