//! Run one watcher instance in the foreground

use crate::config::{self, WatchArgs};
use anyhow::{Context, Result};
use std::process::ExitCode;
use tracing::info;
use watcher::{CommandHandler, Dispatcher, Shutdown, WatchSession};

pub fn run(args: &WatchArgs) -> Result<ExitCode> {
    let config = config::resolve(args)?;

    let shutdown = Shutdown::new()?;
    shutdown
        .install_signal_handlers()
        .context("Failed to install signal handlers")?;

    let session = WatchSession::open(&config.path, config.mask)?;

    info!(
        label = %config.label,
        handler = %config.handler.display(),
        events = %watcher::config::describe_mask(config.mask),
        "Watching {} for changes (debounce={}s)",
        config.path.display(),
        config.debounce.as_secs_f64()
    );

    let mut dispatcher = Dispatcher::new(
        session,
        CommandHandler::new(&config.handler),
        config.debounce,
        shutdown,
    )
    .with_label(config.label.as_str());

    let outcome = dispatcher.run();
    let stats = dispatcher.stats().clone();
    // Release the watch before reporting, on every outcome
    dispatcher.into_source().close();

    info!(
        label = %config.label,
        bursts = stats.bursts,
        events = stats.events,
        handler_failures = stats.handler_failures,
        spurious_wakeups = stats.spurious_wakeups,
        overflows = stats.overflows,
        "watcher stopped"
    );

    let exit = outcome?;
    Ok(ExitCode::from(exit.code()))
}
