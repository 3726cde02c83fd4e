//! Fixed-window debounce dispatcher
//!
//! Drives an [`EventSource`] through `Idle -> Settling -> Draining ->
//! Dispatching -> Idle`, running the handler exactly once per burst. The
//! handler runs synchronously, so at most one invocation is ever in flight.

use crate::event::RawEvent;
use crate::session::{Readiness, WatchSession};
use crate::shutdown::Shutdown;
use crate::Result;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Where the dispatcher gets its events from
///
/// Implemented by [`WatchSession`]; tests substitute scripted sources.
pub trait EventSource {
    fn wait_for_events(&mut self, timeout: Option<Duration>, shutdown: &Shutdown)
        -> Result<Readiness>;

    fn read_events(&mut self) -> Result<Vec<RawEvent>>;
}

impl EventSource for WatchSession {
    fn wait_for_events(
        &mut self,
        timeout: Option<Duration>,
        shutdown: &Shutdown,
    ) -> Result<Readiness> {
        WatchSession::wait_for_events(self, timeout, shutdown)
    }

    fn read_events(&mut self) -> Result<Vec<RawEvent>> {
        WatchSession::read_events(self)
    }
}

/// Downstream action run once per burst
pub trait Handler {
    /// Human-readable name for log lines
    fn describe(&self) -> String;

    /// Run to completion; `Err` means the handler could not be launched
    fn invoke(&mut self) -> io::Result<ExitStatus>;
}

/// Runs an external executable with no arguments
///
/// stdin is closed; stdout, stderr, working directory and environment are
/// inherited from the watcher.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    program: PathBuf,
}

impl CommandHandler {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Handler for CommandHandler {
    fn describe(&self) -> String {
        self.program.display().to_string()
    }

    fn invoke(&mut self) -> io::Result<ExitStatus> {
        Command::new(&self.program).stdin(Stdio::null()).status()
    }
}

/// Dispatcher state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Blocked waiting for the first event of a burst
    Idle,
    /// Sleeping through the debounce window
    Settling,
    /// Absorbing everything that arrived during the window
    Draining,
    /// Running the handler
    Dispatching,
    Terminated,
}

/// Why the dispatch loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Operator asked for shutdown
    Shutdown,
    /// Watched directory deleted or watch revoked by the kernel
    Invalidated,
}

impl Exit {
    /// Process exit code for this outcome
    pub fn code(self) -> u8 {
        match self {
            Exit::Shutdown => 0,
            Exit::Invalidated => 1,
        }
    }
}

/// Counters reported when the dispatcher stops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Handler invocations
    pub bursts: u64,
    /// Records absorbed across all bursts
    pub events: u64,
    /// Handler runs that exited nonzero, died, or failed to launch
    pub handler_failures: u64,
    /// Wake-ups whose read returned nothing
    pub spurious_wakeups: u64,
    /// Kernel queue overflows seen
    pub overflows: u64,
}

pub struct Dispatcher<S, H> {
    source: S,
    handler: H,
    debounce: Duration,
    shutdown: Shutdown,
    label: String,
    state: DispatchState,
    stats: DispatchStats,
}

impl<S: EventSource, H: Handler> Dispatcher<S, H> {
    pub fn new(source: S, handler: H, debounce: Duration, shutdown: Shutdown) -> Self {
        Self {
            source,
            handler,
            debounce,
            shutdown,
            label: "watcher".to_string(),
            state: DispatchState::Idle,
            stats: DispatchStats::default(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Give the source back so the caller can release it
    pub fn into_source(self) -> S {
        self.source
    }

    /// Run cycles until shutdown or invalidation
    pub fn run(&mut self) -> Result<Exit> {
        loop {
            match self.run_cycle() {
                Ok(Some(exit)) => return Ok(exit),
                Ok(None) => {}
                Err(e) => {
                    self.transition(DispatchState::Terminated);
                    return Err(e);
                }
            }
        }
    }

    /// Run one `Idle -> ... -> Idle` cycle
    ///
    /// Returns `Some(exit)` when the loop must stop.
    pub fn run_cycle(&mut self) -> Result<Option<Exit>> {
        self.transition(DispatchState::Idle);
        if self.shutdown.requested() {
            return Ok(Some(self.terminate(Exit::Shutdown)));
        }

        match self.source.wait_for_events(None, &self.shutdown)? {
            Readiness::Ready => {}
            Readiness::Shutdown => return Ok(Some(self.terminate(Exit::Shutdown))),
            Readiness::Timeout => return Ok(None),
        }

        let first = self.source.read_events()?;
        if first.is_empty() {
            self.stats.spurious_wakeups += 1;
            debug!(label = %self.label, "woke with nothing to read");
            return Ok(None);
        }
        if let Some(exit) = self.absorb(&first) {
            return Ok(Some(exit));
        }
        let mut burst = first.len();
        let started = Instant::now();

        self.transition(DispatchState::Settling);
        if self.shutdown.sleep(self.debounce) {
            return Ok(Some(self.terminate(Exit::Shutdown)));
        }

        self.transition(DispatchState::Draining);
        loop {
            match self.source.wait_for_events(Some(Duration::ZERO), &self.shutdown)? {
                Readiness::Ready => {}
                Readiness::Timeout => break,
                Readiness::Shutdown => return Ok(Some(self.terminate(Exit::Shutdown))),
            }

            let events = self.source.read_events()?;
            if events.is_empty() {
                break;
            }
            if let Some(exit) = self.absorb(&events) {
                return Ok(Some(exit));
            }
            burst += events.len();
        }

        self.transition(DispatchState::Dispatching);
        self.dispatch(burst, started.elapsed());

        self.transition(DispatchState::Idle);
        Ok(None)
    }

    /// Count a batch; `Some` when it invalidates the watch
    fn absorb(&mut self, events: &[RawEvent]) -> Option<Exit> {
        self.stats.events += events.len() as u64;

        for event in events {
            if event.is_overflow() {
                self.stats.overflows += 1;
                warn!(label = %self.label, "inotify queue overflowed, events were dropped");
            }
        }

        if let Some(event) = events.iter().find(|e| e.is_invalidating()) {
            error!(
                label = %self.label,
                mask = ?event.mask,
                "watched directory deleted or watch removed, exiting"
            );
            return Some(self.terminate(Exit::Invalidated));
        }

        None
    }

    fn dispatch(&mut self, burst: usize, settled: Duration) {
        self.stats.bursts += 1;
        info!(
            label = %self.label,
            events = burst,
            settled_ms = settled.as_millis() as u64,
            handler = %self.handler.describe(),
            "change detected, running handler"
        );

        match self.handler.invoke() {
            Ok(status) if status.success() => {
                debug!(label = %self.label, "handler finished");
            }
            Ok(status) => {
                self.stats.handler_failures += 1;
                match status.code() {
                    Some(code) => warn!(label = %self.label, code, "handler exited with code {}", code),
                    None => warn!(
                        label = %self.label,
                        signal = status.signal(),
                        "handler terminated by signal"
                    ),
                }
            }
            Err(e) => {
                self.stats.handler_failures += 1;
                warn!(
                    label = %self.label,
                    handler = %self.handler.describe(),
                    error = %e,
                    "failed to launch handler"
                );
            }
        }
    }

    fn terminate(&mut self, exit: Exit) -> Exit {
        self.transition(DispatchState::Terminated);
        if exit == Exit::Shutdown {
            match self.shutdown.signal() {
                Some(signal) => info!(label = %self.label, %signal, "shutting down watcher"),
                None => info!(label = %self.label, "shutting down watcher"),
            }
        }
        exit
    }

    fn transition(&mut self, next: DispatchState) {
        if self.state != next {
            debug!(label = %self.label, from = ?self.state, to = ?next, "state");
            self.state = next;
        }
    }
}
