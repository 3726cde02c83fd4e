//! inotify watch session over a single directory
//!
//! Owns the notification descriptor and its one watch registration. The
//! registration is removed before the descriptor is closed, exactly once,
//! whether the session is closed explicitly or dropped.

use crate::decode::{decode_events, READ_BUFFER_LEN};
use crate::error::WatchError;
use crate::event::{EventMask, RawEvent};
use crate::shutdown::Shutdown;
use crate::sys;
use crate::Result;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags};
use nix::sys::inotify::{AddWatchFlags, InitFlags, Inotify, WatchDescriptor};
use nix::unistd;
use std::ffi::CString;
use std::os::fd::{AsFd, AsRawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Outcome of waiting on the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// At least one event is pending
    Ready,
    /// The timeout elapsed with nothing pending
    Timeout,
    /// The shutdown latch fired
    Shutdown,
}

/// An open inotify descriptor watching one directory
///
/// The descriptor closes when the session is dropped.
pub struct WatchSession {
    path: PathBuf,
    inotify: Inotify,
    /// `None` once removed, or once the kernel reported it gone
    wd: Option<WatchDescriptor>,
    buf: Vec<u8>,
}

impl WatchSession {
    /// Create the notification channel and register `path` for `mask`
    pub fn open(path: &Path, mask: EventMask) -> Result<Self> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| WatchError::InvalidPath(path.to_path_buf()))?;

        let inotify = Inotify::init(InitFlags::IN_CLOEXEC | InitFlags::IN_NONBLOCK)
            .map_err(WatchError::ChannelCreate)?;

        // On failure `inotify` drops here, so a half-built session never leaks
        let flags = AddWatchFlags::from_bits_truncate(mask.registration_bits().bits());
        let wd = inotify
            .add_watch(c_path.as_c_str(), flags)
            .map_err(|source| WatchError::AddWatch {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(path = %path.display(), wd = ?wd, mask = ?mask, "watch registered");

        Ok(Self {
            path: path.to_path_buf(),
            inotify,
            wd: Some(wd),
            buf: vec![0u8; READ_BUFFER_LEN],
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Watch descriptor while the registration is live
    pub fn watch_descriptor(&self) -> Option<WatchDescriptor> {
        self.wd
    }

    /// Block until an event is pending, the timeout elapses, or shutdown is
    /// requested
    ///
    /// `None` waits indefinitely; `Some(Duration::ZERO)` only checks.
    /// Signal interruption re-enters the wait with the remaining time.
    pub fn wait_for_events(
        &mut self,
        timeout: Option<Duration>,
        shutdown: &Shutdown,
    ) -> Result<Readiness> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            let mut fds = [
                PollFd::new(&self.inotify, PollFlags::POLLIN),
                PollFd::new(shutdown, PollFlags::POLLIN),
            ];

            match poll(&mut fds, sys::poll_timeout(remaining)) {
                Ok(0) => {
                    if remaining.map_or(true, |r| r.is_zero()) {
                        return Ok(Readiness::Timeout);
                    }
                    // Woke early through millisecond rounding; wait out the rest
                }
                Ok(_) => {
                    if sys::is_readable(&fds[1]) {
                        return Ok(Readiness::Shutdown);
                    }
                    let revents = sys::revents(&fds[0]);
                    if revents.contains(PollFlags::POLLNVAL) {
                        return Err(WatchError::Wait(Errno::EBADF));
                    }
                    if revents.contains(PollFlags::POLLERR) {
                        return Err(WatchError::Wait(Errno::EIO));
                    }
                    if revents.contains(PollFlags::POLLIN) {
                        return Ok(Readiness::Ready);
                    }
                }
                Err(Errno::EINTR) => {
                    if shutdown.requested() {
                        return Ok(Readiness::Shutdown);
                    }
                    debug!("wait interrupted by signal, re-entering");
                }
                Err(e) => return Err(WatchError::Wait(e)),
            }
        }
    }

    /// Perform one non-blocking read and decode whatever was buffered
    ///
    /// An empty vector means "nothing to read right now"; the channel is
    /// still valid.
    pub fn read_events(&mut self) -> Result<Vec<RawEvent>> {
        let fd = self.inotify.as_fd().as_raw_fd();
        let n = match unistd::read(fd, &mut self.buf) {
            Ok(n) => n,
            Err(Errno::EAGAIN) | Err(Errno::EINTR) => return Ok(Vec::new()),
            Err(e) => return Err(WatchError::Read(e)),
        };

        let events = decode_events(&self.buf[..n]);
        for event in &events {
            debug!(
                wd = event.wd,
                mask = ?event.mask,
                cookie = event.cookie,
                name = ?event.name,
                "event"
            );
            // One watch per session, so any IN_IGNORED is ours: the kernel
            // has already torn the registration down
            if event.mask.contains(EventMask::IGNORED) && event.wd >= 0 {
                self.wd = None;
            }
        }

        Ok(events)
    }

    /// Remove the registration, then close the channel
    ///
    /// Failures are logged; the process is terminating regardless.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(wd) = self.wd.take() else {
            return;
        };

        match self.inotify.rm_watch(wd) {
            Ok(()) => debug!(path = %self.path.display(), wd = ?wd, "watch removed"),
            // Raced with the kernel tearing the watch down
            Err(Errno::EINVAL) => debug!(wd = ?wd, "watch already gone"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove watch"),
        }
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("path", &self.path)
            .field("fd", &self.inotify.as_fd().as_raw_fd())
            .field("wd", &self.wd)
            .finish()
    }
}
