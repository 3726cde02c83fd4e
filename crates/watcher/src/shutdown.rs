//! Process shutdown latch
//!
//! A non-blocking self-pipe built on a connected socket pair. Writing a byte
//! (from the SIGINT/SIGTERM handler or [`Shutdown::trigger`]) makes the read
//! end permanently readable, so any `poll` that includes it wakes up and
//! every later check sees the request.

use crate::error::WatchError;
use crate::sys;
use crate::Result;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Write end of the latch that installed the signal handlers
static SIGNAL_PIPE: AtomicI32 = AtomicI32::new(-1);

/// Last signal number received by the handler
static LAST_SIGNAL: AtomicI32 = AtomicI32::new(0);

extern "C" fn on_signal(signum: libc::c_int) {
    LAST_SIGNAL.store(signum, Ordering::SeqCst);
    let fd = SIGNAL_PIPE.load(Ordering::SeqCst);
    if fd >= 0 {
        // write(2) is async-signal-safe
        let _ = unistd::write(fd, &[1]);
    }
}

/// Cloneable handle to the shutdown latch
#[derive(Clone)]
pub struct Shutdown {
    inner: Arc<Latch>,
}

struct Latch {
    read: UnixStream,
    write: UnixStream,
}

impl Drop for Latch {
    fn drop(&mut self) {
        // Stop the signal handler from writing to a descriptor about to be closed
        let _ = SIGNAL_PIPE.compare_exchange(
            self.write.as_raw_fd(),
            -1,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}

impl Shutdown {
    pub fn new() -> Result<Self> {
        let (read, write) = UnixStream::pair().map_err(WatchError::Shutdown)?;
        read.set_nonblocking(true).map_err(WatchError::Shutdown)?;
        write.set_nonblocking(true).map_err(WatchError::Shutdown)?;

        Ok(Self {
            inner: Arc::new(Latch { read, write }),
        })
    }

    /// Route SIGINT and SIGTERM to this latch
    ///
    /// Handlers are installed without `SA_RESTART`, so a blocked `poll`
    /// returns `EINTR` as well as seeing the latch become readable.
    pub fn install_signal_handlers(&self) -> Result<()> {
        SIGNAL_PIPE.store(self.inner.write.as_raw_fd(), Ordering::SeqCst);

        let action = SigAction::new(
            SigHandler::Handler(on_signal),
            SaFlags::empty(),
            SigSet::empty(),
        );

        for signal in [Signal::SIGINT, Signal::SIGTERM] {
            // SAFETY: the handler only touches atomics and calls write(2)
            unsafe { sigaction(signal, &action) }.map_err(|e| WatchError::Shutdown(e.into()))?;
        }

        tracing::debug!("installed SIGINT/SIGTERM handlers");
        Ok(())
    }

    /// Request shutdown from inside the process
    pub fn trigger(&self) {
        match unistd::write(self.inner.write.as_raw_fd(), &[1]) {
            // Buffer full means shutdown is already latched
            Ok(_) | Err(Errno::EAGAIN) => {}
            Err(e) => tracing::warn!(error = %e, "failed to latch shutdown"),
        }
    }

    /// Whether shutdown has been requested
    pub fn requested(&self) -> bool {
        let mut fds = [PollFd::new(self, PollFlags::POLLIN)];
        matches!(poll(&mut fds, 0), Ok(n) if n > 0 && sys::is_readable(&fds[0]))
    }

    /// Signal that triggered shutdown, if it came from one
    pub fn signal(&self) -> Option<Signal> {
        match LAST_SIGNAL.load(Ordering::SeqCst) {
            0 => None,
            signum => Signal::try_from(signum).ok(),
        }
    }

    /// Sleep for `duration` unless shutdown is requested first
    ///
    /// Returns `true` when the sleep was cut short by a shutdown request.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return self.requested();
            }

            let mut fds = [PollFd::new(self, PollFlags::POLLIN)];
            match poll(&mut fds, sys::poll_timeout(Some(remaining))) {
                Ok(0) => continue,
                Ok(_) => return true,
                Err(Errno::EINTR) => {
                    if self.requested() {
                        return true;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "poll failed during sleep, falling back to thread sleep");
                    std::thread::sleep(remaining);
                    return self.requested();
                }
            }
        }
    }
}

impl AsFd for Shutdown {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inner.read.as_fd()
    }
}

impl std::fmt::Debug for Shutdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shutdown")
            .field("fd", &self.as_fd().as_raw_fd())
            .field("requested", &self.requested())
            .finish()
    }
}
