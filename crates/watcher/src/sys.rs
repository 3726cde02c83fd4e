//! Small helpers around `nix::poll` shared by the session and shutdown latch

use nix::poll::{PollFd, PollFlags};
use std::time::Duration;

/// Convert an optional wait into a `poll(2)` timeout
///
/// `None` blocks indefinitely. Sub-millisecond timeouts round up so a
/// nonzero wait never degrades into a busy poll.
pub(crate) fn poll_timeout(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(t) => {
            let ms = t.as_micros().div_ceil(1000);
            ms.min(libc::c_int::MAX as u128) as libc::c_int
        }
    }
}

pub(crate) fn revents(pfd: &PollFd<'_>) -> PollFlags {
    pfd.revents().unwrap_or(PollFlags::empty())
}

pub(crate) fn is_readable(pfd: &PollFd<'_>) -> bool {
    revents(pfd).contains(PollFlags::POLLIN)
}
