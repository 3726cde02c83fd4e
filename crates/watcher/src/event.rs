//! Event kinds, masks and decoded event records

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::str::FromStr;

bitflags! {
    /// inotify event mask
    ///
    /// Decoded masks may carry bits not named here (e.g. `IN_ISDIR`);
    /// they are retained as-is.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u32 {
        /// Entry created in the watched directory
        const CREATE = libc::IN_CREATE;
        /// Entry opened for writing was closed
        const CLOSE_WRITE = libc::IN_CLOSE_WRITE;
        /// Entry moved into the watched directory
        const MOVED_TO = libc::IN_MOVED_TO;
        /// Watched directory itself was deleted
        const DELETE_SELF = libc::IN_DELETE_SELF;
        /// Watch was removed by the kernel
        const IGNORED = libc::IN_IGNORED;
        /// Kernel event queue overflowed
        const Q_OVERFLOW = libc::IN_Q_OVERFLOW;
    }
}

impl EventMask {
    /// Bits that mean the watch is gone
    pub const INVALIDATING: Self = Self::DELETE_SELF.union(Self::IGNORED);

    /// Bits that are reported by the kernel unconditionally and must not be
    /// passed to `inotify_add_watch`
    pub const KERNEL_ONLY: Self = Self::IGNORED.union(Self::Q_OVERFLOW);

    /// Mask to register with the kernel
    pub fn registration_bits(self) -> Self {
        self.difference(Self::KERNEL_ONLY)
    }

    pub fn is_invalidating(self) -> bool {
        self.intersects(Self::INVALIDATING)
    }
}

impl Default for EventMask {
    /// The set the deployed watchers registered for
    fn default() -> Self {
        Self::CREATE | Self::CLOSE_WRITE | Self::MOVED_TO | Self::DELETE_SELF
    }
}

/// Event kinds selectable in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Create,
    CloseWrite,
    MovedTo,
    DeleteSelf,
    WatchRemoved,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Create,
        EventKind::CloseWrite,
        EventKind::MovedTo,
        EventKind::DeleteSelf,
        EventKind::WatchRemoved,
    ];

    pub fn mask(self) -> EventMask {
        match self {
            EventKind::Create => EventMask::CREATE,
            EventKind::CloseWrite => EventMask::CLOSE_WRITE,
            EventKind::MovedTo => EventMask::MOVED_TO,
            EventKind::DeleteSelf => EventMask::DELETE_SELF,
            EventKind::WatchRemoved => EventMask::IGNORED,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Create => "create",
            EventKind::CloseWrite => "close_write",
            EventKind::MovedTo => "moved_to",
            EventKind::DeleteSelf => "delete_self",
            EventKind::WatchRemoved => "watch_removed",
        }
    }

    /// Fold a list of kinds into one mask
    pub fn fold(kinds: &[EventKind]) -> EventMask {
        kinds
            .iter()
            .fold(EventMask::empty(), |mask, kind| mask | kind.mask())
    }

    /// Kinds contained in a mask, in declaration order
    pub fn from_mask(mask: EventMask) -> Vec<EventKind> {
        Self::ALL
            .iter()
            .copied()
            .filter(|kind| mask.contains(kind.mask()))
            .collect()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| {
                let valid: Vec<_> = Self::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown event kind '{}' (expected one of: {})", s, valid.join(", "))
            })
    }
}

/// One decoded `struct inotify_event`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Watch descriptor (-1 for queue overflow)
    pub wd: i32,
    pub mask: EventMask,
    /// Pairs the two halves of a rename; zero otherwise
    pub cookie: u32,
    /// Entry name, absent for events on the watched directory itself
    pub name: Option<OsString>,
}

impl RawEvent {
    /// True when the watched directory is gone or the kernel dropped the watch
    pub fn is_invalidating(&self) -> bool {
        self.mask.is_invalidating()
    }

    pub fn is_overflow(&self) -> bool {
        self.mask.contains(EventMask::Q_OVERFLOW)
    }
}
