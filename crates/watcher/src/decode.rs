//! Decoder for the raw inotify event stream
//!
//! A read from an inotify descriptor yields back-to-back records:
//!
//! ```text
//! wd: i32 | mask: u32 | cookie: u32 | len: u32 | name: [u8; len]
//! ```
//!
//! Fields are in host byte order. `name` is NUL-padded and present only for
//! events on entries inside the watched directory.

use crate::event::{EventMask, RawEvent};
use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;

/// Size of the fixed `struct inotify_event` header
pub const HEADER_LEN: usize = 16;

/// Read buffer size used by the session
pub const READ_BUFFER_LEN: usize = 64 * 1024;

/// Decode every complete record in `buf`
///
/// Decoding stops at the first header or name that would run past the end
/// of the buffer. Records decoded before that point are returned.
pub fn decode_events(buf: &[u8]) -> Vec<RawEvent> {
    let mut events = Vec::new();
    let mut offset = 0usize;

    while offset < buf.len() {
        let Some(header) = buf.get(offset..offset + HEADER_LEN) else {
            tracing::debug!(offset, remaining = buf.len() - offset, "truncated event header");
            break;
        };

        let wd = i32::from_ne_bytes(field(header, 0));
        let mask = u32::from_ne_bytes(field(header, 4));
        let cookie = u32::from_ne_bytes(field(header, 8));
        let name_len = u32::from_ne_bytes(field(header, 12)) as usize;

        let name_start = offset + HEADER_LEN;
        let Some(name_end) = name_start.checked_add(name_len).filter(|end| *end <= buf.len())
        else {
            tracing::debug!(offset, name_len, "event name runs past end of buffer");
            break;
        };

        events.push(RawEvent {
            wd,
            mask: EventMask::from_bits_retain(mask),
            cookie,
            name: decode_name(&buf[name_start..name_end]),
        });

        offset = name_end;
    }

    events
}

fn field(header: &[u8], at: usize) -> [u8; 4] {
    [header[at], header[at + 1], header[at + 2], header[at + 3]]
}

/// Strip NUL padding; an all-padding name means "no name"
fn decode_name(raw: &[u8]) -> Option<OsString> {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    if end == 0 {
        None
    } else {
        Some(OsString::from_vec(raw[..end].to_vec()))
    }
}
