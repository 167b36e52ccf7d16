// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The three-byte common header that opens every frame on the wire.
//!
//! ```text
//!  byte 0        byte 1          byte 2
//! +--------+   +----------+   +-------------------------+
//! |  kind  |   | user_id  |   | . . . . . . | SSEL | BULK |
//! +--------+   +----------+   +-------------------------+
//! ```
//!
//! `BULK` and `SSEL` (session-selected) are the only two flag bits the
//! protocol defines; the rest are reserved and must round-trip as zero.
//! When `SSEL` is set a `session_id` byte follows immediately after this
//! header. When `BULK` is set a big-endian `u16` repeat count follows next
//! (after `session_id`, if present).

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Length in bytes of the fixed common header (kind, user_id, flags).
pub const HEADER_LEN: usize = 3;

bitflags::bitflags! {
    #[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
    pub struct HeaderFlags: u8 {
        /// More payloads of the same kind follow, sharing this header.
        const BULK = 0b0000_0001;
        /// A `session_id` byte follows the header.
        const SESSION_SELECTED = 0b0000_0010;
    }
}

/// Wire-safe, zero-copy view of the three common header bytes.
#[repr(C)]
#[derive(Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RawHeader {
    pub kind: u8,
    pub user_id: u8,
    pub flags: u8,
}

impl RawHeader {
    #[inline]
    pub fn flags(&self) -> HeaderFlags {
        HeaderFlags::from_bits_truncate(self.flags)
    }

    #[inline]
    pub fn is_bulk(&self) -> bool {
        self.flags().contains(HeaderFlags::BULK)
    }

    #[inline]
    pub fn is_session_selected(&self) -> bool {
        self.flags().contains(HeaderFlags::SESSION_SELECTED)
    }

    #[inline]
    pub fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Self {
        Self {
            kind: bytes[0],
            user_id: bytes[1],
            flags: bytes[2],
        }
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        [self.kind, self.user_id, self.flags]
    }
}
