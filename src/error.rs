// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Error taxonomy shared by the wire codec, the session/host actors and the
//! connection layer. Follows the teacher crate's split between typed,
//! thiserror-derived domain errors and `anyhow` at task boundaries
//! (`client/client.rs`'s `read_loop`).

use thiserror::Error;

/// The closed set of wire-level error reason codes a peer can be told
/// about. Values are assigned in declaration order; nothing on the wire
/// depends on a specific numbering beyond "stable for the life of a
/// connection".
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorReason {
    #[default]
    BadPassword = 0x00,
    UserLimit = 0x01,
    SessionLimit = 0x02,
    SyncFailed = 0x03,
    SyncCancelled = 0x04,
    NotSubscribed = 0x05,
    SessionClosed = 0x06,
    ProtocolMismatch = 0x07,
    Unauthorized = 0x08,
    Malformed = 0x09,
    TooManySessions = 0x0A,
    PasswordRequired = 0x0B,
    NoSyncSource = 0x0C,
}

impl ErrorReason {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0x00 => Self::BadPassword,
            0x01 => Self::UserLimit,
            0x02 => Self::SessionLimit,
            0x03 => Self::SyncFailed,
            0x04 => Self::SyncCancelled,
            0x05 => Self::NotSubscribed,
            0x06 => Self::SessionClosed,
            0x07 => Self::ProtocolMismatch,
            0x08 => Self::Unauthorized,
            0x09 => Self::Malformed,
            0x0A => Self::TooManySessions,
            0x0B => Self::PasswordRequired,
            0x0C => Self::NoSyncSource,
            _ => return None,
        })
    }
}

impl std::fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::BadPassword => "bad password",
            Self::UserLimit => "user limit reached",
            Self::SessionLimit => "session limit reached",
            Self::SyncFailed => "sync failed",
            Self::SyncCancelled => "sync cancelled",
            Self::NotSubscribed => "not subscribed",
            Self::SessionClosed => "session closed",
            Self::ProtocolMismatch => "protocol revision mismatch",
            Self::Unauthorized => "unauthorized",
            Self::Malformed => "malformed message",
            Self::TooManySessions => "too many sessions",
            Self::PasswordRequired => "password required",
            Self::NoSyncSource => "no sync source available",
        };
        f.write_str(s)
    }
}

/// Failure to decode a frame from the wire. Matches spec.md §4.1's decoder
/// contract: a strict prefix of a valid frame is `NeedMore`, bytes that
/// cannot be a prefix of any valid frame are `Malformed`.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown message type: 0x{0:02x}")]
    UnknownKind(u8),
    #[error("malformed message: {0}")]
    Malformed(String),
}

/// Failure to encode a message for the wire.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("string of {0} bytes exceeds the 255-byte wire limit")]
    StringTooLong(usize),
    #[error("blob of {0} bytes does not match its declared length {1}")]
    BlobTooLong(usize, usize),
    #[error("bulk group of {0} items exceeds the 65535-item wire limit")]
    BulkGroupTooLong(usize),
}

/// Errors surfaced by the host/session actors while servicing a request,
/// carrying the spec.md §6.2 reason reported back to the peer.
///
/// Split per spec.md §7 into protocol faults (kind 1: malformed frame,
/// forbidden message for current state, version mismatch — fatal, the user
/// is set `DEAD`) and policy rejections (kind 2: bad password, session
/// full, password required — the user may retry). [`HostError::is_fatal`]
/// encodes that split so the router doesn't have to special-case reasons
/// individually.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("bad password")]
    BadPassword,
    #[error("user limit reached")]
    UserLimit,
    #[error("session limit reached")]
    SessionLimit,
    #[error("sync failed")]
    SyncFailed,
    #[error("sync cancelled")]
    SyncCancelled,
    #[error("not subscribed to this session")]
    NotSubscribed,
    #[error("session closed")]
    SessionClosed,
    #[error("protocol revision mismatch")]
    ProtocolMismatch,
    #[error("unauthorized")]
    Unauthorized,
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("too many sessions")]
    TooManySessions,
    #[error("password required")]
    PasswordRequired,
    #[error("no sync source available")]
    NoSyncSource,
}

impl HostError {
    pub fn reason(&self) -> ErrorReason {
        match self {
            Self::BadPassword => ErrorReason::BadPassword,
            Self::UserLimit => ErrorReason::UserLimit,
            Self::SessionLimit => ErrorReason::SessionLimit,
            Self::SyncFailed => ErrorReason::SyncFailed,
            Self::SyncCancelled => ErrorReason::SyncCancelled,
            Self::NotSubscribed => ErrorReason::NotSubscribed,
            Self::SessionClosed => ErrorReason::SessionClosed,
            Self::ProtocolMismatch => ErrorReason::ProtocolMismatch,
            Self::Unauthorized => ErrorReason::Unauthorized,
            Self::Malformed(_) => ErrorReason::Malformed,
            Self::TooManySessions => ErrorReason::TooManySessions,
            Self::PasswordRequired => ErrorReason::PasswordRequired,
            Self::NoSyncSource => ErrorReason::NoSyncSource,
        }
    }

    /// Whether this error is a protocol fault (spec.md §7 kind 1): the
    /// offending user is set `DEAD` and the connection closes once its tx
    /// drains. Policy rejections (kind 2) leave the user's state untouched.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Malformed(_) | Self::ProtocolMismatch | Self::Unauthorized
        )
    }
}

/// How an I/O failure observed on a connection should be treated.
///
/// Per the REDESIGN FLAGS decision, an error class the classifier doesn't
/// recognize is folded into `Fatal` rather than aborting the process: one
/// connection's unusual I/O error must never take down the host actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoFault {
    /// Worth a retry at the call site (e.g. `WouldBlock` surfacing through a
    /// layer that doesn't already loop on it).
    Transient,
    /// The peer closed the connection in an ordinary way.
    PeerClosed,
    /// Unrecoverable for this connection; it must be torn down.
    Fatal,
}

pub fn classify_io_error(err: &std::io::Error) -> IoFault {
    use std::io::ErrorKind::*;
    match err.kind() {
        WouldBlock | Interrupted => IoFault::Transient,
        UnexpectedEof | ConnectionReset | ConnectionAborted | BrokenPipe => IoFault::PeerClosed,
        _ => IoFault::Fatal,
    }
}
