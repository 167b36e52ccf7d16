// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The one-byte type tag that opens every message on the wire.
//!
//! Closed set per the protocol's message catalogue: 26 variants, one byte
//! each. Unlike the iSCSI opcode byte this tag carries no side flags of its
//! own — the "bulk" and "session-selected" bits live in the header's
//! dedicated flags byte (see [`crate::wire::header`]).

use std::convert::TryFrom;

use thiserror::Error;

/// All message kinds defined by the protocol's wire catalogue.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    #[default]
    Identifier = 0x00,
    HostInfo = 0x01,
    UserInfo = 0x02,
    SessionInfo = 0x03,
    StrokeInfo = 0x04,
    StrokeEnd = 0x05,
    ToolInfo = 0x06,
    Authentication = 0x07,
    Password = 0x08,
    Synchronize = 0x09,
    Raster = 0x0A,
    SyncWait = 0x0B,
    Subscribe = 0x0C,
    Unsubscribe = 0x0D,
    SessionSelect = 0x0E,
    Instruction = 0x0F,
    ListSessions = 0x10,
    Cancel = 0x11,
    Acknowledgement = 0x12,
    Error = 0x13,
    SessionEvent = 0x14,
    LayerEvent = 0x15,
    LayerSelect = 0x16,
    Deflate = 0x17,
    Chat = 0x18,
    Palette = 0x19,
}

/// Returned when the type byte does not name a defined message kind.
#[derive(Debug, Error)]
#[error("unknown message type: 0x{0:02x}")]
pub struct UnknownMessageKind(pub u8);

impl MessageKind {
    #[inline]
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0x00 => Self::Identifier,
            0x01 => Self::HostInfo,
            0x02 => Self::UserInfo,
            0x03 => Self::SessionInfo,
            0x04 => Self::StrokeInfo,
            0x05 => Self::StrokeEnd,
            0x06 => Self::ToolInfo,
            0x07 => Self::Authentication,
            0x08 => Self::Password,
            0x09 => Self::Synchronize,
            0x0A => Self::Raster,
            0x0B => Self::SyncWait,
            0x0C => Self::Subscribe,
            0x0D => Self::Unsubscribe,
            0x0E => Self::SessionSelect,
            0x0F => Self::Instruction,
            0x10 => Self::ListSessions,
            0x11 => Self::Cancel,
            0x12 => Self::Acknowledgement,
            0x13 => Self::Error,
            0x14 => Self::SessionEvent,
            0x15 => Self::LayerEvent,
            0x16 => Self::LayerSelect,
            0x17 => Self::Deflate,
            0x18 => Self::Chat,
            0x19 => Self::Palette,
            _ => return None,
        })
    }

    /// The fixed per-unit payload size of message kinds that may be
    /// bulk-encoded (several payloads packed under one shared header). `None`
    /// means the kind is not bulk-capable.
    #[inline]
    pub fn bulk_unit_len(self) -> Option<usize> {
        match self {
            Self::StrokeInfo => Some(5),
            Self::ToolInfo => Some(15),
            _ => None,
        }
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = UnknownMessageKind;

    fn try_from(byte: u8) -> Result<Self, <Self as TryFrom<u8>>::Error> {
        Self::from_u8(byte).ok_or(UnknownMessageKind(byte))
    }
}

impl From<MessageKind> for u8 {
    fn from(k: MessageKind) -> u8 {
        k as u8
    }
}
