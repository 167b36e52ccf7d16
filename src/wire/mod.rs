// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The binary wire protocol: message catalogue, frame header, and the
//! codec that turns a byte stream into [`message::Message`] values and
//! back.

pub mod codec;
pub mod cursor;
pub mod header;
pub mod message;
pub mod opcode;

pub use codec::{
    decode_all, decode_next, encode_bulk_strokes, encode_bulk_tools, encode_deflated,
    encode_message, DecodeOutcome,
};
pub use header::{HeaderFlags, RawHeader, HEADER_LEN};
pub use message::{Message, MessageBody};
pub use opcode::MessageKind;
