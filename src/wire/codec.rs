// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Frame-level encode/decode: turns a byte buffer accumulated from the
//! socket into zero or more [`Message`] values, and turns a `Message` back
//! into bytes to write out.
//!
//! Three wrinkles the fixed-size iSCSI BHS the teacher decoded never had to
//! deal with:
//!
//! - bulk groups (`StrokeInfo`/`ToolInfo`) expand one frame into several
//!   messages sharing a header;
//! - `Deflate` frames expand into the messages their payload decompresses
//!   to, recursively, but only one level deep — a deflate frame containing
//!   another deflate frame is rejected rather than walked further;
//! - the decoder is fed a growing buffer rather than a framed read, so
//!   "not enough bytes yet" is a first-class outcome rather than an error.

use std::io::Read;

use flate2::read::ZlibDecoder;

use super::cursor::{Reader, Writer};
use super::header::{HeaderFlags, RawHeader, HEADER_LEN};
use super::message::{
    AckKind, InstructionBody, InstructionKind, LayerEventKind, Message, MessageBody,
    SessionEventKind, StrokePoint, ToolSettings, UserEventKind,
};
use super::opcode::MessageKind;
use crate::error::{DecodeError, EncodeError, ErrorReason};

/// Identifier magic bytes, as `getMessage`'s `MSG_IDENTIFIER` constructor
/// expects on the wire.
pub const IDENTIFIER_MAGIC: &[u8; 8] = b"DRAWPILE";

/// A deflate payload may nest at most this many levels. The protocol only
/// ever produces one level in practice; the cap exists to turn a hostile or
/// buggy peer's recursive envelope into a clean rejection instead of
/// unbounded recursion.
const MAX_DEFLATE_DEPTH: u32 = 1;

#[derive(Debug)]
pub enum DecodeOutcome {
    /// One frame was fully parsed, possibly expanding into several messages
    /// (bulk group or deflate envelope). `consumed` bytes should be dropped
    /// from the front of the buffer.
    Complete(Vec<Message>, usize),
    /// At least `total_needed` bytes from the start of the buffer are
    /// required before this frame can be parsed.
    NeedMore(usize),
}

pub fn decode_next(buf: &[u8]) -> Result<DecodeOutcome, DecodeError> {
    decode_next_at_depth(buf, 0)
}

/// Decodes every complete frame currently in `buf`. Used by the deflate
/// expansion path (which requires the decompressed payload to decode fully
/// with no leftover bytes) and by tests.
pub fn decode_all(buf: &[u8]) -> Result<Vec<Message>, DecodeError> {
    decode_all_at_depth(buf, 0)
}

fn decode_all_at_depth(buf: &[u8], depth: u32) -> Result<Vec<Message>, DecodeError> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < buf.len() {
        match decode_next_at_depth(&buf[pos..], depth)? {
            DecodeOutcome::Complete(mut msgs, consumed) => {
                out.append(&mut msgs);
                pos += consumed;
            }
            DecodeOutcome::NeedMore(_) => {
                return Err(DecodeError::Malformed(
                    "trailing incomplete frame in deflate payload".into(),
                ));
            }
        }
    }
    Ok(out)
}

fn decode_next_at_depth(buf: &[u8], depth: u32) -> Result<DecodeOutcome, DecodeError> {
    if buf.len() < HEADER_LEN {
        return Ok(DecodeOutcome::NeedMore(HEADER_LEN));
    }
    let header = RawHeader::from_bytes(&[buf[0], buf[1], buf[2]]);
    let kind =
        MessageKind::from_u8(header.kind).ok_or(DecodeError::UnknownKind(header.kind))?;

    let mut pos = HEADER_LEN;

    let session_id = if header.is_session_selected() {
        if buf.len() < pos + 1 {
            return Ok(DecodeOutcome::NeedMore(pos + 1));
        }
        let v = buf[pos];
        pos += 1;
        Some(v)
    } else {
        None
    };

    let bulk_count = if header.is_bulk() {
        if buf.len() < pos + 2 {
            return Ok(DecodeOutcome::NeedMore(pos + 2));
        }
        let v = u16::from_be_bytes([buf[pos], buf[pos + 1]]);
        pos += 2;
        Some(v)
    } else {
        None
    };

    if kind == MessageKind::Deflate {
        return decode_deflate_frame(buf, pos, header.user_id, session_id, depth);
    }

    if let Some(count) = bulk_count {
        let unit_len = kind
            .bulk_unit_len()
            .ok_or_else(|| DecodeError::Malformed(format!("{kind:?} is not bulk-capable")))?;
        let total = unit_len * count as usize;
        if buf.len() < pos + total {
            return Ok(DecodeOutcome::NeedMore(pos + total));
        }
        let unit_bytes = &buf[pos..pos + total];
        let messages = decode_bulk_units(kind, header.user_id, session_id, unit_bytes, count)?;
        return Ok(DecodeOutcome::Complete(messages, pos + total));
    }

    let mut reader = Reader::new(&buf[pos..]);
    let body = match decode_payload(kind, &mut reader) {
        Ok(body) => body,
        Err(e) => {
            return match e.into_decode_error() {
                Ok(eof) => Ok(DecodeOutcome::NeedMore(buf.len() + eof.needed_additional)),
                Err(decode_err) => Err(decode_err),
            };
        }
    };
    let consumed = pos + reader.position();
    Ok(DecodeOutcome::Complete(
        vec![Message {
            user_id: header.user_id,
            session_id,
            body,
        }],
        consumed,
    ))
}

/// Expands one bulk frame into `count` separate [`Message`]s sharing the
/// frame's `user_id`/`session_id` — spec.md §8 scenario 6 is explicit that a
/// bulk `StrokeInfo`/`ToolInfo` frame decodes into one message per sample,
/// not a single message wrapping all of them.
fn decode_bulk_units(
    kind: MessageKind,
    user_id: u8,
    session_id: Option<u8>,
    bytes: &[u8],
    count: u16,
) -> Result<Vec<Message>, DecodeError> {
    let mut out = Vec::with_capacity(count as usize);
    let mut r = Reader::new(bytes);
    match kind {
        MessageKind::StrokeInfo => {
            for _ in 0..count {
                let x = r.read_u16().map_err(|_| eof_in_bulk())?;
                let y = r.read_u16().map_err(|_| eof_in_bulk())?;
                let pressure = r.read_u8().map_err(|_| eof_in_bulk())?;
                out.push(Message {
                    user_id,
                    session_id,
                    body: MessageBody::StrokeInfo(StrokePoint { x, y, pressure }),
                });
            }
        }
        MessageKind::ToolInfo => {
            for _ in 0..count {
                let tool = ToolSettings {
                    tool_id: r.read_u8().map_err(|_| eof_in_bulk())?,
                    mode: r.read_u8().map_err(|_| eof_in_bulk())?,
                    lo_color: r.read_u32().map_err(|_| eof_in_bulk())?,
                    hi_color: r.read_u32().map_err(|_| eof_in_bulk())?,
                    lo_size: r.read_u8().map_err(|_| eof_in_bulk())?,
                    hi_size: r.read_u8().map_err(|_| eof_in_bulk())?,
                    lo_hardness: r.read_u8().map_err(|_| eof_in_bulk())?,
                    hi_hardness: r.read_u8().map_err(|_| eof_in_bulk())?,
                    spacing: r.read_u8().map_err(|_| eof_in_bulk())?,
                };
                out.push(Message {
                    user_id,
                    session_id,
                    body: MessageBody::ToolInfo(tool),
                });
            }
        }
        _ => unreachable!("bulk_unit_len only returns Some for StrokeInfo/ToolInfo"),
    }
    Ok(out)
}

/// The bulk byte slice is exactly `unit_len * count` long by construction
/// (checked by the caller), so a short read here means our own unit-size
/// table disagrees with the per-field reads above.
fn eof_in_bulk() -> DecodeError {
    DecodeError::Malformed("bulk unit shorter than its declared size".into())
}

fn decode_deflate_frame(
    buf: &[u8],
    mut pos: usize,
    user_id: u8,
    session_id: Option<u8>,
    depth: u32,
) -> Result<DecodeOutcome, DecodeError> {
    if depth >= MAX_DEFLATE_DEPTH {
        return Err(DecodeError::Malformed(
            "deflate envelopes may not nest".into(),
        ));
    }
    if buf.len() < pos + 8 {
        return Ok(DecodeOutcome::NeedMore(pos + 8));
    }
    let uncompressed_size =
        u32::from_be_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]]) as usize;
    let compressed_len = u32::from_be_bytes([
        buf[pos + 4],
        buf[pos + 5],
        buf[pos + 6],
        buf[pos + 7],
    ]) as usize;
    pos += 8;
    if buf.len() < pos + compressed_len {
        return Ok(DecodeOutcome::NeedMore(pos + compressed_len));
    }
    let compressed = &buf[pos..pos + compressed_len];
    pos += compressed_len;

    let mut decoder = ZlibDecoder::new(compressed);
    let mut decompressed = Vec::with_capacity(uncompressed_size);
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| DecodeError::Malformed(format!("deflate payload corrupt: {e}")))?;
    if decompressed.len() != uncompressed_size {
        return Err(DecodeError::Malformed(format!(
            "deflate payload declared {uncompressed_size} bytes, got {}",
            decompressed.len()
        )));
    }

    // The contained messages carry their own headers (and their own
    // user_id/session_id); the outer frame's user_id/session_id are
    // redundant framing and are discarded once unwrapped.
    let _ = (user_id, session_id);
    let messages = decode_all_at_depth(&decompressed, depth + 1)?;
    Ok(DecodeOutcome::Complete(messages, pos))
}

fn decode_payload(
    kind: MessageKind,
    r: &mut Reader<'_>,
) -> Result<MessageBody, super::cursor::ReadError> {
    use super::cursor::ReadError;
    Ok(match kind {
        MessageKind::Identifier => {
            let magic = r.read_bytes(8)?;
            if magic != IDENTIFIER_MAGIC {
                return Err(ReadError::Malformed("bad identifier magic".into()));
            }
            MessageBody::Identifier {
                revision: r.read_u32()?,
                level: r.read_u32()?,
                flags: r.read_u8()?,
                extensions: r.read_u8()?,
            }
        }
        MessageKind::HostInfo => MessageBody::HostInfo {
            users_online: r.read_u8()?,
            users_max: r.read_u8()?,
            sessions_online: r.read_u8()?,
            sessions_max: r.read_u8()?,
            req_flags: r.read_u8()?,
            ext_flags: r.read_u8()?,
            title: r.read_string_u8()?,
        },
        MessageKind::UserInfo => {
            let event = UserEventKind::from_u8(r.read_u8()?)
                .ok_or_else(|| ReadError::Malformed("unknown user event kind".into()))?;
            let name = r.read_string_u8()?;
            let has_reason = r.read_bool()?;
            let reason = if has_reason {
                Some(
                    ErrorReason::from_u8(r.read_u8()?)
                        .ok_or_else(|| ReadError::Malformed("unknown error reason".into()))?,
                )
            } else {
                None
            };
            MessageBody::UserInfo {
                event,
                name,
                reason,
            }
        }
        MessageKind::SessionInfo => MessageBody::SessionInfo {
            title: r.read_string_u8()?,
            width: r.read_u16()?,
            height: r.read_u16()?,
            owner_user_id: r.read_u8()?,
            flags: r.read_u8()?,
            max_users: r.read_u8()?,
            subscriber_count: r.read_u8()?,
        },
        MessageKind::StrokeInfo => MessageBody::StrokeInfo(StrokePoint {
            x: r.read_u16()?,
            y: r.read_u16()?,
            pressure: r.read_u8()?,
        }),
        MessageKind::StrokeEnd => MessageBody::StrokeEnd,
        MessageKind::ToolInfo => MessageBody::ToolInfo(ToolSettings {
            tool_id: r.read_u8()?,
            mode: r.read_u8()?,
            lo_color: r.read_u32()?,
            hi_color: r.read_u32()?,
            lo_size: r.read_u8()?,
            hi_size: r.read_u8()?,
            lo_hardness: r.read_u8()?,
            hi_hardness: r.read_u8()?,
            spacing: r.read_u8()?,
        }),
        MessageKind::Authentication => MessageBody::Authentication {
            password: r.read_string_u8()?,
        },
        MessageKind::Password => MessageBody::Password {
            password: r.read_string_u8()?,
        },
        MessageKind::Synchronize => MessageBody::Synchronize,
        MessageKind::Raster => {
            let offset = r.read_u32()?;
            let length = r.read_u32()?;
            let size = r.read_u32()?;
            let data = r.read_bytes(length as usize)?.to_vec();
            MessageBody::Raster {
                offset,
                length,
                size,
                data,
            }
        }
        MessageKind::SyncWait => MessageBody::SyncWait,
        MessageKind::Subscribe => MessageBody::Subscribe {
            password: r.read_optional_string_u8()?,
        },
        MessageKind::Unsubscribe => MessageBody::Unsubscribe,
        MessageKind::SessionSelect => MessageBody::SessionSelect,
        MessageKind::Instruction => MessageBody::Instruction(decode_instruction(r)?),
        MessageKind::ListSessions => MessageBody::ListSessions,
        MessageKind::Cancel => MessageBody::Cancel,
        MessageKind::Acknowledgement => {
            let kind = AckKind::from_u8(r.read_u8()?)
                .ok_or_else(|| ReadError::Malformed("unknown acknowledgement kind".into()))?;
            MessageBody::Acknowledgement(kind)
        }
        MessageKind::Error => {
            let reason = ErrorReason::from_u8(r.read_u8()?)
                .ok_or_else(|| ReadError::Malformed("unknown error reason".into()))?;
            MessageBody::Error {
                reason,
                message: r.read_string_u8()?,
            }
        }
        MessageKind::SessionEvent => {
            let kind = SessionEventKind::from_u8(r.read_u8()?)
                .ok_or_else(|| ReadError::Malformed("unknown session event kind".into()))?;
            MessageBody::SessionEvent { kind }
        }
        MessageKind::LayerEvent => {
            let layer_id = r.read_u16()?;
            let kind = LayerEventKind::from_u8(r.read_u8()?)
                .ok_or_else(|| ReadError::Malformed("unknown layer event kind".into()))?;
            MessageBody::LayerEvent {
                layer_id,
                kind,
                flags: r.read_u8()?,
                name: r.read_string_u8()?,
            }
        }
        MessageKind::LayerSelect => MessageBody::LayerSelect {
            layer_id: r.read_u16()?,
        },
        MessageKind::Chat => MessageBody::Chat {
            text: r.read_string_u8()?,
        },
        MessageKind::Palette => {
            let count = r.read_u8()?;
            let mut entries = Vec::with_capacity(count as usize);
            for _ in 0..count {
                entries.push(r.read_u32()?);
            }
            MessageBody::Palette { entries }
        }
        MessageKind::Deflate => unreachable!("handled by decode_deflate_frame"),
    })
}

fn decode_instruction(r: &mut Reader<'_>) -> Result<InstructionBody, super::cursor::ReadError> {
    use super::cursor::ReadError;
    let kind = InstructionKind::from_u8(r.read_u8()?)
        .ok_or_else(|| ReadError::Malformed("unknown instruction kind".into()))?;
    Ok(match kind {
        InstructionKind::Create => InstructionBody::Create {
            title: r.read_string_u8()?,
            width: r.read_u16()?,
            height: r.read_u16()?,
            max_users: r.read_u8()?,
            password: r.read_optional_string_u8()?,
        },
        InstructionKind::Destroy => InstructionBody::Destroy,
        InstructionKind::Kick => InstructionBody::Kick {
            target_user_id: r.read_u8()?,
        },
        InstructionKind::Lock => InstructionBody::Lock,
        InstructionKind::Unlock => InstructionBody::Unlock,
        InstructionKind::SetMaxUsers => InstructionBody::SetMaxUsers {
            max_users: r.read_u8()?,
        },
        InstructionKind::SetPassword => InstructionBody::SetPassword {
            password: r.read_optional_string_u8()?,
        },
        InstructionKind::SetTitle => InstructionBody::SetTitle {
            title: r.read_string_u8()?,
        },
        InstructionKind::Resize => InstructionBody::Resize {
            width: r.read_u16()?,
            height: r.read_u16()?,
        },
        InstructionKind::TransferOwner => InstructionBody::TransferOwner {
            target_user_id: r.read_u8()?,
        },
    })
}

/// Encodes a single message as a non-bulk frame (no `BULK` flag, no count).
/// A lone `StrokeInfo`/`ToolInfo` sample is wire-legal on its own; grouping
/// several into one bulk frame is [`encode_bulk_strokes`]/
/// [`encode_bulk_tools`]'s job, not this function's.
pub fn encode_message(msg: &Message) -> Result<Vec<u8>, EncodeError> {
    let mut flags = HeaderFlags::empty();
    if msg.session_id.is_some() {
        flags |= HeaderFlags::SESSION_SELECTED;
    }

    let header = RawHeader {
        kind: msg.body.kind().into(),
        user_id: msg.user_id,
        flags: flags.bits(),
    };

    let mut out = Vec::new();
    out.extend_from_slice(&header.to_bytes());
    if let Some(sid) = msg.session_id {
        out.push(sid);
    }

    let mut w = Writer::new();
    encode_payload(&msg.body, &mut w)?;
    out.extend_from_slice(&w.into_bytes());
    Ok(out)
}

fn encode_bulk_count(out: &mut Vec<u8>, len: usize) -> Result<(), EncodeError> {
    let count: u16 = len
        .try_into()
        .map_err(|_| EncodeError::BulkGroupTooLong(len))?;
    out.extend_from_slice(&count.to_be_bytes());
    Ok(())
}

/// Encodes `points` as a single `BULK`-flagged `StrokeInfo` frame, the wire
/// form a real client uses to batch a run of samples into one write instead
/// of one frame per point.
pub fn encode_bulk_strokes(
    user_id: u8,
    session_id: Option<u8>,
    points: &[StrokePoint],
) -> Result<Vec<u8>, EncodeError> {
    let mut flags = HeaderFlags::BULK;
    if session_id.is_some() {
        flags |= HeaderFlags::SESSION_SELECTED;
    }
    let header = RawHeader {
        kind: MessageKind::StrokeInfo.into(),
        user_id,
        flags: flags.bits(),
    };
    let mut out = Vec::new();
    out.extend_from_slice(&header.to_bytes());
    if let Some(sid) = session_id {
        out.push(sid);
    }
    encode_bulk_count(&mut out, points.len())?;
    for p in points {
        out.extend_from_slice(&p.x.to_be_bytes());
        out.extend_from_slice(&p.y.to_be_bytes());
        out.push(p.pressure);
    }
    Ok(out)
}

/// Encodes `tools` as a single `BULK`-flagged `ToolInfo` frame. See
/// [`encode_bulk_strokes`].
pub fn encode_bulk_tools(
    user_id: u8,
    session_id: Option<u8>,
    tools: &[ToolSettings],
) -> Result<Vec<u8>, EncodeError> {
    let mut flags = HeaderFlags::BULK;
    if session_id.is_some() {
        flags |= HeaderFlags::SESSION_SELECTED;
    }
    let header = RawHeader {
        kind: MessageKind::ToolInfo.into(),
        user_id,
        flags: flags.bits(),
    };
    let mut out = Vec::new();
    out.extend_from_slice(&header.to_bytes());
    if let Some(sid) = session_id {
        out.push(sid);
    }
    encode_bulk_count(&mut out, tools.len())?;
    for t in tools {
        out.push(t.tool_id);
        out.push(t.mode);
        out.extend_from_slice(&t.lo_color.to_be_bytes());
        out.extend_from_slice(&t.hi_color.to_be_bytes());
        out.push(t.lo_size);
        out.push(t.hi_size);
        out.push(t.lo_hardness);
        out.push(t.hi_hardness);
        out.push(t.spacing);
    }
    Ok(out)
}

fn encode_payload(body: &MessageBody, w: &mut Writer) -> Result<(), EncodeError> {
    match body {
        MessageBody::Identifier {
            revision,
            level,
            flags,
            extensions,
        } => {
            w.write_bytes(IDENTIFIER_MAGIC);
            w.write_u32(*revision);
            w.write_u32(*level);
            w.write_u8(*flags);
            w.write_u8(*extensions);
        }
        MessageBody::HostInfo {
            users_online,
            users_max,
            sessions_online,
            sessions_max,
            req_flags,
            ext_flags,
            title,
        } => {
            w.write_u8(*users_online);
            w.write_u8(*users_max);
            w.write_u8(*sessions_online);
            w.write_u8(*sessions_max);
            w.write_u8(*req_flags);
            w.write_u8(*ext_flags);
            w.write_string_u8(title)?;
        }
        MessageBody::UserInfo {
            event,
            name,
            reason,
        } => {
            w.write_u8(*event as u8);
            w.write_string_u8(name)?;
            w.write_bool(reason.is_some());
            if let Some(r) = reason {
                w.write_u8(*r as u8);
            }
        }
        MessageBody::SessionInfo {
            title,
            width,
            height,
            owner_user_id,
            flags,
            max_users,
            subscriber_count,
        } => {
            w.write_string_u8(title)?;
            w.write_u16(*width);
            w.write_u16(*height);
            w.write_u8(*owner_user_id);
            w.write_u8(*flags);
            w.write_u8(*max_users);
            w.write_u8(*subscriber_count);
        }
        MessageBody::StrokeInfo(p) => {
            w.write_u16(p.x);
            w.write_u16(p.y);
            w.write_u8(p.pressure);
        }
        MessageBody::ToolInfo(t) => {
            w.write_u8(t.tool_id);
            w.write_u8(t.mode);
            w.write_u32(t.lo_color);
            w.write_u32(t.hi_color);
            w.write_u8(t.lo_size);
            w.write_u8(t.hi_size);
            w.write_u8(t.lo_hardness);
            w.write_u8(t.hi_hardness);
            w.write_u8(t.spacing);
        }
        MessageBody::StrokeEnd => {}
        MessageBody::Authentication { password } | MessageBody::Password { password } => {
            w.write_string_u8(password)?;
        }
        MessageBody::Synchronize => {}
        MessageBody::Raster {
            offset,
            length,
            size,
            data,
        } => {
            if data.len() != *length as usize {
                return Err(EncodeError::BlobTooLong(data.len(), *length as usize));
            }
            w.write_u32(*offset);
            w.write_u32(*length);
            w.write_u32(*size);
            w.write_bytes(data);
        }
        MessageBody::SyncWait => {}
        MessageBody::Subscribe { password } => {
            w.write_optional_string_u8(password.as_deref())?;
        }
        MessageBody::Unsubscribe | MessageBody::SessionSelect => {}
        MessageBody::Instruction(body) => encode_instruction(body, w)?,
        MessageBody::ListSessions | MessageBody::Cancel => {}
        MessageBody::Acknowledgement(kind) => w.write_u8(*kind as u8),
        MessageBody::Error { reason, message } => {
            w.write_u8(*reason as u8);
            w.write_string_u8(message)?;
        }
        MessageBody::SessionEvent { kind } => w.write_u8(*kind as u8),
        MessageBody::LayerEvent {
            layer_id,
            kind,
            flags,
            name,
        } => {
            w.write_u16(*layer_id);
            w.write_u8(*kind as u8);
            w.write_u8(*flags);
            w.write_string_u8(name)?;
        }
        MessageBody::LayerSelect { layer_id } => w.write_u16(*layer_id),
        MessageBody::Chat { text } => w.write_string_u8(text)?,
        MessageBody::Palette { entries } => {
            let count: u8 = entries
                .len()
                .try_into()
                .map_err(|_| EncodeError::BulkGroupTooLong(entries.len()))?;
            w.write_u8(count);
            for e in entries {
                w.write_u32(*e);
            }
        }
    }
    Ok(())
}

fn encode_instruction(body: &InstructionBody, w: &mut Writer) -> Result<(), EncodeError> {
    w.write_u8(body.kind() as u8);
    match body {
        InstructionBody::Create {
            title,
            width,
            height,
            max_users,
            password,
        } => {
            w.write_string_u8(title)?;
            w.write_u16(*width);
            w.write_u16(*height);
            w.write_u8(*max_users);
            w.write_optional_string_u8(password.as_deref())?;
        }
        InstructionBody::Destroy | InstructionBody::Lock | InstructionBody::Unlock => {}
        InstructionBody::Kick { target_user_id }
        | InstructionBody::TransferOwner { target_user_id } => {
            w.write_u8(*target_user_id);
        }
        InstructionBody::SetMaxUsers { max_users } => w.write_u8(*max_users),
        InstructionBody::SetPassword { password } => {
            w.write_optional_string_u8(password.as_deref())?;
        }
        InstructionBody::SetTitle { title } => w.write_string_u8(title)?,
        InstructionBody::Resize { width, height } => {
            w.write_u16(*width);
            w.write_u16(*height);
        }
    }
    Ok(())
}

/// Compresses `messages` into a single `Deflate` envelope. Used by the
/// session actor when relaying a large backlog (the initial raster plus
/// queued events) to a newly synced subscriber.
pub fn encode_deflated(messages: &[Message]) -> Result<Vec<u8>, EncodeError> {
    use std::io::Write;

    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    let mut plain = Vec::new();
    for m in messages {
        plain.extend_from_slice(&encode_message(m)?);
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    // In-memory buffers never fail to write; any error here would mean an
    // allocation failure, which we let unwind rather than paper over.
    encoder
        .write_all(&plain)
        .expect("writing to an in-memory buffer cannot fail");
    let compressed = encoder.finish().expect("zlib finish on a Vec cannot fail");

    let header = RawHeader {
        kind: MessageKind::Deflate.into(),
        user_id: 0,
        flags: 0,
    };
    let mut out = Vec::new();
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&(plain.len() as u32).to_be_bytes());
    out.extend_from_slice(&(compressed.len() as u32).to_be_bytes());
    out.extend_from_slice(&compressed);
    Ok(out)
}
