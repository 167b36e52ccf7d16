// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Typed message bodies, one per [`MessageKind`](super::opcode::MessageKind).
//!
//! Mirrors the teacher crate's `models::parse::Pdu` dispatch enum, but
//! without `enum_dispatch`: the protocol's per-kind payloads don't share a
//! uniform trait surface (bulk items, sub-instructions, an optional session
//! id carried in the header) so a hand-written match in
//! [`super::codec`] reads more plainly than a trait-object dispatch table.

use crate::error::ErrorReason;

/// A fully decoded frame: the shared header fields plus its typed body.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub user_id: u8,
    pub session_id: Option<u8>,
    pub body: MessageBody,
}

impl Message {
    pub fn kind(&self) -> super::opcode::MessageKind {
        self.body.kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserEventKind {
    #[default]
    Join = 0,
    Leave = 1,
    Kicked = 2,
}

impl UserEventKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::Join,
            1 => Self::Leave,
            2 => Self::Kicked,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionEventKind {
    #[default]
    Ended = 0,
}

impl SessionEventKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::Ended,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerEventKind {
    #[default]
    Create = 0,
    Delete = 1,
    Order = 2,
    VisibilityChange = 3,
}

impl LayerEventKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::Create,
            1 => Self::Delete,
            2 => Self::Order,
            3 => Self::VisibilityChange,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckKind {
    #[default]
    SyncWait = 0,
}

impl AckKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::SyncWait,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    Create = 0,
    Destroy = 1,
    Kick = 2,
    Lock = 3,
    Unlock = 4,
    SetMaxUsers = 5,
    SetPassword = 6,
    SetTitle = 7,
    Resize = 8,
    TransferOwner = 9,
}

impl InstructionKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::Create,
            1 => Self::Destroy,
            2 => Self::Kick,
            3 => Self::Lock,
            4 => Self::Unlock,
            5 => Self::SetMaxUsers,
            6 => Self::SetPassword,
            7 => Self::SetTitle,
            8 => Self::Resize,
            9 => Self::TransferOwner,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstructionBody {
    Create {
        title: String,
        width: u16,
        height: u16,
        max_users: u8,
        password: Option<String>,
    },
    Destroy,
    Kick { target_user_id: u8 },
    Lock,
    Unlock,
    SetMaxUsers { max_users: u8 },
    SetPassword { password: Option<String> },
    SetTitle { title: String },
    Resize { width: u16, height: u16 },
    TransferOwner { target_user_id: u8 },
}

impl InstructionBody {
    pub fn kind(&self) -> InstructionKind {
        match self {
            Self::Create { .. } => InstructionKind::Create,
            Self::Destroy => InstructionKind::Destroy,
            Self::Kick { .. } => InstructionKind::Kick,
            Self::Lock => InstructionKind::Lock,
            Self::Unlock => InstructionKind::Unlock,
            Self::SetMaxUsers { .. } => InstructionKind::SetMaxUsers,
            Self::SetPassword { .. } => InstructionKind::SetPassword,
            Self::SetTitle { .. } => InstructionKind::SetTitle,
            Self::Resize { .. } => InstructionKind::Resize,
            Self::TransferOwner { .. } => InstructionKind::TransferOwner,
        }
    }
}

/// One `StrokeInfo` sample. Five bytes, bulk-capable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StrokePoint {
    pub x: u16,
    pub y: u16,
    pub pressure: u8,
}

/// One `ToolInfo` brush configuration. Fifteen bytes, bulk-capable.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ToolSettings {
    pub tool_id: u8,
    pub mode: u8,
    pub lo_color: u32,
    pub hi_color: u32,
    pub lo_size: u8,
    pub hi_size: u8,
    pub lo_hardness: u8,
    pub hi_hardness: u8,
    pub spacing: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Identifier {
        revision: u32,
        level: u32,
        flags: u8,
        extensions: u8,
    },
    HostInfo {
        users_online: u8,
        users_max: u8,
        sessions_online: u8,
        sessions_max: u8,
        req_flags: u8,
        ext_flags: u8,
        title: String,
    },
    UserInfo {
        event: UserEventKind,
        name: String,
        reason: Option<ErrorReason>,
    },
    SessionInfo {
        title: String,
        width: u16,
        height: u16,
        owner_user_id: u8,
        flags: u8,
        max_users: u8,
        subscriber_count: u8,
    },
    /// One x/y/pressure sample. A `BULK`-flagged wire frame carries several
    /// of these back to back; the decoder expands it into one `Message` per
    /// sample rather than collapsing them into a single value.
    StrokeInfo(StrokePoint),
    StrokeEnd,
    ToolInfo(ToolSettings),
    Authentication {
        password: String,
    },
    Password {
        password: String,
    },
    Synchronize,
    Raster {
        offset: u32,
        length: u32,
        size: u32,
        data: Vec<u8>,
    },
    SyncWait,
    Subscribe {
        password: Option<String>,
    },
    Unsubscribe,
    SessionSelect,
    Instruction(InstructionBody),
    ListSessions,
    Cancel,
    Acknowledgement(AckKind),
    Error {
        reason: ErrorReason,
        message: String,
    },
    SessionEvent {
        kind: SessionEventKind,
    },
    LayerEvent {
        layer_id: u16,
        kind: LayerEventKind,
        flags: u8,
        name: String,
    },
    LayerSelect {
        layer_id: u16,
    },
    Chat {
        text: String,
    },
    Palette {
        entries: Vec<u32>,
    },
}

impl MessageBody {
    pub fn kind(&self) -> super::opcode::MessageKind {
        use super::opcode::MessageKind as K;
        match self {
            Self::Identifier { .. } => K::Identifier,
            Self::HostInfo { .. } => K::HostInfo,
            Self::UserInfo { .. } => K::UserInfo,
            Self::SessionInfo { .. } => K::SessionInfo,
            Self::StrokeInfo(_) => K::StrokeInfo,
            Self::StrokeEnd => K::StrokeEnd,
            Self::ToolInfo(_) => K::ToolInfo,
            Self::Authentication { .. } => K::Authentication,
            Self::Password { .. } => K::Password,
            Self::Synchronize => K::Synchronize,
            Self::Raster { .. } => K::Raster,
            Self::SyncWait => K::SyncWait,
            Self::Subscribe { .. } => K::Subscribe,
            Self::Unsubscribe => K::Unsubscribe,
            Self::SessionSelect => K::SessionSelect,
            Self::Instruction(_) => K::Instruction,
            Self::ListSessions => K::ListSessions,
            Self::Cancel => K::Cancel,
            Self::Acknowledgement(_) => K::Acknowledgement,
            Self::Error { .. } => K::Error,
            Self::SessionEvent { .. } => K::SessionEvent,
            Self::LayerEvent { .. } => K::LayerEvent,
            Self::LayerSelect { .. } => K::LayerSelect,
            Self::Chat { .. } => K::Chat,
            Self::Palette { .. } => K::Palette,
        }
    }
}
