// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The authenticated-peer record (C3) and its guarded state machine.
//!
//! Grounded on the teacher's `LoginCtx`/login state machine
//! (`src/state_machine/login/common.rs`): a small enum of states plus a
//! `set_state` that only accepts the edges the protocol defines, refusing
//! (rather than silently applying) everything else.

use std::collections::BTreeSet;

use crate::wire::MessageKind;

/// Lifecycle state of an authenticated peer (spec.md §3/§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserState {
    #[default]
    Login,
    LoginAuth,
    Active,
    Sync,
    Dead,
}

/// Per-peer permission bits. Cosmetic `display_color` rides along here
/// since it has no wire effect beyond being echoed back in `UserInfo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeFlags {
    pub locked: bool,
    pub muted: bool,
    pub admin: bool,
}

#[derive(Debug)]
pub struct User {
    pub user_id: u8,
    pub name: String,
    pub state: UserState,
    pub mode_flags: ModeFlags,
    pub active_session_id: Option<u8>,
    pub subscribed_sessions: BTreeSet<u8>,
    /// Cosmetic RGBA color echoed in `UserInfo`; never validated.
    pub display_color: u32,
}

/// A state transition the protocol does not define for the user's current
/// state. Per spec.md §4.3, any such attempt is itself a fault: the caller
/// must force the user to `Dead` and queue an `Error` before close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: UserState,
    pub attempted: UserState,
}

impl User {
    pub fn new(user_id: u8, name: String) -> Self {
        Self {
            user_id,
            name,
            state: UserState::Login,
            mode_flags: ModeFlags::default(),
            active_session_id: None,
            subscribed_sessions: BTreeSet::new(),
            display_color: 0,
        }
    }

    /// Guarded transition per the table in spec.md §4.3. `Dead` is reachable
    /// from any state (disconnect, kick, protocol violation); every other
    /// edge must match the table exactly.
    pub fn set_state(&mut self, new: UserState) -> Result<(), InvalidTransition> {
        let allowed = matches!(
            (self.state, new),
            (UserState::Login, UserState::LoginAuth)
                | (UserState::LoginAuth, UserState::Active)
                | (UserState::Active, UserState::Sync)
                | (UserState::Sync, UserState::Active)
                | (_, UserState::Dead)
        );
        if !allowed {
            return Err(InvalidTransition {
                from: self.state,
                attempted: new,
            });
        }
        self.state = new;
        Ok(())
    }

    /// Per-state access matrix (spec.md §4.3). Drawing and session-control
    /// traffic requires `Active` and an unlocked peer; login traffic
    /// requires the matching login sub-state; a handful of message kinds
    /// are always permitted regardless of state.
    pub fn can_send(&self, kind: MessageKind) -> bool {
        use MessageKind as K;
        if self.state == UserState::Dead {
            return false;
        }
        match kind {
            K::Identifier => self.state == UserState::Login,
            K::Password | K::Authentication => self.state == UserState::LoginAuth,
            K::ListSessions => {
                matches!(
                    self.state,
                    UserState::LoginAuth | UserState::Active | UserState::Sync
                )
            }
            K::Cancel => true,
            K::StrokeInfo
            | K::StrokeEnd
            | K::ToolInfo
            | K::LayerEvent
            | K::LayerSelect
            | K::Chat
            | K::Palette => self.state == UserState::Active && !self.mode_flags.locked,
            K::Subscribe
            | K::Unsubscribe
            | K::SessionSelect
            | K::Instruction
            | K::SyncWait
            | K::Acknowledgement => self.state == UserState::Active,
            // Raster is pushed by the elected sync *source*, who stays
            // `Active` throughout — the `Sync` state belongs to the joiner
            // receiving it, who never sends either of these.
            K::Raster => self.state == UserState::Active,
            K::Synchronize => false,
            K::HostInfo
            | K::UserInfo
            | K::SessionInfo
            | K::Error
            | K::SessionEvent
            | K::Deflate => false,
        }
    }

    /// Invariant from spec.md §3: `Active` implies exactly one selected
    /// session that is also in the subscribed set.
    pub fn invariant_holds(&self) -> bool {
        match self.state {
            UserState::Active => self
                .active_session_id
                .is_some_and(|sid| self.subscribed_sessions.contains(&sid)),
            UserState::Login | UserState::LoginAuth => {
                self.active_session_id.is_none() && self.subscribed_sessions.is_empty()
            }
            UserState::Sync | UserState::Dead => true,
        }
    }
}
