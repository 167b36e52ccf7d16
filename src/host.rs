// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The Host actor (C5): the single mutator of all user and session state,
//! and the router that implements the dispatch table in spec.md §4.5.
//!
//! Grounded on the teacher's `Pool` (`src/client/pool_sessions.rs`): a
//! registry of sessions keyed by id, looked up and mutated from one place.
//! The teacher's `Pool` is shared behind `Arc` and its maps are `DashMap`
//! because many client tasks drive it concurrently; this server instead
//! runs the registry as a single actor fed by an `mpsc` mailbox (spec.md
//! §5's single-threaded reactor), so plain `BTreeMap`s replace `DashMap`
//! and no locking is needed — see `DESIGN.md`.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cfg::cli::Cli;
use crate::connection::Connection;
use crate::error::{ErrorReason, HostError};
use crate::session::{hash_password, Session, SubscriberState, SyncState, SyncWaitState};
use crate::user::{User, UserState};
use crate::wire::message::{AckKind, InstructionBody, SessionEventKind, UserEventKind};
use crate::wire::{Message, MessageBody};

/// Protocol revision this server speaks. A client advertising anything else
/// is a fatal `ProtocolMismatch` (spec.md §4.5, scenario 5).
pub const PROTOCOL_REVISION: u32 = 9;

/// Events the connection and accept layers push into the Host's mailbox.
/// The Host is the only task that ever mutates user/session state; this
/// enum is the entirety of its inbound interface.
#[derive(Debug)]
pub enum HostEvent {
    NewConnection { user_id: u8, conn: Arc<Connection> },
    Inbound { user_id: u8, message: Message },
    Disconnected { user_id: u8 },
    Malformed { user_id: u8, reason: String },
}

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub password_hash: Option<u64>,
    pub title: String,
    pub max_users: u8,
    pub max_sessions: u8,
    pub require_password: bool,
}

impl HostConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            password_hash: cli.password.as_deref().map(hash_password),
            title: cli.title.clone(),
            max_users: cli.max_users,
            max_sessions: cli.max_sessions,
            require_password: cli.require_password,
        }
    }
}

pub struct Host {
    config: HostConfig,
    users: BTreeMap<u8, User>,
    sessions: BTreeMap<u8, Session>,
    connections: BTreeMap<u8, Arc<Connection>>,
}

/// Smallest id in `1..=255` not already a key of `map`. Acts as the
/// free-list allocator SPEC_FULL.md's data model calls for, without
/// maintaining a separate free list: the map's key set already tells us
/// which ids are live.
fn smallest_unused_id<T>(map: &BTreeMap<u8, T>) -> Option<u8> {
    for candidate in 1..=255u8 {
        if !map.contains_key(&candidate) {
            return Some(candidate);
        }
    }
    None
}

impl Host {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            users: BTreeMap::new(),
            sessions: BTreeMap::new(),
            connections: BTreeMap::new(),
        }
    }

    /// The event loop: spec.md §4.6's single-threaded reactor, expressed as
    /// draining one `mpsc` mailbox instead of polling a readiness set.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<HostEvent>) {
        while let Some(event) = rx.recv().await {
            match event {
                HostEvent::NewConnection { user_id, conn } => self.on_connect(user_id, conn),
                HostEvent::Inbound { user_id, message } => self.on_inbound(user_id, message),
                HostEvent::Disconnected { user_id } => self.remove_user(user_id),
                HostEvent::Malformed { user_id, reason } => {
                    warn!(user_id, %reason, "malformed frame");
                    self.fail_user(user_id, HostError::Malformed(reason));
                }
            }
        }
    }

    fn deliver(&self, user_id: u8, msg: &Message) {
        if let Some(conn) = self.connections.get(&user_id) {
            if let Err(e) = conn.enqueue(msg) {
                warn!(user_id, error = %e, "failed to encode outbound message");
            }
        }
    }

    fn broadcast_session(&self, session_id: u8, msg: &Message) {
        let Some(session) = self.sessions.get(&session_id) else {
            return;
        };
        for &uid in session.subscribers.keys() {
            self.deliver(uid, msg);
        }
    }

    fn send_error(&self, user_id: u8, reason: ErrorReason, message: impl Into<String>) {
        self.deliver(
            user_id,
            &Message {
                user_id: 0,
                session_id: None,
                body: MessageBody::Error {
                    reason,
                    message: message.into(),
                },
            },
        );
    }

    fn fail_user(&mut self, user_id: u8, err: HostError) {
        self.send_error(user_id, err.reason(), err.to_string());
        if err.is_fatal() {
            if let Some(user) = self.users.get_mut(&user_id) {
                let _ = user.set_state(UserState::Dead);
            }
            self.remove_user(user_id);
        }
    }

    fn on_connect(&mut self, user_id: u8, conn: Arc<Connection>) {
        self.connections.insert(user_id, conn);
        self.users.insert(user_id, User::new(user_id, String::new()));
    }

    /// Tears a user out of every session it is subscribed to, then drops
    /// its records and cancels its connection. Safe to call more than once
    /// (e.g. a fatal error followed by the read task's own disconnect
    /// notice) since every lookup is `Option`-guarded.
    fn remove_user(&mut self, user_id: u8) {
        let subscribed: Vec<u8> = self
            .users
            .get(&user_id)
            .map(|u| u.subscribed_sessions.iter().copied().collect())
            .unwrap_or_default();
        for sid in subscribed {
            self.leave_session(user_id, sid, UserEventKind::Leave, None);
        }
        self.users.remove(&user_id);
        if let Some(conn) = self.connections.remove(&user_id) {
            conn.cancel();
        }
    }

    fn on_inbound(&mut self, user_id: u8, message: Message) {
        let Some(user) = self.users.get(&user_id) else {
            return;
        };
        if user.state == UserState::Dead {
            return;
        }
        let kind = message.kind();
        if !user.can_send(kind) {
            self.fail_user(user_id, HostError::Unauthorized);
            return;
        }

        match message.body {
            MessageBody::Identifier { revision, .. } => self.handle_identifier(user_id, revision),
            MessageBody::Password { password } | MessageBody::Authentication { password } => {
                self.handle_password(user_id, password)
            }
            MessageBody::ListSessions => self.handle_list_sessions(user_id),
            MessageBody::Subscribe { password } => {
                self.handle_subscribe(user_id, message.session_id, password)
            }
            MessageBody::Unsubscribe => {
                if let Some(sid) = message.session_id {
                    self.leave_session(user_id, sid, UserEventKind::Leave, None);
                }
            }
            MessageBody::SessionSelect => self.handle_session_select(user_id, message.session_id),
            MessageBody::Instruction(instr) => {
                self.handle_instruction(user_id, message.session_id, instr)
            }
            MessageBody::Cancel => self.handle_cancel(user_id),
            MessageBody::Raster { .. } => self.handle_raster_chunk(user_id, message),
            MessageBody::SyncWait => self.handle_sync_wait(user_id, message.session_id),
            MessageBody::Acknowledgement(AckKind::SyncWait) => {
                self.handle_ack_sync_wait(user_id, message.session_id)
            }
            MessageBody::StrokeInfo(_)
            | MessageBody::StrokeEnd
            | MessageBody::ToolInfo(_)
            | MessageBody::LayerEvent { .. }
            | MessageBody::LayerSelect { .. }
            | MessageBody::Chat { .. }
            | MessageBody::Palette { .. } => self.handle_drawing_event(user_id, message),
            // Server-originated kinds never arrive from a peer; `can_send`
            // already rejects them above.
            MessageBody::HostInfo { .. }
            | MessageBody::UserInfo { .. }
            | MessageBody::SessionInfo { .. }
            | MessageBody::Error { .. }
            | MessageBody::SessionEvent { .. }
            | MessageBody::Synchronize => {}
        }
    }

    fn handle_identifier(&mut self, user_id: u8, revision: u32) {
        if revision != PROTOCOL_REVISION {
            self.fail_user(user_id, HostError::ProtocolMismatch);
            return;
        }
        let Some(user) = self.users.get_mut(&user_id) else {
            return;
        };
        if user.set_state(UserState::LoginAuth).is_err() {
            self.fail_user(user_id, HostError::Malformed("unexpected Identifier".into()));
            return;
        }
        let host_info = Message {
            user_id: 0,
            session_id: None,
            body: MessageBody::HostInfo {
                users_online: self.users.len() as u8,
                users_max: self.config.max_users,
                sessions_online: self.sessions.len() as u8,
                sessions_max: self.config.max_sessions,
                req_flags: 0,
                ext_flags: 0,
                title: self.config.title.clone(),
            },
        };
        self.deliver(user_id, &host_info);
    }

    fn handle_password(&mut self, user_id: u8, password: String) {
        let ok = match &self.config.password_hash {
            None => true,
            Some(expected) => hash_password(&password) == *expected,
        };
        if !ok {
            self.fail_user(user_id, HostError::BadPassword);
            return;
        }
        if let Some(user) = self.users.get_mut(&user_id) {
            let _ = user.set_state(UserState::Active);
        }
    }

    fn handle_list_sessions(&self, user_id: u8) {
        for session in self.sessions.values() {
            let msg = Message {
                user_id: 0,
                session_id: Some(session.session_id),
                body: MessageBody::SessionInfo {
                    title: session.title.clone(),
                    width: session.width,
                    height: session.height,
                    owner_user_id: session.owner_user_id,
                    flags: if session.locked { 0x01 } else { 0x00 },
                    max_users: session.max_users,
                    subscriber_count: session.subscribers.len() as u8,
                },
            };
            self.deliver(user_id, &msg);
        }
    }

    fn handle_session_select(&mut self, user_id: u8, session_id: Option<u8>) {
        let Some(sid) = session_id else {
            self.fail_user(user_id, HostError::SessionClosed);
            return;
        };
        let subscribed = self
            .users
            .get(&user_id)
            .is_some_and(|u| u.subscribed_sessions.contains(&sid));
        if !subscribed {
            self.fail_user(user_id, HostError::NotSubscribed);
            return;
        }
        if let Some(user) = self.users.get_mut(&user_id) {
            user.active_session_id = Some(sid);
        }
    }

    fn handle_subscribe(&mut self, user_id: u8, session_id: Option<u8>, password: Option<String>) {
        let Some(sid) = session_id else {
            self.fail_user(user_id, HostError::SessionClosed);
            return;
        };
        let Some(session) = self.sessions.get(&sid) else {
            self.fail_user(user_id, HostError::SessionClosed);
            return;
        };
        if session.subscribers.contains_key(&user_id) {
            return; // already subscribed: no-op per spec.md §4.4
        }
        if session.is_full() {
            self.fail_user(user_id, HostError::UserLimit);
            return;
        }
        if self.config.require_password && session.password_hash.is_none() {
            self.fail_user(user_id, HostError::PasswordRequired);
            return;
        }
        match (&session.password_hash, password) {
            (Some(expected), Some(given)) if hash_password(&given) == *expected => {}
            (Some(_), None) => {
                self.fail_user(user_id, HostError::PasswordRequired);
                return;
            }
            (Some(_), Some(_)) => {
                self.fail_user(user_id, HostError::BadPassword);
                return;
            }
            (None, _) => {}
        }

        if let Some(user) = self.users.get_mut(&user_id) {
            user.subscribed_sessions.insert(sid);
        }
        let needs_sync = self.sessions.get(&sid).is_some_and(|s| s.has_content);
        let initial_state = if needs_sync {
            SubscriberState::Joining
        } else {
            SubscriberState::Active
        };
        if let Some(session) = self.sessions.get_mut(&sid) {
            session.subscribers.insert(user_id, initial_state);
        }
        if needs_sync {
            self.start_sync(sid, user_id);
        } else {
            self.broadcast_join(sid, user_id);
        }
    }

    fn broadcast_join(&self, sid: u8, user_id: u8) {
        let name = self.users.get(&user_id).map(|u| u.name.clone()).unwrap_or_default();
        self.broadcast_session(
            sid,
            &Message {
                user_id: 0,
                session_id: Some(sid),
                body: MessageBody::UserInfo {
                    event: UserEventKind::Join,
                    name,
                    reason: None,
                },
            },
        );
    }

    /// Elects a raster source for `joiner` and kicks off a sync cycle, or
    /// folds `joiner` into a cycle already in flight (spec.md §4.4, steps
    /// 1-5).
    fn start_sync(&mut self, sid: u8, joiner: u8) {
        if let Some(session) = self.sessions.get_mut(&sid) {
            if let Some(sync) = session.sync.as_mut() {
                if !sync.waiters.contains(&joiner) && !sync.pending_joiners.contains(&joiner) {
                    sync.pending_joiners.push(joiner);
                }
                return;
            }
        }
        self.elect_and_start_sync(sid, vec![joiner], 1);
    }

    fn elect_and_start_sync(&mut self, sid: u8, waiters: Vec<u8>, attempt: u8) {
        let Some(session) = self.sessions.get(&sid) else {
            return;
        };
        let source = session
            .subscribers
            .iter()
            .find(|&(&uid, &state)| state == SubscriberState::Active && !waiters.contains(&uid))
            .map(|(&uid, _)| uid);

        let Some(source) = source else {
            for &uid in &waiters {
                self.fail_waiter(sid, uid, HostError::NoSyncSource);
            }
            return;
        };

        for &uid in &waiters {
            if let Some(user) = self.users.get_mut(&uid) {
                let _ = user.set_state(UserState::Sync);
            }
            if let Some(session) = self.sessions.get_mut(&sid) {
                session
                    .subscribers
                    .insert(uid, SubscriberState::SyncWait);
            }
        }
        if let Some(session) = self.sessions.get_mut(&sid) {
            session.sync = Some(SyncState {
                source_user_id: source,
                total_size: 0,
                received: 0,
                waiters,
                pending_joiners: Vec::new(),
                queued_events: Vec::new(),
                attempts: attempt,
            });
        }
        self.deliver(
            source,
            &Message {
                user_id: 0,
                session_id: Some(sid),
                body: MessageBody::Synchronize,
            },
        );
    }

    /// Fails one waiter out of an in-flight or about-to-start cycle:
    /// reverts its subscription attempt and notifies it. Used both by
    /// `Cancel` and by sync-source-unavailable.
    fn fail_waiter(&mut self, sid: u8, user_id: u8, err: HostError) {
        self.send_error(user_id, err.reason(), err.to_string());
        if let Some(session) = self.sessions.get_mut(&sid) {
            session.subscribers.remove(&user_id);
        }
        if let Some(user) = self.users.get_mut(&user_id) {
            user.subscribed_sessions.remove(&sid);
            if user.active_session_id == Some(sid) {
                user.active_session_id = None;
            }
            let _ = user.set_state(UserState::Active);
        }
    }

    fn handle_raster_chunk(&mut self, user_id: u8, message: Message) {
        let MessageBody::Raster {
            offset,
            length,
            size,
            ..
        } = &message.body
        else {
            return;
        };
        let Some(sid) = self
            .sessions
            .iter()
            .find(|(_, s)| s.sync.as_ref().is_some_and(|sy| sy.source_user_id == user_id))
            .map(|(&sid, _)| sid)
        else {
            return; // stray raster chunk from a user that isn't the elected source
        };

        let Some(session) = self.sessions.get_mut(&sid) else {
            return;
        };
        let Some(sync) = session.sync.as_mut() else {
            return;
        };
        sync.total_size = *size;
        sync.received = offset + length;
        let waiters = sync.waiters.clone();
        let done = sync.received >= sync.total_size;
        for &uid in &waiters {
            session
                .subscribers
                .insert(uid, SubscriberState::SyncReceiving);
        }

        for &uid in &waiters {
            self.deliver(uid, &message);
        }

        if done {
            self.finish_sync(sid);
        }
    }

    fn finish_sync(&mut self, sid: u8) {
        let Some(session) = self.sessions.get_mut(&sid) else {
            return;
        };
        let Some(sync) = session.sync.take() else {
            return;
        };
        session.has_content = true;
        for &uid in &sync.waiters {
            session.subscribers.insert(uid, SubscriberState::Active);
        }
        let SyncState {
            waiters,
            pending_joiners: pending,
            queued_events: queued,
            ..
        } = sync;

        for uid in &waiters {
            if let Some(user) = self.users.get_mut(uid) {
                let _ = user.set_state(UserState::Active);
            }
        }
        for uid in &waiters {
            self.broadcast_join(sid, *uid);
        }
        for event in &queued {
            for &uid in &waiters {
                self.deliver(uid, event);
            }
        }
        if !pending.is_empty() {
            self.elect_and_start_sync(sid, pending, 1);
        }
    }

    fn handle_cancel(&mut self, user_id: u8) {
        let Some(sid) = self
            .sessions
            .iter()
            .find(|(_, s)| s.sync.as_ref().is_some_and(|sy| sy.source_user_id == user_id))
            .map(|(&sid, _)| sid)
        else {
            return;
        };
        let waiters = self
            .sessions
            .get_mut(&sid)
            .and_then(|session| session.sync.take())
            .map(|s| s.waiters)
            .unwrap_or_default();
        for uid in waiters {
            self.fail_waiter(sid, uid, HostError::SyncCancelled);
        }
    }

    fn handle_sync_wait(&mut self, user_id: u8, session_id: Option<u8>) {
        let Some(sid) = session_id else { return };
        let Some(session) = self.sessions.get(&sid) else {
            return;
        };
        if session.owner_user_id != user_id {
            self.fail_user(user_id, HostError::Unauthorized);
            return;
        }
        let pending = session
            .subscribers
            .iter()
            .filter(|&(_, &st)| st == SubscriberState::Active)
            .map(|(&uid, _)| uid)
            .collect();
        if let Some(session) = self.sessions.get_mut(&sid) {
            session.sync_wait = Some(SyncWaitState { pending });
        }
        self.broadcast_session(
            sid,
            &Message {
                user_id: 0,
                session_id: Some(sid),
                body: MessageBody::SyncWait,
            },
        );
    }

    fn handle_ack_sync_wait(&mut self, user_id: u8, session_id: Option<u8>) {
        let Some(sid) = session_id else { return };
        let Some(session) = self.sessions.get_mut(&sid) else {
            return;
        };
        let Some(sw) = session.sync_wait.as_mut() else {
            return;
        };
        sw.pending.remove(&user_id);
        if sw.pending.is_empty() {
            let owner = session.owner_user_id;
            session.sync_wait = None;
            self.deliver(
                owner,
                &Message {
                    user_id: 0,
                    session_id: Some(sid),
                    body: MessageBody::Acknowledgement(AckKind::SyncWait),
                },
            );
        }
    }

    fn handle_drawing_event(&mut self, user_id: u8, message: Message) {
        let Some(sid) = self.users.get(&user_id).and_then(|u| u.active_session_id) else {
            self.fail_user(user_id, HostError::NotSubscribed);
            return;
        };
        let Some(session) = self.sessions.get(&sid) else {
            self.fail_user(user_id, HostError::NotSubscribed);
            return;
        };
        if !session.subscribers.contains_key(&user_id) {
            self.fail_user(user_id, HostError::NotSubscribed);
            return;
        }
        if session.locked && session.owner_user_id != user_id {
            self.fail_user(user_id, HostError::Unauthorized);
            return;
        }
        let in_sync = session.sync.is_some();

        let affects_raster = matches!(
            message.body,
            MessageBody::StrokeInfo(_)
                | MessageBody::StrokeEnd
                | MessageBody::ToolInfo(_)
                | MessageBody::LayerEvent { .. }
                | MessageBody::LayerSelect { .. }
        );
        let outgoing = Message {
            user_id,
            session_id: Some(sid),
            body: message.body,
        };

        let Some(session) = self.sessions.get_mut(&sid) else {
            return;
        };
        if affects_raster {
            session.has_content = true;
        }
        if in_sync {
            if let Some(sync) = session.sync.as_mut() {
                sync.queued_events.push(outgoing);
            }
            return;
        }

        let recipients: Vec<u8> = session
            .subscribers
            .keys()
            .copied()
            .filter(|&uid| uid != user_id)
            .collect();
        for uid in recipients {
            self.deliver(uid, &outgoing);
            if self
                .connections
                .get(&uid)
                .is_some_and(|c| c.is_overflowing())
            {
                info!(user_id = uid, session_id = sid, "evicting slow subscriber");
                if let Some(user) = self.users.get_mut(&uid) {
                    let _ = user.set_state(UserState::Dead);
                }
                self.leave_session(uid, sid, UserEventKind::Kicked, Some(ErrorReason::SessionClosed));
                self.remove_user(uid);
            }
        }
    }

    fn require_owner(&self, sid: u8, user_id: u8) -> Result<(), HostError> {
        match self.sessions.get(&sid) {
            Some(session) if session.owner_user_id == user_id => Ok(()),
            Some(_) => Err(HostError::Unauthorized),
            None => Err(HostError::SessionClosed),
        }
    }

    fn handle_instruction(&mut self, user_id: u8, session_id: Option<u8>, instr: InstructionBody) {
        if let InstructionBody::Create {
            title,
            width,
            height,
            max_users,
            password,
        } = instr
        {
            self.handle_create(user_id, title, width, height, max_users, password);
            return;
        }

        let Some(sid) = session_id.or_else(|| self.users.get(&user_id).and_then(|u| u.active_session_id))
        else {
            self.fail_user(user_id, HostError::SessionClosed);
            return;
        };

        match instr {
            InstructionBody::Create { .. } => unreachable!(),
            InstructionBody::Destroy => {
                if self.require_owner(sid, user_id).is_ok() {
                    self.destroy_session(sid, SessionEventKind::Ended);
                } else {
                    self.fail_user(user_id, HostError::Unauthorized);
                }
            }
            InstructionBody::Kick { target_user_id } => {
                if self.require_owner(sid, user_id).is_ok() {
                    self.leave_session(target_user_id, sid, UserEventKind::Kicked, None);
                } else {
                    self.fail_user(user_id, HostError::Unauthorized);
                }
            }
            InstructionBody::Lock => self.set_owner_flag(user_id, sid, |s| s.locked = true),
            InstructionBody::Unlock => self.set_owner_flag(user_id, sid, |s| s.locked = false),
            InstructionBody::SetMaxUsers { max_users } => {
                self.set_owner_flag(user_id, sid, |s| s.max_users = max_users)
            }
            InstructionBody::SetPassword { password } => {
                self.set_owner_flag(user_id, sid, |s| {
                    s.password_hash = password.as_deref().map(hash_password)
                })
            }
            InstructionBody::SetTitle { title } => {
                self.set_owner_flag(user_id, sid, |s| s.title = title)
            }
            InstructionBody::Resize { width, height } => self.set_owner_flag(user_id, sid, |s| {
                s.width = width;
                s.height = height;
            }),
            InstructionBody::TransferOwner { target_user_id } => {
                if self.require_owner(sid, user_id).is_err() {
                    self.fail_user(user_id, HostError::Unauthorized);
                    return;
                }
                let is_subscriber = self
                    .sessions
                    .get(&sid)
                    .is_some_and(|s| s.subscribers.contains_key(&target_user_id));
                if !is_subscriber {
                    self.fail_user(user_id, HostError::NotSubscribed);
                    return;
                }
                if let Some(session) = self.sessions.get_mut(&sid) {
                    session.owner_user_id = target_user_id;
                }
            }
        }
    }

    fn set_owner_flag(&mut self, user_id: u8, sid: u8, f: impl FnOnce(&mut Session)) {
        match self.require_owner(sid, user_id) {
            Ok(()) => {
                if let Some(session) = self.sessions.get_mut(&sid) {
                    f(session);
                }
            }
            Err(e) => self.fail_user(user_id, e),
        }
    }

    fn handle_create(
        &mut self,
        user_id: u8,
        title: String,
        width: u16,
        height: u16,
        max_users: u8,
        password: Option<String>,
    ) {
        if self.sessions.len() >= self.config.max_sessions as usize {
            self.fail_user(user_id, HostError::TooManySessions);
            return;
        }
        let Some(sid) = smallest_unused_id(&self.sessions) else {
            self.fail_user(user_id, HostError::TooManySessions);
            return;
        };
        let mut session = Session::new(
            sid,
            title,
            user_id,
            width,
            height,
            max_users,
            password.as_deref().map(hash_password),
        );
        session.subscribers.insert(user_id, SubscriberState::Active);
        self.sessions.insert(sid, session);

        if let Some(user) = self.users.get_mut(&user_id) {
            user.subscribed_sessions.insert(sid);
            user.active_session_id = Some(sid);
        }
        let Some(info) = self.sessions.get(&sid) else {
            return;
        };
        self.deliver(
            user_id,
            &Message {
                user_id: 0,
                session_id: Some(sid),
                body: MessageBody::SessionInfo {
                    title: info.title.clone(),
                    width: info.width,
                    height: info.height,
                    owner_user_id: info.owner_user_id,
                    flags: 0,
                    max_users: info.max_users,
                    subscriber_count: 1,
                },
            },
        );
    }

    fn destroy_session(&mut self, sid: u8, kind: SessionEventKind) {
        let Some(session) = self.sessions.get(&sid) else {
            return;
        };
        let subs: Vec<u8> = session.subscribers.keys().copied().collect();
        let ev = Message {
            user_id: 0,
            session_id: Some(sid),
            body: MessageBody::SessionEvent { kind },
        };
        for &uid in &subs {
            self.deliver(uid, &ev);
        }
        for &uid in &subs {
            if let Some(user) = self.users.get_mut(&uid) {
                user.subscribed_sessions.remove(&sid);
                if user.active_session_id == Some(sid) {
                    user.active_session_id = None;
                }
            }
        }
        self.sessions.remove(&sid);
    }

    /// Removes `user_id` from `sid`'s subscriber set, notifies the rest,
    /// and transfers or tears down ownership per spec.md §4.4 /
    /// SPEC_FULL.md's `persistent` addition.
    fn leave_session(&mut self, user_id: u8, sid: u8, kind: UserEventKind, reason: Option<ErrorReason>) {
        let Some(session) = self.sessions.get_mut(&sid) else {
            return;
        };
        if session.subscribers.remove(&user_id).is_none() {
            return;
        }
        let was_sync_source = session
            .sync
            .as_ref()
            .is_some_and(|sy| sy.source_user_id == user_id);
        if let Some(sync) = session.sync.as_mut() {
            sync.waiters.retain(|&u| u != user_id);
            sync.pending_joiners.retain(|&u| u != user_id);
        }
        if let Some(sw) = session.sync_wait.as_mut() {
            sw.pending.remove(&user_id);
        }
        if let Some(user) = self.users.get_mut(&user_id) {
            user.subscribed_sessions.remove(&sid);
            if user.active_session_id == Some(sid) {
                user.active_session_id = None;
            }
        }
        let name = self.users.get(&user_id).map(|u| u.name.clone()).unwrap_or_default();
        self.broadcast_session(
            sid,
            &Message {
                user_id: 0,
                session_id: Some(sid),
                body: MessageBody::UserInfo {
                    event: kind,
                    name,
                    reason,
                },
            },
        );

        if was_sync_source {
            self.handle_sync_source_lost(sid);
        }

        let Some(session) = self.sessions.get(&sid) else {
            return;
        };
        if session.owner_user_id != user_id {
            return;
        }
        if session.persistent {
            let new_owner = session.subscribers.keys().next().copied();
            if let Some(new_owner) = new_owner {
                if let Some(session) = self.sessions.get_mut(&sid) {
                    session.owner_user_id = new_owner;
                }
                return;
            }
        }
        self.destroy_session(sid, SessionEventKind::Ended);
    }

    /// The elected raster source disconnected mid-sync (spec.md §4.4 step 5
    /// / §8 scenario 4). Discards the partial raster and either re-elects a
    /// new source for the same waiters, or, after three failed elections,
    /// fails every waiter with `SyncFailed` and removes them from the
    /// session.
    fn handle_sync_source_lost(&mut self, sid: u8) {
        let Some(session) = self.sessions.get_mut(&sid) else {
            return;
        };
        let Some(sync) = session.sync.take() else {
            return;
        };
        if sync.waiters.is_empty() {
            return;
        }
        if sync.attempts >= 3 {
            for uid in sync.waiters {
                self.fail_waiter(sid, uid, HostError::SyncFailed);
            }
        } else {
            self.elect_and_start_sync(sid, sync.waiters, sync.attempts + 1);
        }
    }
}
