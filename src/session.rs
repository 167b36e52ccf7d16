// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The shared drawing board (C4): subscriber set, raster-sync state, and
//! the per-subscriber state machine from spec.md §4.4.
//!
//! Each `Session` is owned outright by the [`crate::host::Host`] actor
//! rather than running as its own tokio task — the single-mutator
//! requirement of spec.md §5 already holds with one Host actor, and
//! spec.md §5's per-session actor-isolation wording is an explicit
//! *allowance*, not a requirement. Keeping sessions as plain data owned by
//! one `BTreeMap` avoids a second message-passing layer for no behavioral
//! gain; see `DESIGN.md` for the tradeoff. Using a `BTreeMap<u8, _>` for
//! `subscribers` additionally gives the ascending-`user_id` fan-out order
//! spec.md §4.4 requires for free, without a separate sort step.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::wire::Message;

/// Per-subscriber state machine (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Joining,
    SyncWait,
    SyncReceiving,
    Active,
    Leaving,
}

/// State of one in-flight raster-sync election/relay cycle.
#[derive(Debug, Default)]
pub struct SyncState {
    pub source_user_id: u8,
    pub total_size: u32,
    pub received: u32,
    /// Subscribers currently waiting on this cycle's raster.
    pub waiters: Vec<u8>,
    /// Joiners that arrived while this cycle was already in flight; served
    /// by the next cycle once this one completes.
    pub pending_joiners: Vec<u8>,
    /// Drawing events accepted from other subscribers while this cycle is
    /// in flight, replayed to `waiters` once the raster completes.
    pub queued_events: Vec<Message>,
    /// Election attempts made for this join batch; capped at 3 per
    /// spec.md §4.4 step 5.
    pub attempts: u8,
}

/// `SyncWait` barrier state (spec.md §4.4 "SyncWait" paragraph).
#[derive(Debug, Default)]
pub struct SyncWaitState {
    pub pending: BTreeSet<u8>,
}

#[derive(Debug)]
pub struct Session {
    pub session_id: u8,
    pub title: String,
    pub owner_user_id: u8,
    pub width: u16,
    pub height: u16,
    pub locked: bool,
    /// Non-cryptographic digest of the session password, per the
    /// `DESIGN.md` note on why this crate doesn't pull in a hashing crate
    /// for an in-memory-only, non-persisted comparison.
    pub password_hash: Option<u64>,
    pub max_users: u8,
    pub subscribers: BTreeMap<u8, SubscriberState>,
    pub sync: Option<SyncState>,
    pub sync_wait: Option<SyncWaitState>,
    /// Whether any raster-affecting event has ever been accepted; gates
    /// whether a new joiner needs a sync cycle at all (spec.md §4.4: an
    /// empty canvas needs no sync).
    pub has_content: bool,
    /// Whether the session survives its owner leaving (ownership passes to
    /// the lowest remaining user id) instead of being torn down.
    pub persistent: bool,
}

impl Session {
    pub fn new(
        session_id: u8,
        title: String,
        owner_user_id: u8,
        width: u16,
        height: u16,
        max_users: u8,
        password_hash: Option<u64>,
    ) -> Self {
        Self {
            session_id,
            title,
            owner_user_id,
            width,
            height,
            locked: false,
            password_hash,
            max_users,
            subscribers: BTreeMap::new(),
            sync: None,
            sync_wait: None,
            has_content: false,
            persistent: false,
        }
    }

    pub fn is_full(&self) -> bool {
        self.subscribers.len() >= self.max_users as usize
    }
}

/// Non-cryptographic digest used to compare session/host passwords without
/// keeping them in plaintext. Not a security boundary (spec.md §1 excludes
/// cryptographic transport security); only meant to avoid holding the raw
/// string around for comparison.
pub fn hash_password(password: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    password.hash(&mut hasher);
    hasher.finish()
}
