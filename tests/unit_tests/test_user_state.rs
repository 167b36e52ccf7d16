// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use canvasd::user::{User, UserState};
use canvasd::wire::MessageKind;

#[test]
fn fresh_user_can_only_send_identifier() {
    let user = User::new(1, String::new());
    assert!(user.can_send(MessageKind::Identifier));
    assert!(!user.can_send(MessageKind::Password));
    assert!(!user.can_send(MessageKind::Subscribe));
}

#[test]
fn login_to_active_follows_the_defined_path() {
    let mut user = User::new(1, String::new());
    user.set_state(UserState::LoginAuth).expect("login -> login_auth");
    assert!(user.can_send(MessageKind::Password));
    user.set_state(UserState::Active).expect("login_auth -> active");
    assert!(user.can_send(MessageKind::Subscribe));
    assert!(!user.can_send(MessageKind::Identifier));
}

#[test]
fn skipping_login_auth_is_rejected() {
    let mut user = User::new(1, String::new());
    assert!(user.set_state(UserState::Active).is_err());
}

#[test]
fn dead_is_reachable_from_every_state_and_terminal() {
    for start in [
        UserState::Login,
        UserState::LoginAuth,
        UserState::Active,
        UserState::Sync,
    ] {
        let mut user = User::new(1, String::new());
        user.state = start;
        assert!(user.set_state(UserState::Dead).is_ok());
        assert!(!user.can_send(MessageKind::Cancel));
        assert!(user.set_state(UserState::Active).is_err());
    }
}

#[test]
fn locked_active_user_cannot_draw_but_can_still_chat_control() {
    let mut user = User::new(1, String::new());
    user.set_state(UserState::LoginAuth).unwrap();
    user.set_state(UserState::Active).unwrap();
    user.mode_flags.locked = true;
    assert!(!user.can_send(MessageKind::StrokeInfo));
    assert!(user.can_send(MessageKind::Subscribe));
}

#[test]
fn active_invariant_requires_selected_session_to_be_subscribed() {
    let mut user = User::new(1, String::new());
    user.set_state(UserState::LoginAuth).unwrap();
    user.set_state(UserState::Active).unwrap();
    user.active_session_id = Some(3);
    assert!(!user.invariant_holds());
    user.subscribed_sessions.insert(3);
    assert!(user.invariant_holds());
}
