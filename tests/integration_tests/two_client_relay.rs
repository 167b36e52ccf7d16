// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use canvasd::wire::message::{InstructionBody, StrokePoint, UserEventKind};
use canvasd::wire::{Message, MessageBody};

use super::common::{default_config, spawn_server, TestClient};

/// spec.md §8 scenario 1: two clients on an empty board, a stroke from one
/// relays to the other with no sync detour.
#[tokio::test]
async fn stroke_from_one_client_relays_to_the_other() {
    let addr = spawn_server(default_config()).await;

    let mut a = TestClient::connect(addr).await;
    a.handshake(None).await;
    a.send(&Message {
        user_id: 0,
        session_id: None,
        body: MessageBody::Instruction(InstructionBody::Create {
            title: "board".into(),
            width: 800,
            height: 600,
            max_users: 8,
            password: None,
        }),
    })
    .await;
    let session_info = a.recv().await;
    let MessageBody::SessionInfo { .. } = session_info.body else {
        panic!("expected SessionInfo, got {:?}", session_info.body);
    };
    let sid = session_info.session_id.expect("session id");

    let mut b = TestClient::connect(addr).await;
    b.handshake(None).await;
    b.send(&Message {
        user_id: 0,
        session_id: Some(sid),
        body: MessageBody::Subscribe { password: None },
    })
    .await;

    // Empty board: B joins without a sync detour, and A is told B joined.
    let join_seen_by_a = a.recv().await;
    match join_seen_by_a.body {
        MessageBody::UserInfo { event, .. } => assert_eq!(event, UserEventKind::Join),
        other => panic!("expected UserInfo{{Join}}, got {other:?}"),
    }
    let join_seen_by_b = b.recv().await;
    assert!(matches!(
        join_seen_by_b.body,
        MessageBody::UserInfo {
            event: UserEventKind::Join,
            ..
        }
    ));

    a.send(&Message {
        user_id: 0,
        session_id: Some(sid),
        body: MessageBody::StrokeInfo(StrokePoint {
            x: 42,
            y: 43,
            pressure: 200,
        }),
    })
    .await;

    let relayed = b.recv().await;
    assert_eq!(relayed.session_id, Some(sid));
    match relayed.body {
        MessageBody::StrokeInfo(point) => {
            assert_eq!(point.x, 42);
            assert_eq!(point.pressure, 200);
        }
        other => panic!("expected StrokeInfo, got {other:?}"),
    }
    // The server stamps the authoritative sender, not whatever the client
    // claimed in its header.
    assert_eq!(relayed.user_id, 1);
}
