// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use canvasd::wire::message::{InstructionBody, StrokePoint, UserEventKind};
use canvasd::wire::{Message, MessageBody};

use super::common::{default_config, spawn_server, TestClient};

/// spec.md §8 scenario 2: a joiner on a non-empty board is held in sync
/// until the elected source's raster relay completes, then gets the
/// `UserInfo{Join}` the empty-board path would have sent immediately.
#[tokio::test]
async fn late_joiner_waits_for_raster_before_joining() {
    let addr = spawn_server(default_config()).await;

    let mut a = TestClient::connect(addr).await;
    a.handshake(None).await;
    a.send(&Message {
        user_id: 0,
        session_id: None,
        body: MessageBody::Instruction(InstructionBody::Create {
            title: "board".into(),
            width: 32,
            height: 32,
            max_users: 8,
            password: None,
        }),
    })
    .await;
    let session_info = a.recv().await;
    let sid = session_info.session_id.expect("session id");

    // Give the board content so a late joiner needs a raster sync.
    a.send(&Message {
        user_id: 0,
        session_id: Some(sid),
        body: MessageBody::StrokeInfo(StrokePoint {
            x: 1,
            y: 1,
            pressure: 255,
        }),
    })
    .await;

    let mut b = TestClient::connect(addr).await;
    b.handshake(None).await;
    b.send(&Message {
        user_id: 0,
        session_id: Some(sid),
        body: MessageBody::Subscribe { password: None },
    })
    .await;

    // A is elected the raster source and told to start streaming.
    let synchronize = a.recv().await;
    assert_eq!(synchronize.session_id, Some(sid));
    assert!(matches!(synchronize.body, MessageBody::Synchronize));

    let raster_bytes = b"full-canvas-raster".to_vec();
    a.send(&Message {
        user_id: 0,
        session_id: Some(sid),
        body: MessageBody::Raster {
            offset: 0,
            length: raster_bytes.len() as u32,
            size: raster_bytes.len() as u32,
            data: raster_bytes.clone(),
        },
    })
    .await;

    let relayed_raster = b.recv().await;
    match relayed_raster.body {
        MessageBody::Raster { data, .. } => assert_eq!(data, raster_bytes),
        other => panic!("expected Raster, got {other:?}"),
    }

    // Only once the raster completes does B show up as joined, to both
    // peers.
    let join_for_a = a.recv().await;
    assert!(matches!(
        join_for_a.body,
        MessageBody::UserInfo {
            event: UserEventKind::Join,
            ..
        }
    ));
    let join_for_b = b.recv().await;
    assert!(matches!(
        join_for_b.body,
        MessageBody::UserInfo {
            event: UserEventKind::Join,
            ..
        }
    ));
}
