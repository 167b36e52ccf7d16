// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use canvasd::wire::message::{InstructionBody, StrokePoint};
use canvasd::wire::{self, Message, MessageBody};

use super::common::{default_config, spawn_server, TestClient};

/// spec.md §8 scenario 6: a bulk `StrokeInfo` frame carrying several
/// samples decodes into exactly that many `StrokeInfo` messages, each
/// carrying one sample and the sender's user_id.
#[tokio::test]
async fn bulk_stroke_frame_relays_as_separate_messages_per_point() {
    let addr = spawn_server(default_config()).await;

    let mut a = TestClient::connect(addr).await;
    a.handshake(None).await;
    a.send(&Message {
        user_id: 0,
        session_id: None,
        body: MessageBody::Instruction(InstructionBody::Create {
            title: "board".into(),
            width: 64,
            height: 64,
            max_users: 8,
            password: None,
        }),
    })
    .await;
    let session_info = a.recv().await;
    let sid = session_info.session_id.expect("session id");

    let mut b = TestClient::connect(addr).await;
    b.handshake(None).await;
    b.send(&Message {
        user_id: 0,
        session_id: Some(sid),
        body: MessageBody::Subscribe { password: None },
    })
    .await;
    let _join_a = a.recv().await;
    let _join_b = b.recv().await;

    let points: Vec<StrokePoint> = (0..20)
        .map(|i| StrokePoint {
            x: i,
            y: i * 2,
            pressure: 128,
        })
        .collect();
    let bulk_frame =
        wire::encode_bulk_strokes(0, Some(sid), &points).expect("encode bulk stroke frame");
    a.send_bytes(&bulk_frame).await;

    let mut sender_id = None;
    for expected in &points {
        let relayed = b.recv().await;
        let sender_id = *sender_id.get_or_insert(relayed.user_id);
        assert_eq!(relayed.user_id, sender_id);
        match relayed.body {
            MessageBody::StrokeInfo(got) => assert_eq!(got, *expected),
            other => panic!("expected StrokeInfo, got {other:?}"),
        }
    }
}
