// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use canvasd::error::ErrorReason;
use canvasd::host::{HostConfig, PROTOCOL_REVISION};
use canvasd::wire::{Message, MessageBody};

use super::common::{default_config, spawn_server, TestClient};

#[tokio::test]
async fn wrong_host_password_is_rejected_without_killing_the_connection() {
    let config = HostConfig {
        password_hash: Some(canvasd::session::hash_password("letmein")),
        ..default_config()
    };
    let addr = spawn_server(config).await;

    let mut client = TestClient::connect(addr).await;
    client
        .send(&Message {
            user_id: 0,
            session_id: None,
            body: MessageBody::Identifier {
                revision: PROTOCOL_REVISION,
                level: 0,
                flags: 0,
                extensions: 0,
            },
        })
        .await;
    let host_info = client.recv().await;
    assert!(matches!(host_info.body, MessageBody::HostInfo { .. }));

    client
        .send(&Message {
            user_id: 0,
            session_id: None,
            body: MessageBody::Password {
                password: "wrong".into(),
            },
        })
        .await;
    let err = client.recv().await;
    match err.body {
        MessageBody::Error { reason, .. } => assert_eq!(reason, ErrorReason::BadPassword),
        other => panic!("expected Error{{BadPassword}}, got {other:?}"),
    }

    // A bad password is a policy rejection, not a protocol fault: the peer
    // may retry on the same connection.
    client
        .send(&Message {
            user_id: 0,
            session_id: None,
            body: MessageBody::Password {
                password: "letmein".into(),
            },
        })
        .await;
    client
        .send(&Message {
            user_id: 0,
            session_id: None,
            body: MessageBody::Instruction(canvasd::wire::message::InstructionBody::Create {
                title: "board".into(),
                width: 100,
                height: 100,
                max_users: 8,
                password: None,
            }),
        })
        .await;
    let session_info = client.recv().await;
    assert!(matches!(session_info.body, MessageBody::SessionInfo { .. }));
}
