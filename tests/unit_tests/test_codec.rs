// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use canvasd::error::ErrorReason;
use canvasd::wire::message::{AckKind, InstructionBody, StrokePoint};
use canvasd::wire::{
    decode_all, decode_next, encode_bulk_strokes, encode_message, DecodeOutcome, Message,
    MessageBody,
};

fn roundtrip(msg: &Message) -> Message {
    let bytes = encode_message(msg).expect("encode");
    match decode_next(&bytes).expect("decode") {
        DecodeOutcome::Complete(mut messages, consumed) => {
            assert_eq!(consumed, bytes.len());
            assert_eq!(messages.len(), 1);
            messages.remove(0)
        }
        DecodeOutcome::NeedMore(_) => panic!("expected a complete frame"),
    }
}

#[test]
fn chat_message_round_trips() {
    let msg = Message {
        user_id: 3,
        session_id: Some(7),
        body: MessageBody::Chat {
            text: "hello".into(),
        },
    };
    assert_eq!(roundtrip(&msg), msg);
}

#[test]
fn subscribe_with_no_password_round_trips() {
    let msg = Message {
        user_id: 2,
        session_id: Some(1),
        body: MessageBody::Subscribe { password: None },
    };
    assert_eq!(roundtrip(&msg), msg);
}

#[test]
fn instruction_create_round_trips() {
    let msg = Message {
        user_id: 1,
        session_id: None,
        body: MessageBody::Instruction(InstructionBody::Create {
            title: "board".into(),
            width: 1920,
            height: 1080,
            max_users: 16,
            password: Some("secret".into()),
        }),
    };
    assert_eq!(roundtrip(&msg), msg);
}

#[test]
fn error_message_carries_reason_and_text() {
    let msg = Message {
        user_id: 0,
        session_id: None,
        body: MessageBody::Error {
            reason: ErrorReason::SessionLimit,
            message: "too many sessions".into(),
        },
    };
    assert_eq!(roundtrip(&msg), msg);
}

#[test]
fn acknowledgement_round_trips() {
    let msg = Message {
        user_id: 0,
        session_id: Some(4),
        body: MessageBody::Acknowledgement(AckKind::SyncWait),
    };
    assert_eq!(roundtrip(&msg), msg);
}

#[test]
fn bulk_stroke_info_decodes_into_one_message_per_point() {
    let points = vec![
        StrokePoint { x: 10, y: 20, pressure: 255 },
        StrokePoint { x: 11, y: 21, pressure: 200 },
        StrokePoint { x: 12, y: 22, pressure: 150 },
    ];
    let bytes = encode_bulk_strokes(5, Some(1), &points).expect("encode bulk");
    let (messages, consumed) = match decode_next(&bytes).expect("decode") {
        DecodeOutcome::Complete(messages, consumed) => (messages, consumed),
        DecodeOutcome::NeedMore(_) => panic!("expected a complete frame"),
    };
    assert_eq!(consumed, bytes.len());
    assert_eq!(messages.len(), points.len());
    for (msg, point) in messages.iter().zip(&points) {
        assert_eq!(msg.user_id, 5);
        assert_eq!(msg.session_id, Some(1));
        match &msg.body {
            MessageBody::StrokeInfo(got) => assert_eq!(got, point),
            other => panic!("expected StrokeInfo, got {other:?}"),
        }
    }
}

#[test]
fn non_bulk_stroke_info_round_trips_as_a_single_sample() {
    let msg = Message {
        user_id: 5,
        session_id: Some(1),
        body: MessageBody::StrokeInfo(StrokePoint { x: 10, y: 20, pressure: 255 }),
    };
    assert_eq!(roundtrip(&msg), msg);
}

#[test]
fn decoder_reports_need_more_on_a_truncated_frame() {
    let msg = Message {
        user_id: 1,
        session_id: Some(1),
        body: MessageBody::Chat {
            text: "a longer chat line".into(),
        },
    };
    let bytes = encode_message(&msg).expect("encode");
    for cut in 1..bytes.len() {
        match decode_next(&bytes[..cut]) {
            Ok(DecodeOutcome::NeedMore(_)) => {}
            other => panic!("expected NeedMore at cut {cut}, got {other:?}"),
        }
    }
}

#[test]
fn decode_all_splits_two_back_to_back_frames() {
    let a = Message {
        user_id: 1,
        session_id: Some(1),
        body: MessageBody::StrokeEnd,
    };
    let b = Message {
        user_id: 2,
        session_id: Some(1),
        body: MessageBody::Chat { text: "hi".into() },
    };
    let mut bytes = encode_message(&a).expect("encode a");
    bytes.extend(encode_message(&b).expect("encode b"));
    let messages = decode_all(&bytes).expect("decode_all");
    assert_eq!(messages, vec![a, b]);
}

#[test]
fn unknown_message_kind_is_malformed_not_a_panic() {
    // Header byte 0 is the message kind; 0xfe is outside the catalogue.
    let bytes = [0xfeu8, 0x01, 0x00];
    assert!(decode_next(&bytes).is_err());
}
