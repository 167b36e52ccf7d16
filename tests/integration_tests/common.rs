// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::net::SocketAddr;

use bytes::BytesMut;
use canvasd::connection::Connection;
use canvasd::host::{Host, HostConfig, HostEvent, PROTOCOL_REVISION};
use canvasd::wire::{self, DecodeOutcome, Message, MessageBody};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

pub fn default_config() -> HostConfig {
    HostConfig {
        password_hash: None,
        title: "test-canvasd".into(),
        max_users: 254,
        max_sessions: 255,
        require_password: false,
    }
}

/// Boots a real `Host` actor behind a loopback listener, returning the
/// address test clients should dial. Mirrors `server::run` but keeps its
/// own tiny accept loop so tests don't depend on CLI parsing.
pub async fn spawn_server(config: HostConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local_addr");

    let (host_tx, host_rx) = mpsc::unbounded_channel();
    let host = Host::new(config);
    tokio::spawn(host.run(host_rx));
    tokio::spawn(accept_loop(listener, host_tx));
    addr
}

async fn accept_loop(listener: TcpListener, host_tx: mpsc::UnboundedSender<HostEvent>) {
    let mut next_id = 1u8;
    loop {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let user_id = next_id;
        next_id += 1;
        let conn = Connection::spawn(stream, user_id, host_tx.clone());
        if host_tx
            .send(HostEvent::NewConnection { user_id, conn })
            .is_err()
        {
            return;
        }
    }
}

/// A bare client speaking the wire protocol directly, for exercising the
/// server end to end without pulling in a real drawing client.
pub struct TestClient {
    stream: TcpStream,
    buf: BytesMut,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        stream.set_nodelay(true).ok();
        Self {
            stream,
            buf: BytesMut::new(),
        }
    }

    pub async fn send(&mut self, msg: &Message) {
        let bytes = wire::encode_message(msg).expect("encode");
        self.stream.write_all(&bytes).await.expect("write");
    }

    /// Writes a pre-encoded frame directly, for wire shapes `Message`/
    /// `encode_message` can't express on their own (e.g. a bulk group).
    pub async fn send_bytes(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("write");
    }

    /// Reads and decodes the next complete message, blocking on more socket
    /// reads as needed.
    pub async fn recv(&mut self) -> Message {
        loop {
            match wire::decode_next(&self.buf).expect("decode") {
                DecodeOutcome::Complete(mut messages, consumed) => {
                    let _ = self.buf.split_to(consumed);
                    return messages.remove(0);
                }
                DecodeOutcome::NeedMore(_) => {
                    let mut chunk = [0u8; 4096];
                    let n = self.stream.read(&mut chunk).await.expect("read");
                    assert!(n > 0, "peer closed while a message was expected");
                    self.buf.extend_from_slice(&chunk[..n]);
                }
            }
        }
    }

    /// Completes the login handshake (Identifier + Password) and waits for
    /// `HostInfo`. Works whether or not the server requires a password,
    /// since the server only checks it when one is configured.
    pub async fn handshake(&mut self, password: Option<&str>) {
        self.send(&Message {
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
        let host_info = self.recv().await;
        assert!(matches!(host_info.body, MessageBody::HostInfo { .. }));
        self.send(&Message {
            user_id: 0,
            session_id: None,
            body: MessageBody::Password {
                password: password.unwrap_or("").into(),
            },
        })
        .await;
    }
}
