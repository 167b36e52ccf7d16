// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-peer connection (C2): one TCP byte stream, framing, and the
//! byte-counted back-pressure queue that protects a session from one slow
//! subscriber.
//!
//! Grounded on the teacher's `ClientConnection`
//! (`src/client/client.rs`): owned read/write halves behind a `Mutex`, a
//! `CancellationToken` to tear the connection down, and a background read
//! task that feeds decoded units upstream. Where the teacher dispatches
//! completed PDUs into per-ITT `mpsc` channels, this connection dispatches
//! decoded [`Message`]s into the single Host mailbox (`HostEvent::Inbound`);
//! where the teacher bounds in-flight requests by ITT, this connection
//! bounds outbound bytes by [`B_HIGH`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{classify_io_error, EncodeError, IoFault};
use crate::host::HostEvent;
use crate::wire::{self, DecodeOutcome, Message};

/// Back-pressure threshold: once a connection's outstanding outbound bytes
/// exceed this, it is marked overflowing (spec.md §4.2).
pub const B_HIGH: usize = 64 * 1024;

/// Read buffer growth chunk.
const READ_CHUNK: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Opening,
    Live,
    Draining,
    Closed,
}

#[derive(Debug)]
pub struct Connection {
    pub user_id: u8,
    writer: Mutex<Option<OwnedWriteHalf>>,
    outbound_tx: mpsc::UnboundedSender<Vec<u8>>,
    queued_bytes: AtomicU64,
    overflowing: AtomicBool,
    state: Mutex<ConnState>,
    cancel: CancellationToken,
}

impl Connection {
    /// Splits the stream, spawns the read and write tasks, and returns the
    /// handle the host/session layer holds to enqueue outbound messages.
    pub fn spawn(
        stream: TcpStream,
        user_id: u8,
        host_tx: mpsc::UnboundedSender<HostEvent>,
    ) -> Arc<Self> {
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();

        let conn = Arc::new(Self {
            user_id,
            writer: Mutex::new(Some(write_half)),
            outbound_tx,
            queued_bytes: AtomicU64::new(0),
            overflowing: AtomicBool::new(false),
            state: Mutex::new(ConnState::Opening),
            cancel: CancellationToken::new(),
        });

        tokio::spawn(Self::read_loop(
            conn.clone(),
            read_half,
            host_tx.clone(),
        ));
        tokio::spawn(Self::write_loop(conn.clone(), outbound_rx, host_tx));

        conn
    }

    pub async fn state(&self) -> ConnState {
        *self.state.lock().await
    }

    pub async fn set_state(&self, new: ConnState) {
        *self.state.lock().await = new;
    }

    /// Encodes `msg` and appends it to the outbound queue, updating the
    /// overflow flag. The message is queued regardless of overflow — per
    /// spec.md §4.2 it is the *owning session's* job to evict an
    /// overflowing subscriber before the next fan-out, not the connection's
    /// job to drop traffic silently.
    pub fn enqueue(&self, msg: &Message) -> Result<(), EncodeError> {
        let bytes = wire::encode_message(msg)?;
        let new_total = self.queued_bytes.fetch_add(bytes.len() as u64, Ordering::SeqCst)
            + bytes.len() as u64;
        if new_total as usize > B_HIGH {
            self.overflowing.store(true, Ordering::SeqCst);
        }
        // A closed receiver means the write task already exited; enqueueing
        // into a dead connection is a no-op per `User::deliver`'s contract.
        let _ = self.outbound_tx.send(bytes);
        Ok(())
    }

    pub fn is_overflowing(&self) -> bool {
        self.overflowing.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    async fn read_loop(
        conn: Arc<Self>,
        mut reader: OwnedReadHalf,
        host_tx: mpsc::UnboundedSender<HostEvent>,
    ) {
        conn.set_state(ConnState::Live).await;
        let mut buf = BytesMut::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if conn.cancel.is_cancelled() || conn.state().await == ConnState::Closed {
                break;
            }

            let n = tokio::select! {
                _ = conn.cancel.cancelled() => break,
                res = reader.read(&mut chunk) => match res {
                    Ok(0) => {
                        debug!(user_id = conn.user_id, "peer closed connection");
                        break;
                    }
                    Ok(n) => n,
                    Err(e) => {
                        match classify_io_error(&e) {
                            IoFault::Transient => continue,
                            IoFault::PeerClosed | IoFault::Fatal => {
                                debug!(user_id = conn.user_id, error = %e, "read fault");
                                break;
                            }
                        }
                    }
                },
            };
            buf.extend_from_slice(&chunk[..n]);

            loop {
                match wire::decode_next(&buf) {
                    Ok(DecodeOutcome::Complete(messages, consumed)) => {
                        let _ = buf.split_to(consumed);
                        for message in messages {
                            if host_tx
                                .send(HostEvent::Inbound {
                                    user_id: conn.user_id,
                                    message,
                                })
                                .is_err()
                            {
                                // Host actor gone; nothing more to do.
                                conn.cancel();
                                return;
                            }
                        }
                    }
                    Ok(DecodeOutcome::NeedMore(_)) => break,
                    Err(e) => {
                        warn!(user_id = conn.user_id, error = %e, "malformed frame");
                        let _ = host_tx.send(HostEvent::Malformed {
                            user_id: conn.user_id,
                            reason: e.to_string(),
                        });
                        conn.cancel();
                        return;
                    }
                }
            }
        }

        let _ = host_tx.send(HostEvent::Disconnected {
            user_id: conn.user_id,
        });
        conn.set_state(ConnState::Closed).await;
    }

    async fn write_loop(
        conn: Arc<Self>,
        mut outbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
        host_tx: mpsc::UnboundedSender<HostEvent>,
    ) {
        while let Some(bytes) = tokio::select! {
            _ = conn.cancel.cancelled() => None,
            item = outbound_rx.recv() => item,
        } {
            let len = bytes.len() as u64;
            let mut guard = conn.writer.lock().await;
            let Some(w) = guard.as_mut() else { break };
            let result = w.write_all(&bytes).await;
            conn.queued_bytes.fetch_sub(len, Ordering::SeqCst);
            drop(guard);

            if let Err(e) = result {
                match classify_io_error(&e) {
                    IoFault::Transient => continue,
                    IoFault::PeerClosed | IoFault::Fatal => {
                        debug!(user_id = conn.user_id, error = %e, "write fault");
                        conn.cancel();
                        let _ = host_tx.send(HostEvent::Disconnected {
                            user_id: conn.user_id,
                        });
                        break;
                    }
                }
            }

            if conn.state().await == ConnState::Draining
                && conn.queued_bytes.load(Ordering::SeqCst) == 0
            {
                let mut guard = conn.writer.lock().await;
                if let Some(mut w) = guard.take() {
                    let _ = w.shutdown().await;
                }
                conn.set_state(ConnState::Closed).await;
                break;
            }
        }
    }
}
