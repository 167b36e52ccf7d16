// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The accept loop (C6): binds the listening socket(s) and spawns one
//! [`Connection`] per inbound peer, handing its id to the Host actor.
//!
//! Grounded on the teacher's `ClientConnection::connect` for the
//! socket-setup shape, inverted from dialing out to accepting in.

use std::io;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cfg::cli::Cli;
use crate::connection::Connection;
use crate::host::HostEvent;

/// Binds the dual-stack listener per the REDESIGN FLAGS decision. An IPv6
/// wildcard bind accepts IPv4-mapped peers too on platforms where
/// `IPV6_V6ONLY` defaults off (Linux); when the IPv6 bind itself fails
/// (IPv6 disabled, jailed network namespace, ...) this falls back to a
/// plain IPv4 wildcard bind rather than treating it as fatal.
pub async fn bind_listener(cli: &Cli) -> io::Result<TcpListener> {
    match TcpListener::bind(cli.bind_addr_v6()).await {
        Ok(listener) => Ok(listener),
        Err(err) => {
            warn!(error = %err, "dual-stack IPv6 bind failed, falling back to IPv4-only");
            TcpListener::bind(cli.bind_addr_v4()).await
        }
    }
}

/// Smallest id in `1..=255` not already held by a live connection.
fn next_user_id(taken: &std::collections::BTreeSet<u8>) -> Option<u8> {
    (1..=255u8).find(|id| !taken.contains(id))
}

/// Runs the accept loop until the listener errors out. Each accepted
/// socket becomes one [`Connection`] fed by its own read/write tasks,
/// reporting into the Host's mailbox.
pub async fn run(listener: TcpListener, host_tx: mpsc::UnboundedSender<HostEvent>) -> io::Result<()> {
    let mut live_ids: std::collections::BTreeSet<u8> = std::collections::BTreeSet::new();
    loop {
        let (stream, peer) = listener.accept().await?;
        let Some(user_id) = next_user_id(&live_ids) else {
            warn!(%peer, "connection limit reached, dropping new connection");
            drop(stream);
            continue;
        };
        live_ids.insert(user_id);
        info!(%peer, user_id, "accepted connection");

        let conn = Connection::spawn(stream, user_id, host_tx.clone());
        if host_tx
            .send(HostEvent::NewConnection { user_id, conn })
            .is_err()
        {
            return Ok(()); // host actor gone, shut the accept loop down
        }
    }
}
