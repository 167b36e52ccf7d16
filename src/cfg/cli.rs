// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Command-line surface. Replaces the teacher's YAML `Config` file with a
//! flat `clap::Parser` struct — this server has no negotiated protocol
//! parameters to externalize, only the handful of knobs an operator sets at
//! startup.

use std::net::SocketAddr;

use clap::Parser;

/// Default TCP port the server listens on when `--port` is omitted.
pub const DEFAULT_PORT: u16 = 27750;

/// Default maximum number of concurrently connected users.
pub const DEFAULT_MAX_USERS: u8 = 254;

/// Default maximum number of concurrently open sessions.
pub const DEFAULT_MAX_SESSIONS: u8 = 255;

#[derive(Parser, Debug, Clone)]
#[command(name = "canvasd", version, about = "Collaborative drawing session server")]
pub struct Cli {
    /// TCP port to listen on. Binds both IPv4 and IPv6 wildcard addresses.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Server-wide password required to connect at all. Omit to allow
    /// anonymous connections.
    #[arg(long)]
    pub password: Option<String>,

    /// Title advertised in `HostInfo`.
    #[arg(long, default_value = "canvasd")]
    pub title: String,

    /// Maximum number of concurrently connected users.
    #[arg(long, default_value_t = DEFAULT_MAX_USERS)]
    pub max_users: u8,

    /// Maximum number of concurrently open sessions.
    #[arg(long, default_value_t = DEFAULT_MAX_SESSIONS)]
    pub max_sessions: u8,

    /// Reject `Subscribe` requests to sessions that were created without a
    /// password.
    #[arg(long)]
    pub require_password: bool,
}

impl Cli {
    /// The wildcard address this server binds, covering both address
    /// families. See the REDESIGN FLAGS decision on dual-stack binding.
    pub fn bind_addr_v6(&self) -> SocketAddr {
        SocketAddr::new(std::net::Ipv6Addr::UNSPECIFIED.into(), self.port)
    }

    pub fn bind_addr_v4(&self) -> SocketAddr {
        SocketAddr::new(std::net::Ipv4Addr::UNSPECIFIED.into(), self.port)
    }
}
