// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::process::ExitCode;

use canvasd::cfg::cli::Cli;
use canvasd::cfg::logger::init_logger;
use canvasd::host::{Host, HostConfig};
use canvasd::server;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Exit codes per spec.md §6.4.
mod exit_code {
    pub const OK: u8 = 0;
    pub const BAD_ARGS: u8 = 2;
    pub const PORT_IN_USE: u8 = 3;
    pub const FATAL: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match init_logger() {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("failed to initialize logging: {err}");
            return ExitCode::from(exit_code::FATAL);
        }
    };

    if cli.max_users == 0 || cli.max_sessions == 0 {
        error!("--max-users and --max-sessions must be at least 1");
        return ExitCode::from(exit_code::BAD_ARGS);
    }

    let listener = match server::bind_listener(&cli).await {
        Ok(listener) => listener,
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
            error!(port = cli.port, "address already in use");
            return ExitCode::from(exit_code::PORT_IN_USE);
        }
        Err(err) => {
            error!(error = %err, "failed to bind listener");
            return ExitCode::from(exit_code::FATAL);
        }
    };
    info!(port = cli.port, "canvasd listening");

    let (host_tx, host_rx) = mpsc::unbounded_channel();
    let host = Host::new(HostConfig::from_cli(&cli));
    let host_task = tokio::spawn(host.run(host_rx));

    tokio::select! {
        result = server::run(listener, host_tx) => {
            if let Err(err) = result {
                error!(error = %err, "accept loop failed");
                return ExitCode::from(exit_code::FATAL);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down on ctrl-c");
        }
    }

    drop(host_task);
    ExitCode::from(exit_code::OK)
}
