// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Logger initialization.
//!
//! The teacher crate layered a hand-written JSON formatter and a
//! `fastrace`/`fastrace-tracing` span collector on top of
//! `tracing-subscriber`. This server has no distributed tracing backend to
//! feed and no requirement for structured JSON log shipping, so it keeps
//! `tracing` + `tracing-subscriber` + `tracing-appender` (the same base the
//! teacher builds on) but drops the JSON layer down to the stock
//! `fmt` layer with an `EnvFilter`.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber. The returned guard must be
/// held for the lifetime of the process; dropping it flushes the
/// non-blocking writer and stops it from accepting further writes.
pub fn init_logger() -> Result<WorkerGuard> {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to build tracing env-filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(guard)
}
