// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

#![allow(clippy::all)]

mod integration_tests {
    pub mod common;

    pub mod bad_password;
    pub mod bulk_stroke;
    pub mod late_joiner_sync;
    pub mod two_client_relay;
}
