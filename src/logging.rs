// Copyright 2026 influx-relay contributors
// SPDX-License-Identifier: Apache-2.0

//! Logging setup. The core consumes a logger capability only;
//! file rotation and remote log transport are out of scope and left to
//! the deployment environment.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogLevel;

/// Installs a `tracing-subscriber` global default: an `EnvFilter` seeded
/// from `level` (overridable via `RUST_LOG`) and an ANSI-capable stderr
/// formatter.
pub fn init(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_tracing_filter()));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
