// Copyright 2026 influx-relay contributors
// SPDX-License-Identifier: Apache-2.0

//! Discovers configuration files once at startup and spawns one
//! isolated worker process per file so a crash in one job cannot
//! affect the others.

use std::{env, path::PathBuf};

use tokio::process::Command;
use tracing::{error, info, warn};

use crate::{config, error::Result};

fn config_dir() -> PathBuf {
    env::var("CONFIG_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("/config"))
}

/// Non-template `.yaml`/`.yml` files directly under `dir`, sorted for a
/// deterministic spawn order.
pub fn discover_configs(dir: &std::path::Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e == "yaml" || e == "yml")
            .unwrap_or(false);
        if is_yaml && !config::is_template(&path) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Spawns one child per discovered config (the binary re-execs itself
/// with `--config <path>`), waits for all, and returns the aggregate
/// exit code: `0` if every worker exited `0` or `2`
/// (partial), non-zero if any worker crashed or exited abnormally.
pub async fn run() -> Result<i32> {
    let dir = config_dir();
    let configs = discover_configs(&dir)?;

    if configs.is_empty() {
        warn!(dir = %dir.display(), "no configuration files found");
        return Ok(0);
    }

    let exe = env::current_exe()?;
    let mut children = Vec::with_capacity(configs.len());
    for path in &configs {
        info!(config = %path.display(), "spawning worker");
        let child = Command::new(&exe).arg("--config").arg(path).spawn()?;
        children.push((path.clone(), child));
    }

    let mut worst = 0i32;
    for (path, mut child) in children {
        match child.wait().await {
            Ok(status) => {
                let code = status.code().unwrap_or(-1);
                match code {
                    0 | 2 => {}
                    _ => {
                        error!(config = %path.display(), exit_code = code, "worker exited abnormally");
                        worst = worst.max(1);
                    }
                }
                if code == 2 {
                    warn!(config = %path.display(), "worker finished with partial failures");
                }
            }
            Err(e) => {
                error!(config = %path.display(), error = %e, "failed to wait for worker");
                worst = worst.max(1);
            }
        }
    }

    Ok(worst)
}
