// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-switch configuration: the small set of facts read once at startup
//! that decide a switch's role in the fabric.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;

/// Default HELLO_TIMER (§4.4): interval between keep-alives on a started port.
pub const DEFAULT_HELLO_TIMER_MS: i64 = 500;
/// Default DEAD_TIMER (§4.4): must be >= 3x the hello timer.
pub const DEFAULT_DEAD_TIMER_MS: i64 = 1500;

/// A switch's static, file-derived configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchConfig {
    /// The fabric tier this switch occupies. Tier 1 is a leaf.
    pub tier: u8,
    /// Whether this switch is the top (root) spine of the fabric.
    pub is_top_spine: bool,
    /// Interval (ms) between keep-alives on a started port.
    pub hello_timer_ms: i64,
    /// Interval (ms) of missed keep-alives before a port is marked `MissFail`.
    pub dead_timer_ms: i64,
}

impl SwitchConfig {
    /// True iff this switch is a leaf (tier 1), directly attached to compute hosts.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.tier == 1
    }

    /// Validate `dir` is a directory, then read and parse `<node_name>.conf` from it.
    pub fn load(dir: &Path, node_name: &str) -> Result<Self, ConfigError> {
        if !dir.is_dir() {
            return Err(ConfigError::InvalidDirectory(dir.to_path_buf()));
        }
        let path = file_path(dir, node_name);
        let contents =
            fs::read_to_string(&path).map_err(|e| ConfigError::Unreadable(path.clone(), e))?;
        Self::parse(&contents, &path)
    }

    fn parse(contents: &str, path: &PathBuf) -> Result<Self, ConfigError> {
        let mut tier: Option<u8> = None;
        let mut is_top_spine = false;
        let mut hello_timer_ms = DEFAULT_HELLO_TIMER_MS;
        let mut dead_timer_ms = DEFAULT_DEAD_TIMER_MS;

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            match key {
                "tier" => {
                    tier = Some(value.parse::<u8>().map_err(|_| {
                        ConfigError::InvalidValue("tier", path.clone(), value.to_string())
                    })?);
                }
                "isTopSpine" => {
                    is_top_spine = value.eq_ignore_ascii_case("true");
                }
                "helloTimerMs" => {
                    hello_timer_ms = value.parse::<i64>().map_err(|_| {
                        ConfigError::InvalidValue("helloTimerMs", path.clone(), value.to_string())
                    })?;
                }
                "deadTimerMs" => {
                    dead_timer_ms = value.parse::<i64>().map_err(|_| {
                        ConfigError::InvalidValue("deadTimerMs", path.clone(), value.to_string())
                    })?;
                }
                other => {
                    debug!(key = other, "ignoring unrecognized configuration key");
                }
            }
        }

        let tier = tier.ok_or_else(|| ConfigError::MissingKey("tier", path.clone()))?;
        if dead_timer_ms < 3 * hello_timer_ms {
            return Err(ConfigError::InvalidValue(
                "deadTimerMs",
                path.clone(),
                format!("{dead_timer_ms} must be >= 3x helloTimerMs ({hello_timer_ms})"),
            ));
        }
        Ok(SwitchConfig {
            tier,
            is_top_spine,
            hello_timer_ms,
            dead_timer_ms,
        })
    }
}

/// Build the path to a node's configuration file: `<dir>/<node_name>.conf`.
#[must_use]
pub fn file_path(dir: &Path, node_name: &str) -> PathBuf {
    dir.join(format!("{node_name}.conf"))
}
