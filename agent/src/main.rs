// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all)]

mod drivers;
mod error;
mod iface;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mtp_args::CmdArgs;
use mtp_config::SwitchConfig;
use mtp_core::Role;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Set up file-backed structured logging at `<config_dir>/<node_name>.log` (§6).
fn init_logging(config_dir: &Path, node_name: &str) {
    let log_path = config_dir.join(format!("{node_name}.log"));
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .unwrap_or_else(|e| panic!("failed to open log file {log_path:?}: {e}"));

    tracing_subscriber::fmt()
        .with_writer(file)
        .with_target(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

/// Write the single persisted artifact of a clean shutdown (§6): the
/// shutdown timestamp in milliseconds since the epoch, into the process's
/// current working directory.
fn write_node_down_log() {
    let ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let path = Path::new("node_down.log");
    if let Err(e) = std::fs::write(path, format!("{ms}\n")) {
        error!("failed to write {path:?}: {e}");
    }
}

fn main() {
    let args = CmdArgs::parse_args();
    init_logging(args.config_dir(), args.node_name());
    info!(node = args.node_name(), "starting mtp-agent");

    let config = match SwitchConfig::load(args.config_dir(), args.node_name()) {
        Ok(config) => config,
        Err(e) => {
            error!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    let role = Role {
        tier: config.tier,
        is_top_spine: config.is_top_spine,
    };
    let topology = iface::discover(args.node_name(), config.is_leaf());
    if topology.control.is_empty() {
        error!(node = args.node_name(), "no control interfaces discovered");
        std::process::exit(1);
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst)) {
        error!("failed to install signal handler: {e}");
        std::process::exit(1);
    }

    let result = drivers::kernel::run(
        role,
        args.node_name(),
        topology,
        config.hello_timer_ms,
        config.dead_timer_ms,
        &shutdown,
    );

    write_node_down_log();

    match result {
        Ok(()) => {
            info!("shutdown complete");
            std::process::exit(0);
        }
        Err(e) => {
            error!("agent failed: {e}");
            std::process::exit(1);
        }
    }
}
