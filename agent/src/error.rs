// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Startup failure taxonomy (§7): fatal conditions diagnosed before the
//! event loop can run.

use thiserror::Error;

/// Fatal startup failures for the MTP agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The switch's configuration file could not be loaded.
    #[error(transparent)]
    Config(#[from] mtp_config::ConfigError),
    /// No control interfaces were discovered for this node.
    #[error("no control interfaces discovered for node {0:?}")]
    NoControlInterfaces(String),
    /// A raw packet socket could not be opened or bound.
    #[error("raw socket error: {0}")]
    Socket(#[source] std::io::Error),
    /// The mio poller could not be created, or an interface could not be registered with it.
    #[error("poll error: {0}")]
    Poll(#[source] std::io::Error),
}
