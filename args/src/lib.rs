// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all)]

//! Command-line parsing for the MTP agent.
//!
//! The agent takes exactly two positional arguments: the node's own name
//! (used both for logging and to match interface-name prefixes) and the
//! directory holding its configuration file.

use std::path::PathBuf;

use clap::Parser;

/// Command-line arguments for the MTP agent binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "mtp-agent", about = "Meshed Tree Protocol switch agent")]
pub struct CmdArgs {
    /// This switch's node name, e.g. `leaf1`. Must match the prefix of its
    /// compute and control interface names.
    pub node_name: String,

    /// Directory containing `<node_name>.conf`.
    pub config_dir: PathBuf,
}

impl CmdArgs {
    /// Parse arguments from the process's `argv`.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The node name given on the command line.
    #[must_use]
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// The configuration directory given on the command line.
    #[must_use]
    pub fn config_dir(&self) -> &std::path::Path {
        &self.config_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_positional_args() {
        let args = CmdArgs::parse_from(["mtp-agent", "leaf1", "/etc/mtp"]);
        assert_eq!(args.node_name(), "leaf1");
        assert_eq!(args.config_dir(), std::path::Path::new("/etc/mtp"));
    }

    #[test]
    fn rejects_missing_argument() {
        let result = CmdArgs::try_parse_from(["mtp-agent", "leaf1"]);
        assert!(result.is_err());
    }
}
