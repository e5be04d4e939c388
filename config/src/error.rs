// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Type for configuration loading failures.

use std::path::PathBuf;

use thiserror::Error;

/// The reasons a switch configuration may fail to load.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The given configuration directory does not exist or is not a directory.
    #[error("{0:?} is not a valid directory")]
    InvalidDirectory(PathBuf),
    /// The `<node_name>.conf` file could not be read.
    #[error("failed to read {0:?}: {1}")]
    Unreadable(PathBuf, std::io::Error),
    /// A required key was absent from the configuration file.
    #[error("missing required key {0:?} in {1:?}")]
    MissingKey(&'static str, PathBuf),
    /// A key's value could not be parsed into the expected type.
    #[error("invalid value for key {0:?} in {1:?}: {2:?}")]
    InvalidValue(&'static str, PathBuf, String),
}
