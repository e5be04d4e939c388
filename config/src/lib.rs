// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all)]

//! Startup configuration loading for the MTP agent.
//!
//! A node's configuration is a small `key:value` text file named
//! `<node_name>.conf` inside a directory given on the command line. It
//! records only the facts that can't be derived from the live topology:
//! the switch's fabric tier and whether it is the fabric's top spine.

pub mod error;
pub mod switch;

pub use error::ConfigError;
pub use switch::SwitchConfig;
