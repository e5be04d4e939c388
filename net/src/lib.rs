// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

//! Wire types for the Meshed Tree Protocol (MTP) control and data plane.
//!
//! This crate owns the on-the-wire representations that the agent crate
//! reads off and writes to raw Ethernet sockets: the [`eth`] header, the
//! [`Vid`] path identifier, and the [`opcode`] message framing. It does not
//! own any protocol state -- see `mtp-core` for the state machine.

pub mod eth;
pub mod hash;
pub mod opcode;
pub mod vid;

pub use eth::mac::{DestinationMac, Mac, SourceMac};
pub use eth::{Eth, EthError, MtpEtherType};
pub use hash::{ecmp_index, jenkins_one_at_a_time};
pub use opcode::{FailureOption, MAX_VIDS_PER_MSG, MtpMessage, Opcode, Payload, WireError};
pub use vid::{VID_LEN, Vid, VidParseError};
