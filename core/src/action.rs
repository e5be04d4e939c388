// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Effects the core asks its caller to carry out. The core never touches a
//! socket directly; every externally visible effect of processing a message
//! or a tick is represented as an [`Action`] returned to the shell.

use mtp_net::MtpMessage;

use crate::port::PortId;

/// An effect to carry out after a dispatch or tick call returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Emit a control message on the named port's header template.
    SendControl {
        /// Egress port.
        port: PortId,
        /// The message to encode and send.
        message: MtpMessage,
    },
    /// Emit tenant IPv4 payload on the compute port (leaf only), after
    /// stripping the Ethernet II and MTP headers off a received DATA frame.
    EmitTenantIpv4 {
        /// The raw IPv4 frame, starting at its IPv4 header.
        frame: Vec<u8>,
    },
}
