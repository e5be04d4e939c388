// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Forwarding (C7): tenant IPv4 ingress on a leaf's compute port, and MTP
//! DATA ingress on any control port.

use mtp_net::{Opcode, Payload};
use tracing::{debug, trace};

use crate::action::Action;
use crate::port::{PortId, PortTable};
use crate::role::Role;
use crate::tables::{AcceptedTable, OfferedTable};

/// The third octet of an IPv4 address (`VID_octet = 3`), the byte a leaf uses
/// to derive and match VIDs. Preserved from the original deployment; on a
/// fabric with overlapping third octets across leaves, collisions are
/// undefined (§9).
const VID_OCTET_INDEX: usize = 2;

fn ipv4_octet(header: &[u8], field_offset: usize) -> u8 {
    header[field_offset + VID_OCTET_INDEX]
}

/// Tenant IPv4 ingress on a leaf's compute interface (§4.5). `ipv4_frame`
/// starts at the IPv4 header. Returns a single [`Action::SendControl`]
/// carrying a DATA message on the ECMP-selected offered port, or an empty
/// vector if no offered port is eligible for the destination VID.
#[must_use]
pub fn forward_tenant_ipv4(
    ports: &mut PortTable,
    offered: &OfferedTable,
    ipv4_frame: &[u8],
    now_ms: i64,
) -> Vec<Action> {
    // Source/destination address fields sit at bytes 12 and 16 of the IPv4 header.
    let src_vid_byte = ipv4_octet(ipv4_frame, 12);
    let dst_vid_byte = ipv4_octet(ipv4_frame, 16);

    let hash_key = [
        ipv4_frame[12 + VID_OCTET_INDEX],
        ipv4_frame[15],
        ipv4_frame[16 + VID_OCTET_INDEX],
        ipv4_frame[19],
    ];

    let eligible: Vec<PortId> = offered
        .eligible_offered_ports_for_root(u16::from(dst_vid_byte), ports)
        .cloned()
        .collect();
    let Some(index) = mtp_net::ecmp_index(&hash_key, eligible.len()) else {
        trace!(dst_vid = dst_vid_byte, "no eligible offered port, dropping tenant frame");
        return Vec::new();
    };
    let port = eligible[index].clone();

    ports.touch_sent(&port, now_ms);
    debug!(port = %port, src_vid = src_vid_byte, dst_vid = dst_vid_byte, "forwarding tenant frame upward");
    vec![Action::SendControl {
        port,
        message: mtp_net::MtpMessage {
            opcode: Opcode::Data,
            payload: Payload::Data {
                src_vid: u16::from(src_vid_byte),
                dst_vid: u16::from(dst_vid_byte),
                frame: ipv4_frame.to_vec(),
            },
        },
    }]
}

/// MTP DATA ingress (§4.5). `embedded_ipv4` is the IPv4 frame carried inside
/// the DATA payload. On a leaf, decapsulate onto the compute port. On a
/// spine, forward via the Accepted table when the destination is a direct
/// descendant, otherwise push up via hashed offered-port ECMP.
#[must_use]
pub fn forward_mtp_data(
    ports: &mut PortTable,
    offered: &OfferedTable,
    accepted: &AcceptedTable,
    role: &Role,
    src_vid: u16,
    dst_vid: u16,
    embedded_ipv4: &[u8],
    now_ms: i64,
) -> Vec<Action> {
    if role.is_leaf() {
        debug!(dst_vid, "decapsulating MTP data onto compute port");
        return vec![Action::EmitTenantIpv4 {
            frame: embedded_ipv4.to_vec(),
        }];
    }

    if let Some(port) = accepted.eligible_port_for_root(dst_vid, ports) {
        let port = port.clone();
        ports.touch_sent(&port, now_ms);
        debug!(port = %port, dst_vid, "forwarding MTP data to accepted descendant");
        return vec![Action::SendControl {
            port,
            message: mtp_net::MtpMessage {
                opcode: Opcode::Data,
                payload: Payload::Data {
                    src_vid,
                    dst_vid,
                    frame: embedded_ipv4.to_vec(),
                },
            },
        }];
    }

    if accepted.contains_root(dst_vid) {
        trace!(dst_vid, "destination accepted but port down or declared unreachable, dropping");
        return Vec::new();
    }

    let hash_key = [
        ipv4_octet(embedded_ipv4, 12),
        embedded_ipv4[15],
        ipv4_octet(embedded_ipv4, 16),
        embedded_ipv4[19],
    ];
    let eligible: Vec<PortId> = offered
        .eligible_offered_ports_for_root(dst_vid, ports)
        .cloned()
        .collect();
    let Some(index) = mtp_net::ecmp_index(&hash_key, eligible.len()) else {
        trace!(dst_vid, "destination not accepted and no eligible offered port, dropping");
        return Vec::new();
    };
    let port = eligible[index].clone();
    ports.touch_sent(&port, now_ms);
    debug!(port = %port, dst_vid, "pushing MTP data upward via ECMP");
    vec![Action::SendControl {
        port,
        message: mtp_net::MtpMessage {
            opcode: Opcode::Data,
            payload: Payload::Data {
                src_vid,
                dst_vid,
                frame: embedded_ipv4.to_vec(),
            },
        },
    }]
}
