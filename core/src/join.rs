// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The join protocol (C4): the five-message handshake that plumbs VIDs
//! between adjacent tiers and brings a control port up.

use mtp_net::{MtpMessage, Opcode, Payload, Vid};
use tracing::{debug, trace};

use crate::action::Action;
use crate::port::PortTable;
use crate::role::Role;
use crate::tables::{AcceptedTable, OfferedTable};

fn handshake(opcode: Opcode, tier: u8, vids: Vec<Vid>) -> MtpMessage {
    MtpMessage {
        opcode,
        payload: Payload::Handshake { tier, vids },
    }
}

/// Dispatch a decoded control message to its handler, mutating the relevant
/// tables and returning the outgoing actions it produces.
pub fn handle(
    ports: &mut PortTable,
    offered: &mut OfferedTable,
    accepted: &mut AcceptedTable,
    role: &Role,
    ingress: &crate::port::PortId,
    message: &MtpMessage,
) -> Vec<Action> {
    match &message.payload {
        Payload::Handshake { tier, vids } => match message.opcode {
            Opcode::HelloNr => handle_hello_nr(role, ingress, *tier, vids),
            Opcode::JoinReq => handle_join_req(ingress, vids),
            Opcode::JoinRes => handle_join_res(ports, accepted, role, ingress, vids),
            Opcode::JoinAck => handle_join_ack(ports, offered, ingress, vids),
            _ => Vec::new(),
        },
        Payload::KeepAlive if message.opcode == Opcode::StartHello => handle_start_hello(ports, ingress),
        _ => Vec::new(),
    }
}

/// HELLONR: drop if the sender is not strictly lower-tier than us; else reply
/// with a JOIN_REQ on the same (ingress) port carrying the advertised VIDs.
fn handle_hello_nr(role: &Role, ingress: &crate::port::PortId, sender_tier: u8, vids: &[Vid]) -> Vec<Action> {
    if sender_tier >= role.tier {
        trace!(port = %ingress, sender_tier, local_tier = role.tier, "dropping HelloNr from non-lower tier");
        return Vec::new();
    }
    debug!(port = %ingress, "received HelloNr, replying with JoinReq");
    vec![Action::SendControl {
        port: ingress.clone(),
        message: handshake(Opcode::JoinReq, role.tier, vids.to_vec()),
    }]
}

/// JOIN_REQ: extend every VID with our own egress (ingress, from our side)
/// port number, then reply with JOIN_RES on the same port.
fn handle_join_req(ingress: &crate::port::PortId, vids: &[Vid]) -> Vec<Action> {
    let extended: Vec<Vid> = vids
        .iter()
        .map(|v| v.extend(ingress.port_number() as u16))
        .collect();
    debug!(port = %ingress, "received JoinReq, replying with JoinRes");
    vec![Action::SendControl {
        port: ingress.clone(),
        message: handshake(Opcode::JoinRes, 0, extended),
    }]
}

/// JOIN_RES: record the extended VIDs as accepted through the ingress port.
/// If not the top spine, re-broadcast HELLONR on every control port to keep
/// climbing the tree. Finally acknowledge with JOIN_ACK.
fn handle_join_res(
    ports: &mut PortTable,
    accepted: &mut AcceptedTable,
    role: &Role,
    ingress: &crate::port::PortId,
    vids: &[Vid],
) -> Vec<Action> {
    for vid in vids {
        accepted.add(ingress.clone(), vid.clone());
    }
    debug!(port = %ingress, vids = ?vids, "received JoinRes, recorded accepted VIDs");

    let mut actions = Vec::new();
    if !role.is_top_spine {
        for port in ports.names() {
            actions.push(Action::SendControl {
                port: port.clone(),
                message: handshake(Opcode::HelloNr, role.tier, vids.to_vec()),
            });
        }
    }
    actions.push(Action::SendControl {
        port: ingress.clone(),
        message: handshake(Opcode::JoinAck, role.tier, vids.to_vec()),
    });
    actions
}

/// JOIN_ACK: record the VIDs as offered through the ingress port, bring the
/// port up and mark it started, then send START_HELLO to complete the
/// handshake.
fn handle_join_ack(
    ports: &mut PortTable,
    offered: &mut OfferedTable,
    ingress: &crate::port::PortId,
    vids: &[Vid],
) -> Vec<Action> {
    for vid in vids {
        offered.add(ingress.clone(), vid.clone());
    }
    ports.set_up(ingress, true);
    ports.mark_started(ingress);
    debug!(port = %ingress, vids = ?vids, "received JoinAck, port up");
    vec![Action::SendControl {
        port: ingress.clone(),
        message: MtpMessage {
            opcode: Opcode::StartHello,
            payload: Payload::KeepAlive,
        },
    }]
}

/// START_HELLO: bring the (accepted-side) ingress port up and mark it started.
fn handle_start_hello(ports: &mut PortTable, ingress: &crate::port::PortId) -> Vec<Action> {
    ports.set_up(ingress, true);
    ports.mark_started(ingress);
    debug!(port = %ingress, "received StartHello, port up");
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PortId;

    fn mac(b: u8) -> mtp_net::Mac {
        mtp_net::Mac([b, b, b, b, b, b])
    }

    #[test]
    fn hello_nr_from_higher_tier_is_dropped() {
        let role = Role {
            tier: 2,
            is_top_spine: false,
        };
        let port = PortId::parse("spine1-eth0").unwrap();
        let actions = handle_hello_nr(&role, &port, 3, &[Vid::try_from("7").unwrap()]);
        assert!(actions.is_empty());
    }

    #[test]
    fn hello_nr_from_lower_tier_triggers_join_req() {
        let role = Role {
            tier: 2,
            is_top_spine: false,
        };
        let port = PortId::parse("spine1-eth0").unwrap();
        let actions = handle_hello_nr(&role, &port, 1, &[Vid::try_from("7").unwrap()]);
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            Action::SendControl { port: p, message } => {
                assert_eq!(p, &port);
                assert_eq!(message.opcode, Opcode::JoinReq);
            }
            Action::EmitTenantIpv4 { .. } => panic!("unexpected action"),
        }
    }

    #[test]
    fn join_req_extends_vid_with_port_number() {
        let port = PortId::parse("leaf1-eth3").unwrap();
        let actions = handle_join_req(&port, &[Vid::try_from("7").unwrap()]);
        let Action::SendControl { message, .. } = &actions[0] else {
            panic!("expected SendControl")
        };
        let Payload::Handshake { vids, .. } = &message.payload else {
            panic!("expected Handshake")
        };
        assert_eq!(vids[0].to_string(), "7.3");
    }

    #[test]
    fn join_res_records_accepted_and_sends_join_ack() {
        let mut ports = PortTable::new();
        let mut accepted = AcceptedTable::new();
        let ingress = PortId::parse("spine1-eth0").unwrap();
        ports.add(ingress.clone(), mac(1));
        let role = Role {
            tier: 2,
            is_top_spine: true,
        };
        let actions = handle_join_res(
            &mut ports,
            &mut accepted,
            &role,
            &ingress,
            &[Vid::try_from("7.0").unwrap()],
        );
        assert_eq!(accepted.vids_of(&ingress).count(), 1);
        // top spine: only the final JoinAck, no re-broadcast HelloNr
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0], Action::SendControl {
            port: ingress.clone(),
            message: handshake(Opcode::JoinAck, 2, vec![Vid::try_from("7.0").unwrap()]),
        });
    }

    #[test]
    fn join_ack_brings_port_up_and_sends_start_hello() {
        let mut ports = PortTable::new();
        let mut offered = OfferedTable::new();
        let ingress = PortId::parse("leaf1-eth0").unwrap();
        ports.add(ingress.clone(), mac(1));
        let actions = handle_join_ack(&mut ports, &mut offered, &ingress, &[Vid::try_from("7.0").unwrap()]);
        assert!(ports.lookup(&ingress).unwrap().is_up());
        assert!(ports.lookup(&ingress).unwrap().started());
        assert_eq!(offered.vids_of(&ingress).count(), 1);
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn handle_dispatches_start_hello_by_opcode_not_payload_shape() {
        let mut ports = PortTable::new();
        let mut offered = OfferedTable::new();
        let mut accepted = AcceptedTable::new();
        let ingress = PortId::parse("spine1-eth0").unwrap();
        ports.add(ingress.clone(), mac(1));
        let role = Role {
            tier: 2,
            is_top_spine: false,
        };
        let message = MtpMessage {
            opcode: Opcode::StartHello,
            payload: Payload::KeepAlive,
        };
        let actions = handle(&mut ports, &mut offered, &mut accepted, &role, &ingress, &message);
        assert!(actions.is_empty());
        assert!(ports.lookup(&ingress).unwrap().is_up());
        assert!(ports.lookup(&ingress).unwrap().started());
    }
}
