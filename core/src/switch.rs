// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The top-level per-switch state machine: owns C1-C3's tables and this
//! switch's [`Role`], and dispatches received messages and ticks to C4-C7.

use mtp_net::{Mac, MtpMessage, Opcode, Payload, Vid};
use tracing::{info, trace};

use crate::action::Action;
use crate::flood;
use crate::forward;
use crate::join;
use crate::liveness;
use crate::port::{PortId, PortTable};
use crate::role::Role;
use crate::tables::{AcceptedTable, OfferedTable};

/// A switch's full MTP state: the port, offered, and accepted tables, its
/// static role, and -- once derived -- its own root VID (I5).
pub struct Switch {
    role: Role,
    ports: PortTable,
    offered: OfferedTable,
    accepted: AcceptedTable,
    root_vid: Option<Vid>,
}

impl Switch {
    /// Build a new switch with no ports yet registered and no VID derived.
    #[must_use]
    pub fn new(role: Role) -> Self {
        Switch {
            role,
            ports: PortTable::new(),
            offered: OfferedTable::new(),
            accepted: AcceptedTable::new(),
            root_vid: None,
        }
    }

    /// This switch's static role.
    #[must_use]
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// The derived root VID, if this is a leaf that has completed I5.
    #[must_use]
    pub fn root_vid(&self) -> Option<&Vid> {
        self.root_vid.as_ref()
    }

    /// I5: a leaf derives its own root VID exactly once, from the third octet
    /// of its compute interface's IPv4 address, before emitting its first
    /// HELLONR. A no-op if already derived or if this switch is not a leaf.
    pub fn derive_root_vid(&mut self, compute_ipv4: std::net::Ipv4Addr) {
        if !self.role.is_leaf() || self.root_vid.is_some() {
            return;
        }
        let vid = Vid::root(u16::from(compute_ipv4.octets()[2]));
        info!(%vid, "derived root VID");
        self.root_vid = Some(vid);
    }

    /// Register a newly discovered control port.
    pub fn add_port(&mut self, name: PortId, mac: Mac) {
        self.ports.add(name, mac);
    }

    /// Read access to the port table, e.g. for diagnostics or the liveness probe.
    #[must_use]
    pub fn ports(&self) -> &PortTable {
        &self.ports
    }

    /// A leaf's initial HELLONR burst, sent on every control port once its
    /// root VID has been derived (§2: "the leaf node informs tier-2 spines it
    /// is ready to communicate").
    #[must_use]
    pub fn initial_hello_burst(&self) -> Vec<Action> {
        let Some(vid) = &self.root_vid else {
            return Vec::new();
        };
        self.ports
            .names()
            .map(|port| Action::SendControl {
                port: port.clone(),
                message: MtpMessage {
                    opcode: Opcode::HelloNr,
                    payload: Payload::Handshake {
                        tier: self.role.tier,
                        vids: vec![vid.clone()],
                    },
                },
            })
            .collect()
    }

    /// Dispatch a decoded control-plane message received on `ingress`.
    pub fn dispatch(&mut self, now_ms: i64, ingress: &PortId, message: &MtpMessage) -> Vec<Action> {
        self.ports.touch_received(ingress, now_ms);
        match &message.payload {
            Payload::Handshake { .. } => join::handle(
                &mut self.ports,
                &mut self.offered,
                &mut self.accepted,
                &self.role,
                ingress,
                message,
            ),
            Payload::KeepAlive if message.opcode == Opcode::StartHello => join::handle(
                &mut self.ports,
                &mut self.offered,
                &mut self.accepted,
                &self.role,
                ingress,
                message,
            ),
            Payload::KeepAlive => liveness::on_keep_alive(
                &mut self.ports,
                &self.offered,
                &self.accepted,
                &self.role,
                ingress,
                now_ms,
            ),
            Payload::Update { option, vids } => match message.opcode {
                Opcode::FailureUpdate => flood::on_failure_update(
                    &self.ports,
                    &mut self.offered,
                    &mut self.accepted,
                    &self.role,
                    ingress,
                    vids,
                    *option,
                ),
                Opcode::RecoverUpdate => flood::on_recover_update(
                    &self.ports,
                    &mut self.offered,
                    &mut self.accepted,
                    &self.role,
                    ingress,
                    vids,
                    *option,
                ),
                _ => {
                    trace!(opcode = ?message.opcode, "unexpected opcode for Update payload");
                    Vec::new()
                }
            },
            Payload::Data { src_vid, dst_vid, frame } => forward::forward_mtp_data(
                &mut self.ports,
                &self.offered,
                &self.accepted,
                &self.role,
                *src_vid,
                *dst_vid,
                frame,
                now_ms,
            ),
        }
    }

    /// Accept a tenant IPv4 frame arriving on the (leaf-only) compute port.
    #[must_use]
    pub fn forward_tenant_ipv4(&mut self, now_ms: i64, ipv4_frame: &[u8]) -> Vec<Action> {
        forward::forward_tenant_ipv4(&mut self.ports, &self.offered, ipv4_frame, now_ms)
    }

    /// Run one tick of C5's liveness machinery: emit keep-alives on the
    /// HELLO_TIMER cadence, expire the dead timer, and reconcile against the
    /// OS's view of which control interfaces currently have link-up.
    pub fn tick<'a>(
        &mut self,
        now_ms: i64,
        hello_timer_ms: i64,
        dead_timer_ms: i64,
        live_interfaces: impl Iterator<Item = &'a str>,
    ) -> Vec<Action> {
        let mut actions = liveness::send_keep_alives(&mut self.ports, now_ms, hello_timer_ms);
        actions.extend(liveness::sweep_dead_timer(
            &mut self.ports,
            &self.offered,
            &self.accepted,
            &self.role,
            now_ms,
            dead_timer_ms,
        ));
        actions.extend(liveness::sweep_link_state(
            &mut self.ports,
            &self.offered,
            &self.accepted,
            &self.role,
            live_interfaces,
        ));
        actions
    }
}
