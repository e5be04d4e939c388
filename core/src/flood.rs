// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The flood engine (C6): propagates FAILURE_UPDATE / RECOVER_UPDATE
//! messages so that Reachable/Unreachable sets stay consistent fabric-wide.

use mtp_net::{FailureOption, MtpMessage, Opcode, Payload, Vid};
use ordermap::OrderSet;
use tracing::debug;

use crate::action::Action;
use crate::port::PortId;
use crate::port::PortTable;
use crate::role::Role;
use crate::tables::{AcceptedTable, OfferedTable};

fn update(opcode: Opcode, option: FailureOption, vids: Vec<Vid>) -> MtpMessage {
    MtpMessage {
        opcode,
        payload: Payload::Update { option, vids },
    }
}

fn send_on(port: &PortId, opcode: Opcode, option: FailureOption, vids: &OrderSet<Vid>) -> Action {
    Action::SendControl {
        port: port.clone(),
        message: update(opcode, option, vids.iter().cloned().collect()),
    }
}

fn every_offered_port_down(offered: &OfferedTable, ports: &PortTable) -> bool {
    offered.ports().all(|p| !ports.is_up(p))
}

/// Shared case analysis for a local up/down transition on port `changed`,
/// used by both [`local_failure`] and [`local_recovery`]. `opcode` selects
/// which message type is emitted; the targeting logic is identical.
fn local_transition(
    ports: &PortTable,
    offered: &OfferedTable,
    accepted: &AcceptedTable,
    role: &Role,
    changed: &PortId,
    opcode: Opcode,
) -> Vec<Action> {
    if accepted.ports().any(|p| p == changed) {
        let vids: OrderSet<Vid> = accepted.vids_of(changed).cloned().collect();
        return ports
            .names()
            .filter(|p| *p != changed && ports.is_up(p))
            .map(|p| send_on(p, opcode, FailureOption::Unreachable, &vids))
            .collect();
    }

    // `changed` is an offered (upstream) port.
    if !role.is_top_spine && every_offered_port_down(offered, ports) {
        let vids = accepted.all_vids();
        return accepted
            .ports()
            .filter(|p| ports.is_up(p))
            .map(|p| send_on(p, opcode, FailureOption::Reachable, &vids))
            .collect();
    }

    if offered.is_any_dirty() {
        let vids = offered.collect_unreachable_union();
        if vids.is_empty() {
            // dirty purely from a Reachable-narrowing entry; nothing unreachable to report
            return Vec::new();
        }
        return offered
            .ports()
            .filter(|p| ports.is_up(p))
            .map(|p| send_on(p, opcode, FailureOption::Unreachable, &vids))
            .collect();
    }

    debug!(port = %changed, "all remaining upstreams clean, nothing to flood");
    Vec::new()
}

/// A local failure was just observed on `failed` (§4.5's probe or dead-timer).
#[must_use]
pub fn local_failure(
    ports: &PortTable,
    offered: &OfferedTable,
    accepted: &AcceptedTable,
    role: &Role,
    failed: &PortId,
) -> Vec<Action> {
    local_transition(ports, offered, accepted, role, failed, Opcode::FailureUpdate)
}

/// A local recovery was just observed on `recovered` (3-in-a-row keep-alive
/// or liveness probe). Mirrors [`local_failure`]'s case analysis.
#[must_use]
pub fn local_recovery(
    ports: &PortTable,
    offered: &OfferedTable,
    accepted: &AcceptedTable,
    role: &Role,
    recovered: &PortId,
) -> Vec<Action> {
    local_transition(ports, offered, accepted, role, recovered, Opcode::RecoverUpdate)
}

/// Handle a received FAILURE_UPDATE(vids, option) on `ingress`.
#[must_use]
pub fn on_failure_update(
    ports: &PortTable,
    offered: &mut OfferedTable,
    accepted: &mut AcceptedTable,
    role: &Role,
    ingress: &PortId,
    vids: &[Vid],
    option: FailureOption,
) -> Vec<Action> {
    if accepted.ports().any(|p| p == ingress) {
        for vid in vids {
            accepted.unreachable_add(ingress, vid.clone());
        }
        return ports
            .names()
            .filter(|p| *p != ingress && ports.is_up(p))
            .map(|p| Action::SendControl {
                port: p.clone(),
                message: update(Opcode::FailureUpdate, FailureOption::Unreachable, vids.to_vec()),
            })
            .collect();
    }

    if !offered.ports().any(|p| p == ingress) {
        return Vec::new();
    }

    offered.reachable_clear(ingress);
    match option {
        FailureOption::Unreachable => {
            for vid in vids {
                offered.unreachable_add(ingress, vid.clone());
            }
        }
        FailureOption::Reachable => {
            for vid in vids {
                offered.reachable_add(ingress, vid.clone());
            }
        }
    }

    if role.is_leaf() {
        return Vec::new();
    }

    if offered.is_any_dirty() {
        let union = offered.collect_unreachable_union();
        if union.is_empty() {
            return Vec::new();
        }
        return accepted
            .ports()
            .filter(|p| ports.is_up(p))
            .map(|p| send_on(p, Opcode::FailureUpdate, FailureOption::Unreachable, &union))
            .collect();
    }
    Vec::new()
}

/// Handle a received RECOVER_UPDATE(vids, option) on `ingress`.
#[must_use]
pub fn on_recover_update(
    ports: &PortTable,
    offered: &mut OfferedTable,
    accepted: &mut AcceptedTable,
    role: &Role,
    ingress: &PortId,
    vids: &[Vid],
    option: FailureOption,
) -> Vec<Action> {
    if accepted.ports().any(|p| p == ingress) {
        for vid in vids {
            accepted.unreachable_remove(ingress, vid);
        }
        return ports
            .names()
            .filter(|p| *p != ingress && ports.is_up(p))
            .map(|p| Action::SendControl {
                port: p.clone(),
                message: update(Opcode::RecoverUpdate, FailureOption::Unreachable, vids.to_vec()),
            })
            .collect();
    }

    if !offered.ports().any(|p| p == ingress) {
        return Vec::new();
    }

    match option {
        FailureOption::Unreachable => {
            let before = offered.is_any_dirty();
            for vid in vids {
                offered.unreachable_remove(ingress, vid);
            }
            let after = offered.is_any_dirty();

            if role.is_leaf() {
                return Vec::new();
            }
            if !before && !after {
                return Vec::new();
            }
            let mut out: Vec<Vid> = vids.to_vec();
            if before && !after {
                out.extend(offered.collect_unreachable_union());
            }
            accepted
                .ports()
                .filter(|p| ports.is_up(p))
                .map(|p| Action::SendControl {
                    port: p.clone(),
                    message: update(Opcode::RecoverUpdate, FailureOption::Unreachable, out.clone()),
                })
                .collect()
        }
        FailureOption::Reachable => {
            let before_dirty = offered.is_any_dirty();
            offered.reachable_clear(ingress);
            let after_dirty = offered.is_any_dirty();

            if role.is_leaf() {
                return Vec::new();
            }
            if before_dirty && !after_dirty {
                let union = offered.collect_unreachable_union();
                if union.is_empty() {
                    return Vec::new();
                }
                return accepted
                    .ports()
                    .filter(|p| ports.is_up(p))
                    .map(|p| send_on(p, Opcode::RecoverUpdate, FailureOption::Unreachable, &union))
                    .collect();
            }
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PortId;

    fn mac(b: u8) -> mtp_net::Mac {
        mtp_net::Mac([b, b, b, b, b, b])
    }

    fn vid(s: &str) -> Vid {
        Vid::try_from(s).unwrap()
    }

    #[test]
    fn downstream_port_failure_floods_unreachable_on_other_ports() {
        let mut ports = PortTable::new();
        let mut accepted = AcceptedTable::new();
        let offered = OfferedTable::new();
        let failed = PortId::parse("spine1-eth0").unwrap();
        let other = PortId::parse("spine1-eth1").unwrap();
        ports.add(failed.clone(), mac(1));
        ports.add(other.clone(), mac(2));
        ports.set_up(&other, true);
        accepted.add(failed.clone(), vid("7"));

        let role = Role {
            tier: 2,
            is_top_spine: false,
        };
        let actions = local_failure(&ports, &offered, &accepted, &role, &failed);
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            Action::SendControl { port, message } => {
                assert_eq!(port, &other);
                assert_eq!(message.opcode, Opcode::FailureUpdate);
            }
            Action::EmitTenantIpv4 { .. } => panic!("unexpected"),
        }
    }

    #[test]
    fn all_upstream_down_floods_reachable_on_accepted_ports() {
        let mut ports = PortTable::new();
        let mut offered = OfferedTable::new();
        let mut accepted = AcceptedTable::new();
        let up_port = PortId::parse("spine1-eth0").unwrap();
        let down_port = PortId::parse("spine1-eth1").unwrap();
        let acc_port = PortId::parse("spine1-eth2").unwrap();
        ports.add(up_port.clone(), mac(1));
        ports.add(down_port.clone(), mac(2));
        ports.add(acc_port.clone(), mac(3));
        ports.set_up(&acc_port, true);
        offered.add(up_port.clone(), vid("7"));
        accepted.add(acc_port.clone(), vid("9"));

        let role = Role {
            tier: 3,
            is_top_spine: false,
        };
        let actions = local_failure(&ports, &offered, &accepted, &role, &up_port);
        assert_eq!(actions.len(), 1);
        let Action::SendControl { port, message } = &actions[0] else {
            panic!()
        };
        assert_eq!(port, &acc_port);
        let Payload::Update { option, .. } = &message.payload else {
            panic!()
        };
        assert_eq!(*option, FailureOption::Reachable);
    }

    #[test]
    fn receiving_failure_update_on_accepted_port_relays() {
        let mut ports = PortTable::new();
        let mut offered = OfferedTable::new();
        let mut accepted = AcceptedTable::new();
        let ingress = PortId::parse("spine1-eth0").unwrap();
        let other = PortId::parse("spine1-eth1").unwrap();
        ports.add(ingress.clone(), mac(1));
        ports.add(other.clone(), mac(2));
        ports.set_up(&other, true);
        accepted.add(ingress.clone(), vid("9"));

        let role = Role {
            tier: 2,
            is_top_spine: false,
        };
        let actions = on_failure_update(
            &ports,
            &mut offered,
            &mut accepted,
            &role,
            &ingress,
            &[vid("9.2")],
            FailureOption::Unreachable,
        );
        assert!(!accepted.is_eligible(&ingress, &vid("9.2")));
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn leaf_never_relays_offered_failure_update() {
        let mut ports = PortTable::new();
        let mut offered = OfferedTable::new();
        let mut accepted = AcceptedTable::new();
        let ingress = PortId::parse("leaf1-eth0").unwrap();
        ports.add(ingress.clone(), mac(1));
        ports.set_up(&ingress, true);
        offered.add(ingress.clone(), vid("7"));

        let role = Role {
            tier: 1,
            is_top_spine: false,
        };
        let actions = on_failure_update(
            &ports,
            &mut offered,
            &mut accepted,
            &role,
            &ingress,
            &[vid("7")],
            FailureOption::Unreachable,
        );
        assert!(actions.is_empty());
    }
}
