// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Liveness (C5): keep-alive emission, dead-timer failure detection, the
//! link-state probe, and 3-in-a-row recovery.

use mtp_net::{MtpMessage, Opcode, Payload};
use tracing::{debug, warn};

use crate::action::Action;
use crate::flood;
use crate::port::{FailCause, PortId, PortTable};
use crate::role::Role;
use crate::tables::{AcceptedTable, OfferedTable};

/// Send a KEEP_ALIVE on every control port that has completed the join
/// handshake (`started`, regardless of current up/down state) and whose
/// `HELLO_TIMER` has elapsed since it last sent anything.
#[must_use]
pub fn send_keep_alives(ports: &mut PortTable, now_ms: i64, hello_timer_ms: i64) -> Vec<Action> {
    let due: Vec<PortId> = ports
        .iter()
        .filter(|p| p.started() && now_ms - p.last_sent_ms() >= hello_timer_ms)
        .map(|p| p.name().clone())
        .collect();
    let mut actions = Vec::with_capacity(due.len());
    for port in due {
        ports.touch_sent(&port, now_ms);
        actions.push(Action::SendControl {
            port,
            message: MtpMessage {
                opcode: Opcode::KeepAlive,
                payload: Payload::KeepAlive,
            },
        });
    }
    actions
}

/// Record a received KEEP_ALIVE on `ingress`. Bumps the recovery counter if
/// the port is down for a reason other than [`FailCause::DetectFail`]; at
/// three consecutive on-time keep-alives the port is brought back up and a
/// recovery flood is triggered (I4).
#[must_use]
pub fn on_keep_alive(
    ports: &mut PortTable,
    offered: &OfferedTable,
    accepted: &AcceptedTable,
    role: &Role,
    ingress: &PortId,
    now_ms: i64,
) -> Vec<Action> {
    ports.touch_received(ingress, now_ms);

    let Some(port) = ports.lookup(ingress) else {
        return Vec::new();
    };
    if port.is_up() || port.fail_cause() == FailCause::DetectFail {
        return Vec::new();
    }

    if ports.bump_recovery(ingress) < 3 {
        return Vec::new();
    }

    debug!(port = %ingress, "three consecutive keep-alives received, bringing port back up");
    ports.set_up(ingress, true);
    ports.clear_fail(ingress);
    flood::local_recovery(ports, offered, accepted, role, ingress)
}

/// Dead-timer sweep (§4.4): any `started` port that is still up but hasn't
/// received anything in `dead_timer_ms` is marked down with
/// [`FailCause::MissFail`] and a failure flood is triggered.
#[must_use]
pub fn sweep_dead_timer(
    ports: &mut PortTable,
    offered: &OfferedTable,
    accepted: &AcceptedTable,
    role: &Role,
    now_ms: i64,
    dead_timer_ms: i64,
) -> Vec<Action> {
    let expired: Vec<PortId> = ports
        .iter()
        .filter(|p| p.started() && p.is_up() && now_ms - p.last_received_ms() >= dead_timer_ms)
        .map(|p| p.name().clone())
        .collect();

    let mut actions = Vec::new();
    for port in expired {
        warn!(port = %port, "dead timer expired, marking down");
        ports.mark_fail(&port, FailCause::MissFail);
        actions.extend(flood::local_failure(ports, offered, accepted, role, &port));
    }
    actions
}

/// Link-state probe (§4.4): reconcile `started` ports against the OS's
/// current notion of which interfaces are link-up. A port whose link just
/// went down is marked [`FailCause::DetectFail`] and floods a failure; one
/// whose link just came back merely clears the failure cause (the keep-alive
/// path is what brings it back up and floods a recovery, via three
/// consecutive on-time keep-alives).
#[must_use]
pub fn sweep_link_state<'a>(
    ports: &mut PortTable,
    offered: &OfferedTable,
    accepted: &AcceptedTable,
    role: &Role,
    live_interfaces: impl Iterator<Item = &'a str>,
) -> Vec<Action> {
    let live: std::collections::HashSet<&str> = live_interfaces.collect();

    let started: Vec<PortId> = ports
        .iter()
        .filter(|p| p.started())
        .map(|p| p.name().clone())
        .collect();

    let mut actions = Vec::new();
    for port in started {
        let Some(control) = ports.lookup(&port) else {
            continue;
        };
        let link_up = live.contains(control.name().as_str());

        if !link_up && control.is_up() {
            warn!(port = %port, "link-state probe observed link down");
            ports.mark_fail(&port, FailCause::DetectFail);
            actions.extend(flood::local_failure(ports, offered, accepted, role, &port));
        } else if link_up && control.fail_cause() == FailCause::DetectFail {
            debug!(port = %port, "link-state probe observed link recovery");
            ports.clear_fail(&port);
        }
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtp_net::{Mac, Vid};

    fn mac(b: u8) -> Mac {
        Mac([b, b, b, b, b, b])
    }

    fn role() -> Role {
        Role {
            tier: 2,
            is_top_spine: false,
        }
    }

    #[test]
    fn keep_alive_sent_only_on_started_ports() {
        let mut ports = PortTable::new();
        let started = PortId::parse("spine1-eth0").unwrap();
        let unstarted = PortId::parse("spine1-eth1").unwrap();
        ports.add(started.clone(), mac(1));
        ports.add(unstarted.clone(), mac(2));
        ports.mark_started(&started);

        let actions = send_keep_alives(&mut ports, 1000, 500);
        assert_eq!(actions.len(), 1);
        assert_eq!(
            actions[0],
            Action::SendControl {
                port: started,
                message: MtpMessage {
                    opcode: Opcode::KeepAlive,
                    payload: Payload::KeepAlive,
                },
            }
        );
    }

    #[test]
    fn keep_alive_withheld_until_hello_timer_elapses() {
        let mut ports = PortTable::new();
        let p = PortId::parse("spine1-eth0").unwrap();
        ports.add(p.clone(), mac(1));
        ports.mark_started(&p);

        // last_sent_ms starts at 0, so the port isn't due until HELLO_TIMER
        // has elapsed since construction, not immediately.
        assert!(send_keep_alives(&mut ports, 200, 500).is_empty());
        assert!(!send_keep_alives(&mut ports, 500, 500).is_empty());
        assert!(send_keep_alives(&mut ports, 700, 500).is_empty());
        assert!(!send_keep_alives(&mut ports, 1000, 500).is_empty());
    }

    #[test]
    fn three_keep_alives_bring_a_down_port_back_up() {
        let mut ports = PortTable::new();
        let offered = OfferedTable::new();
        let accepted = AcceptedTable::new();
        let p = PortId::parse("spine1-eth0").unwrap();
        ports.add(p.clone(), mac(1));
        ports.mark_started(&p);
        ports.mark_fail(&p, FailCause::MissFail);

        assert!(on_keep_alive(&mut ports, &offered, &accepted, &role(), &p, 10).is_empty());
        assert!(on_keep_alive(&mut ports, &offered, &accepted, &role(), &p, 20).is_empty());
        let actions = on_keep_alive(&mut ports, &offered, &accepted, &role(), &p, 30);
        assert!(ports.lookup(&p).unwrap().is_up());
        assert!(!actions.is_empty());
    }

    #[test]
    fn detect_fail_blocks_keep_alive_recovery() {
        let mut ports = PortTable::new();
        let offered = OfferedTable::new();
        let accepted = AcceptedTable::new();
        let p = PortId::parse("spine1-eth0").unwrap();
        ports.add(p.clone(), mac(1));
        ports.mark_started(&p);
        ports.mark_fail(&p, FailCause::DetectFail);

        for ts in [10, 20, 30] {
            assert!(on_keep_alive(&mut ports, &offered, &accepted, &role(), &p, ts).is_empty());
        }
        assert!(!ports.lookup(&p).unwrap().is_up());
    }

    #[test]
    fn dead_timer_marks_port_down_and_floods() {
        let mut ports = PortTable::new();
        let mut accepted = AcceptedTable::new();
        let offered = OfferedTable::new();
        let p = PortId::parse("spine1-eth0").unwrap();
        let other = PortId::parse("spine1-eth1").unwrap();
        ports.add(p.clone(), mac(1));
        ports.add(other.clone(), mac(2));
        ports.set_up(&p, true);
        ports.mark_started(&p);
        ports.set_up(&other, true);
        accepted.add(p.clone(), Vid::try_from("7").unwrap());

        let actions = sweep_dead_timer(&mut ports, &offered, &accepted, &role(), 10_000, 5_000);
        assert!(!ports.lookup(&p).unwrap().is_up());
        assert_eq!(ports.lookup(&p).unwrap().fail_cause(), FailCause::MissFail);
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn link_probe_detects_and_then_clears_without_restoring_up() {
        let mut ports = PortTable::new();
        let offered = OfferedTable::new();
        let accepted = AcceptedTable::new();
        let p = PortId::parse("spine1-eth0").unwrap();
        ports.add(p.clone(), mac(1));
        ports.set_up(&p, true);
        ports.mark_started(&p);

        let down = sweep_link_state(&mut ports, &offered, &accepted, &role(), std::iter::empty());
        assert!(!down.is_empty());
        assert!(!ports.lookup(&p).unwrap().is_up());
        assert_eq!(ports.lookup(&p).unwrap().fail_cause(), FailCause::DetectFail);

        let recovered = sweep_link_state(
            &mut ports,
            &offered,
            &accepted,
            &role(),
            std::iter::once("spine1-eth0"),
        );
        assert!(recovered.is_empty());
        assert_eq!(ports.lookup(&p).unwrap().fail_cause(), FailCause::None);
        assert!(!ports.lookup(&p).unwrap().is_up());
    }
}
