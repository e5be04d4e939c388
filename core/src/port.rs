// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The port table (C1): per-control-port liveness state.

use std::fmt::Display;

use mtp_net::Mac;
use ordermap::OrderMap;

/// The interface name of a control or compute port, e.g. `leaf1-eth0`.
///
/// Matches the pattern `{node_name}-eth{N}`; `N` is the port number used
/// when extending a VID downward.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(String);

/// Error constructing a [`PortId`] from a raw interface name.
#[derive(Debug, thiserror::Error)]
#[error("interface name {0:?} does not match the expected `<node>-eth<N>` pattern")]
pub struct PortIdError(String);

impl PortId {
    /// Parse an interface name, requiring it to match `{node_name}-eth{N}`.
    pub fn parse(name: &str) -> Result<Self, PortIdError> {
        let Some((_, suffix)) = name.rsplit_once("-eth") else {
            return Err(PortIdError(name.to_string()));
        };
        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PortIdError(name.to_string()));
        }
        Ok(PortId(name.to_string()))
    }

    /// The port number suffix, e.g. `3` for `leaf1-eth3`.
    #[must_use]
    pub fn port_number(&self) -> u32 {
        let (_, suffix) = self.0.rsplit_once("-eth").unwrap_or(("", "0"));
        suffix.parse().unwrap_or(0)
    }

    /// The raw interface name string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a control port's liveness was most recently found to have failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailCause {
    /// Link has not failed (or the failure has been cleared).
    None,
    /// The liveness probe observed the underlying link go down.
    DetectFail,
    /// `DEAD_TIMER` elapsed with no keep-alive received.
    MissFail,
}

/// Per-control-port liveness and framing state.
#[derive(Debug, Clone)]
pub struct ControlPort {
    name: PortId,
    is_up: bool,
    started: bool,
    last_sent_ms: i64,
    last_received_ms: i64,
    fail_cause: FailCause,
    recovery_counter: u8,
    header_template: [u8; 14],
}

impl ControlPort {
    /// Build a new, not-yet-started control port with a precomputed broadcast
    /// Ethernet II header template (I5's sibling requirement for C1: the
    /// template is fixed once at creation, since it depends only on the
    /// port's own MAC).
    #[must_use]
    pub fn new(name: PortId, mac: Mac) -> Self {
        let source = mtp_net::SourceMac::new(mac).unwrap_or_else(|_| {
            // The zero MAC is not a legal source; fall back to an
            // obviously-wrong-but-non-zero value so the port still records
            // a template rather than panicking.
            mtp_net::SourceMac::new(Mac([0, 0, 0, 0, 0, 1])).expect("non-zero mac")
        });
        let header_template = mtp_net::Eth::control_template(source).to_bytes();
        ControlPort {
            name,
            is_up: false,
            started: false,
            last_sent_ms: 0,
            last_received_ms: 0,
            fail_cause: FailCause::None,
            recovery_counter: 0,
            header_template,
        }
    }

    /// The port's name.
    #[must_use]
    pub fn name(&self) -> &PortId {
        &self.name
    }

    /// Whether the port is currently eligible to send/receive control and data (I2).
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.is_up
    }

    /// Whether `StartHello` has been exchanged on this port.
    #[must_use]
    pub fn started(&self) -> bool {
        self.started
    }

    /// Timestamp (ms) this port last sent a frame.
    #[must_use]
    pub fn last_sent_ms(&self) -> i64 {
        self.last_sent_ms
    }

    /// Timestamp (ms) this port last received a frame.
    #[must_use]
    pub fn last_received_ms(&self) -> i64 {
        self.last_received_ms
    }

    /// The most recent failure classification.
    #[must_use]
    pub fn fail_cause(&self) -> FailCause {
        self.fail_cause
    }

    /// Current consecutive-on-time-keep-alive count while down.
    #[must_use]
    pub fn recovery_counter(&self) -> u8 {
        self.recovery_counter
    }

    /// The precomputed 14-byte Ethernet II header for this port.
    #[must_use]
    pub fn header_template(&self) -> [u8; 14] {
        self.header_template
    }

    fn set_up(&mut self, up: bool) {
        self.is_up = up;
        if up {
            self.recovery_counter = 0; // I4
        }
    }

    fn mark_started(&mut self) {
        self.started = true;
    }

    fn mark_fail(&mut self, cause: FailCause) {
        self.fail_cause = cause;
        self.set_up(false);
        self.recovery_counter = 0;
    }

    fn clear_fail(&mut self) {
        self.fail_cause = FailCause::None;
    }

    fn touch_sent(&mut self, now_ms: i64) {
        self.last_sent_ms = now_ms;
    }

    fn touch_received(&mut self, now_ms: i64) {
        self.last_received_ms = now_ms;
    }

    fn bump_recovery(&mut self) -> u8 {
        self.recovery_counter = self.recovery_counter.saturating_add(1).min(3);
        self.recovery_counter
    }
}

/// The port table (C1): every control port this switch knows about, keyed by
/// name, in discovery order.
#[derive(Debug, Default)]
pub struct PortTable {
    ports: OrderMap<PortId, ControlPort>,
}

impl PortTable {
    /// An empty port table.
    #[must_use]
    pub fn new() -> Self {
        PortTable {
            ports: OrderMap::new(),
        }
    }

    /// Register a newly discovered control port.
    pub fn add(&mut self, name: PortId, mac: Mac) {
        let port = ControlPort::new(name.clone(), mac);
        self.ports.entry(name).or_insert(port);
    }

    /// Look up a port by name.
    #[must_use]
    pub fn lookup(&self, name: &PortId) -> Option<&ControlPort> {
        self.ports.get(name)
    }

    /// True iff `name` is a known port that is currently up.
    #[must_use]
    pub fn is_up(&self, name: &PortId) -> bool {
        self.ports.get(name).is_some_and(ControlPort::is_up)
    }

    /// Iterate all ports in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &ControlPort> {
        self.ports.values()
    }

    /// Iterate the names of all ports in discovery order.
    pub fn names(&self) -> impl Iterator<Item = &PortId> {
        self.ports.keys()
    }

    /// Set a port's up/down state directly (used when I2's liveness side
    /// effects -- e.g. recovery counter reset -- are not wanted, such as
    /// completing the join handshake).
    pub fn set_up(&mut self, name: &PortId, up: bool) {
        if let Some(port) = self.ports.get_mut(name) {
            port.set_up(up);
        }
    }

    /// Mark `StartHello` exchanged.
    pub fn mark_started(&mut self, name: &PortId) {
        if let Some(port) = self.ports.get_mut(name) {
            port.mark_started();
        }
    }

    /// Transition a port to down with the given failure cause (I3).
    pub fn mark_fail(&mut self, name: &PortId, cause: FailCause) {
        if let Some(port) = self.ports.get_mut(name) {
            port.mark_fail(cause);
        }
    }

    /// Clear a port's failure classification without bringing it back up.
    pub fn clear_fail(&mut self, name: &PortId) {
        if let Some(port) = self.ports.get_mut(name) {
            port.clear_fail();
        }
    }

    /// Record that a frame was just sent on this port.
    pub fn touch_sent(&mut self, name: &PortId, now_ms: i64) {
        if let Some(port) = self.ports.get_mut(name) {
            port.touch_sent(now_ms);
        }
    }

    /// Record that a frame was just received on this port.
    pub fn touch_received(&mut self, name: &PortId, now_ms: i64) {
        if let Some(port) = self.ports.get_mut(name) {
            port.touch_received(now_ms);
        }
    }

    /// Increment the recovery counter, saturating at 3, returning the new value.
    pub fn bump_recovery(&mut self, name: &PortId) -> u8 {
        self.ports
            .get_mut(name)
            .map_or(0, ControlPort::bump_recovery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(b: u8) -> Mac {
        Mac([b, b, b, b, b, b])
    }

    #[test]
    fn parses_valid_port_name() {
        let port = PortId::parse("leaf1-eth3").unwrap();
        assert_eq!(port.port_number(), 3);
        assert_eq!(port.as_str(), "leaf1-eth3");
    }

    #[test]
    fn rejects_malformed_port_name() {
        assert!(PortId::parse("leaf1").is_err());
        assert!(PortId::parse("leaf1-ethx").is_err());
    }

    #[test]
    fn recovery_counter_saturates_and_resets_on_up() {
        let mut table = PortTable::new();
        let p = PortId::parse("leaf1-eth0").unwrap();
        table.add(p.clone(), mac(1));
        assert_eq!(table.bump_recovery(&p), 1);
        assert_eq!(table.bump_recovery(&p), 2);
        assert_eq!(table.bump_recovery(&p), 3);
        assert_eq!(table.bump_recovery(&p), 3);
        table.set_up(&p, true);
        assert_eq!(table.lookup(&p).unwrap().recovery_counter(), 0);
    }

    #[test]
    fn mark_fail_brings_port_down_and_zeroes_recovery() {
        let mut table = PortTable::new();
        let p = PortId::parse("spine1-eth1").unwrap();
        table.add(p.clone(), mac(2));
        table.set_up(&p, true);
        table.bump_recovery(&p);
        table.mark_fail(&p, FailCause::MissFail);
        let port = table.lookup(&p).unwrap();
        assert!(!port.is_up());
        assert_eq!(port.fail_cause(), FailCause::MissFail);
        assert_eq!(port.recovery_counter(), 0);
    }
}
