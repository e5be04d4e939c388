// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The Offered (C2) and Accepted (C3) tables: per-VID reachability state for
//! upstream and downstream control ports.

use mtp_net::Vid;
use ordermap::{OrderMap, OrderSet};

use crate::port::{PortId, PortTable};

/// Per-port bookkeeping for an offered (upstream) control port.
#[derive(Debug, Default, Clone)]
struct OfferedEntry {
    vids: OrderSet<Vid>,
    reachable: OrderSet<Vid>,
    unreachable: OrderSet<Vid>,
}

impl OfferedEntry {
    fn is_clean(&self) -> bool {
        self.reachable.is_empty() && self.unreachable.is_empty()
    }
}

/// The Offered table (C2): for each upstream port, the VIDs advertised to us
/// via JoinAck, plus the Reachable/Unreachable narrowing sets used by the
/// flood engine.
#[derive(Debug, Default)]
pub struct OfferedTable {
    ports: OrderMap<PortId, OfferedEntry>,
}

impl OfferedTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        OfferedTable {
            ports: OrderMap::new(),
        }
    }

    /// Insert `vid` into `port`'s advertised set. Idempotent (P1).
    pub fn add(&mut self, port: PortId, vid: Vid) {
        self.ports.entry(port).or_default().vids.insert(vid);
    }

    /// Remove `vid` from `port`'s advertised set.
    pub fn remove(&mut self, port: &PortId, vid: &Vid) {
        if let Some(entry) = self.ports.get_mut(port) {
            entry.vids.remove(vid);
        }
    }

    /// VIDs advertised on `port`, in insertion order.
    pub fn vids_of(&self, port: &PortId) -> impl Iterator<Item = &Vid> {
        self.ports.get(port).into_iter().flat_map(|e| e.vids.iter())
    }

    /// All ports carrying `vid`, in insertion order.
    pub fn ports_with<'a>(&'a self, vid: &'a Vid) -> impl Iterator<Item = &'a PortId> {
        self.ports
            .iter()
            .filter(move |(_, e)| e.vids.contains(vid))
            .map(|(p, _)| p)
    }

    /// Every port name currently present, whether or not it has advertised VIDs.
    pub fn ports(&self) -> impl Iterator<Item = &PortId> {
        self.ports.keys()
    }

    /// Every VID advertised on any port, deduplicated, in first-seen order.
    pub fn all_vids(&self) -> OrderSet<Vid> {
        let mut all = OrderSet::new();
        for entry in self.ports.values() {
            for vid in &entry.vids {
                all.insert(vid.clone());
            }
        }
        all
    }

    /// Declare `vid` unreachable via `port`.
    pub fn unreachable_add(&mut self, port: &PortId, vid: Vid) {
        self.ports.entry(port.clone()).or_default().unreachable.insert(vid);
    }

    /// Retract an unreachability declaration for `vid` via `port`.
    pub fn unreachable_remove(&mut self, port: &PortId, vid: &Vid) {
        if let Some(entry) = self.ports.get_mut(port) {
            entry.unreachable.remove(vid);
        }
    }

    /// Clear `port`'s reachable (narrowing) set.
    pub fn reachable_clear(&mut self, port: &PortId) {
        if let Some(entry) = self.ports.get_mut(port) {
            entry.reachable.clear();
        }
    }

    /// Add `vid` to `port`'s reachable (narrowing) set.
    pub fn reachable_add(&mut self, port: &PortId, vid: Vid) {
        self.ports.entry(port.clone()).or_default().reachable.insert(vid);
    }

    /// True iff any offered port has a non-empty reachable or unreachable set.
    #[must_use]
    pub fn is_any_dirty(&self) -> bool {
        self.ports.values().any(|e| !e.is_clean())
    }

    /// True iff the given port is dirty (non-empty reachable or unreachable set).
    #[must_use]
    pub fn is_dirty(&self, port: &PortId) -> bool {
        self.ports.get(port).is_some_and(|e| !e.is_clean())
    }

    /// The union of every offered port's unreachable set, in first-seen order.
    #[must_use]
    pub fn collect_unreachable_union(&self) -> OrderSet<Vid> {
        let mut union = OrderSet::new();
        for entry in self.ports.values() {
            for vid in &entry.unreachable {
                union.insert(vid.clone());
            }
        }
        union
    }

    fn is_eligible(&self, port: &PortId, dest: &Vid) -> bool {
        let Some(entry) = self.ports.get(port) else {
            return false;
        };
        if entry.unreachable.contains(dest) {
            return false;
        }
        entry.reachable.is_empty() || entry.reachable.contains(dest)
    }

    /// Offered ports eligible to carry traffic toward `dest`, in insertion
    /// order: the port's control state must be up, and `dest` must not be
    /// excluded by the port's reachable/unreachable narrowing (§4.2).
    pub fn eligible_offered_ports_for<'a>(
        &'a self,
        dest: &'a Vid,
        port_table: &'a PortTable,
    ) -> impl Iterator<Item = &'a PortId> {
        self.ports.keys().filter(move |port| {
            port_table.lookup(port).is_some_and(|p| p.is_up()) && self.is_eligible(port, dest)
        })
    }

    /// The number of offered ports eligible for `dest`.
    #[must_use]
    pub fn count_eligible_offered_ports_for(&self, dest: &Vid, port_table: &PortTable) -> usize {
        self.eligible_offered_ports_for(dest, port_table).count()
    }

    /// Offered ports eligible for a destination identified only by its root
    /// component, as carried bare in a DATA header (§4.5): an offered port's
    /// advertised VID may carry downward extensions picked up during the join
    /// handshake, so eligibility is judged by root-component match rather
    /// than full equality.
    pub fn eligible_offered_ports_for_root<'a>(
        &'a self,
        root: u16,
        port_table: &'a PortTable,
    ) -> impl Iterator<Item = &'a PortId> {
        self.ports.iter().filter_map(move |(port, entry)| {
            let carries_root = entry.vids.iter().any(|v| v.root_component() == root);
            let blocked = entry.unreachable.iter().any(|v| v.root_component() == root);
            let narrowed = !entry.reachable.is_empty()
                && !entry.reachable.iter().any(|v| v.root_component() == root);
            (carries_root && !blocked && !narrowed && port_table.is_up(port)).then_some(port)
        })
    }
}

/// Per-port bookkeeping for an accepted (downstream) control port.
#[derive(Debug, Default, Clone)]
struct AcceptedEntry {
    vids: OrderSet<Vid>,
    unreachable: OrderSet<Vid>,
}

/// The Accepted table (C3): for each downstream port, the VIDs we have
/// offered it via JoinRes, plus the set it has declared unreachable.
#[derive(Debug, Default)]
pub struct AcceptedTable {
    ports: OrderMap<PortId, AcceptedEntry>,
}

impl AcceptedTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        AcceptedTable {
            ports: OrderMap::new(),
        }
    }

    /// Insert `vid` into `port`'s accepted set. Idempotent (P1).
    pub fn add(&mut self, port: PortId, vid: Vid) {
        self.ports.entry(port).or_default().vids.insert(vid);
    }

    /// Remove `vid` from `port`'s accepted set.
    pub fn remove(&mut self, port: &PortId, vid: &Vid) {
        if let Some(entry) = self.ports.get_mut(port) {
            entry.vids.remove(vid);
        }
    }

    /// VIDs accepted on `port`, in insertion order.
    pub fn vids_of(&self, port: &PortId) -> impl Iterator<Item = &Vid> {
        self.ports.get(port).into_iter().flat_map(|e| e.vids.iter())
    }

    /// All ports carrying `vid`, in insertion order.
    pub fn ports_with<'a>(&'a self, vid: &'a Vid) -> impl Iterator<Item = &'a PortId> {
        self.ports
            .iter()
            .filter(move |(_, e)| e.vids.contains(vid))
            .map(|(p, _)| p)
    }

    /// Every port name currently present.
    pub fn ports(&self) -> impl Iterator<Item = &PortId> {
        self.ports.keys()
    }

    /// Every VID accepted on any port, deduplicated, in first-seen order.
    pub fn all_vids(&self) -> OrderSet<Vid> {
        let mut all = OrderSet::new();
        for entry in self.ports.values() {
            for vid in &entry.vids {
                all.insert(vid.clone());
            }
        }
        all
    }

    /// Declare `vid` unreachable through `port`.
    pub fn unreachable_add(&mut self, port: &PortId, vid: Vid) {
        self.ports.entry(port.clone()).or_default().unreachable.insert(vid);
    }

    /// Retract an unreachability declaration for `vid` through `port`.
    pub fn unreachable_remove(&mut self, port: &PortId, vid: &Vid) {
        if let Some(entry) = self.ports.get_mut(port) {
            entry.unreachable.remove(vid);
        }
    }

    /// True iff `dest` is reachable through `port` (present and not declared
    /// unreachable).
    #[must_use]
    pub fn is_eligible(&self, port: &PortId, dest: &Vid) -> bool {
        self.ports
            .get(port)
            .is_some_and(|e| e.vids.contains(dest) && !e.unreachable.contains(dest))
    }

    /// Find the (first, in insertion order) accepted port carrying `dest`,
    /// if any -- used by C7's downward forwarding lookup.
    #[must_use]
    pub fn port_for(&self, dest: &Vid) -> Option<&PortId> {
        self.ports
            .iter()
            .find(|(_, e)| e.vids.contains(dest))
            .map(|(p, _)| p)
    }

    /// Find the accepted port whose advertised VID has root component `root`,
    /// as carried bare in a DATA header (§4.5), unless that port is down or
    /// has declared the destination unreachable.
    #[must_use]
    pub fn eligible_port_for_root(&self, root: u16, port_table: &PortTable) -> Option<&PortId> {
        self.ports.iter().find_map(|(port, entry)| {
            let carries_root = entry.vids.iter().any(|v| v.root_component() == root);
            let blocked = entry.unreachable.iter().any(|v| v.root_component() == root);
            (carries_root && !blocked && port_table.is_up(port)).then_some(port)
        })
    }

    /// True iff some accepted port advertises `root`, regardless of that
    /// port's up/unreachable state. Lets a caller tell "no accepted port
    /// declares this destination at all" (fall through to offered-port ECMP)
    /// apart from "an accepted port declares it but is currently ineligible"
    /// (drop, per §4.5).
    #[must_use]
    pub fn contains_root(&self, root: u16) -> bool {
        self.ports
            .values()
            .any(|entry| entry.vids.iter().any(|v| v.root_component() == root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PortTable;

    fn vid(s: &str) -> Vid {
        Vid::try_from(s).unwrap()
    }

    fn mac(b: u8) -> mtp_net::Mac {
        mtp_net::Mac([b, b, b, b, b, b])
    }

    #[test]
    fn add_is_idempotent() {
        let mut table = OfferedTable::new();
        let p = PortId::parse("spine1-eth0").unwrap();
        table.add(p.clone(), vid("7"));
        table.add(p.clone(), vid("7"));
        assert_eq!(table.vids_of(&p).count(), 1);
    }

    #[test]
    fn eligible_requires_port_up_and_not_unreachable() {
        let mut offered = OfferedTable::new();
        let mut ports = PortTable::new();
        let p1 = PortId::parse("spine1-eth0").unwrap();
        let p2 = PortId::parse("spine1-eth1").unwrap();
        ports.add(p1.clone(), mac(1));
        ports.add(p2.clone(), mac(2));
        ports.set_up(&p1, true);
        ports.set_up(&p2, true);
        offered.add(p1.clone(), vid("7"));
        offered.add(p2.clone(), vid("7"));
        offered.unreachable_add(&p2, vid("7"));

        let v7 = vid("7");
        let eligible: Vec<_> = offered.eligible_offered_ports_for(&v7, &ports).collect();
        assert_eq!(eligible, vec![&p1]);
    }

    #[test]
    fn reachable_narrows_to_only_listed_vids() {
        let mut offered = OfferedTable::new();
        let mut ports = PortTable::new();
        let p = PortId::parse("spine1-eth0").unwrap();
        ports.add(p.clone(), mac(1));
        ports.set_up(&p, true);
        offered.add(p.clone(), vid("7"));
        offered.add(p.clone(), vid("9"));
        offered.reachable_add(&p, vid("7"));

        assert!(offered.eligible_offered_ports_for(&vid("7"), &ports).any(|x| x == &p));
        assert!(!offered.eligible_offered_ports_for(&vid("9"), &ports).any(|x| x == &p));
    }

    #[test]
    fn down_port_is_never_eligible() {
        let mut offered = OfferedTable::new();
        let mut ports = PortTable::new();
        let p = PortId::parse("spine1-eth0").unwrap();
        ports.add(p.clone(), mac(1));
        offered.add(p.clone(), vid("7"));
        assert_eq!(offered.count_eligible_offered_ports_for(&vid("7"), &ports), 0);
    }

    #[test]
    fn accepted_port_for_finds_declaring_port() {
        let mut accepted = AcceptedTable::new();
        let p = PortId::parse("leaf1-eth0").unwrap();
        accepted.add(p.clone(), vid("7"));
        assert_eq!(accepted.port_for(&vid("7")), Some(&p));
        assert_eq!(accepted.port_for(&vid("9")), None);
    }
}
