// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Interface discovery (§6): splits the OS's live interface list into the
//! fabric-relevant compute and control interfaces for one node.
//!
//! A leaf has exactly one compute interface (L3, IPv4-addressed) and zero or
//! more control interfaces (L2, no IPv4); a spine has only control interfaces.
//! Both kinds are identified purely by an interface-name prefix match against
//! the node's own name, since the fabric's naming convention is the only
//! signal the agent is given -- there is no separate topology file.

use mtp_net::Mac;

/// A discovered control interface: its name and MAC.
#[derive(Debug, Clone)]
pub struct ControlIface {
    pub name: String,
    pub mac: Mac,
}

/// A discovered compute interface: its name, MAC, and IPv4 address.
#[derive(Debug, Clone)]
pub struct ComputeIface {
    pub name: String,
    pub mac: Mac,
    pub addr: std::net::Ipv4Addr,
}

/// The split view the core and driver need for one node.
#[derive(Debug, Default)]
pub struct Topology {
    pub compute: Option<ComputeIface>,
    pub control: Vec<ControlIface>,
}

fn mac_of(interface: &netdev::Interface) -> Option<Mac> {
    interface.mac_addr.map(|m| Mac(m.octets()))
}

/// Discover this node's compute and control interfaces from the live OS
/// interface list, filtering to up interfaces whose name begins with
/// `{node_name}-eth`. On a leaf, the first such interface carrying an IPv4
/// address is taken as the compute interface and excluded from `control`.
#[must_use]
pub fn discover(node_name: &str, is_leaf: bool) -> Topology {
    let prefix = format!("{node_name}-eth");
    let mut topology = Topology::default();

    for interface in netdev::get_interfaces() {
        if !interface.name.starts_with(&prefix) || !interface.is_up() {
            continue;
        }

        if is_leaf && topology.compute.is_none() {
            if let Some(net) = interface.ipv4.first() {
                let Some(mac) = mac_of(&interface) else {
                    continue;
                };
                topology.compute = Some(ComputeIface {
                    name: interface.name,
                    mac,
                    addr: net.addr(),
                });
                continue;
            }
        }

        let Some(mac) = mac_of(&interface) else {
            continue;
        };
        topology.control.push(ControlIface {
            name: interface.name,
            mac,
        });
    }

    topology
}
