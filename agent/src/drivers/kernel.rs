// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The kernel driver: raw AF_PACKET sockets glued to the protocol core
//! through a single-threaded `mio` poll loop (§5). There is no worker pool
//! and no queueing between reading a frame and handing it to [`Switch`] --
//! every frame is dispatched to completion before the next one is read.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use afpacket::sync::RawPacketStream;
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use tracing::{error, info, trace, warn};

use mtp_core::{Action, PortId, Role, Switch};
use mtp_net::{Eth, MtpEtherType, MtpMessage, SourceMac};

use crate::error::AgentError;
use crate::iface::Topology;

const RECV_BUF_LEN: usize = 2048;
const POLL_TIMEOUT: Duration = Duration::from_millis(50);
/// Bounded settle time before the leaf's initial HELLONR burst (§5), giving
/// peer interfaces time to come up after the agents on a fabric are started
/// together.
const STARTUP_SETTLE: Duration = Duration::from_secs(3);
/// Reserved for the leaf's compute socket; control ports are registered from `1`.
const COMPUTE_TOKEN: Token = Token(0);

struct ControlSocket {
    sock: RawPacketStream,
    raw_fd: RawFd,
}

impl ControlSocket {
    fn open(name: &str) -> io::Result<Self> {
        let mut sock = RawPacketStream::new()?;
        sock.set_non_blocking();
        sock.bind(name)?;
        let raw_fd = sock.as_raw_fd();
        Ok(ControlSocket { sock, raw_fd })
    }
}

struct ComputeSocket {
    sock: RawPacketStream,
    raw_fd: RawFd,
    header_template: [u8; mtp_net::eth::HEADER_LEN],
}

impl ComputeSocket {
    fn open(name: &str, mac: mtp_net::Mac) -> io::Result<Self> {
        let mut sock = RawPacketStream::new()?;
        sock.set_non_blocking();
        sock.bind(name)?;
        let raw_fd = sock.as_raw_fd();
        let source =
            SourceMac::new(mac).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let header_template = Eth::tenant_template(source).to_bytes();
        Ok(ComputeSocket {
            sock,
            raw_fd,
            header_template,
        })
    }
}

/// Run the event loop to completion. Returns once `shutdown` is observed.
pub fn run(
    role: Role,
    node_name: &str,
    topology: Topology,
    hello_timer_ms: i64,
    dead_timer_ms: i64,
    shutdown: &AtomicBool,
) -> Result<(), AgentError> {
    if topology.control.is_empty() {
        return Err(AgentError::NoControlInterfaces(node_name.to_owned()));
    }

    let mut switch = Switch::new(role);
    let mut poll = Poll::new().map_err(AgentError::Poll)?;

    let mut sockets: HashMap<PortId, ControlSocket> = HashMap::new();
    let mut token_to_port: HashMap<Token, PortId> = HashMap::new();
    let mut next_token = 1usize;

    for iface in &topology.control {
        let port = PortId::parse(&iface.name)
            .map_err(|e| AgentError::Socket(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
        let socket = ControlSocket::open(&iface.name).map_err(AgentError::Socket)?;
        let token = Token(next_token);
        next_token += 1;
        let mut source = SourceFd(&socket.raw_fd);
        poll.registry()
            .register(&mut source, token, Interest::READABLE)
            .map_err(AgentError::Poll)?;
        switch.add_port(port.clone(), iface.mac);
        token_to_port.insert(token, port.clone());
        sockets.insert(port, socket);
    }

    let mut compute_socket = match &topology.compute {
        Some(iface) => {
            let socket =
                ComputeSocket::open(&iface.name, iface.mac).map_err(AgentError::Socket)?;
            let mut source = SourceFd(&socket.raw_fd);
            poll.registry()
                .register(&mut source, COMPUTE_TOKEN, Interest::READABLE)
                .map_err(AgentError::Poll)?;
            switch.derive_root_vid(iface.addr);
            Some(socket)
        }
        None => None,
    };

    info!(
        node = node_name,
        settle_secs = STARTUP_SETTLE.as_secs(),
        "settling before initial HelloNr burst"
    );
    std::thread::sleep(STARTUP_SETTLE);
    let actions = switch.initial_hello_burst();
    execute(&switch, &mut sockets, compute_socket.as_mut(), actions);

    let mut events = Events::with_capacity(64);
    let clock = Instant::now();
    let mut recv_buf = [0u8; RECV_BUF_LEN];

    while !shutdown.load(Ordering::Relaxed) {
        if let Err(e) = poll.poll(&mut events, Some(POLL_TIMEOUT)) {
            if e.kind() != io::ErrorKind::Interrupted {
                warn!("poll error: {e}");
            }
            continue;
        }
        let now_ms = clock_ms(&clock);

        for event in &events {
            if !event.is_readable() {
                continue;
            }
            let token = event.token();

            if token == COMPUTE_TOKEN {
                let frames = match compute_socket.as_mut() {
                    Some(socket) => recv_frames(&mut socket.sock, &mut recv_buf),
                    None => Vec::new(),
                };
                for frame in frames {
                    let actions = handle_tenant_frame(&mut switch, &frame, now_ms);
                    execute(&switch, &mut sockets, compute_socket.as_mut(), actions);
                }
                continue;
            }

            let Some(port) = token_to_port.get(&token).cloned() else {
                continue;
            };
            let frames = match sockets.get_mut(&port) {
                Some(socket) => recv_frames(&mut socket.sock, &mut recv_buf),
                None => continue,
            };
            for frame in frames {
                let actions = handle_control_frame(&mut switch, &port, &frame, now_ms);
                execute(&switch, &mut sockets, compute_socket.as_mut(), actions);
            }
        }

        let live = live_control_interfaces(node_name);
        let actions = switch.tick(
            now_ms,
            hello_timer_ms,
            dead_timer_ms,
            live.iter().map(String::as_str),
        );
        execute(&switch, &mut sockets, compute_socket.as_mut(), actions);
    }

    Ok(())
}

fn clock_ms(start: &Instant) -> i64 {
    i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX)
}

fn recv_frames(sock: &mut RawPacketStream, buf: &mut [u8; RECV_BUF_LEN]) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    loop {
        match sock.read(buf) {
            Ok(0) => break,
            Ok(n) => frames.push(buf[..n].to_vec()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => {
                warn!("read error: {e}");
                break;
            }
        }
    }
    frames
}

fn handle_control_frame(
    switch: &mut Switch,
    ingress: &PortId,
    frame: &[u8],
    now_ms: i64,
) -> Vec<Action> {
    let Ok(eth) = Eth::parse(frame) else {
        trace!(port = %ingress, "dropping undersized control frame");
        return Vec::new();
    };
    if eth.ether_type() != MtpEtherType::Control.as_u16() {
        return Vec::new();
    }
    let payload = &frame[mtp_net::eth::HEADER_LEN..];
    match MtpMessage::decode(payload) {
        Ok(message) => switch.dispatch(now_ms, ingress, &message),
        Err(e) => {
            trace!(port = %ingress, error = %e, "dropping malformed control message");
            Vec::new()
        }
    }
}

fn handle_tenant_frame(switch: &mut Switch, frame: &[u8], now_ms: i64) -> Vec<Action> {
    let Ok(eth) = Eth::parse(frame) else {
        trace!("dropping undersized tenant frame");
        return Vec::new();
    };
    if eth.ether_type() != MtpEtherType::TenantIpv4.as_u16() {
        return Vec::new();
    }
    let ipv4 = &frame[mtp_net::eth::HEADER_LEN..];
    switch.forward_tenant_ipv4(now_ms, ipv4)
}

fn live_control_interfaces(node_name: &str) -> Vec<String> {
    let prefix = format!("{node_name}-eth");
    netdev::get_interfaces()
        .into_iter()
        .filter(|i| i.name.starts_with(&prefix) && i.is_up())
        .map(|i| i.name)
        .collect()
}

fn execute(
    switch: &Switch,
    sockets: &mut HashMap<PortId, ControlSocket>,
    compute: Option<&mut ComputeSocket>,
    actions: Vec<Action>,
) {
    let mut compute = compute;
    for action in actions {
        match action {
            Action::SendControl { port, message } => {
                let Some(header) = switch
                    .ports()
                    .lookup(&port)
                    .map(mtp_core::ControlPort::header_template)
                else {
                    warn!(port = %port, "no port state for outgoing action");
                    continue;
                };
                let Some(socket) = sockets.get_mut(&port) else {
                    warn!(port = %port, "no socket open for outgoing action");
                    continue;
                };
                let mut frame = Vec::with_capacity(header.len() + 16);
                frame.extend_from_slice(&header);
                frame.extend_from_slice(&message.encode());
                if let Err(e) = socket.sock.write_all(&frame) {
                    error!(port = %port, "send failed: {e}");
                }
            }
            Action::EmitTenantIpv4 { frame: ipv4 } => {
                let Some(socket) = compute.as_mut() else {
                    warn!("no compute interface to emit tenant frame on");
                    continue;
                };
                let mut frame = Vec::with_capacity(socket.header_template.len() + ipv4.len());
                frame.extend_from_slice(&socket.header_template);
                frame.extend_from_slice(&ipv4);
                if let Err(e) = socket.sock.write_all(&frame) {
                    error!("tenant emit failed: {e}");
                }
            }
        }
    }
}
