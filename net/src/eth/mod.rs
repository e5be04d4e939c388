// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Ethernet II framing for MTP control and tenant data frames.

pub mod mac;

use etherparse::{EtherType, Ethernet2Header};
use mac::{DestinationMac, Mac, SourceMac};

/// The length (in bytes) of an Ethernet II header.
pub const HEADER_LEN: usize = 14;

/// Ethertype carrying MTP control traffic (HelloNR, Join*, keep-alive, floods, data).
pub const MTP_ETHERTYPE: u16 = 0x8850;
/// Ethertype carrying tenant IPv4 traffic exchanged between a leaf and its compute host.
pub const IPV4_ETHERTYPE: u16 = 0x0800;

/// Marker distinguishing the two ethertypes the agent listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MtpEtherType {
    /// `0x8850`
    Control,
    /// `0x0800`
    TenantIpv4,
}

impl MtpEtherType {
    /// Classify a raw ethertype, if it is one this agent cares about.
    #[must_use]
    pub fn classify(raw: u16) -> Option<Self> {
        match raw {
            MTP_ETHERTYPE => Some(Self::Control),
            IPV4_ETHERTYPE => Some(Self::TenantIpv4),
            _ => None,
        }
    }

    /// The wire value for this ethertype.
    #[must_use]
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Control => MTP_ETHERTYPE,
            Self::TenantIpv4 => IPV4_ETHERTYPE,
        }
    }
}

/// An Ethernet II header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eth(Ethernet2Header);

/// Error which may occur while parsing or building an [`Eth`] header.
#[derive(Debug, thiserror::Error)]
pub enum EthError {
    /// The buffer was shorter than [`HEADER_LEN`].
    #[error("buffer too short for an ethernet header: have {have}, need {HEADER_LEN}")]
    TooShort {
        /// Bytes actually available.
        have: usize,
    },
}

impl Eth {
    /// Build a new Ethernet II header.
    #[must_use]
    pub fn new(source: SourceMac, destination: DestinationMac, ether_type: MtpEtherType) -> Eth {
        Eth(Ethernet2Header {
            source: source.inner().0,
            destination: destination.inner().0,
            ether_type: EtherType(ether_type.as_u16()),
        })
    }

    /// Build the standard MTP control-port header template: broadcast destination,
    /// the port's own MAC as source, ethertype [`MTP_ETHERTYPE`].
    ///
    /// Control ports precompute this once at startup so emission on the
    /// hot path is just a slice copy followed by the opcode byte and payload.
    #[must_use]
    pub fn control_template(source: SourceMac) -> Eth {
        Eth::new(
            source,
            DestinationMac::new(Mac::BROADCAST),
            MtpEtherType::Control,
        )
    }

    /// Build the header template used on a leaf's compute-facing port.
    #[must_use]
    pub fn tenant_template(source: SourceMac) -> Eth {
        Eth::new(
            source,
            DestinationMac::new(Mac::BROADCAST),
            MtpEtherType::TenantIpv4,
        )
    }

    /// Source MAC of the header.
    #[must_use]
    pub fn source(&self) -> Mac {
        Mac(self.0.source)
    }

    /// Destination MAC of the header.
    #[must_use]
    pub fn destination(&self) -> Mac {
        Mac(self.0.destination)
    }

    /// Raw ethertype field.
    #[must_use]
    pub fn ether_type(&self) -> u16 {
        self.0.ether_type.0
    }

    /// Parse the first [`HEADER_LEN`] bytes of `buf` as an Ethernet II header.
    pub fn parse(buf: &[u8]) -> Result<Eth, EthError> {
        if buf.len() < HEADER_LEN {
            return Err(EthError::TooShort { have: buf.len() });
        }
        let (inner, _rest) =
            Ethernet2Header::from_slice(buf).map_err(|_| EthError::TooShort { have: buf.len() })?;
        Ok(Eth(inner))
    }

    /// Write the header into the front of `buf`, which must be at least [`HEADER_LEN`] long.
    pub fn write_to(&self, buf: &mut [u8]) -> Result<(), EthError> {
        if buf.len() < HEADER_LEN {
            return Err(EthError::TooShort { have: buf.len() });
        }
        let buf_len = buf.len();
        self.0
            .write_to_slice(buf)
            .map_err(|_| EthError::TooShort { have: buf_len })?;
        Ok(())
    }

    /// Serialize into a fresh 14-byte array, for storing as a port's header template.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        // length checked above, this cannot fail
        let _ = self.write_to(&mut buf);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(b: u8) -> SourceMac {
        SourceMac::new(Mac([b, b, b, b, b, b])).unwrap()
    }

    #[test]
    fn roundtrips_control_header() {
        let eth = Eth::control_template(mac(1));
        let bytes = eth.to_bytes();
        let parsed = Eth::parse(&bytes).unwrap();
        assert_eq!(parsed.destination(), Mac::BROADCAST);
        assert_eq!(parsed.ether_type(), MTP_ETHERTYPE);
    }

    #[test]
    fn rejects_short_buffer() {
        let buf = [0u8; HEADER_LEN - 1];
        assert!(Eth::parse(&buf).is_err());
    }

    #[test]
    fn classifies_known_ethertypes() {
        assert_eq!(MtpEtherType::classify(0x8850), Some(MtpEtherType::Control));
        assert_eq!(
            MtpEtherType::classify(0x0800),
            Some(MtpEtherType::TenantIpv4)
        );
        assert_eq!(MtpEtherType::classify(0x86dd), None);
    }
}
