// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Mac address type and logic.

use arrayvec::ArrayVec;
use std::fmt::Display;

/// A [MAC Address] type.
///
/// `Mac` is a transparent wrapper around `[u8; 6]` which provides a
/// small collection of methods and type safety.
///
/// [MAC Address]: https://en.wikipedia.org/wiki/MAC_address
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mac(pub [u8; 6]);

impl From<[u8; 6]> for Mac {
    fn from(value: [u8; 6]) -> Self {
        Mac(value)
    }
}

impl From<Mac> for [u8; 6] {
    fn from(value: Mac) -> Self {
        value.0
    }
}

impl AsRef<[u8; 6]> for Mac {
    fn as_ref(&self) -> &[u8; 6] {
        &self.0
    }
}

/// Errors which can occur while converting a string to a [`Mac`]
#[derive(Debug, thiserror::Error)]
pub enum MacFromStringError {
    /// Invalid string representation of mac address
    #[error("invalid string representation of mac address: {0}")]
    Invalid(String),
}

impl TryFrom<&str> for Mac {
    type Error = MacFromStringError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        const MAX_OCTETS: usize = 6;
        let octets_parsed = value.split(':').try_fold(
            ArrayVec::<_, MAX_OCTETS>::new(),
            |mut acc, octet_str| {
                if octet_str.len() != 2 || octet_str.chars().any(|c| !c.is_ascii_hexdigit()) {
                    return Err(MacFromStringError::Invalid(value.to_string()));
                }
                let parsed = u8::from_str_radix(octet_str, 16)
                    .map_err(|_| MacFromStringError::Invalid(value.to_string()))?;
                acc.try_push(parsed)
                    .map_err(|_| MacFromStringError::Invalid(value.to_string()))?;
                Ok(acc)
            },
        )?;

        let octets = match octets_parsed.as_slice() {
            [o0, o1, o2, o3, o4, o5] => [*o0, *o1, *o2, *o3, *o4, *o5],
            _ => return Err(MacFromStringError::Invalid(value.to_string())),
        };

        Ok(Mac(octets))
    }
}

impl Display for Mac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl Mac {
    /// The broadcast `Mac`. MTP uses this as the destination for every control and
    /// tenant data frame it emits; there is no ARP learning in this protocol.
    pub const BROADCAST: Mac = Mac([u8::MAX; 6]);
    /// The zero `Mac`, illegal as a source.
    pub const ZERO: Mac = Mac([0; 6]);

    /// Returns true iff the binary representation of the [`Mac`] is exclusively ones.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self == &Mac::BROADCAST
    }

    /// Returns true iff the binary representation of the [`Mac`] is exclusively zeros.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self == &Mac::ZERO
    }
}

/// A source MAC, guaranteed non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceMac(Mac);

/// A destination MAC; MTP only ever uses [`Mac::BROADCAST`] but the newtype keeps
/// the header builder symmetric with [`SourceMac`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DestinationMac(Mac);

/// Error constructing a [`SourceMac`]
#[derive(Debug, thiserror::Error)]
#[error("source mac may not be the zero address")]
pub struct SourceMacAddressError;

impl SourceMac {
    /// Build a [`SourceMac`], rejecting the all-zero address.
    pub fn new(mac: Mac) -> Result<Self, SourceMacAddressError> {
        if mac.is_zero() {
            return Err(SourceMacAddressError);
        }
        Ok(SourceMac(mac))
    }

    /// The wrapped [`Mac`].
    #[must_use]
    pub fn inner(&self) -> Mac {
        self.0
    }
}

impl DestinationMac {
    /// Build a [`DestinationMac`].
    #[must_use]
    pub fn new(mac: Mac) -> Self {
        DestinationMac(mac)
    }

    /// The wrapped [`Mac`].
    #[must_use]
    pub fn inner(&self) -> Mac {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_colon_hex() {
        let mac = Mac::try_from("aa:bb:cc:dd:ee:ff").unwrap();
        assert_eq!(mac, Mac([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]));
    }

    #[test]
    fn rejects_short_octet() {
        assert!(Mac::try_from("a:bb:cc:dd:ee:ff").is_err());
    }

    #[test]
    fn rejects_zero_source() {
        assert!(SourceMac::new(Mac::ZERO).is_err());
    }

    #[test]
    fn display_matches_colon_hex() {
        let mac = Mac([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:ff");
    }
}
