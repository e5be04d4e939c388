// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The MTP Virtual ID: a dot-separated path from a root leaf down through the
//! spines that have extended it.

use std::fmt::Display;

/// Maximum encoded length of a [`Vid`], including separators, as a printable string.
pub const VID_LEN: usize = 32;

/// A dotted-decimal Virtual ID, e.g. `7`, `7.2`, `7.2.4`.
///
/// Equality and ordering are lexical over the component list, matching the
/// string-equality semantics used for table lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Vid(Vec<u16>);

/// Error constructing a [`Vid`] from its wire string form.
#[derive(Debug, thiserror::Error)]
pub enum VidParseError {
    /// The string was empty or exceeded [`VID_LEN`].
    #[error("vid string {0:?} has invalid length")]
    InvalidLength(String),
    /// A dot-separated component was not a valid `u16`.
    #[error("vid string {0:?} contains a non-numeric component")]
    NotNumeric(String),
}

impl Vid {
    /// Build a root [`Vid`] from a single component, as derived by a leaf from the
    /// third octet of its compute interface's IPv4 address.
    #[must_use]
    pub fn root(component: u16) -> Self {
        Vid(vec![component])
    }

    /// Append a component, as performed by a relaying switch when extending a VID
    /// downward with the egress port number.
    #[must_use]
    pub fn extend(&self, component: u16) -> Self {
        let mut components = self.0.clone();
        components.push(component);
        Vid(components)
    }

    /// The number of dot-separated components.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// The first (root) component, identifying the originating leaf independent
    /// of any downward extension applied along the way.
    #[must_use]
    pub fn root_component(&self) -> u16 {
        self.0[0]
    }

    /// True if `self` is `other` with zero or more components appended.
    #[must_use]
    pub fn is_descendant_of(&self, other: &Vid) -> bool {
        self.0.len() >= other.0.len() && self.0[..other.0.len()] == other.0[..]
    }
}

impl Display for Vid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, component) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{component}")?;
        }
        Ok(())
    }
}

impl TryFrom<&str> for Vid {
    type Error = VidParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.is_empty() || value.len() > VID_LEN {
            return Err(VidParseError::InvalidLength(value.to_string()));
        }
        let components = value
            .split('.')
            .map(|part| {
                part.parse::<u16>()
                    .map_err(|_| VidParseError::NotNumeric(value.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if components.is_empty() {
            return Err(VidParseError::InvalidLength(value.to_string()));
        }
        Ok(Vid(components))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_round_trip() {
        let vid = Vid::try_from("7.2.4").unwrap();
        assert_eq!(vid.to_string(), "7.2.4");
        assert_eq!(vid.depth(), 3);
    }

    #[test]
    fn extend_appends_component() {
        let vid = Vid::root(7);
        let extended = vid.extend(2);
        assert_eq!(extended.to_string(), "7.2");
    }

    #[test]
    fn rejects_empty_and_non_numeric() {
        assert!(Vid::try_from("").is_err());
        assert!(Vid::try_from("7.x").is_err());
    }

    #[test]
    fn descendant_check_is_prefix_based() {
        let root = Vid::try_from("7").unwrap();
        let child = Vid::try_from("7.2").unwrap();
        let other = Vid::try_from("9").unwrap();
        assert!(child.is_descendant_of(&root));
        assert!(!other.is_descendant_of(&root));
        assert!(root.is_descendant_of(&root));
    }

    #[test]
    fn lexical_ordering_matches_component_order() {
        let a = Vid::try_from("7.1").unwrap();
        let b = Vid::try_from("7.2").unwrap();
        assert!(a < b);
    }
}
