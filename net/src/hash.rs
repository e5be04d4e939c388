// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Jenkins one-at-a-time hash, used to select among eligible offered ports for
//! ECMP forwarding.
//!
//! This is intentionally not [`std::hash::Hash`]/`ahash`-backed: the hash value
//! must be identical across every switch in the fabric regardless of build, so
//! a fixed, specified algorithm is used rather than a randomized one.

/// Compute the Jenkins one-at-a-time hash of `key`.
#[must_use]
pub fn jenkins_one_at_a_time(key: &[u8]) -> u32 {
    let mut hash: u32 = 0;
    for &byte in key {
        hash = hash.wrapping_add(u32::from(byte));
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash = hash.wrapping_add(hash << 15);
    hash
}

/// Hash `key` and reduce it modulo `eligible_count`, selecting an index into an
/// ordered list of eligible ports.
///
/// Returns `None` when there are no eligible ports to select among.
#[must_use]
pub fn ecmp_index(key: &[u8], eligible_count: usize) -> Option<usize> {
    if eligible_count == 0 {
        return None;
    }
    let hash = jenkins_one_at_a_time(key);
    Some(hash as usize % eligible_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic() {
        let key = [0u8, 4, 0, 2];
        assert_eq!(jenkins_one_at_a_time(&key), jenkins_one_at_a_time(&key));
    }

    #[test]
    fn differs_across_keys_generally() {
        let a = jenkins_one_at_a_time(&[0, 4, 0, 2]);
        let b = jenkins_one_at_a_time(&[0, 4, 0, 3]);
        assert_ne!(a, b);
    }

    #[test]
    fn single_eligible_port_always_selected() {
        assert_eq!(ecmp_index(&[0, 4, 0, 2], 1), Some(0));
    }

    #[test]
    fn no_eligible_ports_returns_none() {
        assert_eq!(ecmp_index(&[0, 4, 0, 2], 0), None);
    }
}
