//! Binary key layouts.
//!
//! Network-scoped keys are `network_bytes ++ 0x00 ++ suffix`. Network names
//! never contain NUL, so a prefix scan over `network ++ 0x00` returns exactly
//! that network's rows.

use tokengrid_types::Network;

pub(crate) fn network_prefix(network: &Network) -> Vec<u8> {
    let name = network.as_str().as_bytes();
    let mut key = Vec::with_capacity(name.len() + 1 + 8);
    key.extend_from_slice(name);
    key.push(0);
    key
}

/// `network ++ 0x00 ++ id_be`; big-endian keeps prefix scans in id order.
pub(crate) fn network_u64_key(network: &Network, id: u64) -> Vec<u8> {
    let mut key = network_prefix(network);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

pub(crate) fn network_key(network: &Network) -> Vec<u8> {
    network.as_str().as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_does_not_match_longer_network_names() {
        let short = Network::parse("test").unwrap();
        let long = Network::parse("testnet").unwrap();
        assert!(!network_u64_key(&long, 1).starts_with(&network_prefix(&short)));
        assert!(network_u64_key(&short, 1).starts_with(&network_prefix(&short)));
    }

    #[test]
    fn ids_sort_numerically() {
        let n = Network::parse("testnet").unwrap();
        assert!(network_u64_key(&n, 2) < network_u64_key(&n, 256));
    }
}
