//! Network identifier.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::GridError;

/// Names the chain deployment a contract lives on (e.g. `mainnet`, `testnet`).
///
/// Network names are configuration keys, so they are restricted to lower-case
/// ASCII letters, digits, `-` and `_`. The restriction also keeps them safe to
/// embed in storage keys, where a NUL byte separates the network from the rest.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Network(String);

impl Network {
    pub fn parse(raw: &str) -> Result<Self, GridError> {
        let valid = !raw.is_empty()
            && raw.len() <= 64
            && raw
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_');
        if !valid {
            return Err(GridError::BadRequest(format!("invalid network name '{raw}'")));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Network {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Network::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_config_style_names() {
        assert_eq!(Network::parse("testnet").unwrap().as_str(), "testnet");
        assert!(Network::parse("base-sepolia_2").is_ok());
    }

    #[test]
    fn parse_rejects_separators_and_case() {
        assert!(Network::parse("").is_err());
        assert!(Network::parse("Mainnet").is_err());
        assert!(Network::parse("main\0net").is_err());
    }

    #[test]
    fn deserialize_validates() {
        assert!(serde_json::from_str::<Network>("\"testnet\"").is_ok());
        assert!(serde_json::from_str::<Network>("\"Test Net\"").is_err());
    }
}
