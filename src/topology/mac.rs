//! Hardware address value object

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// MAC address parse error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid MAC address '{0}', expected six hex octets separated by ':' or '-'")]
pub struct InvalidMacAddress(pub String);

/// MAC address used as a node identity
///
/// Invariants:
/// - Exactly 6 octets
/// - Canonical representation is lower-case and colon-separated
///
/// Parsing is case-insensitive and accepts either `:` or `-` as separator,
/// so `AA-BB-CC-DD-EE-FF` and `aa:bb:cc:dd:ee:ff` are the same identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// The all-zero address
    pub const ZERO: MacAddress = MacAddress([0; 6]);

    /// Parse a MAC address with validation
    pub fn new(mac: impl AsRef<str>) -> Result<Self, InvalidMacAddress> {
        let raw = mac.as_ref();
        let invalid = || InvalidMacAddress(raw.to_string());
        let trimmed = raw.trim();

        let separator = if trimmed.contains(':') { ':' } else { '-' };
        let mut octets = [0u8; 6];
        let mut count = 0;

        for part in trimmed.split(separator) {
            if count == 6 || part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            octets[count] = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
            count += 1;
        }

        if count != 6 {
            return Err(invalid());
        }

        Ok(Self(octets))
    }

    /// Get the octets
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Canonical form with `-` separators, usable as a hostname
    pub fn to_hostname(&self) -> String {
        self.to_string().replace(':', "-")
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = InvalidMacAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for MacAddress {
    type Error = InvalidMacAddress;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("aa:bb:cc:dd:ee:ff")]
    #[case("AA:BB:CC:DD:EE:FF")]
    #[case("aa-bb-cc-dd-ee-ff")]
    #[case("Aa-bB-cC-Dd-eE-Ff")]
    #[case("  aa:bb:cc:dd:ee:ff\n")]
    fn story_accepted_spellings_normalize_to_canonical(#[case] input: &str) {
        let mac: MacAddress = input.parse().expect("address should parse");
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:ff");
    }

    #[rstest]
    #[case("")]
    #[case("aa:bb:cc:dd:ee")]
    #[case("aa:bb:cc:dd:ee:ff:00")]
    #[case("aabbccddeeff")]
    #[case("aa:bb:cc:dd:ee:gg")]
    #[case("a:bb:cc:dd:ee:ff")]
    #[case("aa:bb-cc:dd:ee:ff")]
    fn story_malformed_addresses_are_rejected(#[case] input: &str) {
        assert!(MacAddress::new(input).is_err());
    }

    #[test]
    fn story_zero_address_displays_as_sentinel_literal() {
        assert_eq!(MacAddress::ZERO.to_string(), "00:00:00:00:00:00");
    }

    #[test]
    fn story_hostname_uses_dashes() {
        let mac = MacAddress::new("00:25:90:C0:F6:EE").unwrap();
        assert_eq!(mac.to_hostname(), "00-25-90-c0-f6-ee");
    }

    #[test]
    fn story_serde_uses_canonical_string() {
        let mac: MacAddress = serde_yaml::from_str("\"AA-BB-CC-DD-EE-01\"").unwrap();
        assert_eq!(mac.octets(), [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]);
        let out = serde_yaml::to_string(&mac).unwrap();
        assert!(out.contains("aa:bb:cc:dd:ee:01"));
    }

    #[test]
    fn story_serde_rejects_invalid_address() {
        let result: Result<MacAddress, _> = serde_yaml::from_str("\"not-a-mac\"");
        assert!(result.is_err());
    }
}
