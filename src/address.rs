//! Hardware address type for BLE beacons.
//!
//! This module provides a compact 6-byte address representation used as the
//! registry key, decoupled from any specific Bluetooth library.

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use thiserror::Error;

/// A 48-bit Bluetooth hardware address stored as a compact 6-byte array.
///
/// Implements `Hash`/`Eq` for use as a map key. Two advertisements belong to
/// the same beacon iff their addresses are byte-for-byte equal; no prefix or
/// partial matching is ever applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BeaconAddress(pub [u8; 6]);

impl BeaconAddress {
    /// The raw address bytes.
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for BeaconAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// Errors returned when parsing a beacon address string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseAddressError {
    #[error("invalid address '{0}': expected 12 hex digits or 6 colon-separated pairs")]
    InvalidFormat(String),
    #[error("invalid address: '{0}' is not valid hex")]
    InvalidHex(String),
}

impl FromStr for BeaconAddress {
    type Err = ParseAddressError;

    /// Parses `AA:BB:CC:DD:EE:FF` as well as the bare `aabbccddeeff` form
    /// beacon tooling often prints.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits: String = if s.contains(':') {
            let parts: Vec<&str> = s.split(':').collect();
            if parts.len() != 6 || parts.iter().any(|p| p.len() != 2) {
                return Err(ParseAddressError::InvalidFormat(s.to_string()));
            }
            parts.concat()
        } else {
            s.to_string()
        };

        if digits.len() != 12 {
            return Err(ParseAddressError::InvalidFormat(s.to_string()));
        }

        let mut bytes = [0u8; 6];
        for (i, chunk) in digits.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk)
                .map_err(|_| ParseAddressError::InvalidHex(digits.clone()))?;
            bytes[i] = u8::from_str_radix(pair, 16)
                .map_err(|_| ParseAddressError::InvalidHex(pair.to_string()))?;
        }

        Ok(BeaconAddress(bytes))
    }
}

impl From<[u8; 6]> for BeaconAddress {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

#[cfg(feature = "bluer")]
impl From<bluer::Address> for BeaconAddress {
    fn from(addr: bluer::Address) -> Self {
        Self(addr.0)
    }
}

#[cfg(feature = "bluer")]
impl From<BeaconAddress> for bluer::Address {
    fn from(addr: BeaconAddress) -> Self {
        bluer::Address(addr.0)
    }
}
