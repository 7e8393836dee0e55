//! Hardware address aliasing for beacon event lines.
//!
//! Maps beacon addresses to human-readable names so that event output reads
//! `Kitchen added type=EddystoneBeacon` instead of a bare address.

use crate::address::BeaconAddress;
use std::collections::BTreeMap;

/// Mapping from beacon address to display name.
pub type AliasMap = BTreeMap<BeaconAddress, String>;

/// A parsed alias mapping an address to a human-readable name.
#[derive(Debug, Clone)]
pub struct Alias {
    pub address: BeaconAddress,
    pub name: String,
}

/// Parse an alias from a string in the format "ADDRESS=NAME".
///
/// The address accepts both `AA:BB:CC:DD:EE:FF` and bare `aabbccddeeff`
/// forms and is validated at parse time, so a typo fails the CLI invocation
/// instead of silently never matching.
pub fn parse_alias(src: &str) -> Result<Alias, String> {
    let (address, name) = src
        .split_once('=')
        .ok_or_else(|| "invalid alias: expected format ADDRESS=NAME".to_string())?;
    let address = address
        .parse::<BeaconAddress>()
        .map_err(|e| e.to_string())?;
    Ok(Alias {
        address,
        name: name.to_string(),
    })
}

/// Convert parsed aliases into a lookup map.
pub fn to_map(aliases: &[Alias]) -> AliasMap {
    aliases
        .iter()
        .map(|a| (a.address, a.name.clone()))
        .collect()
}

/// The display name for an address: its alias, or the address itself.
pub fn resolve_name(address: &BeaconAddress, aliases: &AliasMap) -> String {
    aliases
        .get(address)
        .cloned()
        .unwrap_or_else(|| address.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_alias_valid() {
        let alias = parse_alias("AA:BB:CC:DD:EE:FF=Kitchen").unwrap();
        assert_eq!(
            alias.address,
            BeaconAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF])
        );
        assert_eq!(alias.name, "Kitchen");
    }

    #[test]
    fn parse_alias_bare_hex_address() {
        let alias = parse_alias("60202cd8293b=Sticker").unwrap();
        assert_eq!(
            alias.address,
            BeaconAddress([0x60, 0x20, 0x2C, 0xD8, 0x29, 0x3B])
        );
    }

    #[test]
    fn parse_alias_with_spaces_in_name() {
        let alias = parse_alias("AA:BB:CC:DD:EE:FF=Living Room").unwrap();
        assert_eq!(alias.name, "Living Room");
    }

    #[test]
    fn parse_alias_rejects_missing_equals() {
        assert!(parse_alias("no-equals-sign").is_err());
    }

    #[test]
    fn parse_alias_rejects_bad_address() {
        assert!(parse_alias("not-an-address=Name").is_err());
    }

    #[test]
    fn resolve_name_falls_back_to_address() {
        let aliases = to_map(&[Alias {
            address: BeaconAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]),
            name: "Kitchen".to_string(),
        }]);

        let known = BeaconAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(resolve_name(&known, &aliases), "Kitchen");

        let unknown = BeaconAddress([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert_eq!(resolve_name(&unknown, &aliases), "11:22:33:44:55:66");
    }
}
