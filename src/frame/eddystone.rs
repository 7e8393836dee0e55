//! Field extraction for the Eddystone UID, URL and TLM frames.
//!
//! Offsets follow the Google Eddystone frame layouts: every frame starts with
//! a type byte (UID=0x00, URL=0x10, TLM=0x20) followed by fixed-position
//! fields. Extraction assumes the caller has already checked the variant
//! minimum length; header bytes are re-checked only by validity tests so that
//! a frame keeps extracting at its variant's offsets after payload mutation.

use crate::events::{Field, FieldChange, FieldValue};
use std::time::Duration;

/// Eddystone frame type bytes (first payload byte of the service data).
pub const FRAME_TYPE_UID: u8 = 0x00;
pub const FRAME_TYPE_URL: u8 = 0x10;
pub const FRAME_TYPE_TLM: u8 = 0x20;

/// TLM version this codec understands (plain, unencrypted telemetry).
pub const TLM_VERSION: u8 = 0x00;

/// Minimum payload lengths per variant. Shorter payloads decode as Unknown.
pub const UID_MIN_LENGTH: usize = 18;
pub const URL_MIN_LENGTH: usize = 4;
pub const TLM_MIN_LENGTH: usize = 14;

/// URL scheme prefixes selected by the byte at offset 2 of a URL frame.
const URL_SCHEMES: [&str; 4] = ["http://www.", "https://www.", "http://", "https://"];

/// Reserved expansion codes 0x00..=0x0D in the encoded URL remainder.
const URL_EXPANSIONS: [&str; 14] = [
    ".com/", ".org/", ".edu/", ".net/", ".info/", ".biz/", ".gov/", ".com", ".org", ".edu",
    ".net", ".info", ".biz", ".gov",
];

fn push_hex(out: &mut String, bytes: &[u8]) {
    use std::fmt::Write;
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
}

/// Decoded Eddystone UID frame: a 10-byte namespace and 6-byte instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UidFields {
    pub namespace: [u8; 10],
    pub instance: [u8; 6],
}

impl UidFields {
    /// Extract fields from a payload of at least [`UID_MIN_LENGTH`] bytes.
    pub fn parse(payload: &[u8]) -> Self {
        debug_assert!(payload.len() >= UID_MIN_LENGTH);
        let mut namespace = [0u8; 10];
        namespace.copy_from_slice(&payload[2..12]);
        let mut instance = [0u8; 6];
        instance.copy_from_slice(&payload[12..18]);
        Self {
            namespace,
            instance,
        }
    }

    /// Namespace as lowercase hex without separators.
    pub fn namespace_hex(&self) -> String {
        let mut out = String::with_capacity(20);
        push_hex(&mut out, &self.namespace);
        out
    }

    /// Instance as lowercase hex without separators.
    pub fn instance_hex(&self) -> String {
        let mut out = String::with_capacity(12);
        push_hex(&mut out, &self.instance);
        out
    }

    /// Record a change for every field whose value differs in `new`.
    pub fn diff(&self, new: &Self, changes: &mut Vec<FieldChange>) {
        if self.namespace != new.namespace {
            changes.push(FieldChange {
                field: Field::Namespace,
                old: FieldValue::Text(self.namespace_hex()),
                new: FieldValue::Text(new.namespace_hex()),
            });
        }
        if self.instance != new.instance {
            changes.push(FieldChange {
                field: Field::Instance,
                old: FieldValue::Text(self.instance_hex()),
                new: FieldValue::Text(new.instance_hex()),
            });
        }
    }
}

/// Decoded Eddystone URL frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlFields {
    pub url: String,
}

impl UrlFields {
    /// Extract fields from a payload of at least [`URL_MIN_LENGTH`] bytes.
    ///
    /// The scheme byte indexes [`URL_SCHEMES`]; remainder bytes in the
    /// reserved range expand to domain suffixes, printable ASCII passes
    /// through, everything else is dropped.
    pub fn parse(payload: &[u8]) -> Self {
        debug_assert!(payload.len() >= URL_MIN_LENGTH);
        let mut url = String::with_capacity(payload.len() + 12);
        if let Some(scheme) = URL_SCHEMES.get(payload[2] as usize) {
            url.push_str(scheme);
        }
        for &byte in &payload[3..] {
            match byte {
                0x00..=0x0D => url.push_str(URL_EXPANSIONS[byte as usize]),
                0x20..=0x7E => url.push(byte as char),
                _ => {}
            }
        }
        Self { url }
    }

    pub fn diff(&self, new: &Self, changes: &mut Vec<FieldChange>) {
        if self.url != new.url {
            changes.push(FieldChange {
                field: Field::Url,
                old: FieldValue::Text(self.url.clone()),
                new: FieldValue::Text(new.url.clone()),
            });
        }
    }
}

/// Decoded Eddystone TLM frame (unencrypted telemetry).
#[derive(Debug, Clone, PartialEq)]
pub struct TlmFields {
    /// Battery voltage in millivolts.
    pub battery_mv: u16,
    /// Beacon temperature in degrees Celsius (signed 8.8 fixed point).
    pub temperature: f32,
    /// Advertising PDUs sent since power-up.
    pub adv_count: u32,
    /// Time since power-up in 0.1 s units.
    pub uptime_ds: u32,
}

impl TlmFields {
    /// Extract fields from a payload of at least [`TLM_MIN_LENGTH`] bytes.
    pub fn parse(payload: &[u8]) -> Self {
        debug_assert!(payload.len() >= TLM_MIN_LENGTH);
        Self {
            battery_mv: u16::from_be_bytes([payload[2], payload[3]]),
            temperature: f32::from(i16::from_be_bytes([payload[4], payload[5]])) / 256.0,
            adv_count: u32::from_be_bytes([payload[6], payload[7], payload[8], payload[9]]),
            uptime_ds: u32::from_be_bytes([payload[10], payload[11], payload[12], payload[13]]),
        }
    }

    /// Time since power-up.
    pub fn uptime(&self) -> Duration {
        Duration::from_millis(u64::from(self.uptime_ds) * 100)
    }

    pub fn diff(&self, new: &Self, changes: &mut Vec<FieldChange>) {
        if self.battery_mv != new.battery_mv {
            changes.push(FieldChange {
                field: Field::BatteryVoltage,
                old: FieldValue::Unsigned(u64::from(self.battery_mv)),
                new: FieldValue::Unsigned(u64::from(new.battery_mv)),
            });
        }
        if self.temperature != new.temperature {
            changes.push(FieldChange {
                field: Field::Temperature,
                old: FieldValue::Float(f64::from(self.temperature)),
                new: FieldValue::Float(f64::from(new.temperature)),
            });
        }
        if self.adv_count != new.adv_count {
            changes.push(FieldChange {
                field: Field::AdvertisementCount,
                old: FieldValue::Unsigned(u64::from(self.adv_count)),
                new: FieldValue::Unsigned(u64::from(new.adv_count)),
            });
        }
        if self.uptime_ds != new.uptime_ds {
            changes.push(FieldChange {
                field: Field::Uptime,
                old: FieldValue::Unsigned(u64::from(self.uptime_ds)),
                new: FieldValue::Unsigned(u64::from(new.uptime_ds)),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tlm_payload() -> Vec<u8> {
        vec![
            0x20, 0x00, // TLM, version 0
            0x0C, 0x1C, // Battery: 3100 mV
            0x19, 0x40, // Temperature: 25.25 °C
            0x00, 0x00, 0x00, 0x64, // Advertisement count: 100
            0x00, 0x00, 0x27, 0x10, // Uptime: 10000 ds = 1000 s
        ]
    }

    #[test]
    fn tlm_fields() {
        let tlm = TlmFields::parse(&tlm_payload());
        assert_eq!(tlm.battery_mv, 3100);
        assert!((tlm.temperature - 25.25).abs() < f32::EPSILON);
        assert_eq!(tlm.adv_count, 100);
        assert_eq!(tlm.uptime(), Duration::from_secs(1000));
    }

    #[test]
    fn tlm_negative_temperature() {
        let mut payload = tlm_payload();
        payload[4] = 0xFF; // -0.5 °C is 0xFF80 in 8.8 fixed point
        payload[5] = 0x80;
        let tlm = TlmFields::parse(&payload);
        assert!((tlm.temperature - (-0.5)).abs() < f32::EPSILON);
    }

    #[test]
    fn tlm_diff_reports_only_changed_fields() {
        let old = TlmFields::parse(&tlm_payload());
        let mut payload = tlm_payload();
        payload[3] = 0x17; // 3100 -> 3095 mV
        let new = TlmFields::parse(&payload);

        let mut changes = Vec::new();
        old.diff(&new, &mut changes);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, Field::BatteryVoltage);
        assert_eq!(changes[0].old, FieldValue::Unsigned(3100));
        assert_eq!(changes[0].new, FieldValue::Unsigned(3095));
    }

    #[test]
    fn uid_fields() {
        let mut payload = vec![0x00, 0xEB];
        payload.extend_from_slice(&[0x01; 10]);
        payload.extend_from_slice(&[0x02; 6]);
        let uid = UidFields::parse(&payload);
        assert_eq!(uid.namespace, [0x01; 10]);
        assert_eq!(uid.instance, [0x02; 6]);
        assert_eq!(uid.namespace_hex(), "01010101010101010101");
        assert_eq!(uid.instance_hex(), "020202020202");
    }

    #[test]
    fn url_with_literal_characters() {
        let payload = vec![0x10, 0xEB, 0x03, b'g', b'o', b'o', b'.', b'g', b'l'];
        let url = UrlFields::parse(&payload);
        assert_eq!(url.url, "https://goo.gl");
    }

    #[test]
    fn url_with_domain_expansion() {
        let mut payload = vec![0x10, 0xEB, 0x00];
        payload.extend_from_slice(b"example");
        payload.push(0x07); // ".com"
        let url = UrlFields::parse(&payload);
        assert_eq!(url.url, "http://www.example.com");
    }

    #[test]
    fn url_skips_reserved_bytes() {
        let payload = vec![0x10, 0xEB, 0x02, b'a', 0x0E, 0x7F, b'b'];
        let url = UrlFields::parse(&payload);
        assert_eq!(url.url, "http://ab");
    }

    #[test]
    fn url_unknown_scheme_byte_yields_no_prefix() {
        let payload = vec![0x10, 0xEB, 0x04, b'x'];
        let url = UrlFields::parse(&payload);
        assert_eq!(url.url, "x");
    }
}
