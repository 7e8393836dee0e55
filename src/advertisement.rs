//! Raw BLE advertisement data as delivered by a scanner backend.

use crate::address::BeaconAddress;
use std::time::SystemTime;

/// Identifies which advertisement data section a payload came from.
///
/// Service data sections carry a 16-bit service UUID, manufacturer data
/// sections a Bluetooth SIG company identifier. The codec uses this as the
/// decoding hint: the same bytes mean different things under different
/// identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    /// Service data section (AD type 0x16) with its 16-bit service UUID.
    ServiceData { uuid: u16 },
    /// Manufacturer-specific data section (AD type 0xFF) with its company ID.
    ManufacturerData { company_id: u16 },
}

/// One data section of an advertisement: the identifying source plus the raw
/// payload bytes (identifier prefix already stripped).
#[derive(Debug, Clone, PartialEq)]
pub struct DataSection {
    pub source: PayloadSource,
    pub payload: Vec<u8>,
}

impl DataSection {
    pub fn service_data(uuid: u16, payload: Vec<u8>) -> Self {
        Self {
            source: PayloadSource::ServiceData { uuid },
            payload,
        }
    }

    pub fn manufacturer_data(company_id: u16, payload: Vec<u8>) -> Self {
        Self {
            source: PayloadSource::ManufacturerData { company_id },
            payload,
        }
    }
}

/// A single received BLE advertisement.
///
/// Immutable input supplied once per scanner callback: radio metadata plus
/// zero or more data sections. The timestamp is assigned by the scanner at
/// receive time and drives the registry's staleness math, so it must come
/// from a clock that supports subtraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Advertisement {
    /// Hardware address of the sending device.
    pub address: BeaconAddress,
    /// Received signal strength in dBm.
    pub rssi: i16,
    /// When the advertisement was received.
    pub timestamp: SystemTime,
    /// Service-data and manufacturer-data sections found in the packet.
    pub sections: Vec<DataSection>,
}

impl Advertisement {
    pub fn new(
        address: BeaconAddress,
        rssi: i16,
        timestamp: SystemTime,
        sections: Vec<DataSection>,
    ) -> Self {
        Self {
            address,
            rssi,
            timestamp,
            sections,
        }
    }
}
