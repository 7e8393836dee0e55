use crate::address::BeaconAddress;
use crate::advertisement::{Advertisement, DataSection};
use std::time::SystemTime;

/// A stable hardware address for unit tests.
pub const TEST_ADDRESS: BeaconAddress = BeaconAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// Minimal valid Eddystone TLM payload (14 bytes).
pub fn tlm_payload() -> Vec<u8> {
    vec![
        0x20, 0x00, // TLM, version 0
        0x0C, 0x1C, // Battery: 3100 mV
        0x19, 0x40, // Temperature: 25.25 °C
        0x00, 0x00, 0x00, 0x64, // Advertisement count: 100
        0x00, 0x00, 0x27, 0x10, // Uptime: 10000 ds
    ]
}

/// Minimal valid Eddystone UID payload (18 bytes).
pub fn uid_payload() -> Vec<u8> {
    let mut payload = vec![0x00, 0xEB];
    payload.extend_from_slice(&[0x01; 10]); // Namespace
    payload.extend_from_slice(&[0x02; 6]); // Instance
    payload
}

/// Minimal valid Eddystone URL payload (4 bytes, "http://www.x").
pub fn url_payload() -> Vec<u8> {
    vec![0x10, 0xEB, 0x00, b'x']
}

/// Minimal valid nearable telemetry payload (19 bytes) with the given
/// status byte (bit 6 is the motion flag).
pub fn nearable_payload(status: u8) -> Vec<u8> {
    vec![
        0x01, // Nearable protocol
        0xD8, 0x29, 0x3B, 0x01, 0x02, 0x03, 0x04, 0x05, // Identifier
        0x0B, 0xB8, // Battery: 3000 mV
        0x84, 0x01, // Temperature: 24.25 °C
        status, // Status byte
        0x10, 0xF0, 0x40, // X/Y/Z acceleration
        0x05, // Current motion state: 5 s
        0x42, // Previous motion state: 2 min
    ]
}

/// Build an advertisement with explicit timestamp and sections.
pub fn advertisement_at(
    address: BeaconAddress,
    timestamp: SystemTime,
    sections: Vec<DataSection>,
) -> Advertisement {
    Advertisement::new(address, -60, timestamp, sections)
}

/// Advertisement carrying one Eddystone service data section.
pub fn eddystone_advertisement(address: BeaconAddress, payload: Vec<u8>) -> Advertisement {
    advertisement_at(
        address,
        SystemTime::UNIX_EPOCH,
        vec![DataSection::service_data(0xFEAA, payload)],
    )
}

/// Advertisement carrying one nearable manufacturer data section.
pub fn nearable_advertisement(address: BeaconAddress, payload: Vec<u8>) -> Advertisement {
    advertisement_at(
        address,
        SystemTime::UNIX_EPOCH,
        vec![DataSection::manufacturer_data(0x015D, payload)],
    )
}
