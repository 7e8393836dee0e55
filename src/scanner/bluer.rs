//! BlueZ D-Bus backend for beacon scanning.
//!
//! This backend uses the `bluer` crate to communicate with the BlueZ daemon
//! via D-Bus. It requires the `bluetoothd` daemon to be running.

use super::{
    ADVERTISEMENT_CHANNEL_BUFFER_SIZE, AdvertisementResult, MANUFACTURER_DATA_TYPE, ScanError,
    SERVICE_DATA_16_TYPE,
};
use crate::address::BeaconAddress;
use crate::advertisement::{Advertisement, DataSection};
use crate::frame::{EDDYSTONE_SERVICE_UUID, ESTIMOTE_COMPANY_ID, ESTIMOTE_SERVICE_UUID};
use bluer::monitor::{Monitor, MonitorEvent, Pattern};
use bluer::{Adapter, Address, Session, Uuid};
use futures::StreamExt;
use std::time::SystemTime;
use tokio::sync::mpsc;

impl From<bluer::Error> for ScanError {
    fn from(err: bluer::Error) -> Self {
        ScanError::Bluetooth(err.to_string())
    }
}

/// The Bluetooth base UUID with the 16-bit alias bits masked out.
const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_00805F9B34FB;
const BASE_UUID_MASK: u128 = !(0xFFFFu128 << 96);

/// Extract the 16-bit alias from a full 128-bit UUID, if it has one.
fn uuid16(uuid: Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    if value & BASE_UUID_MASK == BASE_UUID {
        Some((value >> 96) as u16)
    } else {
        None
    }
}

/// Advertisement monitor patterns for the recognized beacon protocols:
/// Eddystone and Estimote service data, Estimote manufacturer data.
/// UUIDs and company IDs appear little-endian on the air.
fn beacon_patterns() -> Vec<Pattern> {
    [
        (SERVICE_DATA_16_TYPE, EDDYSTONE_SERVICE_UUID),
        (SERVICE_DATA_16_TYPE, ESTIMOTE_SERVICE_UUID),
        (MANUFACTURER_DATA_TYPE, ESTIMOTE_COMPANY_ID),
    ]
    .into_iter()
    .map(|(data_type, id)| Pattern {
        data_type,
        start_position: 0,
        content: id.to_le_bytes().to_vec(),
    })
    .collect()
}

/// Start scanning for beacon advertisements using the BlueZ D-Bus backend.
///
/// Initializes the Bluetooth adapter and registers an advertisement monitor
/// for the recognized beacon protocols. Discovered advertisements are sent
/// through the returned channel. Runs indefinitely until interrupted.
pub async fn start_scan(verbose: bool) -> Result<mpsc::Receiver<AdvertisementResult>, ScanError> {
    let session = Session::new().await?;
    let adapter = session.default_adapter().await?;
    adapter.set_powered(true).await?;

    let (tx, rx) = mpsc::channel(ADVERTISEMENT_CHANNEL_BUFFER_SIZE);

    let monitor_manager = adapter.monitor().await?;
    let mut monitor_handle = monitor_manager
        .register(Monitor {
            patterns: Some(beacon_patterns()),
            ..Default::default()
        })
        .await?;

    // Spawn a task that owns all Bluetooth state and runs the event loop
    tokio::spawn(async move {
        // Keep all Bluetooth state alive by moving it into this task
        let _session = session;
        let _monitor_manager = monitor_manager;

        while let Some(event) = monitor_handle.next().await {
            if let MonitorEvent::DeviceFound(device_id) = event
                && let Err(e) = process_device(&adapter, device_id.device, &tx).await
                && verbose
            {
                let _ = tx.send(Err(e)).await;
            }
        }
    });

    Ok(rx)
}

/// Read one discovered device's advertisement data and forward it.
///
/// Collects every service data section with a 16-bit UUID alias and every
/// manufacturer data section; devices currently exposing neither are
/// skipped. Classification happens downstream in the registry.
async fn process_device(
    adapter: &Adapter,
    address: Address,
    tx: &mpsc::Sender<AdvertisementResult>,
) -> Result<(), ScanError> {
    let device = adapter.device(address)?;

    let mut sections = Vec::new();

    if let Some(service_data) = device.service_data().await? {
        for (uuid, payload) in service_data {
            if let Some(uuid) = uuid16(uuid) {
                sections.push(DataSection::service_data(uuid, payload));
            }
        }
    }

    if let Some(manufacturer_data) = device.manufacturer_data().await? {
        for (company_id, payload) in manufacturer_data {
            sections.push(DataSection::manufacturer_data(company_id, payload));
        }
    }

    if sections.is_empty() {
        return Ok(());
    }

    let rssi = device.rssi().await?.unwrap_or(0);
    let advertisement = Advertisement::new(
        BeaconAddress::from(address),
        rssi,
        SystemTime::now(),
        sections,
    );
    let _ = tx.send(Ok(advertisement)).await;

    Ok(())
}
