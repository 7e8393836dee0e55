//! Beacon entity: one record per physical device.
//!
//! A [`Beacon`] aggregates the hardware address, the coarse [`BeaconType`]
//! classification (fixed at construction), last-seen radio metadata, and a
//! [`FrameSet`] holding at most one frame per [`FrameKind`]. Repeated frames
//! of a kind merge into the existing slot so that observers attached to a
//! beacon keep seeing the same record across sightings.

use crate::address::BeaconAddress;
use crate::advertisement::{Advertisement, PayloadSource};
use crate::events::FieldChange;
use crate::frame::{
    BeaconFrame, EDDYSTONE_SERVICE_UUID, ESTIMOTE_COMPANY_ID, ESTIMOTE_SERVICE_UUID, FrameError,
    FrameKind,
};
use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

/// Coarse device classification, derived once from the identifiers present in
/// the first advertisement and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum BeaconType {
    /// Broadcasts Eddystone service data.
    EddystoneBeacon,
    /// Estimote location beacon (Estimote service data).
    EstimoteStone,
    /// Estimote nearable sticker (Estimote manufacturer data).
    EstimoteNearable,
    /// Anything else that advertises data sections.
    Generic,
}

impl BeaconType {
    /// Classify from the identifier set of an advertisement.
    ///
    /// Nearable manufacturer data wins over service data because stickers
    /// may also expose generic service sections.
    pub fn classify(advertisement: &Advertisement) -> BeaconType {
        let mut beacon_type = BeaconType::Generic;
        for section in &advertisement.sections {
            match section.source {
                PayloadSource::ManufacturerData {
                    company_id: ESTIMOTE_COMPANY_ID,
                } => return BeaconType::EstimoteNearable,
                PayloadSource::ServiceData {
                    uuid: ESTIMOTE_SERVICE_UUID,
                } => beacon_type = BeaconType::EstimoteStone,
                PayloadSource::ServiceData {
                    uuid: EDDYSTONE_SERVICE_UUID,
                } if beacon_type == BeaconType::Generic => {
                    beacon_type = BeaconType::EddystoneBeacon;
                }
                _ => {}
            }
        }
        beacon_type
    }
}

impl fmt::Display for BeaconType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BeaconType::EddystoneBeacon => "EddystoneBeacon",
            BeaconType::EstimoteStone => "EstimoteStone",
            BeaconType::EstimoteNearable => "EstimoteNearable",
            BeaconType::Generic => "Generic",
        };
        f.write_str(name)
    }
}

/// Per-beacon frame storage: at most one frame per kind.
///
/// Merging a frame of an already-present kind replaces the stored payload in
/// place and re-parses, so the slot (and anything observing it) survives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSet {
    frames: BTreeMap<FrameKind, BeaconFrame>,
}

impl FrameSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `frame` into the slot of its kind, or insert it into a fresh
    /// slot. Returns the field changes produced by a merge; an insertion
    /// reports none.
    pub fn merge(&mut self, frame: BeaconFrame) -> Result<Vec<FieldChange>, FrameError> {
        match self.frames.get_mut(&frame.kind()) {
            Some(existing) => existing.merge_from(&frame),
            None => {
                self.frames.insert(frame.kind(), frame);
                Ok(Vec::new())
            }
        }
    }

    pub fn get(&self, kind: FrameKind) -> Option<&BeaconFrame> {
        self.frames.get(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = FrameKind> + '_ {
        self.frames.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BeaconFrame> {
        self.frames.values()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// The aggregate record for one physical device.
#[derive(Debug, Clone, PartialEq)]
pub struct Beacon {
    address: BeaconAddress,
    beacon_type: BeaconType,
    last_seen: SystemTime,
    rssi: i16,
    frames: FrameSet,
}

impl Beacon {
    /// Construct from the first advertisement seen for an address:
    /// classifies the type, decodes the initial frames and records radio
    /// metadata.
    pub fn new(advertisement: &Advertisement) -> Self {
        let mut frames = FrameSet::new();
        for section in &advertisement.sections {
            let frame = BeaconFrame::decode(&section.payload, section.source);
            // Fresh set: every kind lands in a new slot, merge cannot fail
            let _ = frames.merge(frame);
        }
        Self {
            address: advertisement.address,
            beacon_type: BeaconType::classify(advertisement),
            last_seen: advertisement.timestamp,
            rssi: advertisement.rssi,
            frames,
        }
    }

    pub fn address(&self) -> BeaconAddress {
        self.address
    }

    pub fn beacon_type(&self) -> BeaconType {
        self.beacon_type
    }

    pub fn last_seen(&self) -> SystemTime {
        self.last_seen
    }

    pub fn rssi(&self) -> i16 {
        self.rssi
    }

    pub fn frames(&self) -> &FrameSet {
        &self.frames
    }

    /// Exact address equality; beacons never match on partial addresses.
    pub fn matches_address(&self, advertisement: &Advertisement) -> bool {
        self.address == advertisement.address
    }

    /// Fold a new advertisement into this beacon: refresh timestamp and RSSI
    /// unconditionally, then decode every data section and merge each frame
    /// into the slot of its kind. The beacon type never changes after
    /// construction. Returns the field changes per frame kind.
    pub fn update(
        &mut self,
        advertisement: &Advertisement,
    ) -> Result<Vec<(FrameKind, FieldChange)>, FrameError> {
        self.last_seen = advertisement.timestamp;
        self.rssi = advertisement.rssi;

        let mut changes = Vec::new();
        for section in &advertisement.sections {
            let frame = BeaconFrame::decode(&section.payload, section.source);
            let kind = frame.kind();
            for change in self.frames.merge(frame)? {
                changes.push((kind, change));
            }
        }
        Ok(changes)
    }
}
