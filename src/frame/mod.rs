//! Frame codec: classify raw advertisement payloads into typed beacon frames.
//!
//! A [`BeaconFrame`] owns the raw payload bytes of one advertisement data
//! section plus the fields decoded from them. The payload is the single
//! source of truth; decoded fields can always be re-derived by running
//! [`BeaconFrame::reparse`], which also reports which individual fields
//! changed value. Payloads that match no recognized header, or fall short of
//! their variant's minimum length, become [`FrameKind::Unknown`] — a valid
//! terminal classification, never an error.

pub mod eddystone;
pub mod nearable;

use crate::advertisement::PayloadSource;
use crate::events::FieldChange;
use self::eddystone::{TlmFields, UidFields, UrlFields};
use self::nearable::NearableFields;
use std::fmt;
use thiserror::Error;

/// Eddystone service data UUID (Google).
pub const EDDYSTONE_SERVICE_UUID: u16 = 0xFEAA;

/// Estimote service data UUID, broadcast by Estimote location beacons.
pub const ESTIMOTE_SERVICE_UUID: u16 = 0xFE9A;

/// Estimote's Bluetooth SIG company identifier, used by nearable stickers.
pub const ESTIMOTE_COMPANY_ID: u16 = 0x015D;

/// Discriminant for the recognized frame variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FrameKind {
    Unknown,
    EddystoneUid,
    EddystoneUrl,
    EddystoneTlm,
    NearableTelemetry,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameKind::Unknown => "unknown",
            FrameKind::EddystoneUid => "eddystone-uid",
            FrameKind::EddystoneUrl => "eddystone-url",
            FrameKind::EddystoneTlm => "eddystone-tlm",
            FrameKind::NearableTelemetry => "nearable-telemetry",
        };
        f.write_str(name)
    }
}

/// Programming-contract violations of the frame API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Attempted to merge a frame of a different kind into this one.
    #[error("cannot merge {actual} frame into {expected} frame")]
    KindMismatch {
        expected: FrameKind,
        actual: FrameKind,
    },
}

/// Decoded fields, tagged by variant.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameFields {
    Unknown,
    EddystoneUid(UidFields),
    EddystoneUrl(UrlFields),
    EddystoneTlm(TlmFields),
    NearableTelemetry(NearableFields),
}

impl FrameFields {
    fn kind(&self) -> FrameKind {
        match self {
            FrameFields::Unknown => FrameKind::Unknown,
            FrameFields::EddystoneUid(_) => FrameKind::EddystoneUid,
            FrameFields::EddystoneUrl(_) => FrameKind::EddystoneUrl,
            FrameFields::EddystoneTlm(_) => FrameKind::EddystoneTlm,
            FrameFields::NearableTelemetry(_) => FrameKind::NearableTelemetry,
        }
    }

    /// Re-derive fields of the same variant from `payload`.
    ///
    /// Field extraction does not re-check header bytes, so a frame whose
    /// payload was mutated keeps its variant and re-extracts at the same
    /// offsets; structural validity is a separate question answered by
    /// [`BeaconFrame::is_valid`].
    fn derive(kind: FrameKind, payload: &[u8]) -> FrameFields {
        match kind {
            FrameKind::Unknown => FrameFields::Unknown,
            FrameKind::EddystoneUid => FrameFields::EddystoneUid(UidFields::parse(payload)),
            FrameKind::EddystoneUrl => FrameFields::EddystoneUrl(UrlFields::parse(payload)),
            FrameKind::EddystoneTlm => FrameFields::EddystoneTlm(TlmFields::parse(payload)),
            FrameKind::NearableTelemetry => {
                FrameFields::NearableTelemetry(NearableFields::parse(payload))
            }
        }
    }

    fn diff(&self, new: &FrameFields, changes: &mut Vec<FieldChange>) {
        match (self, new) {
            (FrameFields::EddystoneUid(old), FrameFields::EddystoneUid(new)) => {
                old.diff(new, changes)
            }
            (FrameFields::EddystoneUrl(old), FrameFields::EddystoneUrl(new)) => {
                old.diff(new, changes)
            }
            (FrameFields::EddystoneTlm(old), FrameFields::EddystoneTlm(new)) => {
                old.diff(new, changes)
            }
            (FrameFields::NearableTelemetry(old), FrameFields::NearableTelemetry(new)) => {
                old.diff(new, changes)
            }
            _ => {}
        }
    }
}

/// Classify a payload by its source identifier and header byte.
fn classify(payload: &[u8], source: PayloadSource) -> FrameKind {
    match source {
        PayloadSource::ServiceData { uuid: EDDYSTONE_SERVICE_UUID } => {
            match payload.first() {
                Some(&eddystone::FRAME_TYPE_UID) if payload.len() >= eddystone::UID_MIN_LENGTH => {
                    FrameKind::EddystoneUid
                }
                Some(&eddystone::FRAME_TYPE_URL) if payload.len() >= eddystone::URL_MIN_LENGTH => {
                    FrameKind::EddystoneUrl
                }
                Some(&eddystone::FRAME_TYPE_TLM)
                    if payload.len() >= eddystone::TLM_MIN_LENGTH
                        && payload[1] == eddystone::TLM_VERSION =>
                {
                    FrameKind::EddystoneTlm
                }
                _ => FrameKind::Unknown,
            }
        }
        PayloadSource::ManufacturerData { company_id: ESTIMOTE_COMPANY_ID }
            if payload.first() == Some(&nearable::NEARABLE_PROTOCOL_BYTE)
                && payload.len() >= nearable::NEARABLE_MIN_LENGTH =>
        {
            FrameKind::NearableTelemetry
        }
        _ => FrameKind::Unknown,
    }
}

/// A typed beacon frame: raw payload plus the fields decoded from it.
#[derive(Debug, Clone, PartialEq)]
pub struct BeaconFrame {
    payload: Vec<u8>,
    fields: FrameFields,
}

impl BeaconFrame {
    /// Decode one advertisement data section.
    ///
    /// `source` is the decoding hint: which service UUID or manufacturer
    /// company ID the payload was found under. Unrecognized or too-short
    /// payloads yield an Unknown frame.
    pub fn decode(payload: &[u8], source: PayloadSource) -> Self {
        let kind = classify(payload, source);
        Self {
            fields: FrameFields::derive(kind, payload),
            payload: payload.to_vec(),
        }
    }

    pub fn kind(&self) -> FrameKind {
        self.fields.kind()
    }

    pub fn fields(&self) -> &FrameFields {
        &self.fields
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Mutable access to the payload bytes, for callers that patch bytes in
    /// place and then call [`reparse`](Self::reparse). The length is fixed so
    /// the variant's offsets stay reachable.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }

    /// Structural validity: the payload meets the variant's minimum length
    /// and carries the expected header bytes. Unknown frames are never valid.
    pub fn is_valid(&self) -> bool {
        let p = &self.payload;
        match self.kind() {
            FrameKind::Unknown => false,
            FrameKind::EddystoneUid => {
                p.len() >= eddystone::UID_MIN_LENGTH && p[0] == eddystone::FRAME_TYPE_UID
            }
            FrameKind::EddystoneUrl => {
                p.len() >= eddystone::URL_MIN_LENGTH && p[0] == eddystone::FRAME_TYPE_URL
            }
            FrameKind::EddystoneTlm => {
                p.len() >= eddystone::TLM_MIN_LENGTH
                    && p[0] == eddystone::FRAME_TYPE_TLM
                    && p[1] == eddystone::TLM_VERSION
            }
            FrameKind::NearableTelemetry => {
                p.len() >= nearable::NEARABLE_MIN_LENGTH
                    && p[0] == nearable::NEARABLE_PROTOCOL_BYTE
            }
        }
    }

    /// Re-derive every field from the current payload, returning one change
    /// per field whose value differs from what was stored.
    pub fn reparse(&mut self) -> Vec<FieldChange> {
        let new = FrameFields::derive(self.kind(), &self.payload);
        let mut changes = Vec::new();
        self.fields.diff(&new, &mut changes);
        self.fields = new;
        changes
    }

    /// Replace this frame's payload with `other`'s and re-parse, keeping the
    /// frame's identity (and therefore any observer attachment to its slot).
    ///
    /// Merging frames of different kinds is a caller bug and is reported
    /// rather than ignored.
    pub fn merge_from(&mut self, other: &BeaconFrame) -> Result<Vec<FieldChange>, FrameError> {
        if self.kind() != other.kind() {
            return Err(FrameError::KindMismatch {
                expected: self.kind(),
                actual: other.kind(),
            });
        }
        self.payload.clear();
        self.payload.extend_from_slice(&other.payload);
        Ok(self.reparse())
    }

    /// Decoded TLM fields, if this is a TLM frame.
    pub fn as_tlm(&self) -> Option<&TlmFields> {
        match &self.fields {
            FrameFields::EddystoneTlm(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_uid(&self) -> Option<&UidFields> {
        match &self.fields {
            FrameFields::EddystoneUid(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_url(&self) -> Option<&UrlFields> {
        match &self.fields {
            FrameFields::EddystoneUrl(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_nearable(&self) -> Option<&NearableFields> {
        match &self.fields {
            FrameFields::NearableTelemetry(fields) => Some(fields),
            _ => None,
        }
    }
}
