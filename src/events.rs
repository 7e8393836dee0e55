//! Change notifications emitted by the beacon registry.
//!
//! The registry never owns an event bus. Callers pass an [`EventSink`] into
//! [`crate::registry::BeaconRegistry::receive`] and get back typed events:
//! beacon insertions, expiry removals, and per-field value transitions. This
//! lets an observer react to a specific change ("this beacon started moving")
//! instead of re-reading the whole registry on every advertisement.

use crate::address::BeaconAddress;
use crate::beacon::BeaconType;
use crate::frame::FrameKind;
use std::fmt;

/// A decoded frame field that can change between sightings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    // Eddystone UID
    Namespace,
    Instance,
    // Eddystone URL
    Url,
    // Eddystone TLM / Nearable telemetry
    BatteryVoltage,
    Temperature,
    AdvertisementCount,
    Uptime,
    // Nearable telemetry
    Identifier,
    Moving,
    AccelerationX,
    AccelerationY,
    AccelerationZ,
    CurrentMotionDuration,
    PreviousMotionDuration,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Namespace => "namespace",
            Field::Instance => "instance",
            Field::Url => "url",
            Field::BatteryVoltage => "battery-voltage",
            Field::Temperature => "temperature",
            Field::AdvertisementCount => "advertisement-count",
            Field::Uptime => "uptime",
            Field::Identifier => "identifier",
            Field::Moving => "moving",
            Field::AccelerationX => "acceleration-x",
            Field::AccelerationY => "acceleration-y",
            Field::AccelerationZ => "acceleration-z",
            Field::CurrentMotionDuration => "current-motion-duration",
            Field::PreviousMotionDuration => "previous-motion-duration",
        };
        f.write_str(name)
    }
}

/// A field value in change notifications.
///
/// Values compare by content; a change event is only produced when old and
/// new differ under this equality.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Unsigned(u64),
    Float(f64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::Unsigned(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Text(v) => write!(f, "{v}"),
        }
    }
}

/// One field-level transition observed while re-parsing a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: Field,
    pub old: FieldValue,
    pub new: FieldValue,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.old, self.new)
    }
}

/// Registry-level notification.
#[derive(Debug, Clone, PartialEq)]
pub enum BeaconEvent {
    /// A previously unseen beacon was accepted into the registry.
    Added {
        address: BeaconAddress,
        beacon_type: BeaconType,
    },
    /// A beacon exceeded the staleness threshold and was removed.
    Removed { address: BeaconAddress },
    /// A field of one of the beacon's frames changed value.
    FieldChanged {
        address: BeaconAddress,
        kind: FrameKind,
        change: FieldChange,
    },
}

impl BeaconEvent {
    /// The beacon this event concerns.
    pub fn address(&self) -> BeaconAddress {
        match self {
            BeaconEvent::Added { address, .. }
            | BeaconEvent::Removed { address }
            | BeaconEvent::FieldChanged { address, .. } => *address,
        }
    }

    /// Event text without the address label, for callers that substitute
    /// their own device names.
    pub fn details(&self) -> EventDetails<'_> {
        EventDetails(self)
    }
}

/// Displays the part of an event line after the address label.
pub struct EventDetails<'a>(&'a BeaconEvent);

impl fmt::Display for EventDetails<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            BeaconEvent::Added { beacon_type, .. } => {
                write!(f, "added type={beacon_type}")
            }
            BeaconEvent::Removed { .. } => f.write_str("removed"),
            BeaconEvent::FieldChanged { kind, change, .. } => {
                write!(f, "{kind} {change}")
            }
        }
    }
}

impl fmt::Display for BeaconEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.address(), self.details())
    }
}

/// Receiver for registry notifications.
///
/// Implemented by `Vec<BeaconEvent>` for tests; applications typically wrap
/// their output writer in a small sink struct (see `app::LineSink`).
pub trait EventSink {
    fn emit(&mut self, event: BeaconEvent);
}

impl EventSink for Vec<BeaconEvent> {
    fn emit(&mut self, event: BeaconEvent) {
        self.push(event);
    }
}
