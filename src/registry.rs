//! The beacon registry: dedup by address, reactive expiry, type filtering.
//!
//! Feed every received advertisement to [`BeaconRegistry::receive`]. Known
//! addresses update their beacon in place; unknown addresses first trigger a
//! staleness sweep, then insert a new beacon (subject to the optional type
//! allow-list). All observable effects leave through the [`EventSink`] passed
//! by the caller.
//!
//! The core is single-threaded and callback-driven: `receive` runs to
//! completion with no suspension points, and expiry is evaluated only on the
//! new-address path — never from a background clock. Integrators feeding
//! advertisements from multiple threads must serialize access externally.

use crate::address::BeaconAddress;
use crate::advertisement::Advertisement;
use crate::beacon::{Beacon, BeaconType};
use crate::events::{BeaconEvent, EventSink};
use crate::frame::FrameError;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Default staleness threshold: beacons unseen for longer than this are
/// eligible for removal when a new address arrives.
pub const DEFAULT_STALENESS: Duration = Duration::from_secs(10);

/// Registry tuning knobs.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum elapsed time since last sighting before a beacon is swept,
    /// compared in whole seconds.
    pub staleness: Duration,
    /// Accepted beacon types; `None` accepts everything.
    pub allowed_types: Option<HashSet<BeaconType>>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            staleness: DEFAULT_STALENESS,
            allowed_types: None,
        }
    }
}

impl RegistryConfig {
    fn accepts(&self, beacon_type: BeaconType) -> bool {
        match &self.allowed_types {
            Some(allowed) => allowed.contains(&beacon_type),
            None => true,
        }
    }
}

/// Owns every [`Beacon`], keyed by hardware address — at most one beacon per
/// address at any time.
#[derive(Debug, Default)]
pub struct BeaconRegistry {
    config: RegistryConfig,
    beacons: HashMap<BeaconAddress, Beacon>,
}

impl BeaconRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            beacons: HashMap::new(),
        }
    }

    /// Process one received advertisement.
    ///
    /// Known address: update the beacon and forward its field changes; no
    /// sweep happens on this path, so a registry fed only known addresses
    /// never expires anyone. Unknown address: sweep stale beacons, then
    /// construct, filter and insert the newcomer.
    pub fn receive(
        &mut self,
        advertisement: &Advertisement,
        sink: &mut dyn EventSink,
    ) -> Result<(), FrameError> {
        if let Some(beacon) = self.beacons.get_mut(&advertisement.address) {
            for (kind, change) in beacon.update(advertisement)? {
                sink.emit(BeaconEvent::FieldChanged {
                    address: advertisement.address,
                    kind,
                    change,
                });
            }
            return Ok(());
        }

        self.sweep(advertisement, sink);

        let beacon = Beacon::new(advertisement);
        if !self.config.accepts(beacon.beacon_type()) {
            return Ok(());
        }

        sink.emit(BeaconEvent::Added {
            address: beacon.address(),
            beacon_type: beacon.beacon_type(),
        });
        self.beacons.insert(beacon.address(), beacon);
        Ok(())
    }

    /// Remove every beacon whose last sighting is older than the staleness
    /// threshold, measured against the incoming advertisement's timestamp.
    fn sweep(&mut self, advertisement: &Advertisement, sink: &mut dyn EventSink) {
        let threshold = self.config.staleness.as_secs();
        let now = advertisement.timestamp;
        let mut expired: Vec<BeaconAddress> = self
            .beacons
            .values()
            .filter(|beacon| {
                now.duration_since(beacon.last_seen())
                    .map(|elapsed| elapsed.as_secs() > threshold)
                    .unwrap_or(false)
            })
            .map(|beacon| beacon.address())
            .collect();
        expired.sort();

        for address in expired {
            self.beacons.remove(&address);
            sink.emit(BeaconEvent::Removed { address });
        }
    }

    pub fn get(&self, address: &BeaconAddress) -> Option<&Beacon> {
        self.beacons.get(address)
    }

    pub fn contains(&self, address: &BeaconAddress) -> bool {
        self.beacons.contains_key(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Beacon> {
        self.beacons.values()
    }

    pub fn len(&self) -> usize {
        self.beacons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beacons.is_empty()
    }
}
