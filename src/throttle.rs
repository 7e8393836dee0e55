//! Rate limiting for printed beacon update events.
//!
//! TLM and nearable beacons re-advertise several times a second, so a
//! listener printing every field change floods its output. The throttle caps
//! update lines to one per beacon per interval; registry membership events
//! (added/removed) are exempt and handled by the caller.

use crate::address::BeaconAddress;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Per-beacon minimum interval between emitted update events.
///
/// Each address is tracked independently; the first event for an address is
/// always allowed, and an allowed event resets that address's timer.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_emit: HashMap<BeaconAddress, Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Throttle {
            interval,
            last_emit: HashMap::new(),
        }
    }

    /// Whether an event for `address` should be emitted now.
    ///
    /// Returns `true` if the interval has passed since the last emitted
    /// event for this address (or none was ever emitted), and resets the
    /// timer in that case. A suppressed event does not reset the timer.
    pub fn should_emit(&mut self, address: BeaconAddress) -> bool {
        let now = Instant::now();
        match self.last_emit.get(&address) {
            Some(last) if now.duration_since(*last) < self.interval => false,
            _ => {
                self.last_emit.insert(address, now);
                true
            }
        }
    }
}

/// Parse a duration from a human-readable string.
///
/// Supports the suffixes `ms`, `s`, `m` and `h`; a bare number is
/// interpreted as seconds. Used by both `--throttle` and `--expiry`.
pub fn parse_duration(src: &str) -> Result<Duration, String> {
    let src = src.trim();
    if src.is_empty() {
        return Err("empty duration string".to_string());
    }

    let (number, unit_millis) = if let Some(num) = src.strip_suffix("ms") {
        (num, 1)
    } else if let Some(num) = src.strip_suffix('h') {
        (num, 3_600_000)
    } else if let Some(num) = src.strip_suffix('m') {
        (num, 60_000)
    } else if let Some(num) = src.strip_suffix('s') {
        (num, 1000)
    } else {
        (src, 1000)
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration: {}", src))?;
    Ok(Duration::from_millis(value * unit_millis))
}
