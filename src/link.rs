//! RSSI proximity gate.
//!
//! A single threshold decides both "new peer detected" and "peer still
//! nearby". No hysteresis band; flapping is absorbed by the
//! connect/disconnect periods in the neighbour table.

/// Default proximity threshold in dBm, from field heuristics.
pub const RSSI_THRESHOLD: i16 = -70;

/// True iff `rssi` is at or above `threshold`.
#[inline]
pub fn is_in_proximity(rssi: i16, threshold: i16) -> bool {
    rssi >= threshold
}

/// Result of classifying one received frame's signal strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proximity {
    Near,
    Far,
}

impl Proximity {
    pub fn is_near(self) -> bool {
        self == Proximity::Near
    }
}

/// Threshold wrapper carried in the node configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProximityGate {
    pub threshold: i16,
}

impl ProximityGate {
    pub const fn new(threshold: i16) -> Self {
        Self { threshold }
    }

    pub fn classify(&self, rssi: i16) -> Proximity {
        if is_in_proximity(rssi, self.threshold) {
            Proximity::Near
        } else {
            Proximity::Far
        }
    }
}

impl Default for ProximityGate {
    fn default() -> Self {
        Self::new(RSSI_THRESHOLD)
    }
}
