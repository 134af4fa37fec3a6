//! Protocol tunables.
//!
//! Every node in a deployment must agree on the RSSI threshold and the
//! connect/disconnect periods; the beacon schedule may differ per role.
//! Defaults come from field runs on battery-powered nodes.
use crate::link::{ProximityGate, RSSI_THRESHOLD};
use crate::packet::Role;
use crate::platform::Millis;

/// Time a candidate must stay in proximity before it counts as connected.
pub const CONNECT_PERIOD_MS: Millis = 15_000;

/// Spacing of negotiation probes and session heartbeats.
pub const CONNECT_INTERVAL_MS: Millis = 1_000;

/// Time without a proximity sighting after which a peer is dropped.
pub const DISCONNECT_PERIOD_MS: Millis = 30_000;

/// How often a requester asks its providers for light readings.
pub const SAMPLING_RATE_MS: Millis = 30_000;

/// How often a provider samples its light sensor. Ten samples span one
/// request period.
pub const SAMPLE_PERIOD_MS: Millis = SAMPLING_RATE_MS / 10;

/// Beacons sent per discovery wake-up.
pub const BEACON_BURST: u8 = 2;

/// Gap between beacons within one burst (20 Hz).
pub const WAKE_TIME_MS: Millis = 50;

/// Length of one sleep slot. Kept short so a slot never overflows the timer.
pub const SLEEP_SLOT_MS: Millis = 50;

/// Sleep slots per discovery cycle for a provider.
pub const PROVIDER_SLEEP_CYCLES: u8 = 16;

/// Sleep slots per discovery cycle for a requester.
pub const REQUESTER_SLEEP_CYCLES: u8 = 10;

/// Runtime protocol configuration for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeConfig {
    pub role: Role,
    /// Minimum RSSI (dBm) for a frame to count as "in proximity".
    pub rssi_threshold: i16,
    pub connect_period: Millis,
    pub connect_interval: Millis,
    pub disconnect_period: Millis,
    /// Requester: period between light-data requests.
    pub sampling_rate: Millis,
    /// Provider: period between light sensor reads.
    pub sample_period: Millis,
    pub beacon_burst: u8,
    pub wake_time: Millis,
    pub sleep_slot: Millis,
    pub sleep_cycles: u8,
}

impl NodeConfig {
    pub const fn new(role: Role) -> Self {
        Self {
            role,
            rssi_threshold: RSSI_THRESHOLD,
            connect_period: CONNECT_PERIOD_MS,
            connect_interval: CONNECT_INTERVAL_MS,
            disconnect_period: DISCONNECT_PERIOD_MS,
            sampling_rate: SAMPLING_RATE_MS,
            sample_period: SAMPLE_PERIOD_MS,
            beacon_burst: BEACON_BURST,
            wake_time: WAKE_TIME_MS,
            sleep_slot: SLEEP_SLOT_MS,
            sleep_cycles: match role {
                Role::Provider => PROVIDER_SLEEP_CYCLES,
                Role::Requester => REQUESTER_SLEEP_CYCLES,
            },
        }
    }

    pub const fn provider() -> Self {
        Self::new(Role::Provider)
    }

    pub const fn requester() -> Self {
        Self::new(Role::Requester)
    }

    pub fn gate(&self) -> ProximityGate {
        ProximityGate::new(self.rssi_threshold)
    }

    /// Total sleep time per discovery cycle.
    pub fn sleep_time(&self) -> Millis {
        self.sleep_slot * self.sleep_cycles as Millis
    }

    /// Fraction of a discovery cycle the radio is awake:
    /// `wake_time / (wake_time + sleep_slot * sleep_cycles)`.
    pub fn duty_cycle(&self) -> f32 {
        let wake = self.wake_time as f32;
        let total = wake + self.sleep_time() as f32;
        if total == 0.0 {
            return 0.0;
        }
        wake / total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_constants() {
        let c = NodeConfig::requester();
        assert_eq!(c.rssi_threshold, -70);
        assert_eq!(c.connect_period, 15_000);
        assert_eq!(c.connect_interval, 1_000);
        assert_eq!(c.disconnect_period, 30_000);
        assert_eq!(c.sampling_rate, 30_000);
        assert_eq!(c.sample_period, 3_000);
        assert_eq!(c.beacon_burst, 2);
    }

    #[test]
    fn roles_get_their_own_sleep_schedule() {
        assert_eq!(NodeConfig::provider().sleep_cycles, 16);
        assert_eq!(NodeConfig::requester().sleep_cycles, 10);
        assert_eq!(NodeConfig::provider().role, Role::Provider);
    }

    #[test]
    fn duty_cycle_provider() {
        // 50 / (50 + 50 * 16) = 1/17
        let dc = NodeConfig::provider().duty_cycle();
        assert!((dc - 1.0 / 17.0).abs() < 1e-6, "got {dc}");
    }

    #[test]
    fn duty_cycle_requester() {
        // 50 / (50 + 50 * 10) = 1/11
        let dc = NodeConfig::requester().duty_cycle();
        assert!((dc - 1.0 / 11.0).abs() < 1e-6, "got {dc}");
    }

    #[test]
    fn duty_cycle_without_sleep_is_one() {
        let mut c = NodeConfig::provider();
        c.sleep_cycles = 0;
        assert_eq!(c.duty_cycle(), 1.0);
    }

    #[test]
    fn gate_uses_threshold() {
        let mut c = NodeConfig::provider();
        c.rssi_threshold = -55;
        assert_eq!(c.gate().threshold, -55);
    }
}
