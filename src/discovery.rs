//! Discovery beaconing.
//!
//! Each cycle: radio on, a short burst of `Connecting` beacons spaced by the
//! wake time, radio off, then a run of sleep slots. The radio is awake for
//! roughly `wake_time / (wake_time + sleep_slot * sleep_cycles)` of the cycle.
//!
//! The node only hears peers inside the burst's wake window; the radio is off
//! for the sleep run. A complementary peer's beacon heard in proximity ends the
//! phase at once.
use crate::node::{NodeState, Phase};
use crate::neighbour::Upsert;
use crate::packet::{NodeId, PacketKind, PAYLOAD_WORDS};
use crate::platform::{Millis, Platform};

pub async fn run<P: Platform, const N: usize>(state: &mut NodeState<N>, io: &mut P) -> Phase {
    log::info!(
        "Discovering as {} ({} beacons per cycle, {} ms asleep)",
        state.role().as_str(),
        state.config.beacon_burst,
        state.config.sleep_time()
    );

    loop {
        io.on();

        let burst = state.config.beacon_burst;
        for i in 0..burst {
            state.transmit(io, PacketKind::Connecting, None, [0; PAYLOAD_WORDS]);

            // No wait after the last beacon of the burst
            if i + 1 < burst {
                let deadline = io.now() + state.config.wake_time;
                if let Some(peer) = listen(state, io, deadline).await {
                    return Phase::Connecting(peer);
                }
            }
        }

        io.off();

        // At least one slot so a cycle always yields to the scheduler
        for _ in 0..state.config.sleep_cycles.max(1) {
            let deadline = io.now() + state.config.sleep_slot;
            if let Some(peer) = listen(state, io, deadline).await {
                return Phase::Connecting(peer);
            }
        }
    }
}

/// Listen until `deadline`. Returns the peer that should be negotiated with,
/// if its beacon was heard in proximity. Sensor data frames are not beacons.
pub(crate) async fn listen<P: Platform, const N: usize>(
    state: &mut NodeState<N>,
    io: &mut P,
    deadline: Millis,
) -> Option<NodeId> {
    while let Some(inbound) = state.wait_for_frame(io, deadline).await {
        if inbound.packet.kind != PacketKind::Connecting {
            continue;
        }
        match state.observe(io, &inbound) {
            Upsert::Claimed | Upsert::Refreshed => return Some(inbound.packet.src_id),
            Upsert::Evicted | Upsert::Ignored | Upsert::TableFull => {}
        }
    }
    None
}
