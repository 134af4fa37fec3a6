//! Connection negotiation.
//!
//! One `Connecting` probe per connect interval while candidates sit in the
//! table. A candidate is promoted once it has been tracked for the connect
//! period; a single weak frame from it releases it on the spot. There is no
//! error path: a candidate that never confirms simply disappears from the
//! table and the node goes back to discovery.
use crate::node::{NodeState, Phase};
use crate::packet::{NodeId, PacketKind, PAYLOAD_WORDS};
use crate::platform::Platform;

pub async fn run<P: Platform, const N: usize>(
    state: &mut NodeState<N>,
    io: &mut P,
    candidate: NodeId,
) -> Phase {
    io.on();
    log::info!("Try connecting with id {}", candidate);

    loop {
        state.transmit(io, PacketKind::Connecting, None, [0; PAYLOAD_WORDS]);

        let deadline = io.now() + state.config.connect_interval;
        while let Some(inbound) = state.wait_for_frame(io, deadline).await {
            if inbound.packet.kind != PacketKind::Connecting {
                continue;
            }
            state.observe(io, &inbound);
            if state.table.is_empty() {
                io.off();
                return Phase::Discovering;
            }
        }

        state.sweep(io);

        match state.next_phase() {
            Phase::Discovering => {
                io.off();
                return Phase::Discovering;
            }
            Phase::InSession => return Phase::InSession,
            Phase::Connecting(_) => {}
        }
    }
}
