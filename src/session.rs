//! Session exchange with connected peers.
//!
//! Every connect interval the node broadcasts a heartbeat and re-sweeps the
//! table. Requesters also ask for light data every sampling period; providers
//! answer each request from a connected peer with their last ten readings,
//! addressed back to the requester.
//!
//! A connected peer that goes unheard (in proximity) for the disconnect
//! period is reported absent and dropped; it has to come back through
//! discovery.
use crate::node::{Inbound, NodeState, Phase};
use crate::packet::{PacketKind, Role, PAYLOAD_WORDS};
use crate::platform::{Millis, Platform};
use crate::report::Report;

pub async fn run<P: Platform, const N: usize>(state: &mut NodeState<N>, io: &mut P) -> Phase {
    io.on();
    for peer in state.table.connected() {
        log::info!("In session with {} as {}", peer.peer, state.role().as_str());
    }

    let mut next_request: Millis = io.now();

    loop {
        if state.role() == Role::Requester && io.now() >= next_request {
            state.transmit(io, PacketKind::SensorData, None, [0; PAYLOAD_WORDS]);
            next_request = io.now() + state.config.sampling_rate;
        }

        state.transmit(io, PacketKind::Connecting, None, [0; PAYLOAD_WORDS]);

        let deadline = io.now() + state.config.connect_interval;
        while let Some(inbound) = state.wait_for_frame(io, deadline).await {
            handle_frame(state, io, &inbound);
        }

        state.sweep(io);

        match state.next_phase() {
            Phase::InSession => {}
            Phase::Discovering => {
                io.off();
                return Phase::Discovering;
            }
            next @ Phase::Connecting(_) => return next,
        }
    }
}

fn handle_frame<P: Platform, const N: usize>(
    state: &mut NodeState<N>,
    io: &mut P,
    inbound: &Inbound,
) {
    let peer = inbound.packet.src_id;

    match inbound.packet.kind {
        PacketKind::Connecting => {
            state.observe(io, inbound);
        }
        PacketKind::SensorData => {
            if !state.table.is_connected(peer) {
                log::debug!("Sensor data from unconnected {}, ignored", peer);
                return;
            }
            match state.role() {
                Role::Provider => {
                    let samples = state.samples.snapshot();
                    state.transmit(io, PacketKind::SensorData, Some(peer), samples);
                }
                Role::Requester => {
                    let samples = inbound.packet.data;
                    log::info!("Light from {}: {:?}", peer, samples);
                    io.report(&Report::Light {
                        peer,
                        samples,
                        ts: io.now(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::packet::{NodeId, Packet};
    use crate::testkit::{near_until, Sim};
    use embassy_futures::block_on;

    /// State with `peer` already connected at `now`.
    fn connected(id: NodeId, config: NodeConfig, peer: NodeId, now: Millis) -> NodeState<4> {
        let mut state = NodeState::new(id, config);
        state.table.upsert_on_proximity(peer, true, now - config.connect_period);
        state.table.upsert_on_proximity(peer, true, now);
        state
            .table
            .sweep(now, config.connect_period, config.disconnect_period);
        assert!(state.table.is_connected(peer));
        state
    }

    #[test]
    fn lone_peer_leaving_ends_session() {
        let mut sim = Sim::at(20_000);
        sim.add_peer(2, Role::Requester, 20_500, 1_000, near_until(25_000));
        let mut state = connected(1, NodeConfig::provider(), 2, 20_000);

        assert_eq!(block_on(run(&mut state, &mut sim)), Phase::Discovering);
        assert!(state.table.is_empty());
        assert!(!sim.radio_on);
        // Last proximity sighting at 24.5 s, dropped 30 s later
        assert_eq!(sim.now, 55_000);
        assert!(sim.reports.contains(&Report::Absent {
            peer: 2,
            last_seen: 24_500,
            ts: 55_000,
        }));
    }

    #[test]
    fn peer_is_not_dropped_before_disconnect_period() {
        let mut sim = Sim::at(20_000);
        sim.add_peer(2, Role::Requester, 20_500, 1_000, near_until(25_000));
        let mut state = connected(1, NodeConfig::provider(), 2, 20_000);

        block_on(run(&mut state, &mut sim));

        // Heartbeats went out every second until the drop
        let heartbeats = sim
            .sent
            .iter()
            .filter(|(t, p)| p.kind == PacketKind::Connecting && *t < 54_500)
            .count();
        assert_eq!(heartbeats, 35);
    }

    #[test]
    fn provider_answers_request_from_connected_peer() {
        let mut sim = Sim::at(20_000);
        sim.add_peer(2, Role::Requester, 20_500, 1_000, near_until(22_000));
        let request = Packet::new(2, Role::Requester, PacketKind::SensorData);
        sim.schedule(21_200, &request.encode(), -90);
        let mut state = connected(1, NodeConfig::provider(), 2, 20_000);
        state.samples.push(111);
        state.samples.push(222);

        block_on(run(&mut state, &mut sim));

        let (at, reply) = sim
            .sent
            .iter()
            .copied()
            .find(|(_, p)| p.kind == PacketKind::SensorData)
            .unwrap();
        assert_eq!(at, 21_200);
        assert_eq!(reply.dest_id, Some(2));
        assert_eq!(&reply.data[..3], &[111, 222, 0]);
    }

    #[test]
    fn provider_ignores_request_from_stranger() {
        let mut sim = Sim::at(20_000);
        sim.add_peer(2, Role::Requester, 20_500, 1_000, near_until(22_000));
        let request = Packet::new(9, Role::Requester, PacketKind::SensorData);
        sim.schedule(21_200, &request.encode(), -40);
        let mut state = connected(1, NodeConfig::provider(), 2, 20_000);

        block_on(run(&mut state, &mut sim));

        assert!(sim.sent.iter().all(|(_, p)| p.kind == PacketKind::Connecting));
    }

    #[test]
    fn requester_asks_on_entry_and_every_sampling_period() {
        let mut sim = Sim::at(20_000);
        sim.add_peer(1, Role::Provider, 20_500, 1_000, near_until(60_000));
        let mut state = connected(2, NodeConfig::requester(), 1, 20_000);

        block_on(run(&mut state, &mut sim));

        let requests: std::vec::Vec<Millis> = sim
            .sent
            .iter()
            .filter(|(_, p)| p.kind == PacketKind::SensorData)
            .map(|(t, _)| *t)
            .collect();
        assert_eq!(&requests[..3], &[20_000, 50_000, 80_000]);
    }

    #[test]
    fn requester_reports_light_reply() {
        let mut sim = Sim::at(20_000);
        sim.add_peer(1, Role::Provider, 20_500, 1_000, near_until(22_000));
        let mut reply = Packet::new(1, Role::Provider, PacketKind::SensorData);
        reply.dest_id = Some(2);
        reply.data = [5, 6, 7, 8, 9, 10, 11, 12, 13, 14];
        sim.schedule(20_300, &reply.encode(), -70);
        let mut state = connected(2, NodeConfig::requester(), 1, 20_000);

        block_on(run(&mut state, &mut sim));

        assert!(sim.reports.contains(&Report::Light {
            peer: 1,
            samples: [5, 6, 7, 8, 9, 10, 11, 12, 13, 14],
            ts: 20_300,
        }));
    }

    #[test]
    fn requester_ignores_reply_meant_for_another_requester() {
        let mut sim = Sim::at(20_000);
        sim.add_peer(1, Role::Provider, 20_500, 1_000, near_until(22_000));
        let mut reply = Packet::new(1, Role::Provider, PacketKind::SensorData);
        reply.dest_id = Some(99);
        sim.schedule(20_300, &reply.encode(), -70);
        let mut state = connected(2, NodeConfig::requester(), 1, 20_000);

        block_on(run(&mut state, &mut sim));

        assert!(!sim.reports.iter().any(|r| matches!(r, Report::Light { .. })));
    }

    #[test]
    fn newcomer_during_session_does_not_end_it() {
        let mut sim = Sim::at(20_000);
        sim.add_peer(2, Role::Requester, 20_500, 1_000, near_until(40_000));
        sim.add_peer(3, Role::Requester, 25_100, 1_000, near_until(45_000));
        let mut state = connected(1, NodeConfig::provider(), 2, 20_000);

        // Peer 3 is promoted on the 41 s sweep; both are dropped on the first
        // sweep 30 s after their last strong frame
        assert_eq!(block_on(run(&mut state, &mut sim)), Phase::Discovering);
        assert!(sim.reports.contains(&Report::Detect { peer: 3, ts: 41_000 }));
        assert!(sim.reports.contains(&Report::Absent {
            peer: 2,
            last_seen: 39_500,
            ts: 70_000,
        }));
        assert!(sim.reports.contains(&Report::Absent {
            peer: 3,
            last_seen: 44_100,
            ts: 75_000,
        }));
    }
}
