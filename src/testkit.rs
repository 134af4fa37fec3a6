//! Deterministic simulated platform for driving phases in tests.
//!
//! Time only moves when a phase waits: `next_event` jumps the clock straight
//! to the next scripted frame or to the deadline, whichever comes first.
use std::boxed::Box;
use std::collections::VecDeque;
use std::vec::Vec;

use crate::packet::{NodeId, Packet, PacketKind, Role, PACKET_LEN};
use crate::platform::{Event, Events, LightSensor, Millis, Radio, ReportSink, RxFrame};
use crate::report::Report;

/// A remote node beaconing `Connecting` frames on a fixed period.
struct Peer {
    id: NodeId,
    role: Role,
    next_at: Millis,
    period: Millis,
    seq: u32,
    /// RSSI at a given time, or `None` while the peer is silent.
    rssi: Box<dyn Fn(Millis) -> Option<i16>>,
}

/// Peer RSSI: strong (-60) before `t`, weak (-80) from then on.
pub fn near_until(t: Millis) -> impl Fn(Millis) -> Option<i16> {
    move |now| Some(if now < t { -60 } else { -80 })
}

pub struct Sim {
    pub now: Millis,
    pub radio_on: bool,
    /// Every broadcast, decoded, with the time it went out.
    pub sent: Vec<(Millis, Packet)>,
    pub reports: Vec<Report>,
    /// Every `on`/`off` call.
    pub radio_log: Vec<(Millis, bool)>,
    /// Light readings handed out in order; `fallback_reading` once drained.
    pub readings: VecDeque<Option<u32>>,
    pub fallback_reading: Option<u32>,
    scripted: VecDeque<(Millis, RxFrame)>,
    peers: Vec<Peer>,
}

impl Sim {
    pub fn new() -> Self {
        Self::at(0)
    }

    pub fn at(now: Millis) -> Self {
        Self {
            now,
            radio_on: false,
            sent: Vec::new(),
            reports: Vec::new(),
            radio_log: Vec::new(),
            readings: VecDeque::new(),
            fallback_reading: None,
            scripted: VecDeque::new(),
            peers: Vec::new(),
        }
    }

    /// Queue one raw frame, delivered at `at` if the radio is on then.
    pub fn schedule(&mut self, at: Millis, bytes: &[u8], rssi: i16) {
        let pos = self.scripted.iter().position(|(t, _)| *t > at).unwrap_or(self.scripted.len());
        self.scripted.insert(pos, (at, RxFrame::new(bytes, rssi)));
    }

    /// Add a peer beaconing at `first_at + k * period`.
    pub fn add_peer(
        &mut self,
        id: NodeId,
        role: Role,
        first_at: Millis,
        period: Millis,
        rssi: impl Fn(Millis) -> Option<i16> + 'static,
    ) {
        self.peers.push(Peer {
            id,
            role,
            next_at: first_at,
            period,
            seq: 0,
            rssi: Box::new(rssi),
        });
    }

    /// Earliest pending peer emission; ties go to the first added peer.
    fn next_peer(&self) -> Option<(usize, Millis)> {
        self.peers
            .iter()
            .enumerate()
            .min_by_key(|(i, p)| (p.next_at, *i))
            .map(|(i, p)| (i, p.next_at))
    }

    /// Pop the next frame due at or before `deadline`, silent beacons skipped.
    fn pop_due(&mut self, deadline: Millis) -> Option<(Millis, RxFrame)> {
        loop {
            let scripted_at = self.scripted.front().map(|(t, _)| *t);
            let peer = self.next_peer();

            let take_scripted = match (scripted_at, peer) {
                (Some(s), Some((_, p))) => s <= p,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => return None,
            };

            if take_scripted {
                let (at, _) = self.scripted.front()?;
                if *at > deadline {
                    return None;
                }
                return self.scripted.pop_front();
            }

            let (idx, at) = peer?;
            if at > deadline {
                return None;
            }
            let p = &mut self.peers[idx];
            p.next_at += p.period;
            let Some(rssi) = (p.rssi)(at) else { continue };
            p.seq = p.seq.wrapping_add(1);
            let mut packet = Packet::new(p.id, p.role, PacketKind::Connecting);
            packet.seq = p.seq;
            packet.timestamp = at as u32;
            return Some((at, RxFrame::new(&packet.encode(), rssi)));
        }
    }
}

impl Default for Sim {
    fn default() -> Self {
        Self::new()
    }
}

impl Radio for Sim {
    fn on(&mut self) {
        self.radio_on = true;
        self.radio_log.push((self.now, true));
    }

    fn off(&mut self) {
        self.radio_on = false;
        self.radio_log.push((self.now, false));
    }

    fn broadcast(&mut self, frame: &[u8; PACKET_LEN]) {
        let packet = Packet::decode(frame).expect("node sent an undecodable frame");
        self.sent.push((self.now, packet));
    }
}

impl Events for Sim {
    fn now(&self) -> Millis {
        self.now
    }

    async fn next_event(&mut self, deadline: Millis) -> Event {
        while let Some((at, frame)) = self.pop_due(deadline) {
            self.now = self.now.max(at);
            if self.radio_on {
                return Event::Frame(frame);
            }
        }
        self.now = self.now.max(deadline);
        Event::Alarm
    }
}

impl LightSensor for Sim {
    fn read(&mut self) -> Option<u32> {
        self.readings.pop_front().unwrap_or(self.fallback_reading)
    }
}

impl ReportSink for Sim {
    fn report(&mut self, report: &Report) {
        self.reports.push(report.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    #[test]
    fn alarm_advances_clock_to_deadline() {
        let mut sim = Sim::new();
        assert_eq!(block_on(sim.next_event(500)), Event::Alarm);
        assert_eq!(sim.now, 500);
    }

    #[test]
    fn frames_while_radio_off_are_lost() {
        let mut sim = Sim::new();
        sim.add_peer(2, Role::Requester, 100, 100, |_| Some(-50));
        assert_eq!(block_on(sim.next_event(250)), Event::Alarm);
        sim.on();
        let Event::Frame(frame) = block_on(sim.next_event(1_000)) else {
            panic!("expected a frame");
        };
        assert_eq!(sim.now, 300);
        assert_eq!(Packet::decode(&frame.data).unwrap().seq, 3);
    }

    #[test]
    fn silent_peer_emits_nothing() {
        let mut sim = Sim::new();
        sim.on();
        sim.add_peer(2, Role::Requester, 100, 100, |t| (t >= 400).then_some(-50));
        assert!(matches!(block_on(sim.next_event(1_000)), Event::Frame(_)));
        assert_eq!(sim.now, 400);
    }
}
