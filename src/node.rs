//! Protocol orchestrator.
//!
//! A node is always in exactly one [`Phase`]. Each phase is an async loop in
//! its own module that returns only when it has decided the next phase;
//! [`Node::step`] runs the active phase and records the transition.
//!
//! ```text
//! Discovering ──peer heard in proximity──▶ Connecting(peer)
//! Connecting  ──table empty──────────────▶ Discovering
//! Connecting  ──a peer connected─────────▶ InSession
//! InSession   ──table empty──────────────▶ Discovering
//! InSession   ──none connected, some
//!               still connecting─────────▶ Connecting(peer)
//! ```
//!
//! All mutable protocol state lives in [`NodeState`], owned by the [`Node`]
//! and lent to one phase at a time. Frames are handled one at a time between
//! waits, so neighbour updates never interleave.
use crate::config::NodeConfig;
use crate::neighbour::{Aggregate, ConnectionStatus, NeighbourTable, Sweep, Upsert, MAX_RECEIVERS};
use crate::packet::{NodeId, Packet, PacketKind, Role, PAYLOAD_WORDS};
use crate::platform::{Event, Events, LightSensor, Millis, Platform, Radio, ReportSink, RxFrame};
use crate::report::{Report, VERSION};
use crate::sensor::SampleRing;
use crate::{discovery, negotiate, session};

/// The phase a node is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Beaconing on a low duty cycle, listening for a complementary peer.
    Discovering,
    /// Negotiating; carries the peer that triggered negotiation.
    Connecting(NodeId),
    /// At least one peer connected; exchanging sensor data.
    InSession,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Discovering => "discovering",
            Phase::Connecting(_) => "connecting",
            Phase::InSession => "in_session",
        }
    }
}

/// A received frame that passed decoding and addressing checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inbound {
    pub packet: Packet,
    pub rssi: i16,
}

/// Everything a node mutates while running the protocol.
#[derive(Debug, Clone)]
pub struct NodeState<const N: usize = MAX_RECEIVERS> {
    pub id: NodeId,
    pub config: NodeConfig,
    pub table: NeighbourTable<N>,
    pub samples: SampleRing,
    seq: u32,
    /// Provider only: when the light sensor is next read.
    next_sample_at: Option<Millis>,
}

impl<const N: usize> NodeState<N> {
    pub fn new(id: NodeId, config: NodeConfig) -> Self {
        Self {
            id,
            config,
            table: NeighbourTable::new(),
            samples: SampleRing::new(),
            seq: 0,
            next_sample_at: None,
        }
    }

    pub fn role(&self) -> Role {
        self.config.role
    }

    /// Sequence number of the last transmitted frame.
    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// Start the sampling schedule (providers only).
    pub fn schedule_sampling(&mut self, now: Millis) {
        if self.role() == Role::Provider {
            self.next_sample_at = Some(now + self.config.sample_period);
        }
    }

    /// Build, encode, and broadcast one frame.
    pub(crate) fn transmit<P: Radio + Events>(
        &mut self,
        io: &mut P,
        kind: PacketKind,
        dest_id: Option<NodeId>,
        data: [u32; PAYLOAD_WORDS],
    ) {
        let now = io.now();
        self.seq = self.seq.wrapping_add(1);
        let packet = Packet {
            src_id: self.id,
            dest_id,
            timestamp: (now & 0xFFFF_FFFF) as u32,
            seq: self.seq,
            role: self.role(),
            kind,
            data,
        };
        log::trace!("Send seq# {} @ {} ms ({:?})", self.seq, now, kind);
        io.broadcast(&packet.encode());
    }

    /// Decode a frame and keep it only if it comes from the complementary
    /// role and is broadcast or addressed to us.
    pub(crate) fn accept(&self, frame: &RxFrame) -> Option<Inbound> {
        let packet = match Packet::decode(&frame.data) {
            Ok(p) => p,
            Err(e) => {
                log::trace!("Dropped frame: {}", e);
                return None;
            }
        };

        if packet.src_id == self.id
            || packet.role != self.role().complement()
            || !packet.is_for(self.id)
        {
            return None;
        }

        Some(Inbound {
            packet,
            rssi: frame.rssi,
        })
    }

    /// Read the light sensor if a sample is due.
    fn service_sampling<P: LightSensor>(&mut self, io: &mut P, now: Millis) {
        let Some(due) = self.next_sample_at else { return };
        if now < due {
            return;
        }
        if !self.samples.record(io.read()) {
            log::debug!("Light sensor read failed, sample skipped");
        }
        self.next_sample_at = Some(now + self.config.sample_period);
    }

    /// Wait until `deadline`, servicing sensor sampling on the way.
    ///
    /// Returns the next accepted frame, or `None` once the deadline passes.
    pub(crate) async fn wait_for_frame<P: Platform>(
        &mut self,
        io: &mut P,
        deadline: Millis,
    ) -> Option<Inbound> {
        loop {
            let alarm = match self.next_sample_at {
                Some(due) if due < deadline => due,
                _ => deadline,
            };

            match io.next_event(alarm).await {
                Event::Alarm => {
                    let now = io.now();
                    self.service_sampling(io, now);
                    if now >= deadline {
                        return None;
                    }
                }
                Event::Frame(frame) => {
                    let now = io.now();
                    self.service_sampling(io, now);
                    if let Some(inbound) = self.accept(&frame) {
                        return Some(inbound);
                    }
                }
            }
        }
    }

    /// Run a frame's proximity result through the neighbour table.
    pub(crate) fn observe<P: Events + ReportSink>(
        &mut self,
        io: &mut P,
        inbound: &Inbound,
    ) -> Upsert {
        let now = io.now();
        let peer = inbound.packet.src_id;
        let near = self.config.gate().classify(inbound.rssi).is_near();

        let outcome = self.table.upsert_on_proximity(peer, near, now);
        match outcome {
            Upsert::Claimed => {
                log::info!(
                    "Received neighbour discovery packet {} with rssi {} from {}",
                    inbound.packet.seq,
                    inbound.rssi,
                    peer
                );
                io.report(&Report::Discovered {
                    peer,
                    rssi: inbound.rssi,
                    seq: inbound.packet.seq,
                    ts: now,
                });
            }
            Upsert::Evicted => {
                log::info!("Lost candidate {} (rssi {})", peer, inbound.rssi);
                io.report(&Report::Lost { peer, ts: now });
            }
            Upsert::TableFull => {
                log::debug!("Neighbour table full, ignoring {}", peer);
            }
            Upsert::Refreshed | Upsert::Ignored => {}
        }
        outcome
    }

    /// Apply connect/disconnect periods and report what changed.
    pub(crate) fn sweep<P: Events + ReportSink>(&mut self, io: &mut P) {
        let now = io.now();
        let events = self
            .table
            .sweep(now, self.config.connect_period, self.config.disconnect_period);

        for event in events {
            match event {
                Sweep::Promoted { peer, at } => {
                    log::info!("{} DETECT {}", at / 1000, peer);
                    io.report(&Report::Detect { peer, ts: at });
                }
                Sweep::Evicted {
                    peer,
                    status: ConnectionStatus::Connected,
                    last_seen,
                } => {
                    log::info!("{} ABSENT {} (last seen {})", now / 1000, peer, last_seen / 1000);
                    io.report(&Report::Absent {
                        peer,
                        last_seen,
                        ts: now,
                    });
                }
                Sweep::Evicted { peer, .. } => {
                    log::info!("Candidate {} went quiet", peer);
                    io.report(&Report::Lost { peer, ts: now });
                }
            }
        }
    }

    /// Phase implied by the table's aggregate state.
    pub fn next_phase(&self) -> Phase {
        match self.table.aggregate() {
            Aggregate::AtLeastOneConnected => Phase::InSession,
            Aggregate::AtLeastOneConnecting => self
                .table
                .first_connecting()
                .map(Phase::Connecting)
                .unwrap_or(Phase::Discovering),
            Aggregate::AllEmpty => Phase::Discovering,
        }
    }

    pub fn status(&self, phase: Phase, now: Millis) -> Report {
        Report::Status {
            node: self.id,
            role: self.role().as_str(),
            phase: phase.as_str(),
            peers: self.table.len() as u8,
            connected: self.table.connected().count() as u8,
            ts: now,
            version: VERSION,
        }
    }
}

/// A node: protocol state, current phase, and the platform it runs on.
pub struct Node<P: Platform, const N: usize = MAX_RECEIVERS> {
    state: NodeState<N>,
    phase: Phase,
    io: P,
}

impl<P: Platform, const N: usize> Node<P, N> {
    pub fn new(id: NodeId, config: NodeConfig, io: P) -> Self {
        let mut state = NodeState::new(id, config);
        state.schedule_sampling(io.now());

        log::info!(
            "Node {} as {}: {} byte frames, {} peer slots, duty cycle {:.3}",
            id,
            config.role.as_str(),
            crate::packet::PACKET_LEN,
            N,
            config.duty_cycle()
        );

        Self {
            state,
            phase: Phase::Discovering,
            io,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &NodeState<N> {
        &self.state
    }

    pub fn platform(&self) -> &P {
        &self.io
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.io
    }

    /// Run the active phase until it transitions. Returns the new phase.
    pub async fn step(&mut self) -> Phase {
        let next = match self.phase {
            Phase::Discovering => discovery::run(&mut self.state, &mut self.io).await,
            Phase::Connecting(peer) => negotiate::run(&mut self.state, &mut self.io, peer).await,
            Phase::InSession => session::run(&mut self.state, &mut self.io).await,
        };

        log::info!("Phase {} -> {}", self.phase.as_str(), next.as_str());
        self.phase = next;

        let status = self.state.status(next, self.io.now());
        self.io.report(&status);
        next
    }

    /// Run forever.
    pub async fn run(&mut self) {
        loop {
            self.step().await;
        }
    }
}
