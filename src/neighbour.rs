//! Fixed-capacity neighbour table.
//!
//! Slots are an arena of `N` entries indexed `0..N`; `None` marks a free slot.
//! Nothing is ever allocated. A peer enters as `Connecting` the first time it
//! is heard in proximity, is promoted to `Connected` once it has been tracked
//! for the connect period, and is released after the disconnect period
//! without a proximity sighting (or immediately, if it drops out of
//! proximity while still `Connecting`).
//!
//! `NeighbourTable<1>` gives the single-peer behaviour; larger `N` tracks
//! several peers at once.
use heapless::Vec;

use crate::packet::NodeId;
use crate::platform::Millis;

/// Default number of simultaneously tracked peers.
pub const MAX_RECEIVERS: usize = 4;

/// Per-peer connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Not tracked (free slot or unknown peer).
    NotConnected,
    /// Heard in proximity, waiting out the connect period.
    Connecting,
    /// Held proximity for the connect period.
    Connected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::NotConnected => "not_connected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
        }
    }
}

/// One occupied slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbour {
    pub peer: NodeId,
    pub first_detected: Millis,
    /// Last time a frame from this peer passed the proximity gate.
    pub last_seen: Millis,
    pub status: ConnectionStatus,
}

/// Outcome of [`NeighbourTable::upsert_on_proximity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// New peer, slot claimed as `Connecting`.
    Claimed,
    /// Known peer, `last_seen` moved forward.
    Refreshed,
    /// `Connecting` peer fell out of proximity and was released.
    Evicted,
    /// Nothing changed (unknown peer out of range, or a `Connected` peer
    /// heard weakly, which is left to the disconnect period).
    Ignored,
    /// New peer in range but every slot is taken.
    TableFull,
}

/// State change produced by [`NeighbourTable::sweep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    Promoted { peer: NodeId, at: Millis },
    Evicted {
        peer: NodeId,
        /// Status the peer held when it was dropped.
        status: ConnectionStatus,
        last_seen: Millis,
    },
}

/// Table-wide summary used to pick the next protocol phase.
///
/// Precedence: Connected > Connecting > AllEmpty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    AllEmpty,
    AtLeastOneConnecting,
    AtLeastOneConnected,
}

#[derive(Debug, Clone)]
pub struct NeighbourTable<const N: usize = MAX_RECEIVERS> {
    slots: [Option<Neighbour>; N],
}

impl<const N: usize> NeighbourTable<N> {
    pub const fn new() -> Self {
        Self { slots: [None; N] }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Record a frame from `peer` whose proximity test gave `near`.
    pub fn upsert_on_proximity(&mut self, peer: NodeId, near: bool, now: Millis) -> Upsert {
        for slot in self.slots.iter_mut() {
            let Some(entry) = slot.as_mut() else { continue };
            if entry.peer != peer {
                continue;
            }
            if near {
                entry.last_seen = now;
                return Upsert::Refreshed;
            }
            if entry.status == ConnectionStatus::Connecting {
                *slot = None;
                return Upsert::Evicted;
            }
            return Upsert::Ignored;
        }

        if !near {
            return Upsert::Ignored;
        }

        match self.slots.iter_mut().find(|s| s.is_none()) {
            Some(free) => {
                *free = Some(Neighbour {
                    peer,
                    first_detected: now,
                    last_seen: now,
                    status: ConnectionStatus::Connecting,
                });
                Upsert::Claimed
            }
            None => Upsert::TableFull,
        }
    }

    /// Apply the time-based rules to every occupied slot.
    ///
    /// Staleness is checked before promotion, so a peer that has not been
    /// seen for `disconnect_period` is released even if it was due for
    /// promotion.
    pub fn sweep(
        &mut self,
        now: Millis,
        connect_period: Millis,
        disconnect_period: Millis,
    ) -> Vec<Sweep, N> {
        let mut events = Vec::new();

        for slot in self.slots.iter_mut() {
            let Some(entry) = slot.as_mut() else { continue };

            if now.saturating_sub(entry.last_seen) >= disconnect_period {
                let evicted = Sweep::Evicted {
                    peer: entry.peer,
                    status: entry.status,
                    last_seen: entry.last_seen,
                };
                *slot = None;
                // At most one event per slot, so this never overflows
                let _ = events.push(evicted);
            } else if entry.status == ConnectionStatus::Connecting
                && now.saturating_sub(entry.first_detected) >= connect_period
            {
                entry.status = ConnectionStatus::Connected;
                let _ = events.push(Sweep::Promoted { peer: entry.peer, at: now });
            }
        }

        events
    }

    pub fn aggregate(&self) -> Aggregate {
        let mut any_connecting = false;
        for entry in self.iter() {
            match entry.status {
                ConnectionStatus::Connected => return Aggregate::AtLeastOneConnected,
                ConnectionStatus::Connecting => any_connecting = true,
                ConnectionStatus::NotConnected => {}
            }
        }
        if any_connecting {
            Aggregate::AtLeastOneConnecting
        } else {
            Aggregate::AllEmpty
        }
    }

    pub fn get(&self, peer: NodeId) -> Option<&Neighbour> {
        self.iter().find(|n| n.peer == peer)
    }

    pub fn status_of(&self, peer: NodeId) -> ConnectionStatus {
        self.get(peer)
            .map(|n| n.status)
            .unwrap_or(ConnectionStatus::NotConnected)
    }

    pub fn is_connected(&self, peer: NodeId) -> bool {
        self.status_of(peer) == ConnectionStatus::Connected
    }

    pub fn iter(&self) -> impl Iterator<Item = &Neighbour> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    pub fn connected(&self) -> impl Iterator<Item = &Neighbour> {
        self.iter().filter(|n| n.status == ConnectionStatus::Connected)
    }

    /// First peer still negotiating, in slot order.
    pub fn first_connecting(&self) -> Option<NodeId> {
        self.iter()
            .find(|n| n.status == ConnectionStatus::Connecting)
            .map(|n| n.peer)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(|s| s.is_some())
    }

    pub fn clear(&mut self) {
        self.slots = [None; N];
    }
}

impl<const N: usize> Default for NeighbourTable<N> {
    fn default() -> Self {
        Self::new()
    }
}
