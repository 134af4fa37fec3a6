//! Fixed-layout binary codec for discovery and sensor-data frames.
//!
//! Every frame on the air is exactly [`PACKET_LEN`] bytes, little-endian:
//!
//! ```text
//! 0   src_id      u32
//! 4   dest_id     u32   (BROADCAST_ID = no destination)
//! 8   timestamp   u32   (sender uptime ms, truncated)
//! 12  seq         u32
//! 16  role        u8
//! 17  kind        u8
//! 18  reserved    [u8; 2]
//! 20  data        [u32; 10]
//! ```
//!
//! All nodes in a deployment share this layout. Anything that does not decode
//! cleanly is dropped by the caller without touching neighbour state.

use thiserror::Error;

/// Opaque per-device identity.
pub type NodeId = u32;

/// Reserved id meaning "no destination" on the wire.
pub const BROADCAST_ID: NodeId = u32::MAX;

/// Number of payload words carried by every frame.
pub const PAYLOAD_WORDS: usize = 10;

/// Exact encoded size of a [`Packet`].
pub const PACKET_LEN: usize = 20 + PAYLOAD_WORDS * 4;

/// Which side of a sensing link a node plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Asks for light readings.
    Requester,
    /// Samples the light sensor and answers requests.
    Provider,
}

impl Role {
    /// The role a node must hear from to pair with this one.
    pub const fn complement(self) -> Self {
        match self {
            Role::Requester => Role::Provider,
            Role::Provider => Role::Requester,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Requester => "requester",
            Role::Provider => "provider",
        }
    }

    const fn to_byte(self) -> u8 {
        match self {
            Role::Requester => 0,
            Role::Provider => 1,
        }
    }

    fn from_byte(b: u8) -> Result<Self, DecodeError> {
        match b {
            0 => Ok(Role::Requester),
            1 => Ok(Role::Provider),
            other => Err(DecodeError::UnknownRole(other)),
        }
    }
}

/// Frame kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Beacon, negotiation probe, or session heartbeat.
    Connecting,
    /// Light-sample request (requester) or reply (provider).
    SensorData,
}

impl PacketKind {
    const fn to_byte(self) -> u8 {
        match self {
            PacketKind::Connecting => 0,
            PacketKind::SensorData => 1,
        }
    }

    fn from_byte(b: u8) -> Result<Self, DecodeError> {
        match b {
            0 => Ok(PacketKind::Connecting),
            1 => Ok(PacketKind::SensorData),
            other => Err(DecodeError::UnknownKind(other)),
        }
    }
}

/// Reasons a received frame is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("frame is {actual} bytes, expected {expected}")]
    Length { expected: usize, actual: usize },
    #[error("unknown role byte {0}")]
    UnknownRole(u8),
    #[error("unknown kind byte {0}")]
    UnknownKind(u8),
}

/// A decoded discovery or data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub src_id: NodeId,
    /// `None` for broadcast frames (beacons, heartbeats, requests).
    pub dest_id: Option<NodeId>,
    /// Sender uptime in milliseconds, truncated to 32 bits. Diagnostic only.
    pub timestamp: u32,
    pub seq: u32,
    pub role: Role,
    pub kind: PacketKind,
    pub data: [u32; PAYLOAD_WORDS],
}

impl Packet {
    /// A broadcast frame with an empty payload.
    pub const fn new(src_id: NodeId, role: Role, kind: PacketKind) -> Self {
        Self {
            src_id,
            dest_id: None,
            timestamp: 0,
            seq: 0,
            role,
            kind,
            data: [0; PAYLOAD_WORDS],
        }
    }

    /// True if this frame is broadcast or addressed to `id`.
    pub fn is_for(&self, id: NodeId) -> bool {
        match self.dest_id {
            None => true,
            Some(dest) => dest == id,
        }
    }

    pub fn encode(&self) -> [u8; PACKET_LEN] {
        let mut buf = [0u8; PACKET_LEN];
        buf[0..4].copy_from_slice(&self.src_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.dest_id.unwrap_or(BROADCAST_ID).to_le_bytes());
        buf[8..12].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[12..16].copy_from_slice(&self.seq.to_le_bytes());
        buf[16] = self.role.to_byte();
        buf[17] = self.kind.to_byte();
        // 18..20 reserved, left zero
        for (i, word) in self.data.iter().enumerate() {
            let off = 20 + i * 4;
            buf[off..off + 4].copy_from_slice(&word.to_le_bytes());
        }
        buf
    }

    /// Decode a received frame. The length must match [`PACKET_LEN`] exactly.
    pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        if frame.len() != PACKET_LEN {
            return Err(DecodeError::Length {
                expected: PACKET_LEN,
                actual: frame.len(),
            });
        }

        let word = |off: usize| {
            u32::from_le_bytes([frame[off], frame[off + 1], frame[off + 2], frame[off + 3]])
        };

        let role = Role::from_byte(frame[16])?;
        let kind = PacketKind::from_byte(frame[17])?;
        let dest = word(4);

        let mut data = [0u32; PAYLOAD_WORDS];
        for (i, slot) in data.iter_mut().enumerate() {
            *slot = word(20 + i * 4);
        }

        Ok(Self {
            src_id: word(0),
            dest_id: if dest == BROADCAST_ID { None } else { Some(dest) },
            timestamp: word(8),
            seq: word(12),
            role,
            kind,
            data,
        })
    }
}
