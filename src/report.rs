//! Diagnostic reports emitted by a node.
//!
//! Reports are one-way: the firmware streams them as newline-delimited JSON
//! (NDJSON) over serial, tests collect them. Uses `heapless` buffers for
//! no_std/no-alloc operation.
use heapless::Vec;
use serde::Serialize;

use crate::packet::{NodeId, PAYLOAD_WORDS};
use crate::platform::Millis;

/// Firmware version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized report
pub const MAX_REPORT_LEN: usize = 256;

/// Buffer type for serialized reports
pub type ReportBuffer = Vec<u8, MAX_REPORT_LEN>;

/// Protocol events worth telling the outside world about.
///
/// `ts` is always the reporting node's uptime in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Report {
    /// A complementary peer was heard in proximity for the first time.
    #[serde(rename = "discovered")]
    Discovered {
        peer: NodeId,
        rssi: i16,
        /// Sequence number of the frame that triggered discovery
        seq: u32,
        ts: Millis,
    },
    /// Peer held proximity for the connect period and is now connected.
    #[serde(rename = "detect")]
    Detect { peer: NodeId, ts: Millis },
    /// Candidate dropped before it connected.
    #[serde(rename = "lost")]
    Lost { peer: NodeId, ts: Millis },
    /// Connected peer not seen in proximity for the disconnect period.
    #[serde(rename = "absent")]
    Absent {
        peer: NodeId,
        /// Last time the peer passed the proximity gate
        last_seen: Millis,
        ts: Millis,
    },
    /// Light readings received from a provider.
    #[serde(rename = "light")]
    Light {
        peer: NodeId,
        samples: [u32; PAYLOAD_WORDS],
        ts: Millis,
    },
    /// Emitted on every phase transition.
    #[serde(rename = "status")]
    Status {
        node: NodeId,
        role: &'static str,
        phase: &'static str,
        /// Occupied neighbour slots
        peers: u8,
        connected: u8,
        ts: Millis,
        version: &'static str,
    },
}

/// Serialize a report to JSON bytes followed by the NDJSON newline.
/// Returns the number of bytes written, or None if the line does not fit.
pub fn serialize_report(report: &Report, buf: &mut [u8]) -> Option<usize> {
    let (newline, body) = buf.split_last_mut()?;
    let len = serde_json_core::to_slice(report, body).ok()?;
    if len < body.len() {
        body[len] = b'\n';
    } else {
        *newline = b'\n';
    }
    Some(len + 1)
}

/// Serialize into a fixed-capacity [`ReportBuffer`].
pub fn to_buffer(report: &Report) -> Option<ReportBuffer> {
    let mut buf = ReportBuffer::new();
    buf.resize_default(MAX_REPORT_LEN).ok()?;
    let len = serialize_report(report, &mut buf)?;
    buf.truncate(len);
    Some(buf)
}
