//! Seams to the platform collaborators: radio, clock/alarm, light sensor,
//! and the diagnostic report sink.
//!
//! The protocol core never touches hardware directly. The firmware binary
//! implements these traits over ESP-NOW, `embassy-time`, and the ADC; tests
//! implement them with a deterministic simulated clock.
use heapless::Vec;

use crate::packet::PACKET_LEN;
use crate::report::Report;

/// Platform uptime in milliseconds.
pub type Millis = u64;

/// Largest frame the platform will hand up. Anything longer is truncated by
/// the platform and then rejected by the codec on length.
pub const MAX_FRAME_LEN: usize = 250;

/// A frame as delivered by the radio, with the RSSI measured for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxFrame {
    pub data: Vec<u8, MAX_FRAME_LEN>,
    /// Received signal strength in dBm.
    pub rssi: i16,
}

impl RxFrame {
    /// Copy `bytes` into a frame, truncating at [`MAX_FRAME_LEN`].
    pub fn new(bytes: &[u8], rssi: i16) -> Self {
        let len = bytes.len().min(MAX_FRAME_LEN);
        let mut data = Vec::new();
        let _ = data.extend_from_slice(&bytes[..len]);
        Self { data, rssi }
    }
}

/// What woke the active phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The requested deadline passed.
    Alarm,
    /// A frame arrived before the deadline.
    Frame(RxFrame),
}

/// Radio power and transmit control. Only the active phase calls these.
pub trait Radio {
    /// Power the radio up. Idempotent.
    fn on(&mut self);
    /// Power the radio down. Idempotent. Frames are not delivered while off.
    fn off(&mut self);
    /// Best-effort, unacknowledged broadcast of one frame.
    fn broadcast(&mut self, frame: &[u8; PACKET_LEN]);
}

/// Monotonic clock plus the single one-shot alarm.
///
/// Each call to `next_event` replaces the previous deadline. A frame event is
/// handled to completion by the caller before it asks for the next event.
#[allow(async_fn_in_trait)]
pub trait Events {
    fn now(&self) -> Millis;

    /// Suspend until `deadline` or until a frame arrives, whichever is first.
    async fn next_event(&mut self, deadline: Millis) -> Event;
}

/// Light sensor driver.
pub trait LightSensor {
    /// One reading, or `None` if the driver signalled an error.
    fn read(&mut self) -> Option<u32>;
}

/// One-way diagnostic output. Nothing read back from here affects control flow.
pub trait ReportSink {
    fn report(&mut self, report: &Report);
}

/// Everything a node needs from its platform.
pub trait Platform: Radio + Events + LightSensor + ReportSink {}

impl<T: Radio + Events + LightSensor + ReportSink> Platform for T {}
