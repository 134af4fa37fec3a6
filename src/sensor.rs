//! Rolling window of light-sensor readings.
use crate::packet::PAYLOAD_WORDS;

/// Circular buffer of the last [`PAYLOAD_WORDS`] readings.
///
/// Starts zero-filled; a zero in a reply means the window has not filled yet.
/// Readings are stored in slot order, not time order, and are shipped as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRing {
    samples: [u32; PAYLOAD_WORDS],
    next: usize,
    total: u32,
}

impl SampleRing {
    pub const fn new() -> Self {
        Self {
            samples: [0; PAYLOAD_WORDS],
            next: 0,
            total: 0,
        }
    }

    pub fn push(&mut self, value: u32) {
        self.samples[self.next] = value;
        self.next = (self.next + 1) % PAYLOAD_WORDS;
        self.total = self.total.saturating_add(1);
    }

    /// Store a reading if there is one. Driver errors are skipped.
    pub fn record(&mut self, reading: Option<u32>) -> bool {
        match reading {
            Some(value) => {
                self.push(value);
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> [u32; PAYLOAD_WORDS] {
        self.samples
    }

    /// Readings stored since boot.
    pub fn total(&self) -> u32 {
        self.total
    }
}

impl Default for SampleRing {
    fn default() -> Self {
        Self::new()
    }
}
