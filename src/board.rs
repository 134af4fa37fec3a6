/// Hardware constants for supported boards.
///
/// Each board module defines the light sensor wiring and radio settings
/// selected at compile time via feature flags.

#[cfg(feature = "board-xiao")]
mod hw {
    pub const LIGHT_SENSOR_PIN: u8 = 1; // A0 on the Grove header
    pub const BOARD_NAME: &str = "xiao_esp32s3";
}

#[cfg(feature = "board-m5stickc")]
mod hw {
    pub const LIGHT_SENSOR_PIN: u8 = 36; // G36 on the top header
    pub const BOARD_NAME: &str = "m5stickc_plus2";
}

#[cfg(not(any(feature = "board-xiao", feature = "board-m5stickc")))]
mod hw {
    pub const LIGHT_SENSOR_PIN: u8 = 1;
    pub const BOARD_NAME: &str = "unknown";
}

pub use hw::*;

/// Wi-Fi channel all nodes share for ESP-NOW.
pub const RADIO_CHANNEL: u8 = 1;

/// Full-scale raw reading of the 12-bit ADC.
pub const ADC_MAX: u32 = 4095;
