//! GPIO / peripheral pin assignments for the tempnode board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// User button (active-high, internal pull-down)
// ---------------------------------------------------------------------------

/// Momentary push-button.  Also the deep-sleep wake pin, so it must be an
/// RTC-capable GPIO.
pub const BUTTON_GPIO: i32 = 3;

// ---------------------------------------------------------------------------
// Status LED (single discrete LED, active-high)
// ---------------------------------------------------------------------------

pub const LED_GPIO: i32 = 8;

// ---------------------------------------------------------------------------
// I²C bus (MAX30205 temperature sensor)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 6;
pub const I2C_SCL_GPIO: i32 = 7;
/// Standard-mode bus clock.
pub const I2C_FREQ_HZ: u32 = 100_000;
