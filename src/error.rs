//! Unified error types for the tempnode firmware.
//!
//! A single `Error` enum that every subsystem converts into, so the control
//! task's error handling stays uniform.  All variants are `Copy` so they can
//! be passed out of timer callbacks and radio handlers without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible domain operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A frame was malformed or carried an unknown tag.
    Validation(FrameError),
    /// The allow-list has no free slot.
    Capacity,
    /// The peer is not a member of the allow-list.
    NotFound,
    /// A press duration came out negative (monotonic clock anomaly).
    Measurement,
    /// The hardware or radio collaborator reported a failure.
    Hardware(HardwareError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "validation: {e}"),
            Self::Capacity => write!(f, "allow-list is full"),
            Self::NotFound => write!(f, "peer not in allow-list"),
            Self::Measurement => write!(f, "negative press duration"),
            Self::Hardware(e) => write!(f, "hardware: {e}"),
        }
    }
}

/// Convenience alias used throughout the domain modules.
pub type Result<T> = core::result::Result<T, Error>;

// ---------------------------------------------------------------------------
// Frame errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer than the two tag bytes were supplied.
    InvalidLength,
    /// The tag value is not one of the known frame kinds.
    UnknownHeader(u16),
    /// The payload does not fit the advertisement vendor-data field.
    PayloadTooLong(usize),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength => write!(f, "frame shorter than header"),
            Self::PayloadTooLong(len) => write!(f, "payload of {len} bytes too long"),
            Self::UnknownHeader(tag) => write!(f, "unknown frame header 0x{tag:04x}"),
        }
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::Validation(e)
    }
}

// ---------------------------------------------------------------------------
// Hardware errors
// ---------------------------------------------------------------------------

/// Opaque failures from the peripherals.  The `i32` payloads carry the raw
/// `esp_err_t` / NimBLE return code for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareError {
    /// GPIO configuration or interrupt control failed.
    Gpio(i32),
    /// An `esp_timer` could not be created or started.
    Timer(i32),
    /// The I²C transaction with the temperature sensor failed.
    Bus,
    /// The BLE host stack rejected a GAP request.
    Radio(i32),
    /// Arming a deep-sleep wake source failed.
    Sleep(i32),
    /// The capability failed to initialise and is inert for this wake cycle.
    Unavailable,
}

impl fmt::Display for HardwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpio(rc) => write!(f, "GPIO failed (rc={rc})"),
            Self::Timer(rc) => write!(f, "timer failed (rc={rc})"),
            Self::Bus => write!(f, "I2C transaction failed"),
            Self::Radio(rc) => write!(f, "radio failed (rc={rc})"),
            Self::Sleep(rc) => write!(f, "sleep wake source failed (rc={rc})"),
            Self::Unavailable => write!(f, "capability unavailable"),
        }
    }
}

impl From<HardwareError> for Error {
    fn from(e: HardwareError) -> Self {
        Self::Hardware(e)
    }
}
