//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ NodeService (domain)
//! ```
//!
//! Driven adapters (button pin, radio, sensor, LED, timers, deep sleep,
//! storage, event sinks) implement these traits.  The
//! [`NodeService`](super::service::NodeService) and the
//! [`ButtonDebouncer`](crate::drivers::button::ButtonDebouncer) consume them
//! via generics, so the domain core never touches hardware directly.
//!
//! Every hardware-facing method returns a typed [`HardwareError`]; callers
//! treat a failure as "skip this action", never as a reason to abort.

use crate::allow_list::AllowList;
use crate::app::advertising::AdvertisingParams;
use crate::config::NodeConfig;
use crate::error::HardwareError;
use crate::power::WakeReason;
use crate::sensors::SensorReading;

use embassy_time::Duration;

// ───────────────────────────────────────────────────────────────
// Button input (driven adapter: GPIO + settle timer)
// ───────────────────────────────────────────────────────────────

/// The single button input and its settle timer.
pub trait ButtonPort {
    /// Mask the edge interrupt.  Must be ISR-safe.
    fn disable_edge_interrupt(&mut self) -> Result<(), HardwareError>;

    /// Unmask the edge interrupt.
    fn enable_edge_interrupt(&mut self) -> Result<(), HardwareError>;

    /// Arm the one-shot settle timer.  Must be ISR-safe.
    fn arm_settle_timer(&mut self, after_us: u64) -> Result<(), HardwareError>;

    /// Current level, `true` = pressed.
    fn read_level(&mut self) -> bool;
}

/// Notification capability for classified presses.
///
/// Supplied to the debouncer at construction.  Buckets a component does
/// not care about keep the default no-op.
pub trait PressHandler {
    fn on_short(&mut self) {}
    fn on_medium(&mut self) {}
    fn on_long(&mut self) {}
}

// ───────────────────────────────────────────────────────────────
// Radio (driven adapter: domain → BLE host stack)
// ───────────────────────────────────────────────────────────────

/// Connection handle assigned by the host stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnHandle(pub u16);

pub trait RadioPort {
    /// Start advertising with the given parameters.
    fn start_advertising(&mut self, params: &AdvertisingParams) -> Result<(), HardwareError>;

    /// Stop any in-flight advertising.  Not an error if none is running.
    fn stop_advertising(&mut self) -> Result<(), HardwareError>;

    /// Terminate a connection.
    fn disconnect(&mut self, conn: ConnHandle) -> Result<(), HardwareError>;
}

// ───────────────────────────────────────────────────────────────
// Sensor (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

pub trait SensorPort {
    /// Trigger a one-shot conversion and return the raw register bytes.
    fn read_temperature(&mut self) -> Result<SensorReading, HardwareError>;
}

// ───────────────────────────────────────────────────────────────
// Indicator (driven adapter: domain → status LED)
// ───────────────────────────────────────────────────────────────

/// Visual feedback pattern on the status LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indication {
    Off,
    /// Solid on: a mode or a broadcast is in progress.
    Solid,
    Blink { on_ms: u16, off_ms: u16 },
}

pub trait IndicatorPort {
    fn indicate(&mut self, indication: Indication);
}

// ───────────────────────────────────────────────────────────────
// Idle timer (driven adapter: one-shot → ControlEvent::IdleTimeout)
// ───────────────────────────────────────────────────────────────

pub trait IdleTimerPort {
    /// (Re)arm the idle one-shot.  Arming again restarts it.
    fn arm_idle_timer(&mut self, after: Duration) -> Result<(), HardwareError>;

    fn cancel_idle_timer(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Power (driven adapter: deep sleep)
// ───────────────────────────────────────────────────────────────

pub trait PowerPort {
    /// Why this boot happened.
    fn wake_reason(&self) -> WakeReason;

    /// Wake when the button pin goes high.
    fn enable_edge_wake(&mut self) -> Result<(), HardwareError>;

    /// Wake after `after` has elapsed.
    fn enable_timer_wake(&mut self, after: Duration) -> Result<(), HardwareError>;

    /// Enter deep sleep.  Execution resumes at boot.
    fn suspend(&mut self) -> !;
}

// ───────────────────────────────────────────────────────────────
// Retained storage (driven adapter: RTC memory)
// ───────────────────────────────────────────────────────────────

/// Storage for the allow-list that survives deep sleep.
pub trait AllowListStore {
    fn load(&self) -> AllowList;

    fn store(&mut self, list: &AllowList);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists node configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid values are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`NodeConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<NodeConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
