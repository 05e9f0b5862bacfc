//! Interrupt-debounced button with press-duration classification.
//!
//! ## Hardware
//!
//! Momentary switch to 3V3 with the internal pull-down enabled, so HIGH
//! means pressed.  The GPIO interrupt fires on any edge and doubles as the
//! deep-sleep wake source.
//!
//! ## Two-phase debounce
//!
//! ```text
//!            EdgeRaised                        SettleTimerFired
//!  Armed ──────────────────▶ Debouncing ──────────────────────────▶ Armed
//!        disable edge IRQ                 re-enable edge IRQ,
//!        arm settle timer                 sample level, classify
//! ```
//!
//! The edge handler runs in interrupt context and does only the two
//! left-hand actions, guarded by the lock-free [`EdgeGate`].  Everything
//! else runs in the `esp_timer` task when the settle timer fires.  Further
//! edges during the settle window never reach the CPU because the
//! interrupt is masked.
//!
//! ## Classification
//!
//! | Press  | Condition                              |
//! |--------|----------------------------------------|
//! | Short  | `duration < short_max`                 |
//! | Medium | `short_max <= duration < medium_max`   |
//! | Long   | `duration >= medium_max`               |

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use log::error;

use crate::app::ports::{ButtonPort, ConfigError, PressHandler};
use crate::config::NodeConfig;
use crate::drivers::{hw_init, hw_timer};
use crate::error::{Error, HardwareError, Result};
use crate::events::{ControlEvent, push_event};

// ───────────────────────────────────────────────────────────────
// Press classification
// ───────────────────────────────────────────────────────────────

/// Duration bucket of one complete press/release cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PressKind {
    Short,
    Medium,
    Long,
}

impl fmt::Display for PressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Short => write!(f, "short"),
            Self::Medium => write!(f, "medium"),
            Self::Long => write!(f, "long"),
        }
    }
}

/// Strictly ordered bucket boundaries, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressThresholds {
    short_max_ms: u32,
    medium_max_ms: u32,
}

impl PressThresholds {
    pub fn new(short_max_ms: u32, medium_max_ms: u32) -> core::result::Result<Self, ConfigError> {
        if short_max_ms == 0 {
            return Err(ConfigError::ValidationFailed("short_press_max_ms must be > 0"));
        }
        if short_max_ms >= medium_max_ms {
            return Err(ConfigError::ValidationFailed(
                "short_press_max_ms must be < medium_press_max_ms",
            ));
        }
        Ok(Self {
            short_max_ms,
            medium_max_ms,
        })
    }

    /// Thresholds from config, falling back to the defaults if the stored
    /// pair is not strictly ordered.
    pub fn from_config(config: &NodeConfig) -> Self {
        Self::new(config.short_press_max_ms, config.medium_press_max_ms).unwrap_or_else(|e| {
            error!("button: {}, using default thresholds", e);
            Self::default()
        })
    }

    /// Bucket a press duration given in milliseconds.
    pub fn classify_ms(&self, duration_ms: u64) -> PressKind {
        if duration_ms < u64::from(self.short_max_ms) {
            PressKind::Short
        } else if duration_ms < u64::from(self.medium_max_ms) {
            PressKind::Medium
        } else {
            PressKind::Long
        }
    }

    /// Bucket a press duration given in microseconds.
    pub fn classify_us(&self, duration_us: u64) -> PressKind {
        self.classify_ms(duration_us / 1000)
    }
}

impl Default for PressThresholds {
    fn default() -> Self {
        Self {
            short_max_ms: 1000,
            medium_max_ms: 5000,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Debouncer state machine
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Armed,
    Debouncing,
}

/// The two inputs the debouncer reacts to, independent of how the
/// platform delivers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceInput {
    EdgeRaised,
    SettleTimerFired { now_us: i64 },
}

const DEFAULT_SETTLE_US: u32 = 10_000;

/// Interrupt-context half of the debouncer.
///
/// Lock-free: the edge handler touches only these atomics, the interrupt
/// mask and the settle timer, so it can live in a `static` shared by the
/// ISR and task code.
pub struct EdgeGate {
    debouncing: AtomicBool,
    settle_us: AtomicU32,
}

impl EdgeGate {
    pub const fn new() -> Self {
        Self {
            debouncing: AtomicBool::new(false),
            settle_us: AtomicU32::new(DEFAULT_SETTLE_US),
        }
    }

    pub fn set_settle_ms(&self, settle_ms: u32) {
        self.settle_us
            .store(settle_ms.saturating_mul(1000), Ordering::Relaxed);
    }

    pub fn state(&self) -> DebounceState {
        if self.debouncing.load(Ordering::Acquire) {
            DebounceState::Debouncing
        } else {
            DebounceState::Armed
        }
    }

    /// Mask the edge and start the settle window.
    ///
    /// No logging, no locks and no allocation.  An edge while already
    /// debouncing is ignored.  If the timer cannot be armed the interrupt
    /// is unmasked again so the input is not left deaf.
    pub fn on_edge(&self, port: &mut impl ButtonPort) -> Result<()> {
        if self.debouncing.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Err(e) = port.disable_edge_interrupt() {
            self.release();
            return Err(e.into());
        }
        let after_us = u64::from(self.settle_us.load(Ordering::Relaxed));
        if let Err(e) = port.arm_settle_timer(after_us) {
            let _ = port.enable_edge_interrupt();
            self.release();
            return Err(e.into());
        }
        Ok(())
    }

    fn release(&self) {
        self.debouncing.store(false, Ordering::Release);
    }
}

impl Default for EdgeGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Task-context half: level tracking, classification and notification.
pub struct ButtonDebouncer<'g, H: PressHandler> {
    gate: &'g EdgeGate,
    thresholds: PressThresholds,
    /// Level sampled at the last settle (`true` = pressed).
    last_level: bool,
    press_start_us: Option<i64>,
    handler: H,
}

impl<'g, H: PressHandler> ButtonDebouncer<'g, H> {
    pub fn new(
        gate: &'g EdgeGate,
        thresholds: PressThresholds,
        settle_ms: u32,
        handler: H,
    ) -> Self {
        gate.set_settle_ms(settle_ms);
        Self {
            gate,
            thresholds,
            last_level: false,
            press_start_us: None,
            handler,
        }
    }

    pub fn state(&self) -> DebounceState {
        self.gate.state()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Feed one input.  Returns the classified press when a release
    /// completes a press/release cycle.
    pub fn step(
        &mut self,
        input: DebounceInput,
        port: &mut impl ButtonPort,
    ) -> Result<Option<PressKind>> {
        match input {
            DebounceInput::EdgeRaised => self.gate.on_edge(port).map(|()| None),
            DebounceInput::SettleTimerFired { now_us } => self.on_settle(port, now_us),
        }
    }

    /// Deferred half: unmask the edge, sample the level and classify on
    /// release.
    ///
    /// A negative press duration yields [`Error::Measurement`] and no
    /// press is reported.  If the edge cannot be unmasked the sample is
    /// abandoned and the hardware error returned.
    pub fn on_settle(
        &mut self,
        port: &mut impl ButtonPort,
        now_us: i64,
    ) -> Result<Option<PressKind>> {
        // Release before unmasking so the next edge is not swallowed.
        self.gate.release();
        port.enable_edge_interrupt()?;

        let level = port.read_level();
        if level == self.last_level {
            return Ok(None);
        }
        self.last_level = level;

        if level {
            self.press_start_us = Some(now_us);
            return Ok(None);
        }

        // Release without a recorded press start (e.g. boot mid-release).
        let Some(start_us) = self.press_start_us.take() else {
            return Ok(None);
        };
        let duration_us = now_us - start_us;
        if duration_us < 0 {
            return Err(Error::Measurement);
        }

        let kind = self.thresholds.classify_us(duration_us as u64);
        match kind {
            PressKind::Short => self.handler.on_short(),
            PressKind::Medium => self.handler.on_medium(),
            PressKind::Long => self.handler.on_long(),
        }
        Ok(Some(kind))
    }
}

// ───────────────────────────────────────────────────────────────
// GPIO-backed port
// ───────────────────────────────────────────────────────────────

/// [`ButtonPort`] on the real button pin and the `settle` esp_timer.
pub struct GpioButton {
    gpio: i32,
}

impl GpioButton {
    pub const fn new(gpio: i32) -> Self {
        Self { gpio }
    }
}

impl ButtonPort for GpioButton {
    fn disable_edge_interrupt(&mut self) -> core::result::Result<(), HardwareError> {
        hw_init::gpio_intr_disable(self.gpio)
    }

    fn enable_edge_interrupt(&mut self) -> core::result::Result<(), HardwareError> {
        hw_init::gpio_intr_enable(self.gpio)
    }

    fn arm_settle_timer(&mut self, after_us: u64) -> core::result::Result<(), HardwareError> {
        hw_timer::start_settle(after_us)
    }

    fn read_level(&mut self) -> bool {
        hw_init::gpio_read(self.gpio)
    }
}

// ───────────────────────────────────────────────────────────────
// Control-queue handler and the shared instance
// ───────────────────────────────────────────────────────────────

/// Press handler that forwards every classified press to the control task.
///
/// Runs with the debouncer locked, so a full queue is only recorded here
/// and reported by the caller afterwards.
#[derive(Debug, Default)]
pub struct QueuePressHandler {
    dropped: Option<PressKind>,
}

impl QueuePressHandler {
    pub const fn new() -> Self {
        Self { dropped: None }
    }

    /// The press lost to a full queue since the last call, if any.
    pub fn take_dropped(&mut self) -> Option<PressKind> {
        self.dropped.take()
    }

    fn forward(&mut self, kind: PressKind) {
        if !push_event(ControlEvent::Press(kind)) {
            self.dropped = Some(kind);
        }
    }
}

impl PressHandler for QueuePressHandler {
    fn on_short(&mut self) {
        self.forward(PressKind::Short);
    }

    fn on_medium(&mut self) {
        self.forward(PressKind::Medium);
    }

    fn on_long(&mut self) {
        self.forward(PressKind::Long);
    }
}

#[cfg(target_os = "espidf")]
mod shared {
    use core::cell::RefCell;

    use embassy_sync::blocking_mutex::Mutex;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use log::{error, warn};

    use super::{ButtonDebouncer, DebounceInput, EdgeGate, GpioButton, QueuePressHandler};
    use crate::adapters::time::MonotonicClock;
    use crate::error::Error;
    use crate::pins;

    type SharedDebouncer = ButtonDebouncer<'static, QueuePressHandler>;

    /// The only state the ISR touches.
    static GATE: EdgeGate = EdgeGate::new();

    /// Locked from task context only: `install` and the esp_timer task.
    static DEBOUNCER: Mutex<CriticalSectionRawMutex, RefCell<Option<SharedDebouncer>>> =
        Mutex::new(RefCell::new(None));

    /// Gate to build the installed debouncer around.
    pub fn edge_gate() -> &'static EdgeGate {
        &GATE
    }

    /// Install the debouncer.  Must run before the edge ISR is registered.
    pub fn install(debouncer: SharedDebouncer) {
        DEBOUNCER.lock(|d| *d.borrow_mut() = Some(debouncer));
    }

    /// GPIO ISR for the button pin.
    ///
    /// SAFETY (caller): registered through `gpio_isr_handler_add`.  Only
    /// atomics, `gpio_intr_disable` and `esp_timer_start_once` are used.
    pub unsafe extern "C" fn button_isr_handler(_arg: *mut core::ffi::c_void) {
        let _ = GATE.on_edge(&mut GpioButton::new(pins::BUTTON_GPIO));
    }

    /// Settle timer callback body (runs in the esp_timer task).
    pub fn settle_timer_fired() {
        let now_us = MonotonicClock::new().now_us();
        let input = DebounceInput::SettleTimerFired { now_us };
        let outcome = DEBOUNCER.lock(|d| {
            let mut d = d.borrow_mut();
            let debouncer = d.as_mut()?;
            let result = debouncer.step(input, &mut GpioButton::new(pins::BUTTON_GPIO));
            Some((result, debouncer.handler_mut().take_dropped()))
        });

        let Some((result, dropped)) = outcome else {
            return;
        };
        if let Some(kind) = dropped {
            error!("button: control queue full, dropping {} press", kind);
        }
        match result {
            Err(Error::Measurement) => warn!("button: negative press duration, press dropped"),
            Err(e) => warn!("button: {}", e),
            Ok(_) => {}
        }
    }

    /// Treat the wake-up edge as a real one so the press that woke the
    /// device is measured.
    pub fn force_edge() {
        if let Err(e) = GATE.on_edge(&mut GpioButton::new(pins::BUTTON_GPIO)) {
            warn!("button: wake edge not armed: {}", e);
        }
    }
}

#[cfg(target_os = "espidf")]
pub use shared::{button_isr_handler, edge_gate, force_edge, install, settle_timer_fired};
