//! Deep-sleep planning and the wake-cycle lifecycle.
//!
//! The node is effectively reborn on every wake: only the RTC-retained
//! allow-list and the wake cause survive.  Each cycle ends by choosing the
//! next wake source from allow-list occupancy and entering deep sleep.
//!
//! | Allow-list | Plan                               | Why the node wakes            |
//! |------------|------------------------------------|-------------------------------|
//! | empty      | `WakeOnEdge`                       | button only                   |
//! | non-empty  | `WakeOnEdgeOrAfter(sleep_cycle)`   | button, or periodic broadcast |

use core::fmt;

use embassy_time::Duration;
use log::{info, warn};

use crate::app::ports::PowerPort;
use crate::config::NodeConfig;
use crate::error::HardwareError;

// ───────────────────────────────────────────────────────────────
// Wake reason
// ───────────────────────────────────────────────────────────────

/// Why the current boot happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// Cold boot or reset; retained memory is freshly initialised.
    PowerOn,
    /// The button pin went high during deep sleep.
    Button,
    /// The periodic sleep timer expired.
    Timer,
    /// Any other wake source.
    Other,
}

// ───────────────────────────────────────────────────────────────
// Sleep plan
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepPlan {
    WakeOnEdge,
    WakeOnEdgeOrAfter(Duration),
}

impl fmt::Display for SleepPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WakeOnEdge => write!(f, "wake on button"),
            Self::WakeOnEdgeOrAfter(d) => write!(f, "wake on button or after {} ms", d.as_millis()),
        }
    }
}

pub struct SleepPlanner {
    cycle: Duration,
}

impl SleepPlanner {
    pub fn new(cycle: Duration) -> Self {
        Self { cycle }
    }

    pub fn from_config(config: &NodeConfig) -> Self {
        Self::new(Duration::from_millis(u64::from(config.sleep_cycle_ms)))
    }

    pub fn cycle(&self) -> Duration {
        self.cycle
    }

    /// Choose the next wake source.  A node with nobody to report to only
    /// wakes for the button.
    pub fn compute_plan(&self, allow_list_empty: bool) -> SleepPlan {
        if allow_list_empty {
            SleepPlan::WakeOnEdge
        } else {
            SleepPlan::WakeOnEdgeOrAfter(self.cycle)
        }
    }

    /// Arm every wake source the plan asks for.
    ///
    /// Both sources are attempted even if one fails; the first failure is
    /// reported.
    pub fn arm(&self, plan: SleepPlan, power: &mut impl PowerPort) -> Result<(), HardwareError> {
        let edge = power.enable_edge_wake();
        let timer = match plan {
            SleepPlan::WakeOnEdge => Ok(()),
            SleepPlan::WakeOnEdgeOrAfter(after) => power.enable_timer_wake(after),
        };
        edge.and(timer)
    }

    /// Arm the plan and enter deep sleep.  Never returns.
    pub fn apply(&self, plan: SleepPlan, power: &mut impl PowerPort) -> ! {
        if let Err(e) = self.arm(plan, power) {
            warn!("power: arming {} incomplete: {}", plan, e);
        }
        info!("power: entering deep sleep ({})", plan);
        power.suspend()
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF deep sleep adapter
// ───────────────────────────────────────────────────────────────

/// [`PowerPort`] over the ESP-IDF sleep API.
pub struct DeepSleep {
    wake_gpio: i32,
    #[cfg(not(target_os = "espidf"))]
    sim_reason: WakeReason,
}

impl DeepSleep {
    #[cfg(target_os = "espidf")]
    pub fn new(wake_gpio: i32) -> Self {
        Self { wake_gpio }
    }

    /// Simulation: the wake reason is injected.
    #[cfg(not(target_os = "espidf"))]
    pub fn new(wake_gpio: i32) -> Self {
        Self::with_reason(wake_gpio, WakeReason::PowerOn)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn with_reason(wake_gpio: i32, sim_reason: WakeReason) -> Self {
        Self {
            wake_gpio,
            sim_reason,
        }
    }
}

#[cfg(target_os = "espidf")]
impl PowerPort for DeepSleep {
    fn wake_reason(&self) -> WakeReason {
        use esp_idf_svc::sys::*;
        // SAFETY: read-only query of the sleep subsystem.
        let cause = unsafe { esp_sleep_get_wakeup_cause() };
        match cause {
            esp_sleep_source_t_ESP_SLEEP_WAKEUP_UNDEFINED => WakeReason::PowerOn,
            esp_sleep_source_t_ESP_SLEEP_WAKEUP_GPIO => WakeReason::Button,
            esp_sleep_source_t_ESP_SLEEP_WAKEUP_TIMER => WakeReason::Timer,
            _ => WakeReason::Other,
        }
    }

    fn enable_edge_wake(&mut self) -> Result<(), HardwareError> {
        use esp_idf_svc::sys::*;
        // SAFETY: plain register configuration before sleep.
        let ret = unsafe {
            esp_deep_sleep_enable_gpio_wakeup(
                1u64 << self.wake_gpio,
                esp_deepsleep_gpio_wake_up_mode_t_ESP_GPIO_WAKEUP_GPIO_HIGH,
            )
        };
        if ret != ESP_OK as i32 {
            return Err(HardwareError::Sleep(ret));
        }
        Ok(())
    }

    fn enable_timer_wake(&mut self, after: Duration) -> Result<(), HardwareError> {
        use esp_idf_svc::sys::*;
        // SAFETY: plain register configuration before sleep.
        let ret = unsafe { esp_sleep_enable_timer_wakeup(after.as_micros()) };
        if ret != ESP_OK as i32 {
            return Err(HardwareError::Sleep(ret));
        }
        Ok(())
    }

    #[allow(unreachable_code, clippy::empty_loop)]
    fn suspend(&mut self) -> ! {
        // SAFETY: terminal call; RTC memory carries the retained state.
        unsafe { esp_idf_svc::sys::esp_deep_sleep_start() };
        loop {}
    }
}

/// Simulation: deep sleep is process termination.
#[cfg(not(target_os = "espidf"))]
impl PowerPort for DeepSleep {
    fn wake_reason(&self) -> WakeReason {
        self.sim_reason
    }

    fn enable_edge_wake(&mut self) -> Result<(), HardwareError> {
        info!("power(sim): wake on GPIO {} high", self.wake_gpio);
        Ok(())
    }

    fn enable_timer_wake(&mut self, after: Duration) -> Result<(), HardwareError> {
        info!("power(sim): wake after {} ms", after.as_millis());
        Ok(())
    }

    fn suspend(&mut self) -> ! {
        info!("power(sim): suspend, exiting");
        std::process::exit(0)
    }
}
