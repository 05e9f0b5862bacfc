//! Mock hardware adapters for integration tests.
//!
//! Records every port call so tests can assert on the full command history
//! without touching real GPIO, radio or sleep registers.

use embassy_time::Duration;
use tempnode::app::advertising::AdvertisingParams;
use tempnode::app::events::AppEvent;
use tempnode::app::ports::{
    ConnHandle, EventSink, IdleTimerPort, Indication, IndicatorPort, PowerPort, RadioPort,
    SensorPort,
};
use tempnode::error::HardwareError;
use tempnode::power::WakeReason;
use tempnode::sensors::SensorReading;

// ── Hardware call record ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum HwCall {
    StartAdvertising(AdvertisingParams),
    StopAdvertising,
    Disconnect(ConnHandle),
    ReadTemperature,
    Indicate(Indication),
    ArmIdle(Duration),
    CancelIdle,
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub calls: Vec<HwCall>,
    pub reading: Result<SensorReading, HardwareError>,
    pub fail_advertising: bool,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            reading: Ok(SensorReading::new([0x24, 0x80])),
            fail_advertising: false,
        }
    }

    pub fn advertised(&self) -> Vec<&AdvertisingParams> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HwCall::StartAdvertising(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn last_indication(&self) -> Option<Indication> {
        self.calls.iter().rev().find_map(|c| match c {
            HwCall::Indicate(i) => Some(*i),
            _ => None,
        })
    }

    pub fn disconnects(&self) -> Vec<ConnHandle> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HwCall::Disconnect(conn) => Some(*conn),
                _ => None,
            })
            .collect()
    }

    /// Whether the idle timer is armed after the last call touching it.
    pub fn idle_armed(&self) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                HwCall::ArmIdle(_) => Some(true),
                HwCall::CancelIdle => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }

    /// Whether the radio was last told to start rather than stop.
    pub fn on_air(&self) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                HwCall::StartAdvertising(_) => Some(true),
                HwCall::StopAdvertising => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioPort for MockHardware {
    fn start_advertising(&mut self, params: &AdvertisingParams) -> Result<(), HardwareError> {
        if self.fail_advertising {
            return Err(HardwareError::Radio(-1));
        }
        self.calls.push(HwCall::StartAdvertising(params.clone()));
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), HardwareError> {
        self.calls.push(HwCall::StopAdvertising);
        Ok(())
    }

    fn disconnect(&mut self, conn: ConnHandle) -> Result<(), HardwareError> {
        self.calls.push(HwCall::Disconnect(conn));
        Ok(())
    }
}

impl SensorPort for MockHardware {
    fn read_temperature(&mut self) -> Result<SensorReading, HardwareError> {
        self.calls.push(HwCall::ReadTemperature);
        self.reading
    }
}

impl IndicatorPort for MockHardware {
    fn indicate(&mut self, indication: Indication) {
        self.calls.push(HwCall::Indicate(indication));
    }
}

impl IdleTimerPort for MockHardware {
    fn arm_idle_timer(&mut self, after: Duration) -> Result<(), HardwareError> {
        self.calls.push(HwCall::ArmIdle(after));
        Ok(())
    }

    fn cancel_idle_timer(&mut self) {
        self.calls.push(HwCall::CancelIdle);
    }
}

// ── MockPower ─────────────────────────────────────────────────

/// Injected wake reason.  Suspend is never reached in tests: the control
/// task only hands out the plan.
pub struct MockPower {
    pub wake: WakeReason,
}

impl MockPower {
    pub fn waking_on(wake: WakeReason) -> Self {
        Self { wake }
    }
}

impl PowerPort for MockPower {
    fn wake_reason(&self) -> WakeReason {
        self.wake
    }

    fn enable_edge_wake(&mut self) -> Result<(), HardwareError> {
        Ok(())
    }

    fn enable_timer_wake(&mut self, _after: Duration) -> Result<(), HardwareError> {
        Ok(())
    }

    fn suspend(&mut self) -> ! {
        panic!("deep sleep is not reachable from integration tests")
    }
}

// ── RecordingSink ─────────────────────────────────────────────

pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(*event);
    }
}
