//! Tempnode Firmware — Main Entry Point
//!
//! Hexagonal architecture, event-driven control task, deep sleep between
//! wake cycles.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter        LogEventSink   NvsAdapter   DeepSleep  │
//! │  (Sensor+LED+Radio+Idle)(EventSink)    (Config)     (Power)    │
//! │  RtcAllowListStore      EdgeGate (ISR) + ButtonDebouncer       │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              NodeService (pure logic)                  │    │
//! │  │  Mode FSM · AllowList · Advertising · SleepPlanner     │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  ControlTask (single consumer of CONTROL_CHANNEL)              │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::Hertz;
use log::{error, info, warn};

use tempnode::adapters::ble::BleRadio;
use tempnode::adapters::device_id;
use tempnode::adapters::hardware::HardwareAdapter;
use tempnode::adapters::log_sink::LogEventSink;
use tempnode::adapters::nvs::{self, NvsAdapter};
use tempnode::adapters::retained::RtcAllowListStore;
use tempnode::app::ports::{AllowListStore, ConfigPort, PowerPort};
use tempnode::app::runtime::ControlTask;
use tempnode::app::service::NodeService;
use tempnode::config::NodeConfig;
use tempnode::drivers::button::{self, ButtonDebouncer, PressThresholds, QueuePressHandler};
use tempnode::drivers::status_led::StatusLed;
use tempnode::drivers::{hw_init, hw_timer};
use tempnode::pins;
use tempnode::power::{DeepSleep, WakeReason};
use tempnode::sensors::temperature::TemperatureSensor;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Tempnode v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    // NVS must be up before the radio stack regardless of the outcome.
    let config = match NvsAdapter::new() {
        Ok(store) => nvs::load_or_reset(&store),
        Err(e) => {
            warn!("NVS unavailable ({}), using defaults", e);
            NodeConfig::default()
        }
    };

    // ── 3. Initialise hardware peripherals ────────────────────
    // A failed capability stays inert for this cycle; deep sleep and the
    // next wake are the recovery path.
    if let Err(e) = hw_init::init_peripherals() {
        error!("HAL init failed: {}, button and LED inert", e);
    }
    if let Err(e) = hw_timer::init_timers() {
        error!("timer init failed: {}, debounce and idle timeout inert", e);
    }

    // ── 4. Temperature sensor ─────────────────────────────────
    let peripherals = Peripherals::take()?;
    let i2c_config = I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ));
    // SDA = GPIO6, SCL = GPIO7 (see `pins`).
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio6,
        peripherals.pins.gpio7,
        &i2c_config,
    )?;
    let mut sensor = TemperatureSensor::new(i2c, FreeRtos);
    if let Err(e) = sensor.shutdown() {
        warn!("MAX30205 shutdown failed: {}", e);
    }

    // ── 5. Retained allow-list + wake reason ──────────────────
    // SAFETY: the only instance; owned by the control task from here on.
    let store = unsafe { RtcAllowListStore::take() };
    let allow_list = store.load();
    let power = DeepSleep::new(pins::BUTTON_GPIO);
    let wake = power.wake_reason();
    info!("Boot: {:?}, {} peer(s) retained", wake, allow_list.len());

    // ── 6. Button ─────────────────────────────────────────────
    button::install(ButtonDebouncer::new(
        button::edge_gate(),
        PressThresholds::from_config(&config),
        config.debounce_settle_ms,
        QueuePressHandler::new(),
    ));
    if let Err(e) = hw_init::init_isr_service() {
        error!("ISR service init failed: {}, button inert", e);
    }
    if wake == WakeReason::Button {
        // The waking press is still held; measure it from now.
        button::force_edge();
    }

    // ── 7. Radio ──────────────────────────────────────────────
    let name = device_id::adv_name(&device_id::read_mac());
    info!("Device name: {}", name);
    let radio = BleRadio::new(name);

    // ── 8. Control task ───────────────────────────────────────
    let hw = HardwareAdapter::new(sensor, StatusLed::new(), radio);
    let service = NodeService::new(config, allow_list);
    let task = ControlTask::new(service, hw, power, store, LogEventSink::new());

    info!("System ready. Entering control loop.");

    let executor: edge_executor::LocalExecutor<'_, 1> = edge_executor::LocalExecutor::new();
    match futures_lite::future::block_on(executor.run(task.run())) {}
}
