//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements          | Connects to                 |
//! |-------------|---------------------|-----------------------------|
//! | `ble`       | RadioPort           | NimBLE GAP                  |
//! | `hardware`  | SensorPort          | MAX30205 over I²C           |
//! |             | IndicatorPort       | status LED GPIO             |
//! |             | RadioPort           | (delegates to `ble`)        |
//! |             | IdleTimerPort       | esp_timer one-shot          |
//! | `log_sink`  | EventSink           | Serial log output           |
//! | `nvs`       | ConfigPort          | NVS / in-memory store       |
//! | `retained`  | AllowListStore      | RTC slow memory / in-memory |
//! | `time`      | —                   | ESP32 system timer          |
//! | `device_id` | —                   | eFuse factory MAC           |

pub mod ble;
pub mod device_id;
pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod retained;
pub mod time;
