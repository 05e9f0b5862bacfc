//! Node configuration parameters
//!
//! All tunable parameters for the tempnode firmware.
//! Values can be overridden via NVS (non-volatile storage).

use serde::{Deserialize, Serialize};

/// Core node configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    // --- Button ---
    /// Presses shorter than this are Short (milliseconds)
    pub short_press_max_ms: u32,
    /// Presses shorter than this (and not Short) are Medium; longer are Long
    pub medium_press_max_ms: u32,
    /// Contact settle window after an edge (milliseconds)
    pub debounce_settle_ms: u32,

    // --- Power ---
    /// Periodic wake interval while a peer is registered (milliseconds)
    pub sleep_cycle_ms: u32,
    /// Awake-without-work time before going back to sleep (milliseconds)
    pub idle_timeout_ms: u32,

    // --- Advertising ---
    /// How long one Data broadcast stays on air (milliseconds)
    pub data_broadcast_ms: u32,
    /// Minimum advertising interval (units of 0.625 ms)
    pub adv_interval_min: u16,
    /// Maximum advertising interval (units of 0.625 ms)
    pub adv_interval_max: u16,

    // --- Indication ---
    /// Blink half-period after a successful registration (milliseconds)
    pub register_blink_ms: u16,
    /// Blink half-period after a successful deletion (milliseconds)
    pub delete_blink_ms: u16,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            // Button
            short_press_max_ms: 1000,
            medium_press_max_ms: 5000,
            debounce_settle_ms: 10,

            // Power
            sleep_cycle_ms: 5000,
            idle_timeout_ms: 30_000,

            // Advertising
            data_broadcast_ms: 1000,
            adv_interval_min: 0x10, // 10 ms
            adv_interval_max: 0x20, // 20 ms

            // Indication
            register_blink_ms: 100,
            delete_blink_ms: 700,
        }
    }
}
