//! Single-colour status LED driver.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the LED GPIO through `hw_init`; blinking is timed by
//! the `blink` esp_timer.  On host/test: tracks the indication in memory.

use log::debug;

use crate::app::ports::{Indication, IndicatorPort};
use crate::drivers::{hw_init, hw_timer};
use crate::pins;

pub struct StatusLed {
    current: Indication,
}

impl Default for StatusLed {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusLed {
    pub fn new() -> Self {
        Self {
            current: Indication::Off,
        }
    }

    pub fn current(&self) -> Indication {
        self.current
    }
}

impl IndicatorPort for StatusLed {
    fn indicate(&mut self, indication: Indication) {
        match indication {
            Indication::Off => {
                hw_timer::stop_blink();
                hw_init::gpio_write(pins::LED_GPIO, false);
            }
            Indication::Solid => {
                hw_timer::stop_blink();
                hw_init::gpio_write(pins::LED_GPIO, true);
            }
            Indication::Blink { on_ms, off_ms } => hw_timer::start_blink(on_ms, off_ms),
        }
        debug!("led: {:?}", indication);
        self.current = indication;
    }
}
