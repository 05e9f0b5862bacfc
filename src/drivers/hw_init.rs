//! One-shot hardware peripheral initialization.
//!
//! Configures the button input, the status LED output and the GPIO ISR
//! service using raw ESP-IDF sys calls.  Called once from `main()` before
//! the control task starts.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use crate::error::HardwareError;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
    IsrHandlerFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
            Self::IsrHandlerFailed(rc) => write!(f, "GPIO ISR handler add failed (rc={})", rc),
        }
    }
}

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the control task; single-threaded.
    unsafe {
        init_button_input()?;
        init_led_output()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── Button input ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_button_input() -> Result<(), HwInitError> {
    // Active-high: pressed pulls the pin to 3V3.
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::BUTTON_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_ENABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_ANYEDGE,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }

    info!("hw_init: button on GPIO {} (any edge, pull-down)", pins::BUTTON_GPIO);
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: read-only register access on an already-configured input;
    // also used from the settle-timer task.
    (unsafe { gpio_get_level(pin) }) != 0
}

/// Simulation: the button is never held.
#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    false
}

/// Mask the edge interrupt of `pin`.  ISR-safe.
#[cfg(target_os = "espidf")]
pub fn gpio_intr_disable(pin: i32) -> Result<(), HardwareError> {
    // SAFETY: register write; gpio_intr_disable is IRAM-safe.
    let ret = unsafe { esp_idf_svc::sys::gpio_intr_disable(pin) };
    if ret != ESP_OK as i32 { return Err(HardwareError::Gpio(ret)); }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_intr_disable(_pin: i32) -> Result<(), HardwareError> {
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_intr_enable(pin: i32) -> Result<(), HardwareError> {
    // SAFETY: register write on a configured input pin.
    let ret = unsafe { esp_idf_svc::sys::gpio_intr_enable(pin) };
    if ret != ESP_OK as i32 { return Err(HardwareError::Gpio(ret)); }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_intr_enable(_pin: i32) -> Result<(), HardwareError> {
    Ok(())
}

// ── LED output ────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_led_output() -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::LED_GPIO,
        mode: gpio_mode_t_GPIO_MODE_OUTPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
    unsafe { gpio_set_level(pins::LED_GPIO, 0) };

    info!("hw_init: LED on GPIO {}", pins::LED_GPIO);
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: write to an already-configured output pin.  Called from the
    // control task and the blink timer task; the level register is atomic.
    unsafe { gpio_set_level(pin, if high { 1 } else { 0 }); }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

// ── GPIO ISR Service ──────────────────────────────────────────

/// Install the GPIO ISR service and register the button handler.
/// Call after the debouncer is installed.
#[cfg(target_os = "espidf")]
pub fn init_isr_service() -> Result<(), HwInitError> {
    use crate::drivers::button::button_isr_handler;

    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed.  The handler only touches the
    // critical-section-guarded debouncer.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        let ret = gpio_isr_handler_add(
            pins::BUTTON_GPIO,
            Some(button_isr_handler),
            core::ptr::null_mut(),
        );
        if ret != ESP_OK as i32 { return Err(HwInitError::IsrHandlerFailed(ret)); }

        let ret = esp_idf_svc::sys::gpio_intr_enable(pins::BUTTON_GPIO);
        if ret != ESP_OK as i32 { return Err(HwInitError::IsrHandlerFailed(ret)); }
    }
    info!("hw_init: ISR service installed (button)");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}
