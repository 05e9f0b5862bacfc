//! Hardware timer module using ESP-IDF's esp_timer API.
//!
//! Three one-shot timers, created once at boot:
//!
//! | Timer    | Armed by                      | Callback                         |
//! |----------|-------------------------------|----------------------------------|
//! | `settle` | button edge ISR               | `button::settle_timer_fired()`   |
//! | `idle`   | control task (idle timeout)   | push `ControlEvent::IdleTimeout` |
//! | `blink`  | status LED, then itself       | toggle LED, re-arm for next half |
//!
//! Callbacks execute in the esp_timer task (not ISR).  On simulation
//! targets every function is a logged no-op.

use crate::error::HardwareError;

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::{info, warn};

#[cfg(target_os = "espidf")]
use crate::events::{ControlEvent, push_event};

#[cfg(target_os = "espidf")]
static mut SETTLE_TIMER: esp_timer_handle_t = core::ptr::null_mut();
#[cfg(target_os = "espidf")]
static mut IDLE_TIMER: esp_timer_handle_t = core::ptr::null_mut();
#[cfg(target_os = "espidf")]
static mut BLINK_TIMER: esp_timer_handle_t = core::ptr::null_mut();

#[cfg(target_os = "espidf")]
static BLINK_ON_MS: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLINK_OFF_MS: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static LED_LIT: AtomicBool = AtomicBool::new(false);

/// SAFETY: the handles are written once in `init_timers()` before any
/// timer is armed and never again.
#[cfg(target_os = "espidf")]
unsafe fn handle(timer: *const esp_timer_handle_t) -> Result<esp_timer_handle_t, HardwareError> {
    let h = unsafe { *timer };
    if h.is_null() {
        return Err(HardwareError::Unavailable);
    }
    Ok(h)
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn settle_cb(_arg: *mut core::ffi::c_void) {
    crate::drivers::button::settle_timer_fired();
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn idle_cb(_arg: *mut core::ffi::c_void) {
    if !push_event(ControlEvent::IdleTimeout) {
        log::error!("hw_timer: control queue full, idle timeout dropped");
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn blink_cb(_arg: *mut core::ffi::c_void) {
    let lit = !LED_LIT.load(Ordering::Relaxed);
    LED_LIT.store(lit, Ordering::Relaxed);
    crate::drivers::hw_init::gpio_write(crate::pins::LED_GPIO, lit);
    let next_ms = if lit {
        BLINK_ON_MS.load(Ordering::Relaxed)
    } else {
        BLINK_OFF_MS.load(Ordering::Relaxed)
    };
    // SAFETY: handle written at boot; restarting a one-shot from its own
    // callback is allowed once it has expired.
    unsafe {
        if let Ok(h) = handle(&raw const BLINK_TIMER) {
            esp_timer_start_once(h, u64::from(next_ms) * 1_000);
        }
    }
}

#[cfg(target_os = "espidf")]
unsafe fn create(
    name: &'static [u8],
    callback: unsafe extern "C" fn(*mut core::ffi::c_void),
    out: *mut esp_timer_handle_t,
) -> Result<(), HardwareError> {
    let args = esp_timer_create_args_t {
        callback: Some(callback),
        arg: core::ptr::null_mut(),
        dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
        name: name.as_ptr() as *const _,
        skip_unhandled_events: false,
    };
    let ret = unsafe { esp_timer_create(&args, out) };
    if ret != ESP_OK as i32 {
        return Err(HardwareError::Timer(ret));
    }
    Ok(())
}

/// Create the settle, idle and blink timers.
#[cfg(target_os = "espidf")]
pub fn init_timers() -> Result<(), HardwareError> {
    // SAFETY: the handle statics are written here once at boot from the
    // main task, before the ISR service is installed.
    unsafe {
        create(b"settle\0", settle_cb, &raw mut SETTLE_TIMER)?;
        create(b"idle\0", idle_cb, &raw mut IDLE_TIMER)?;
        create(b"blink\0", blink_cb, &raw mut BLINK_TIMER)?;
    }
    info!("hw_timer: settle, idle and blink timers created");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_timers() -> Result<(), HardwareError> {
    log::info!("hw_timer(sim): timers not created");
    Ok(())
}

// ── Settle ────────────────────────────────────────────────────

/// Arm the debounce settle timer.  Called from the edge ISR.
#[cfg(target_os = "espidf")]
pub fn start_settle(after_us: u64) -> Result<(), HardwareError> {
    // SAFETY: handle is read-only after init.
    let h = unsafe { handle(&raw const SETTLE_TIMER)? };
    let ret = unsafe { esp_timer_start_once(h, after_us) };
    if ret != ESP_OK as i32 {
        return Err(HardwareError::Timer(ret));
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn start_settle(_after_us: u64) -> Result<(), HardwareError> {
    Ok(())
}

// ── Idle ──────────────────────────────────────────────────────

/// (Re)start the idle one-shot.
#[cfg(target_os = "espidf")]
pub fn arm_idle(after_us: u64) -> Result<(), HardwareError> {
    // SAFETY: handle is read-only after init; stopping an idle timer is
    // harmless and its error (not running) is ignored.
    let h = unsafe { handle(&raw const IDLE_TIMER)? };
    unsafe { esp_timer_stop(h) };
    let ret = unsafe { esp_timer_start_once(h, after_us) };
    if ret != ESP_OK as i32 {
        return Err(HardwareError::Timer(ret));
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn arm_idle(after_us: u64) -> Result<(), HardwareError> {
    log::debug!("hw_timer(sim): idle timer armed for {} ms", after_us / 1_000);
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn cancel_idle() {
    // SAFETY: handle is read-only after init.
    if let Ok(h) = unsafe { handle(&raw const IDLE_TIMER) } {
        unsafe { esp_timer_stop(h) };
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn cancel_idle() {}

// ── Blink ─────────────────────────────────────────────────────

/// Start blinking the status LED, lit first.
#[cfg(target_os = "espidf")]
pub fn start_blink(on_ms: u16, off_ms: u16) {
    stop_blink();
    BLINK_ON_MS.store(u32::from(on_ms), Ordering::Relaxed);
    BLINK_OFF_MS.store(u32::from(off_ms), Ordering::Relaxed);
    LED_LIT.store(true, Ordering::Relaxed);
    crate::drivers::hw_init::gpio_write(crate::pins::LED_GPIO, true);
    // SAFETY: handle is read-only after init.
    match unsafe { handle(&raw const BLINK_TIMER) } {
        Ok(h) => {
            let ret = unsafe { esp_timer_start_once(h, u64::from(on_ms) * 1_000) };
            if ret != ESP_OK as i32 {
                warn!("hw_timer: blink start failed (rc={})", ret);
            }
        }
        Err(e) => warn!("hw_timer: blink unavailable: {}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn start_blink(_on_ms: u16, _off_ms: u16) {}

#[cfg(target_os = "espidf")]
pub fn stop_blink() {
    // SAFETY: handle is read-only after init.
    if let Ok(h) = unsafe { handle(&raw const BLINK_TIMER) } {
        unsafe { esp_timer_stop(h) };
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn stop_blink() {}
