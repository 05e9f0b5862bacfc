//! Control event queue.
//!
//! Events are produced by:
//! - the settle-timer callback (classified button presses)
//! - the BLE host task (advertising complete, connect, disconnect)
//! - the idle one-shot timer
//! - boot (the periodic wake timer)
//!
//! and consumed by the single control task, which owns the mode machine
//! and the allow-list.  Nothing else mutates either.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────┐     ┌──────────────┐
//! │ Settle timer│────▶│                  │     │              │
//! │ BLE host    │────▶│ CONTROL_CHANNEL  │────▶│ Control task │
//! │ Idle timer  │────▶│ (embassy-sync)   │     │ (consumer)   │
//! │ Boot        │────▶│                  │     │              │
//! └─────────────┘     └──────────────────┘     └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::app::advertising::RadioEvent;
use crate::drivers::button::PressKind;

/// Maximum number of pending events.
const CONTROL_QUEUE_DEPTH: usize = 8;

/// Inputs to the control task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// A classified button press.
    Press(PressKind),
    /// This boot was the periodic timer wake.
    WakeTimer,
    /// The idle one-shot expired.
    IdleTimeout,
    /// Something happened on the radio.
    Radio(RadioEvent),
}

/// Producers: any context.  Consumer: the control task.
pub static CONTROL_CHANNEL: Channel<CriticalSectionRawMutex, ControlEvent, CONTROL_QUEUE_DEPTH> =
    Channel::new();

/// Push an event without blocking.
/// Returns `false` if the queue is full (event dropped).
pub fn push_event(event: ControlEvent) -> bool {
    CONTROL_CHANNEL.try_send(event).is_ok()
}

/// Wait for the next event.
pub async fn next_event() -> ControlEvent {
    CONTROL_CHANNEL.receive().await
}
