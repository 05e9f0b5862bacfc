//! Shared mutable context threaded through every mode handler.
//!
//! Handlers read the allow-list and configuration from here and write
//! back [`Effect`]s: requests for radio, LED and timer actions that the
//! service applies once the handler returns.  The allow-list is the only
//! piece of domain state handlers mutate directly.

use log::error;

use crate::allow_list::{AllowList, PeerAddress};
use crate::app::advertising::AdvIntent;
use crate::app::events::AppEvent;
use crate::app::ports::{ConnHandle, Indication};
use crate::config::NodeConfig;
use crate::drivers::button::PressKind;

/// Upper bound on effects queued by a single input, exit and enter included.
pub const MAX_EFFECTS: usize = 8;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Everything a mode handler can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeInput {
    Press(PressKind),
    /// The node woke for its periodic broadcast.
    WakeTimer,
    /// Nothing happened for the configured idle period.
    IdleTimeout,
    /// The Data broadcast left the air.
    BroadcastDone,
    /// A peer completed a connection to our advertising.
    PeerConnected { conn: ConnHandle, peer: PeerAddress },
}

// ---------------------------------------------------------------------------
// Effects (written by handlers; applied by the service)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Start a Register or Delete session advertisement.
    Advertise(AdvIntent),
    /// Sample the sensor and put a Data frame on air.
    BroadcastReading,
    StopAdvertising,
    Disconnect(ConnHandle),
    Indicate(Indication),
    ArmIdleTimer,
    CancelIdleTimer,
    /// Report an outcome to the event sink.
    Emit(AppEvent),
}

// ---------------------------------------------------------------------------
// ModeContext
// ---------------------------------------------------------------------------

pub struct ModeContext {
    pub allow_list: AllowList,
    pub config: NodeConfig,
    pub effects: heapless::Vec<Effect, MAX_EFFECTS>,
    suspend_requested: bool,
}

impl ModeContext {
    pub fn new(config: NodeConfig, allow_list: AllowList) -> Self {
        Self {
            allow_list,
            config,
            effects: heapless::Vec::new(),
            suspend_requested: false,
        }
    }

    /// Queue an effect.  Overflow is a table bug, logged and dropped.
    pub fn push(&mut self, effect: Effect) {
        if self.effects.push(effect).is_err() {
            error!("FSM: effect queue full, dropped {:?}", effect);
        }
    }

    /// Ask the service to end this wake cycle once effects are applied.
    pub fn request_suspend(&mut self) {
        self.suspend_requested = true;
    }

    /// Read and clear the suspend request.
    pub fn take_suspend(&mut self) -> bool {
        core::mem::take(&mut self.suspend_requested)
    }

    /// Fast blink after a successful registration.
    pub fn register_blink(&self) -> Indication {
        let ms = self.config.register_blink_ms;
        Indication::Blink { on_ms: ms, off_ms: ms }
    }

    /// Slow blink after a successful deletion.
    pub fn delete_blink(&self) -> Indication {
        let ms = self.config.delete_blink_ms;
        Indication::Blink { on_ms: ms, off_ms: ms }
    }
}
