//! Concrete mode handlers and the table builder.
//!
//! ```text
//!             [medium]                         [long, list non-empty]
//!  REGISTERING ◀──────── IDLE ─────────────────────────▶ DELETING
//!       │                 ▲ ▲                                  │
//!       │ [medium]: sleep │ │ [long]: sleep                    │
//!       │ [connect]: add  │ │ [connect]: remove                │
//!       └─────────────────┘ └──────────────────────────────────┘
//!
//!  IDLE: [wake timer] broadcast reading, [broadcast done] sleep,
//!        [idle timeout] sleep, [short] keep awake
//! ```

use super::context::{Effect, ModeContext, ModeInput};
use super::{Mode, ModeDescriptor};
use crate::app::advertising::AdvIntent;
use crate::app::events::AppEvent;
use crate::app::ports::Indication;
use crate::drivers::button::PressKind;
use log::{info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_mode_table() -> [ModeDescriptor; Mode::COUNT] {
    [
        // Index 0 — Idle
        ModeDescriptor {
            id: Mode::Idle,
            name: "Idle",
            on_enter: None,
            on_exit: None,
            on_event: idle_event,
        },
        // Index 1 — Registering
        ModeDescriptor {
            id: Mode::Registering,
            name: "Registering",
            on_enter: Some(registering_enter),
            on_exit: Some(session_exit),
            on_event: registering_event,
        },
        // Index 2 — Deleting
        ModeDescriptor {
            id: Mode::Deleting,
            name: "Deleting",
            on_enter: Some(deleting_enter),
            on_exit: Some(session_exit),
            on_event: deleting_event,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_event(ctx: &mut ModeContext, input: &ModeInput) -> Option<Mode> {
    match *input {
        ModeInput::Press(PressKind::Medium) => Some(Mode::Registering),
        ModeInput::Press(PressKind::Long) => {
            if ctx.allow_list.is_empty() {
                info!("Idle: nothing registered, delete request ignored");
                ctx.push(Effect::ArmIdleTimer);
                None
            } else {
                Some(Mode::Deleting)
            }
        }
        ModeInput::Press(PressKind::Short) => {
            // Reserved; only keeps the node awake.
            ctx.push(Effect::ArmIdleTimer);
            None
        }
        ModeInput::WakeTimer => {
            ctx.push(Effect::Indicate(Indication::Solid));
            ctx.push(Effect::BroadcastReading);
            None
        }
        ModeInput::BroadcastDone | ModeInput::IdleTimeout => {
            ctx.push(Effect::Indicate(Indication::Off));
            ctx.request_suspend();
            None
        }
        ModeInput::PeerConnected { conn, peer } => {
            // Someone connected to the Data broadcast; there is nothing to
            // exchange, so the cycle ends here.
            info!("Idle: dropping connection from {}", peer);
            ctx.push(Effect::Disconnect(conn));
            ctx.push(Effect::Indicate(Indication::Off));
            ctx.request_suspend();
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  REGISTERING
// ═══════════════════════════════════════════════════════════════════════════

fn registering_enter(ctx: &mut ModeContext) {
    ctx.push(Effect::CancelIdleTimer);
    ctx.push(Effect::Advertise(AdvIntent::Register));
    ctx.push(Effect::Indicate(Indication::Solid));
}

fn registering_event(ctx: &mut ModeContext, input: &ModeInput) -> Option<Mode> {
    match *input {
        ModeInput::Press(PressKind::Medium) => {
            info!("Registering: cancelled by user");
            ctx.push(Effect::Indicate(Indication::Off));
            ctx.request_suspend();
            Some(Mode::Idle)
        }
        ModeInput::PeerConnected { conn, peer } => {
            match ctx.allow_list.push(peer) {
                Ok(()) => {
                    info!("Registering: {} added", peer);
                    ctx.push(Effect::Emit(AppEvent::PeerRegistered(peer)));
                    let blink = ctx.register_blink();
                    ctx.push(Effect::Indicate(blink));
                }
                Err(e) => {
                    warn!("Registering: {} rejected: {}", peer, e);
                    ctx.push(Effect::Emit(AppEvent::PeerRejected { peer, reason: e }));
                    ctx.push(Effect::Indicate(Indication::Off));
                }
            }
            ctx.push(Effect::Disconnect(conn));
            ctx.push(Effect::ArmIdleTimer);
            Some(Mode::Idle)
        }
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  DELETING
// ═══════════════════════════════════════════════════════════════════════════

fn deleting_enter(ctx: &mut ModeContext) {
    ctx.push(Effect::CancelIdleTimer);
    match ctx.allow_list.pick_target() {
        Some(target) => {
            info!("Deleting: waiting for {}", target);
            ctx.push(Effect::Advertise(AdvIntent::Delete { target }));
        }
        // Idle only enters Deleting with a non-empty list.
        None => warn!("Deleting: no target to advertise to"),
    }
    ctx.push(Effect::Indicate(Indication::Solid));
}

fn deleting_event(ctx: &mut ModeContext, input: &ModeInput) -> Option<Mode> {
    match *input {
        ModeInput::Press(PressKind::Long) => {
            info!("Deleting: cancelled by user");
            ctx.push(Effect::Indicate(Indication::Off));
            ctx.request_suspend();
            Some(Mode::Idle)
        }
        ModeInput::PeerConnected { conn, peer } => {
            match ctx.allow_list.remove(&peer) {
                Ok(()) => {
                    info!("Deleting: {} removed", peer);
                    ctx.push(Effect::Emit(AppEvent::PeerRemoved(peer)));
                    let blink = ctx.delete_blink();
                    ctx.push(Effect::Indicate(blink));
                }
                Err(e) => {
                    warn!("Deleting: {} not removed: {}", peer, e);
                    ctx.push(Effect::Emit(AppEvent::PeerRejected { peer, reason: e }));
                    ctx.push(Effect::Indicate(Indication::Off));
                }
            }
            ctx.push(Effect::Disconnect(conn));
            ctx.push(Effect::ArmIdleTimer);
            Some(Mode::Idle)
        }
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Shared
// ═══════════════════════════════════════════════════════════════════════════

fn session_exit(ctx: &mut ModeContext) {
    ctx.push(Effect::StopAdvertising);
}
