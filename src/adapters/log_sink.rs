//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART / USB-CDC on the device).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { wake, peers } => {
                info!("START | wake={:?} | peers={}", wake, peers);
            }
            AppEvent::ModeChanged { from, to } => {
                info!("MODE  | {} -> {}", from, to);
            }
            AppEvent::PeerRegistered(peer) => {
                info!("PEER  | registered {} ({:?})", peer, peer.kind);
            }
            AppEvent::PeerRemoved(peer) => {
                info!("PEER  | removed {} ({:?})", peer, peer.kind);
            }
            AppEvent::PeerRejected { peer, reason } => {
                warn!("PEER  | rejected {} | reason={}", peer, reason);
            }
            AppEvent::ReadingBroadcast(reading) => {
                info!(
                    "DATA  | raw={:02x}{:02x} | T={}",
                    reading.raw[0], reading.raw[1], reading
                );
            }
            AppEvent::Suspending(plan) => {
                info!("SLEEP | {}", plan);
            }
        }
    }
}
