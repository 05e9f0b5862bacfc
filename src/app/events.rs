//! Outbound application events.
//!
//! The [`NodeService`](super::service::NodeService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them; the firmware logs them to serial.

use crate::allow_list::PeerAddress;
use crate::error::Error;
use crate::fsm::Mode;
use crate::power::{SleepPlan, WakeReason};
use crate::sensors::SensorReading;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// The service has started this wake cycle.
    Started { wake: WakeReason, peers: usize },

    /// The controller switched modes.
    ModeChanged { from: Mode, to: Mode },

    /// A peer was added to the allow-list.
    PeerRegistered(PeerAddress),

    /// A peer was removed from the allow-list.
    PeerRemoved(PeerAddress),

    /// A connecting peer could not be added or removed.
    PeerRejected { peer: PeerAddress, reason: Error },

    /// A reading went on air.
    ReadingBroadcast(SensorReading),

    /// The cycle is ending with this wake plan.
    Suspending(SleepPlan),
}
