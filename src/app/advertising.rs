//! Advertising orchestration.
//!
//! Translates what the controller wants on air into radio parameters, and
//! radio events back into controller inputs.
//!
//! | Intent   | Frame    | Discoverable | Connectable | Peer filter     | Duration |
//! |----------|----------|--------------|-------------|-----------------|----------|
//! | Register | Register | general      | yes         | none            | forever  |
//! | Delete   | Delete   | no           | yes         | allow-listed    | forever  |
//! | Data     | Data     | no           | yes         | none            | 1 s      |
//!
//! Starting new advertising always stops whatever is in flight first.

use log::{debug, info, warn};

use crate::allow_list::PeerAddress;
use crate::config::NodeConfig;
use crate::error::Result;
use crate::frame::{self, EncodedFrame, FrameTag};
use crate::fsm::Mode;
use crate::fsm::context::ModeInput;
use crate::sensors::SensorReading;

use super::ports::{ConnHandle, RadioPort};

// ───────────────────────────────────────────────────────────────
// Parameters
// ───────────────────────────────────────────────────────────────

/// What the controller wants to advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvIntent {
    Register,
    Delete { target: PeerAddress },
    Data(SensorReading),
}

impl AdvIntent {
    pub fn tag(&self) -> FrameTag {
        match self {
            Self::Register => FrameTag::Register,
            Self::Delete { .. } => FrameTag::Delete,
            Self::Data(_) => FrameTag::Data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discoverability {
    General,
    NonDiscoverable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvDuration {
    Forever,
    Millis(u32),
}

/// Everything the radio needs to start one advertising set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingParams {
    /// Encoded frame for the vendor-data field.
    pub frame: EncodedFrame,
    pub discoverability: Discoverability,
    pub connectable: bool,
    /// Only this peer may scan or connect.
    pub target: Option<PeerAddress>,
    pub duration: AdvDuration,
    /// Interval bounds in 0.625 ms units.
    pub interval_min: u16,
    pub interval_max: u16,
}

// ───────────────────────────────────────────────────────────────
// Radio events
// ───────────────────────────────────────────────────────────────

/// Events delivered by the radio host task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioEvent {
    AdvertisingComplete { reason: i32 },
    Connected { conn: ConnHandle, peer: PeerAddress },
    ConnectFailed { status: i32 },
    Disconnected { peer: PeerAddress, reason: i32 },
}

// ───────────────────────────────────────────────────────────────
// Orchestrator
// ───────────────────────────────────────────────────────────────

pub struct AdvertisingOrchestrator {
    interval_min: u16,
    interval_max: u16,
    data_duration_ms: u32,
    in_flight: Option<FrameTag>,
}

impl AdvertisingOrchestrator {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            interval_min: config.adv_interval_min,
            interval_max: config.adv_interval_max,
            data_duration_ms: config.data_broadcast_ms,
            in_flight: None,
        }
    }

    /// Frame tag of the advertising currently on air, if any.
    pub fn in_flight(&self) -> Option<FrameTag> {
        self.in_flight
    }

    /// Build radio parameters for `intent`.
    pub fn params_for(&self, intent: &AdvIntent) -> Result<AdvertisingParams> {
        let frame = match intent {
            AdvIntent::Data(reading) => frame::encode(FrameTag::Data, &reading.raw)?,
            other => frame::encode(other.tag(), &[])?,
        };
        let (discoverability, target, duration) = match intent {
            AdvIntent::Register => (Discoverability::General, None, AdvDuration::Forever),
            AdvIntent::Delete { target } => (
                Discoverability::NonDiscoverable,
                Some(*target),
                AdvDuration::Forever,
            ),
            AdvIntent::Data(_) => (
                Discoverability::NonDiscoverable,
                None,
                AdvDuration::Millis(self.data_duration_ms),
            ),
        };
        Ok(AdvertisingParams {
            frame,
            discoverability,
            connectable: true,
            target,
            duration,
            interval_min: self.interval_min,
            interval_max: self.interval_max,
        })
    }

    /// Stop anything in flight, then start advertising `intent`.
    pub fn advertise(&mut self, radio: &mut impl RadioPort, intent: &AdvIntent) -> Result<()> {
        self.cancel(radio);
        let params = self.params_for(intent)?;
        radio.start_advertising(&params)?;
        info!(
            "adv: started {:?} (target={:?}, duration={:?})",
            intent.tag(),
            params.target.map(|p| p.bytes),
            params.duration
        );
        self.in_flight = Some(intent.tag());
        Ok(())
    }

    /// Stop in-flight advertising.  A radio error is logged; nothing is on
    /// air afterwards as far as the controller is concerned.
    pub fn cancel(&mut self, radio: &mut impl RadioPort) {
        if let Some(tag) = self.in_flight.take() {
            if let Err(e) = radio.stop_advertising() {
                warn!("adv: stopping {:?} failed: {}", tag, e);
            }
        }
    }

    /// Tell the radio to stop even if nothing is tracked as in flight.
    ///
    /// A connection clears the tracked state, but the radio may still hold
    /// the session's parameters for a restart after a failed connect.
    pub fn stop(&mut self, radio: &mut impl RadioPort) {
        let tag = self.in_flight.take();
        if let Err(e) = radio.stop_advertising() {
            warn!("adv: stopping {:?} failed: {}", tag, e);
        }
    }

    /// Interpret a radio event for the controller in `mode`.
    pub fn interpret(&mut self, event: &RadioEvent, mode: Mode) -> Option<ModeInput> {
        match *event {
            RadioEvent::AdvertisingComplete { reason } => {
                let finished = self.in_flight.take();
                debug!("adv: complete ({:?}, reason={})", finished, reason);
                // Only the Data broadcast in Idle ends on its own.  A late
                // completion of anything else must not end the cycle.
                (mode == Mode::Idle && finished == Some(FrameTag::Data))
                    .then_some(ModeInput::BroadcastDone)
            }
            RadioEvent::Connected { conn, peer } => {
                // A connection ends connectable advertising.
                self.in_flight = None;
                info!("adv: connected to {} (handle {})", peer, conn.0);
                Some(ModeInput::PeerConnected { conn, peer })
            }
            RadioEvent::ConnectFailed { status } => {
                warn!("adv: connection failed (status={}), advertising continues", status);
                None
            }
            RadioEvent::Disconnected { peer, reason } => {
                info!("adv: disconnected from {} (reason=0x{:x})", peer, reason);
                None
            }
        }
    }
}
