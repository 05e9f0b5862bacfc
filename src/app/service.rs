//! Application service — the hexagonal core.
//!
//! [`NodeService`] owns the mode machine, the allow-list (through the
//! mode context), the advertising orchestrator and the sleep planner.  It
//! is the single writer of all controller state: every input arrives as
//! one [`ControlEvent`] and is processed to completion before the next.
//!
//! ```text
//!  ControlEvent ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                   │       NodeService         │
//!  RadioPort    ◀── │  modes · allow-list · adv │ ──▶ Step::Suspend(plan)
//!  SensorPort   ◀── └──────────────────────────┘
//! ```
//!
//! The service never enters deep sleep itself.  It returns
//! [`Step::Suspend`] and the runtime persists the allow-list and applies
//! the plan.

use embassy_time::Duration;
use log::{info, warn};

use crate::allow_list::AllowList;
use crate::config::NodeConfig;
use crate::events::ControlEvent;
use crate::fsm::context::{Effect, ModeContext, ModeInput};
use crate::fsm::states::build_mode_table;
use crate::fsm::{Mode, ModeMachine};
use crate::power::{SleepPlan, SleepPlanner, WakeReason};

use super::advertising::{AdvIntent, AdvertisingOrchestrator};
use super::events::AppEvent;
use super::ports::{EventSink, IdleTimerPort, Indication, IndicatorPort, RadioPort, SensorPort};

/// What the runtime should do after an input has been processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Keep waiting for events.
    Continue,
    /// Persist state and enter deep sleep with this plan.
    Suspend(SleepPlan),
}

// ───────────────────────────────────────────────────────────────
// NodeService
// ───────────────────────────────────────────────────────────────

pub struct NodeService {
    machine: ModeMachine,
    ctx: ModeContext,
    adv: AdvertisingOrchestrator,
    planner: SleepPlanner,
    idle_timeout: Duration,
}

impl NodeService {
    /// Construct the service around the allow-list restored from
    /// retained memory.
    pub fn new(config: NodeConfig, allow_list: AllowList) -> Self {
        let adv = AdvertisingOrchestrator::new(&config);
        let planner = SleepPlanner::from_config(&config);
        let idle_timeout = Duration::from_millis(u64::from(config.idle_timeout_ms));
        Self {
            machine: ModeMachine::new(build_mode_table()),
            ctx: ModeContext::new(config, allow_list),
            adv,
            planner,
            idle_timeout,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Begin a wake cycle.
    ///
    /// | Wake reason      | Action                                  |
    /// |------------------|-----------------------------------------|
    /// | `Timer`          | broadcast a reading                     |
    /// | `Button`         | stay awake; the press is replayed       |
    /// | `PowerOn`/`Other`| go straight back to sleep               |
    pub fn start(
        &mut self,
        wake: WakeReason,
        hw: &mut (impl RadioPort + SensorPort + IndicatorPort + IdleTimerPort),
        sink: &mut impl EventSink,
    ) -> Step {
        self.machine.start(&mut self.ctx);
        sink.emit(&AppEvent::Started {
            wake,
            peers: self.ctx.allow_list.len(),
        });
        info!("NodeService started (wake={:?})", wake);
        self.ctx.allow_list.log_contents();

        match wake {
            WakeReason::Timer => self.handle(ControlEvent::WakeTimer, hw, sink),
            WakeReason::Button => {
                self.arm_idle_timer(hw);
                Step::Continue
            }
            WakeReason::PowerOn | WakeReason::Other => self.suspend(hw, sink),
        }
    }

    // ── Event handling ────────────────────────────────────────

    /// Process one control event to completion.
    pub fn handle(
        &mut self,
        event: ControlEvent,
        hw: &mut (impl RadioPort + SensorPort + IndicatorPort + IdleTimerPort),
        sink: &mut impl EventSink,
    ) -> Step {
        let mode = self.machine.current_mode();
        let input = match event {
            ControlEvent::Press(kind) => {
                info!("press: {} in {}", kind, mode);
                Some(ModeInput::Press(kind))
            }
            ControlEvent::WakeTimer => Some(ModeInput::WakeTimer),
            ControlEvent::IdleTimeout => Some(ModeInput::IdleTimeout),
            ControlEvent::Radio(radio) => self.adv.interpret(&radio, mode),
        };
        let Some(input) = input else {
            return Step::Continue;
        };

        if let Some((from, to)) = self.machine.handle(&mut self.ctx, &input) {
            sink.emit(&AppEvent::ModeChanged { from, to });
        }
        self.apply_effects(hw, sink);

        if self.ctx.take_suspend() {
            return self.suspend(hw, sink);
        }
        Step::Continue
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn mode(&self) -> Mode {
        self.machine.current_mode()
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.ctx.allow_list
    }

    pub fn config(&self) -> &NodeConfig {
        &self.ctx.config
    }

    /// Whether any advertising is on air as far as the controller knows.
    pub fn advertising(&self) -> bool {
        self.adv.in_flight().is_some()
    }

    // ── Internal ──────────────────────────────────────────────

    fn apply_effects(
        &mut self,
        hw: &mut (impl RadioPort + SensorPort + IndicatorPort + IdleTimerPort),
        sink: &mut impl EventSink,
    ) {
        let effects = core::mem::take(&mut self.ctx.effects);
        for effect in effects {
            match effect {
                Effect::Advertise(intent) => {
                    // The mode is kept; the user can cancel with the same press.
                    if let Err(e) = self.adv.advertise(hw, &intent) {
                        warn!("advertising {:?} failed to start: {}", intent.tag(), e);
                    }
                }
                Effect::BroadcastReading => self.broadcast_reading(hw, sink),
                Effect::StopAdvertising => self.adv.stop(hw),
                Effect::Disconnect(conn) => {
                    if let Err(e) = hw.disconnect(conn) {
                        warn!("disconnect handle {} failed: {}", conn.0, e);
                    }
                }
                Effect::Indicate(indication) => hw.indicate(indication),
                Effect::ArmIdleTimer => self.arm_idle_timer(hw),
                Effect::CancelIdleTimer => hw.cancel_idle_timer(),
                Effect::Emit(event) => sink.emit(&event),
            }
        }
    }

    /// Sample once and start the Data broadcast.  Any failure ends the
    /// cycle, since there is nothing else to do on a timer wake.
    fn broadcast_reading(
        &mut self,
        hw: &mut (impl RadioPort + SensorPort + IndicatorPort),
        sink: &mut impl EventSink,
    ) {
        let reading = match hw.read_temperature() {
            Ok(r) => r,
            Err(e) => {
                warn!("sensor read failed: {}", e);
                hw.indicate(Indication::Off);
                self.ctx.request_suspend();
                return;
            }
        };
        info!("reading: {}", reading);
        match self.adv.advertise(hw, &AdvIntent::Data(reading)) {
            Ok(()) => sink.emit(&AppEvent::ReadingBroadcast(reading)),
            Err(e) => {
                warn!("data broadcast failed to start: {}", e);
                hw.indicate(Indication::Off);
                self.ctx.request_suspend();
            }
        }
    }

    fn arm_idle_timer(&mut self, hw: &mut impl IdleTimerPort) {
        if let Err(e) = hw.arm_idle_timer(self.idle_timeout) {
            warn!("idle timer arm failed: {}", e);
        }
    }

    /// Quiesce the radio and timers and pick the next wake source.
    fn suspend(
        &mut self,
        hw: &mut (impl RadioPort + IdleTimerPort),
        sink: &mut impl EventSink,
    ) -> Step {
        self.adv.cancel(hw);
        hw.cancel_idle_timer();
        let plan = self.planner.compute_plan(self.ctx.allow_list.is_empty());
        sink.emit(&AppEvent::Suspending(plan));
        Step::Suspend(plan)
    }
}
