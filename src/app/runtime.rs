//! The control task.
//!
//! Single consumer of [`CONTROL_CHANNEL`](crate::events::CONTROL_CHANNEL).
//! Owns the [`NodeService`] and every port it drives, so the mode machine
//! and the allow-list have exactly one writer.  When the service asks to
//! suspend, the task writes the allow-list to retained storage and hands
//! the plan to the [`SleepPlanner`]; that call does not return.

use core::convert::Infallible;

use log::info;

use crate::events::{self, ControlEvent};
use crate::power::{SleepPlan, SleepPlanner};

use super::ports::{
    AllowListStore, EventSink, IdleTimerPort, IndicatorPort, PowerPort, RadioPort, SensorPort,
};
use super::service::{NodeService, Step};

pub struct ControlTask<HW, P, S, E> {
    service: NodeService,
    planner: SleepPlanner,
    hw: HW,
    power: P,
    store: S,
    sink: E,
}

impl<HW, P, S, E> ControlTask<HW, P, S, E>
where
    HW: RadioPort + SensorPort + IndicatorPort + IdleTimerPort,
    P: PowerPort,
    S: AllowListStore,
    E: EventSink,
{
    pub fn new(service: NodeService, hw: HW, power: P, store: S, sink: E) -> Self {
        let planner = SleepPlanner::from_config(service.config());
        Self {
            service,
            planner,
            hw,
            power,
            store,
            sink,
        }
    }

    /// Start the wake cycle from the boot wake cause.  Returns the plan if
    /// the cycle ends immediately.
    pub fn boot(&mut self) -> Option<SleepPlan> {
        let wake = self.power.wake_reason();
        let step = self.service.start(wake, &mut self.hw, &mut self.sink);
        self.settle(step)
    }

    /// Process one event.  Returns the plan if the cycle is over; the
    /// allow-list has already been persisted by then.
    pub fn dispatch(&mut self, event: ControlEvent) -> Option<SleepPlan> {
        let step = self.service.handle(event, &mut self.hw, &mut self.sink);
        self.settle(step)
    }

    /// Run until the cycle ends in deep sleep.
    pub async fn run(mut self) -> Infallible {
        if let Some(plan) = self.boot() {
            self.sleep(plan);
        }
        loop {
            let event = events::next_event().await;
            if let Some(plan) = self.dispatch(event) {
                self.sleep(plan);
            }
        }
    }

    pub fn service(&self) -> &NodeService {
        &self.service
    }

    pub fn hw(&self) -> &HW {
        &self.hw
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }

    fn settle(&mut self, step: Step) -> Option<SleepPlan> {
        match step {
            Step::Continue => None,
            Step::Suspend(plan) => {
                self.store.store(self.service.allow_list());
                Some(plan)
            }
        }
    }

    fn sleep(&mut self, plan: SleepPlan) -> ! {
        info!("control: cycle over, {} peer(s) retained", self.service.allow_list().len());
        self.planner.apply(plan, &mut self.power)
    }
}
