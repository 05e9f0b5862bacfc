//! Integration tests for the ControlTask → NodeService → ports pipeline.
//!
//! Each test plays one wake cycle: boot from a wake cause, feed control
//! events as the ISR, timers and radio would, and check what reached the
//! hardware, what was retained and which sleep plan ended the cycle.

use embassy_time::Duration;

use tempnode::adapters::retained::MemoryAllowListStore;
use tempnode::allow_list::{AddressKind, AllowList, PeerAddress};
use tempnode::app::advertising::{AdvDuration, Discoverability, RadioEvent};
use tempnode::app::events::AppEvent;
use tempnode::app::ports::{AllowListStore, ConnHandle, Indication};
use tempnode::app::runtime::ControlTask;
use tempnode::app::service::NodeService;
use tempnode::config::NodeConfig;
use tempnode::drivers::button::PressKind;
use tempnode::error::Error;
use tempnode::events::ControlEvent;
use tempnode::fsm::Mode;
use tempnode::power::{SleepPlan, WakeReason};
use tempnode::sensors::SensorReading;

use crate::mock_hw::{HwCall, MockHardware, MockPower, RecordingSink};

type Task = ControlTask<MockHardware, MockPower, MemoryAllowListStore, RecordingSink>;

const GATEWAY: PeerAddress =
    PeerAddress::new(AddressKind::Public, [0x66, 0x55, 0x44, 0x33, 0x22, 0x11]);
const STRANGER: PeerAddress = PeerAddress::new(AddressKind::Random, [1, 1, 1, 1, 1, 1]);
const CYCLE: Duration = Duration::from_millis(5000);

fn store_with(peers: &[PeerAddress]) -> MemoryAllowListStore {
    let mut list = AllowList::new();
    for peer in peers {
        list.push(*peer).unwrap();
    }
    let mut store = MemoryAllowListStore::new();
    store.store(&list);
    store
}

fn task_with(wake: WakeReason, store: MemoryAllowListStore, hw: MockHardware) -> Task {
    let service = NodeService::new(NodeConfig::default(), store.load());
    ControlTask::new(service, hw, MockPower::waking_on(wake), store, RecordingSink::new())
}

fn boot(wake: WakeReason, peers: &[PeerAddress]) -> (Task, Option<SleepPlan>) {
    let mut task = task_with(wake, store_with(peers), MockHardware::new());
    let plan = task.boot();
    (task, plan)
}

fn press(task: &mut Task, kind: PressKind) -> Option<SleepPlan> {
    task.dispatch(ControlEvent::Press(kind))
}

fn connect(task: &mut Task, conn: u16, peer: PeerAddress) -> Option<SleepPlan> {
    task.dispatch(ControlEvent::Radio(RadioEvent::Connected {
        conn: ConnHandle(conn),
        peer,
    }))
}

fn retained(task: &Task) -> AllowList {
    task.store().load()
}

// ── Boot dispatch ─────────────────────────────────────────────

#[test]
fn power_on_goes_straight_back_to_sleep() {
    let (task, plan) = boot(WakeReason::PowerOn, &[]);
    assert_eq!(plan, Some(SleepPlan::WakeOnEdge));
    assert!(task.hw().advertised().is_empty());
    assert!(retained(&task).is_empty());
}

#[test]
fn power_on_with_retained_peer_keeps_the_cycle_timer() {
    let (task, plan) = boot(WakeReason::Other, &[GATEWAY]);
    assert_eq!(plan, Some(SleepPlan::WakeOnEdgeOrAfter(CYCLE)));
    assert!(retained(&task).contains(&GATEWAY));
}

#[test]
fn button_wake_stays_awake_with_idle_timer() {
    let (task, plan) = boot(WakeReason::Button, &[]);
    assert_eq!(plan, None);
    assert_eq!(task.service().mode(), Mode::Idle);
    assert!(task.hw().idle_armed());
    assert!(task.hw().calls.contains(&HwCall::ArmIdle(Duration::from_millis(30_000))));
}

// ── Periodic broadcast ────────────────────────────────────────

#[test]
fn timer_wake_broadcasts_reading_then_sleeps() {
    let (mut task, plan) = boot(WakeReason::Timer, &[GATEWAY]);
    assert_eq!(plan, None);

    let adv = task.hw().advertised();
    assert_eq!(adv.len(), 1);
    assert_eq!(adv[0].frame.as_slice(), &[0x00, 0x03, 0x24, 0x80]);
    assert_eq!(adv[0].discoverability, Discoverability::NonDiscoverable);
    assert!(adv[0].connectable);
    assert_eq!(adv[0].target, None);
    assert_eq!(adv[0].duration, AdvDuration::Millis(1000));
    assert_eq!(task.hw().last_indication(), Some(Indication::Solid));
    assert!(
        task.sink()
            .events
            .contains(&AppEvent::ReadingBroadcast(SensorReading::new([0x24, 0x80])))
    );

    let plan = task.dispatch(ControlEvent::Radio(RadioEvent::AdvertisingComplete { reason: 0 }));
    assert_eq!(plan, Some(SleepPlan::WakeOnEdgeOrAfter(CYCLE)));
    assert_eq!(task.hw().last_indication(), Some(Indication::Off));
    assert!(retained(&task).contains(&GATEWAY));
}

#[test]
fn sensor_failure_ends_broadcast_cycle() {
    let mut hw = MockHardware::new();
    hw.reading = Err(tempnode::error::HardwareError::Bus);
    let mut task = task_with(WakeReason::Timer, store_with(&[GATEWAY]), hw);

    assert_eq!(task.boot(), Some(SleepPlan::WakeOnEdgeOrAfter(CYCLE)));
    assert!(task.hw().advertised().is_empty());
    assert_eq!(task.hw().last_indication(), Some(Indication::Off));
}

#[test]
fn radio_failure_ends_broadcast_cycle() {
    let mut hw = MockHardware::new();
    hw.fail_advertising = true;
    let mut task = task_with(WakeReason::Timer, store_with(&[GATEWAY]), hw);

    assert_eq!(task.boot(), Some(SleepPlan::WakeOnEdgeOrAfter(CYCLE)));
}

#[test]
fn connection_to_data_broadcast_is_dropped() {
    let (mut task, _) = boot(WakeReason::Timer, &[GATEWAY]);
    let plan = connect(&mut task, 4, STRANGER);
    assert_eq!(plan, Some(SleepPlan::WakeOnEdgeOrAfter(CYCLE)));
    assert_eq!(task.hw().disconnects(), vec![ConnHandle(4)]);
    assert_eq!(retained(&task).len(), 1);
}

// ── Registration ──────────────────────────────────────────────

#[test]
fn registration_round_trip_retains_peer() {
    let (mut task, _) = boot(WakeReason::Button, &[]);

    assert_eq!(press(&mut task, PressKind::Medium), None);
    assert_eq!(task.service().mode(), Mode::Registering);
    assert!(!task.hw().idle_armed());
    let adv = task.hw().advertised();
    assert_eq!(adv.len(), 1);
    assert_eq!(adv[0].frame.as_slice(), &[0x00, 0x01]);
    assert_eq!(adv[0].discoverability, Discoverability::General);
    assert_eq!(adv[0].duration, AdvDuration::Forever);
    assert_eq!(task.hw().last_indication(), Some(Indication::Solid));

    assert_eq!(connect(&mut task, 1, GATEWAY), None);
    assert_eq!(task.service().mode(), Mode::Idle);
    assert!(task.service().allow_list().contains(&GATEWAY));
    assert_eq!(task.hw().disconnects(), vec![ConnHandle(1)]);
    assert_eq!(
        task.hw().last_indication(),
        Some(Indication::Blink {
            on_ms: 100,
            off_ms: 100
        })
    );
    assert!(task.hw().idle_armed());

    let plan = task.dispatch(ControlEvent::IdleTimeout);
    assert_eq!(plan, Some(SleepPlan::WakeOnEdgeOrAfter(CYCLE)));
    assert!(retained(&task).contains(&GATEWAY));
}

#[test]
fn medium_press_cancels_registration_and_sleeps() {
    let (mut task, _) = boot(WakeReason::Button, &[]);
    press(&mut task, PressKind::Medium);

    let plan = press(&mut task, PressKind::Medium);
    assert_eq!(plan, Some(SleepPlan::WakeOnEdge));
    assert_eq!(task.service().mode(), Mode::Idle);
    assert!(task.hw().calls.contains(&HwCall::StopAdvertising));
    assert_eq!(task.hw().last_indication(), Some(Indication::Off));
    assert!(retained(&task).is_empty());
}

#[test]
fn full_list_rejects_second_peer() {
    let (mut task, _) = boot(WakeReason::Button, &[GATEWAY]);
    press(&mut task, PressKind::Medium);
    connect(&mut task, 2, STRANGER);

    assert_eq!(task.service().mode(), Mode::Idle);
    assert!(!task.service().allow_list().contains(&STRANGER));
    assert_eq!(task.hw().disconnects(), vec![ConnHandle(2)]);
    assert_eq!(task.hw().last_indication(), Some(Indication::Off));
    assert!(task.sink().events.contains(&AppEvent::PeerRejected {
        peer: STRANGER,
        reason: Error::Capacity
    }));
}

#[test]
fn failed_connect_keeps_registering() {
    let (mut task, _) = boot(WakeReason::Button, &[]);
    press(&mut task, PressKind::Medium);
    let calls_before = task.hw().calls.len();

    let plan = task.dispatch(ControlEvent::Radio(RadioEvent::ConnectFailed { status: 0x3e }));
    assert_eq!(plan, None);
    assert_eq!(task.service().mode(), Mode::Registering);
    assert_eq!(task.hw().calls.len(), calls_before);
}

#[test]
fn registration_leaves_radio_quiet_after_connection() {
    let (mut task, _) = boot(WakeReason::Button, &[]);
    press(&mut task, PressKind::Medium);
    assert!(task.hw().on_air());

    connect(&mut task, 1, GATEWAY);
    assert_eq!(task.service().mode(), Mode::Idle);
    assert!(!task.hw().on_air());
    let calls_before = task.hw().calls.len();

    // A late connect failure must not bring the session's advertising back.
    let plan = task.dispatch(ControlEvent::Radio(RadioEvent::ConnectFailed { status: 0x3e }));
    assert_eq!(plan, None);
    assert_eq!(task.service().mode(), Mode::Idle);
    assert_eq!(task.hw().calls.len(), calls_before);
    assert!(!task.hw().on_air());
    assert_eq!(task.hw().advertised().len(), 1);
}

#[test]
fn stale_advertising_complete_keeps_button_wake_awake() {
    let (mut task, _) = boot(WakeReason::Button, &[GATEWAY]);
    let plan = task.dispatch(ControlEvent::Radio(RadioEvent::AdvertisingComplete { reason: 0 }));
    assert_eq!(plan, None);
    assert_eq!(task.service().mode(), Mode::Idle);
    assert!(task.hw().idle_armed());
}

#[test]
fn advertising_complete_does_not_end_a_session() {
    let (mut task, _) = boot(WakeReason::Button, &[]);
    press(&mut task, PressKind::Medium);
    let plan = task.dispatch(ControlEvent::Radio(RadioEvent::AdvertisingComplete { reason: 0 }));
    assert_eq!(plan, None);
    assert_eq!(task.service().mode(), Mode::Registering);
}

#[test]
fn idle_timeout_ignored_while_registering() {
    let (mut task, _) = boot(WakeReason::Button, &[]);
    press(&mut task, PressKind::Medium);
    assert_eq!(task.dispatch(ControlEvent::IdleTimeout), None);
    assert_eq!(task.service().mode(), Mode::Registering);
}

// ── Deletion ──────────────────────────────────────────────────

#[test]
fn long_press_with_empty_list_stays_idle() {
    let (mut task, _) = boot(WakeReason::Button, &[]);
    assert_eq!(press(&mut task, PressKind::Long), None);
    assert_eq!(task.service().mode(), Mode::Idle);
    assert!(task.hw().advertised().is_empty());
    assert!(task.hw().idle_armed());
}

#[test]
fn deletion_round_trip_forgets_peer() {
    let (mut task, _) = boot(WakeReason::Button, &[GATEWAY]);

    press(&mut task, PressKind::Long);
    assert_eq!(task.service().mode(), Mode::Deleting);
    let adv = task.hw().advertised();
    assert_eq!(adv.len(), 1);
    assert_eq!(adv[0].frame.as_slice(), &[0x00, 0x02]);
    assert_eq!(adv[0].target, Some(GATEWAY));
    assert_eq!(adv[0].discoverability, Discoverability::NonDiscoverable);

    connect(&mut task, 9, GATEWAY);
    assert_eq!(task.service().mode(), Mode::Idle);
    assert!(task.service().allow_list().is_empty());
    assert_eq!(
        task.hw().last_indication(),
        Some(Indication::Blink {
            on_ms: 700,
            off_ms: 700
        })
    );
    assert!(task.sink().events.contains(&AppEvent::PeerRemoved(GATEWAY)));

    let plan = task.dispatch(ControlEvent::IdleTimeout);
    assert_eq!(plan, Some(SleepPlan::WakeOnEdge));
    assert!(retained(&task).is_empty());
}

#[test]
fn deletion_by_unknown_peer_keeps_list() {
    let (mut task, _) = boot(WakeReason::Button, &[GATEWAY]);
    press(&mut task, PressKind::Long);
    connect(&mut task, 3, STRANGER);

    assert_eq!(task.service().mode(), Mode::Idle);
    assert!(task.service().allow_list().contains(&GATEWAY));
    assert_eq!(task.hw().last_indication(), Some(Indication::Off));
    assert_eq!(task.hw().disconnects(), vec![ConnHandle(3)]);
}

#[test]
fn long_press_cancels_deletion_and_sleeps() {
    let (mut task, _) = boot(WakeReason::Button, &[GATEWAY]);
    press(&mut task, PressKind::Long);
    let plan = press(&mut task, PressKind::Long);
    assert_eq!(plan, Some(SleepPlan::WakeOnEdgeOrAfter(CYCLE)));
    assert!(retained(&task).contains(&GATEWAY));
}

#[test]
fn sessions_ignore_the_other_bucket() {
    let (mut task, _) = boot(WakeReason::Button, &[GATEWAY]);
    press(&mut task, PressKind::Long);
    assert_eq!(press(&mut task, PressKind::Medium), None);
    assert_eq!(press(&mut task, PressKind::Short), None);
    assert_eq!(task.service().mode(), Mode::Deleting);
}

// ── Idle timeout ──────────────────────────────────────────────

#[test]
fn short_press_rearms_idle_timer() {
    let (mut task, _) = boot(WakeReason::Button, &[]);
    let armed_before = task
        .hw()
        .calls
        .iter()
        .filter(|c| matches!(c, HwCall::ArmIdle(_)))
        .count();
    press(&mut task, PressKind::Short);
    let armed_after = task
        .hw()
        .calls
        .iter()
        .filter(|c| matches!(c, HwCall::ArmIdle(_)))
        .count();
    assert_eq!(armed_after, armed_before + 1);

    assert_eq!(task.dispatch(ControlEvent::IdleTimeout), Some(SleepPlan::WakeOnEdge));
}
