//! BLE radio adapter.
//!
//! Implements [`RadioPort`] on top of the NimBLE host and turns GAP events
//! into [`ControlEvent::Radio`] for the control task.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: NimBLE host via `esp_idf_svc::sys`.
//! - **all other targets**: simulation stub that records requests.
//!
//! ## Advertisement layout
//!
//! | AD field           | Value                                 |
//! |--------------------|---------------------------------------|
//! | Flags              | BR/EDR not supported                  |
//! | Complete name      | `tempnode-xxyyzz`                     |
//! | Complete UUID16    | `0x1809` (Health Thermometer)         |
//! | Manufacturer data  | encoded [`Frame`](crate::frame)       |
//!
//! The GAP callback runs on the NimBLE host task.  It never touches the
//! mode machine or the allow-list; it only queues events.

use log::{error, info, warn};

use crate::adapters::device_id::AdvName;
use crate::app::advertising::{AdvDuration, AdvertisingParams, Discoverability};
use crate::app::ports::{ConnHandle, RadioPort};
use crate::error::HardwareError;

// ───────────────────────────────────────────────────────────────
// Constants (NimBLE values, duplicated so host builds can map params)
// ───────────────────────────────────────────────────────────────

/// Health Thermometer service.
pub const SERVICE_UUID16: u16 = 0x1809;

const CONN_MODE_NON: u8 = 0;
const CONN_MODE_UND: u8 = 2;
const DISC_MODE_NON: u8 = 0;
const DISC_MODE_GEN: u8 = 2;
/// Accept scan and connect requests from anyone.
const FILTER_NONE: u8 = 0;
/// Scan and connect requests only from the white list.
const FILTER_WHITE_LIST: u8 = 3;
/// `BLE_HS_FOREVER`.
const DURATION_FOREVER: i32 = i32::MAX;
/// HCI "remote user terminated connection".
#[cfg(target_os = "espidf")]
const REASON_USER_TERMINATED: u8 = 0x13;

// ───────────────────────────────────────────────────────────────
// GAP settings
// ───────────────────────────────────────────────────────────────

/// GAP-level settings derived from [`AdvertisingParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapAdvSettings {
    pub conn_mode: u8,
    pub disc_mode: u8,
    pub filter_policy: u8,
    pub duration_ms: i32,
}

impl GapAdvSettings {
    pub fn from_params(params: &AdvertisingParams) -> Self {
        let duration_ms = match params.duration {
            AdvDuration::Forever => DURATION_FOREVER,
            AdvDuration::Millis(ms) => i32::try_from(ms).unwrap_or(DURATION_FOREVER),
        };
        Self {
            conn_mode: if params.connectable { CONN_MODE_UND } else { CONN_MODE_NON },
            disc_mode: match params.discoverability {
                Discoverability::General => DISC_MODE_GEN,
                Discoverability::NonDiscoverable => DISC_MODE_NON,
            },
            filter_policy: if params.target.is_some() {
                FILTER_WHITE_LIST
            } else {
                FILTER_NONE
            },
            duration_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleState {
    Idle,
    Advertising,
    /// Host stack failed to come up; every request is refused.
    Failed,
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF NimBLE glue
// ───────────────────────────────────────────────────────────────
//
// NimBLE callbacks are C function pointers that cannot capture Rust
// closures.  These statics bridge the host task to the adapter.

#[cfg(target_os = "espidf")]
mod host {
    use core::cell::RefCell;
    use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

    use embassy_sync::blocking_mutex::Mutex;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use esp_idf_svc::sys::*;
    use log::{debug, info, warn};

    use super::{GapAdvSettings, SERVICE_UUID16};
    use crate::allow_list::{AddressKind, PeerAddress};
    use crate::app::advertising::{AdvertisingParams, RadioEvent};
    use crate::app::ports::ConnHandle;
    use crate::events::{ControlEvent, push_event};

    pub(super) static SYNCED: AtomicBool = AtomicBool::new(false);
    static OWN_ADDR_TYPE: AtomicU8 = AtomicU8::new(0);

    /// Name buffer handed to NimBLE; NUL-terminated.
    pub(super) static NAME: Mutex<CriticalSectionRawMutex, RefCell<[u8; 17]>> =
        Mutex::new(RefCell::new([0; 17]));

    /// Last advertising request, restarted after a failed connect.
    pub(super) static LAST_ADV: Mutex<CriticalSectionRawMutex, RefCell<Option<AdvertisingParams>>> =
        Mutex::new(RefCell::new(None));

    pub(super) unsafe extern "C" fn on_sync() {
        let mut addr_type: u8 = 0;
        // SAFETY: out-pointer to a live local.
        let rc = unsafe { ble_hs_id_infer_auto(0, &mut addr_type) };
        if rc != 0 {
            warn!("BLE: address type inference failed ({})", rc);
            return;
        }
        OWN_ADDR_TYPE.store(addr_type, Ordering::Relaxed);
        SYNCED.store(true, Ordering::Release);
        info!("BLE: host synced (own addr type {})", addr_type);
    }

    pub(super) unsafe extern "C" fn on_reset(reason: i32) {
        SYNCED.store(false, Ordering::Release);
        warn!("BLE: host reset (reason={})", reason);
    }

    pub(super) unsafe extern "C" fn host_task(_arg: *mut core::ffi::c_void) {
        // SAFETY: runs on the task created by nimble_port_freertos_init.
        unsafe {
            nimble_port_run();
            nimble_port_freertos_deinit();
        }
    }

    fn peer_from(addr: &ble_addr_t) -> PeerAddress {
        PeerAddress::new(AddressKind::from_raw(addr.type_), addr.val)
    }

    /// Set advertisement fields and start advertising.  Returns the NimBLE rc.
    pub(super) unsafe fn start(params: &AdvertisingParams) -> i32 {
        let gap = GapAdvSettings::from_params(params);

        NAME.lock(|name| {
            let name = name.borrow();
            let name_len = name.iter().position(|&b| b == 0).unwrap_or(name.len());
            let uuids = [ble_uuid16_t {
                u: ble_uuid_t {
                    type_: BLE_UUID_TYPE_16 as u8,
                },
                value: SERVICE_UUID16,
            }];

            // SAFETY: all-zero is a valid `ble_hs_adv_fields`; every pointer
            // stays valid until ble_gap_adv_set_fields has copied the data.
            let mut fields: ble_hs_adv_fields = unsafe { core::mem::zeroed() };
            fields.flags = BLE_HS_ADV_F_BREDR_UNSUP as u8;
            fields.name = name.as_ptr();
            fields.name_len = name_len as u8;
            fields.set_name_is_complete(1);
            fields.uuids16 = uuids.as_ptr();
            fields.num_uuids16 = 1;
            fields.set_uuids16_is_complete(1);
            fields.mfg_data = params.frame.as_ptr();
            fields.mfg_data_len = params.frame.len() as u8;

            let rc = unsafe { ble_gap_adv_set_fields(&fields) };
            if rc != 0 {
                return rc;
            }

            if let Some(target) = params.target {
                // White-list entries take plain public/random types.
                let wl = ble_addr_t {
                    type_: (target.kind as u8) & 1,
                    val: target.bytes,
                };
                let rc = unsafe { ble_gap_wl_set(&wl, 1) };
                if rc != 0 {
                    return rc;
                }
            }

            // SAFETY: all-zero is a valid `ble_gap_adv_params`.
            let mut adv: ble_gap_adv_params = unsafe { core::mem::zeroed() };
            adv.conn_mode = gap.conn_mode;
            adv.disc_mode = gap.disc_mode;
            adv.itvl_min = params.interval_min;
            adv.itvl_max = params.interval_max;
            adv.filter_policy = gap.filter_policy;

            unsafe {
                ble_gap_adv_start(
                    OWN_ADDR_TYPE.load(Ordering::Relaxed),
                    core::ptr::null(),
                    gap.duration_ms,
                    &adv,
                    Some(gap_event),
                    core::ptr::null_mut(),
                )
            }
        })
    }

    unsafe extern "C" fn gap_event(event: *mut ble_gap_event, _arg: *mut core::ffi::c_void) -> i32 {
        // SAFETY: NimBLE passes a valid event for the duration of the call.
        let event = unsafe { &*event };
        let radio = match u32::from(event.type_) {
            BLE_GAP_EVENT_ADV_COMPLETE => {
                let reason = unsafe { event.__bindgen_anon_1.adv_complete.reason };
                Some(RadioEvent::AdvertisingComplete { reason })
            }
            BLE_GAP_EVENT_CONNECT => {
                let connect = unsafe { event.__bindgen_anon_1.connect };
                if connect.status == 0 {
                    // Advertising ended with this connection; nothing to resume.
                    LAST_ADV.lock(|last| *last.borrow_mut() = None);
                    let mut desc: ble_gap_conn_desc = unsafe { core::mem::zeroed() };
                    let rc = unsafe { ble_gap_conn_find(connect.conn_handle, &mut desc) };
                    if rc == 0 {
                        Some(RadioEvent::Connected {
                            conn: ConnHandle(connect.conn_handle),
                            peer: peer_from(&desc.peer_id_addr),
                        })
                    } else {
                        warn!("BLE: connection {} vanished (rc={})", connect.conn_handle, rc);
                        None
                    }
                } else {
                    restart_last();
                    Some(RadioEvent::ConnectFailed {
                        status: connect.status,
                    })
                }
            }
            BLE_GAP_EVENT_DISCONNECT => {
                let disconnect = unsafe { event.__bindgen_anon_1.disconnect };
                Some(RadioEvent::Disconnected {
                    peer: peer_from(&disconnect.conn.peer_id_addr),
                    reason: disconnect.reason,
                })
            }
            other => {
                debug!("BLE: unhandled GAP event {}", other);
                None
            }
        };

        if let Some(radio) = radio {
            if !push_event(ControlEvent::Radio(radio)) {
                warn!("BLE: control queue full, dropped {:?}", radio);
            }
        }
        0
    }

    /// Resume whatever was advertising before a failed connect attempt.
    fn restart_last() {
        let last = LAST_ADV.lock(|last| last.borrow().clone());
        if let Some(params) = last {
            // SAFETY: called on the host task, which serialises GAP calls.
            let rc = unsafe { start(&params) };
            if rc != 0 {
                warn!("BLE: advertising restart failed ({})", rc);
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// BLE adapter
// ───────────────────────────────────────────────────────────────

pub struct BleRadio {
    name: AdvName,
    state: BleState,
    #[cfg(not(target_os = "espidf"))]
    started: Vec<AdvertisingParams>,
    #[cfg(not(target_os = "espidf"))]
    disconnected: Vec<ConnHandle>,
}

impl BleRadio {
    /// Bring up the host stack and wait for it to sync.  On failure the
    /// adapter is returned in [`BleState::Failed`] and refuses every request.
    pub fn new(name: AdvName) -> Self {
        let mut radio = Self {
            name,
            state: BleState::Idle,
            #[cfg(not(target_os = "espidf"))]
            started: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            disconnected: Vec::new(),
        };
        if let Err(e) = radio.platform_init() {
            error!("BLE: init failed ({}), radio inert", e);
            radio.state = BleState::Failed;
        }
        radio
    }

    pub fn state(&self) -> BleState {
        self.state
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    fn ensure_ready(&self) -> Result<(), HardwareError> {
        if self.state == BleState::Failed {
            Err(HardwareError::Unavailable)
        } else {
            Ok(())
        }
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_init(&mut self) -> Result<(), HardwareError> {
        use core::sync::atomic::Ordering;
        use esp_idf_svc::hal::delay::FreeRtos;
        use esp_idf_svc::sys::*;

        const SYNC_POLL_MS: u32 = 10;
        const SYNC_TIMEOUT_MS: u32 = 2_000;

        host::NAME.lock(|buf| {
            let mut buf = buf.borrow_mut();
            let bytes = self.name.as_bytes();
            buf[..bytes.len()].copy_from_slice(bytes);
            buf[bytes.len()] = 0;
        });

        // SAFETY: called once from the main task before the host task exists.
        unsafe {
            let ret = nimble_port_init();
            if ret != ESP_OK as i32 {
                return Err(HardwareError::Radio(ret));
            }
            let rc = host::NAME
                .lock(|buf| ble_svc_gap_device_name_set(buf.borrow().as_ptr().cast()));
            if rc != 0 {
                return Err(HardwareError::Radio(rc));
            }
            ble_svc_gap_init();
            ble_svc_gatt_init();

            let cfg = &raw mut ble_hs_cfg;
            (*cfg).sync_cb = Some(host::on_sync);
            (*cfg).reset_cb = Some(host::on_reset);

            nimble_port_freertos_init(Some(host::host_task));
        }

        let mut waited = 0;
        while !host::SYNCED.load(Ordering::Acquire) {
            if waited >= SYNC_TIMEOUT_MS {
                return Err(HardwareError::Unavailable);
            }
            FreeRtos::delay_ms(SYNC_POLL_MS);
            waited += SYNC_POLL_MS;
        }
        info!("BLE(espidf): NimBLE up as '{}' after {} ms", self.name, waited);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_init(&mut self) -> Result<(), HardwareError> {
        info!("BLE(sim): host ready as '{}'", self.name);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self, params: &AdvertisingParams) -> Result<(), HardwareError> {
        host::LAST_ADV.lock(|last| *last.borrow_mut() = Some(params.clone()));
        // SAFETY: GAP calls from the control task; NimBLE locks internally.
        let rc = unsafe { host::start(params) };
        if rc != 0 {
            return Err(HardwareError::Radio(rc));
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self, params: &AdvertisingParams) -> Result<(), HardwareError> {
        self.started.push(params.clone());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop(&mut self) -> Result<(), HardwareError> {
        use esp_idf_svc::sys::*;
        host::LAST_ADV.lock(|last| *last.borrow_mut() = None);
        // SAFETY: plain GAP request.
        let rc = unsafe { ble_gap_adv_stop() };
        // BLE_HS_EALREADY: nothing was advertising.
        if rc != 0 && rc != BLE_HS_EALREADY as i32 {
            return Err(HardwareError::Radio(rc));
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&mut self) -> Result<(), HardwareError> {
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self, conn: ConnHandle) -> Result<(), HardwareError> {
        use esp_idf_svc::sys::*;
        // SAFETY: plain GAP request.
        let rc = unsafe { ble_gap_terminate(conn.0, REASON_USER_TERMINATED) };
        if rc != 0 {
            return Err(HardwareError::Radio(rc));
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self, conn: ConnHandle) -> Result<(), HardwareError> {
        self.disconnected.push(conn);
        Ok(())
    }

    // ── Simulation accessors ──────────────────────────────────

    /// Every advertising request, oldest first.
    #[cfg(not(target_os = "espidf"))]
    pub fn started(&self) -> &[AdvertisingParams] {
        &self.started
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn disconnected(&self) -> &[ConnHandle] {
        &self.disconnected
    }
}

// ───────────────────────────────────────────────────────────────
// RadioPort implementation
// ───────────────────────────────────────────────────────────────

impl RadioPort for BleRadio {
    fn start_advertising(&mut self, params: &AdvertisingParams) -> Result<(), HardwareError> {
        self.ensure_ready()?;
        self.platform_start(params)?;
        self.state = BleState::Advertising;
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), HardwareError> {
        self.ensure_ready()?;
        self.platform_stop()?;
        self.state = BleState::Idle;
        Ok(())
    }

    fn disconnect(&mut self, conn: ConnHandle) -> Result<(), HardwareError> {
        self.ensure_ready()?;
        if let Err(e) = self.platform_disconnect(conn) {
            warn!("BLE: terminating connection {} failed: {}", conn.0, e);
            return Err(e);
        }
        info!("BLE: terminating connection {}", conn.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::device_id::{adv_name, read_mac};
    use crate::allow_list::{AddressKind, PeerAddress};
    use crate::app::advertising::{AdvIntent, AdvertisingOrchestrator};
    use crate::config::NodeConfig;
    use crate::sensors::SensorReading;

    const PEER: PeerAddress = PeerAddress::new(AddressKind::Public, [1, 2, 3, 4, 5, 6]);

    fn params(intent: AdvIntent) -> AdvertisingParams {
        AdvertisingOrchestrator::new(&NodeConfig::default())
            .params_for(&intent)
            .unwrap()
    }

    #[test]
    fn register_maps_to_general_undirected_forever() {
        let gap = GapAdvSettings::from_params(&params(AdvIntent::Register));
        assert_eq!(gap.conn_mode, CONN_MODE_UND);
        assert_eq!(gap.disc_mode, DISC_MODE_GEN);
        assert_eq!(gap.filter_policy, FILTER_NONE);
        assert_eq!(gap.duration_ms, DURATION_FOREVER);
    }

    #[test]
    fn delete_uses_white_list_filter() {
        let gap = GapAdvSettings::from_params(&params(AdvIntent::Delete { target: PEER }));
        assert_eq!(gap.disc_mode, DISC_MODE_NON);
        assert_eq!(gap.filter_policy, FILTER_WHITE_LIST);
    }

    #[test]
    fn data_broadcast_is_time_limited() {
        let reading = SensorReading::new([0x19, 0x80]);
        let gap = GapAdvSettings::from_params(&params(AdvIntent::Data(reading)));
        assert_eq!(gap.duration_ms, 1000);
        assert_eq!(gap.conn_mode, CONN_MODE_UND);
        assert_eq!(gap.filter_policy, FILTER_NONE);
    }

    #[test]
    fn sim_records_requests() {
        let mut radio = BleRadio::new(adv_name(&read_mac()));
        assert_eq!(radio.state(), BleState::Idle);
        assert_eq!(radio.name(), "tempnode-1a2b3c");

        radio.start_advertising(&params(AdvIntent::Register)).unwrap();
        assert_eq!(radio.state(), BleState::Advertising);
        assert_eq!(radio.started().len(), 1);

        radio.stop_advertising().unwrap();
        radio.disconnect(ConnHandle(7)).unwrap();
        assert_eq!(radio.state(), BleState::Idle);
        assert_eq!(radio.disconnected(), &[ConnHandle(7)]);
    }

    #[test]
    fn failed_radio_refuses_requests() {
        let mut radio = BleRadio::new(adv_name(&read_mac()));
        radio.state = BleState::Failed;
        assert_eq!(
            radio.start_advertising(&params(AdvIntent::Register)),
            Err(HardwareError::Unavailable)
        );
        assert_eq!(radio.disconnect(ConnHandle(1)), Err(HardwareError::Unavailable));
    }
}
