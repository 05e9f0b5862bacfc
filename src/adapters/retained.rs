//! Allow-list storage that survives deep sleep.
//!
//! On the device the slots live in RTC slow memory (`.rtc.data`), which is
//! loaded from the image on power-on and left untouched across deep sleep.
//! Each slot is stored as eight raw bytes so that whatever the memory holds
//! decodes to a valid value:
//!
//! ```text
//!  byte 0      bytes 1..=6          byte 7
//! ┌──────────┬────────────────────┬──────────────────────┐
//! │ addr type│ address (LSB first)│ 0xA5 = occupied      │
//! └──────────┴────────────────────┴──────────────────────┘
//! ```
//!
//! Only the control task touches the store, once at boot and once before
//! suspending.

use log::debug;

use crate::allow_list::{
    ALLOW_LIST_CAPACITY, AddressKind, AllowList, AllowSlot, AllowSlots, PeerAddress,
};
use crate::app::ports::AllowListStore;

const SLOT_BYTES: usize = 8;
const OCCUPIED_MARK: u8 = 0xA5;

/// Raw retained image of the slot array.
pub type RawSlots = [[u8; SLOT_BYTES]; ALLOW_LIST_CAPACITY];

const EMPTY_RAW: RawSlots = [[0; SLOT_BYTES]; ALLOW_LIST_CAPACITY];

pub fn encode_slots(slots: &AllowSlots) -> RawSlots {
    let mut raw = EMPTY_RAW;
    for (out, slot) in raw.iter_mut().zip(slots.iter()) {
        if slot.occupied {
            out[0] = slot.peer.kind as u8;
            out[1..7].copy_from_slice(&slot.peer.bytes);
            out[7] = OCCUPIED_MARK;
        }
    }
    raw
}

pub fn decode_slots(raw: &RawSlots) -> AllowSlots {
    let mut slots = [AllowSlot::EMPTY; ALLOW_LIST_CAPACITY];
    for (slot, bytes) in slots.iter_mut().zip(raw.iter()) {
        if bytes[7] == OCCUPIED_MARK {
            let mut addr = [0u8; 6];
            addr.copy_from_slice(&bytes[1..7]);
            *slot = AllowSlot {
                peer: PeerAddress::new(AddressKind::from_raw(bytes[0]), addr),
                occupied: true,
            };
        }
    }
    slots
}

// ───────────────────────────────────────────────────────────────
// RTC memory (device)
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
#[unsafe(link_section = ".rtc.data")]
static mut RTC_SLOTS: RawSlots = EMPTY_RAW;

/// [`AllowListStore`] over RTC slow memory.
#[cfg(target_os = "espidf")]
pub struct RtcAllowListStore {
    _private: (),
}

#[cfg(target_os = "espidf")]
impl RtcAllowListStore {
    /// SAFETY (caller): at most one instance, owned by the control task.
    pub unsafe fn take() -> Self {
        Self { _private: () }
    }
}

#[cfg(target_os = "espidf")]
impl AllowListStore for RtcAllowListStore {
    fn load(&self) -> AllowList {
        // SAFETY: single owner (see `take`); no ISR touches RTC_SLOTS.
        let raw = unsafe { core::ptr::read(&raw const RTC_SLOTS) };
        AllowList::from_slots(decode_slots(&raw))
    }

    fn store(&mut self, list: &AllowList) {
        let raw = encode_slots(list.slots());
        // SAFETY: as in `load`.
        unsafe { core::ptr::write(&raw mut RTC_SLOTS, raw) };
        debug!("retained: {} entries written to RTC memory", list.len());
    }
}

// ───────────────────────────────────────────────────────────────
// In-memory (host)
// ───────────────────────────────────────────────────────────────

/// Host stand-in for RTC memory: survives as long as the value does.
#[derive(Debug, Clone, Default)]
pub struct MemoryAllowListStore {
    raw: RawSlots,
}

impl MemoryAllowListStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an arbitrary retained image.
    pub fn from_raw(raw: RawSlots) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &RawSlots {
        &self.raw
    }
}

impl AllowListStore for MemoryAllowListStore {
    fn load(&self) -> AllowList {
        AllowList::from_slots(decode_slots(&self.raw))
    }

    fn store(&mut self, list: &AllowList) {
        self.raw = encode_slots(list.slots());
        debug!("retained(sim): {} entries stored", list.len());
    }
}
