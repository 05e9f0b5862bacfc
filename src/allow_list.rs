//! Bounded allow-list of peer identities.
//!
//! The slots are a fixed-length array of `(address type, 6-byte address,
//! occupied)` tuples.  On the device the array lives in RTC slow memory
//! (see [`adapters::retained`](crate::adapters::retained)) so it survives
//! deep sleep but not a power cycle.  An all-zero array is the empty list,
//! which is what the loader produces on first boot.
//!
//! Invariants:
//! - `len` always equals the number of occupied slots.
//! - No address appears in two occupied slots.

use core::fmt;

use log::{info, warn};

use crate::error::{Error, Result};

/// Number of peers the node remembers.
///
/// Directed advertising targets a single peer, so [`AllowList::pick_target`]
/// is only unambiguous at capacity 1.
pub const ALLOW_LIST_CAPACITY: usize = 1;

// ───────────────────────────────────────────────────────────────
// Peer identity
// ───────────────────────────────────────────────────────────────

/// BLE address type as reported by the host stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum AddressKind {
    #[default]
    Public = 0,
    Random = 1,
    PublicIdentity = 2,
    RandomIdentity = 3,
}

impl AddressKind {
    /// Map a raw host-stack address type; unknown values fall back to `Public`.
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Random,
            2 => Self::PublicIdentity,
            3 => Self::RandomIdentity,
            _ => Self::Public,
        }
    }
}

/// A peer's BLE identity.  `bytes` is in host-stack order (LSB first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(C)]
pub struct PeerAddress {
    pub kind: AddressKind,
    pub bytes: [u8; 6],
}

impl PeerAddress {
    pub const fn new(kind: AddressKind, bytes: [u8; 6]) -> Self {
        Self { kind, bytes }
    }
}

/// Renders `AA:BB:CC:DD:EE:FF`, most significant byte first.
impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.bytes;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[5], b[4], b[3], b[2], b[1], b[0]
        )
    }
}

// ───────────────────────────────────────────────────────────────
// Retained slot layout
// ───────────────────────────────────────────────────────────────

/// One retained allow-list slot.  All-zero is an empty slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct AllowSlot {
    pub peer: PeerAddress,
    pub occupied: bool,
}

impl AllowSlot {
    pub const EMPTY: Self = Self {
        peer: PeerAddress::new(AddressKind::Public, [0; 6]),
        occupied: false,
    };
}

/// The retained array as a whole.
pub type AllowSlots = [AllowSlot; ALLOW_LIST_CAPACITY];

// ───────────────────────────────────────────────────────────────
// AllowList
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    slots: AllowSlots,
    len: usize,
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new()
    }
}

impl AllowList {
    pub const fn new() -> Self {
        Self {
            slots: [AllowSlot::EMPTY; ALLOW_LIST_CAPACITY],
            len: 0,
        }
    }

    /// Rebuild from retained slots, recounting occupancy.
    ///
    /// A duplicate occupied address (which can only come from corrupted
    /// retained memory) is dropped so the invariants hold again.
    pub fn from_slots(slots: AllowSlots) -> Self {
        let mut list = Self::new();
        for slot in slots.iter().filter(|s| s.occupied) {
            if list.contains(&slot.peer) {
                warn!("allow-list: dropping duplicate retained entry {}", slot.peer);
                continue;
            }
            if let Err(e) = list.push(slot.peer) {
                warn!("allow-list: dropping retained entry {}: {}", slot.peer, e);
            }
        }
        list
    }

    /// Slot array to write back to retained memory.
    pub fn slots(&self) -> &AllowSlots {
        &self.slots
    }

    /// Add `peer` to the first free slot.
    ///
    /// Returns [`Error::Capacity`] when every slot is occupied.  Pushing a
    /// peer that is already present (with a slot still free) is a no-op.
    pub fn push(&mut self, peer: PeerAddress) -> Result<()> {
        if self.len == ALLOW_LIST_CAPACITY {
            return Err(Error::Capacity);
        }
        if self.contains(&peer) {
            return Ok(());
        }
        let slot = self
            .slots
            .iter_mut()
            .find(|s| !s.occupied)
            .ok_or(Error::Capacity)?;
        *slot = AllowSlot {
            peer,
            occupied: true,
        };
        self.len += 1;
        Ok(())
    }

    /// Free the slot holding `peer`, matched on address type and bytes.
    pub fn remove(&mut self, peer: &PeerAddress) -> Result<()> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.occupied && s.peer == *peer)
            .ok_or(Error::NotFound)?;
        *slot = AllowSlot::EMPTY;
        self.len -= 1;
        Ok(())
    }

    pub fn contains(&self, peer: &PeerAddress) -> bool {
        self.iter().any(|p| p == peer)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// The peer directed advertising should target: the first occupied slot.
    pub fn pick_target(&self) -> Option<PeerAddress> {
        self.iter().next().copied()
    }

    /// Occupied entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &PeerAddress> {
        self.slots.iter().filter(|s| s.occupied).map(|s| &s.peer)
    }

    /// Dump the list to the log.
    pub fn log_contents(&self) {
        info!("allow-list: {}/{} entries", self.len, ALLOW_LIST_CAPACITY);
        for (i, peer) in self.iter().enumerate() {
            info!("  [{}] {} ({:?})", i, peer, peer.kind);
        }
    }
}
