//! Function-pointer mode machine.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │  ModeTable                                                     │
//! │  ┌─────────────┬──────────┬──────────┬──────────────────────┐  │
//! │  │ Mode        │ on_enter │ on_exit  │ on_event             │  │
//! │  ├─────────────┼──────────┼──────────┼──────────────────────┤  │
//! │  │ Idle        │ fn(ctx)  │ fn(ctx)  │ fn(ctx, in)->Option<>│  │
//! │  │ Registering │ fn(ctx)  │ fn(ctx)  │ fn(ctx, in)->Option<>│  │
//! │  │ Deleting    │ fn(ctx)  │ fn(ctx)  │ fn(ctx, in)->Option<>│  │
//! │  └─────────────┴──────────┴──────────┴──────────────────────┘  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The machine is event-driven: every [`ModeInput`] is handed to the
//! current mode's `on_event`.  If it returns `Some(next)`, the engine runs
//! `on_exit` for the current mode, then `on_enter` for the next.  Handlers
//! never touch hardware; they queue [`Effect`](context::Effect)s on the
//! [`ModeContext`] which the service applies afterwards.

pub mod context;
pub mod states;

use context::{ModeContext, ModeInput};
use log::info;

// ---------------------------------------------------------------------------
// Mode identity
// ---------------------------------------------------------------------------

/// Controller operating mode.
/// Must stay in sync with the table built in [`states::build_mode_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Mode {
    Idle = 0,
    Registering = 1,
    Deleting = 2,
}

impl Mode {
    pub const COUNT: usize = 3;

    /// Panics on out-of-range in debug builds; returns `Idle` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Registering,
            2 => Self::Deleting,
            _ => {
                debug_assert!(false, "invalid mode index: {idx}");
                Self::Idle
            }
        }
    }
}

impl core::fmt::Display for Mode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Registering => write!(f, "Registering"),
            Self::Deleting => write!(f, "Deleting"),
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// `on_enter` / `on_exit` action.
pub type ModeActionFn = fn(&mut ModeContext);

/// Event handler.  Returns `Some(next)` to switch modes, `None` to stay.
pub type ModeEventFn = fn(&mut ModeContext, &ModeInput) -> Option<Mode>;

/// One row in the mode table.
pub struct ModeDescriptor {
    pub id: Mode,
    pub name: &'static str,
    pub on_enter: Option<ModeActionFn>,
    pub on_exit: Option<ModeActionFn>,
    pub on_event: ModeEventFn,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct ModeMachine {
    /// Indexed by `Mode as usize`.
    table: [ModeDescriptor; Mode::COUNT],
    current: usize,
    transitions: u32,
}

impl ModeMachine {
    /// Every boot begins in `Idle`.
    pub fn new(table: [ModeDescriptor; Mode::COUNT]) -> Self {
        Self {
            table,
            current: Mode::Idle as usize,
            transitions: 0,
        }
    }

    /// Run the initial `on_enter`.  Call once, before the first event.
    pub fn start(&mut self, ctx: &mut ModeContext) {
        info!("FSM starting in mode: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Dispatch one input to the current mode.
    ///
    /// Returns `(from, to)` when the input caused a mode change.
    pub fn handle(&mut self, ctx: &mut ModeContext, input: &ModeInput) -> Option<(Mode, Mode)> {
        let from = self.current_mode();
        let next = (self.table[self.current].on_event)(ctx, input)?;
        if next == from {
            return None;
        }
        self.transition(next, ctx);
        Some((from, next))
    }

    /// Jump straight to `next`, running exit and enter actions.
    pub fn force_transition(&mut self, next: Mode, ctx: &mut ModeContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_mode(&self) -> Mode {
        Mode::from_index(self.current)
    }

    /// Number of mode changes since construction.
    pub fn transitions(&self) -> u32 {
        self.transitions
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next: Mode, ctx: &mut ModeContext) {
        let next_idx = next as usize;

        // Registering and Deleting are only ever reached from, and left to, Idle.
        debug_assert!(
            self.current == Mode::Idle as usize || next == Mode::Idle,
            "direct transition {} -> {}",
            self.table[self.current].name,
            self.table[next_idx].name
        );

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.transitions = self.transitions.wrapping_add(1);

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
