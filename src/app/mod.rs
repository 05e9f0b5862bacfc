//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the controller rules for the node: advertising
//! orchestration, the event-driven service and the control task that
//! serialises every input.  All interaction with hardware happens through
//! **port traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod advertising;
pub mod events;
pub mod ports;
pub mod runtime;
pub mod service;
