//! Button, LED and timer drivers plus hardware initialisation.

pub mod button;
pub mod hw_init;
pub mod hw_timer;
pub mod status_led;
