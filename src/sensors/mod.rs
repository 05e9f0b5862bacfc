//! Sensor subsystem.
//!
//! The node has a single sensor, a MAX30205 clinical thermometer on the
//! I²C bus.  Its raw register bytes are broadcast unconverted; the
//! Celsius conversion here is for logging only.

pub mod temperature;

use core::fmt;

/// Raw 2-byte temperature register, MSB first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorReading {
    pub raw: [u8; 2],
}

impl SensorReading {
    pub const fn new(raw: [u8; 2]) -> Self {
        Self { raw }
    }

    /// Degrees Celsius: integer part from the MSB's low seven bits, fraction
    /// from the LSB in 1/256 steps, sign from MSB bit 7.
    pub fn celsius(&self) -> f32 {
        let [msb, lsb] = self.raw;
        let magnitude = f32::from(msb & 0x7F) + f32::from(lsb) / 256.0;
        if msb & 0x80 != 0 { -magnitude } else { magnitude }
    }
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2}\u{00b0}C (raw {:02x}{:02x})",
            self.celsius(),
            self.raw[0],
            self.raw[1]
        )
    }
}
