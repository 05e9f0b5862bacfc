//! MAX30205 human-body temperature sensor (I²C).
//!
//! | Register | Address | Use                                   |
//! |----------|---------|---------------------------------------|
//! | TEMP     | `0x00`  | 16-bit reading, MSB first             |
//! | CONFIG   | `0x01`  | bit 0 = shutdown, bit 7 = one-shot    |
//!
//! The sensor is kept in shutdown between samples.  A sample is a one-shot
//! conversion requested while still in shutdown, a wait of the worst-case
//! conversion time (50 ms), then a register read.
//!
//! Generic over [`embedded_hal::i2c::I2c`] and [`DelayNs`] so the ESP-IDF
//! `I2cDriver` and `FreeRtos` delay and host mocks are interchangeable.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, warn};

use super::SensorReading;
use crate::app::ports::SensorPort;
use crate::error::HardwareError;

/// 7-bit bus address with A0..A2 tied low (8-bit write address `0x90`).
pub const MAX30205_ADDR: u8 = 0x48;

const REG_TEMP: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

const CONFIG_SHUTDOWN: u8 = 0b0000_0001;
const CONFIG_ONE_SHOT: u8 = 0b1000_0001;

/// Maximum 16-bit conversion time from the datasheet.
pub const CONVERSION_TIME_MS: u32 = 50;

pub struct TemperatureSensor<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
}

impl<I2C: I2c, D: DelayNs> TemperatureSensor<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self {
            i2c,
            delay,
            address: MAX30205_ADDR,
        }
    }

    /// Put the sensor into shutdown.  Called once per boot.
    pub fn shutdown(&mut self) -> Result<(), HardwareError> {
        self.write_config(CONFIG_SHUTDOWN)
    }

    /// One-shot conversion, then read the temperature register.
    pub fn read_raw(&mut self) -> Result<SensorReading, HardwareError> {
        self.write_config(CONFIG_ONE_SHOT)?;
        self.delay.delay_ms(CONVERSION_TIME_MS);
        let mut raw = [0u8; 2];
        self.i2c
            .write_read(self.address, &[REG_TEMP], &mut raw)
            .map_err(|e| {
                warn!("max30205: temperature read failed: {:?}", e);
                HardwareError::Bus
            })?;
        let reading = SensorReading::new(raw);
        debug!("max30205: {}", reading);
        Ok(reading)
    }

    /// Give the bus and the delay back.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    fn write_config(&mut self, value: u8) -> Result<(), HardwareError> {
        self.i2c
            .write(self.address, &[REG_CONFIG, value])
            .map_err(|e| {
                warn!("max30205: config write 0x{:02x} failed: {:?}", value, e);
                HardwareError::Bus
            })
    }
}

impl<I2C: I2c, D: DelayNs> SensorPort for TemperatureSensor<I2C, D> {
    fn read_temperature(&mut self) -> Result<SensorReading, HardwareError> {
        self.read_raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};

    /// Accumulates requested waits instead of sleeping.
    #[derive(Default)]
    struct FakeDelay {
        waited_ns: u64,
    }

    impl DelayNs for FakeDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.waited_ns += u64::from(ns);
        }
    }

    /// Records writes and answers reads with a fixed register value.
    #[derive(Default)]
    struct FakeBus {
        writes: Vec<(u8, Vec<u8>)>,
        temp: [u8; 2],
        fail: bool,
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c for FakeBus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if self.fail {
                return Err(ErrorKind::Other);
            }
            for op in operations {
                match op {
                    Operation::Write(bytes) => self.writes.push((address, bytes.to_vec())),
                    Operation::Read(buf) => buf.copy_from_slice(&self.temp[..buf.len()]),
                }
            }
            Ok(())
        }
    }

    #[test]
    fn shutdown_writes_config_register() {
        let mut sensor = TemperatureSensor::new(FakeBus::default(), FakeDelay::default());
        sensor.shutdown().unwrap();
        let (bus, delay) = sensor.release();
        assert_eq!(bus.writes, vec![(0x48, vec![0x01, 0b0000_0001])]);
        assert_eq!(delay.waited_ns, 0);
    }

    #[test]
    fn read_triggers_one_shot_then_reads_temp() {
        let bus = FakeBus {
            temp: [0x24, 0x80],
            ..Default::default()
        };
        let mut sensor = TemperatureSensor::new(bus, FakeDelay::default());
        let reading = sensor.read_temperature().unwrap();
        assert_eq!(reading.raw, [0x24, 0x80]);
        let (bus, _) = sensor.release();
        assert_eq!(bus.writes[0], (0x48, vec![0x01, 0b1000_0001]));
        assert_eq!(bus.writes[1], (0x48, vec![0x00]));
    }

    #[test]
    fn read_waits_for_conversion() {
        let mut sensor = TemperatureSensor::new(FakeBus::default(), FakeDelay::default());
        sensor.read_raw().unwrap();
        let (_, delay) = sensor.release();
        assert!(delay.waited_ns >= u64::from(CONVERSION_TIME_MS) * 1_000_000);
    }

    #[test]
    fn bus_failure_maps_to_hardware_error() {
        let bus = FakeBus {
            fail: true,
            ..Default::default()
        };
        let mut sensor = TemperatureSensor::new(bus, FakeDelay::default());
        assert_eq!(sensor.read_temperature(), Err(HardwareError::Bus));
    }
}
