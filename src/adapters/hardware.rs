//! Hardware adapter — bridges real peripherals to domain port traits.
//!
//! Owns the temperature sensor, the status LED and the radio, exposing them
//! through [`SensorPort`], [`IndicatorPort`], [`RadioPort`] and
//! [`IdleTimerPort`].  On non-espidf targets the underlying drivers use
//! cfg-gated simulation stubs.

use embassy_time::Duration;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::adapters::ble::BleRadio;
use crate::app::advertising::AdvertisingParams;
use crate::app::ports::{
    ConnHandle, IdleTimerPort, Indication, IndicatorPort, RadioPort, SensorPort,
};
use crate::drivers::hw_timer;
use crate::drivers::status_led::StatusLed;
use crate::error::HardwareError;
use crate::sensors::SensorReading;
use crate::sensors::temperature::TemperatureSensor;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<I2C, D> {
    sensor: TemperatureSensor<I2C, D>,
    led: StatusLed,
    radio: BleRadio,
}

impl<I2C: I2c, D: DelayNs> HardwareAdapter<I2C, D> {
    pub fn new(sensor: TemperatureSensor<I2C, D>, led: StatusLed, radio: BleRadio) -> Self {
        Self { sensor, led, radio }
    }

    pub fn led(&self) -> &StatusLed {
        &self.led
    }

    pub fn radio(&self) -> &BleRadio {
        &self.radio
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<I2C: I2c, D: DelayNs> SensorPort for HardwareAdapter<I2C, D> {
    fn read_temperature(&mut self) -> Result<SensorReading, HardwareError> {
        self.sensor.read_raw()
    }
}

// ── IndicatorPort implementation ──────────────────────────────

impl<I2C, D> IndicatorPort for HardwareAdapter<I2C, D> {
    fn indicate(&mut self, indication: Indication) {
        self.led.indicate(indication);
    }
}

// ── RadioPort implementation ──────────────────────────────────

impl<I2C, D> RadioPort for HardwareAdapter<I2C, D> {
    fn start_advertising(&mut self, params: &AdvertisingParams) -> Result<(), HardwareError> {
        self.radio.start_advertising(params)
    }

    fn stop_advertising(&mut self) -> Result<(), HardwareError> {
        self.radio.stop_advertising()
    }

    fn disconnect(&mut self, conn: ConnHandle) -> Result<(), HardwareError> {
        self.radio.disconnect(conn)
    }
}

// ── IdleTimerPort implementation ──────────────────────────────

impl<I2C, D> IdleTimerPort for HardwareAdapter<I2C, D> {
    fn arm_idle_timer(&mut self, after: Duration) -> Result<(), HardwareError> {
        hw_timer::arm_idle(after.as_micros())
    }

    fn cancel_idle_timer(&mut self) {
        hw_timer::cancel_idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::device_id::{adv_name, read_mac};
    use crate::app::advertising::{AdvIntent, AdvertisingOrchestrator};
    use crate::config::NodeConfig;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};

    /// Bus that answers every read with 25.5 °C.
    struct FixedBus;

    impl ErrorType for FixedBus {
        type Error = ErrorKind;
    }

    impl I2c for FixedBus {
        fn transaction(
            &mut self,
            _addr: u8,
            ops: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            for op in ops {
                if let Operation::Read(buf) = op {
                    buf.copy_from_slice(&[0x19, 0x80][..buf.len()]);
                }
            }
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    fn adapter() -> HardwareAdapter<FixedBus, NoDelay> {
        HardwareAdapter::new(
            TemperatureSensor::new(FixedBus, NoDelay),
            StatusLed::new(),
            BleRadio::new(adv_name(&read_mac())),
        )
    }

    #[test]
    fn ports_delegate_to_owned_drivers() {
        let mut hw = adapter();

        let reading = hw.read_temperature().unwrap();
        assert_eq!(reading.raw, [0x19, 0x80]);

        hw.indicate(Indication::Solid);
        assert_eq!(hw.led().current(), Indication::Solid);

        let params = AdvertisingOrchestrator::new(&NodeConfig::default())
            .params_for(&AdvIntent::Register)
            .unwrap();
        hw.start_advertising(&params).unwrap();
        hw.disconnect(ConnHandle(3)).unwrap();
        assert_eq!(hw.radio().started(), &[params]);
        assert_eq!(hw.radio().disconnected(), &[ConnHandle(3)]);
    }

    #[test]
    fn idle_timer_is_inert_on_host() {
        let mut hw = adapter();
        assert!(hw.arm_idle_timer(Duration::from_secs(30)).is_ok());
        hw.cancel_idle_timer();
    }
}
