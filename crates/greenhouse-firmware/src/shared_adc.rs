//! ADC1 sharing between the gas and soil inputs
//!
//! Both analog sensors sit on ADC1. The converter is stored once behind a
//! critical-section mutex and every pin gets its own handle that locks it for
//! the duration of a single conversion.
//!
//! # Example
//!
//! ```no_run
//! static ADC1: StaticCell<SharedAdc1> = StaticCell::new();
//!
//! let mut adc_config = AdcConfig::new();
//! let gas_pin = adc_config.enable_pin(peripherals.GPIO33, Attenuation::_11dB);
//! let adc = ADC1.init(Mutex::new(RefCell::new(Adc::new(peripherals.ADC1, adc_config))));
//!
//! let gas = SharedAdcPin::new(adc, gas_pin, "MQ135");
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use esp_hal::analog::adc::{Adc, AdcChannel, AdcPin};
use esp_hal::peripherals::ADC1;
use greenhouse_core::sensors::{AnalogChannel, SensorError};

pub type Adc1 = Adc<'static, ADC1<'static>, esp_hal::Blocking>;

pub type SharedAdc1 = Mutex<CriticalSectionRawMutex, RefCell<Adc1>>;

/// One ADC1 input. Conversions run one-shot at the attenuation the pin was
/// enabled with (11 dB for the full 0-3.3 V range).
pub struct SharedAdcPin<'a, PIN> {
    adc: &'a SharedAdc1,
    pin: AdcPin<PIN, ADC1<'static>>,
    sensor: &'static str,
}

impl<'a, PIN> SharedAdcPin<'a, PIN> {
    pub const fn new(
        adc: &'a SharedAdc1,
        pin: AdcPin<PIN, ADC1<'static>>,
        sensor: &'static str,
    ) -> Self {
        Self { adc, pin, sensor }
    }
}

impl<PIN: AdcChannel> AnalogChannel for SharedAdcPin<'_, PIN> {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        let pin = &mut self.pin;
        self.adc
            .lock(|adc| nb::block!(adc.borrow_mut().read_oneshot(pin)))
            .map_err(|_| SensorError::ReadFailed {
                sensor: self.sensor,
                operation: "convert analog input",
                details: "ADC1 one-shot conversion failed",
            })
    }
}
