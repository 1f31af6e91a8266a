use super::{Sensor, SensorError};

/// Full-scale value of a 12-bit conversion.
pub const ADC_MAX: u16 = 4095;

/// A single ADC input able to perform one-shot conversions.
///
/// embedded-hal 1.0 has no ADC trait, so the firmware implements this for its
/// shared ADC pins and tests implement it with fixed values.
pub trait AnalogChannel {
    fn read_raw(&mut self) -> Result<u16, SensorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalogReading {
    pub raw: u16,
}

/// Raw analog sensor such as the MQ135 gas sensor or the HW-390 soil probe.
///
/// Readings are reported as raw 12-bit counts; calibration happens on the
/// consumer side.
pub struct AnalogSensor<C> {
    channel: C,
    name: &'static str,
}

/// MQ135 on its ADC channel.
pub type GasSensor<C> = AnalogSensor<C>;
pub type SoilSensor<C> = AnalogSensor<C>;

impl<C: AnalogChannel> AnalogSensor<C> {
    pub const fn new(channel: C, name: &'static str) -> Self {
        Self { channel, name }
    }

    /// MQ135 air quality sensor, published as the CO2 value.
    pub const fn gas(channel: C) -> Self {
        Self::new(channel, "MQ135")
    }

    /// HW-390 capacitive soil moisture probe.
    pub const fn soil(channel: C) -> Self {
        Self::new(channel, "HW-390")
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<C: AnalogChannel> Sensor for AnalogSensor<C> {
    type Readings = AnalogReading;

    async fn read(&mut self) -> Result<AnalogReading, SensorError> {
        let raw = self.channel.read_raw().map_err(|e| {
            log::error!("{} conversion failed: {}", self.name, e);
            e
        })?;

        // Calibrated ADC paths may overshoot full scale by a few counts.
        Ok(AnalogReading {
            raw: raw.min(ADC_MAX),
        })
    }
}
