//! Synthetic sensors that vary over time so the node can run without hardware.

use std::time::Duration;

use embedded_hal_async::delay::DelayNs;
use greenhouse_core::sensors::{ADC_MAX, AnalogChannel, Dht11Reading, Sensor, SensorError};

/// Sinusoidal ADC input: `center + amplitude * sin(t / period)` with a second
/// faster harmonic, clamped to 12 bits.
pub struct SyntheticChannel {
    center: f64,
    amplitude: f64,
    period: f64,
    step: u32,
}

impl SyntheticChannel {
    /// MQ135 counts around the 400-800 comfort band.
    pub fn gas() -> Self {
        Self::new(600.0, 250.0, 30.0)
    }

    /// Soil probe counts, dry end of the range.
    pub fn soil() -> Self {
        Self::new(2800.0, 400.0, 90.0)
    }

    pub fn new(center: f64, amplitude: f64, period: f64) -> Self {
        Self {
            center,
            amplitude,
            period,
            step: 0,
        }
    }
}

impl AnalogChannel for SyntheticChannel {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        self.step = self.step.wrapping_add(1);
        let t = self.step as f64;
        let value = self.center
            + self.amplitude * (t / self.period).sin()
            + 0.1 * self.amplitude * (t / 7.0).cos();
        Ok(value.clamp(0.0, ADC_MAX as f64) as u16)
    }
}

/// Synthetic DHT11 whose every `fail_every`-th read times out, exercising the
/// skipped-publish path.
pub struct SyntheticHumidity {
    fail_every: Option<u32>,
    reads: u32,
}

impl SyntheticHumidity {
    pub fn new(fail_every: Option<u32>) -> Self {
        Self {
            fail_every: fail_every.filter(|n| *n > 0),
            reads: 0,
        }
    }
}

impl Sensor for SyntheticHumidity {
    type Readings = Dht11Reading;

    async fn read(&mut self) -> Result<Dht11Reading, SensorError> {
        self.reads = self.reads.wrapping_add(1);

        if self.fail_every.is_some_and(|n| self.reads % n == 0) {
            return Err(SensorError::Timeout {
                sensor: "DHT11",
                operation: "sensor response",
            });
        }

        let t = self.reads as f32;
        // DHT11 resolution is a whole percent
        let relative_humidity = (65.0 + 12.0 * (t / 20.0).sin()).round();
        let temperature_celsius = (23.0 + 3.0 * (t / 45.0).sin()).round();

        Ok(Dht11Reading {
            relative_humidity,
            temperature_celsius,
        })
    }
}

/// Host delay backed by `std::thread::sleep`.
pub struct StdDelay;

impl DelayNs for StdDelay {
    async fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(ns as u64));
    }

    async fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(ms as u64));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use greenhouse_core::payload::humidity_is_valid;

    #[test]
    fn test_channels_stay_within_adc_range() {
        let mut channel = SyntheticChannel::new(4000.0, 500.0, 3.0);
        for _ in 0..200 {
            assert!(channel.read_raw().unwrap() <= ADC_MAX);
        }
    }

    #[test]
    fn test_humidity_fails_on_schedule() {
        let mut sensor = SyntheticHumidity::new(Some(3));
        let results: Vec<bool> = (0..6).map(|_| block_on(sensor.read()).is_ok()).collect();
        assert_eq!(results, [true, true, false, true, true, false]);
    }

    #[test]
    fn test_humidity_readings_are_valid_percentages() {
        let mut sensor = SyntheticHumidity::new(None);
        for _ in 0..100 {
            let reading = block_on(sensor.read()).unwrap();
            assert!(humidity_is_valid(reading.relative_humidity));
        }
    }
}
