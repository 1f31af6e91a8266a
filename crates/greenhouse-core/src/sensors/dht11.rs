//! DHT11 single-wire humidity/temperature driver
//!
//! The host pulls the data line low for at least 18 ms, releases it, and the
//! sensor answers with an 80 µs low / 80 µs high preamble followed by 40 bits.
//! Every bit starts with a ~50 µs low pulse; the following high pulse lasts
//! 26-28 µs for a `0` and ~70 µs for a `1`.
//!
//! Pulse lengths are measured by polling the pin with 1 µs delays. The loop
//! overhead makes the counts shorter than real time, so a bit is decided by
//! comparing its high pulse against the low pulse right before it instead of
//! against an absolute threshold.
//!
//! The sensor must not be sampled more than once per second.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::error;

use super::{Sensor, SensorError};

const SENSOR: &str = "DHT11";

/// Duration of the host start signal.
const START_LOW_MS: u32 = 20;
/// Upper bound for any single pulse of the response.
const PULSE_TIMEOUT_US: u32 = 100;
const FRAME_BITS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dht11Reading {
    pub relative_humidity: f32,
    pub temperature_celsius: f32,
}

/// Decode the five raw bytes of a DHT11 frame.
///
/// Layout: humidity integer, humidity decimal, temperature integer,
/// temperature decimal (bit 7 is the sign), checksum.
pub fn decode_frame(frame: [u8; 5]) -> Result<Dht11Reading, SensorError> {
    let expected = frame[..4]
        .iter()
        .fold(0u8, |sum, byte| sum.wrapping_add(*byte));

    if expected != frame[4] {
        return Err(SensorError::ChecksumMismatch {
            sensor: SENSOR,
            expected,
            actual: frame[4],
        });
    }

    let relative_humidity = frame[0] as f32 + frame[1] as f32 * 0.1;
    if relative_humidity > 100.0 {
        return Err(SensorError::OutOfRange {
            sensor: SENSOR,
            details: "relative humidity above 100 %",
        });
    }

    let mut temperature_celsius = frame[2] as f32 + (frame[3] & 0x0f) as f32 * 0.1;
    if frame[3] & 0x80 != 0 {
        temperature_celsius = -temperature_celsius;
    }

    Ok(Dht11Reading {
        relative_humidity,
        temperature_celsius,
    })
}

/// DHT11 driver over any pin that can both drive and sense the data line.
///
/// `set_high` must release the line (open-drain), not drive it, since the
/// sensor pulls it low while answering.
pub struct Dht11<P, D> {
    pin: P,
    delay: D,
}

impl<P, D> Dht11<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    pub fn new(pin: P, delay: D) -> Self {
        Self { pin, delay }
    }

    pub fn into_inner(self) -> (P, D) {
        (self.pin, self.delay)
    }

    /// Perform a complete measurement.
    ///
    /// The start signal runs with interrupts enabled; the 4 ms capture that
    /// follows runs inside a critical section so pulse timing is not skewed.
    pub fn read_blocking(&mut self) -> Result<Dht11Reading, SensorError> {
        self.start()?;
        let frame = critical_section::with(|_| self.capture())?;
        decode_frame(frame)
    }

    fn start(&mut self) -> Result<(), SensorError> {
        self.pin.set_low().map_err(|e| {
            error!("DHT11 failed to drive data line: {:?}", e);
            SensorError::ReadFailed {
                sensor: SENSOR,
                operation: "send start signal",
                details: "GPIO error",
            }
        })?;
        self.delay.delay_ms(START_LOW_MS);
        Ok(())
    }

    fn capture(&mut self) -> Result<[u8; 5], SensorError> {
        self.pin.set_high().map_err(|e| {
            error!("DHT11 failed to release data line: {:?}", e);
            SensorError::ReadFailed {
                sensor: SENSOR,
                operation: "release data line",
                details: "GPIO error",
            }
        })?;

        self.wait_while(true, "sensor response")?;
        self.wait_while(false, "response low pulse")?;
        self.wait_while(true, "response high pulse")?;

        let mut frame = [0u8; 5];
        for bit in 0..FRAME_BITS {
            let low = self.wait_while(false, "bit start")?;
            let high = self.wait_while(true, "bit value")?;
            if high > low {
                frame[bit / 8] |= 0x80 >> (bit % 8);
            }
        }

        Ok(frame)
    }

    /// Poll until the line leaves `level`, returning the number of polls.
    fn wait_while(&mut self, level: bool, operation: &'static str) -> Result<u32, SensorError> {
        let mut elapsed = 0;
        loop {
            let high = self.pin.is_high().map_err(|_| SensorError::ReadFailed {
                sensor: SENSOR,
                operation: "sample data line",
                details: "GPIO error",
            })?;

            if high != level {
                return Ok(elapsed);
            }

            if elapsed >= PULSE_TIMEOUT_US {
                return Err(SensorError::Timeout {
                    sensor: SENSOR,
                    operation,
                });
            }

            self.delay.delay_us(1);
            elapsed += 1;
        }
    }
}

impl<P, D> Sensor for Dht11<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    type Readings = Dht11Reading;

    async fn read(&mut self) -> Result<Dht11Reading, SensorError> {
        self.read_blocking()
    }
}
