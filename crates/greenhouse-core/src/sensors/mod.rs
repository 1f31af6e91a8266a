mod analog;
mod dht11;

use thiserror_no_std::Error;

pub use analog::*;
pub use dht11::*;

/// Errors a sensor read can end with.
///
/// Each variant names the sensor so a single log line is enough to find the
/// failing part.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: failed to {operation}: {details}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    #[error("{sensor}: timed out waiting for {operation}")]
    Timeout {
        sensor: &'static str,
        operation: &'static str,
    },
    #[error("{sensor}: checksum mismatch (expected {expected:#04x}, got {actual:#04x})")]
    ChecksumMismatch {
        sensor: &'static str,
        expected: u8,
        actual: u8,
    },
    #[error("{sensor}: reading out of range: {details}")]
    OutOfRange {
        sensor: &'static str,
        details: &'static str,
    },
}

/// Trait for sensors that produce typed readings.
pub trait Sensor {
    /// The type of readings this sensor produces.
    type Readings;

    /// Read the sensor and return typed readings.
    fn read(&mut self) -> impl Future<Output = Result<Self::Readings, SensorError>>;
}

/// Readings that carry a relative humidity value.
pub trait Humidity {
    /// Relative humidity in percent.
    fn relative_humidity(&self) -> f32;
}

impl Humidity for Dht11Reading {
    fn relative_humidity(&self) -> f32 {
        self.relative_humidity
    }
}
