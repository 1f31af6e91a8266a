//! CSV framing of one sample cycle
//!
//! The broker-side consumer splits the payload on `,` and expects exactly
//! three numeric fields in the order gas, humidity, soil:
//!
//! ```text
//! 412,55.00,2890
//! ```

use core::fmt::Write;
use core::str::FromStr;

use heapless::String;
use thiserror_no_std::Error;

/// Room for the widest possible frame, `65535,100.00,65535`.
pub const MAX_PAYLOAD_LEN: usize = 32;

pub type Payload = String<MAX_PAYLOAD_LEN>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    #[error("humidity reading is not a valid percentage")]
    InvalidHumidity,
    #[error("expected 3 comma-separated fields, found {0}")]
    FieldCount(usize),
    #[error("field `{0}` is not a number")]
    InvalidField(&'static str),
    #[error("encoded frame does not fit in the payload buffer")]
    Overflow,
}

/// One set of readings, in publish order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorFrame {
    /// Raw MQ135 count, published as the CO2 value
    pub gas: u16,
    /// Relative humidity in percent
    pub humidity: f32,
    /// Raw soil moisture count
    pub soil: u16,
}

/// A humidity value is usable when it is a finite percentage.
pub fn humidity_is_valid(humidity: f32) -> bool {
    humidity.is_finite() && (0.0..=100.0).contains(&humidity)
}

impl SensorFrame {
    pub fn new(gas: u16, humidity: f32, soil: u16) -> Result<Self, PayloadError> {
        if !humidity_is_valid(humidity) {
            return Err(PayloadError::InvalidHumidity);
        }

        Ok(Self {
            gas,
            humidity,
            soil,
        })
    }

    /// Render the frame as `<gas>,<humidity>,<soil>` with two decimals of humidity.
    pub fn encode(&self) -> Result<Payload, PayloadError> {
        let mut payload = Payload::new();
        write!(payload, "{},{:.2},{}", self.gas, self.humidity, self.soil)
            .map_err(|_| PayloadError::Overflow)?;
        Ok(payload)
    }

    /// Parse a frame the way the broker-side consumer does: surrounding
    /// whitespace is ignored and every field must be numeric.
    pub fn parse(payload: &str) -> Result<Self, PayloadError> {
        let payload = payload.trim();
        let count = payload.split(',').count();
        if count != 3 {
            return Err(PayloadError::FieldCount(count));
        }

        let mut fields = payload.split(',');
        let gas = parse_field::<u16>(fields.next(), "gas")?;
        let humidity = parse_field::<f32>(fields.next(), "humidity")?;
        let soil = parse_field::<u16>(fields.next(), "soil")?;

        Self::new(gas, humidity, soil)
    }
}

fn parse_field<T: FromStr>(field: Option<&str>, name: &'static str) -> Result<T, PayloadError> {
    field
        .and_then(|value| value.trim().parse().ok())
        .ok_or(PayloadError::InvalidField(name))
}
