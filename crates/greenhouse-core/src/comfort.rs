//! Comfort band assessment for greenhouse readings
//!
//! The gateway switches its ventilation relay whenever a reading leaves its
//! band. The node applies the same bands so the serial log shows which value
//! would trip the relay. Nothing is actuated from here.

use crate::payload::SensorFrame;

/// Closed interval of acceptable values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub low: f32,
    pub high: f32,
}

impl Band {
    pub const fn new(low: f32, high: f32) -> Self {
        Self { low, high }
    }

    pub fn level(&self, value: f32) -> Level {
        if value < self.low {
            Level::Low
        } else if value > self.high {
            Level::High
        } else {
            Level::InBand
        }
    }
}

/// Position of a reading relative to its band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    InBand,
    High,
}

impl Level {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::InBand => "ok",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComfortBands {
    /// Relative humidity, %
    pub humidity: Band,
    /// Raw MQ135 count
    pub gas: Band,
}

impl Default for ComfortBands {
    fn default() -> Self {
        Self {
            humidity: Band::new(50.0, 80.0),
            gas: Band::new(400.0, 800.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComfortReport {
    pub humidity: Level,
    pub gas: Level,
}

impl ComfortReport {
    pub fn assess(frame: &SensorFrame, bands: &ComfortBands) -> Self {
        Self {
            humidity: bands.humidity.level(frame.humidity),
            gas: bands.gas.level(frame.gas as f32),
        }
    }

    /// True when any reading is outside its band.
    pub fn needs_attention(&self) -> bool {
        self.humidity != Level::InBand || self.gas != Level::InBand
    }
}
