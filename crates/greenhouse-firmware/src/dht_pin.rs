//! Open-drain data line for the DHT11
//!
//! The DHT11 shares one wire between host and sensor. This wraps a `Flex` GPIO
//! and switches its output driver on and off so the pin behaves like an
//! open-drain output with its input always enabled:
//!
//! - `set_low` enables the driver with the output level low
//! - `set_high` disables the driver, letting the pull-up raise the line
//!
//! The external 10 kΩ pull-up on the DHT11 module does the work; the internal
//! pull-up is enabled as a fallback.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use esp_hal::gpio::{Flex, InputConfig, Pin, Pull};

pub struct DhtPin<'d> {
    pin: Flex<'d>,
}

impl<'d> DhtPin<'d> {
    /// Takes the GPIO and leaves the line released (idle high).
    pub fn new(pin: impl Pin + 'd) -> Self {
        let mut pin = Flex::new(pin);
        pin.apply_input_config(&InputConfig::default().with_pull(Pull::Up));
        pin.set_input_enable(true);
        pin.set_low();
        pin.set_output_enable(false);

        Self { pin }
    }
}

impl ErrorType for DhtPin<'_> {
    type Error = Infallible;
}

impl OutputPin for DhtPin<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.pin.set_low();
        self.pin.set_output_enable(true);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.pin.set_output_enable(false);
        Ok(())
    }
}

impl InputPin for DhtPin<'_> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pin.is_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pin.is_low())
    }
}
