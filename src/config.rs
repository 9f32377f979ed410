//! Board configuration
//!
//! Describes where the SX1255 is wired: SPI device node and clock, GPIO chip
//! and line offsets, reference oscillator. Every field has a default, so a
//! partial document deserializes.

use serde::{Deserialize, Serialize};

use crate::frequency::DEFAULT_FXOSC_HZ;
use crate::{Error, Result};

/// Default SPI device node
pub const DEFAULT_SPI_DEVICE: &str = "/dev/spidev0.0";

/// Default SPI clock, in Hz
pub const DEFAULT_SPI_SPEED_HZ: u32 = 500_000;

/// Default GPIO character device
pub const DEFAULT_GPIO_CHIP: &str = "/dev/gpiochip0";

/// Default line offset of the reset output
pub const DEFAULT_RESET_PIN: u32 = 0;

/// Default line offset of the TX/RX switch output
pub const DEFAULT_TX_RX_PIN: u32 = 13;

/// Where and how the SX1255 is connected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sx1255Config {
    /// SPI device node, e.g. `/dev/spidev0.0`
    pub spi_device: String,
    /// SPI clock in Hz
    pub spi_speed: u32,
    /// GPIO character device, e.g. `/dev/gpiochip0`
    pub gpio_chip: String,
    /// Line offset of the reset output
    pub reset_pin: u32,
    /// Line offset of the TX/RX switch output
    pub tx_rx_pin: u32,
    /// Reference oscillator in Hz
    pub clock_freq: u32,
}

impl Default for Sx1255Config {
    fn default() -> Self {
        Self {
            spi_device: String::from(DEFAULT_SPI_DEVICE),
            spi_speed: DEFAULT_SPI_SPEED_HZ,
            gpio_chip: String::from(DEFAULT_GPIO_CHIP),
            reset_pin: DEFAULT_RESET_PIN,
            tx_rx_pin: DEFAULT_TX_RX_PIN,
            clock_freq: DEFAULT_FXOSC_HZ,
        }
    }
}

impl Sx1255Config {
    /// Replaces a zero SPI speed or reference clock with its default.
    pub fn with_defaults(mut self) -> Self {
        if self.spi_speed == 0 {
            self.spi_speed = DEFAULT_SPI_SPEED_HZ;
        }
        if self.clock_freq == 0 {
            self.clock_freq = DEFAULT_FXOSC_HZ;
        }
        self
    }

    /// Checks the configuration can describe a real board.
    ///
    /// # Errors
    /// * [`Error::InvalidArgument`] - a device path is empty, or both
    ///   functions are assigned to the same line
    pub fn validate(&self) -> Result<()> {
        if self.spi_device.trim().is_empty() {
            return Err(Error::InvalidArgument(String::from("spi_device must not be empty")));
        }
        if self.gpio_chip.trim().is_empty() {
            return Err(Error::InvalidArgument(String::from("gpio_chip must not be empty")));
        }
        if self.reset_pin == self.tx_rx_pin {
            return Err(Error::InvalidArgument(format!(
                "reset_pin and tx_rx_pin both use line {}",
                self.reset_pin
            )));
        }
        Ok(())
    }
}
