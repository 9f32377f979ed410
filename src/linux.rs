//! Linux userspace bindings
//!
//! Connects the driver to `/dev/spidevX.Y` through `spidev` and to GPIO
//! character devices through `gpio-cdev`.

use std::fmt;
use std::io;

use embedded_hal::digital::{self, OutputPin, StatefulOutputPin};
use embedded_hal::spi::{self, Operation, SpiDevice};
use gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use spidev::{SpiModeFlags, Spidev, SpidevOptions, SpidevTransfer};
use tracing::{debug, warn};

use crate::{Connector, DeviceLock, Error, GpioController, Result, StdDelay, Sx1255, Sx1255Config, Transport};

/// Consumer label of the reset line
pub const RESET_CONSUMER: &str = "sx1255-reset";

/// Consumer label of the TX/RX switch line
pub const TX_RX_CONSUMER: &str = "sx1255-txrx";

/// Error of a Linux SPI device
#[derive(Debug)]
pub enum LinuxSpiError {
    /// The ioctl failed
    Io(io::Error),
    /// The transaction holds an operation the device cannot perform
    Unsupported(&'static str),
}

impl fmt::Display for LinuxSpiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "{e}"),
            Self::Unsupported(what) => write!(f, "unsupported operation: {what}"),
        }
    }
}

impl std::error::Error for LinuxSpiError {}

impl spi::Error for LinuxSpiError {
    fn kind(&self) -> spi::ErrorKind {
        spi::ErrorKind::Other
    }
}

/// SPI device node, configured for mode 0 and 8-bit words
pub struct LinuxSpi {
    dev: Spidev,
}

impl LinuxSpi {
    /// Opens and configures a spidev node.
    pub fn open(path: &str, speed_hz: u32) -> io::Result<Self> {
        let mut dev = Spidev::open(path)?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(speed_hz)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        dev.configure(&options)?;
        Ok(Self { dev })
    }
}

impl spi::ErrorType for LinuxSpi {
    type Error = LinuxSpiError;
}

impl SpiDevice for LinuxSpi {
    /// Runs the whole transaction as one full-duplex transfer, so chip select
    /// stays asserted from the first byte to the last.
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> core::result::Result<(), Self::Error> {
        let mut tx = Vec::new();
        for op in operations.iter() {
            match op {
                Operation::Read(buf) => tx.resize(tx.len() + buf.len(), 0),
                Operation::Write(buf) => tx.extend_from_slice(buf),
                Operation::Transfer(read, write) => {
                    let len = read.len().max(write.len());
                    tx.extend_from_slice(write);
                    tx.resize(tx.len() + len - write.len(), 0);
                }
                Operation::TransferInPlace(buf) => tx.extend_from_slice(buf),
                Operation::DelayNs(_) => return Err(LinuxSpiError::Unsupported("delay inside transaction")),
            }
        }

        let mut rx = vec![0u8; tx.len()];
        self.dev
            .transfer(&mut SpidevTransfer::read_write(&tx, &mut rx))
            .map_err(LinuxSpiError::Io)?;

        let mut offset = 0;
        for op in operations.iter_mut() {
            match op {
                Operation::Read(buf) | Operation::TransferInPlace(buf) => {
                    buf.copy_from_slice(&rx[offset..offset + buf.len()]);
                    offset += buf.len();
                }
                Operation::Write(buf) => offset += buf.len(),
                Operation::Transfer(read, write) => {
                    read.copy_from_slice(&rx[offset..offset + read.len()]);
                    offset += read.len().max(write.len());
                }
                Operation::DelayNs(_) => {}
            }
        }
        Ok(())
    }
}

/// Error of a GPIO character device line
#[derive(Debug)]
pub struct CdevError(gpio_cdev::Error);

impl fmt::Display for CdevError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for CdevError {}

impl digital::Error for CdevError {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

/// Output line requested from a GPIO character device
pub struct CdevLine {
    handle: LineHandle,
}

impl CdevLine {
    /// Requests `offset` on `chip` as an output, initially low.
    pub fn request(chip: &mut Chip, offset: u32, consumer: &str) -> core::result::Result<Self, gpio_cdev::Error> {
        let handle = chip
            .get_line(offset)?
            .request(LineRequestFlags::OUTPUT, 0, consumer)?;
        Ok(Self { handle })
    }
}

impl digital::ErrorType for CdevLine {
    type Error = CdevError;
}

impl OutputPin for CdevLine {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        self.handle.set_value(0).map_err(CdevError)
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        self.handle.set_value(1).map_err(CdevError)
    }
}

impl StatefulOutputPin for CdevLine {
    fn is_set_high(&mut self) -> core::result::Result<bool, Self::Error> {
        self.handle.get_value().map(|v| v != 0).map_err(CdevError)
    }

    fn is_set_low(&mut self) -> core::result::Result<bool, Self::Error> {
        self.is_set_high().map(|high| !high)
    }
}

/// Controller wired to Linux devices
pub type LinuxSx1255 = Sx1255<LinuxSpi, CdevLine, StdDelay>;

impl Transport<LinuxSpi, StdDelay> {
    /// Opens a spidev node in mode 0 with 8-bit words.
    ///
    /// # Errors
    /// * [`Error::ResourceUnavailable`] - the node cannot be opened or configured
    pub fn open(path: &str, speed_hz: u32) -> Result<Self> {
        let spi = LinuxSpi::open(path, speed_hz).map_err(|e| Error::unavailable(path, e))?;
        debug!("opened {} at {} Hz", path, speed_hz);
        Ok(Transport::new(spi, StdDelay).with_label(format!("{path}, Speed: {speed_hz} Hz")))
    }
}

impl GpioController<CdevLine, StdDelay> {
    /// Claims the reset and TX/RX lines of a GPIO chip as outputs, both low.
    ///
    /// The chip handle is only needed to request the lines and is dropped
    /// before this returns.
    ///
    /// # Errors
    /// * [`Error::ResourceUnavailable`] - the chip cannot be opened or a line is busy
    /// * [`Error::InvalidArgument`] - a line offset does not exist on the chip
    pub fn open(chip_path: &str, reset_pin: u32, tx_rx_pin: u32) -> Result<Self> {
        let mut chip = Chip::new(chip_path).map_err(|e| Error::unavailable(chip_path, e))?;

        check_line_offsets(chip_path, chip.num_lines(), reset_pin, tx_rx_pin)?;

        let reset = CdevLine::request(&mut chip, reset_pin, RESET_CONSUMER)
            .map_err(|e| Error::unavailable(format!("{chip_path} line {reset_pin}"), e))?;
        let tx_rx = CdevLine::request(&mut chip, tx_rx_pin, TX_RX_CONSUMER)
            .map_err(|e| Error::unavailable(format!("{chip_path} line {tx_rx_pin}"), e))?;

        debug!("claimed {} lines {} and {}", chip_path, reset_pin, tx_rx_pin);
        Ok(GpioController::from_lines(reset, tx_rx, StdDelay)?.with_label(format!(
            "{chip_path}, Reset Pin: {reset_pin}, TX/RX Pin: {tx_rx_pin}"
        )))
    }
}

/// Rejects line offsets a chip with `lines` lines does not have.
fn check_line_offsets(chip_path: &str, lines: u32, reset_pin: u32, tx_rx_pin: u32) -> Result<()> {
    for (name, pin) in [("reset", reset_pin), ("TX/RX", tx_rx_pin)] {
        if pin >= lines {
            return Err(Error::InvalidArgument(format!(
                "{name} line {pin} out of range, {chip_path} has {lines} lines"
            )));
        }
    }
    Ok(())
}

/// Closes `transport` if `result` is an error, keeping that error.
fn release_on_error<SPI, D, T>(transport: &mut Transport<SPI, D>, result: Result<T>) -> Result<T> {
    if result.is_err() {
        if let Err(close) = transport.close() {
            warn!("releasing {} failed: {}", transport.info(), close);
        }
    }
    result
}

impl Sx1255<LinuxSpi, CdevLine, StdDelay> {
    /// Opens the SPI device and the GPIO lines described by `config`.
    ///
    /// Blocks while another controller in this process holds the same SPI
    /// device; the returned controller holds it until closed or dropped.
    /// Zero speed or clock values select their defaults. If the GPIO side
    /// cannot be opened the SPI device is released before returning.
    ///
    /// # Errors
    /// * [`Error::InvalidArgument`] - invalid configuration or line offset
    /// * [`Error::ResourceUnavailable`] - the SPI device or GPIO chip cannot be opened
    pub fn open(config: &Sx1255Config) -> Result<Self> {
        let config = config.clone().with_defaults();
        config.validate()?;

        let claim = DeviceLock::for_device(&config.spi_device).acquire();
        let mut transport = Transport::open(&config.spi_device, config.spi_speed)?;

        let gpio = GpioController::open(&config.gpio_chip, config.reset_pin, config.tx_rx_pin);
        let gpio = release_on_error(&mut transport, gpio)?;

        Ok(Sx1255::new(transport, gpio, config.clock_freq).holding(claim))
    }
}

/// Opens controllers from a fixed configuration.
#[derive(Debug, Clone)]
pub struct LinuxConnector {
    config: Sx1255Config,
}

impl LinuxConnector {
    /// Connector opening the devices named in `config` on every session.
    pub fn new(config: Sx1255Config) -> Self {
        Self { config }
    }

    /// The configuration each session is opened with
    pub fn config(&self) -> &Sx1255Config {
        &self.config
    }
}

impl Connector for LinuxConnector {
    type Spi = LinuxSpi;
    type Pin = CdevLine;
    type Delay = StdDelay;

    fn connect(&self) -> Result<LinuxSx1255> {
        Sx1255::open(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChip;

    #[test]
    fn missing_spidev_is_unavailable() {
        let result = Transport::open("/dev/nonexistent-spidev9.9", 1_000_000);
        assert!(matches!(result, Err(Error::ResourceUnavailable { .. })));
    }

    #[test]
    fn missing_gpio_chip_is_unavailable() {
        let result = GpioController::open("/dev/nonexistent-gpiochip9", 0, 1);
        assert!(matches!(result, Err(Error::ResourceUnavailable { .. })));
    }

    #[test]
    fn line_offsets_are_checked_against_the_chip() {
        assert!(check_line_offsets("/dev/gpiochip0", 54, 0, 13).is_ok());
        assert!(matches!(
            check_line_offsets("/dev/gpiochip0", 54, 54, 13),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            check_line_offsets("/dev/gpiochip0", 8, 0, 13),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn failed_gpio_open_releases_spi() {
        let chip = MockChip::new();
        let mut transport = Transport::new(chip.spi(), StdDelay);

        let gpio: Result<()> = Err(Error::unavailable("/dev/gpiochip9", "no such device"));
        let result = release_on_error(&mut transport, gpio);

        assert!(matches!(result, Err(Error::ResourceUnavailable { .. })));
        assert!(!transport.is_open());
    }

    #[test]
    fn successful_gpio_open_keeps_spi() {
        let chip = MockChip::new();
        let mut transport = Transport::new(chip.spi(), StdDelay);

        assert_eq!(release_on_error(&mut transport, Ok(7)).unwrap(), 7);
        assert!(transport.is_open());
    }

    #[test]
    fn open_rejects_invalid_config_before_touching_devices() {
        let config = Sx1255Config {
            spi_device: String::from("/dev/nonexistent-spidev9.8"),
            reset_pin: 5,
            tx_rx_pin: 5,
            ..Sx1255Config::default()
        };

        assert!(matches!(Sx1255::open(&config), Err(Error::InvalidArgument(_))));
        assert!(!DeviceLock::for_device(&config.spi_device).is_held());
    }

    #[test]
    fn open_with_missing_spidev_releases_claim() {
        let config = Sx1255Config {
            spi_device: String::from("/dev/nonexistent-spidev9.7"),
            ..Sx1255Config::default()
        };

        assert!(matches!(Sx1255::open(&config), Err(Error::ResourceUnavailable { .. })));
        assert!(!DeviceLock::for_device(&config.spi_device).is_held());
    }
}
