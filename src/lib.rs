//! SX1255 Transceiver Driver
//!
//! This crate controls the Semtech SX1255, a 400-510 MHz RF front-end
//! transceiver with I/Q baseband interfaces. The chip is configured over SPI;
//! two GPIO lines drive its reset input and an external TX/RX antenna switch.
//!
//! # Features
//! - RX and TX synthesizers tuned in Hz with 24-bit Frf words
//! - LNA, PGA, DAC and mixer gains in dB
//! - Operating mode, status and PLL lock flags
//! - Raw single and burst register access
//! - Open/use/close sessions serialized per physical device
//!
//! # Architecture
//! The driver is organized into several layers:
//!
//! - [`transport`]: SX1255 SPI framing over any embedded-hal [`SpiDevice`](embedded_hal::spi::SpiDevice)
//! - [`gpio`]: reset pulse and antenna switch over embedded-hal output pins
//! - [`registers`]: register map, defaults and typed register views
//! - [`device`]: the [`Sx1255`] controller, working in engineering units
//! - [`bus`]: [`Sx1255Bus`] sessions and the per-device [`DeviceLock`]
//!
//! With the `linux` feature, `linux` binds the driver to spidev and GPIO
//! character devices and adds `Sx1255::open` for an [`Sx1255Config`].
//!
//! # Important Notes
//! - Every SPI frame is followed by a blocking 10 µs gap
//! - A reset blocks for about 5 ms
//! - Gain and mode changes are read-modify-write and keep neighbouring fields
//! - An out of range frequency is rejected before any register is written
//!
//! # Example
//! ```no_run
//! use sx1255::{mock::MockChip, Sx1255Bus};
//!
//! let chip = MockChip::new();
//! let bus = Sx1255Bus::new(|| chip.controller(32_000_000));
//!
//! let version = bus.with_controller(|radio| {
//!     radio.set_rx_frequency(433_920_000)?;
//!     radio.enable_rx(true)?;
//!     radio.version_string()
//! })?;
//! println!("SX1255 {version}");
//! # Ok::<(), sx1255::Error>(())
//! ```

pub mod bus;
pub mod config;
pub mod delay;
pub mod device;
pub mod error;
pub mod frequency;
pub mod gain;
pub mod gpio;
#[cfg(feature = "linux")]
pub mod linux;
pub mod mock;
pub mod registers;
pub mod transport;

pub use bus::{Connector, DeviceGuard, DeviceLock, Sx1255Bus};
pub use config::Sx1255Config;
pub use delay::StdDelay;
pub use device::{ControllerInfo, DeviceSnapshot, Sx1255};
pub use error::{Error, Result};
pub use frequency::{Frf, Synthesizer};
pub use gain::{DacGain, GainSettings, LnaGain, MixerGain, PgaGain};
pub use gpio::GpioController;
#[cfg(feature = "linux")]
pub use linux::{LinuxConnector, LinuxSx1255};
pub use registers::*;
pub use transport::Transport;
