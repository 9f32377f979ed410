//! Reset and TX/RX switch lines
//!
//! The SX1255 board wiring uses two digital outputs:
//! - RESET: active high, pulsed to reset the chip
//! - TX/RX: level held, high selects the transmit path of the antenna switch
//!
//! Both lines are driven low when acquired and parked low again on close.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{OutputPin, StatefulOutputPin};
use tracing::{debug, trace, warn};

use crate::{Error, Result};

/// Minimum time the reset line is held high, in microseconds
pub const RESET_PULSE_US: u32 = 100;

/// Time the chip needs after reset before it accepts SPI traffic, in milliseconds
pub const RESET_SETTLE_MS: u32 = 5;

struct Lines<P> {
    reset: P,
    tx_rx: P,
}

/// Owner of the reset and TX/RX switch lines
pub struct GpioController<P, D> {
    lines: Option<Lines<P>>,
    delay: D,
    label: String,
}

impl<P, D> GpioController<P, D>
where
    P: OutputPin + StatefulOutputPin,
    D: DelayNs,
{
    /// Takes ownership of two output lines and drives both low.
    pub fn from_lines(mut reset: P, mut tx_rx: P, delay: D) -> Result<Self> {
        reset
            .set_low()
            .map_err(|e| Error::transport("initialize reset line low", e))?;
        tx_rx
            .set_low()
            .map_err(|e| Error::transport("initialize TX/RX line low", e))?;

        Ok(Self {
            lines: Some(Lines { reset, tx_rx }),
            delay,
            label: String::from("gpio"),
        })
    }

    /// Sets the description reported by [`info`](GpioController::info).
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Returns true until the controller is closed.
    pub fn is_open(&self) -> bool {
        self.lines.is_some()
    }

    /// Human readable description of the lines
    pub fn info(&self) -> String {
        if self.is_open() {
            format!("GPIO: {}", self.label)
        } else {
            format!("GPIO: {} (closed)", self.label)
        }
    }

    fn lines(&mut self) -> Result<&mut Lines<P>> {
        self.lines
            .as_mut()
            .ok_or(Error::InvalidState("GPIO lines not open"))
    }

    /// Hardware reset.
    ///
    /// Holds RESET high for at least 100 µs, releases it, then blocks for
    /// 5 ms so the chip is ready when this returns.
    ///
    /// If raising the line fails it is still driven low before the error is
    /// returned. If releasing it fails, RESET stays high and the chip is held
    /// in reset until the line is driven low again.
    pub fn reset(&mut self) -> Result<()> {
        let lines = self.lines()?;
        if let Err(e) = lines.reset.set_high() {
            if let Err(low) = lines.reset.set_low() {
                warn!("releasing reset line after failed pulse also failed: {:?}", low);
            }
            return Err(Error::transport("set reset line high", e));
        }

        self.delay.delay_us(RESET_PULSE_US);

        let lines = self.lines()?;
        lines
            .reset
            .set_low()
            .map_err(|e| Error::transport("set reset line low", e))?;

        self.delay.delay_ms(RESET_SETTLE_MS);
        debug!("reset pulse complete");
        Ok(())
    }

    /// Drives the reset line.
    pub fn set_reset_pin(&mut self, high: bool) -> Result<()> {
        let lines = self.lines()?;
        drive(&mut lines.reset, high).map_err(|e| Error::transport(format!("set reset line to {high}"), e))
    }

    /// Reads back the level of the reset line.
    pub fn reset_pin(&mut self) -> Result<bool> {
        let lines = self.lines()?;
        lines
            .reset
            .is_set_high()
            .map_err(|e| Error::transport("read reset line", e))
    }

    /// Drives the TX/RX switch line: true selects transmit.
    pub fn set_tx_rx_pin(&mut self, tx: bool) -> Result<()> {
        let lines = self.lines()?;
        drive(&mut lines.tx_rx, tx).map_err(|e| Error::transport(format!("set TX/RX line to {tx}"), e))?;
        trace!("TX/RX switch -> {}", if tx { "TX" } else { "RX" });
        Ok(())
    }

    /// Reads back the TX/RX switch line: true means transmit.
    pub fn tx_rx_pin(&mut self) -> Result<bool> {
        let lines = self.lines()?;
        lines
            .tx_rx
            .is_set_high()
            .map_err(|e| Error::transport("read TX/RX line", e))
    }

    /// Parks both lines low and releases them, TX/RX first.
    ///
    /// Every line is released even if parking another one failed; the errors
    /// are returned together. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(Lines { mut reset, mut tx_rx }) = self.lines.take() else {
            return Ok(());
        };

        let mut errors = Vec::new();
        if let Err(e) = tx_rx.set_low() {
            errors.push(Error::transport("park TX/RX line", e));
        }
        drop(tx_rx);

        if let Err(e) = reset.set_low() {
            errors.push(Error::transport("park reset line", e));
        }
        drop(reset);

        debug!("released GPIO lines of {}", self.label);
        Error::from_close_errors(errors)
    }
}

fn drive<P: OutputPin>(pin: &mut P, high: bool) -> core::result::Result<(), P::Error> {
    if high {
        pin.set_high()
    } else {
        pin.set_low()
    }
}
