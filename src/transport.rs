//! SX1255 SPI register transport
//!
//! Frames every register access the way the SX1255 expects it on the wire:
//!
//! - one address byte, MSB set for a write and clear for a read
//! - one data byte per register, consecutive registers in burst mode
//! - SPI mode 0, 8-bit words
//!
//! Every frame is a single full-duplex transfer with chip select held for its
//! whole length, followed by a blocking 10 µs gap before the next frame.
//!
//! # Example
//! ```no_run
//! use embedded_hal::spi::SpiDevice;
//! use sx1255::{registers::map, StdDelay, Transport};
//!
//! fn probe<SPI: SpiDevice>(spi: SPI) -> sx1255::Result<u8> {
//!     let mut transport = Transport::new(spi, StdDelay);
//!     transport.write_register(map::MODE, 0x01)?;
//!     transport.check_device()
//! }
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;
use regiface::{ReadableRegister, WritableRegister};
use tracing::trace;

use crate::registers::map::{self, validate_address, validate_span};
use crate::{Error, Result};

/// Address flag marking a write frame
pub const WRITE_FLAG: u8 = 0x80;

/// Minimum gap between two frames, in microseconds
pub const INTER_FRAME_DELAY_US: u32 = 10;

/// Register transport over an SPI device.
///
/// Owns the SPI device until [`close`](Transport::close) is called; every
/// access after that fails with [`Error::InvalidState`].
pub struct Transport<SPI, D> {
    spi: Option<SPI>,
    delay: D,
    label: String,
}

impl<SPI, D> Transport<SPI, D> {
    /// Creates a transport over an already configured SPI device.
    pub fn new(spi: SPI, delay: D) -> Self {
        Self {
            spi: Some(spi),
            delay,
            label: String::from("spi"),
        }
    }

    /// Sets the description reported by [`info`](Transport::info).
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Returns true until the transport is closed.
    pub fn is_open(&self) -> bool {
        self.spi.is_some()
    }

    /// Human readable description of the underlying device
    pub fn info(&self) -> String {
        if self.is_open() {
            format!("Device: {}", self.label)
        } else {
            format!("Device: {} (closed)", self.label)
        }
    }

    /// Releases the SPI device. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.spi.take().is_some() {
            trace!("closed SPI transport {}", self.label);
        }
        Ok(())
    }

    /// Consumes the transport and hands back the SPI device, if still open.
    pub fn release(self) -> Option<SPI> {
        self.spi
    }
}

impl<SPI, D> Transport<SPI, D>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    /// Performs one full-duplex exchange.
    ///
    /// `tx` and `rx` must have the same length. Blocks for the transfer and
    /// the inter-frame gap. Rejected calls never reach the bus and skip the gap.
    ///
    /// # Errors
    /// * [`Error::InvalidArgument`] - buffers differ in length
    /// * [`Error::InvalidState`] - transport closed
    /// * [`Error::TransportFailure`] - SPI bus error
    pub fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        if tx.len() != rx.len() {
            return Err(Error::InvalidArgument(format!(
                "tx and rx buffers must be the same length ({} != {})",
                tx.len(),
                rx.len()
            )));
        }

        let spi = self
            .spi
            .as_mut()
            .ok_or(Error::InvalidState("SPI transport closed"))?;

        let sent = spi.transfer(rx, tx);
        // The gap follows every frame put on the wire, failed ones included.
        self.delay.delay_us(INTER_FRAME_DELAY_US);

        sent.map_err(|e| Error::transport(format!("SPI transfer of {} bytes", tx.len()), e))
    }

    /// Writes one register: `[addr | 0x80, value]`.
    pub fn write_register(&mut self, address: u8, value: u8) -> Result<()> {
        let address = validate_address(address)?;
        let mut rx = [0u8; 2];

        self.transfer(&[address | WRITE_FLAG, value], &mut rx)
            .map_err(|e| context(e, || format!("write register 0x{address:02X}")))?;

        trace!("write 0x{:02X} <- 0x{:02X}", address, value);
        Ok(())
    }

    /// Reads one register: `[addr & 0x7F, 0x00]`, value in the second response byte.
    pub fn read_register(&mut self, address: u8) -> Result<u8> {
        let address = validate_address(address)?;
        let mut rx = [0u8; 2];

        self.transfer(&[address & !WRITE_FLAG, 0x00], &mut rx)
            .map_err(|e| context(e, || format!("read register 0x{address:02X}")))?;

        trace!("read 0x{:02X} -> 0x{:02X}", address, rx[1]);
        Ok(rx[1])
    }

    /// Writes `values` to consecutive registers starting at `start` in one frame.
    ///
    /// # Errors
    /// * [`Error::InvalidArgument`] - `values` is empty or runs past the last register
    pub fn burst_write(&mut self, start: u8, values: &[u8]) -> Result<()> {
        validate_span(start, values.len())?;

        let mut tx = Vec::with_capacity(values.len() + 1);
        tx.push(start | WRITE_FLAG);
        tx.extend_from_slice(values);
        let mut rx = vec![0u8; tx.len()];

        self.transfer(&tx, &mut rx)
            .map_err(|e| context(e, || format!("burst write starting at 0x{start:02X}")))?;

        trace!("burst write 0x{:02X} <- {:02X?}", start, values);
        Ok(())
    }

    /// Reads `count` consecutive registers starting at `start` in one frame.
    ///
    /// # Errors
    /// * [`Error::InvalidArgument`] - `count` is zero or runs past the last register
    pub fn burst_read(&mut self, start: u8, count: usize) -> Result<Vec<u8>> {
        validate_span(start, count)?;

        let mut tx = vec![0u8; count + 1];
        tx[0] = start & !WRITE_FLAG;
        let mut rx = vec![0u8; tx.len()];

        self.transfer(&tx, &mut rx)
            .map_err(|e| context(e, || format!("burst read starting at 0x{start:02X}")))?;

        rx.remove(0);
        trace!("burst read 0x{:02X} -> {:02X?}", start, rx);
        Ok(rx)
    }

    /// Reads the VERSION register to verify the bus is alive.
    pub fn check_device(&mut self) -> Result<u8> {
        self.read_register(map::VERSION)
            .map_err(|e| context(e, || String::from("read version register")))
    }

    /// Reads a typed single-byte register.
    pub fn read<R>(&mut self) -> Result<R>
    where
        R: ReadableRegister<IdType = u8, Array = [u8; 1]>,
    {
        let value = self.read_register(R::id())?;
        R::from_bytes([value]).map_err(|_| Error::TransportFailure {
            operation: format!("decode register 0x{:02X}", R::id()),
            detail: format!("unexpected value 0x{value:02X}"),
        })
    }

    /// Writes a typed single-byte register.
    pub fn write<R>(&mut self, register: R) -> Result<()>
    where
        R: WritableRegister<IdType = u8, Array = [u8; 1]>,
    {
        let [value] = register.to_bytes().map_err(|_| {
            Error::InvalidArgument(format!("register 0x{:02X} cannot be encoded", R::id()))
        })?;
        self.write_register(R::id(), value)
    }
}

/// Prefixes the operation of a transport failure with what the frame was for.
fn context(error: Error, what: impl FnOnce() -> String) -> Error {
    match error {
        Error::TransportFailure { operation, detail } => Error::TransportFailure {
            operation: format!("{}: {operation}", what()),
            detail,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChip;
    use crate::registers::{ChipVersion, Mode};
    use crate::StdDelay;

    fn transport(chip: &MockChip) -> Transport<crate::mock::MockSpi, StdDelay> {
        Transport::new(chip.spi(), StdDelay)
    }

    /// Records requested delays instead of sleeping.
    #[derive(Clone, Default)]
    struct RecordingDelay {
        us: std::sync::Arc<std::sync::Mutex<Vec<u32>>>,
    }

    impl RecordingDelay {
        fn taken(&self) -> Vec<u32> {
            self.us.lock().unwrap().clone()
        }
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.us.lock().unwrap().push(ns / 1_000);
        }

        fn delay_us(&mut self, us: u32) {
            self.us.lock().unwrap().push(us);
        }
    }

    #[test]
    fn every_frame_is_followed_by_the_gap() {
        let chip = MockChip::new();
        let delay = RecordingDelay::default();
        let mut transport = Transport::new(chip.spi(), delay.clone());

        transport.write_register(map::MODE, 0x01).unwrap();
        transport.read_register(map::MODE).unwrap();
        transport.burst_write(map::FRFH_RX, &[0xC0, 0xE3, 0x8E]).unwrap();
        transport.burst_read(map::FRFH_RX, 3).unwrap();

        assert_eq!(chip.frames().len(), 4);
        assert_eq!(delay.taken(), vec![INTER_FRAME_DELAY_US; 4]);
    }

    #[test]
    fn failed_frame_still_waits() {
        let chip = MockChip::new();
        chip.fail_after(0);
        let delay = RecordingDelay::default();
        let mut transport = Transport::new(chip.spi(), delay.clone());

        assert!(matches!(
            transport.write_register(map::MODE, 0x01),
            Err(Error::TransportFailure { .. })
        ));
        assert_eq!(delay.taken(), vec![INTER_FRAME_DELAY_US]);
    }

    #[test]
    fn rejected_calls_do_not_wait() {
        let chip = MockChip::new();
        let delay = RecordingDelay::default();
        let mut transport = Transport::new(chip.spi(), delay.clone());
        let mut rx = [0u8; 3];

        assert!(transport.write_register(0x14, 0).is_err());
        assert!(transport.burst_read(0x12, 3).is_err());
        assert!(transport.burst_write(0x00, &[]).is_err());
        assert!(transport.transfer(&[0x00, 0x00], &mut rx).is_err());
        transport.close().unwrap();
        assert!(transport.read_register(map::MODE).is_err());

        assert!(delay.taken().is_empty());
    }

    #[test]
    fn write_frame_sets_msb() {
        let chip = MockChip::new();
        let mut transport = transport(&chip);

        transport.write_register(map::RXFE1, 0x5A).unwrap();

        let frames = chip.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].tx, vec![0x8C, 0x5A]);
        assert_eq!(chip.register(map::RXFE1), 0x5A);
    }

    #[test]
    fn read_frame_clears_msb() {
        let chip = MockChip::new();
        chip.set_register(map::TXFE2, 0x77);
        let mut transport = transport(&chip);

        assert_eq!(transport.read_register(map::TXFE2).unwrap(), 0x77);
        assert_eq!(chip.frames()[0].tx, vec![0x09, 0x00]);
    }

    #[test]
    fn out_of_range_address_sends_nothing() {
        let chip = MockChip::new();
        let mut transport = transport(&chip);

        assert!(matches!(transport.write_register(0x14, 0), Err(Error::InvalidArgument(_))));
        assert!(matches!(transport.read_register(0x80), Err(Error::InvalidArgument(_))));
        assert!(chip.frames().is_empty());
    }

    #[test]
    fn burst_frames() {
        let chip = MockChip::new();
        let mut transport = transport(&chip);

        transport.burst_write(map::FRFH_TX, &[0x11, 0x22, 0x33]).unwrap();
        assert_eq!(chip.frames()[0].tx, vec![0x84, 0x11, 0x22, 0x33]);

        let values = transport.burst_read(map::FRFH_TX, 3).unwrap();
        assert_eq!(values, vec![0x11, 0x22, 0x33]);
        assert_eq!(chip.frames()[1].tx, vec![0x04, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn empty_bursts_are_rejected() {
        let chip = MockChip::new();
        let mut transport = transport(&chip);

        assert!(matches!(transport.burst_write(0x00, &[]), Err(Error::InvalidArgument(_))));
        assert!(matches!(transport.burst_read(0x00, 0), Err(Error::InvalidArgument(_))));
        assert!(matches!(transport.burst_read(0x12, 3), Err(Error::InvalidArgument(_))));
        assert!(chip.frames().is_empty());
    }

    #[test]
    fn mismatched_buffers_are_rejected() {
        let chip = MockChip::new();
        let mut transport = transport(&chip);
        let mut rx = [0u8; 3];

        assert!(matches!(
            transport.transfer(&[0x00, 0x00], &mut rx),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn bus_errors_carry_context() {
        let chip = MockChip::new();
        chip.fail_after(0);
        let mut transport = transport(&chip);

        match transport.write_register(map::MODE, 0x01) {
            Err(Error::TransportFailure { operation, .. }) => {
                assert!(operation.starts_with("write register 0x00"), "{operation}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn closed_transport_is_invalid() {
        let chip = MockChip::new();
        let mut transport = transport(&chip);

        transport.close().unwrap();
        transport.close().unwrap();
        assert!(!transport.is_open());
        assert!(transport.info().ends_with("(closed)"));
        assert!(matches!(transport.read_register(0x00), Err(Error::InvalidState(_))));
    }

    #[test]
    fn typed_access() {
        let chip = MockChip::new();
        let mut transport = transport(&chip);

        transport.write(Mode::REF | Mode::RX).unwrap();
        assert_eq!(chip.register(map::MODE), 0x03);
        assert_eq!(transport.read::<Mode>().unwrap(), Mode::REF | Mode::RX);
        assert_eq!(transport.read::<ChipVersion>().unwrap().to_string(), "V1A");
        assert_eq!(transport.check_device().unwrap(), 0x11);
    }
}
