//! Simulated SX1255 for testing and development
//!
//! [`MockChip`] is a register file that decodes SX1255 SPI frames and records
//! every frame it receives. [`MockSpi`] and [`MockPin`] implement the
//! embedded-hal traits so a full [`Sx1255`] can run without hardware.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use embedded_hal::digital::{self, OutputPin, StatefulOutputPin};
use embedded_hal::spi::{self, Operation, SpiDevice};

use crate::registers::map::{self, Access, REGISTER_COUNT, REGISTER_MAP};
use crate::bus::DeviceLock;
use crate::transport::WRITE_FLAG;
use crate::{GpioController, Result, StdDelay, Sx1255, Transport};

/// Raw VERSION value reported by the simulated chip
pub const MOCK_VERSION: u8 = 0x11;

/// One SPI frame seen by the simulated chip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Bytes sent by the host
    pub tx: Vec<u8>,
    /// Bytes returned by the chip
    pub rx: Vec<u8>,
    /// Thread that issued the frame
    pub thread: ThreadId,
}

impl Frame {
    /// Register address the frame starts at
    pub fn address(&self) -> u8 {
        self.tx.first().map_or(0, |a| a & !WRITE_FLAG)
    }

    /// True for write frames
    pub fn is_write(&self) -> bool {
        self.tx.first().is_some_and(|a| a & WRITE_FLAG != 0)
    }
}

struct ChipState {
    registers: [u8; REGISTER_COUNT],
    frames: Vec<Frame>,
    fail_after: Option<usize>,
    frame_delay: Option<Duration>,
}

/// Shared handle to a simulated SX1255
#[derive(Clone)]
pub struct MockChip {
    state: Arc<Mutex<ChipState>>,
    reset: MockPin,
    tx_rx: MockPin,
    claim: DeviceLock,
}

impl Default for MockChip {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChip {
    /// Creates a chip holding its default configuration, in sleep mode.
    pub fn new() -> Self {
        let mut registers = [0u8; REGISTER_COUNT];
        for info in REGISTER_MAP.iter() {
            registers[usize::from(info.address)] = info.default.unwrap_or(0);
        }
        registers[usize::from(map::MODE)] = 0x00;
        registers[usize::from(map::VERSION)] = MOCK_VERSION;

        Self {
            state: Arc::new(Mutex::new(ChipState {
                registers,
                frames: Vec::new(),
                fail_after: None,
                frame_delay: None,
            })),
            reset: MockPin::new(),
            tx_rx: MockPin::new(),
            claim: DeviceLock::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, ChipState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current value of a register
    pub fn register(&self, address: u8) -> u8 {
        self.state().registers[usize::from(address)]
    }

    /// Sets a register directly, read-only registers included.
    pub fn set_register(&self, address: u8, value: u8) {
        self.state().registers[usize::from(address)] = value;
    }

    /// Every frame received so far
    pub fn frames(&self) -> Vec<Frame> {
        self.state().frames.clone()
    }

    /// `(address, value)` of every single-register write, in order
    pub fn writes(&self) -> Vec<(u8, u8)> {
        self.state()
            .frames
            .iter()
            .filter(|f| f.is_write() && f.tx.len() == 2)
            .map(|f| (f.address(), f.tx[1]))
            .collect()
    }

    /// Forgets the recorded frames.
    pub fn clear_frames(&self) {
        self.state().frames.clear();
    }

    /// Makes every frame after the first `frames` fail with a bus error.
    pub fn fail_after(&self, frames: usize) {
        self.state().fail_after = Some(frames);
    }

    /// Stops injecting bus errors.
    pub fn heal(&self) {
        self.state().fail_after = None;
    }

    /// Stalls every frame for `delay` before it reaches the chip.
    pub fn set_frame_delay(&self, delay: Duration) {
        self.state().frame_delay = Some(delay);
    }

    /// New SPI handle to this chip
    pub fn spi(&self) -> MockSpi {
        MockSpi { chip: self.clone() }
    }

    /// The reset line wired to this chip
    pub fn reset_line(&self) -> MockPin {
        self.reset.clone()
    }

    /// The TX/RX switch line wired to this chip
    pub fn tx_rx_line(&self) -> MockPin {
        self.tx_rx.clone()
    }

    /// The claim every controller on this chip holds while open
    pub fn device_lock(&self) -> DeviceLock {
        self.claim.clone()
    }

    /// Opens a controller wired to this chip.
    ///
    /// Blocks while another controller on this chip is open.
    pub fn controller(&self, clock_hz: u32) -> Result<Sx1255<MockSpi, MockPin, StdDelay>> {
        let claim = self.claim.acquire();
        let transport = Transport::new(self.spi(), StdDelay).with_label("mock spi");
        let gpio = GpioController::from_lines(self.reset_line(), self.tx_rx_line(), StdDelay)?
            .with_label("mock gpio");
        Ok(Sx1255::new(transport, gpio, clock_hz).holding(claim))
    }

    fn exchange(&self, tx: &[u8]) -> core::result::Result<Vec<u8>, MockError> {
        let delay = self.state().frame_delay;
        if let Some(delay) = delay {
            thread::sleep(delay);
        }

        let mut state = self.state();
        if let Some(remaining) = state.fail_after.as_mut() {
            if *remaining == 0 {
                return Err(MockError);
            }
            *remaining -= 1;
        }

        let mut rx = vec![0u8; tx.len()];
        if let Some((&header, data)) = tx.split_first() {
            let start = usize::from(header & !WRITE_FLAG);
            let write = header & WRITE_FLAG != 0;

            for (offset, byte) in data.iter().enumerate() {
                let address = start + offset;
                if address >= REGISTER_COUNT {
                    break;
                }
                if write {
                    if REGISTER_MAP[address].access == Access::ReadWrite {
                        state.registers[address] = *byte;
                    }
                } else {
                    rx[offset + 1] = state.registers[address];
                }
            }
        }

        state.frames.push(Frame {
            tx: tx.to_vec(),
            rx: rx.clone(),
            thread: thread::current().id(),
        });
        Ok(rx)
    }
}

/// Error injected by the simulated hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

impl spi::Error for MockError {
    fn kind(&self) -> spi::ErrorKind {
        spi::ErrorKind::Other
    }
}

impl digital::Error for MockError {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

/// SPI device connected to a [`MockChip`]
///
/// All operations of one transaction form a single frame, as if chip select
/// stayed asserted for the whole transaction.
pub struct MockSpi {
    chip: MockChip,
}

impl spi::ErrorType for MockSpi {
    type Error = MockError;
}

impl SpiDevice for MockSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> core::result::Result<(), Self::Error> {
        let mut tx = Vec::new();
        for op in operations.iter() {
            match op {
                Operation::Read(buf) => tx.resize(tx.len() + buf.len(), 0),
                Operation::Write(buf) => tx.extend_from_slice(buf),
                Operation::Transfer(read, write) => {
                    tx.extend_from_slice(write);
                    tx.resize(tx.len() + read.len().saturating_sub(write.len()), 0);
                }
                Operation::TransferInPlace(buf) => tx.extend_from_slice(buf),
                Operation::DelayNs(_) => {}
            }
        }

        let rx = self.chip.exchange(&tx)?;

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

struct PinState {
    level: bool,
    history: Vec<(bool, Instant)>,
    fail_writes: bool,
    fail_level: Option<bool>,
}

/// Output line that records every level it is driven to
#[derive(Clone)]
pub struct MockPin {
    state: Arc<Mutex<PinState>>,
}

impl Default for MockPin {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPin {
    /// A line starting low
    pub fn new() -> Self {
        Self::with_level(false)
    }

    /// A line starting at `level`
    pub fn with_level(level: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(PinState {
                level,
                history: Vec::new(),
                fail_writes: false,
                fail_level: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, PinState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current level
    pub fn level(&self) -> bool {
        self.state().level
    }

    /// Every level driven so far, with the time it was driven
    pub fn history(&self) -> Vec<(bool, Instant)> {
        self.state().history.clone()
    }

    /// Makes every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    /// Makes writes of one level fail while other writes succeed.
    pub fn fail_level(&self, level: Option<bool>) {
        self.state().fail_level = level;
    }

    fn drive(&mut self, level: bool) -> core::result::Result<(), MockError> {
        let mut state = self.state();
        if state.fail_writes || state.fail_level == Some(level) {
            return Err(MockError);
        }
        state.level = level;
        state.history.push((level, Instant::now()));
        Ok(())
    }
}

impl digital::ErrorType for MockPin {
    type Error = MockError;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        self.drive(false)
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        self.drive(true)
    }
}

impl StatefulOutputPin for MockPin {
    fn is_set_high(&mut self) -> core::result::Result<bool, Self::Error> {
        Ok(self.level())
    }

    fn is_set_low(&mut self) -> core::result::Result<bool, Self::Error> {
        Ok(!self.level())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_registers_ignore_writes() {
        let chip = MockChip::new();
        let mut spi = chip.spi();
        let mut rx = [0u8; 2];

        spi.transfer(&mut rx, &[map::VERSION | WRITE_FLAG, 0x55]).unwrap();
        assert_eq!(chip.register(map::VERSION), MOCK_VERSION);
    }

    #[test]
    fn burst_stops_at_end_of_map() {
        let chip = MockChip::new();
        let mut spi = chip.spi();
        let mut rx = [0u8; 4];

        spi.transfer(&mut rx, &[map::IISM | WRITE_FLAG, 0xAA, 0xBB, 0xCC]).unwrap();
        assert_eq!(chip.register(map::IISM), 0xAA);
        assert_eq!(chip.register(map::DIG_BRIDGE), 0xBB);
    }

    #[test]
    fn injected_failures() {
        let chip = MockChip::new();
        chip.fail_after(1);
        let mut spi = chip.spi();
        let mut rx = [0u8; 2];

        assert!(spi.transfer(&mut rx, &[0x00, 0x00]).is_ok());
        assert!(spi.transfer(&mut rx, &[0x00, 0x00]).is_err());
        chip.heal();
        assert!(spi.transfer(&mut rx, &[0x00, 0x00]).is_ok());
        assert_eq!(chip.frames().len(), 2);
    }

    #[test]
    fn split_transaction_is_one_frame() {
        let chip = MockChip::new();
        let mut spi = chip.spi();
        let mut value = [0u8; 1];

        spi.transaction(&mut [Operation::Write(&[map::VERSION]), Operation::Read(&mut value)])
            .unwrap();
        assert_eq!(value[0], MOCK_VERSION);
        assert_eq!(chip.frames().len(), 1);
    }
}
