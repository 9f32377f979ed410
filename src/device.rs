//! SX1255 Device Interface
//!
//! This module provides the high-level interface to the SX1255. [`Sx1255`]
//! owns one [`Transport`] and one [`GpioController`] and converts engineering
//! units into register sequences:
//! - RX and TX synthesizer frequencies in Hz
//! - RX (LNA, PGA) and TX (DAC, mixer) gains in dB
//! - operating mode enable bits
//! - status, version and the external TX/RX antenna switch
//!
//! Register fields that share a register with other fields are always written
//! read-modify-write, so setting one gain never disturbs another.
//!
//! # Example
//! ```no_run
//! use sx1255::mock::MockChip;
//!
//! let chip = MockChip::new();
//! let mut radio = chip.controller(32_000_000)?;
//!
//! radio.set_rx_frequency(433_920_000)?;
//! radio.enable_rx(true)?;
//! radio.set_lna_gain(48)?;
//! radio.close()?;
//! # Ok::<(), sx1255::Error>(())
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{OutputPin, StatefulOutputPin};
use embedded_hal::spi::SpiDevice;
use regiface::{ReadableRegister, WritableRegister};
use serde::Serialize;
use tracing::{debug, info};

use crate::frequency::{Frf, Synthesizer, DEFAULT_FXOSC_HZ};
use crate::gain::{DacGain, GainSettings, LnaGain, MixerGain, PgaGain};
use crate::registers::map::{self, DEFAULT_CONFIGURATION, REGISTER_COUNT};
use crate::registers::{ChipVersion, CkSel, Mode, PllStatus, Rxfe1, Status, StatusFlags, Txfe1};
use crate::bus::DeviceGuard;
use crate::{Error, GpioController, Result, Transport};

/// Controller description for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerInfo {
    /// True while the controller accepts operations
    pub initialized: bool,
    /// Reference clock in Hz
    pub clock_freq: u32,
    /// SPI transport description
    pub spi: String,
    /// GPIO description
    pub gpio: String,
}

/// State read by [`Sx1255::snapshot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceSnapshot {
    /// Silicon revision
    pub version: ChipVersion,
    /// Status flags
    pub status: StatusFlags,
    /// Raw MODE register
    pub mode: u8,
    /// RX synthesizer frequency in Hz
    pub rx_frequency: u32,
    /// TX synthesizer frequency in Hz
    pub tx_frequency: u32,
}

/// High-level SX1255 controller.
///
/// Ready as soon as it is built from an open transport and GPIO controller.
/// After [`close`](Sx1255::close) every operation fails with
/// [`Error::NotInitialized`].
///
/// A controller built with [`holding`](Sx1255::holding) keeps its device
/// claimed until it is closed or dropped.
pub struct Sx1255<SPI, P, D> {
    transport: Transport<SPI, D>,
    gpio: GpioController<P, D>,
    clock_hz: u32,
    ready: bool,
    claim: Option<DeviceGuard>,
}

impl<SPI, P, D> Sx1255<SPI, P, D> {
    /// Reference clock used for frequency conversion, in Hz
    pub fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    /// Returns true while the controller accepts operations.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.ready {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }
}

impl<SPI, P, D> Sx1255<SPI, P, D>
where
    SPI: SpiDevice,
    P: OutputPin + StatefulOutputPin,
    D: DelayNs,
{
    /// Combines an open transport and GPIO controller.
    ///
    /// A `clock_hz` of 0 selects the default 32 MHz reference. The controller
    /// is ready only if both parts are open.
    pub fn new(transport: Transport<SPI, D>, gpio: GpioController<P, D>, clock_hz: u32) -> Self {
        let clock_hz = if clock_hz == 0 { DEFAULT_FXOSC_HZ } else { clock_hz };
        let ready = transport.is_open() && gpio.is_open();

        Self {
            transport,
            gpio,
            clock_hz,
            ready,
            claim: None,
        }
    }

    /// Keeps `claim` until the controller is closed.
    pub fn holding(mut self, claim: DeviceGuard) -> Self {
        self.claim = Some(claim);
        self
    }

    /// Releases the SPI device and GPIO lines.
    ///
    /// Both releases are attempted even if the first fails; failures are
    /// returned together as [`Error::CompositeClose`]. The controller is not
    /// ready afterwards. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.transport.close() {
            errors.push(e);
        }
        if let Err(e) = self.gpio.close() {
            errors.push(e);
        }

        if self.ready {
            debug!("controller closed");
        }
        self.ready = false;
        self.claim = None;
        Error::from_close_errors(errors)
    }

    /// Diagnostic description of the controller
    pub fn info(&self) -> ControllerInfo {
        ControllerInfo {
            initialized: self.ready,
            clock_freq: self.clock_hz,
            spi: self.transport.info(),
            gpio: self.gpio.info(),
        }
    }

    fn read<R>(&mut self) -> Result<R>
    where
        R: ReadableRegister<IdType = u8, Array = [u8; 1]>,
    {
        self.ensure_ready()?;
        self.transport.read()
    }

    /// Read-modify-write of a typed register.
    fn modify<R>(&mut self, f: impl FnOnce(R) -> R) -> Result<()>
    where
        R: ReadableRegister<IdType = u8, Array = [u8; 1]>
            + WritableRegister<IdType = u8, Array = [u8; 1]>,
    {
        self.ensure_ready()?;
        let current = self.transport.read::<R>()?;
        self.transport.write(f(current))
    }

    /// Hardware reset through the reset line; blocks until the chip is ready.
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_ready()?;
        self.gpio.reset()
    }

    /// Verifies SPI communication by reading the VERSION register.
    ///
    /// Never writes to the chip.
    pub fn initialize(&mut self) -> Result<()> {
        self.ensure_ready()?;
        let version = self.transport.check_device()?;
        debug!("SX1255 answered with version 0x{:02X}", version);
        Ok(())
    }

    /// Verifies communication, then writes the default configuration.
    ///
    /// Stops at the first failed write; registers already written keep their
    /// new values.
    pub fn initialize_with_defaults(&mut self) -> Result<()> {
        self.initialize()?;

        for &(address, value) in DEFAULT_CONFIGURATION.iter() {
            self.transport.write_register(address, value)?;
        }

        info!("applied {} default register values", DEFAULT_CONFIGURATION.len());
        Ok(())
    }

    /// Silicon revision
    pub fn version(&mut self) -> Result<ChipVersion> {
        self.read()
    }

    /// Silicon revision as text, e.g. `V1A`
    pub fn version_string(&mut self) -> Result<String> {
        Ok(self.version()?.to_string())
    }

    /// Reads one register.
    pub fn read_register(&mut self, address: u8) -> Result<u8> {
        self.ensure_ready()?;
        self.transport.read_register(address)
    }

    /// Writes one register.
    pub fn write_register(&mut self, address: u8, value: u8) -> Result<()> {
        self.ensure_ready()?;
        self.transport.write_register(address, value)
    }

    /// Reads every register, one frame per register. Index is the address.
    pub fn read_all_registers(&mut self) -> Result<[u8; REGISTER_COUNT]> {
        self.ensure_ready()?;

        let mut values = [0u8; REGISTER_COUNT];
        for (address, value) in (0..=map::LAST_ADDRESS).zip(values.iter_mut()) {
            *value = self.transport.read_register(address)?;
        }
        Ok(values)
    }

    /// Writes consecutive registers in one frame.
    pub fn burst_write(&mut self, start: u8, values: &[u8]) -> Result<()> {
        self.ensure_ready()?;
        self.transport.burst_write(start, values)
    }

    /// Reads consecutive registers in one frame.
    pub fn burst_read(&mut self, start: u8, count: usize) -> Result<Vec<u8>> {
        self.ensure_ready()?;
        self.transport.burst_read(start, count)
    }

    /// Writes the MODE register. Any bit union is accepted.
    pub fn set_mode(&mut self, mode: impl Into<Mode>) -> Result<()> {
        self.ensure_ready()?;
        self.transport.write(mode.into())
    }

    /// Reads the MODE register.
    pub fn mode(&mut self) -> Result<Mode> {
        self.read()
    }

    /// Sets or clears one MODE bit, keeping the others.
    fn set_mode_bit(&mut self, bit: Mode, enable: bool) -> Result<()> {
        self.modify(|mut mode: Mode| {
            mode.set(bit, enable);
            mode
        })
    }

    /// Enables or disables the RX path.
    pub fn enable_rx(&mut self, enable: bool) -> Result<()> {
        self.set_mode_bit(Mode::RX, enable)
    }

    /// Enables or disables the TX path, PA driver excluded.
    pub fn enable_tx(&mut self, enable: bool) -> Result<()> {
        self.set_mode_bit(Mode::TX, enable)
    }

    /// Enables or disables the PA driver.
    pub fn enable_pa(&mut self, enable: bool) -> Result<()> {
        self.set_mode_bit(Mode::DRIVER, enable)
    }

    /// Tunes a synthesizer.
    ///
    /// The frequency is validated before anything is sent; an out of range
    /// request writes no register.
    pub fn set_frequency(&mut self, synthesizer: Synthesizer, freq_hz: u32) -> Result<()> {
        self.ensure_ready()?;
        let frf = Frf::from_hz(freq_hz, self.clock_hz)?;

        for (address, value) in synthesizer.addresses().into_iter().zip(frf.to_bytes()) {
            self.transport.write_register(address, value)?;
        }

        debug!("{:?} synthesizer tuned to {} Hz (Frf 0x{:06X})", synthesizer, freq_hz, frf.raw());
        Ok(())
    }

    /// Reads back a synthesizer frequency in Hz.
    pub fn frequency(&mut self, synthesizer: Synthesizer) -> Result<u32> {
        self.ensure_ready()?;

        let mut bytes = [0u8; 3];
        for (address, byte) in synthesizer.addresses().into_iter().zip(bytes.iter_mut()) {
            *byte = self.transport.read_register(address)?;
        }

        Ok(Frf::from_bytes(bytes).to_hz(self.clock_hz))
    }

    /// Tunes the RX synthesizer.
    pub fn set_rx_frequency(&mut self, freq_hz: u32) -> Result<()> {
        self.set_frequency(Synthesizer::Rx, freq_hz)
    }

    /// RX synthesizer frequency in Hz
    pub fn rx_frequency(&mut self) -> Result<u32> {
        self.frequency(Synthesizer::Rx)
    }

    /// Tunes the TX synthesizer.
    pub fn set_tx_frequency(&mut self, freq_hz: u32) -> Result<()> {
        self.set_frequency(Synthesizer::Tx, freq_hz)
    }

    /// TX synthesizer frequency in Hz
    pub fn tx_frequency(&mut self) -> Result<u32> {
        self.frequency(Synthesizer::Tx)
    }

    /// Writes the clock and loopback selection register.
    pub fn set_clock_select(&mut self, ck_sel: CkSel) -> Result<()> {
        self.ensure_ready()?;
        self.transport.write(ck_sel)
    }

    /// Reads the clock and loopback selection register.
    pub fn clock_select(&mut self) -> Result<CkSel> {
        self.read()
    }

    /// Status flags
    pub fn status(&mut self) -> Result<StatusFlags> {
        self.read::<Status>().map(StatusFlags::from)
    }

    /// PLL lock state of both synthesizers
    pub fn pll_status(&mut self) -> Result<PllStatus> {
        self.read::<Status>().map(PllStatus::from)
    }

    /// Sets the LNA gain, see [`LnaGain::from_db`].
    pub fn set_lna_gain(&mut self, gain_db: u8) -> Result<()> {
        let gain = LnaGain::from_db(gain_db);
        self.modify(|reg: Rxfe1| reg.with_lna(gain))
    }

    /// Sets the PGA gain, 0 to 30 dB in 2 dB steps.
    pub fn set_pga_gain(&mut self, gain_db: u8) -> Result<()> {
        let gain = PgaGain::from_db(gain_db);
        self.modify(|reg: Rxfe1| reg.with_pga(gain))
    }

    /// Sets the DAC gain: 0, -3, -6 or -9 dB; anything else selects -3 dB.
    pub fn set_dac_gain(&mut self, gain_db: i8) -> Result<()> {
        let gain = DacGain::from_db(gain_db);
        self.modify(|reg: Txfe1| reg.with_dac(gain))
    }

    /// Sets the mixer gain, clamped to -37.5 to -7.5 dB.
    pub fn set_mixer_gain(&mut self, gain_db: f32) -> Result<()> {
        let gain = MixerGain::from_db(gain_db)?;
        self.modify(|reg: Txfe1| reg.with_mixer(gain))
    }

    /// Reads back all four gain settings.
    pub fn gains(&mut self) -> Result<GainSettings> {
        let rx = self.read::<Rxfe1>()?;
        let tx = self.read::<Txfe1>()?;

        Ok(GainSettings {
            lna: rx.lna(),
            pga: rx.pga(),
            dac: tx.dac(),
            mixer: tx.mixer(),
        })
    }

    /// Drives the external antenna switch: true selects transmit.
    ///
    /// Independent of the MODE TX/RX enable bits.
    pub fn set_tx_rx_switch(&mut self, tx: bool) -> Result<()> {
        self.ensure_ready()?;
        self.gpio.set_tx_rx_pin(tx)
    }

    /// Antenna switch position: true means transmit.
    pub fn tx_rx_switch(&mut self) -> Result<bool> {
        self.ensure_ready()?;
        self.gpio.tx_rx_pin()
    }

    /// Reads version, status, mode and both frequencies.
    pub fn snapshot(&mut self) -> Result<DeviceSnapshot> {
        Ok(DeviceSnapshot {
            version: self.version()?,
            status: self.status()?,
            mode: self.mode()?.bits(),
            rx_frequency: self.rx_frequency()?,
            tx_frequency: self.tx_frequency()?,
        })
    }
}
