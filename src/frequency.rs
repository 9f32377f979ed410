//! Frequency synthesis
//!
//! Each synthesizer is tuned by a 24-bit word split across three consecutive
//! registers, most significant byte first:
//!
//! ```text
//! Frf = round(freq_hz * 2^20 / FXOSC)
//! freq_hz = round(FXOSC * Frf / 2^20)
//! ```
//!
//! The conversion is done in integer arithmetic, so a set followed by a get
//! lands within `ceil(FXOSC / 2^20)` Hz of the request.

use core::ops::RangeInclusive;

use serde::Serialize;

use crate::registers::map;
use crate::{Error, Result};

/// Default reference oscillator frequency
pub const DEFAULT_FXOSC_HZ: u32 = 32_000_000;

/// Lowest tunable frequency
pub const MIN_FREQUENCY_HZ: u32 = 400_000_000;

/// Highest tunable frequency
pub const MAX_FREQUENCY_HZ: u32 = 510_000_000;

/// Tunable frequency range
pub const FREQUENCY_RANGE: RangeInclusive<u32> = MIN_FREQUENCY_HZ..=MAX_FREQUENCY_HZ;

const FRF_SHIFT: u32 = 20;
const FRF_MASK: u32 = 0x00FF_FFFF;

/// Which synthesizer a frequency applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "lowercase")]
pub enum Synthesizer {
    /// Receive PLL, registers 0x01 to 0x03
    Rx,
    /// Transmit PLL, registers 0x04 to 0x06
    Tx,
}

impl Synthesizer {
    /// Address of the most significant tuning byte
    pub fn base_address(self) -> u8 {
        match self {
            Self::Rx => map::FRFH_RX,
            Self::Tx => map::FRFH_TX,
        }
    }

    /// Addresses of the MSB, middle and LSB tuning registers
    pub fn addresses(self) -> [u8; 3] {
        let base = self.base_address();
        [base, base + 1, base + 2]
    }
}

/// Synthesizer tuning word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frf(u32);

impl Frf {
    /// Computes the tuning word for `freq_hz`.
    ///
    /// Fails with [`Error::InvalidArgument`] when the frequency is outside
    /// [`FREQUENCY_RANGE`] or the reference clock is zero.
    pub fn from_hz(freq_hz: u32, fxosc_hz: u32) -> Result<Self> {
        if !FREQUENCY_RANGE.contains(&freq_hz) {
            return Err(Error::InvalidArgument(format!(
                "frequency {freq_hz} Hz out of range (400-510 MHz)"
            )));
        }
        if fxosc_hz == 0 {
            return Err(Error::InvalidArgument("reference clock is 0 Hz".into()));
        }

        let fxosc = u64::from(fxosc_hz);
        let scaled = u64::from(freq_hz) << FRF_SHIFT;
        let frf = (scaled + fxosc / 2) / fxosc;
        if frf > u64::from(FRF_MASK) {
            return Err(Error::InvalidArgument(format!(
                "frequency {freq_hz} Hz does not fit a 24-bit tuning word at {fxosc_hz} Hz reference"
            )));
        }

        Ok(Self(frf as u32))
    }

    /// Wraps a raw tuning word, keeping the low 24 bits.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw & FRF_MASK)
    }

    /// Recombines the MSB, middle and LSB register values.
    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
    }

    /// Splits into MSB, middle and LSB register values.
    pub fn to_bytes(self) -> [u8; 3] {
        let [_, msb, mid, lsb] = self.0.to_be_bytes();
        [msb, mid, lsb]
    }

    /// The raw tuning word
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Frequency in Hz for a given reference clock.
    ///
    /// Saturates at `u32::MAX` when a large word and reference clock
    /// describe a frequency above 4.29 GHz.
    pub fn to_hz(self, fxosc_hz: u32) -> u32 {
        let product = u64::from(fxosc_hz) * u64::from(self.0);
        let half = 1u64 << (FRF_SHIFT - 1);
        u32::try_from((product + half) >> FRF_SHIFT).unwrap_or(u32::MAX)
    }
}

/// Worst-case error of a set/get round trip, in Hz
pub fn resolution_hz(fxosc_hz: u32) -> u32 {
    fxosc_hz.div_ceil(1 << FRF_SHIFT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tuning_words() {
        let frf = Frf::from_hz(434_000_000, 36_000_000).unwrap();
        assert_eq!(frf.to_bytes(), [0xC0, 0xE3, 0x8E]);

        let frf = Frf::from_hz(433_920_000, DEFAULT_FXOSC_HZ).unwrap();
        assert_eq!(frf.raw(), 14_218_691);
    }

    #[test]
    fn range_is_inclusive() {
        assert!(Frf::from_hz(MIN_FREQUENCY_HZ, DEFAULT_FXOSC_HZ).is_ok());
        assert!(Frf::from_hz(MAX_FREQUENCY_HZ, DEFAULT_FXOSC_HZ).is_ok());
        assert!(matches!(
            Frf::from_hz(399_999_999, DEFAULT_FXOSC_HZ),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            Frf::from_hz(510_000_001, DEFAULT_FXOSC_HZ),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn oversized_frequency_saturates() {
        assert_eq!(Frf::from_raw(0xFF_FFFF).to_hz(u32::MAX), u32::MAX);
        assert_eq!(Frf::from_raw(0xFF_FFFF).to_hz(300_000_000), u32::MAX);
        assert_eq!(Frf::from_raw(0xFF_FFFF).to_hz(256_000_000), 4_095_999_756);
    }

    #[test]
    fn zero_reference_is_rejected() {
        assert!(Frf::from_hz(434_000_000, 0).is_err());
    }

    #[test]
    fn bytes_are_big_endian() {
        let frf = Frf::from_bytes([0x12, 0x34, 0x56]);
        assert_eq!(frf.raw(), 0x12_3456);
        assert_eq!(frf.to_bytes(), [0x12, 0x34, 0x56]);
        assert_eq!(Frf::from_raw(0xFF12_3456).raw(), 0x12_3456);
    }

    #[test]
    fn round_trip_error_is_bounded() {
        let bound = resolution_hz(DEFAULT_FXOSC_HZ);
        assert_eq!(bound, 31);

        let step = 999_983;
        let mut freq = MIN_FREQUENCY_HZ;
        while freq <= MAX_FREQUENCY_HZ {
            let back = Frf::from_hz(freq, DEFAULT_FXOSC_HZ).unwrap().to_hz(DEFAULT_FXOSC_HZ);
            assert!(back.abs_diff(freq) <= bound, "{freq} -> {back}");
            freq += step;
        }
    }

    #[test]
    fn synthesizer_addresses() {
        assert_eq!(Synthesizer::Rx.addresses(), [0x01, 0x02, 0x03]);
        assert_eq!(Synthesizer::Tx.addresses(), [0x04, 0x05, 0x06]);
    }
}
