//! Clock, status and version registers
//!
//! - CK_SEL (0x10): clock output and loopback control
//! - STAT (0x11): oscillator and PLL lock status, read-only
//! - VERSION (0x07): silicon revision, read-only

use bitflags::bitflags;
use core::convert::Infallible;
use core::fmt;

use regiface::{FromByteArray, ReadableRegister, Register, ToByteArray, WritableRegister};
use serde::Serialize;

use super::map;

bitflags! {
    /// Contents of RegCkSel (address: 0x10)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CkSel: u8 {
        /// Enable digital loopback
        const DIG_LOOPBACK = 1 << 3;
        /// Enable RF loopback
        const RF_LOOPBACK = 1 << 2;
        /// Enable CLK_OUT
        const CKOUT_ENABLE = 1 << 1;
        /// Clock the TX DAC from the external clock
        const TX_DAC_EXT_CLK = 1 << 0;
    }
}

bitflags! {
    /// Contents of RegStat (address: 0x11)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u8 {
        /// End of life, battery low
        const EOL = 1 << 3;
        /// Crystal oscillator running and stable
        const XOSC_READY = 1 << 2;
        /// RX PLL locked
        const PLL_LOCK_RX = 1 << 1;
        /// TX PLL locked
        const PLL_LOCK_TX = 1 << 0;
    }
}

/// Status bits decoded into independent flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusFlags {
    /// End of life, battery low
    pub eol: bool,
    /// Crystal oscillator ready
    pub xosc_ready: bool,
    /// RX PLL locked
    pub pll_lock_rx: bool,
    /// TX PLL locked
    pub pll_lock_tx: bool,
}

impl From<Status> for StatusFlags {
    fn from(status: Status) -> Self {
        Self {
            eol: status.contains(Status::EOL),
            xosc_ready: status.contains(Status::XOSC_READY),
            pll_lock_rx: status.contains(Status::PLL_LOCK_RX),
            pll_lock_tx: status.contains(Status::PLL_LOCK_TX),
        }
    }
}

/// PLL lock state for both synthesizers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PllStatus {
    /// RX PLL locked
    pub rx_locked: bool,
    /// TX PLL locked
    pub tx_locked: bool,
}

impl From<Status> for PllStatus {
    fn from(status: Status) -> Self {
        Self {
            rx_locked: status.contains(Status::PLL_LOCK_RX),
            tx_locked: status.contains(Status::PLL_LOCK_TX),
        }
    }
}

/// Silicon revision read from RegVersion (address: 0x07)
///
/// The high nibble is the major version. The low nibble indexes a letter
/// suffix: 0 has none, 1 is `A`, 2 is `B` and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChipVersion {
    /// Major version
    pub major: u8,
    /// Minor revision index
    pub minor: u8,
}

impl ChipVersion {
    /// Splits a raw VERSION byte.
    pub fn from_raw(raw: u8) -> Self {
        Self {
            major: raw >> 4,
            minor: raw & 0x0F,
        }
    }

    /// The raw VERSION byte
    pub fn raw(self) -> u8 {
        (self.major << 4) | (self.minor & 0x0F)
    }

    /// Letter suffix for the minor revision, `None` for revision 0
    pub fn suffix(self) -> Option<char> {
        match self.minor {
            0 => None,
            minor => Some(char::from(b'A' + minor - 1)),
        }
    }
}

impl fmt::Display for ChipVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.major)?;
        if let Some(suffix) = self.suffix() {
            write!(f, "{suffix}")?;
        }
        Ok(())
    }
}

impl Register for CkSel {
    type IdType = u8;

    fn id() -> Self::IdType {
        map::CK_SEL
    }
}

impl ReadableRegister for CkSel {}
impl WritableRegister for CkSel {}

impl FromByteArray for CkSel {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self::from_bits_retain(bytes[0]))
    }
}

impl ToByteArray for CkSel {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.bits()])
    }
}

impl Register for Status {
    type IdType = u8;

    fn id() -> Self::IdType {
        map::STAT
    }
}

impl ReadableRegister for Status {}

impl FromByteArray for Status {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self::from_bits_truncate(bytes[0]))
    }
}

impl Register for ChipVersion {
    type IdType = u8;

    fn id() -> Self::IdType {
        map::VERSION
    }
}

impl ReadableRegister for ChipVersion {}

impl FromByteArray for ChipVersion {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self::from_raw(bytes[0]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_strings() {
        assert_eq!(ChipVersion::from_raw(0x10).to_string(), "V1");
        assert_eq!(ChipVersion::from_raw(0x11).to_string(), "V1A");
        assert_eq!(ChipVersion::from_raw(0x12).to_string(), "V1B");
        assert_eq!(ChipVersion::from_raw(0x23).to_string(), "V2C");
        assert_eq!(ChipVersion::from_raw(0x11).raw(), 0x11);
    }

    #[test]
    fn status_flags_are_independent() {
        let flags = StatusFlags::from(Status::from_bytes([0b0000_0101]).unwrap());
        assert_eq!(
            flags,
            StatusFlags {
                eol: false,
                xosc_ready: true,
                pll_lock_rx: false,
                pll_lock_tx: true,
            }
        );

        let flags = StatusFlags::from(Status::from_bytes([0xFA]).unwrap());
        assert!(flags.eol);
        assert!(!flags.xosc_ready);
        assert!(flags.pll_lock_rx);
        assert!(!flags.pll_lock_tx);
    }

    #[test]
    fn pll_status() {
        let pll = PllStatus::from(Status::PLL_LOCK_RX);
        assert!(pll.rx_locked);
        assert!(!pll.tx_locked);
    }
}
