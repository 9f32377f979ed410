//! Operating mode register
//!
//! RegMode (0x00) holds four independent enable bits. Any combination may be
//! written; the chip, not this driver, decides which combinations are useful.
//! Six combinations have names and are listed in [`OperatingMode`].

use bitflags::bitflags;
use core::convert::Infallible;

use regiface::{FromByteArray, ReadableRegister, Register, ToByteArray, WritableRegister};

use super::map;

bitflags! {
    /// Contents of RegMode (address: 0x00)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Mode: u8 {
        /// Enable the PA driver
        const DRIVER = 1 << 3;
        /// Enable the TX path, except the PA driver
        const TX = 1 << 2;
        /// Enable the RX path
        const RX = 1 << 1;
        /// Enable the PDS and crystal oscillator
        const REF = 1 << 0;
    }
}

impl Mode {
    /// Returns the named operating mode these bits correspond to, if any.
    pub fn operating_mode(self) -> Option<OperatingMode> {
        OperatingMode::ALL
            .into_iter()
            .find(|mode| mode.bits() == self)
    }
}

/// Named RegMode bit unions
///
/// These are the combinations the datasheet describes. Other bit unions are
/// legal to write but have no name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingMode {
    /// Everything off
    Sleep,
    /// Crystal oscillator running
    Standby,
    /// Receive path enabled
    Rx,
    /// Transmit path enabled without the PA driver
    Tx,
    /// Transmit path enabled with the PA driver
    TxFull,
    /// Receive and transmit paths with the PA driver
    FullDuplex,
}

impl OperatingMode {
    /// Every named mode
    pub const ALL: [OperatingMode; 6] = [
        OperatingMode::Sleep,
        OperatingMode::Standby,
        OperatingMode::Rx,
        OperatingMode::Tx,
        OperatingMode::TxFull,
        OperatingMode::FullDuplex,
    ];

    /// The RegMode bits for this mode
    pub const fn bits(self) -> Mode {
        match self {
            Self::Sleep => Mode::empty(),
            Self::Standby => Mode::REF,
            Self::Rx => Mode::REF.union(Mode::RX),
            Self::Tx => Mode::REF.union(Mode::TX),
            Self::TxFull => Mode::REF.union(Mode::TX).union(Mode::DRIVER),
            Self::FullDuplex => Mode::REF
                .union(Mode::RX)
                .union(Mode::TX)
                .union(Mode::DRIVER),
        }
    }
}

impl From<OperatingMode> for Mode {
    fn from(mode: OperatingMode) -> Self {
        mode.bits()
    }
}

impl Register for Mode {
    type IdType = u8;

    fn id() -> Self::IdType {
        map::MODE
    }
}

impl ReadableRegister for Mode {}
impl WritableRegister for Mode {}

impl FromByteArray for Mode {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self::from_bits_retain(bytes[0]))
    }
}

impl ToByteArray for Mode {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.bits()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_mode_bits() {
        assert_eq!(OperatingMode::Sleep.bits().bits(), 0x00);
        assert_eq!(OperatingMode::Standby.bits().bits(), 0x01);
        assert_eq!(OperatingMode::Rx.bits().bits(), 0x03);
        assert_eq!(OperatingMode::Tx.bits().bits(), 0x05);
        assert_eq!(OperatingMode::TxFull.bits().bits(), 0x0D);
        assert_eq!(OperatingMode::FullDuplex.bits().bits(), 0x0F);
    }

    #[test]
    fn unnamed_unions_have_no_name() {
        assert_eq!(Mode::from_bits_retain(0x03).operating_mode(), Some(OperatingMode::Rx));
        assert_eq!(Mode::RX.operating_mode(), None);
        assert_eq!((Mode::TX | Mode::DRIVER).operating_mode(), None);
    }

    #[test]
    fn unknown_bits_survive_decoding() {
        let mode = Mode::from_bytes([0x81]).unwrap();
        assert_eq!(mode.to_bytes().unwrap(), [0x81]);
    }
}
