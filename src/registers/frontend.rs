//! RX and TX front-end gain registers
//!
//! RXFE1 carries the LNA and PGA gains, TXFE1 carries the DAC and mixer gains.
//! Both are modified read-modify-write, so the types keep every bit they were
//! decoded from and only replace the field being set.

use core::convert::Infallible;

use regiface::{register, FromByteArray, ReadableRegister, ToByteArray, WritableRegister};

use crate::gain::{DacGain, LnaGain, MixerGain, PgaGain};

/// RX front-end register 1 (address: 0x0C)
///
/// | bits | field                      |
/// |------|----------------------------|
/// | 7:5  | LNA gain                   |
/// | 4:1  | PGA gain, 2 dB steps       |
/// | 0    | LNA input impedance        |
#[register(0x0Cu8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rxfe1(pub u8);

impl Rxfe1 {
    const LNA_SHIFT: u8 = 5;
    const LNA_MASK: u8 = 0b1110_0000;
    const PGA_SHIFT: u8 = 1;
    const PGA_MASK: u8 = 0b0001_1110;

    /// Replaces the LNA field, keeping bits 4:0.
    pub fn with_lna(self, gain: LnaGain) -> Self {
        Self((self.0 & !Self::LNA_MASK) | (gain.code() << Self::LNA_SHIFT))
    }

    /// Replaces the PGA field, keeping bits 7:5 and 0.
    pub fn with_pga(self, gain: PgaGain) -> Self {
        Self((self.0 & !Self::PGA_MASK) | ((gain.field() << Self::PGA_SHIFT) & Self::PGA_MASK))
    }

    /// Raw LNA code
    pub fn lna_code(self) -> u8 {
        (self.0 & Self::LNA_MASK) >> Self::LNA_SHIFT
    }

    /// LNA setting, `None` for a reserved code
    pub fn lna(self) -> Option<LnaGain> {
        LnaGain::from_code(self.lna_code())
    }

    /// PGA setting
    pub fn pga(self) -> PgaGain {
        PgaGain::from_field((self.0 & Self::PGA_MASK) >> Self::PGA_SHIFT)
    }
}

/// TX front-end register 1 (address: 0x08)
///
/// | bits | field                      |
/// |------|----------------------------|
/// | 7    | unused                     |
/// | 6:4  | DAC gain                   |
/// | 3:0  | mixer gain, 2 dB steps     |
#[register(0x08u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Txfe1(pub u8);

impl Txfe1 {
    const DAC_SHIFT: u8 = 4;
    const DAC_MASK: u8 = 0b0111_0000;
    const MIXER_MASK: u8 = 0b0000_1111;

    /// Replaces the DAC field, keeping bit 7 and the mixer field.
    pub fn with_dac(self, gain: DacGain) -> Self {
        Self((self.0 & !Self::DAC_MASK) | (gain.code() << Self::DAC_SHIFT))
    }

    /// Replaces the mixer field, keeping bits 7:4.
    pub fn with_mixer(self, gain: MixerGain) -> Self {
        Self((self.0 & !Self::MIXER_MASK) | (gain.field() & Self::MIXER_MASK))
    }

    /// DAC setting, `None` for an unused code
    pub fn dac(self) -> Option<DacGain> {
        DacGain::from_code((self.0 & Self::DAC_MASK) >> Self::DAC_SHIFT)
    }

    /// Mixer setting
    pub fn mixer(self) -> MixerGain {
        MixerGain::from_field(self.0 & Self::MIXER_MASK)
    }
}

impl FromByteArray for Rxfe1 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self(bytes[0]))
    }
}

impl ToByteArray for Rxfe1 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.0])
    }
}

impl FromByteArray for Txfe1 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self(bytes[0]))
    }
}

impl ToByteArray for Txfe1 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lna_keeps_low_bits() {
        let reg = Rxfe1(0b0001_1111).with_lna(LnaGain::from_db(46));
        assert_eq!(reg.0, 0b0011_1111);
        assert_eq!(reg.lna(), Some(LnaGain::Max));

        let reg = Rxfe1(0xFF).with_lna(LnaGain::from_db(5));
        assert_eq!(reg.0 & 0x1F, 0x1F);
        assert_eq!(reg.lna_code(), 6);
    }

    #[test]
    fn pga_keeps_other_bits() {
        let reg = Rxfe1(0xE1).with_pga(PgaGain::from_db(31));
        assert_eq!(reg.0, 0xFF);
        let reg = Rxfe1(0xFF).with_pga(PgaGain::from_db(0));
        assert_eq!(reg.0, 0xE1);
        assert_eq!(reg.pga().field(), 0);
    }

    #[test]
    fn default_rxfe1_decodes() {
        let reg = Rxfe1(0x2F);
        assert_eq!(reg.lna(), Some(LnaGain::Max));
        assert_eq!(reg.pga().db(), 14);
    }

    #[test]
    fn txfe1_fields_are_independent() {
        let reg = Txfe1(0x2E);
        assert_eq!(reg.dac(), Some(DacGain::Minus3));
        assert_eq!(reg.mixer().field(), 0x0E);

        let reg = reg.with_dac(DacGain::Max);
        assert_eq!(reg.0, 0x3E);
        let reg = reg.with_mixer(MixerGain::from_db(-37.5).unwrap());
        assert_eq!(reg.0, 0x30);
    }

    #[test]
    fn txfe1_keeps_bit_seven() {
        let reg = Txfe1(0x80).with_dac(DacGain::Minus9).with_mixer(MixerGain::from_field(0x0F));
        assert_eq!(reg.0, 0x8F);
    }
}
