//! Gain conversions
//!
//! Converts gains in dB into the codes stored in the RX and TX front-end
//! registers. Each conversion is a plain table or linear mapping; packing the
//! codes into register bits is done by [`Rxfe1`](crate::registers::Rxfe1) and
//! [`Txfe1`](crate::registers::Txfe1).

use serde::Serialize;

use crate::{Error, Result};

/// LNA gain setting (RXFE1 bits 7:5)
///
/// Values are relative to the maximum LNA gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum LnaGain {
    /// 0 dB, highest gain
    Max = 1,
    /// -6 dB
    Minus6 = 2,
    /// -12 dB
    Minus12 = 3,
    /// -24 dB
    Minus24 = 4,
    /// -36 dB
    Minus36 = 5,
    /// -48 dB
    Minus48 = 6,
}

/// LNA breakpoints, highest first
///
/// A requested gain selects the first entry whose threshold it exceeds.
pub const LNA_BREAKPOINTS: [(u8, LnaGain); 5] = [
    (45, LnaGain::Max),
    (39, LnaGain::Minus6),
    (30, LnaGain::Minus12),
    (18, LnaGain::Minus24),
    (6, LnaGain::Minus36),
];

/// Setting used below the lowest LNA breakpoint
pub const LNA_FLOOR: LnaGain = LnaGain::Minus48;

impl LnaGain {
    /// Picks the LNA step for a requested gain in dB.
    pub fn from_db(gain_db: u8) -> Self {
        LNA_BREAKPOINTS
            .iter()
            .find(|(threshold, _)| gain_db > *threshold)
            .map(|(_, gain)| *gain)
            .unwrap_or(LNA_FLOOR)
    }

    /// Decodes a 3-bit register code. Codes 0 and 7 are reserved.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Max),
            2 => Some(Self::Minus6),
            3 => Some(Self::Minus12),
            4 => Some(Self::Minus24),
            5 => Some(Self::Minus36),
            6 => Some(Self::Minus48),
            _ => None,
        }
    }

    /// The 3-bit register code
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Gain relative to the maximum, in dB
    pub fn relative_db(self) -> i8 {
        match self {
            Self::Max => 0,
            Self::Minus6 => -6,
            Self::Minus12 => -12,
            Self::Minus24 => -24,
            Self::Minus36 => -36,
            Self::Minus48 => -48,
        }
    }
}

/// PGA gain (RXFE1 bits 4:1), 0 to 30 dB in 2 dB steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PgaGain(u8);

impl PgaGain {
    /// Highest PGA gain in dB
    pub const MAX_DB: u8 = 30;

    /// Clamps to [`MAX_DB`](Self::MAX_DB) and rounds down to a 2 dB step.
    pub fn from_db(gain_db: u8) -> Self {
        Self(gain_db.min(Self::MAX_DB) / 2)
    }

    /// Wraps a 4-bit register field.
    pub fn from_field(field: u8) -> Self {
        Self(field & 0x0F)
    }

    /// The 4-bit register field
    pub fn field(self) -> u8 {
        self.0
    }

    /// Gain in dB
    pub fn db(self) -> u8 {
        self.0 * 2
    }
}

/// TX DAC gain (TXFE1 bits 6:4), relative to full scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DacGain {
    /// Max gain - 9 dB
    Minus9 = 0,
    /// Max gain - 6 dB
    Minus6 = 1,
    /// Max gain - 3 dB
    Minus3 = 2,
    /// Max gain (0 dBFS)
    Max = 3,
}

/// Supported DAC gains
pub const DAC_STEPS: [(i8, DacGain); 4] = [
    (0, DacGain::Max),
    (-3, DacGain::Minus3),
    (-6, DacGain::Minus6),
    (-9, DacGain::Minus9),
];

/// DAC setting used for unsupported requests
pub const DAC_FALLBACK: DacGain = DacGain::Minus3;

impl DacGain {
    /// Maps an exact supported gain to its code; anything else selects -3 dB.
    pub fn from_db(gain_db: i8) -> Self {
        DAC_STEPS
            .iter()
            .find(|(db, _)| *db == gain_db)
            .map(|(_, gain)| *gain)
            .unwrap_or(DAC_FALLBACK)
    }

    /// Decodes a 3-bit register code. Codes 4 to 7 are unused.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Minus9),
            1 => Some(Self::Minus6),
            2 => Some(Self::Minus3),
            3 => Some(Self::Max),
            _ => None,
        }
    }

    /// The 3-bit register code
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Gain relative to full scale, in dB
    pub fn db(self) -> i8 {
        match self {
            Self::Minus9 => -9,
            Self::Minus6 => -6,
            Self::Minus3 => -3,
            Self::Max => 0,
        }
    }
}

/// TX mixer gain (TXFE1 bits 3:0), -37.5 to -7.5 dB in 2 dB steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MixerGain(u8);

impl MixerGain {
    /// Lowest mixer gain in dB
    pub const MIN_DB: f32 = -37.5;
    /// Highest mixer gain in dB
    pub const MAX_DB: f32 = -7.5;

    /// Clamps to the supported range and rounds to the nearest step.
    ///
    /// NaN is rejected with [`Error::InvalidArgument`].
    pub fn from_db(gain_db: f32) -> Result<Self> {
        if gain_db.is_nan() {
            return Err(Error::InvalidArgument("mixer gain is NaN".into()));
        }
        let clamped = gain_db.clamp(Self::MIN_DB, Self::MAX_DB);
        Ok(Self(((clamped - Self::MIN_DB) / 2.0).round() as u8))
    }

    /// Wraps a 4-bit register field.
    pub fn from_field(field: u8) -> Self {
        Self(field & 0x0F)
    }

    /// The 4-bit register field
    pub fn field(self) -> u8 {
        self.0
    }

    /// Gain in dB
    pub fn db(self) -> f32 {
        Self::MIN_DB + 2.0 * f32::from(self.0)
    }
}

/// Gains decoded from RXFE1 and TXFE1
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GainSettings {
    /// LNA step, `None` for a reserved code
    pub lna: Option<LnaGain>,
    /// PGA gain
    pub pga: PgaGain,
    /// DAC gain, `None` for an unused code
    pub dac: Option<DacGain>,
    /// Mixer gain
    pub mixer: MixerGain,
}
