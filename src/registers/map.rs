//! Register address space
//!
//! The SX1255 exposes 20 single-byte registers at addresses 0x00 to 0x13.
//! This module holds the address constants, a static description table and
//! the default configuration applied by
//! [`Sx1255::initialize_with_defaults`](crate::Sx1255::initialize_with_defaults).

use serde::Serialize;

use crate::{Error, Result};

/// Operating mode control
pub const MODE: u8 = 0x00;
/// RX frequency, most significant byte
pub const FRFH_RX: u8 = 0x01;
/// RX frequency, middle byte
pub const FRFM_RX: u8 = 0x02;
/// RX frequency, least significant byte
pub const FRFL_RX: u8 = 0x03;
/// TX frequency, most significant byte
pub const FRFH_TX: u8 = 0x04;
/// TX frequency, middle byte
pub const FRFM_TX: u8 = 0x05;
/// TX frequency, least significant byte
pub const FRFL_TX: u8 = 0x06;
/// Chip version
pub const VERSION: u8 = 0x07;
/// TX front-end 1: DAC and mixer gain
pub const TXFE1: u8 = 0x08;
/// TX front-end 2: mixer tank settings
pub const TXFE2: u8 = 0x09;
/// TX front-end 3: PLL bandwidth and filter
pub const TXFE3: u8 = 0x0A;
/// TX front-end 4: DAC bandwidth
pub const TXFE4: u8 = 0x0B;
/// RX front-end 1: LNA and PGA gain
pub const RXFE1: u8 = 0x0C;
/// RX front-end 2: ADC bandwidth and trim
pub const RXFE2: u8 = 0x0D;
/// RX front-end 3: PLL bandwidth and temperature sensor
pub const RXFE3: u8 = 0x0E;
/// DIO pin mapping
pub const IO_MAP: u8 = 0x0F;
/// Clock select and loopback
pub const CK_SEL: u8 = 0x10;
/// Status
pub const STAT: u8 = 0x11;
/// I/Q interface mode
pub const IISM: u8 = 0x12;
/// Digital bridge configuration
pub const DIG_BRIDGE: u8 = 0x13;

/// Highest valid register address
pub const LAST_ADDRESS: u8 = DIG_BRIDGE;

/// Number of registers in the address space
pub const REGISTER_COUNT: usize = LAST_ADDRESS as usize + 1;

/// Register access type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// Register may be read and written
    ReadWrite,
    /// Writes are ignored by the chip
    ReadOnly,
}

/// Static description of one register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterInfo {
    /// Register address
    pub address: u8,
    /// Datasheet mnemonic
    pub name: &'static str,
    /// Human readable description
    pub description: &'static str,
    /// Access type
    pub access: Access,
    /// Value written by the default configuration, if any
    pub default: Option<u8>,
}

const fn rw(address: u8, name: &'static str, description: &'static str, default: Option<u8>) -> RegisterInfo {
    RegisterInfo {
        address,
        name,
        description,
        access: Access::ReadWrite,
        default,
    }
}

const fn ro(address: u8, name: &'static str, description: &'static str) -> RegisterInfo {
    RegisterInfo {
        address,
        name,
        description,
        access: Access::ReadOnly,
        default: None,
    }
}

/// Every register, indexed by address
pub static REGISTER_MAP: [RegisterInfo; REGISTER_COUNT] = [
    rw(MODE, "MODE", "Operating mode control", Some(0x01)),
    rw(FRFH_RX, "FRFH_RX", "RX frequency MSB", Some(0xC0)),
    rw(FRFM_RX, "FRFM_RX", "RX frequency middle", Some(0xE3)),
    rw(FRFL_RX, "FRFL_RX", "RX frequency LSB", Some(0x8E)),
    rw(FRFH_TX, "FRFH_TX", "TX frequency MSB", Some(0xC0)),
    rw(FRFM_TX, "FRFM_TX", "TX frequency middle", Some(0xE3)),
    rw(FRFL_TX, "FRFL_TX", "TX frequency LSB", Some(0x8E)),
    ro(VERSION, "VERSION", "Chip version"),
    rw(TXFE1, "TXFE1", "TX DAC and mixer gain", Some(0x2E)),
    rw(TXFE2, "TXFE2", "TX mixer tank settings", Some(0x24)),
    rw(TXFE3, "TXFE3", "TX PLL bandwidth and filter", Some(0x60)),
    rw(TXFE4, "TXFE4", "TX DAC bandwidth", Some(0x02)),
    rw(RXFE1, "RXFE1", "RX LNA and PGA gain", Some(0x2F)),
    rw(RXFE2, "RXFE2", "RX ADC bandwidth and trim", Some(0xA5)),
    rw(RXFE3, "RXFE3", "RX PLL bandwidth and temperature sensor", Some(0x06)),
    rw(IO_MAP, "IO_MAP", "DIO pin mapping", Some(0x00)),
    rw(CK_SEL, "CK_SEL", "Clock select and loopback", Some(0x02)),
    ro(STAT, "STAT", "Status register"),
    rw(IISM, "IISM", "I/Q interface mode", None),
    rw(DIG_BRIDGE, "DIG_BRIDGE", "Digital bridge configuration", Some(0x00)),
];

/// Number of entries in the default configuration
pub const DEFAULT_CONFIGURATION_LEN: usize = 17;

/// Default configuration, in write order
///
/// Standby, 434 MHz RX and TX (tuning word 0xC0E38E), DAC -3 dB with mixer
/// -9.5 dB, LNA max gain with PGA 30 dB, default PLL bandwidths, CLK_OUT enabled.
/// The tuning word lands on 434 MHz with a 36 MHz reference; with the default
/// 32 MHz reference it reads back as ~385.8 MHz.
pub static DEFAULT_CONFIGURATION: [(u8, u8); DEFAULT_CONFIGURATION_LEN] = [
    (MODE, 0x01),
    (FRFH_RX, 0xC0),
    (FRFM_RX, 0xE3),
    (FRFL_RX, 0x8E),
    (FRFH_TX, 0xC0),
    (FRFM_TX, 0xE3),
    (FRFL_TX, 0x8E),
    (TXFE1, 0x2E),
    (TXFE2, 0x24),
    (TXFE3, 0x60),
    (TXFE4, 0x02),
    (RXFE1, 0x2F),
    (RXFE2, 0xA5),
    (RXFE3, 0x06),
    (IO_MAP, 0x00),
    (CK_SEL, 0x02),
    (DIG_BRIDGE, 0x00),
];

/// Returns the static description of a register.
pub fn register_info(address: u8) -> Option<&'static RegisterInfo> {
    REGISTER_MAP.get(usize::from(address))
}

/// Checks that `address` names a register.
pub fn validate_address(address: u8) -> Result<u8> {
    if address > LAST_ADDRESS {
        return Err(Error::InvalidArgument(format!(
            "register address 0x{address:02X} out of range (0x00-0x{LAST_ADDRESS:02X})"
        )));
    }
    Ok(address)
}

/// Checks that `count` registers starting at `start` stay inside the address space.
pub fn validate_span(start: u8, count: usize) -> Result<()> {
    if count == 0 {
        return Err(Error::InvalidArgument(format!("invalid register count: {count}")));
    }
    validate_address(start)?;

    let end = usize::from(start) + count - 1;
    if end > usize::from(LAST_ADDRESS) {
        return Err(Error::InvalidArgument(format!(
            "{count} registers from 0x{start:02X} run past 0x{LAST_ADDRESS:02X}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_is_indexed_by_address() {
        for (index, info) in REGISTER_MAP.iter().enumerate() {
            assert_eq!(usize::from(info.address), index, "{}", info.name);
        }
    }

    #[test]
    fn defaults_agree_with_map() {
        for (address, value) in DEFAULT_CONFIGURATION {
            let info = register_info(address).unwrap();
            assert_eq!(info.access, Access::ReadWrite);
            assert_eq!(info.default, Some(value), "{}", info.name);
        }
        let with_default = REGISTER_MAP.iter().filter(|i| i.default.is_some()).count();
        assert_eq!(with_default, DEFAULT_CONFIGURATION_LEN);
    }

    #[test]
    fn read_only_registers_have_no_default() {
        assert_eq!(register_info(VERSION).unwrap().access, Access::ReadOnly);
        assert_eq!(register_info(STAT).unwrap().access, Access::ReadOnly);
        assert!(register_info(0x14).is_none());
    }

    #[test]
    fn address_bounds() {
        assert_eq!(validate_address(0x13).unwrap(), 0x13);
        assert!(matches!(validate_address(0x14), Err(Error::InvalidArgument(_))));
        assert!(matches!(validate_address(0xFF), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn span_bounds() {
        assert!(validate_span(0x00, REGISTER_COUNT).is_ok());
        assert!(validate_span(0x13, 1).is_ok());
        assert!(validate_span(0x13, 2).is_err());
        assert!(validate_span(0x01, 0).is_err());
    }
}
