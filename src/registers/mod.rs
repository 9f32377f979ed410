//! Register definitions for the SX1255
//! Generated from the SX1255 datasheet, rev. 1.1

pub mod map;
mod frontend;
mod mode;
mod system;

pub use frontend::*;
pub use map::{register_info, Access, RegisterInfo, REGISTER_MAP};
pub use mode::*;
pub use system::*;
