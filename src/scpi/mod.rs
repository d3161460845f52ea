//! A small subset of SCPI, as spoken by Rigol DP800 series supplies, mapped onto a WANPTEK
//! unit.
//!
//! Keywords may be abbreviated (`MEAS:VOLT?`) or spelled out (`MEASURE:VOLTAGE?`), in any
//! case. Several commands can share a line when separated by `;`.

mod command;
mod normalize;
mod processor;

pub use command::Command;
pub use normalize::normalize;
pub use processor::ScpiProcessor;
