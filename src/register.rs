//! This module describes the register layout of the WANPTEK status block.

use modular_bitfield::prelude::*;
use strum_macros::EnumIter;

/// First register of the status block.
pub const STATUS_REGISTER_START: u16 = 0x0000;
/// Number of 16 bit registers in the status block.
pub const STATUS_REGISTER_COUNT: u16 = 0x0008;
/// Full length of a status read response, including address, function, byte count and CRC.
pub const STATUS_RESPONSE_LEN: usize = 21;
/// Where the 16 byte status payload sits inside a status read response.
pub const STATUS_PAYLOAD: core::ops::Range<usize> = 3..19;

/// Byte offsets within the 16 byte status payload.
///
/// Word fields are in the session byte order and scaled by `10^decimals`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
#[repr(usize)]
pub enum StatusOffset {
    /// Status flags byte. See [`StatusFlags`].
    Flags = 0,
    /// Voltage range configuration. See [`RangeConfig`].
    VoltageConfig = 1,
    /// Current range configuration. See [`RangeConfig`].
    CurrentConfig = 2,
    /// Measured output voltage.
    RealVoltage = 4,
    /// Measured output current.
    RealCurrent = 6,
    /// Voltage setting.
    SetVoltage = 8,
    /// Current setting.
    SetCurrent = 10,
    /// Highest voltage the unit accepts.
    MaxVoltage = 12,
    /// Highest current the unit accepts.
    MaxCurrent = 14,
}

impl From<StatusOffset> for usize {
    fn from(value: StatusOffset) -> Self {
        value as usize
    }
}

/// Flags byte at the start of the status payload.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFlags {
    pub power_on: bool,
    pub ocp_enabled: bool,
    pub keyboard_locked: bool,
    /// Set when the unit sends its data words big-endian.
    pub big_endian: bool,
    pub constant_current: bool,
    pub alarm_active: bool,
    #[skip]
    __: B2,
}

impl From<u8> for StatusFlags {
    fn from(value: u8) -> Self {
        Self::from_bytes([value])
    }
}

/// Control byte sent with every settings write.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlFlags {
    pub power: bool,
    pub ocp: bool,
    pub keyboard_lock: bool,
    #[skip]
    __: B5,
}

impl From<ControlFlags> for u8 {
    fn from(value: ControlFlags) -> Self {
        value.into_bytes()[0]
    }
}

/// Voltage/current configuration byte: range series in the low nibble, a one-decimal flag in
/// the high nibble.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeConfig {
    pub series: B4,
    pub decimals_flag: B4,
}

impl RangeConfig {
    /// Number of decimal places used by the matching register words.
    pub fn decimals(&self) -> u8 {
        if self.decimals_flag() != 0 { 1 } else { 2 }
    }
}

impl From<u8> for RangeConfig {
    fn from(value: u8) -> Self {
        Self::from_bytes([value])
    }
}

/// Voltage range series codes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
#[repr(u8)]
pub enum VoltageRange {
    V15 = 0,
    V30 = 1,
    V60 = 2,
    V100 = 3,
    V120 = 4,
    V150 = 5,
    V160 = 6,
    V200 = 7,
    V300 = 8,
}

impl VoltageRange {
    const MAX_VALUE: u8 = Self::V300 as u8;

    /// Nominal full-scale voltage in volts.
    pub fn nominal(self) -> u16 {
        match self {
            Self::V15 => 15,
            Self::V30 => 30,
            Self::V60 => 60,
            Self::V100 => 100,
            Self::V120 => 120,
            Self::V150 => 150,
            Self::V160 => 160,
            Self::V200 => 200,
            Self::V300 => 300,
        }
    }
}

impl TryFrom<u8> for VoltageRange {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use VoltageRange as VR;
        if value > Self::MAX_VALUE {
            return Err(value);
        }
        match value {
            0 => Ok(VR::V15),
            1 => Ok(VR::V30),
            2 => Ok(VR::V60),
            3 => Ok(VR::V100),
            4 => Ok(VR::V120),
            5 => Ok(VR::V150),
            6 => Ok(VR::V160),
            7 => Ok(VR::V200),
            8 => Ok(VR::V300),
            other => Err(other),
        }
    }
}

/// Current range series codes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
#[repr(u8)]
pub enum CurrentRange {
    A1 = 0,
    A2 = 1,
    A3 = 2,
    A5 = 3,
    A6 = 4,
    A10 = 5,
    A20 = 6,
    A30 = 7,
    A40 = 8,
    A50 = 9,
    A60 = 10,
    A80 = 11,
    A100 = 12,
    A200 = 13,
}

impl CurrentRange {
    const MAX_VALUE: u8 = Self::A200 as u8;

    /// Nominal full-scale current in amps.
    pub fn nominal(self) -> u16 {
        match self {
            Self::A1 => 1,
            Self::A2 => 2,
            Self::A3 => 3,
            Self::A5 => 5,
            Self::A6 => 6,
            Self::A10 => 10,
            Self::A20 => 20,
            Self::A30 => 30,
            Self::A40 => 40,
            Self::A50 => 50,
            Self::A60 => 60,
            Self::A80 => 80,
            Self::A100 => 100,
            Self::A200 => 200,
        }
    }
}

impl TryFrom<u8> for CurrentRange {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use CurrentRange as CR;
        if value > Self::MAX_VALUE {
            return Err(value);
        }
        match value {
            0 => Ok(CR::A1),
            1 => Ok(CR::A2),
            2 => Ok(CR::A3),
            3 => Ok(CR::A5),
            4 => Ok(CR::A6),
            5 => Ok(CR::A10),
            6 => Ok(CR::A20),
            7 => Ok(CR::A30),
            8 => Ok(CR::A40),
            9 => Ok(CR::A50),
            10 => Ok(CR::A60),
            11 => Ok(CR::A80),
            12 => Ok(CR::A100),
            13 => Ok(CR::A200),
            other => Err(other),
        }
    }
}
