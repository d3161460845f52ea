//! Per-unit scaling, ranges and byte order, derived from the first status frame.

use crate::error::{Error, Result};
use crate::frame::{self, Endianness};
use crate::register::{
    CurrentRange, RangeConfig, STATUS_PAYLOAD, STATUS_RESPONSE_LEN, StatusFlags, StatusOffset,
    VoltageRange,
};

/// What we learned about a connected unit. Built once by detection and never changed.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProfile {
    pub voltage_decimals: u8,
    pub current_decimals: u8,
    pub voltage_series: u8,
    pub current_series: u8,
    pub max_voltage: f64,
    pub max_current: f64,
    /// Nominal full-scale voltage from the range table, `0` for an unknown series.
    pub nominal_voltage: u16,
    /// Nominal full-scale current from the range table, `0` for an unknown series.
    pub nominal_current: u16,
    pub endianness: Endianness,
    pub slave_address: u8,
}

impl DeviceProfile {
    /// Derive a profile from a raw status read response (address, function, byte count,
    /// 16 payload bytes, CRC).
    pub fn from_status_response(response: &[u8], slave_address: u8) -> Result<Self> {
        let data = status_payload(response)?;
        Ok(Self::from_status_payload(data, slave_address))
    }

    /// Derive a profile from the 16 byte status payload.
    pub fn from_status_payload(data: &[u8; 16], slave_address: u8) -> Self {
        let flags = StatusFlags::from(data[usize::from(StatusOffset::Flags)]);
        let voltage_config = RangeConfig::from(data[usize::from(StatusOffset::VoltageConfig)]);
        let current_config = RangeConfig::from(data[usize::from(StatusOffset::CurrentConfig)]);
        let endianness = Endianness::from(flags.big_endian());

        let voltage_decimals = voltage_config.decimals();
        let current_decimals = current_config.decimals();
        let max_voltage_raw = word(data, StatusOffset::MaxVoltage, endianness);
        let max_current_raw = word(data, StatusOffset::MaxCurrent, endianness);

        Self {
            voltage_decimals,
            current_decimals,
            voltage_series: voltage_config.series(),
            current_series: current_config.series(),
            max_voltage: max_voltage_raw as f64 / scale(voltage_decimals),
            max_current: max_current_raw as f64 / scale(current_decimals),
            nominal_voltage: VoltageRange::try_from(voltage_config.series())
                .map(VoltageRange::nominal)
                .unwrap_or(0),
            nominal_current: CurrentRange::try_from(current_config.series())
                .map(CurrentRange::nominal)
                .unwrap_or(0),
            endianness,
            slave_address,
        }
    }

    pub fn little_endian(&self) -> bool {
        self.endianness.is_little()
    }

    /// Multiplier between volts and the raw voltage register value.
    pub fn voltage_scale(&self) -> f64 {
        scale(self.voltage_decimals)
    }

    /// Multiplier between amps and the raw current register value.
    pub fn current_scale(&self) -> f64 {
        scale(self.current_decimals)
    }

    /// Human readable model, e.g. `WANPTEK 30V/5A`.
    pub fn model(&self) -> String {
        format!("WANPTEK {}V/{}A", self.nominal_voltage, self.nominal_current)
    }
}

fn scale(decimals: u8) -> f64 {
    10f64.powi(decimals as i32)
}

/// Read a word field of the status payload in the session byte order.
pub(crate) fn word(data: &[u8; 16], offset: StatusOffset, endianness: Endianness) -> u16 {
    // Every offset in `StatusOffset` leaves room for a full word inside 16 bytes.
    frame::word_at(data, usize::from(offset), endianness).unwrap_or(0)
}

/// Slice the 16 byte status payload out of a raw status read response.
pub(crate) fn status_payload(response: &[u8]) -> Result<&[u8; 16]> {
    response
        .get(STATUS_PAYLOAD)
        .and_then(|data| data.try_into().ok())
        .ok_or(Error::MalformedResponse {
            expected: STATUS_RESPONSE_LEN,
            actual: response.len(),
        })
}
