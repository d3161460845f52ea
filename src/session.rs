use std::time::Duration;

use crate::{
    error::{Error, Quantity, Result},
    frame::{build_read_request, build_write_request},
    link::{Endpoint, Link},
    profile::{self, DeviceProfile},
    register::{
        ControlFlags, STATUS_REGISTER_COUNT, STATUS_REGISTER_START, StatusFlags, StatusOffset,
    },
    transport::{RawResponse, Transport},
};

/// One status read, converted to engineering units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatusSnapshot {
    pub power_on: bool,
    pub ocp_enabled: bool,
    pub keyboard_locked: bool,
    pub constant_current_mode: bool,
    pub alarm_active: bool,
    pub real_voltage: f64,
    pub real_current: f64,
    pub set_voltage: f64,
    pub set_current: f64,
    /// Always `real_voltage * real_current`.
    pub real_power: f64,
    /// Always `set_voltage * set_current`.
    pub set_power: f64,
}

impl StatusSnapshot {
    /// Decode the 16 byte status payload using `profile`'s scaling and byte order.
    pub fn decode(data: &[u8; 16], profile: &DeviceProfile) -> Self {
        let flags = StatusFlags::from(data[usize::from(StatusOffset::Flags)]);
        let voltage = |offset| {
            profile::word(data, offset, profile.endianness) as f64 / profile.voltage_scale()
        };
        let current = |offset| {
            profile::word(data, offset, profile.endianness) as f64 / profile.current_scale()
        };

        let real_voltage = voltage(StatusOffset::RealVoltage);
        let real_current = current(StatusOffset::RealCurrent);
        let set_voltage = voltage(StatusOffset::SetVoltage);
        let set_current = current(StatusOffset::SetCurrent);

        Self {
            power_on: flags.power_on(),
            ocp_enabled: flags.ocp_enabled(),
            keyboard_locked: flags.keyboard_locked(),
            constant_current_mode: flags.constant_current(),
            alarm_active: flags.alarm_active(),
            real_voltage,
            real_current,
            set_voltage,
            set_current,
            real_power: real_voltage * real_current,
            set_power: set_voltage * set_current,
        }
    }
}

impl core::fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "output {} {:.3}V/{:.3}A ({:.2}W), set {:.3}V/{:.3}A, {}, OCP {}, keys {}{}",
            if self.power_on { "ON" } else { "OFF" },
            self.real_voltage,
            self.real_current,
            self.real_power,
            self.set_voltage,
            self.set_current,
            if self.constant_current_mode { "CC" } else { "CV" },
            if self.ocp_enabled { "on" } else { "off" },
            if self.keyboard_locked { "locked" } else { "unlocked" },
            if self.alarm_active { ", ALARM" } else { "" },
        )
    }
}

/// A settings write. Fields left as `None` keep the value the unit currently reports.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OutputRequest {
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub power_on: Option<bool>,
    pub ocp_enabled: Option<bool>,
    pub keyboard_locked: Option<bool>,
}

/// Everything an outside caller may want to know about the attached unit.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub model: String,
    pub nominal_voltage: u16,
    pub nominal_current: u16,
    pub max_voltage: f64,
    pub max_current: f64,
    pub voltage_decimals: u8,
    pub current_decimals: u8,
    pub voltage_series: u8,
    pub current_series: u8,
    pub endianness: crate::frame::Endianness,
    pub slave_address: u8,
    pub connected: bool,
    pub endpoint: Option<Endpoint>,
}

impl core::fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}: max {}V/{}A, {}/{} decimals (V/A), {} endian, address {}",
            self.model,
            self.max_voltage,
            self.max_current,
            self.voltage_decimals,
            self.current_decimals,
            self.endianness,
            self.slave_address,
        )?;
        if let Some(endpoint) = &self.endpoint {
            write!(f, " on {endpoint}")?;
        }
        Ok(())
    }
}

/// A connected WANPTEK supply.
///
/// For its methods, "read" means fetching a fresh status from the unit, "set" means a
/// read-modify-write of the settings block. Nothing is cached between calls.
pub struct DeviceSession<L: Link> {
    transport: Transport<L>,
    profile: DeviceProfile,
    endpoint: Option<Endpoint>,
    connected: bool,
}

impl<L: Link> DeviceSession<L> {
    /// Read one status frame over `link` and build the session from it.
    pub fn connect(link: L, address: u8, timeout: Duration) -> Result<Self> {
        let mut transport = Transport::new(link, timeout);
        let response = Self::read_raw_status(&mut transport, address)?;
        let profile = DeviceProfile::from_status_response(&response, address)?;
        Ok(Self {
            transport,
            profile,
            endpoint: None,
            connected: true,
        })
    }

    /// Remember where the link is attached, for [`Self::device_info`].
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn read_raw_status(transport: &mut Transport<L>, address: u8) -> Result<RawResponse> {
        let request = build_read_request(address, STATUS_REGISTER_START, STATUS_REGISTER_COUNT)?;
        transport.send(&request)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    /// Read the complete status block.
    pub fn read_status(&mut self) -> Result<StatusSnapshot> {
        self.ensure_connected()?;
        let response = Self::read_raw_status(&mut self.transport, self.profile.slave_address)?;
        let data = profile::status_payload(&response)?;
        Ok(StatusSnapshot::decode(data, &self.profile))
    }

    /// Write output settings. Unset fields are taken from a status read made just before.
    pub fn set_output(&mut self, request: OutputRequest) -> Result<()> {
        let current_status = self.read_status()?;

        let voltage = request.voltage.unwrap_or(current_status.set_voltage);
        let current = request.current.unwrap_or(current_status.set_current);
        let power_on = request.power_on.unwrap_or(current_status.power_on);
        let ocp_enabled = request.ocp_enabled.unwrap_or(current_status.ocp_enabled);
        let keyboard_locked = request
            .keyboard_locked
            .unwrap_or(current_status.keyboard_locked);

        check_range(Quantity::Voltage, voltage, self.profile.max_voltage)?;
        check_range(Quantity::Current, current, self.profile.max_current)?;

        // Truncated, not rounded.
        let voltage_raw = (voltage * self.profile.voltage_scale()) as u16;
        let current_raw = (current * self.profile.current_scale()) as u16;

        let control = ControlFlags::new()
            .with_power(power_on)
            .with_ocp(ocp_enabled)
            .with_keyboard_lock(keyboard_locked);

        let frame = build_write_request(
            self.profile.slave_address,
            control.into(),
            voltage_raw,
            current_raw,
            self.profile.endianness,
        )?;
        self.transport.send(&frame)?;
        Ok(())
    }

    /// Set the output voltage in volts.
    pub fn set_voltage(&mut self, voltage: f64) -> Result<()> {
        self.set_output(OutputRequest {
            voltage: Some(voltage),
            ..Default::default()
        })
    }

    /// Set the current limit in amps.
    pub fn set_current(&mut self, current: f64) -> Result<()> {
        self.set_output(OutputRequest {
            current: Some(current),
            ..Default::default()
        })
    }

    pub fn power_on(&mut self) -> Result<()> {
        self.set_power(true)
    }

    pub fn power_off(&mut self) -> Result<()> {
        self.set_power(false)
    }

    fn set_power(&mut self, on: bool) -> Result<()> {
        self.set_output(OutputRequest {
            power_on: Some(on),
            ..Default::default()
        })
    }

    pub fn enable_ocp(&mut self) -> Result<()> {
        self.set_ocp(true)
    }

    pub fn disable_ocp(&mut self) -> Result<()> {
        self.set_ocp(false)
    }

    fn set_ocp(&mut self, enabled: bool) -> Result<()> {
        self.set_output(OutputRequest {
            ocp_enabled: Some(enabled),
            ..Default::default()
        })
    }

    /// Lock the front panel keys, leaving the unit under host control only.
    pub fn lock_keyboard(&mut self) -> Result<()> {
        self.set_keyboard_lock(true)
    }

    pub fn unlock_keyboard(&mut self) -> Result<()> {
        self.set_keyboard_lock(false)
    }

    fn set_keyboard_lock(&mut self, locked: bool) -> Result<()> {
        self.set_output(OutputRequest {
            keyboard_locked: Some(locked),
            ..Default::default()
        })
    }

    /// Measured output voltage in volts.
    pub fn read_voltage(&mut self) -> Result<f64> {
        Ok(self.read_status()?.real_voltage)
    }

    /// Measured output current in amps.
    pub fn read_current(&mut self) -> Result<f64> {
        Ok(self.read_status()?.real_current)
    }

    /// Measured output power in watts.
    pub fn read_power(&mut self) -> Result<f64> {
        Ok(self.read_status()?.real_power)
    }

    pub fn is_power_on(&mut self) -> Result<bool> {
        Ok(self.read_status()?.power_on)
    }

    pub fn is_constant_current(&mut self) -> Result<bool> {
        Ok(self.read_status()?.constant_current_mode)
    }

    pub fn has_alarm(&mut self) -> Result<bool> {
        Ok(self.read_status()?.alarm_active)
    }

    pub fn device_info(&self) -> DeviceInfo {
        let profile = &self.profile;
        DeviceInfo {
            model: profile.model(),
            nominal_voltage: profile.nominal_voltage,
            nominal_current: profile.nominal_current,
            max_voltage: profile.max_voltage,
            max_current: profile.max_current,
            voltage_decimals: profile.voltage_decimals,
            current_decimals: profile.current_decimals,
            voltage_series: profile.voltage_series,
            current_series: profile.current_series,
            endianness: profile.endianness,
            slave_address: profile.slave_address,
            connected: self.connected,
            endpoint: self.endpoint.clone(),
        }
    }

    /// Reopen the link with its original settings and derive the profile again.
    ///
    /// On failure the session stays disconnected until a later reconnect succeeds.
    pub fn reconnect(&mut self) -> Result<()> {
        self.connected = false;
        self.transport.link_mut().reopen()?;
        let address = self.profile.slave_address;
        let response = Self::read_raw_status(&mut self.transport, address)?;
        self.profile = DeviceProfile::from_status_response(&response, address)?;
        self.connected = true;
        tracing::info!("Reconnected to {}", self.profile.model());
        Ok(())
    }

    /// Stop using the link. Every later call fails with [`Error::NotConnected`].
    pub fn close(&mut self) {
        self.connected = false;
    }
}

fn check_range(quantity: Quantity, value: f64, max: f64) -> Result<()> {
    if (0.0..=max).contains(&value) {
        Ok(())
    } else {
        Err(Error::OutOfRange {
            quantity,
            value,
            max,
        })
    }
}
