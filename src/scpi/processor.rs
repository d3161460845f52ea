use std::str::FromStr;

use crate::arbiter::CommandArbiter;
use crate::error::{Error, Result};
use crate::link::Link;
use crate::scpi::{Command, normalize};
use crate::session::OutputRequest;

const SERIAL_NUMBER: &str = "SN123456";
const FIRMWARE_VERSION: &str = "V1.0";
const SCPI_VERSION: &str = "1999.0";

/// Operation condition bit set while the supply regulates current.
const OPERATION_CONSTANT_CURRENT: u8 = 0x02;

/// Turns lines of SCPI text into replies, one processor per client connection.
///
/// Device access goes through the shared [`CommandArbiter`], so processors on different
/// threads never interleave frames on the link.
pub struct ScpiProcessor<L: Link> {
    arbiter: CommandArbiter<L>,
    /// Last output state this client asked for. Queries always ask the device.
    output_state: bool,
}

impl<L: Link + Send + 'static> ScpiProcessor<L> {
    pub fn new(arbiter: CommandArbiter<L>) -> Self {
        Self {
            arbiter,
            output_state: false,
        }
    }

    pub fn output_state(&self) -> bool {
        self.output_state
    }

    /// Process a line holding one or more `;` separated commands.
    ///
    /// Replies are joined with `\n`. Commands with nothing to say (none do today) and empty
    /// commands are skipped, so a blank line yields an empty reply.
    pub fn process_line(&mut self, line: &str) -> String {
        line.split(';')
            .map(str::trim)
            .filter(|command| !command.is_empty())
            .map(|command| self.process_command(command))
            .filter(|reply| !reply.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Process a single command. Every failure comes back as `ERROR: <message>`.
    pub fn process_command(&mut self, command: &str) -> String {
        let normalized = normalize(command);
        let (name, argument) = match normalized.split_once(' ') {
            Some((name, argument)) => (name, Some(argument)),
            None => (normalized.as_str(), None),
        };

        let result = Command::from_str(name)
            .map_err(|_| Error::UnknownCommand)
            .and_then(|command| self.dispatch(command, argument));
        match result {
            Ok(reply) => {
                tracing::debug!("{normalized} -> {reply}");
                reply
            }
            Err(err) => {
                tracing::warn!("{normalized} failed: {err}");
                format!("ERROR: {err}")
            }
        }
    }

    fn dispatch(&mut self, command: Command, argument: Option<&str>) -> Result<String> {
        match command {
            Command::Identify => {
                let info = self.arbiter.device_info()?;
                Ok(format!(
                    "WANPTEK,{},{SERIAL_NUMBER},{FIRMWARE_VERSION}",
                    info.model
                ))
            }
            Command::Reset => {
                self.arbiter.set_output(OutputRequest {
                    voltage: Some(0.0),
                    current: Some(0.0),
                    power_on: Some(false),
                    ocp_enabled: Some(true),
                    keyboard_locked: None,
                })?;
                self.output_state = false;
                Ok(ok())
            }
            Command::SelfTest => Ok("0".to_string()),
            Command::SystemError => Ok("0,\"No error\"".to_string()),
            Command::SystemVersion => Ok(SCPI_VERSION.to_string()),

            Command::SetVoltage => {
                let voltage = number(argument)?;
                self.arbiter
                    .execute(move |session| session.set_voltage(voltage))?;
                Ok(ok())
            }
            Command::VoltageSetting => Ok(fixed(self.arbiter.read_status()?.set_voltage)),
            Command::SetCurrent => {
                let current = number(argument)?;
                self.arbiter
                    .execute(move |session| session.set_current(current))?;
                Ok(ok())
            }
            Command::CurrentSetting => Ok(fixed(self.arbiter.read_status()?.set_current)),

            Command::MeasureVoltage => Ok(fixed(
                self.arbiter.execute(|session| session.read_voltage())?,
            )),
            Command::MeasureCurrent => Ok(fixed(
                self.arbiter.execute(|session| session.read_current())?,
            )),
            Command::MeasurePower => Ok(fixed(
                self.arbiter.execute(|session| session.read_power())?,
            )),
            Command::MeasureAll => {
                let status = self.arbiter.read_status()?;
                Ok(format!(
                    "{:.3},{:.3},{:.3}",
                    status.real_voltage, status.real_current, status.real_power
                ))
            }

            Command::SetOutput => {
                let on = switch(argument)?;
                self.arbiter.execute(move |session| {
                    if on {
                        session.power_on()
                    } else {
                        session.power_off()
                    }
                })?;
                self.output_state = on;
                Ok(ok())
            }
            Command::OutputState => Ok(flag(
                self.arbiter.execute(|session| session.is_power_on())?,
            )),

            Command::SetOcp => {
                let enabled = switch(argument)?;
                self.arbiter.execute(move |session| {
                    if enabled {
                        session.enable_ocp()
                    } else {
                        session.disable_ocp()
                    }
                })?;
                Ok(ok())
            }
            Command::OcpState => Ok(flag(self.arbiter.read_status()?.ocp_enabled)),
            Command::OcpTripped => Ok(flag(
                self.arbiter
                    .execute(|session| session.is_constant_current())?,
            )),

            Command::QuestionableCondition => Ok("0".to_string()),
            Command::OperationCondition => {
                let mut condition = 0u8;
                if self.arbiter.read_status()?.constant_current_mode {
                    condition |= OPERATION_CONSTANT_CURRENT;
                }
                Ok(condition.to_string())
            }
        }
    }
}

fn ok() -> String {
    "OK".to_string()
}

fn fixed(value: f64) -> String {
    format!("{value:.3}")
}

fn flag(value: bool) -> String {
    let bit = if value { "1" } else { "0" };
    bit.to_string()
}

fn number(argument: Option<&str>) -> Result<f64> {
    argument
        .ok_or(Error::MissingArgument)?
        .trim()
        .parse()
        .map_err(|_| Error::InvalidArgument)
}

fn switch(argument: Option<&str>) -> Result<bool> {
    match argument.ok_or(Error::MissingArgument)?.trim() {
        "ON" | "1" => Ok(true),
        "OFF" | "0" => Ok(false),
        _ => Err(Error::InvalidArgument),
    }
}
