//! The byte link between the host and the supply.
//!
//! The transport only needs [`embedded_io::Read`] and [`embedded_io::Write`] plus two extras
//! a UART gives us: dropping whatever is sitting in the receive buffer, and reopening the
//! port with the same settings. [`SerialLink`] provides these on top of `serialport`.

use std::time::Duration;

use embedded_io::ErrorKind;
use thiserror::Error;

use crate::error::{Error, Result};

/// Upper bound on how long a single read blocks. The transport loops until its own deadline.
const READ_SLICE: Duration = Duration::from_millis(20);

/// Error raised by a [`Link`], carrying the [`embedded_io`] error kind.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{0:?}")]
pub struct LinkError(pub ErrorKind);

impl embedded_io::Error for LinkError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;
        let kind = match err.kind() {
            Io::TimedOut | Io::WouldBlock => ErrorKind::TimedOut,
            Io::Interrupted => ErrorKind::Interrupted,
            Io::NotFound => ErrorKind::NotFound,
            Io::PermissionDenied => ErrorKind::PermissionDenied,
            Io::BrokenPipe => ErrorKind::BrokenPipe,
            Io::InvalidInput => ErrorKind::InvalidInput,
            Io::InvalidData => ErrorKind::InvalidData,
            _ => ErrorKind::Other,
        };
        LinkError(kind)
    }
}

/// Anything the transport can talk to a supply through.
pub trait Link:
    embedded_io::Read + embedded_io::Write + embedded_io::ErrorType<Error = LinkError>
{
    /// Throw away any bytes already received but not yet read.
    fn discard_input(&mut self) -> core::result::Result<(), LinkError>;

    /// Close and reopen the underlying device with its original settings.
    fn reopen(&mut self) -> core::result::Result<(), LinkError>;
}

/// Where a link is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub port: String,
    pub baud_rate: u32,
}

impl core::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ({} baud)", self.port, self.baud_rate)
    }
}

/// A real serial port, 8N1.
pub struct SerialLink {
    endpoint: Endpoint,
    port: Box<dyn serialport::SerialPort>,
}

impl SerialLink {
    pub fn open(port: &str, baud_rate: u32) -> Result<Self> {
        let endpoint = Endpoint {
            port: port.to_string(),
            baud_rate,
        };
        let port = Self::open_port(&endpoint).map_err(|err| Error::Open {
            port: endpoint.port.clone(),
            reason: err.to_string(),
        })?;
        Ok(Self { endpoint, port })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn open_port(endpoint: &Endpoint) -> serialport::Result<Box<dyn serialport::SerialPort>> {
        serialport::new(&endpoint.port, endpoint.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(READ_SLICE)
            .open()
    }
}

impl embedded_io::ErrorType for SerialLink {
    type Error = LinkError;
}

impl embedded_io::Read for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> core::result::Result<usize, Self::Error> {
        Ok(std::io::Read::read(&mut self.port, buf)?)
    }
}

impl embedded_io::Write for SerialLink {
    fn write(&mut self, buf: &[u8]) -> core::result::Result<usize, Self::Error> {
        Ok(std::io::Write::write(&mut self.port, buf)?)
    }

    fn flush(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(std::io::Write::flush(&mut self.port)?)
    }
}

impl Link for SerialLink {
    fn discard_input(&mut self) -> core::result::Result<(), LinkError> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|err| LinkError::from(std::io::Error::from(err)))
    }

    fn reopen(&mut self) -> core::result::Result<(), LinkError> {
        self.port = Self::open_port(&self.endpoint)
            .map_err(|err| LinkError::from(std::io::Error::from(err)))?;
        Ok(())
    }
}

/// Serial devices that look like a USB attached supply, sorted by name.
pub fn find_devices() -> Vec<String> {
    let mut devices: Vec<String> = match serialport::available_ports() {
        Ok(ports) => ports
            .into_iter()
            .filter(|info| {
                matches!(info.port_type, serialport::SerialPortType::UsbPort(_))
                    || is_usb_serial_name(&info.port_name)
            })
            .map(|info| info.port_name)
            .collect(),
        Err(err) => {
            tracing::warn!("Could not enumerate serial ports: {err}");
            Vec::new()
        }
    };
    devices.sort();
    devices.dedup();
    devices
}

fn is_usb_serial_name(name: &str) -> bool {
    ["ttyUSB", "ttyACM", "serial/by-id"]
        .iter()
        .any(|pattern| name.contains(pattern))
}
