//! Our error types for the WANPTEK link, session and SCPI layers.

use thiserror::Error;

use crate::link::LinkError;

pub type Result<T> = core::result::Result<T, Error>;

/// The physical quantity a range check was applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Voltage,
    Current,
}

impl Quantity {
    fn unit(&self) -> &'static str {
        match self {
            Quantity::Voltage => "V",
            Quantity::Current => "A",
        }
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Quantity::Voltage => f.write_str("Voltage"),
            Quantity::Current => f.write_str("Current"),
        }
    }
}

/// Every failure the crate can report.
///
/// The `Display` text doubles as the SCPI error message, so `UnknownCommand` renders as
/// `Unknown command` and ends up on the wire as `ERROR: Unknown command`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Serial communication error: {0}")]
    Serial(#[from] LinkError),
    #[error("Failed to open serial port {port}: {reason}")]
    Open { port: String, reason: String },
    #[error("Timeout: received only {received} bytes")]
    LinkTimeout { received: usize },
    #[error("CRC verification failed: expected {expected:04X}, got {received:04X}")]
    ChecksumMismatch { expected: u16, received: u16 },
    #[error("Invalid response length: expected {expected}, got {actual}")]
    MalformedResponse { expected: usize, actual: usize },
    #[error("Frame exceeds buffer capacity")]
    BufferOverflow,
    #[error("Could not auto-detect WANPTEK device")]
    DeviceNotFound,
    #[error("{quantity} {value}{unit} outside range 0{unit}..={max}{unit}", unit = .quantity.unit())]
    OutOfRange {
        quantity: Quantity,
        value: f64,
        max: f64,
    },
    #[error("Unknown command")]
    UnknownCommand,
    #[error("Missing parameter")]
    MissingArgument,
    #[error("Invalid parameter")]
    InvalidArgument,
    #[error("Device not connected")]
    NotConnected,
}
