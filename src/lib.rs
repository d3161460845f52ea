//! This crate controls WANPTEK programmable bench power supplies and makes them available to
//! SCPI clients over TCP.
//!
//! The supplies speak a MODBUS-RTU dialect over a USB serial adapter:
//! * Baud rate: 9600 by default, 4800, 19200 or 2400 on some units
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None
//!
//! A single status read tells us everything else (decimal places, full scale limits, byte
//! order), so [`detect`] only needs a port and a baud rate to build a
//! [`session::DeviceSession`].
//!
//! Known ranges:
//! * Voltage: 15V, 30V, 60V, 100V, 120V, 150V, 160V, 200V, 300V
//! * Current: 1A, 2A, 3A, 5A, 6A, 10A, 20A, 30A, 40A, 50A, 60A, 80A, 100A, 200A
//!
//! Many clients can share one supply: the session lives on the [`arbiter`]'s worker thread
//! and [`server::ScpiServer`] hands each connection its own [`scpi::ScpiProcessor`].

pub mod arbiter;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod link;
pub mod monitor;
pub mod profile;
pub mod register;
pub mod scpi;
pub mod server;
pub mod session;
pub mod transport;

#[cfg(test)]
mod mock_serial;
