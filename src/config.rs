//! Command line and environment configuration for the server binary.

use std::time::Duration;

use clap::Parser;

use crate::detect::DetectOptions;
use crate::server::DEFAULT_LISTEN_ADDR;

/// Serve a WANPTEK power supply to SCPI clients over TCP.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct Config {
    /// Serial port of the supply (auto-detected when omitted)
    #[clap(short = 'p', long, env = "WANPTEK_PORT")]
    pub port: Option<String>,

    /// Baud rate (9600, 4800, 19200 and 2400 are tried when omitted)
    #[clap(short = 'b', long, env = "WANPTEK_BAUD")]
    pub baud_rate: Option<u32>,

    /// MODBUS slave address of the supply
    #[clap(
        short = 'a',
        long,
        default_value_t = 0,
        env = "WANPTEK_ADDRESS",
        value_parser = clap::value_parser!(u8).range(0..=31)
    )]
    pub address: u8,

    /// How long to wait for each response, in milliseconds
    #[clap(long, default_value_t = 1000, env = "WANPTEK_TIMEOUT_MS")]
    pub timeout_ms: u64,

    /// Log the supply status at this interval in milliseconds, 0 to disable
    #[clap(long, default_value_t = 0, env = "WANPTEK_MONITOR_MS")]
    pub monitor_ms: u64,

    /// Address the SCPI server listens on
    #[clap(long, default_value = DEFAULT_LISTEN_ADDR, env = "SCPI_LISTEN")]
    pub listen: String,

    /// Log level or filter directive (trace, debug, info, warn, error)
    #[clap(short = 'l', long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn monitor_interval(&self) -> Option<Duration> {
        (self.monitor_ms > 0).then(|| Duration::from_millis(self.monitor_ms))
    }

    pub fn detect_options(&self) -> DetectOptions {
        DetectOptions {
            port: self.port.clone(),
            baud_rate: self.baud_rate,
            address: self.address,
            timeout: self.timeout(),
        }
    }
}
