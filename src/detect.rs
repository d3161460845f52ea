//! Find a WANPTEK supply by trying serial ports and baud rates until one answers.

use std::time::Duration;

use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::error::{Error, Result};
use crate::link::{self, Endpoint, Link, SerialLink};
use crate::session::DeviceSession;
use crate::transport::DEFAULT_TIMEOUT;

/// Port tried when nothing else is found.
pub const FALLBACK_PORT: &str = "/dev/ttyUSB0";

/// Baud rates WANPTEK units ship with, most common first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
#[repr(u32)]
pub enum BaudRate {
    /// This is the factory default.
    _9600 = 9600,
    _4800 = 4800,
    _19200 = 19200,
    _2400 = 2400,
}

impl From<BaudRate> for u32 {
    fn from(value: BaudRate) -> Self {
        value as u32
    }
}

/// What detection should try.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectOptions {
    /// Only try this port.
    pub port: Option<String>,
    /// Only try this baud rate.
    pub baud_rate: Option<u32>,
    pub address: u8,
    pub timeout: Duration,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: None,
            address: 0,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Ports to try, in order: the explicit one, else discovered USB serial devices, else
/// [`FALLBACK_PORT`].
pub fn candidate_ports(explicit: Option<&str>, discovered: Vec<String>) -> Vec<String> {
    if let Some(port) = explicit {
        return vec![port.to_string()];
    }
    if discovered.is_empty() {
        vec![FALLBACK_PORT.to_string()]
    } else {
        discovered
    }
}

/// Baud rates to try, in order: the explicit one, else every [`BaudRate`].
pub fn candidate_baud_rates(explicit: Option<u32>) -> Vec<u32> {
    match explicit {
        Some(baud_rate) => vec![baud_rate],
        None => BaudRate::iter().map(u32::from).collect(),
    }
}

/// Try every port × baud rate pair (ports outer) and return the first session that yields a
/// valid status frame.
///
/// `open` attaches a link to an endpoint. Failures to open or to read status just move on to
/// the next pair.
pub fn detect_with<L, F>(
    ports: &[String],
    baud_rates: &[u32],
    address: u8,
    timeout: Duration,
    mut open: F,
) -> Result<DeviceSession<L>>
where
    L: Link,
    F: FnMut(&Endpoint) -> Result<L>,
{
    for port in ports {
        tracing::info!("Trying port {port}");
        for &baud_rate in baud_rates {
            let endpoint = Endpoint {
                port: port.clone(),
                baud_rate,
            };
            let attempt = open(&endpoint)
                .and_then(|link| DeviceSession::connect(link, address, timeout));
            match attempt {
                Ok(session) => {
                    tracing::info!("Connected to {} at {endpoint}", session.profile().model());
                    return Ok(session.with_endpoint(endpoint));
                }
                Err(err) => tracing::debug!("No supply at {endpoint}: {err}"),
            }
        }
    }
    Err(Error::DeviceNotFound)
}

/// Detect a supply on the system's serial ports.
pub fn detect(options: &DetectOptions) -> Result<DeviceSession<SerialLink>> {
    let discovered = if options.port.is_some() {
        Vec::new()
    } else {
        link::find_devices()
    };
    let ports = candidate_ports(options.port.as_deref(), discovered);
    let baud_rates = candidate_baud_rates(options.baud_rate);
    tracing::info!("Auto-detecting WANPTEK power supply on {ports:?} at {baud_rates:?} baud");

    detect_with(
        &ports,
        &baud_rates,
        options.address,
        options.timeout,
        |endpoint| SerialLink::open(&endpoint.port, endpoint.baud_rate),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_serial::SimulatedPsu;

    const TIMEOUT: Duration = Duration::from_millis(20);

    #[test]
    fn test_candidate_ports() {
        assert_eq!(
            candidate_ports(Some("/dev/ttyS4"), vec!["/dev/ttyUSB1".to_string()]),
            ["/dev/ttyS4"]
        );
        assert_eq!(
            candidate_ports(None, vec!["/dev/ttyACM0".into(), "/dev/ttyUSB1".into()]),
            ["/dev/ttyACM0", "/dev/ttyUSB1"]
        );
        assert_eq!(candidate_ports(None, Vec::new()), [FALLBACK_PORT]);
    }

    #[test]
    fn test_candidate_baud_rates() {
        assert_eq!(candidate_baud_rates(None), [9600, 4800, 19200, 2400]);
        assert_eq!(candidate_baud_rates(Some(115200)), [115200]);
    }

    #[test]
    fn test_first_answering_pair_wins() {
        let ports = vec!["/dev/ttyUSB0".to_string(), "/dev/ttyUSB1".to_string()];
        let bauds = candidate_baud_rates(None);
        let mut tried = Vec::new();

        let session = detect_with(&ports, &bauds, 0, TIMEOUT, |endpoint| {
            tried.push((endpoint.port.clone(), endpoint.baud_rate));
            if endpoint.port != "/dev/ttyUSB1" {
                return Err(Error::Open {
                    port: endpoint.port.clone(),
                    reason: "no such device".into(),
                });
            }
            let psu = SimulatedPsu::default();
            // Only answers at 19200.
            psu.state().silent = endpoint.baud_rate != 19200;
            Ok(psu)
        })
        .unwrap();

        let endpoint = session.endpoint().unwrap();
        assert_eq!(endpoint.port, "/dev/ttyUSB1");
        assert_eq!(endpoint.baud_rate, 19200);
        // Port outer, baud inner, nothing tried after the hit.
        let expected: Vec<(String, u32)> = [
            ("/dev/ttyUSB0", 9600),
            ("/dev/ttyUSB0", 4800),
            ("/dev/ttyUSB0", 19200),
            ("/dev/ttyUSB0", 2400),
            ("/dev/ttyUSB1", 9600),
            ("/dev/ttyUSB1", 4800),
            ("/dev/ttyUSB1", 19200),
        ]
        .iter()
        .map(|(port, baud)| (port.to_string(), *baud))
        .collect();
        assert_eq!(tried, expected);
    }

    #[test]
    fn test_exhaustion_reports_device_not_found() {
        let ports = candidate_ports(None, Vec::new());
        let bauds = candidate_baud_rates(None);
        let mut attempts = 0;

        let result = detect_with(&ports, &bauds, 0, TIMEOUT, |_| {
            attempts += 1;
            let psu = SimulatedPsu::default();
            psu.state().corrupt_crc = true;
            Ok(psu)
        });
        assert!(matches!(result, Err(Error::DeviceNotFound)));
        assert_eq!(attempts, 4);
    }

    #[test]
    fn test_profile_comes_from_detected_unit() {
        let ports = vec!["sim".to_string()];
        let session = detect_with(&ports, &[9600], 0, TIMEOUT, |_| {
            let psu = SimulatedPsu::default();
            psu.state().voltage_config = 0x13;
            psu.state().max_voltage_raw = 1050;
            Ok(psu)
        })
        .unwrap();
        assert_eq!(session.profile().nominal_voltage, 100);
        assert_eq!(session.profile().max_voltage, 105.0);
    }
}
