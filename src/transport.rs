use std::time::{Duration, Instant};

use embedded_io::{Error as _, ErrorKind};
use heapless::Vec;

use crate::error::{Error, Result};
use crate::frame::{self, Frame, MAX_FRAME_LEN, MIN_RESPONSE_LEN};
use crate::link::Link;

/// Default time we wait for a response to start and complete.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause between polls when the link has nothing for us.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// A complete raw response, CRC included.
pub type RawResponse = Vec<u8, MAX_FRAME_LEN>;

/// Sends one frame at a time over a [`Link`] and collects the reply.
///
/// There is no retry in here: one request yields exactly one response or one error.
pub struct Transport<L: Link> {
    link: L,
    timeout: Duration,
}

impl<L: Link> Transport<L> {
    pub fn new(link: L, timeout: Duration) -> Self {
        Self { link, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Send `request` and wait for its response.
    ///
    /// Stale input is discarded first so a late answer to an earlier, timed out request can
    /// not be mistaken for this one.
    pub fn send(&mut self, request: &Frame) -> Result<RawResponse> {
        let bytes = request.encode()?;
        let expected = request.expected_response_len();

        self.link.discard_input()?;
        tracing::debug!("TX {:02X?}", bytes.as_slice());
        self.link.write_all(&bytes)?;
        self.link.flush()?;

        let response = self.collect(expected)?;
        tracing::debug!("RX {:02X?}", response.as_slice());

        if response.len() < MIN_RESPONSE_LEN {
            return Err(Error::LinkTimeout {
                received: response.len(),
            });
        }
        frame::verify_checksum(&response)?;
        if response.len() < expected {
            return Err(Error::MalformedResponse {
                expected,
                actual: response.len(),
            });
        }
        Ok(response)
    }

    /// Read until `expected` bytes are in or the timeout runs out.
    fn collect(&mut self, expected: usize) -> Result<RawResponse> {
        let deadline = Instant::now() + self.timeout;
        let mut response = RawResponse::new();
        let mut chunk = [0u8; 32];

        while response.len() < expected.min(MAX_FRAME_LEN) && Instant::now() < deadline {
            let room = (MAX_FRAME_LEN - response.len()).min(chunk.len());
            match self.link.read(&mut chunk[..room]) {
                Ok(0) => std::thread::sleep(POLL_INTERVAL),
                Ok(count) => response
                    .extend_from_slice(&chunk[..count])
                    .map_err(|_| Error::BufferOverflow)?,
                Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                    std::thread::sleep(POLL_INTERVAL)
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Endianness, build_read_request, build_write_request};
    use crate::mock_serial::SimulatedPsu;

    const SHORT_TIMEOUT: Duration = Duration::from_millis(50);

    fn status_request() -> Frame {
        build_read_request(0x00, 0x0000, 0x0008).unwrap()
    }

    #[test]
    fn test_status_read_round_trip() {
        let psu = SimulatedPsu::default();
        let mut transport = Transport::new(psu.clone(), SHORT_TIMEOUT);

        let response = transport.send(&status_request()).unwrap();
        assert_eq!(response.len(), 21);
        assert_eq!(&response[..3], &[0x00, 0x03, 0x10]);
        assert_eq!(psu.state().requests.len(), 1);
        assert_eq!(psu.state().discard_count, 1);
    }

    #[test]
    fn test_silence_is_a_timeout() {
        let psu = SimulatedPsu::default();
        psu.state().silent = true;
        let mut transport = Transport::new(psu, SHORT_TIMEOUT);

        let started = Instant::now();
        let result = transport.send(&status_request());
        assert!(matches!(result, Err(Error::LinkTimeout { received: 0 })));
        assert!(started.elapsed() >= SHORT_TIMEOUT);
    }

    #[test]
    fn test_bad_crc_is_rejected() {
        let psu = SimulatedPsu::default();
        psu.state().corrupt_crc = true;
        let mut transport = Transport::new(psu, SHORT_TIMEOUT);

        let result = transport.send(&status_request());
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_short_response_is_malformed() {
        let psu = SimulatedPsu::default();
        psu.state().truncate_to = Some(9);
        let mut transport = Transport::new(psu, SHORT_TIMEOUT);

        let result = transport.send(&status_request());
        assert!(matches!(
            result,
            Err(Error::MalformedResponse {
                expected: 21,
                actual: 9
            })
        ));
    }

    #[test]
    fn test_short_write_echo_is_malformed() {
        let psu = SimulatedPsu::default();
        psu.state().truncate_to = Some(6);
        let mut transport = Transport::new(psu, SHORT_TIMEOUT);

        let request = build_write_request(0x00, 0x01, 500, 100, Endianness::Little).unwrap();
        let result = transport.send(&request);
        assert!(matches!(
            result,
            Err(Error::MalformedResponse {
                expected: 8,
                actual: 6
            })
        ));
    }

    #[test]
    fn test_two_bytes_is_a_timeout() {
        let psu = SimulatedPsu::default();
        psu.state().truncate_to = Some(2);
        let mut transport = Transport::new(psu, SHORT_TIMEOUT);

        let result = transport.send(&status_request());
        assert!(matches!(result, Err(Error::LinkTimeout { received: 2 })));
    }

    #[test]
    fn test_stale_input_is_discarded() {
        let psu = SimulatedPsu::default();
        psu.state().stale_input = vec![0x00, 0x10, 0x00, 0x00, 0x03, 0x00, 0xAA, 0xBB];
        let mut transport = Transport::new(psu.clone(), SHORT_TIMEOUT);

        let response = transport.send(&status_request()).unwrap();
        assert_eq!(response.len(), 21);
        assert_eq!(response[1], 0x03);
        assert!(psu.state().stale_input.is_empty());
    }

    #[test]
    fn test_one_request_per_send() {
        let psu = SimulatedPsu::default();
        psu.state().corrupt_crc = true;
        let mut transport = Transport::new(psu.clone(), SHORT_TIMEOUT);

        assert!(transport.send(&status_request()).is_err());
        assert_eq!(psu.state().requests.len(), 1);
    }
}
