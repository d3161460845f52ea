//! We use this mocking module in unit tests to emulate a WANPTEK supply on a serial port.
//!
//! [`SimulatedPsu`] answers status reads and settings writes from an in-memory register
//! image. Its state sits behind an `Arc<Mutex<_>>` so tests keep a handle after the link has
//! been moved into a session or arbiter.

use std::sync::{Arc, Mutex, MutexGuard};

use embedded_io::ErrorKind;

use crate::frame::{self, Endianness, Frame, READ_HOLDING_REGISTERS, WRITE_MULTIPLE_REGISTERS};
use crate::link::{Link, LinkError};
use crate::register::ControlFlags;

/// Register image and fault switches of the simulated unit.
#[derive(Debug, Clone)]
pub struct SimState {
    pub address: u8,
    pub power_on: bool,
    pub ocp_enabled: bool,
    pub keyboard_locked: bool,
    pub constant_current: bool,
    pub alarm_active: bool,
    pub endianness: Endianness,
    pub voltage_config: u8,
    pub current_config: u8,
    pub set_voltage_raw: u16,
    pub set_current_raw: u16,
    pub max_voltage_raw: u16,
    pub max_current_raw: u16,
    /// When set, requests go unanswered.
    pub silent: bool,
    /// When set, the CRC of the next responses is corrupted.
    pub corrupt_crc: bool,
    /// When set, responses are cut to this many bytes (CRC recomputed over what is left).
    pub truncate_to: Option<usize>,
    /// Bytes waiting in the receive buffer before the next request is written.
    pub stale_input: Vec<u8>,
    /// Every complete request received, in order.
    pub requests: Vec<Vec<u8>>,
    /// Writes that did not form one valid frame.
    pub corrupt_frames: usize,
    /// Requests that arrived while a previous response was still unread.
    pub overlapping_requests: usize,
    pub reopen_count: usize,
    pub discard_count: usize,
    pending: Vec<u8>,
}

impl SimState {
    /// A 30V/5A unit with two decimals on both channels, output off, little-endian.
    pub fn new() -> Self {
        Self {
            address: 0x00,
            power_on: false,
            ocp_enabled: false,
            keyboard_locked: false,
            constant_current: false,
            alarm_active: false,
            endianness: Endianness::Little,
            voltage_config: 0x01,
            current_config: 0x03,
            set_voltage_raw: 1200,
            set_current_raw: 100,
            max_voltage_raw: 3200,
            max_current_raw: 520,
            silent: false,
            corrupt_crc: false,
            truncate_to: None,
            stale_input: Vec::new(),
            requests: Vec::new(),
            corrupt_frames: 0,
            overlapping_requests: 0,
            reopen_count: 0,
            discard_count: 0,
            pending: Vec::new(),
        }
    }

    /// Write requests received so far.
    pub fn write_requests(&self) -> usize {
        self.requests
            .iter()
            .filter(|request| request.get(1) == Some(&WRITE_MULTIPLE_REGISTERS))
            .count()
    }

    /// The 16 byte status payload as the unit would report it.
    pub fn status_payload(&self) -> [u8; 16] {
        let mut flags = 0u8;
        flags |= self.power_on as u8;
        flags |= (self.ocp_enabled as u8) << 1;
        flags |= (self.keyboard_locked as u8) << 2;
        flags |= ((self.endianness == Endianness::Big) as u8) << 3;
        flags |= (self.constant_current as u8) << 4;
        flags |= (self.alarm_active as u8) << 5;

        // The output follows the settings while enabled and the load draws 40% of the limit.
        let (real_voltage, real_current) = if self.power_on {
            (self.set_voltage_raw, (self.set_current_raw as u32 * 2 / 5) as u16)
        } else {
            (0, 0)
        };

        let mut data = [0u8; 16];
        data[0] = flags;
        data[1] = self.voltage_config;
        data[2] = self.current_config;
        let words = [
            real_voltage,
            real_current,
            self.set_voltage_raw,
            self.set_current_raw,
            self.max_voltage_raw,
            self.max_current_raw,
        ];
        for (i, word) in words.iter().enumerate() {
            let offset = 4 + i * 2;
            data[offset..offset + 2].copy_from_slice(&frame::pack_u16(*word, self.endianness));
        }
        data
    }

    fn handle_request(&mut self, bytes: &[u8]) {
        if !self.pending.is_empty() {
            self.overlapping_requests += 1;
        }
        let request = match Frame::decode(bytes) {
            Ok(request) => request,
            Err(_) => {
                self.corrupt_frames += 1;
                return;
            }
        };
        self.requests.push(bytes.to_vec());
        if self.silent || request.address != self.address {
            return;
        }

        let mut body = match request.function {
            READ_HOLDING_REGISTERS => {
                let mut body = vec![self.address, READ_HOLDING_REGISTERS, 16];
                body.extend_from_slice(&self.status_payload());
                body
            }
            WRITE_MULTIPLE_REGISTERS => {
                let payload = &request.payload;
                if payload.len() < 11 {
                    self.corrupt_frames += 1;
                    return;
                }
                let control = ControlFlags::from_bytes([payload[5]]);
                self.power_on = control.power();
                self.ocp_enabled = control.ocp();
                self.keyboard_locked = control.keyboard_lock();
                self.set_voltage_raw = frame::unpack_u16([payload[7], payload[8]], self.endianness);
                self.set_current_raw = frame::unpack_u16([payload[9], payload[10]], self.endianness);
                let mut body = vec![self.address, WRITE_MULTIPLE_REGISTERS];
                body.extend_from_slice(&payload[0..4]);
                body
            }
            _ => return,
        };

        if let Some(len) = self.truncate_to {
            body.truncate(len.saturating_sub(2));
        }
        let mut crc = frame::checksum(&body);
        if self.corrupt_crc {
            crc ^= 0x5A5A;
        }
        body.extend_from_slice(&crc.to_le_bytes());
        self.pending = body;
    }
}

impl Default for SimState {
    fn default() -> Self {
        Self::new()
    }
}

/// Our mock type used to emulate a WANPTEK supply behind a serial port.
#[derive(Clone)]
pub struct SimulatedPsu {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedPsu {
    pub fn new(state: SimState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Lock and inspect or tweak the simulated unit.
    pub fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap()
    }
}

impl Default for SimulatedPsu {
    fn default() -> Self {
        Self::new(SimState::new())
    }
}

impl embedded_io::ErrorType for SimulatedPsu {
    type Error = LinkError;
}

impl embedded_io::Write for SimulatedPsu {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut state = self.state();
        if !state.stale_input.is_empty() {
            // Stale bytes the host failed to discard end up in front of the answer.
            let stale = std::mem::take(&mut state.stale_input);
            state.handle_request(buf);
            let mut pending = stale;
            pending.extend_from_slice(&state.pending);
            state.pending = pending;
        } else {
            state.handle_request(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl embedded_io::Read for SimulatedPsu {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut state = self.state();
        if state.pending.is_empty() {
            return Err(LinkError(ErrorKind::TimedOut));
        }
        let count = buf.len().min(state.pending.len());
        buf[..count].copy_from_slice(&state.pending[..count]);
        state.pending.drain(..count);
        Ok(count)
    }
}

impl Link for SimulatedPsu {
    fn discard_input(&mut self) -> Result<(), LinkError> {
        let mut state = self.state();
        state.discard_count += 1;
        if !state.pending.is_empty() {
            state.overlapping_requests += 1;
        }
        state.stale_input.clear();
        state.pending.clear();
        Ok(())
    }

    fn reopen(&mut self) -> Result<(), LinkError> {
        let mut state = self.state();
        state.reopen_count += 1;
        state.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Read, Write};

    #[test]
    fn test_answers_status_read() {
        let mut psu = SimulatedPsu::default();
        let request = frame::build_read_request(0x00, 0x0000, 0x0008)
            .unwrap()
            .encode()
            .unwrap();
        psu.write_all(&request).unwrap();

        let mut response = [0u8; 64];
        let count = psu.read(&mut response).unwrap();
        assert_eq!(count, 21);
        assert!(frame::verify_checksum(&response[..count]).is_ok());
        assert_eq!(&response[..3], &[0x00, 0x03, 0x10]);
        assert_eq!(psu.state().requests.len(), 1);
    }

    #[test]
    fn test_write_updates_registers() {
        let mut psu = SimulatedPsu::default();
        let request = frame::build_write_request(0x00, 0x03, 500, 150, Endianness::Little)
            .unwrap()
            .encode()
            .unwrap();
        psu.write_all(&request).unwrap();

        let state = psu.state();
        assert!(state.power_on);
        assert!(state.ocp_enabled);
        assert!(!state.keyboard_locked);
        assert_eq!(state.set_voltage_raw, 500);
        assert_eq!(state.set_current_raw, 150);
        assert_eq!(state.write_requests(), 1);
    }

    #[test]
    fn test_garbage_counts_as_corrupt() {
        let mut psu = SimulatedPsu::default();
        psu.write_all(&[0x00, 0x03, 0x00]).unwrap();
        assert_eq!(psu.state().corrupt_frames, 1);
        let mut buf = [0u8; 8];
        assert!(psu.read(&mut buf).is_err());
    }

    #[test]
    fn test_silent_unit_never_answers() {
        let mut psu = SimulatedPsu::default();
        psu.state().silent = true;
        let request = frame::build_read_request(0x00, 0x0000, 0x0008)
            .unwrap()
            .encode()
            .unwrap();
        psu.write_all(&request).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(psu.read(&mut buf), Err(LinkError(ErrorKind::TimedOut)));
    }
}
