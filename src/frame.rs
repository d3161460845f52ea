//! MODBUS-RTU style framing as spoken by WANPTEK supplies.
//!
//! A frame on the wire is `address ‖ function ‖ payload ‖ crc16`. The CRC is always sent
//! little-endian. The register start/count header words follow the byte order used by the
//! vendor's host software (little-endian), while data words follow the byte order the
//! device reports in its status flags. See [`Endianness`].

use heapless::Vec;

use crate::error::{Error, Result};

/// Function code for "read holding registers".
pub const READ_HOLDING_REGISTERS: u8 = 0x03;
/// Function code for "write multiple registers".
pub const WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// Largest payload we ever build or accept.
pub const MAX_PAYLOAD_LEN: usize = 32;
/// Largest complete frame (address + function + payload + crc).
pub const MAX_FRAME_LEN: usize = MAX_PAYLOAD_LEN + 4;
/// Anything shorter than this cannot even carry a checksum.
pub const MIN_RESPONSE_LEN: usize = 3;

/// Byte order of the register start/count words in a request.
pub const HEADER_BYTE_ORDER: Endianness = Endianness::Little;

/// Byte count of the write payload: control + reserved + voltage word + current word.
const WRITE_DATA_LEN: u8 = 0x06;
/// Registers covered by the write payload.
const WRITE_REGISTER_COUNT: u16 = 0x0003;
/// Length of the echo a device returns for a write.
const WRITE_RESPONSE_LEN: usize = 8;

pub type FrameBuffer = Vec<u8, MAX_FRAME_LEN>;

/// Byte order of multi-byte data words.
///
/// Chosen once per session from the device's status flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

impl Endianness {
    pub fn is_little(self) -> bool {
        self == Endianness::Little
    }
}

impl From<bool> for Endianness {
    /// `true` selects big-endian, matching the status flag bit.
    fn from(big_endian: bool) -> Self {
        if big_endian {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }
}

impl core::fmt::Display for Endianness {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Endianness::Little => f.write_str("Little"),
            Endianness::Big => f.write_str("Big"),
        }
    }
}

/// CRC16 (MODBUS): init `0xFFFF`, reflected polynomial `0xA001`, bit at a time.
pub fn checksum(bytes: &[u8]) -> u16 {
    crc_update(0xFFFF, bytes)
}

fn crc_update(mut crc: u16, bytes: &[u8]) -> u16 {
    for &byte in bytes {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

pub fn pack_u16(value: u16, endianness: Endianness) -> [u8; 2] {
    match endianness {
        Endianness::Little => value.to_le_bytes(),
        Endianness::Big => value.to_be_bytes(),
    }
}

pub fn unpack_u16(bytes: [u8; 2], endianness: Endianness) -> u16 {
    match endianness {
        Endianness::Little => u16::from_le_bytes(bytes),
        Endianness::Big => u16::from_be_bytes(bytes),
    }
}

/// Read the word at `offset` of `data`, if there are two bytes there.
pub(crate) fn word_at(data: &[u8], offset: usize, endianness: Endianness) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(unpack_u16([bytes[0], bytes[1]], endianness))
}

/// One request or response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub address: u8,
    pub function: u8,
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
    pub checksum: u16,
}

impl Frame {
    /// Build a frame, computing its checksum over address, function and payload.
    pub fn new(address: u8, function: u8, payload: &[u8]) -> Result<Self> {
        let payload = Vec::from_slice(payload).map_err(|_| Error::BufferOverflow)?;
        let crc = crc_update(checksum(&[address, function]), &payload);
        Ok(Self {
            address,
            function,
            payload,
            checksum: crc,
        })
    }

    /// Serialise the frame for the wire.
    pub fn encode(&self) -> Result<FrameBuffer> {
        let mut out = FrameBuffer::new();
        out.push(self.address).map_err(|_| Error::BufferOverflow)?;
        out.push(self.function).map_err(|_| Error::BufferOverflow)?;
        out.extend_from_slice(&self.payload)
            .map_err(|_| Error::BufferOverflow)?;
        out.extend_from_slice(&self.checksum.to_le_bytes())
            .map_err(|_| Error::BufferOverflow)?;
        Ok(out)
    }

    /// Parse a received frame, rejecting it unless the trailing checksum matches.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MIN_RESPONSE_LEN + 1 {
            return Err(Error::MalformedResponse {
                expected: MIN_RESPONSE_LEN + 1,
                actual: bytes.len(),
            });
        }
        verify_checksum(bytes)?;
        let (body, crc) = bytes.split_at(bytes.len() - 2);
        let mut frame = Self::new(body[0], body[1], &body[2..])?;
        frame.checksum = u16::from_le_bytes([crc[0], crc[1]]);
        Ok(frame)
    }

    /// Total length of the response a device sends back for this request.
    pub fn expected_response_len(&self) -> usize {
        match self.function {
            READ_HOLDING_REGISTERS => {
                let count = word_at(&self.payload, 2, HEADER_BYTE_ORDER).unwrap_or(0) as usize;
                // address + function + byte count + data + crc
                3 + 2 * count + 2
            }
            WRITE_MULTIPLE_REGISTERS => WRITE_RESPONSE_LEN,
            _ => MIN_RESPONSE_LEN,
        }
    }
}

/// Check the trailing little-endian CRC of a raw frame against its body.
pub fn verify_checksum(bytes: &[u8]) -> Result<()> {
    if bytes.len() < MIN_RESPONSE_LEN {
        return Err(Error::LinkTimeout {
            received: bytes.len(),
        });
    }
    let (body, crc) = bytes.split_at(bytes.len() - 2);
    let received = u16::from_le_bytes([crc[0], crc[1]]);
    let expected = checksum(body);
    if received != expected {
        return Err(Error::ChecksumMismatch { expected, received });
    }
    Ok(())
}

pub fn build_read_request(address: u8, register_start: u16, register_count: u16) -> Result<Frame> {
    let mut payload = [0u8; 4];
    payload[0..2].copy_from_slice(&pack_u16(register_start, HEADER_BYTE_ORDER));
    payload[2..4].copy_from_slice(&pack_u16(register_count, HEADER_BYTE_ORDER));
    Frame::new(address, READ_HOLDING_REGISTERS, &payload)
}

/// Build the settings write: control byte, reserved byte, then voltage and current words
/// in the session's byte order.
pub fn build_write_request(
    address: u8,
    control_byte: u8,
    voltage_raw: u16,
    current_raw: u16,
    endianness: Endianness,
) -> Result<Frame> {
    let mut payload = [0u8; 11];
    payload[0..2].copy_from_slice(&pack_u16(0x0000, HEADER_BYTE_ORDER));
    payload[2..4].copy_from_slice(&pack_u16(WRITE_REGISTER_COUNT, HEADER_BYTE_ORDER));
    payload[4] = WRITE_DATA_LEN;
    payload[5] = control_byte;
    payload[6] = 0x00;
    payload[7..9].copy_from_slice(&pack_u16(voltage_raw, endianness));
    payload[9..11].copy_from_slice(&pack_u16(current_raw, endianness));
    Frame::new(address, WRITE_MULTIPLE_REGISTERS, &payload)
}
