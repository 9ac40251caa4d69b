use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use auxlink_core::constants::*;

/// One inbound message from the auxiliary chip, as handed over by the UART driver.
///
/// # Wire Format
/// The chip sends `A5 5A LEN_HI LEN_LO CMD PAYLOAD.. XOR`. `LEN` counts the
/// command byte, the payload and the xor trailer. The driver strips the
/// trailer, so the host-side frame is `5 + LEN - 2` bytes long:
///
/// ```text
/// A5 5A 00 03 09 4B
/// ^^^^^ ^^^^^ ^^ ^^
/// prefix len  cmd payload (battery 75%)
/// ```
///
/// # Basic Usage
/// ```
/// use auxlink_protocol::Frame;
///
/// let frame = Frame::decode(&[0xA5, 0x5A, 0x00, 0x03, 0x09, 0x4B]).unwrap();
/// assert_eq!(frame.command(), 9);
/// assert_eq!(frame.payload(), &[0x4B]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    prefix: u16,
    length: u16,
    command: u8,
    payload: Bytes,
}

/// Why a buffer did not yield a frame.
///
/// Noise on the shared bus is expected, so a discard is a value rather than
/// an error: the dispatcher drops it and waits for the next read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    /// Fewer than the 5 header bytes.
    TooShort { len: usize },
    /// First two bytes are not `A5 5A`.
    BadPrefix(u16),
    /// `length` cannot even cover the command byte and trailer.
    InvalidLength(u16),
    /// Buffer ends before the announced payload does.
    Truncated { expected: usize, actual: usize },
}

impl fmt::Display for Discard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discard::TooShort { len } => write!(f, "short header ({len} bytes)"),
            Discard::BadPrefix(prefix) => write!(f, "bad prefix 0x{prefix:04X}"),
            Discard::InvalidLength(length) => write!(f, "invalid length {length}"),
            Discard::Truncated { expected, actual } => {
                write!(f, "truncated frame ({actual} of {expected} bytes)")
            }
        }
    }
}

impl Frame {
    /// Build a frame for `command` carrying `payload`, with a consistent length field.
    ///
    /// Mostly useful to simulate chip traffic.
    pub fn new(command: u8, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Frame {
            prefix: FRAME_PREFIX,
            length: (payload.len() + LENGTH_OVERHEAD) as u16,
            command,
            payload,
        }
    }

    /// Decode a host-side frame.
    ///
    /// Bytes beyond `5 + length - 2` are ignored.
    ///
    /// # Errors
    /// Returns a [`Discard`] describing why the buffer is not a frame.
    pub fn decode(bytes: &[u8]) -> std::result::Result<Frame, Discard> {
        if bytes.len() < HEADER_LEN {
            return Err(Discard::TooShort { len: bytes.len() });
        }

        let prefix = u16::from_be_bytes([bytes[0], bytes[1]]);
        if prefix != FRAME_PREFIX {
            return Err(Discard::BadPrefix(prefix));
        }

        let length = u16::from_be_bytes([bytes[2], bytes[3]]);
        if (length as usize) < LENGTH_OVERHEAD {
            return Err(Discard::InvalidLength(length));
        }

        let end = HEADER_LEN + length as usize - LENGTH_OVERHEAD;
        if bytes.len() < end {
            return Err(Discard::Truncated {
                expected: end,
                actual: bytes.len(),
            });
        }

        Ok(Frame {
            prefix,
            length,
            command: bytes[4],
            payload: Bytes::copy_from_slice(&bytes[HEADER_LEN..end]),
        })
    }

    pub fn prefix(&self) -> u16 {
        self.prefix
    }

    pub fn length(&self) -> u16 {
        self.length
    }

    pub fn command(&self) -> u8 {
        self.command
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Size of the host-side frame in bytes.
    pub fn size(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Host-side bytes, the shape [`Frame::decode`] consumes.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size());
        self.put_header_and_payload(&mut buf);
        buf.freeze()
    }

    /// Wire bytes, including the xor trailer the driver strips.
    pub fn to_wire(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size() + TRAILER_LEN);
        self.put_header_and_payload(&mut buf);
        let checksum = xor_checksum(&buf);
        buf.put_u8(checksum);
        buf.freeze()
    }

    fn put_header_and_payload(&self, buf: &mut BytesMut) {
        buf.put_u16(self.prefix);
        buf.put_u16(self.length);
        buf.put_u8(self.command);
        buf.put_slice(&self.payload);
    }
}

/// Xor of every byte, the trailer algorithm of the chip's packets.
pub fn xor_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc ^ b)
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd={} len={} payload=", self.command, self.length)?;
        for byte in self.payload.iter() {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}
