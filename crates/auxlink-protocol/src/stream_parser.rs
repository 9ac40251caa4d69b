//! Stream parser for the auxiliary chip's UART packets.
//!
//! The UART is a byte stream without message boundaries: a single read can
//! carry a partial packet, several packets, or line noise. The parser
//! accumulates bytes, resynchronises on the `A5 5A` prefix and emits
//! host-side frames (the packet without its xor trailer), which is the shape
//! [`Frame::decode`](crate::Frame::decode) consumes.
//!
//! # Usage
//!
//! ```
//! use auxlink_protocol::StreamParser;
//!
//! let mut parser = StreamParser::new();
//!
//! // Battery report split across two reads
//! parser.feed(&[0xA5, 0x5A, 0x00]);
//! parser.feed(&[0x03, 0x09, 0x4B, 0xBE]);
//!
//! let frame = parser.next_frame().unwrap();
//! assert_eq!(&frame[..], &[0xA5, 0x5A, 0x00, 0x03, 0x09, 0x4B]);
//! ```

use bytes::{Buf, Bytes, BytesMut};
use std::collections::VecDeque;
use auxlink_core::constants::{
    DEFAULT_MAX_PACKET_LEN, MIN_PACKET_LEN, PACKET_PREAMBLE_LEN, PREFIX_HI, PREFIX_LO, TRAILER_LEN,
};
use auxlink_core::{ChecksumMode, DeviceConfig};
use tracing::trace;

use crate::frame::xor_checksum;

/// Upper bound on buffered bytes while no packet completes.
const MAX_BUFFER_SIZE: usize = 64 * 1024; // 64 KB

const INITIAL_BUFFER_CAPACITY: usize = 1024;

const INITIAL_FRAME_QUEUE_CAPACITY: usize = 4;

/// State machine states for packet extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Scanning for the `A5 5A` prefix. Bytes before it are noise.
    SeekingPrefix,

    /// Prefix found, waiting for the two length bytes.
    ReadingLength,

    /// Length accepted, waiting for `total` packet bytes.
    ReadingPacket { total: usize },
}

/// Stateful parser turning UART bytes into host-side frames.
///
/// # State Machine
///
/// ```text
/// ┌─────────────┐  A5 5A   ┌──────────────┐  length ok  ┌───────────────┐
/// │SeekingPrefix│─────────>│ReadingLength │────────────>│ReadingPacket  │
/// └─────────────┘          └──────────────┘             └───────────────┘
///       ^                        │ length out of range         │
///       │                        │ (skip one byte)             │ xor mismatch: skip one byte
///       ├────────────────────────┘                             │ xor ok: emit frame
///       └──────────────────────────────────────────────────────┘
/// ```
///
/// Skipping a single byte on a rejected packet, rather than the whole packet,
/// lets the parser find a real prefix hidden inside a corrupted one.
#[derive(Debug)]
pub struct StreamParser {
    buffer: BytesMut,
    state: ParserState,
    frames: VecDeque<Bytes>,
    checksum: ChecksumMode,
    max_packet_len: usize,
    discarded_bytes: u64,
    rejected_packets: u64,
}

impl StreamParser {
    /// Parser with xor verification and a 256-byte packet limit.
    pub fn new() -> Self {
        Self::with_limits(ChecksumMode::Xor, DEFAULT_MAX_PACKET_LEN)
    }

    /// Parser with an explicit trailer mode and packet limit.
    ///
    /// `max_packet_len` is raised to the smallest legal packet if set lower.
    pub fn with_limits(checksum: ChecksumMode, max_packet_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            state: ParserState::SeekingPrefix,
            frames: VecDeque::with_capacity(INITIAL_FRAME_QUEUE_CAPACITY),
            checksum,
            max_packet_len: max_packet_len.max(MIN_PACKET_LEN),
            discarded_bytes: 0,
            rejected_packets: 0,
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::with_limits(config.checksum, config.max_packet_len)
    }

    /// Feed bytes read from the UART.
    ///
    /// Every packet completed by these bytes is queued.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);

        while self.try_extract_frame() {}
    }

    /// Next complete host-side frame, if any.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        self.frames.pop_front()
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn frames_available(&self) -> usize {
        self.frames.len()
    }

    /// Noise bytes dropped while seeking a prefix.
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded_bytes
    }

    /// Packets rejected for a bad length or trailer.
    pub fn rejected_packets(&self) -> u64 {
        self.rejected_packets
    }

    /// Drop buffered bytes and queued frames.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.frames.clear();
        self.state = ParserState::SeekingPrefix;
    }

    /// Iterator over the frames queued so far.
    ///
    /// ```
    /// use auxlink_protocol::StreamParser;
    ///
    /// let mut parser = StreamParser::new();
    /// parser.feed(&[0xA5, 0x5A, 0x00, 0x03, 0x09, 0x4B, 0xBE]);
    /// parser.feed(&[0xA5, 0x5A, 0x00, 0x03, 0x0A, 0x01, 0xF7]);
    ///
    /// let frames: Vec<_> = parser.drain_frames().collect();
    /// assert_eq!(frames.len(), 2);
    /// ```
    pub fn drain_frames(&mut self) -> DrainFrames<'_> {
        DrainFrames { parser: self }
    }

    /// Try to extract one packet from the buffer.
    ///
    /// Returns `true` if a frame was queued.
    fn try_extract_frame(&mut self) -> bool {
        if self.buffer.len() > MAX_BUFFER_SIZE {
            trace!(len = self.buffer.len(), "uart buffer overflow, resetting");
            self.discarded_bytes += self.buffer.len() as u64;
            self.clear();
            return false;
        }

        loop {
            match self.state {
                ParserState::SeekingPrefix => {
                    if !self.handle_seeking_prefix() {
                        return false;
                    }
                }
                ParserState::ReadingLength => {
                    if !self.handle_reading_length() {
                        return false;
                    }
                }
                ParserState::ReadingPacket { total } => {
                    if self.buffer.len() < total {
                        return false;
                    }
                    if self.handle_complete_packet(total) {
                        return true;
                    }
                }
            }
        }
    }

    /// Locate `A5 5A`, dropping what precedes it.
    fn handle_seeking_prefix(&mut self) -> bool {
        let found = self
            .buffer
            .windows(2)
            .position(|pair| pair == [PREFIX_HI, PREFIX_LO]);

        match found {
            Some(pos) => {
                self.discard_front(pos);
                self.state = ParserState::ReadingLength;
                true
            }
            None => {
                // A trailing A5 may be the first half of a prefix.
                let keep = usize::from(self.buffer.last() == Some(&PREFIX_HI));
                self.discard_front(self.buffer.len() - keep);
                false
            }
        }
    }

    fn handle_reading_length(&mut self) -> bool {
        if self.buffer.len() < PACKET_PREAMBLE_LEN {
            return false;
        }

        let length = u16::from_be_bytes([self.buffer[2], self.buffer[3]]) as usize;
        let total = PACKET_PREAMBLE_LEN + length;
        if total < MIN_PACKET_LEN || total > self.max_packet_len {
            trace!(total, max = self.max_packet_len, "packet length out of range");
            self.reject_and_resync();
        } else {
            self.state = ParserState::ReadingPacket { total };
        }
        true
    }

    /// Verify the trailer of a fully buffered packet and queue its frame.
    ///
    /// Returns `false` if the packet was rejected.
    fn handle_complete_packet(&mut self, total: usize) -> bool {
        let body_len = total - TRAILER_LEN;
        if self.checksum == ChecksumMode::Xor {
            let expected = xor_checksum(&self.buffer[..body_len]);
            let actual = self.buffer[body_len];
            if expected != actual {
                trace!(expected, actual, "packet trailer mismatch");
                self.reject_and_resync();
                return false;
            }
        }

        let mut packet = self.buffer.split_to(total);
        packet.truncate(body_len);
        self.frames.push_back(packet.freeze());
        self.state = ParserState::SeekingPrefix;
        true
    }

    fn reject_and_resync(&mut self) {
        self.rejected_packets += 1;
        self.discard_front(1);
        self.state = ParserState::SeekingPrefix;
    }

    fn discard_front(&mut self, count: usize) {
        if count > 0 {
            self.buffer.advance(count);
            self.discarded_bytes += count as u64;
        }
    }
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator returned by [`StreamParser::drain_frames`].
pub struct DrainFrames<'a> {
    parser: &'a mut StreamParser,
}

impl<'a> Iterator for DrainFrames<'a> {
    type Item = Bytes;

    fn next(&mut self) -> Option<Self::Item> {
        self.parser.next_frame()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.parser.frames_available();
        (len, Some(len))
    }
}

impl<'a> ExactSizeIterator for DrainFrames<'a> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use rstest::rstest;

    fn packet(command: u8, payload: &[u8]) -> Bytes {
        Frame::new(command, payload.to_vec()).to_wire()
    }

    #[test]
    fn test_single_packet() {
        let mut parser = StreamParser::new();
        parser.feed(&packet(9, &[0x4B]));

        assert_eq!(parser.frames_available(), 1);
        let frame = parser.next_frame().unwrap();
        assert_eq!(&frame[..], &[0xA5, 0x5A, 0x00, 0x03, 0x09, 0x4B]);
        assert_eq!(parser.state(), ParserState::SeekingPrefix);
    }

    #[test]
    fn test_byte_by_byte() {
        let mut parser = StreamParser::new();
        let wire = packet(3, b"482913");
        for (i, byte) in wire.iter().enumerate() {
            parser.feed(&[*byte]);
            let expected = usize::from(i == wire.len() - 1);
            assert_eq!(parser.frames_available(), expected);
        }
        let frame = Frame::decode(&parser.next_frame().unwrap()).unwrap();
        assert_eq!(frame.payload(), b"482913");
    }

    #[test]
    fn test_noise_before_prefix_is_dropped() {
        let mut parser = StreamParser::new();
        let mut bytes = vec![0x00, 0xFF, 0x5A, 0xA5];
        bytes.extend_from_slice(&packet(10, &[0x01]));
        parser.feed(&bytes);

        assert_eq!(parser.frames_available(), 1);
        assert_eq!(parser.discarded_bytes(), 4);
    }

    #[test]
    fn test_split_prefix_survives() {
        let mut parser = StreamParser::new();
        let wire = packet(9, &[0x10]);
        parser.feed(&[0x01, 0x02, wire[0]]);
        assert_eq!(parser.state(), ParserState::SeekingPrefix);
        parser.feed(&wire[1..]);
        assert_eq!(parser.frames_available(), 1);
    }

    #[test]
    fn test_multiple_packets_in_one_read() {
        let mut parser = StreamParser::new();
        let mut bytes = packet(9, &[0x4B]).to_vec();
        bytes.extend_from_slice(&packet(2, &[0x03]));
        bytes.extend_from_slice(&packet(2, &[0x01]));
        parser.feed(&bytes);

        let commands: Vec<u8> = parser.drain_frames().map(|f| f[4]).collect();
        assert_eq!(commands, vec![9, 2, 2]);
    }

    #[test]
    fn test_bad_trailer_resyncs_to_next_packet() {
        let mut parser = StreamParser::new();
        let mut corrupted = packet(9, &[0x4B]).to_vec();
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0xFF;
        corrupted.extend_from_slice(&packet(9, &[0x50]));
        parser.feed(&corrupted);

        assert_eq!(parser.rejected_packets(), 1);
        assert_eq!(parser.frames_available(), 1);
        assert_eq!(parser.next_frame().unwrap()[5], 0x50);
    }

    #[test]
    fn test_checksum_none_accepts_any_trailer() {
        let mut parser = StreamParser::with_limits(ChecksumMode::None, 256);
        parser.feed(&[0xA5, 0x5A, 0x00, 0x03, 0x09, 0x4B, 0x00]);
        assert_eq!(parser.frames_available(), 1);
    }

    #[rstest]
    #[case(0x0000)]
    #[case(0x00FD)]
    #[case(0xFFFF)]
    fn test_out_of_range_length_is_rejected(#[case] length: u16) {
        let mut parser = StreamParser::new();
        let [hi, lo] = length.to_be_bytes();
        parser.feed(&[0xA5, 0x5A, hi, lo, 0x09]);
        assert_eq!(parser.rejected_packets(), 1);
        assert_eq!(parser.state(), ParserState::SeekingPrefix);

        parser.feed(&packet(9, &[0x01]));
        assert_eq!(parser.frames_available(), 1);
    }

    #[test]
    fn test_largest_packet_accepted() {
        let mut parser = StreamParser::new();
        // 4 + LEN == 256
        let payload = vec![0x41; 256 - 4 - 2];
        parser.feed(&packet(1, &payload));
        assert_eq!(parser.frames_available(), 1);
    }

    #[test]
    fn test_clear_resets() {
        let mut parser = StreamParser::new();
        parser.feed(&[0xA5, 0x5A, 0x00]);
        assert_eq!(parser.state(), ParserState::ReadingLength);
        parser.clear();
        assert_eq!(parser.state(), ParserState::SeekingPrefix);
        assert_eq!(parser.frames_available(), 0);
    }

    #[test]
    fn test_from_config() {
        let config = DeviceConfig {
            checksum: ChecksumMode::None,
            max_packet_len: 16,
            ..DeviceConfig::default()
        };
        let mut parser = StreamParser::from_config(&config);
        parser.feed(&packet(1, &[0x41; 16]));
        assert_eq!(parser.frames_available(), 0);
        assert_eq!(parser.rejected_packets(), 1);
    }
}
