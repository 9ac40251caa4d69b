//! Property-based tests for frame validation and packet framing.

use proptest::prelude::*;
use auxlink_protocol::{ControlCommand, Discard, Frame, InboundCommand, StreamParser, xor_checksum};

/// Buffers whose first two bytes are anything but `A5 5A`.
fn foreign_buffer() -> impl Strategy<Value = Vec<u8>> {
    (any::<[u8; 2]>(), prop::collection::vec(any::<u8>(), 3..64))
        .prop_filter("prefix must not be A5 5A", |(prefix, _)| {
            *prefix != [0xA5, 0x5A]
        })
        .prop_map(|(prefix, rest)| {
            let mut bytes = prefix.to_vec();
            bytes.extend(rest);
            bytes
        })
}

/// Payload sizes that keep the packet inside the default 256-byte limit.
fn payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=250)
}

proptest! {
    /// Property: a foreign prefix always yields a discard, never a frame.
    #[test]
    fn prop_bad_prefix_is_discarded(bytes in foreign_buffer()) {
        let prefix = u16::from_be_bytes([bytes[0], bytes[1]]);
        prop_assert_eq!(Frame::decode(&bytes), Err(Discard::BadPrefix(prefix)));
    }

    /// Property: a frame with `length = L` carries exactly `L - 2` payload bytes.
    #[test]
    fn prop_length_exactness(
        length in 2u16..=512,
        command in any::<u8>(),
        extra in prop::collection::vec(any::<u8>(), 0..8),
    ) {
        let payload_len = length as usize - 2;
        let mut bytes = vec![0xA5, 0x5A];
        bytes.extend_from_slice(&length.to_be_bytes());
        bytes.push(command);
        bytes.extend(std::iter::repeat_n(0x33, payload_len));
        bytes.extend(extra);

        let frame = Frame::decode(&bytes).unwrap();
        prop_assert_eq!(frame.payload().len(), payload_len);
        prop_assert_eq!(frame.length(), length);
    }

    /// Property: a buffer cut short of the announced payload is discarded.
    #[test]
    fn prop_truncated_is_discarded(payload in payload(), cut in 1usize..8) {
        let bytes = Frame::new(1, payload.clone()).to_bytes();
        prop_assume!(cut <= payload.len());
        let short = &bytes[..bytes.len() - cut];
        let is_truncated = matches!(Frame::decode(short), Err(Discard::Truncated { .. }));
        prop_assert!(is_truncated);
    }

    /// Property: the parser delivers every packet regardless of read boundaries.
    #[test]
    fn prop_parser_chunking_invariant(
        payloads in prop::collection::vec(payload(), 1..6),
        chunk in 1usize..32,
    ) {
        let mut wire = Vec::new();
        for (i, payload) in payloads.iter().enumerate() {
            wire.extend_from_slice(&Frame::new(i as u8, payload.clone()).to_wire());
        }

        let mut parser = StreamParser::new();
        for piece in wire.chunks(chunk) {
            parser.feed(piece);
        }

        let frames: Vec<_> = parser.drain_frames().collect();
        prop_assert_eq!(frames.len(), payloads.len());
        for (i, (bytes, payload)) in frames.iter().zip(&payloads).enumerate() {
            let frame = Frame::decode(bytes).unwrap();
            prop_assert_eq!(frame.command(), i as u8);
            prop_assert_eq!(frame.payload(), &payload[..]);
        }
    }

    /// Property: leading noise without a prefix never produces a frame.
    #[test]
    fn prop_noise_without_prefix_is_dropped(noise in prop::collection::vec(any::<u8>(), 0..128)) {
        prop_assume!(!noise.windows(2).any(|w| w == [0xA5, 0x5A]));
        let mut parser = StreamParser::new();
        parser.feed(&noise);
        prop_assert_eq!(parser.frames_available(), 0);

        parser.feed(&Frame::new(9, vec![42u8]).to_wire());
        // A trailing A5 in the noise cannot glue onto the real prefix's A5.
        let frame = parser.next_frame().unwrap();
        let decoded = Frame::decode(&frame).unwrap();
        prop_assert_eq!(decoded.payload(), &[42]);
    }

    /// Property: every encoded control packet xors to zero and announces its own size.
    #[test]
    fn prop_control_packet_consistent(passkey in "[0-9]{6}", brightness in any::<u8>()) {
        for command in [
            ControlCommand::pairing_accept(&passkey),
            ControlCommand::flashlight(brightness),
        ] {
            let packet = command.encode();
            prop_assert_eq!(xor_checksum(&packet), 0);
            let length = u16::from_be_bytes([packet[2], packet[3]]) as usize;
            prop_assert_eq!(packet.len(), 4 + length);
        }
    }

    /// Property: payload parsing never panics on arbitrary frames.
    #[test]
    fn prop_parse_total(command in any::<u8>(), payload in prop::collection::vec(any::<u8>(), 0..16)) {
        let _ = InboundCommand::parse(&Frame::new(command, payload));
    }
}
