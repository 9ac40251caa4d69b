//! Tokio codec for the auxiliary chip UART.
//!
//! `AuxCodec` wraps the [`StreamParser`] so the UART can be driven through
//! `tokio_util::codec::{FramedRead, FramedWrite}`:
//! - [`Decoder`] yields host-side frames (`Bytes`), ready for [`Frame::decode`].
//! - [`Encoder<ControlCommand>`] writes outbound control packets.
//! - [`Encoder<Frame>`] writes inbound-style packets, used to simulate the chip.
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use tokio_util::codec::FramedRead;
//! use auxlink_protocol::{AuxCodec, Frame};
//!
//! # async fn example(uart: tokio::io::DuplexStream) -> auxlink_core::Result<()> {
//! let mut frames = FramedRead::new(uart, AuxCodec::new());
//! while let Some(bytes) = frames.next().await {
//!     if let Ok(frame) = Frame::decode(&bytes?) {
//!         println!("{frame}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use auxlink_core::constants::DEFAULT_MAX_PACKET_LEN;
use auxlink_core::{DeviceConfig, Error, Result};

use crate::{ControlCommand, Frame, StreamParser};

#[derive(Debug)]
pub struct AuxCodec {
    parser: StreamParser,

    /// Largest frame accepted in either direction.
    max_frame_size: usize,
}

impl AuxCodec {
    pub fn new() -> Self {
        Self {
            parser: StreamParser::new(),
            max_frame_size: DEFAULT_MAX_PACKET_LEN,
        }
    }

    /// Codec honouring the trailer mode and packet limit of `config`.
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self {
            parser: StreamParser::from_config(config),
            max_frame_size: config.max_packet_len,
        }
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            parser: StreamParser::new(),
            max_frame_size,
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Read access to the parser, for its discard counters.
    pub fn parser(&self) -> &StreamParser {
        &self.parser
    }

    fn check_size(&self, size: usize) -> Result<()> {
        if size > self.max_frame_size {
            return Err(Error::FrameTooLarge {
                size,
                max_size: self.max_frame_size,
            });
        }
        Ok(())
    }
}

impl Default for AuxCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for AuxCodec {
    type Item = Bytes;
    type Error = Error;

    /// # Errors
    /// Returns `Error::FrameTooLarge` if a frame exceeds `max_frame_size`.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if !src.is_empty() {
            // The parser owns every byte from here on.
            self.parser.feed(src);
            src.clear();
        }

        match self.parser.next_frame() {
            Some(frame) => {
                self.check_size(frame.len())?;
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<ControlCommand> for AuxCodec {
    type Error = Error;

    fn encode(&mut self, item: ControlCommand, dst: &mut BytesMut) -> Result<()> {
        self.check_size(item.encoded_len())?;
        item.encode_into(dst);
        Ok(())
    }
}

impl Encoder<Frame> for AuxCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<()> {
        let wire = item.to_wire();
        self.check_size(wire.len())?;
        dst.extend_from_slice(&wire);
        Ok(())
    }
}
