pub mod codec;
pub mod commands;
pub mod control;
pub mod frame;
pub mod stream_parser;

pub use codec::AuxCodec;
pub use commands::{
    BleStatus, ButtonEvent, ChargeType, ChargingStatus, CommandCode, InboundCommand,
    PairingOutcome,
};
pub use control::{ControlCommand, Opcode};
pub use frame::{Discard, Frame, xor_checksum};
pub use stream_parser::{DrainFrames, ParserState, StreamParser};
