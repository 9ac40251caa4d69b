//! Outbound control commands sent to the auxiliary chip.
//!
//! Every command is an opcode plus a subcommand payload. Commands are
//! fire-and-forget: results come back later as independent inbound frames.
//!
//! ```
//! use auxlink_protocol::ControlCommand;
//!
//! let command = ControlCommand::request_battery_level();
//! assert_eq!(command.opcode(), 0x82);
//! assert_eq!(command.subcommand(), &[0x04]);
//! assert_eq!(&command.encode()[..], &[0xA5, 0x5A, 0x00, 0x03, 0x82, 0x04, 0x7A]);
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use auxlink_core::constants::{
    FRAME_PREFIX, LENGTH_OVERHEAD, MAX_FLASHLIGHT_BRIGHTNESS, PACKET_PREAMBLE_LEN,
};

use crate::frame::xor_checksum;

/// Opcode groups understood by the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    BleControl = 0x81,
    PowerControl = 0x82,
    BleInfo = 0x83,
    Flashlight = 0x85,
    Sensor = 0x86,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCommand {
    opcode: u8,
    subcommand: Bytes,
}

impl ControlCommand {
    pub fn new(opcode: Opcode, subcommand: impl Into<Bytes>) -> Self {
        Self {
            opcode: opcode as u8,
            subcommand: subcommand.into(),
        }
    }

    fn simple(opcode: Opcode, sub: u8) -> Self {
        Self::new(opcode, vec![sub])
    }

    // BLE control (0x81)

    pub fn ble_open() -> Self {
        Self::simple(Opcode::BleControl, 0x01)
    }

    pub fn ble_close() -> Self {
        Self::simple(Opcode::BleControl, 0x02)
    }

    pub fn ble_disconnect() -> Self {
        Self::simple(Opcode::BleControl, 0x03)
    }

    pub fn request_ble_status() -> Self {
        Self::simple(Opcode::BleControl, 0x04)
    }

    pub fn request_ble_connection() -> Self {
        Self::simple(Opcode::BleControl, 0x05)
    }

    /// Accept a pairing request, echoing the passkey the user confirmed.
    pub fn pairing_accept(passkey: &str) -> Self {
        let mut sub = BytesMut::with_capacity(1 + passkey.len());
        sub.put_u8(0x06);
        sub.put_slice(passkey.as_bytes());
        Self::new(Opcode::BleControl, sub.freeze())
    }

    pub fn pairing_reject() -> Self {
        Self::simple(Opcode::BleControl, 0x07)
    }

    // Power and charge control (0x82)

    pub fn power_off() -> Self {
        Self::simple(Opcode::PowerControl, 0x01)
    }

    pub fn request_battery_level() -> Self {
        Self::simple(Opcode::PowerControl, 0x04)
    }

    pub fn request_charging_status() -> Self {
        Self::simple(Opcode::PowerControl, 0x05)
    }

    pub fn charge_relay(enable: bool) -> Self {
        Self::simple(Opcode::PowerControl, if enable { 0x06 } else { 0x07 })
    }

    // BLE info queries (0x83)

    pub fn request_ble_name() -> Self {
        Self::simple(Opcode::BleInfo, 0x01)
    }

    pub fn request_ble_version() -> Self {
        Self::simple(Opcode::BleInfo, 0x02)
    }

    pub fn request_ble_build_id() -> Self {
        Self::simple(Opcode::BleInfo, 0x05)
    }

    pub fn request_ble_hash() -> Self {
        Self::simple(Opcode::BleInfo, 0x06)
    }

    pub fn request_ble_mac() -> Self {
        Self::simple(Opcode::BleInfo, 0x07)
    }

    // Flashlight (0x85)

    /// Set the flashlight brightness, clamped to 50. Zero switches it off.
    pub fn flashlight(brightness: u8) -> Self {
        Self::new(
            Opcode::Flashlight,
            vec![0x01, brightness.min(MAX_FLASHLIGHT_BRIGHTNESS)],
        )
    }

    pub fn request_flashlight_brightness() -> Self {
        Self::simple(Opcode::Flashlight, 0x02)
    }

    // Sensors (0x86)

    pub fn request_battery_temperature() -> Self {
        Self::simple(Opcode::Sensor, 0x04)
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    pub fn subcommand(&self) -> &[u8] {
        &self.subcommand
    }

    /// Length of the encoded packet.
    pub fn encoded_len(&self) -> usize {
        PACKET_PREAMBLE_LEN + self.length_field() as usize
    }

    fn length_field(&self) -> u16 {
        (self.subcommand.len() + LENGTH_OVERHEAD) as u16
    }

    /// Append the wire packet to `dst`.
    pub fn encode_into(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        let start = dst.len();
        dst.put_u16(FRAME_PREFIX);
        dst.put_u16(self.length_field());
        dst.put_u8(self.opcode);
        dst.put_slice(&self.subcommand);
        let checksum = xor_checksum(&dst[start..]);
        dst.put_u8(checksum);
        debug_assert_eq!(dst.len() - start, self.encoded_len());
    }

    /// Encode into a standalone wire packet.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}", self.opcode)?;
        for byte in self.subcommand.iter() {
            write!(f, " {byte:02X}")?;
        }
        Ok(())
    }
}
