//! Inbound command codes and their typed payloads.
//!
//! | code | command | payload |
//! |---|---|---|
//! | 1 | `BleName` | UTF-8 string |
//! | 2 | `BleStatus` | 1 byte |
//! | 3 | `PairingCode` | UTF-8 string |
//! | 4 | `PairingResult` | 1 byte |
//! | 5 | `BleVersion` | UTF-8 string |
//! | 8 | `ChargingStatus` | `{state, charge type}` |
//! | 9 | `BatteryLevel` | 1 byte, 0-100 |
//! | 10 | `Button` | 1 byte |
//! | 12 | `LedBrightness` | `{flag, brightness}` |
//! | 13 | `BatteryInfo` | `res` + big-endian u16 |
//! | 16 | `BleBuildId` | UTF-8 string |
//! | 17 | `BleHash` | raw bytes |
//! | 18 | `BleMac` | raw bytes |
//!
//! Any other code is not interesting to the host and is ignored.
//!
//! ```
//! use auxlink_protocol::{Frame, InboundCommand};
//!
//! let frame = Frame::new(9, vec![75u8]);
//! let command = InboundCommand::parse(&frame).unwrap();
//! assert_eq!(command, Some(InboundCommand::BatteryLevel(75)));
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use auxlink_core::{Error, Result, constants::BATTERY_INFO_TEMPERATURE};

use crate::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandCode {
    BleName = 1,
    BleStatus = 2,
    PairingCode = 3,
    PairingResult = 4,
    BleVersion = 5,
    ChargingStatus = 8,
    BatteryLevel = 9,
    Button = 10,
    LedBrightness = 12,
    BatteryInfo = 13,
    BleBuildId = 16,
    BleHash = 17,
    BleMac = 18,
}

impl CommandCode {
    /// Look up a command code, `None` for codes the host does not handle.
    pub fn from_u8(code: u8) -> Option<Self> {
        use CommandCode::*;
        let command = match code {
            1 => BleName,
            2 => BleStatus,
            3 => PairingCode,
            4 => PairingResult,
            5 => BleVersion,
            8 => ChargingStatus,
            9 => BatteryLevel,
            10 => Button,
            12 => LedBrightness,
            13 => BatteryInfo,
            16 => BleBuildId,
            17 => BleHash,
            18 => BleMac,
            _ => return None,
        };
        Some(command)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.as_u8())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BleStatus {
    Connected,
    Disconnected,
    Opened,
    Closed,
}

impl BleStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(BleStatus::Connected),
            2 => Some(BleStatus::Disconnected),
            3 => Some(BleStatus::Opened),
            4 => Some(BleStatus::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairingOutcome {
    Success,
    Failed,
}

impl PairingOutcome {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(PairingOutcome::Success),
            2 => Some(PairingOutcome::Failed),
            _ => None,
        }
    }
}

/// First byte of a charging-status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargingStatus {
    ChargeStart,
    UsbUnplugged,
    PowerStatusCharging,
    PowerStatusFinished,
}

impl ChargingStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(ChargingStatus::ChargeStart),
            2 => Some(ChargingStatus::UsbUnplugged),
            3 => Some(ChargingStatus::PowerStatusCharging),
            4 => Some(ChargingStatus::PowerStatusFinished),
            _ => None,
        }
    }

    /// Whether the report announces an active charger.
    pub fn is_charging(self) -> bool {
        matches!(
            self,
            ChargingStatus::ChargeStart | ChargingStatus::PowerStatusCharging
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeType {
    Wired,
    Wireless,
}

impl ChargeType {
    /// `2` is wireless, every other value is a cable.
    pub fn from_u8(value: u8) -> Self {
        if value == 2 {
            ChargeType::Wireless
        } else {
            ChargeType::Wired
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonEvent {
    ShortPress,
    LongPress,
    /// Physical press edge (0x20).
    RawPress,
    /// Physical release edge (0x40).
    RawRelease,
}

impl ButtonEvent {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(ButtonEvent::ShortPress),
            2 => Some(ButtonEvent::LongPress),
            0x20 => Some(ButtonEvent::RawPress),
            0x40 => Some(ButtonEvent::RawRelease),
            _ => None,
        }
    }
}

/// Decoded inbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundCommand {
    BleName(String),
    BleStatus(BleStatus),
    PairingCode(String),
    PairingResult(PairingOutcome),
    BleVersion(String),
    ChargingStatus {
        status: ChargingStatus,
        charge_type: ChargeType,
    },
    BatteryLevel(u8),
    Button(ButtonEvent),
    LedBrightness {
        flag: u8,
        brightness: u8,
    },
    BatteryInfo {
        res: u8,
        value: u16,
    },
    BleBuildId(String),
    BleHash(Bytes),
    BleMac(Bytes),
}

impl InboundCommand {
    /// Decode the payload of `frame`.
    ///
    /// Returns `Ok(None)` when there is nothing to act on: an unknown command
    /// code, an unknown status value, or an empty identity report.
    ///
    /// # Errors
    /// Returns `Error::InvalidPayload` when a known command carries a payload
    /// of the wrong size and `Error::InvalidUtf8` for undecodable strings.
    pub fn parse(frame: &Frame) -> Result<Option<Self>> {
        let Some(code) = CommandCode::from_u8(frame.command()) else {
            return Ok(None);
        };
        let payload = frame.payload();
        let raw = code.as_u8();

        let command = match code {
            CommandCode::BleName => non_empty_string(raw, payload)?.map(Self::BleName),
            CommandCode::BleVersion => non_empty_string(raw, payload)?.map(Self::BleVersion),
            CommandCode::BleBuildId => non_empty_string(raw, payload)?.map(Self::BleBuildId),
            CommandCode::PairingCode => Some(Self::PairingCode(utf8(raw, payload)?)),
            CommandCode::BleHash => non_empty_bytes(payload).map(Self::BleHash),
            CommandCode::BleMac => non_empty_bytes(payload).map(Self::BleMac),
            CommandCode::BleStatus => BleStatus::from_u8(single_byte(raw, payload)?).map(Self::BleStatus),
            CommandCode::PairingResult => {
                PairingOutcome::from_u8(single_byte(raw, payload)?).map(Self::PairingResult)
            }
            CommandCode::Button => ButtonEvent::from_u8(single_byte(raw, payload)?).map(Self::Button),
            CommandCode::BatteryLevel => Some(Self::BatteryLevel(single_byte(raw, payload)?)),
            CommandCode::ChargingStatus => {
                let [state, charge_type] = fixed::<2>(raw, payload)?;
                ChargingStatus::from_u8(state).map(|status| Self::ChargingStatus {
                    status,
                    charge_type: ChargeType::from_u8(charge_type),
                })
            }
            CommandCode::LedBrightness => {
                if payload.is_empty() {
                    None
                } else {
                    let [flag, brightness] = fixed::<2>(raw, payload)?;
                    Some(Self::LedBrightness { flag, brightness })
                }
            }
            CommandCode::BatteryInfo => {
                let [res, hi, lo] = fixed::<3>(raw, payload)?;
                Some(Self::BatteryInfo {
                    res,
                    value: u16::from_be_bytes([hi, lo]),
                })
            }
        };
        Ok(command)
    }

    pub fn code(&self) -> CommandCode {
        match self {
            Self::BleName(_) => CommandCode::BleName,
            Self::BleStatus(_) => CommandCode::BleStatus,
            Self::PairingCode(_) => CommandCode::PairingCode,
            Self::PairingResult(_) => CommandCode::PairingResult,
            Self::BleVersion(_) => CommandCode::BleVersion,
            Self::ChargingStatus { .. } => CommandCode::ChargingStatus,
            Self::BatteryLevel(_) => CommandCode::BatteryLevel,
            Self::Button(_) => CommandCode::Button,
            Self::LedBrightness { .. } => CommandCode::LedBrightness,
            Self::BatteryInfo { .. } => CommandCode::BatteryInfo,
            Self::BleBuildId(_) => CommandCode::BleBuildId,
            Self::BleHash(_) => CommandCode::BleHash,
            Self::BleMac(_) => CommandCode::BleMac,
        }
    }

    /// Battery temperature carried by a battery-info report, if that is what it is.
    pub fn battery_temperature(&self) -> Option<u16> {
        match self {
            Self::BatteryInfo { res, value } if *res == BATTERY_INFO_TEMPERATURE => Some(*value),
            _ => None,
        }
    }
}

fn fixed<const N: usize>(command: u8, payload: &[u8]) -> Result<[u8; N]> {
    payload.try_into().map_err(|_| {
        Error::invalid_payload(
            command,
            format!("expected {N} bytes, got {}", payload.len()),
        )
    })
}

fn single_byte(command: u8, payload: &[u8]) -> Result<u8> {
    let [value] = fixed::<1>(command, payload)?;
    Ok(value)
}

fn utf8(command: u8, payload: &[u8]) -> Result<String> {
    std::str::from_utf8(payload)
        .map(str::to_owned)
        .map_err(|_| Error::InvalidUtf8 { command })
}

fn non_empty_string(command: u8, payload: &[u8]) -> Result<Option<String>> {
    if payload.is_empty() {
        return Ok(None);
    }
    utf8(command, payload).map(Some)
}

fn non_empty_bytes(payload: &[u8]) -> Option<Bytes> {
    (!payload.is_empty()).then(|| Bytes::copy_from_slice(payload))
}
