//! Cache of facts reported by the auxiliary chip.
//!
//! Every fact starts unknown. Reading an unknown fact through
//! [`StatusCache::request_if_unknown`] yields the query that asks the chip for
//! it, but only once per gap: the fact stays marked as requested until either
//! a report arrives or the periodic [`StatusCache::refresh_tick`] re-arms it.
//!
//! ```
//! use auxlink_device::status::{Fact, FactValue, StatusCache};
//!
//! let mut cache = StatusCache::new();
//! assert!(cache.request_if_unknown(Fact::BatteryCapacity).is_some());
//! assert!(cache.request_if_unknown(Fact::BatteryCapacity).is_none());
//!
//! cache.observe(FactValue::BatteryCapacity(75));
//! assert_eq!(cache.battery_capacity(), Some(75));
//! ```

use std::collections::BTreeSet;
use std::fmt::Write as _;

use bytes::Bytes;
use serde::Serialize;

use auxlink_core::ChargeWirelessState;
use auxlink_protocol::{ChargeType, ControlCommand};

/// Name of a cached fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Fact {
    BleName,
    BleVersion,
    BleBuildId,
    BleHash,
    BleMac,
    BleEnabled,
    BleConnected,
    BatteryCapacity,
    BatteryTemperature,
    FlashlightBrightness,
    ChargeType,
}

impl Fact {
    /// BLE facts re-requested by the periodic refresh, in request order.
    pub const BLE: [Fact; 7] = [
        Fact::BleName,
        Fact::BleVersion,
        Fact::BleEnabled,
        Fact::BleConnected,
        Fact::BleBuildId,
        Fact::BleHash,
        Fact::BleMac,
    ];

    /// The query that makes the chip report this fact.
    pub fn request(self) -> ControlCommand {
        match self {
            Fact::BleName => ControlCommand::request_ble_name(),
            Fact::BleVersion => ControlCommand::request_ble_version(),
            Fact::BleBuildId => ControlCommand::request_ble_build_id(),
            Fact::BleHash => ControlCommand::request_ble_hash(),
            Fact::BleMac => ControlCommand::request_ble_mac(),
            Fact::BleEnabled => ControlCommand::request_ble_status(),
            Fact::BleConnected => ControlCommand::request_ble_connection(),
            Fact::BatteryCapacity => ControlCommand::request_battery_level(),
            Fact::BatteryTemperature => ControlCommand::request_battery_temperature(),
            Fact::FlashlightBrightness => ControlCommand::request_flashlight_brightness(),
            Fact::ChargeType => ControlCommand::request_charging_status(),
        }
    }
}

/// A reported value for one fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactValue {
    BleName(String),
    BleVersion(String),
    BleBuildId(String),
    BleHash(Bytes),
    BleMac(Bytes),
    BleEnabled(bool),
    BleConnected(bool),
    BatteryCapacity(u8),
    BatteryTemperature(u16),
    FlashlightBrightness(u8),
    ChargeType(ChargeType),
}

impl FactValue {
    pub fn fact(&self) -> Fact {
        match self {
            FactValue::BleName(_) => Fact::BleName,
            FactValue::BleVersion(_) => Fact::BleVersion,
            FactValue::BleBuildId(_) => Fact::BleBuildId,
            FactValue::BleHash(_) => Fact::BleHash,
            FactValue::BleMac(_) => Fact::BleMac,
            FactValue::BleEnabled(_) => Fact::BleEnabled,
            FactValue::BleConnected(_) => Fact::BleConnected,
            FactValue::BatteryCapacity(_) => Fact::BatteryCapacity,
            FactValue::BatteryTemperature(_) => Fact::BatteryTemperature,
            FactValue::FlashlightBrightness(_) => Fact::FlashlightBrightness,
            FactValue::ChargeType(_) => Fact::ChargeType,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusCache {
    ble_name: Option<String>,
    ble_version: Option<String>,
    ble_build_id: Option<String>,
    ble_hash: Option<Bytes>,
    ble_mac: Option<Bytes>,
    ble_enabled: Option<bool>,
    ble_connected: Option<bool>,
    battery_capacity: Option<u8>,
    battery_temperature: Option<u16>,
    flashlight_brightness: Option<u8>,
    charge_type: Option<ChargeType>,

    /// Last command sent to the charge relay.
    charge_enabled: Option<bool>,
    /// A cable charger is attached and the relay was switched on for it.
    charging: bool,
    wireless: ChargeWirelessState,

    requested: BTreeSet<Fact>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reported value. Always overwrites.
    pub fn observe(&mut self, value: FactValue) {
        self.requested.remove(&value.fact());
        match value {
            FactValue::BleName(name) => self.ble_name = Some(name),
            FactValue::BleVersion(version) => self.ble_version = Some(version),
            FactValue::BleBuildId(build_id) => self.ble_build_id = Some(build_id),
            FactValue::BleHash(hash) => self.ble_hash = Some(hash),
            FactValue::BleMac(mac) => self.ble_mac = Some(mac),
            FactValue::BleEnabled(enabled) => self.ble_enabled = Some(enabled),
            FactValue::BleConnected(connected) => self.ble_connected = Some(connected),
            FactValue::BatteryCapacity(capacity) => self.battery_capacity = Some(capacity),
            FactValue::BatteryTemperature(value) => self.battery_temperature = Some(value),
            FactValue::FlashlightBrightness(value) => self.flashlight_brightness = Some(value),
            FactValue::ChargeType(charge_type) => self.charge_type = Some(charge_type),
        }
    }

    pub fn is_known(&self, fact: Fact) -> bool {
        match fact {
            Fact::BleName => self.ble_name.is_some(),
            Fact::BleVersion => self.ble_version.is_some(),
            Fact::BleBuildId => self.ble_build_id.is_some(),
            Fact::BleHash => self.ble_hash.is_some(),
            Fact::BleMac => self.ble_mac.is_some(),
            Fact::BleEnabled => self.ble_enabled.is_some(),
            Fact::BleConnected => self.ble_connected.is_some(),
            Fact::BatteryCapacity => self.battery_capacity.is_some(),
            Fact::BatteryTemperature => self.battery_temperature.is_some(),
            Fact::FlashlightBrightness => self.flashlight_brightness.is_some(),
            Fact::ChargeType => self.charge_type.is_some(),
        }
    }

    /// The query for `fact` if it is unknown and not requested yet.
    pub fn request_if_unknown(&mut self, fact: Fact) -> Option<ControlCommand> {
        if self.is_known(fact) || !self.requested.insert(fact) {
            return None;
        }
        Some(fact.request())
    }

    /// Re-arm every fact and return the queries for the BLE facts still
    /// unknown. Other facts are asked for again by their next reader.
    pub fn refresh_tick(&mut self) -> Vec<ControlCommand> {
        self.requested.clear();
        Fact::BLE
            .into_iter()
            .filter_map(|fact| self.request_if_unknown(fact))
            .collect()
    }

    /// Forget a fact so it is requested again.
    pub fn invalidate(&mut self, fact: Fact) {
        match fact {
            Fact::BleName => self.ble_name = None,
            Fact::BleVersion => self.ble_version = None,
            Fact::BleBuildId => self.ble_build_id = None,
            Fact::BleHash => self.ble_hash = None,
            Fact::BleMac => self.ble_mac = None,
            Fact::BleEnabled => self.ble_enabled = None,
            Fact::BleConnected => self.ble_connected = None,
            Fact::BatteryCapacity => self.battery_capacity = None,
            Fact::BatteryTemperature => self.battery_temperature = None,
            Fact::FlashlightBrightness => self.flashlight_brightness = None,
            Fact::ChargeType => self.charge_type = None,
        }
        self.requested.remove(&fact);
    }

    pub fn is_requested(&self, fact: Fact) -> bool {
        self.requested.contains(&fact)
    }

    pub fn ble_name(&self) -> Option<&str> {
        self.ble_name.as_deref()
    }

    pub fn ble_version(&self) -> Option<&str> {
        self.ble_version.as_deref()
    }

    pub fn ble_build_id(&self) -> Option<&str> {
        self.ble_build_id.as_deref()
    }

    pub fn ble_hash(&self) -> Option<&Bytes> {
        self.ble_hash.as_ref()
    }

    pub fn ble_mac(&self) -> Option<&Bytes> {
        self.ble_mac.as_ref()
    }

    pub fn ble_enabled(&self) -> Option<bool> {
        self.ble_enabled
    }

    pub fn ble_connected(&self) -> Option<bool> {
        self.ble_connected
    }

    pub fn battery_capacity(&self) -> Option<u8> {
        self.battery_capacity
    }

    /// Capacity to draw in the status bar. A zero reading draws nothing.
    pub fn battery_icon_capacity(&self) -> Option<u8> {
        self.battery_capacity.filter(|capacity| *capacity > 0)
    }

    pub fn battery_temperature(&self) -> Option<u16> {
        self.battery_temperature
    }

    pub fn flashlight_brightness(&self) -> Option<u8> {
        self.flashlight_brightness
    }

    pub fn charge_type(&self) -> Option<ChargeType> {
        self.charge_type
    }

    pub fn charge_enabled(&self) -> Option<bool> {
        self.charge_enabled
    }

    pub fn set_charge_enabled(&mut self, enabled: bool) {
        self.charge_enabled = Some(enabled);
    }

    pub fn is_charging(&self) -> bool {
        self.charging
    }

    pub fn set_charging(&mut self, charging: bool) {
        self.charging = charging;
    }

    pub fn wireless_state(&self) -> ChargeWirelessState {
        self.wireless
    }

    pub fn set_wireless_state(&mut self, state: ChargeWirelessState) {
        self.wireless = state;
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            ble_name: self.ble_name.clone(),
            ble_version: self.ble_version.clone(),
            ble_build_id: self.ble_build_id.clone(),
            ble_hash: self.ble_hash.as_deref().map(hex),
            ble_mac: self.ble_mac.as_deref().map(hex),
            ble_enabled: self.ble_enabled,
            ble_connected: self.ble_connected,
            battery_capacity: self.battery_capacity,
            battery_temperature: self.battery_temperature,
            flashlight_brightness: self.flashlight_brightness,
            charge_type: self.charge_type,
            charge_enabled: self.charge_enabled,
            charging: self.charging,
            wireless_state: self.wireless,
        }
    }
}

/// Serializable copy of the cache, used for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub ble_name: Option<String>,
    pub ble_version: Option<String>,
    pub ble_build_id: Option<String>,
    pub ble_hash: Option<String>,
    pub ble_mac: Option<String>,
    pub ble_enabled: Option<bool>,
    pub ble_connected: Option<bool>,
    pub battery_capacity: Option<u8>,
    pub battery_temperature: Option<u16>,
    pub flashlight_brightness: Option<u8>,
    pub charge_type: Option<ChargeType>,
    pub charge_enabled: Option<bool>,
    pub charging: bool,
    pub wireless_state: ChargeWirelessState,
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}
