//! Runtime configuration of the companion-chip link.
//!
//! Every field has a default matching the shipped device, so an empty JSON
//! object is a valid configuration:
//!
//! ```
//! use auxlink_core::DeviceConfig;
//!
//! let config = DeviceConfig::from_json("{}").unwrap();
//! assert_eq!(config.max_fingerprint_attempts, 5);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::{Error, Result};

/// How the stream parser treats the packet trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumMode {
    /// Trailer must equal the xor of every preceding packet byte.
    #[default]
    Xor,
    /// Trailer is dropped unchecked.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub max_fingerprint_attempts: u32,
    pub wireless_charge_max_temperature: u16,
    pub ble_refresh_interval_ms: u64,
    pub fingerprint_poll_interval_ms: u64,
    pub fingerprint_settle_ms: u64,
    pub fingerprint_failure_cooldown_ms: u64,
    pub safe_reloop_timeout_ms: u64,
    pub lock_resume_delay_ms: u64,
    pub power_off_resume_delay_ms: u64,
    pub ble_connected_wake_ms: u64,
    pub pairing_response_timeout_ms: u64,
    pub flashlight_default_brightness: u8,
    pub checksum: ChecksumMode,
    pub max_packet_len: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            max_fingerprint_attempts: DEFAULT_MAX_FINGERPRINT_ATTEMPTS,
            wireless_charge_max_temperature: DEFAULT_WIRELESS_CHARGE_MAX_TEMPERATURE,
            ble_refresh_interval_ms: millis(DEFAULT_BLE_REFRESH_INTERVAL),
            fingerprint_poll_interval_ms: millis(DEFAULT_FINGERPRINT_POLL_INTERVAL),
            fingerprint_settle_ms: millis(DEFAULT_FINGERPRINT_SETTLE),
            fingerprint_failure_cooldown_ms: millis(DEFAULT_FINGERPRINT_FAILURE_COOLDOWN),
            safe_reloop_timeout_ms: millis(DEFAULT_SAFE_RELOOP_TIMEOUT),
            lock_resume_delay_ms: millis(DEFAULT_LOCK_RESUME_DELAY),
            power_off_resume_delay_ms: millis(DEFAULT_POWER_OFF_RESUME_DELAY),
            ble_connected_wake_ms: millis(DEFAULT_BLE_CONNECTED_WAKE),
            pairing_response_timeout_ms: millis(DEFAULT_PAIRING_RESPONSE_TIMEOUT),
            flashlight_default_brightness: DEFAULT_FLASHLIGHT_BRIGHTNESS,
            checksum: ChecksumMode::Xor,
            max_packet_len: DEFAULT_MAX_PACKET_LEN,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

impl DeviceConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    /// Returns `Error::Config` if the JSON is malformed or a value is out of range.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: DeviceConfig =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    ///
    /// # Errors
    /// Returns `Error::Io` if the file cannot be read, `Error::Config` if it is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check value ranges.
    ///
    /// # Errors
    /// Returns `Error::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.max_fingerprint_attempts == 0 {
            return Err(Error::Config(
                "max_fingerprint_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_packet_len < MIN_PACKET_LEN {
            return Err(Error::Config(format!(
                "max_packet_len must be at least {MIN_PACKET_LEN}, got {}",
                self.max_packet_len
            )));
        }
        if self.flashlight_default_brightness > MAX_FLASHLIGHT_BRIGHTNESS {
            return Err(Error::Config(format!(
                "flashlight_default_brightness must be at most {MAX_FLASHLIGHT_BRIGHTNESS}, got {}",
                self.flashlight_default_brightness
            )));
        }
        let intervals = [
            ("ble_refresh_interval_ms", self.ble_refresh_interval_ms),
            ("fingerprint_poll_interval_ms", self.fingerprint_poll_interval_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be non-zero")));
            }
        }
        Ok(())
    }

    pub fn ble_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.ble_refresh_interval_ms)
    }

    pub fn fingerprint_poll_interval(&self) -> Duration {
        Duration::from_millis(self.fingerprint_poll_interval_ms)
    }

    pub fn fingerprint_settle(&self) -> Duration {
        Duration::from_millis(self.fingerprint_settle_ms)
    }

    pub fn fingerprint_failure_cooldown(&self) -> Duration {
        Duration::from_millis(self.fingerprint_failure_cooldown_ms)
    }

    pub fn safe_reloop_timeout(&self) -> Duration {
        Duration::from_millis(self.safe_reloop_timeout_ms)
    }

    pub fn lock_resume_delay(&self) -> Duration {
        Duration::from_millis(self.lock_resume_delay_ms)
    }

    pub fn power_off_resume_delay(&self) -> Duration {
        Duration::from_millis(self.power_off_resume_delay_ms)
    }

    pub fn ble_connected_wake(&self) -> Duration {
        Duration::from_millis(self.ble_connected_wake_ms)
    }

    pub fn pairing_response_timeout(&self) -> Duration {
        Duration::from_millis(self.pairing_response_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = DeviceConfig::from_json("{}").unwrap();
        assert_eq!(config, DeviceConfig::default());
        assert_eq!(config.ble_refresh_interval(), Duration::from_millis(500));
        assert_eq!(config.wireless_charge_max_temperature, 38);
        assert_eq!(config.checksum, ChecksumMode::Xor);
    }

    #[test]
    fn test_partial_override() {
        let config =
            DeviceConfig::from_json(r#"{"max_fingerprint_attempts": 3, "checksum": "none"}"#)
                .unwrap();
        assert_eq!(config.max_fingerprint_attempts, 3);
        assert_eq!(config.checksum, ChecksumMode::None);
        assert_eq!(config.safe_reloop_timeout_ms, 200);
    }

    #[rstest]
    #[case(r#"{"max_fingerprint_attempts": 0}"#)]
    #[case(r#"{"max_packet_len": 4}"#)]
    #[case(r#"{"flashlight_default_brightness": 51}"#)]
    #[case(r#"{"ble_refresh_interval_ms": 0}"#)]
    #[case(r#"{"fingerprint_poll_interval_ms": 0}"#)]
    #[case(r#"{"checksum": "crc16"}"#)]
    #[case("not json")]
    fn test_invalid_config(#[case] json: &str) {
        assert!(matches!(DeviceConfig::from_json(json), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = DeviceConfig::load("/nonexistent/auxlink.json");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
