use serde::{Deserialize, Serialize};
use std::fmt;

/// Four-phase handshake of wireless charging.
///
/// Power transfer only engages in `Charging`, which is reached from
/// `Starting` once a safe battery temperature has been reported.
///
/// # Valid Transitions
///
/// - Stopped → Starting (charger detected)
/// - Starting → Charging (temperature confirmed)
/// - Starting → Stopping (stop signal while ramping up)
/// - Stopping → Starting (charger detected again)
/// - Charging → Stopped (charger removed)
/// - Charging → Starting (charge re-arm)
/// - any → Stopped (a wired charger takes over)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeWirelessState {
    #[default]
    Stopped,
    Starting,
    Charging,
    Stopping,
}

impl ChargeWirelessState {
    /// Check if transition to target state is valid from this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use auxlink_core::ChargeWirelessState;
    ///
    /// assert!(ChargeWirelessState::Stopped.can_transition_to(&ChargeWirelessState::Starting));
    /// assert!(!ChargeWirelessState::Stopped.can_transition_to(&ChargeWirelessState::Charging));
    /// ```
    pub fn can_transition_to(&self, target: &ChargeWirelessState) -> bool {
        use ChargeWirelessState::*;
        matches!(
            (self, target),
            (Stopped | Stopping, Starting)
                | (Starting, Charging | Stopping)
                | (Charging, Stopped | Starting)
                | (Starting | Stopping, Stopped)
        )
    }
}

impl fmt::Display for ChargeWirelessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            ChargeWirelessState::Stopped => "Stopped",
            ChargeWirelessState::Starting => "Starting",
            ChargeWirelessState::Charging => "Charging",
            ChargeWirelessState::Stopping => "Stopping",
        };
        write!(f, "{}", state_str)
    }
}

/// BLE indicator shown in the status bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BleIcon {
    Disabled,
    Enabled,
    Connected,
}

/// Vibration patterns understood by the motor driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HapticPattern {
    Success,
    Error,
    Medium,
}

/// Severity of a failed fingerprint attempt, as shown to the user.
///
/// The numeric value is what the lock screen uses to pick its tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum WarningLevel {
    /// Failure the sensor could not classify.
    Unclassified = 0,
    /// Mismatch, attempts remain.
    Mismatch = 1,
    /// Mismatch, attempt limit reached.
    Exhausted = 2,
    /// No finger on the sensor or the image could not be captured.
    PoorContact = 3,
    /// Features could not be extracted from the image.
    ExtractionFailed = 4,
}

impl WarningLevel {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use ChargeWirelessState::*;

    #[rstest]
    #[case(Stopped, Starting)]
    #[case(Starting, Charging)]
    #[case(Charging, Stopped)]
    #[case(Starting, Stopping)]
    #[case(Stopping, Starting)]
    fn test_wireless_valid_transitions(
        #[case] from: ChargeWirelessState,
        #[case] to: ChargeWirelessState,
    ) {
        assert!(from.can_transition_to(&to));
    }

    #[rstest]
    #[case(Stopped, Charging)]
    #[case(Stopped, Stopping)]
    #[case(Stopping, Charging)]
    #[case(Charging, Stopping)]
    fn test_wireless_invalid_transitions(
        #[case] from: ChargeWirelessState,
        #[case] to: ChargeWirelessState,
    ) {
        assert!(!from.can_transition_to(&to));
    }

    #[test]
    fn test_wireless_default_is_stopped() {
        assert_eq!(ChargeWirelessState::default(), Stopped);
    }

    #[test]
    fn test_warning_level_values() {
        assert_eq!(WarningLevel::Unclassified.as_u8(), 0);
        assert_eq!(WarningLevel::Mismatch.as_u8(), 1);
        assert_eq!(WarningLevel::Exhausted.as_u8(), 2);
        assert_eq!(WarningLevel::PoorContact.as_u8(), 3);
        assert_eq!(WarningLevel::ExtractionFailed.as_u8(), 4);
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&Starting).unwrap();
        assert_eq!(json, "\"starting\"");
    }
}
