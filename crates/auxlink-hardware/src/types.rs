//! Values exchanged across the collaborator boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// User's answer to a displayed pairing code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingResponse {
    Accepted,
    Rejected,
}

/// Why an interactive unlock did not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnlockError {
    /// The user backed out of the PIN prompt.
    #[error("unlock cancelled by user")]
    Cancelled,

    /// The prompt failed for any other reason.
    #[error("unlock failed: {0}")]
    Failed(String),
}

/// Classified failure of a fingerprint match attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("feature extraction failed")]
    FeatureExtraction,

    #[error("no finger on the sensor")]
    NoFinger,

    #[error("image capture failed")]
    ImageCapture,

    #[error("fingerprint does not match")]
    NoMatch,

    #[error("{0}")]
    Other(String),
}

/// Template slot returned by a successful match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FingerId(pub u8);

impl fmt::Display for FingerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "finger#{}", self.0)
    }
}

/// Event reported by the USB port monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsbEvent {
    /// Cable plugged in (`true`) or removed (`false`).
    Plug(bool),
    /// Host toggled the USB data link (air-gap mode).
    DataLink(bool),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(UnlockError::Cancelled.to_string(), "unlock cancelled by user");
        assert_eq!(MatchError::NoMatch.to_string(), "fingerprint does not match");
        assert_eq!(MatchError::Other("bad id".into()).to_string(), "bad id");
    }

    #[test]
    fn test_pairing_response_serialization() {
        let json = serde_json::to_string(&PairingResponse::Accepted).unwrap();
        assert_eq!(json, "\"accepted\"");
        assert_eq!(FingerId(3).to_string(), "finger#3");
    }
}
