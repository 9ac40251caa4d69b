//! Error types for collaborator operations.
//!
//! Collaborator faults are never recovered by the core: they convert into
//! [`auxlink_core::Error::Collaborator`] and take the fail-stop path.

/// Result type alias for collaborator operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// The collaborator's event source has gone away.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Fingerprint sensor reported an internal fault.
    #[error("Sensor fault: {message}")]
    SensorFault { message: String },
}

impl HardwareError {
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    pub fn sensor_fault(message: impl Into<String>) -> Self {
        Self::SensorFault {
            message: message.into(),
        }
    }
}

impl From<HardwareError> for auxlink_core::Error {
    fn from(error: HardwareError) -> Self {
        auxlink_core::Error::Collaborator(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_error() {
        let error = HardwareError::disconnected("usb monitor");
        assert!(matches!(error, HardwareError::Disconnected { .. }));
        assert_eq!(error.to_string(), "Device disconnected: usb monitor");
    }

    #[test]
    fn test_sensor_fault_error() {
        let error = HardwareError::sensor_fault("spi timeout");
        assert_eq!(error.to_string(), "Sensor fault: spi timeout");
    }

    #[test]
    fn test_conversion_into_core_error() {
        let error: auxlink_core::Error = HardwareError::sensor_fault("i2c timeout").into();
        assert!(matches!(
            error,
            auxlink_core::Error::Collaborator(ref message) if message == "Sensor fault: i2c timeout"
        ));
    }
}
