use thiserror::Error;

use crate::sample::SensorKind;

/// Motion replay error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionReplayError {
    #[error("Sensor permission denied: {0}")]
    PermissionDenied(SensorKind),

    #[error("Sensor unavailable: {0}")]
    SensorUnavailable(SensorKind),

    #[error("Sensor failed: {0}")]
    SensorFailed(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MotionReplayError {
    /// Errors that block recording but leave the session usable
    pub fn is_sensor_notice(&self) -> bool {
        matches!(
            self,
            MotionReplayError::PermissionDenied(_) | MotionReplayError::SensorUnavailable(_)
        )
    }
}

impl From<std::io::Error> for MotionReplayError {
    fn from(err: std::io::Error) -> Self {
        MotionReplayError::StorageError(err.to_string())
    }
}

/// Result type for controller operations
pub type Result<T> = std::result::Result<T, MotionReplayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_notice_classification() {
        assert!(MotionReplayError::PermissionDenied(SensorKind::AngularRate).is_sensor_notice());
        assert!(
            MotionReplayError::SensorUnavailable(SensorKind::LinearAcceleration).is_sensor_notice()
        );
        assert!(!MotionReplayError::StorageError("disk full".to_string()).is_sensor_notice());
    }

    #[test]
    fn test_error_messages() {
        let err = MotionReplayError::PermissionDenied(SensorKind::LinearAcceleration);
        assert_eq!(err.to_string(), "Sensor permission denied: linear acceleration");
    }
}
