use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ports::{AnalogPort, CanId, DigitalPort, PwmPort};
use crate::status::{PhoenixStatus, RevStatus};

/// The closed set of failures an effect can resolve to.
///
/// Vendor status codes, HAL exceptions, filesystem and network errors are all
/// translated into one of these variants before they reach the control
/// program. Nothing else ever crosses the platform boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformError {
    #[error("resource is already initialized")]
    AlreadyInitialized,

    #[error("file not found: {path}")]
    FileNotFound { path: String },

    #[error("access denied to {path}: {reason}")]
    FileAccessDenied { path: String, reason: String },

    #[error("invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("failed to read {path}: {reason}")]
    FileReadError { path: String, reason: String },

    #[error("read-only file system at {path}: {reason}")]
    ReadOnlyFileSystem { path: String, reason: String },

    #[error("failed to write {path}: {reason}")]
    FileWriteError { path: String, reason: String },

    #[error("port initialization failed: {details}")]
    PortInitializationError { details: String },

    #[error("digital port {port}: {details}")]
    DigitalPortError { port: DigitalPort, details: String },

    #[error("analog port {port}: {details}")]
    AnalogPortError { port: AnalogPort, details: String },

    #[error("PWM port {port}: {details}")]
    PwmPortError { port: PwmPort, details: String },

    #[error("Phoenix device {can_id}: {status}")]
    PhoenixError { can_id: CanId, status: PhoenixStatus },

    #[error("REV device {can_id}: {status}")]
    RevError { can_id: CanId, status: RevStatus },

    #[error("websocket {url} could not be opened: {details}")]
    WebSocketInitializationError { url: String, details: String },

    #[error("no song is loaded for this session")]
    SongNotLoaded,

    #[error("no song is playing for this session")]
    SongNotPlaying,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_device() {
        let err = PlatformError::PhoenixError {
            can_id: 12,
            status: PhoenixStatus::RxTimeout,
        };
        assert!(err.to_string().contains("12"));
        assert!(err.to_string().contains("RxTimeout"));

        let err = PlatformError::DigitalPortError {
            port: DigitalPort::Four,
            details: "allocated as input".into(),
        };
        assert!(err.to_string().contains("DigitalPort4"));
    }

    #[test]
    fn error_serialization_roundtrip() {
        let err = PlatformError::RevError {
            can_id: 3,
            status: RevStatus::Other(77),
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: PlatformError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
