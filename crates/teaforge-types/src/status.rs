//! Vendor status codes for the two CAN device families.
//!
//! Both vendors report outcomes as status enums rather than exceptions. The
//! named variants cover the conditions the platform core reacts to; anything
//! else is carried through verbatim in `Other`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome code reported by CTRE Phoenix devices (TalonFX, CANcoder,
/// Pigeon 2, Orchestra).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhoenixStatus {
    Ok,
    /// No frame arrived from the device within the wait window.
    RxTimeout,
    TxFailed,
    /// The device is not present on the bus.
    EcuIsNotPresent,
    InvalidParamValue,
    CouldNotLoadMusic,
    Other(i32),
}

impl PhoenixStatus {
    pub fn is_ok(self) -> bool {
        matches!(self, PhoenixStatus::Ok)
    }
}

impl fmt::Display for PhoenixStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhoenixStatus::Other(code) => write!(f, "Other({code})"),
            named => write!(f, "{named:?}"),
        }
    }
}

/// Error code reported by REV Robotics devices (SPARK MAX driving a NEO).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RevStatus {
    Ok,
    Error,
    Timeout,
    HalError,
    CantFindFirmware,
    FirmwareTooOld,
    CanDisconnected,
    DuplicateCanId,
    InvalidCanId,
    Other(i32),
}

impl RevStatus {
    pub fn is_ok(self) -> bool {
        matches!(self, RevStatus::Ok)
    }
}

impl fmt::Display for RevStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevStatus::Other(code) => write!(f, "Other({code})"),
            named => write!(f, "{named:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_predicates() {
        assert!(PhoenixStatus::Ok.is_ok());
        assert!(!PhoenixStatus::RxTimeout.is_ok());
        assert!(RevStatus::Ok.is_ok());
        assert!(!RevStatus::CanDisconnected.is_ok());
    }

    #[test]
    fn display_keeps_raw_codes() {
        assert_eq!(PhoenixStatus::Other(-1003).to_string(), "Other(-1003)");
        assert_eq!(RevStatus::Timeout.to_string(), "Timeout");
    }
}
