//! Error normalizer.
//!
//! Translates every failure a driver, the filesystem or the network layer
//! can report into the closed [`PlatformError`] taxonomy, given which
//! resource was being addressed.

use std::io::{self, ErrorKind};
use std::path::Path;

use teaforge_hal::VendorFault;
use teaforge_net::NetError;
use teaforge_types::{
    AnalogPort, CanId, DigitalPort, PhoenixStatus, PlatformError, PwmPort, RevStatus,
};

pub(crate) fn digital(port: DigitalPort, fault: VendorFault) -> PlatformError {
    PlatformError::DigitalPortError {
        port,
        details: fault.to_string(),
    }
}

pub(crate) fn analog(port: AnalogPort, fault: VendorFault) -> PlatformError {
    PlatformError::AnalogPortError {
        port,
        details: fault.to_string(),
    }
}

pub(crate) fn pwm(port: PwmPort, fault: VendorFault) -> PlatformError {
    PlatformError::PwmPortError {
        port,
        details: fault.to_string(),
    }
}

/// A CAN driver call failed outright.
pub(crate) fn can(can_id: CanId, fault: VendorFault) -> PlatformError {
    match fault {
        VendorFault::Phoenix(status) => PlatformError::PhoenixError { can_id, status },
        VendorFault::Rev(status) => PlatformError::RevError { can_id, status },
        VendorFault::Allocation(details) | VendorFault::Write(details) => {
            PlatformError::PortInitializationError {
                details: format!("CAN device {can_id}: {details}"),
            }
        }
    }
}

/// Phoenix calls report through a status code instead of failing.
pub(crate) fn phoenix(can_id: CanId, status: PhoenixStatus) -> Result<(), PlatformError> {
    if status.is_ok() {
        Ok(())
    } else {
        Err(PlatformError::PhoenixError { can_id, status })
    }
}

pub(crate) fn rev(can_id: CanId, status: RevStatus) -> Result<(), PlatformError> {
    if status.is_ok() {
        Ok(())
    } else {
        Err(PlatformError::RevError { can_id, status })
    }
}

fn classify_path(path: &Path, err: &io::Error) -> Option<PlatformError> {
    let path = path.display().to_string();
    let reason = err.to_string();
    match err.kind() {
        ErrorKind::NotFound => Some(PlatformError::FileNotFound { path }),
        ErrorKind::PermissionDenied => Some(PlatformError::FileAccessDenied { path, reason }),
        ErrorKind::InvalidInput | ErrorKind::IsADirectory | ErrorKind::NotADirectory => {
            Some(PlatformError::InvalidPath { path, reason })
        }
        ErrorKind::ReadOnlyFilesystem => Some(PlatformError::ReadOnlyFileSystem { path, reason }),
        _ => None,
    }
}

/// Classify a failed read of `path`.
pub(crate) fn read(path: &Path, err: io::Error) -> PlatformError {
    classify_path(path, &err).unwrap_or_else(|| PlatformError::FileReadError {
        path: path.display().to_string(),
        reason: err.to_string(),
    })
}

/// Classify a failed write (or directory creation) at `path`.
pub(crate) fn write(path: &Path, err: io::Error) -> PlatformError {
    classify_path(path, &err).unwrap_or_else(|| PlatformError::FileWriteError {
        path: path.display().to_string(),
        reason: err.to_string(),
    })
}

pub(crate) fn websocket(url: &str, err: NetError) -> PlatformError {
    PlatformError::WebSocketInitializationError {
        url: url.to_string(),
        details: err.to_string(),
    }
}

pub(crate) fn forward(local_port: u16, err: NetError) -> PlatformError {
    PlatformError::PortInitializationError {
        details: format!("forward of port {local_port}: {err}"),
    }
}
