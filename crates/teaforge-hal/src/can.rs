//! CAN bus devices.
//!
//! Phoenix devices publish status signals from a background receive thread
//! owned by the vendor library. Reading a signal returns the latest cached
//! [`SignalValue`] and never blocks; only [`PhoenixDevice::wait_for_status`]
//! waits, and only up to the given bound.
//!
//! Raw units, as reported by the devices:
//!
//! | Device | Signal | Unit |
//! |---|---|---|
//! | TalonFX | position / velocity | rotations, rotations/s |
//! | CANcoder | absolute / relative position, velocity | rotations, rotations/s |
//! | Pigeon 2 | yaw, pitch, roll / world angular rates | degrees, degrees/s |

use std::time::Duration;

use teaforge_types::{CanId, PhoenixStatus, RevStatus, SignalValue};

/// Behavior shared by every CTRE Phoenix device.
pub trait PhoenixDevice: Send + Sync {
    fn can_id(&self) -> CanId;

    /// Refresh a baseline status signal, waiting at most `timeout` for a
    /// frame from the device.
    fn wait_for_status(&self, timeout: Duration) -> PhoenixStatus;

    /// Ask the device to publish its status signals at `hz`.
    fn set_update_frequency(&self, hz: f64) -> PhoenixStatus;
}

/// TalonFX (Falcon 500 / Kraken) motor controller.
pub trait TalonMotor: PhoenixDevice {
    /// Duty-cycle command in `[-1.0, 1.0]`.
    fn set(&self, output: f64) -> PhoenixStatus;

    fn position(&self) -> SignalValue;

    fn velocity(&self) -> SignalValue;
}

/// CANcoder magnetic encoder.
pub trait CanCoder: PhoenixDevice {
    fn absolute_position(&self) -> SignalValue;

    fn position_since_boot(&self) -> SignalValue;

    fn velocity(&self) -> SignalValue;
}

/// Pigeon 2 IMU.
pub trait Pigeon: PhoenixDevice {
    fn yaw(&self) -> SignalValue;

    fn pitch(&self) -> SignalValue;

    fn roll(&self) -> SignalValue;

    fn angular_velocity_x_world(&self) -> SignalValue;

    fn angular_velocity_y_world(&self) -> SignalValue;

    fn angular_velocity_z_world(&self) -> SignalValue;
}

/// SPARK MAX driving a brushless NEO.
pub trait NeoMotor: Send + Sync {
    fn can_id(&self) -> CanId;

    /// Error latched by the most recent transaction with the controller.
    fn last_error(&self) -> RevStatus;

    /// Firmware version string; empty when the controller never answered.
    fn firmware_string(&self) -> String;

    fn set(&self, output: f64) -> RevStatus;
}

/// Phoenix Orchestra: plays a `.chrp` song through TalonFX motors.
pub trait Orchestra: Send + Sync {
    fn play(&self) -> PhoenixStatus;

    fn stop(&self) -> PhoenixStatus;

    fn is_playing(&self) -> bool;

    /// Release the instruments. The orchestra must not be used afterwards.
    fn close(&self);
}
