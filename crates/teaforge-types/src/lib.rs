//! `teaforge-types` – shared vocabulary of the roboRIO platform core.
//!
//! Every other crate in the workspace speaks in these types: the fixed port
//! catalog, vendor status codes, timestamped CAN samples, driver-station
//! snapshots and the closed [`PlatformError`] taxonomy.

pub mod error;
pub mod ports;
pub mod signal;
pub mod status;

pub use error::PlatformError;
pub use ports::{AnalogPort, CanId, DigitalPort, HID_SLOT_COUNT, HidSlot, PwmPort};
pub use signal::{EncoderSnapshot, GyroSnapshot, MotorSnapshot, SignalValue};
pub use status::{PhoenixStatus, RevStatus};

use serde::{Deserialize, Serialize};

/// Which mode the driver station currently has the robot in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunningRobotState {
    Disabled,
    Teleop,
    Autonomous,
    Test,
    EStopped,
    Unknown,
}

/// Logic level of a digital I/O line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigitalState {
    High,
    Low,
}

impl DigitalState {
    pub fn is_high(self) -> bool {
        matches!(self, DigitalState::High)
    }
}

impl From<bool> for DigitalState {
    fn from(high: bool) -> Self {
        if high {
            DigitalState::High
        } else {
            DigitalState::Low
        }
    }
}

/// One snapshot of a human-interface device (gamepad, joystick, …).
///
/// Equality is element-wise over both arrays, which is what change detection
/// on HID subscriptions relies on.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HidValue {
    pub axis_count: usize,
    pub button_count: usize,
    /// Raw axis positions, index 0 first.
    pub axis_values: Vec<f64>,
    /// Raw button states, button 1 first.
    pub button_values: Vec<bool>,
}

/// Pressed/released view of a single HID button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamepadButtonState {
    Pressed,
    Released,
}

impl HidValue {
    /// State of the 1-based `button`, or `None` when the device has fewer
    /// buttons.
    pub fn button(&self, button: usize) -> Option<GamepadButtonState> {
        let index = button.checked_sub(1)?;
        self.button_values.get(index).map(|pressed| {
            if *pressed {
                GamepadButtonState::Pressed
            } else {
                GamepadButtonState::Released
            }
        })
    }

    /// Position of the 0-based `axis`.
    pub fn axis(&self, axis: usize) -> Option<f64> {
        self.axis_values.get(axis).copied()
    }
}
