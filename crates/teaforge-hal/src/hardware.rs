//! [`Hardware`] – the backend factory.
//!
//! A backend owns the vendor SDK objects. The platform core asks it for
//! driver handles while interpreting initialization effects and keeps the
//! returned `Arc`s inside capability tokens, so one handle is shared between
//! the registry and every subscription that observes the device.

use std::path::Path;
use std::sync::Arc;

use teaforge_types::{
    AnalogPort, CanId, DigitalPort, HidSlot, PhoenixStatus, PwmPort, RevStatus, RunningRobotState,
};
use thiserror::Error;

use crate::can::{CanCoder, NeoMotor, Orchestra, Pigeon, TalonMotor};
use crate::hid::HidDevice;
use crate::io::{AnalogInput, AnalogOutput, DigitalInput, DigitalOutput, PwmOutput};

/// Raw failure reported by a driver call, before the kernel attaches the
/// addressed resource and turns it into a `PlatformError`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VendorFault {
    #[error("Phoenix status {0}")]
    Phoenix(PhoenixStatus),

    #[error("REVLib error {0}")]
    Rev(RevStatus),

    /// The HAL refused to hand out the channel (already in use, out of
    /// range, reserved by another subsystem).
    #[error("HAL allocation failed: {0}")]
    Allocation(String),

    #[error("HAL write failed: {0}")]
    Write(String),
}

/// Factory and ambient-state access for one controller backend.
///
/// Every `open_*` call performs the vendor allocation only; liveness probes
/// are issued by the caller through the returned handle so that the wait
/// bound stays under the caller's control.
pub trait Hardware: Send + Sync {
    /// Monotonic controller clock (FPGA time) in microseconds.
    fn now_micros(&self) -> u64;

    /// Mode reported by the driver station right now.
    fn robot_state(&self) -> RunningRobotState;

    fn open_digital_input(&self, port: DigitalPort) -> Result<Arc<dyn DigitalInput>, VendorFault>;

    fn open_digital_output(&self, port: DigitalPort)
    -> Result<Arc<dyn DigitalOutput>, VendorFault>;

    fn open_analog_input(&self, port: AnalogPort) -> Result<Arc<dyn AnalogInput>, VendorFault>;

    fn open_analog_output(&self, port: AnalogPort) -> Result<Arc<dyn AnalogOutput>, VendorFault>;

    fn open_pwm_output(&self, port: PwmPort) -> Result<Arc<dyn PwmOutput>, VendorFault>;

    /// Joystick handles are passive views over driver-station data and
    /// cannot fail to open.
    fn open_hid(&self, slot: HidSlot) -> Arc<dyn HidDevice>;

    fn open_neo(&self, id: CanId) -> Result<Arc<dyn NeoMotor>, VendorFault>;

    fn open_talon(&self, id: CanId) -> Result<Arc<dyn TalonMotor>, VendorFault>;

    fn open_cancoder(&self, id: CanId) -> Result<Arc<dyn CanCoder>, VendorFault>;

    fn open_pigeon(&self, id: CanId) -> Result<Arc<dyn Pigeon>, VendorFault>;

    /// Build an orchestra playing `song` (a Phoenix `.chrp` file) on `motor`.
    fn load_orchestra(
        &self,
        motor: &Arc<dyn TalonMotor>,
        song: &Path,
    ) -> Result<Arc<dyn Orchestra>, VendorFault>;
}
