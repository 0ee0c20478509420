//! Onboard I/O channel drivers: digital lines, analog channels, PWM outputs.
//!
//! Handles take `&self`: like the vendor objects they wrap, they are shared
//! between the token registry and any subscription sampling the channel.

use teaforge_types::{AnalogPort, DigitalPort, PwmPort};

use crate::hardware::VendorFault;

/// A digital line configured as an input.
pub trait DigitalInput: Send + Sync {
    fn port(&self) -> DigitalPort;

    /// Current line level (`true` = high).
    fn get(&self) -> bool;
}

/// A digital line configured as an output.
pub trait DigitalOutput: Send + Sync {
    fn port(&self) -> DigitalPort;

    /// # Errors
    ///
    /// Returns [`VendorFault::Write`] when the HAL rejects the write.
    fn set(&self, high: bool) -> Result<(), VendorFault>;
}

/// An analog input channel.
pub trait AnalogInput: Send + Sync {
    fn port(&self) -> AnalogPort;

    /// Most recent instantaneous voltage.
    fn voltage(&self) -> f64;

    /// Voltage averaged by the FPGA over its oversampling window.
    fn average_voltage(&self) -> f64;
}

/// An analog output channel (MXP header, 0–5 V).
pub trait AnalogOutput: Send + Sync {
    fn port(&self) -> AnalogPort;

    fn set_voltage(&self, volts: f64) -> Result<(), VendorFault>;
}

/// A PWM motor controller channel.
pub trait PwmOutput: Send + Sync {
    fn port(&self) -> PwmPort;

    /// Command output in `[-1.0, 1.0]`; the controller clamps out-of-range
    /// values.
    fn set(&self, value: f64) -> Result<(), VendorFault>;
}
