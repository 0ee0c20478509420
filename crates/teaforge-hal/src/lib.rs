//! `teaforge-hal` – vendor driver seams.
//!
//! The platform core never links a vendor SDK directly. It talks to the
//! controller through the traits in this crate, and a backend crate (or the
//! bundled [`sim`] backend) supplies the implementations.
//!
//! # Modules
//!
//! - [`hardware`] – the [`Hardware`] factory every backend implements, plus
//!   [`VendorFault`], the raw failure a driver call can report.
//! - [`io`] – digital, analog and PWM channel drivers.
//! - [`hid`] – driver-station joysticks and gamepads.
//! - [`can`] – Phoenix (TalonFX, CANcoder, Pigeon 2, Orchestra) and REV
//!   (SPARK MAX) CAN devices.
//! - [`sim`] – [`SimHardware`][sim::SimHardware], an in-process backend
//!   whose inputs are scripted by tests.

pub mod can;
pub mod hardware;
pub mod hid;
pub mod io;
pub mod sim;

pub use can::{CanCoder, NeoMotor, Orchestra, PhoenixDevice, Pigeon, TalonMotor};
pub use hardware::{Hardware, VendorFault};
pub use hid::{HidDevice, read_hid};
pub use io::{AnalogInput, AnalogOutput, DigitalInput, DigitalOutput, PwmOutput};
pub use sim::SimHardware;
