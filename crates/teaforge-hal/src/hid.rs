//! Driver-station human-interface devices.

use teaforge_types::{HidSlot, HidValue};

/// A joystick or gamepad plugged into the driver station.
pub trait HidDevice: Send + Sync {
    fn slot(&self) -> HidSlot;

    fn axis_count(&self) -> usize;

    fn button_count(&self) -> usize;

    /// Raw position of the 0-based `axis`.
    fn raw_axis(&self, axis: usize) -> f64;

    /// Raw state of the 1-based `button`.
    fn raw_button(&self, button: usize) -> bool;
}

/// Sample every axis and button of `device` into one [`HidValue`].
pub fn read_hid(device: &dyn HidDevice) -> HidValue {
    let axis_count = device.axis_count();
    let button_count = device.button_count();
    HidValue {
        axis_count,
        button_count,
        axis_values: (0..axis_count).map(|i| device.raw_axis(i)).collect(),
        button_values: (1..=button_count).map(|i| device.raw_button(i)).collect(),
    }
}
