//! [`SimHardware`] – in-process controller backend for CI and tests.
//!
//! Every handle the simulator hands out shares one [`SimBus`] behind a
//! mutex, so a test can keep a clone of the [`SimHardware`] value, script
//! inputs (line levels, voltages, joystick axes, CAN samples, the clock) and
//! inspect outputs after the platform core has driven the devices.
//!
//! # Stub behaviour
//!
//! | Device | Stub behaviour |
//! |---|---|
//! | Digital input | Reads the scripted level; defaults to high (pulled up). |
//! | Digital / analog / PWM output | Stores the last written value. |
//! | Analog input | Reads the scripted instantaneous and averaged voltages. |
//! | HID | Reads the scripted axes/buttons; unknown slots report nothing. |
//! | CAN devices | Present iff declared on the builder. Absent devices time out on probes. |
//! | Orchestra | Tracks play/stop/close per motor. |
//!
//! # Example
//!
//! ```rust
//! use teaforge_hal::{DigitalOutput, Hardware, sim::SimHardware};
//! use teaforge_types::DigitalPort;
//!
//! let sim = SimHardware::builder().with_talon(3).build();
//! let output = sim.open_digital_output(DigitalPort::Two).unwrap();
//! output.set(true).unwrap();
//! assert_eq!(sim.digital_output(DigitalPort::Two), Some(true));
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use teaforge_types::{
    AnalogPort, CanId, DigitalPort, EncoderSnapshot, GyroSnapshot, HidSlot, HidValue,
    MotorSnapshot, PhoenixStatus, PwmPort, RevStatus, RunningRobotState, SignalValue,
};

use crate::can::{CanCoder, NeoMotor, Orchestra, PhoenixDevice, Pigeon, TalonMotor};
use crate::hardware::{Hardware, VendorFault};
use crate::hid::HidDevice;
use crate::io::{AnalogInput, AnalogOutput, DigitalInput, DigitalOutput, PwmOutput};

/// An onboard channel the simulator can be told to misbehave on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimChannel {
    Digital(DigitalPort),
    Analog(AnalogPort),
    Pwm(PwmPort),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CanKind {
    Neo,
    Talon,
    CanCoder,
    Pigeon,
}

/// Observable state of a simulated orchestra.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimSongState {
    pub song: PathBuf,
    pub playing: bool,
    pub closed: bool,
}

struct SimCan {
    present: bool,
    rev_status: RevStatus,
    motor: MotorSnapshot,
    encoder: EncoderSnapshot,
    gyro: GyroSnapshot,
}

impl SimCan {
    fn new() -> Self {
        let zero = SignalValue::new(0.0, 0, PhoenixStatus::Ok);
        Self {
            present: true,
            rev_status: RevStatus::Ok,
            motor: MotorSnapshot {
                position: zero,
                velocity: zero,
            },
            encoder: EncoderSnapshot {
                absolute_position: zero,
                relative_position: zero,
                velocity: zero,
            },
            gyro: GyroSnapshot {
                yaw: zero,
                pitch: zero,
                roll: zero,
                yaw_rate: zero,
                pitch_rate: zero,
                roll_rate: zero,
            },
        }
    }
}

/// Everything the simulated controller knows.
struct SimBus {
    time_us: u64,
    last_stamp: u64,
    robot_state: RunningRobotState,
    digital_inputs: HashMap<DigitalPort, bool>,
    digital_outputs: HashMap<DigitalPort, bool>,
    analog_inputs: HashMap<AnalogPort, (f64, f64)>,
    analog_outputs: HashMap<AnalogPort, f64>,
    pwm_outputs: HashMap<PwmPort, f64>,
    rejected: HashSet<SimChannel>,
    write_faults: HashSet<SimChannel>,
    hids: HashMap<HidSlot, HidValue>,
    can: HashMap<(CanKind, CanId), SimCan>,
    motor_outputs: HashMap<CanId, f64>,
    update_frequencies: HashMap<CanId, f64>,
    songs: HashMap<CanId, SimSongState>,
    orchestra_fault: Option<PhoenixStatus>,
}

impl Default for SimBus {
    fn default() -> Self {
        Self {
            time_us: 0,
            last_stamp: 0,
            robot_state: RunningRobotState::Disabled,
            digital_inputs: HashMap::new(),
            digital_outputs: HashMap::new(),
            analog_inputs: HashMap::new(),
            analog_outputs: HashMap::new(),
            pwm_outputs: HashMap::new(),
            rejected: HashSet::new(),
            write_faults: HashSet::new(),
            hids: HashMap::new(),
            can: HashMap::new(),
            motor_outputs: HashMap::new(),
            update_frequencies: HashMap::new(),
            songs: HashMap::new(),
            orchestra_fault: None,
        }
    }
}

impl SimBus {
    /// Receive timestamp for a freshly pushed sample. Strictly increasing
    /// even when the clock has not moved.
    fn stamp(&mut self) -> u64 {
        let stamp = self.time_us.max(self.last_stamp + 1);
        self.last_stamp = stamp;
        stamp
    }

    fn allocate(&self, channel: SimChannel) -> Result<(), VendorFault> {
        if self.rejected.contains(&channel) {
            Err(VendorFault::Allocation(format!("{channel:?} is reserved")))
        } else {
            Ok(())
        }
    }

    fn write(&self, channel: SimChannel) -> Result<(), VendorFault> {
        if self.write_faults.contains(&channel) {
            Err(VendorFault::Write(format!("{channel:?} write rejected")))
        } else {
            Ok(())
        }
    }

    fn can_present(&self, kind: CanKind, id: CanId) -> bool {
        self.can.get(&(kind, id)).is_some_and(|d| d.present)
    }
}

#[derive(Clone, Default)]
struct Shared(Arc<Mutex<SimBus>>);

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SimBus> {
        // A panicking test thread must not take the rest of the suite down.
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Declares which CAN devices and joysticks are attached before the
/// simulator starts.
#[derive(Default)]
pub struct SimHardwareBuilder {
    bus: SimBus,
}

impl SimHardwareBuilder {
    fn with_can(mut self, kind: CanKind, id: CanId) -> Self {
        self.bus.can.insert((kind, id), SimCan::new());
        self
    }

    pub fn with_neo(self, id: CanId) -> Self {
        self.with_can(CanKind::Neo, id)
    }

    pub fn with_talon(self, id: CanId) -> Self {
        self.with_can(CanKind::Talon, id)
    }

    pub fn with_cancoder(self, id: CanId) -> Self {
        self.with_can(CanKind::CanCoder, id)
    }

    pub fn with_pigeon(self, id: CanId) -> Self {
        self.with_can(CanKind::Pigeon, id)
    }

    /// Attach a joystick with `axes` centered axes and `buttons` released
    /// buttons.
    pub fn with_hid(mut self, slot: HidSlot, axes: usize, buttons: usize) -> Self {
        self.bus.hids.insert(
            slot,
            HidValue {
                axis_count: axes,
                button_count: buttons,
                axis_values: vec![0.0; axes],
                button_values: vec![false; buttons],
            },
        );
        self
    }

    pub fn with_robot_state(mut self, state: RunningRobotState) -> Self {
        self.bus.robot_state = state;
        self
    }

    pub fn build(self) -> SimHardware {
        SimHardware {
            shared: Shared(Arc::new(Mutex::new(self.bus))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SimHardware
// ─────────────────────────────────────────────────────────────────────────────

/// Simulated controller. Cheap to clone; clones observe the same bus.
#[derive(Clone, Default)]
pub struct SimHardware {
    shared: Shared,
}

impl SimHardware {
    /// A controller with nothing on the CAN bus and no joysticks.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> SimHardwareBuilder {
        SimHardwareBuilder::default()
    }

    // ── clock and driver station ────────────────────────────────────────────

    pub fn set_time_micros(&self, micros: u64) {
        self.shared.lock().time_us = micros;
    }

    pub fn advance(&self, by: Duration) {
        let mut bus = self.shared.lock();
        bus.time_us += by.as_micros() as u64;
    }

    pub fn set_robot_state(&self, state: RunningRobotState) {
        self.shared.lock().robot_state = state;
    }

    // ── onboard I/O ─────────────────────────────────────────────────────────

    pub fn set_digital_input(&self, port: DigitalPort, high: bool) {
        self.shared.lock().digital_inputs.insert(port, high);
    }

    pub fn digital_output(&self, port: DigitalPort) -> Option<bool> {
        self.shared.lock().digital_outputs.get(&port).copied()
    }

    /// Set both the instantaneous and the averaged voltage.
    pub fn set_analog_input(&self, port: AnalogPort, volts: f64) {
        self.shared.lock().analog_inputs.insert(port, (volts, volts));
    }

    pub fn set_analog_average(&self, port: AnalogPort, volts: f64) {
        let mut bus = self.shared.lock();
        let entry = bus.analog_inputs.entry(port).or_insert((0.0, 0.0));
        entry.1 = volts;
    }

    pub fn analog_output(&self, port: AnalogPort) -> Option<f64> {
        self.shared.lock().analog_outputs.get(&port).copied()
    }

    pub fn pwm_output(&self, port: PwmPort) -> Option<f64> {
        self.shared.lock().pwm_outputs.get(&port).copied()
    }

    /// Make the HAL refuse to allocate `channel`.
    pub fn reject_allocation(&self, channel: SimChannel) {
        self.shared.lock().rejected.insert(channel);
    }

    /// Make every write to `channel` fail.
    pub fn fail_writes(&self, channel: SimChannel) {
        self.shared.lock().write_faults.insert(channel);
    }

    // ── joysticks ───────────────────────────────────────────────────────────

    pub fn set_hid_axis(&self, slot: HidSlot, axis: usize, value: f64) {
        if let Some(v) = self
            .shared
            .lock()
            .hids
            .get_mut(&slot)
            .and_then(|hid| hid.axis_values.get_mut(axis))
        {
            *v = value;
        }
    }

    /// Press or release the 1-based `button`.
    pub fn set_hid_button(&self, slot: HidSlot, button: usize, pressed: bool) {
        let mut bus = self.shared.lock();
        let Some(hid) = bus.hids.get_mut(&slot) else {
            return;
        };
        if let Some(b) = button
            .checked_sub(1)
            .and_then(|i| hid.button_values.get_mut(i))
        {
            *b = pressed;
        }
    }

    // ── CAN bus ─────────────────────────────────────────────────────────────

    /// Last duty cycle commanded to the motor with `id`, whichever vendor.
    pub fn motor_output(&self, id: CanId) -> Option<f64> {
        self.shared.lock().motor_outputs.get(&id).copied()
    }

    pub fn update_frequency(&self, id: CanId) -> Option<f64> {
        self.shared.lock().update_frequencies.get(&id).copied()
    }

    pub fn set_neo_status(&self, id: CanId, status: RevStatus) {
        if let Some(device) = self.shared.lock().can.get_mut(&(CanKind::Neo, id)) {
            device.rev_status = status;
        }
    }

    /// Pull every device with `id` off the bus.
    pub fn disconnect_can(&self, id: CanId) {
        for ((_, device_id), device) in self.shared.lock().can.iter_mut() {
            if *device_id == id {
                device.present = false;
            }
        }
    }

    /// Publish a fresh TalonFX sample (rotations, rotations/s).
    pub fn push_motor_sample(&self, id: CanId, position: f64, velocity: f64) {
        let mut bus = self.shared.lock();
        let stamp = bus.stamp();
        if let Some(device) = bus.can.get_mut(&(CanKind::Talon, id)) {
            device.motor = MotorSnapshot {
                position: SignalValue::new(position, stamp, PhoenixStatus::Ok),
                velocity: SignalValue::new(velocity, stamp, PhoenixStatus::Ok),
            };
        }
    }

    /// Publish a fresh CANcoder sample (rotations, rotations/s).
    pub fn push_encoder_sample(&self, id: CanId, absolute: f64, relative: f64, velocity: f64) {
        let mut bus = self.shared.lock();
        let stamp = bus.stamp();
        if let Some(device) = bus.can.get_mut(&(CanKind::CanCoder, id)) {
            device.encoder = EncoderSnapshot {
                absolute_position: SignalValue::new(absolute, stamp, PhoenixStatus::Ok),
                relative_position: SignalValue::new(relative, stamp, PhoenixStatus::Ok),
                velocity: SignalValue::new(velocity, stamp, PhoenixStatus::Ok),
            };
        }
    }

    /// Publish a fresh Pigeon 2 sample: `[yaw, pitch, roll]` in degrees and
    /// `[yaw, pitch, roll]` rates in degrees/s.
    pub fn push_gyro_sample(&self, id: CanId, orientation: [f64; 3], rates: [f64; 3]) {
        let mut bus = self.shared.lock();
        let stamp = bus.stamp();
        if let Some(device) = bus.can.get_mut(&(CanKind::Pigeon, id)) {
            let s = |v| SignalValue::new(v, stamp, PhoenixStatus::Ok);
            device.gyro = GyroSnapshot {
                yaw: s(orientation[0]),
                pitch: s(orientation[1]),
                roll: s(orientation[2]),
                yaw_rate: s(rates[0]),
                pitch_rate: s(rates[1]),
                roll_rate: s(rates[2]),
            };
        }
    }

    /// Make the next orchestra load fail with `status`.
    pub fn fail_orchestra(&self, status: PhoenixStatus) {
        self.shared.lock().orchestra_fault = Some(status);
    }

    pub fn song_state(&self, motor: CanId) -> Option<SimSongState> {
        self.shared.lock().songs.get(&motor).cloned()
    }
}

impl Hardware for SimHardware {
    fn now_micros(&self) -> u64 {
        self.shared.lock().time_us
    }

    fn robot_state(&self) -> RunningRobotState {
        self.shared.lock().robot_state
    }

    fn open_digital_input(&self, port: DigitalPort) -> Result<Arc<dyn DigitalInput>, VendorFault> {
        self.shared.lock().allocate(SimChannel::Digital(port))?;
        Ok(Arc::new(SimDigital {
            port,
            shared: self.shared.clone(),
        }))
    }

    fn open_digital_output(
        &self,
        port: DigitalPort,
    ) -> Result<Arc<dyn DigitalOutput>, VendorFault> {
        self.shared.lock().allocate(SimChannel::Digital(port))?;
        Ok(Arc::new(SimDigital {
            port,
            shared: self.shared.clone(),
        }))
    }

    fn open_analog_input(&self, port: AnalogPort) -> Result<Arc<dyn AnalogInput>, VendorFault> {
        self.shared.lock().allocate(SimChannel::Analog(port))?;
        Ok(Arc::new(SimAnalog {
            port,
            shared: self.shared.clone(),
        }))
    }

    fn open_analog_output(&self, port: AnalogPort) -> Result<Arc<dyn AnalogOutput>, VendorFault> {
        self.shared.lock().allocate(SimChannel::Analog(port))?;
        Ok(Arc::new(SimAnalog {
            port,
            shared: self.shared.clone(),
        }))
    }

    fn open_pwm_output(&self, port: PwmPort) -> Result<Arc<dyn PwmOutput>, VendorFault> {
        self.shared.lock().allocate(SimChannel::Pwm(port))?;
        Ok(Arc::new(SimPwm {
            port,
            shared: self.shared.clone(),
        }))
    }

    fn open_hid(&self, slot: HidSlot) -> Arc<dyn HidDevice> {
        Arc::new(SimHid {
            slot,
            shared: self.shared.clone(),
        })
    }

    fn open_neo(&self, id: CanId) -> Result<Arc<dyn NeoMotor>, VendorFault> {
        Ok(Arc::new(SimCanHandle {
            id,
            kind: CanKind::Neo,
            shared: self.shared.clone(),
        }))
    }

    fn open_talon(&self, id: CanId) -> Result<Arc<dyn TalonMotor>, VendorFault> {
        Ok(Arc::new(SimCanHandle {
            id,
            kind: CanKind::Talon,
            shared: self.shared.clone(),
        }))
    }

    fn open_cancoder(&self, id: CanId) -> Result<Arc<dyn CanCoder>, VendorFault> {
        Ok(Arc::new(SimCanHandle {
            id,
            kind: CanKind::CanCoder,
            shared: self.shared.clone(),
        }))
    }

    fn open_pigeon(&self, id: CanId) -> Result<Arc<dyn Pigeon>, VendorFault> {
        Ok(Arc::new(SimCanHandle {
            id,
            kind: CanKind::Pigeon,
            shared: self.shared.clone(),
        }))
    }

    fn load_orchestra(
        &self,
        motor: &Arc<dyn TalonMotor>,
        song: &Path,
    ) -> Result<Arc<dyn Orchestra>, VendorFault> {
        let mut bus = self.shared.lock();
        if let Some(status) = bus.orchestra_fault.take() {
            return Err(VendorFault::Phoenix(status));
        }
        if !song.is_file() {
            return Err(VendorFault::Phoenix(PhoenixStatus::CouldNotLoadMusic));
        }
        let motor_id = motor.can_id();
        bus.songs.insert(
            motor_id,
            SimSongState {
                song: song.to_path_buf(),
                playing: false,
                closed: false,
            },
        );
        Ok(Arc::new(SimOrchestra {
            motor: motor_id,
            shared: self.shared.clone(),
        }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Device handles
// ─────────────────────────────────────────────────────────────────────────────

struct SimDigital {
    port: DigitalPort,
    shared: Shared,
}

impl DigitalInput for SimDigital {
    fn port(&self) -> DigitalPort {
        self.port
    }

    fn get(&self) -> bool {
        self.shared
            .lock()
            .digital_inputs
            .get(&self.port)
            .copied()
            .unwrap_or(true)
    }
}

impl DigitalOutput for SimDigital {
    fn port(&self) -> DigitalPort {
        self.port
    }

    fn set(&self, high: bool) -> Result<(), VendorFault> {
        let mut bus = self.shared.lock();
        bus.write(SimChannel::Digital(self.port))?;
        bus.digital_outputs.insert(self.port, high);
        Ok(())
    }
}

struct SimAnalog {
    port: AnalogPort,
    shared: Shared,
}

impl AnalogInput for SimAnalog {
    fn port(&self) -> AnalogPort {
        self.port
    }

    fn voltage(&self) -> f64 {
        self.shared
            .lock()
            .analog_inputs
            .get(&self.port)
            .map_or(0.0, |(instant, _)| *instant)
    }

    fn average_voltage(&self) -> f64 {
        self.shared
            .lock()
            .analog_inputs
            .get(&self.port)
            .map_or(0.0, |(_, average)| *average)
    }
}

impl AnalogOutput for SimAnalog {
    fn port(&self) -> AnalogPort {
        self.port
    }

    fn set_voltage(&self, volts: f64) -> Result<(), VendorFault> {
        let mut bus = self.shared.lock();
        bus.write(SimChannel::Analog(self.port))?;
        bus.analog_outputs.insert(self.port, volts);
        Ok(())
    }
}

struct SimPwm {
    port: PwmPort,
    shared: Shared,
}

impl PwmOutput for SimPwm {
    fn port(&self) -> PwmPort {
        self.port
    }

    fn set(&self, value: f64) -> Result<(), VendorFault> {
        let mut bus = self.shared.lock();
        bus.write(SimChannel::Pwm(self.port))?;
        bus.pwm_outputs.insert(self.port, value.clamp(-1.0, 1.0));
        Ok(())
    }
}

struct SimHid {
    slot: HidSlot,
    shared: Shared,
}

impl SimHid {
    fn with<T>(&self, read: impl FnOnce(&HidValue) -> T, missing: T) -> T {
        self.shared.lock().hids.get(&self.slot).map_or(missing, read)
    }
}

impl HidDevice for SimHid {
    fn slot(&self) -> HidSlot {
        self.slot
    }

    fn axis_count(&self) -> usize {
        self.with(|h| h.axis_count, 0)
    }

    fn button_count(&self) -> usize {
        self.with(|h| h.button_count, 0)
    }

    fn raw_axis(&self, axis: usize) -> f64 {
        self.with(|h| h.axis(axis).unwrap_or(0.0), 0.0)
    }

    fn raw_button(&self, button: usize) -> bool {
        self.with(
            |h| {
                button
                    .checked_sub(1)
                    .and_then(|i| h.button_values.get(i).copied())
                    .unwrap_or(false)
            },
            false,
        )
    }
}

struct SimCanHandle {
    id: CanId,
    kind: CanKind,
    shared: Shared,
}

impl SimCanHandle {
    /// Read from the device, or report a timed-out zero sample when it is
    /// not on the bus.
    fn signal(&self, read: impl FnOnce(&SimCan) -> SignalValue) -> SignalValue {
        let bus = self.shared.lock();
        match bus.can.get(&(self.kind, self.id)) {
            Some(device) if device.present => read(device),
            Some(device) => SignalValue {
                status: PhoenixStatus::RxTimeout,
                ..read(device)
            },
            None => SignalValue::new(0.0, 0, PhoenixStatus::RxTimeout),
        }
    }

    fn present(&self) -> bool {
        self.shared.lock().can_present(self.kind, self.id)
    }
}

impl PhoenixDevice for SimCanHandle {
    fn can_id(&self) -> CanId {
        self.id
    }

    fn wait_for_status(&self, _timeout: Duration) -> PhoenixStatus {
        if self.present() {
            PhoenixStatus::Ok
        } else {
            PhoenixStatus::RxTimeout
        }
    }

    fn set_update_frequency(&self, hz: f64) -> PhoenixStatus {
        let mut bus = self.shared.lock();
        if !bus.can_present(self.kind, self.id) {
            return PhoenixStatus::EcuIsNotPresent;
        }
        bus.update_frequencies.insert(self.id, hz);
        PhoenixStatus::Ok
    }
}

impl TalonMotor for SimCanHandle {
    fn set(&self, output: f64) -> PhoenixStatus {
        let mut bus = self.shared.lock();
        if !bus.can_present(self.kind, self.id) {
            return PhoenixStatus::EcuIsNotPresent;
        }
        bus.motor_outputs.insert(self.id, output.clamp(-1.0, 1.0));
        PhoenixStatus::Ok
    }

    fn position(&self) -> SignalValue {
        self.signal(|d| d.motor.position)
    }

    fn velocity(&self) -> SignalValue {
        self.signal(|d| d.motor.velocity)
    }
}

impl CanCoder for SimCanHandle {
    fn absolute_position(&self) -> SignalValue {
        self.signal(|d| d.encoder.absolute_position)
    }

    fn position_since_boot(&self) -> SignalValue {
        self.signal(|d| d.encoder.relative_position)
    }

    fn velocity(&self) -> SignalValue {
        self.signal(|d| d.encoder.velocity)
    }
}

impl Pigeon for SimCanHandle {
    fn yaw(&self) -> SignalValue {
        self.signal(|d| d.gyro.yaw)
    }

    fn pitch(&self) -> SignalValue {
        self.signal(|d| d.gyro.pitch)
    }

    fn roll(&self) -> SignalValue {
        self.signal(|d| d.gyro.roll)
    }

    fn angular_velocity_x_world(&self) -> SignalValue {
        self.signal(|d| d.gyro.roll_rate)
    }

    fn angular_velocity_y_world(&self) -> SignalValue {
        self.signal(|d| d.gyro.pitch_rate)
    }

    fn angular_velocity_z_world(&self) -> SignalValue {
        self.signal(|d| d.gyro.yaw_rate)
    }
}

impl NeoMotor for SimCanHandle {
    fn can_id(&self) -> CanId {
        self.id
    }

    fn last_error(&self) -> RevStatus {
        let bus = self.shared.lock();
        match bus.can.get(&(CanKind::Neo, self.id)) {
            Some(device) if device.present => device.rev_status,
            _ => RevStatus::CanDisconnected,
        }
    }

    fn firmware_string(&self) -> String {
        if self.present() {
            "25.0.3".to_string()
        } else {
            String::new()
        }
    }

    fn set(&self, output: f64) -> RevStatus {
        let mut bus = self.shared.lock();
        if !bus.can_present(CanKind::Neo, self.id) {
            return RevStatus::CanDisconnected;
        }
        bus.motor_outputs.insert(self.id, output.clamp(-1.0, 1.0));
        RevStatus::Ok
    }
}

struct SimOrchestra {
    motor: CanId,
    shared: Shared,
}

impl SimOrchestra {
    fn update(&self, apply: impl FnOnce(&mut SimSongState) -> PhoenixStatus) -> PhoenixStatus {
        match self.shared.lock().songs.get_mut(&self.motor) {
            Some(song) if !song.closed => apply(song),
            _ => PhoenixStatus::InvalidParamValue,
        }
    }
}

impl Orchestra for SimOrchestra {
    fn play(&self) -> PhoenixStatus {
        self.update(|song| {
            song.playing = true;
            PhoenixStatus::Ok
        })
    }

    fn stop(&self) -> PhoenixStatus {
        self.update(|song| {
            song.playing = false;
            PhoenixStatus::Ok
        })
    }

    fn is_playing(&self) -> bool {
        self.shared
            .lock()
            .songs
            .get(&self.motor)
            .is_some_and(|song| song.playing && !song.closed)
    }

    fn close(&self) {
        if let Some(song) = self.shared.lock().songs.get_mut(&self.motor) {
            song.playing = false;
            song.closed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digital_input_defaults_high_and_follows_script() {
        let sim = SimHardware::new();
        let input = sim.open_digital_input(DigitalPort::One).unwrap();
        assert!(input.get());
        sim.set_digital_input(DigitalPort::One, false);
        assert!(!input.get());
    }

    #[test]
    fn rejected_allocation_reports_fault() {
        let sim = SimHardware::new();
        sim.reject_allocation(SimChannel::Pwm(PwmPort::Four));
        let result = sim.open_pwm_output(PwmPort::Four);
        assert!(matches!(result, Err(VendorFault::Allocation(_))));
        assert!(sim.open_pwm_output(PwmPort::Five).is_ok());
    }

    #[test]
    fn write_fault_leaves_output_untouched() {
        let sim = SimHardware::new();
        let out = sim.open_analog_output(AnalogPort::Two).unwrap();
        out.set_voltage(1.5).unwrap();
        sim.fail_writes(SimChannel::Analog(AnalogPort::Two));
        assert!(out.set_voltage(4.0).is_err());
        assert_eq!(sim.analog_output(AnalogPort::Two), Some(1.5));
    }

    #[test]
    fn absent_can_device_times_out() {
        let sim = SimHardware::builder().with_talon(1).build();
        let present = sim.open_talon(1).unwrap();
        let absent = sim.open_talon(2).unwrap();
        assert_eq!(
            present.wait_for_status(Duration::from_millis(10)),
            PhoenixStatus::Ok
        );
        assert_eq!(
            absent.wait_for_status(Duration::from_millis(10)),
            PhoenixStatus::RxTimeout
        );
        assert_eq!(absent.position().status, PhoenixStatus::RxTimeout);
    }

    #[test]
    fn neo_reports_disconnect_after_removal() {
        let sim = SimHardware::builder().with_neo(7).build();
        let neo = sim.open_neo(7).unwrap();
        assert_eq!(neo.last_error(), RevStatus::Ok);
        assert!(!neo.firmware_string().is_empty());
        sim.disconnect_can(7);
        assert_eq!(neo.last_error(), RevStatus::CanDisconnected);
        assert_eq!(neo.set(0.5), RevStatus::CanDisconnected);
    }

    #[test]
    fn pushed_samples_get_increasing_timestamps() {
        let sim = SimHardware::builder().with_cancoder(9).build();
        let encoder = sim.open_cancoder(9).unwrap();
        sim.push_encoder_sample(9, 0.25, 1.0, 0.0);
        let first = encoder.absolute_position();
        // Same value, clock not advanced: still a new sample.
        sim.push_encoder_sample(9, 0.25, 1.0, 0.0);
        let second = encoder.absolute_position();
        assert_eq!(first.value, second.value);
        assert!(second.timestamp > first.timestamp);
    }

    #[test]
    fn hid_reads_scripted_values() {
        let sim = SimHardware::builder().with_hid(0, 2, 4).build();
        let pad = sim.open_hid(0);
        sim.set_hid_axis(0, 1, -0.75);
        sim.set_hid_button(0, 4, true);
        assert_eq!(pad.axis_count(), 2);
        assert_eq!(pad.raw_axis(1), -0.75);
        assert!(pad.raw_button(4));
        assert!(!pad.raw_button(1));

        let missing = sim.open_hid(3);
        assert_eq!(missing.button_count(), 0);
    }

    #[test]
    fn orchestra_lifecycle_is_tracked() {
        let dir = std::env::temp_dir().join(format!("teaforge-sim-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let song = dir.join("song.chrp");
        std::fs::write(&song, b"chrp").unwrap();

        let sim = SimHardware::builder().with_talon(4).build();
        let motor = sim.open_talon(4).unwrap();
        let orchestra = sim.load_orchestra(&motor, &song).unwrap();
        assert_eq!(orchestra.play(), PhoenixStatus::Ok);
        assert!(orchestra.is_playing());
        assert_eq!(orchestra.stop(), PhoenixStatus::Ok);
        orchestra.close();
        assert!(sim.song_state(4).unwrap().closed);
        assert_eq!(orchestra.play(), PhoenixStatus::InvalidParamValue);

        std::fs::remove_dir_all(&dir).ok();
    }
}
