//! Effect interpreter.
//!
//! [`apply`] consumes the platform state and one effect, performs the effect
//! synchronously and hands the state back together with the message the
//! effect's callback produced. Every failure is normalized before it reaches
//! the callback; nothing escapes as a panic or a raw vendor error.

use std::fs;
use std::path::Path;

use teaforge_hal::{AnalogOutput, DigitalOutput, NeoMotor, PhoenixDevice, PwmOutput, TalonMotor};
use teaforge_net::{PortForward, WebSocketSession};
use teaforge_types::{
    AnalogPort, CanId, DigitalPort, DigitalState, HID_SLOT_COUNT, HidSlot, PhoenixStatus,
    PlatformError, PwmPort, RevStatus,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::effect::{CanDeviceKind, Effect, Outcome};
use crate::normalize;
use crate::registry::{ResourceKey, ResourceToken};
use crate::state::{PlatformState, end_song_session};
use crate::token::{
    AnalogInputToken, AnalogOutputToken, CanDeviceToken, CanMotorToken, DigitalInputToken,
    DigitalOutputToken, EncoderToken, GyroToken, HidInputToken, NeoMotorToken, OrchestraToken,
    PwmOutputToken, TalonMotorToken, WebSocketToken,
};

/// Apply one effect.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use teaforge_hal::SimHardware;
/// use teaforge_kernel::{Effect, PlatformSettings, PlatformState, apply};
/// use teaforge_net::NetworkRuntime;
/// use teaforge_types::{DigitalPort, PlatformError};
///
/// let state = PlatformState::new(
///     Arc::new(SimHardware::new()),
///     NetworkRuntime::new(1).unwrap(),
///     PlatformSettings::default(),
/// );
/// let (state, first) = apply(state, Effect::init_digital_input(DigitalPort::One, |r| r.is_ok()));
/// let (state, second) = apply(state, Effect::init_digital_input(DigitalPort::One, |r| r.err()));
/// assert_eq!(first, Some(true));
/// assert_eq!(second, Some(Some(PlatformError::AlreadyInitialized)));
/// state.shutdown();
/// ```
pub fn apply<M>(mut state: PlatformState, effect: Effect<M>) -> (PlatformState, Option<M>) {
    let name = effect.name();
    debug!(effect = ?effect, "applying effect");
    let message = match effect {
        Effect::Log(text) => {
            log_line(&state, &text);
            None
        }
        Effect::InitDigitalInput { port, on_result } => {
            Some(on_result(report(name, init_digital_input(&mut state, port))))
        }
        Effect::InitDigitalOutput {
            port,
            initial,
            on_result,
        } => Some(on_result(report(
            name,
            init_digital_output(&mut state, port, initial),
        ))),
        Effect::InitAnalogInput { port, on_result } => {
            Some(on_result(report(name, init_analog_input(&mut state, port))))
        }
        Effect::InitAnalogOutput {
            port,
            initial,
            on_result,
        } => Some(on_result(report(
            name,
            init_analog_output(&mut state, port, initial),
        ))),
        Effect::InitPwmOutput {
            port,
            initial,
            on_result,
        } => Some(on_result(report(
            name,
            init_pwm_output(&mut state, port, initial),
        ))),
        Effect::InitHidInput { slot, on_result } => {
            Some(on_result(report(name, init_hid_input(&mut state, slot))))
        }
        Effect::InitCanDevice {
            kind,
            id,
            on_result,
        } => Some(on_result(report(name, init_can_device(&mut state, kind, id)))),
        Effect::InitWebSocket { url, on_result } => {
            Some(on_result(report(name, init_websocket(&mut state, &url))))
        }
        Effect::SetDigitalPortState {
            token,
            state: level,
            on_result,
        } => Some(on_result(report(
            name,
            set_digital_port_state(&state, &token, level),
        ))),
        Effect::SetAnalogPortVoltage {
            token,
            volts,
            on_result,
        } => Some(on_result(report(
            name,
            set_analog_port_voltage(&state, &token, volts),
        ))),
        Effect::SetPwmValue {
            token,
            value,
            on_result,
        } => Some(on_result(report(name, set_pwm_value(&state, &token, value)))),
        Effect::SetCanMotorSpeed {
            token,
            value,
            on_result,
        } => Some(on_result(report(
            name,
            set_can_motor_speed(&state, &token, value),
        ))),
        Effect::ForwardPort {
            local_port,
            remote_host,
            remote_port,
            on_result,
        } => Some(on_result(report(
            name,
            forward_port(&mut state, local_port, &remote_host, remote_port),
        ))),
        Effect::LoadSong {
            motor,
            song,
            on_result,
        } => Some(on_result(report(name, load_song(&mut state, &motor, &song)))),
        Effect::PlaySong { session, on_result } => {
            Some(on_result(report(name, play_song(&mut state, &session))))
        }
        Effect::StopSong { session, on_result } => {
            Some(on_result(report(name, stop_song(&mut state, &session))))
        }
        Effect::ReadFile { path, on_result } => Some(on_result(report(name, read_file(&path)))),
    };
    (state, message)
}

/// Apply `effects` in order, folding the state through each call.
pub fn apply_all<M>(
    state: PlatformState,
    effects: impl IntoIterator<Item = Effect<M>>,
) -> (PlatformState, Vec<M>) {
    let mut messages = Vec::new();
    let state = effects.into_iter().fold(state, |state, effect| {
        let (state, message) = apply(state, effect);
        messages.extend(message);
        state
    });
    (state, messages)
}

fn report<T>(effect: &'static str, outcome: Outcome<T>) -> Outcome<T> {
    if let Err(e) = &outcome {
        warn!(effect, error = %e, "effect failed");
    }
    outcome
}

// ── log ─────────────────────────────────────────────────────────────────────

/// `[HH:MM:SS:mmm]` of controller uptime.
pub(crate) fn format_timestamp(micros: u64) -> String {
    let millis = (micros / 1_000) % 1_000;
    let seconds = (micros / 1_000_000) % 60;
    let minutes = (micros / 60_000_000) % 60;
    let hours = micros / 3_600_000_000;
    format!("[{hours:02}:{minutes:02}:{seconds:02}:{millis:03}]")
}

fn log_line(state: &PlatformState, text: &str) {
    let stamp = format_timestamp(state.hardware.now_micros());
    info!(target: "teaforge::program", "{stamp} {text}");
}

// ── initialization ──────────────────────────────────────────────────────────

fn ensure_free(state: &PlatformState, key: &ResourceKey) -> Result<(), PlatformError> {
    if state.registry.contains(key) {
        Err(PlatformError::AlreadyInitialized)
    } else {
        Ok(())
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn init_digital_input(state: &mut PlatformState, port: DigitalPort) -> Outcome<DigitalInputToken> {
    ensure_free(state, &ResourceKey::DigitalInput(port))?;
    if state.registry.contains(&ResourceKey::DigitalOutput(port)) {
        return Err(PlatformError::DigitalPortError {
            port,
            details: "already configured as an output".into(),
        });
    }
    let handle = state
        .hardware
        .open_digital_input(port)
        .map_err(|f| normalize::digital(port, f))?;
    let token = DigitalInputToken::new(port, handle);
    state
        .registry
        .register(ResourceToken::DigitalInput(token.clone()))?;
    info!(%port, "digital input initialized");
    Ok(token)
}

fn init_digital_output(
    state: &mut PlatformState,
    port: DigitalPort,
    initial: DigitalState,
) -> Outcome<DigitalOutputToken> {
    ensure_free(state, &ResourceKey::DigitalOutput(port))?;
    if state.registry.contains(&ResourceKey::DigitalInput(port)) {
        return Err(PlatformError::DigitalPortError {
            port,
            details: "already configured as an input".into(),
        });
    }
    let handle = state
        .hardware
        .open_digital_output(port)
        .map_err(|f| normalize::digital(port, f))?;
    handle
        .set(initial.is_high())
        .map_err(|f| normalize::digital(port, f))?;
    let token = DigitalOutputToken::new(port, handle);
    state
        .registry
        .register(ResourceToken::DigitalOutput(token.clone()))?;
    info!(%port, ?initial, "digital output initialized");
    Ok(token)
}

fn init_analog_input(state: &mut PlatformState, port: AnalogPort) -> Outcome<AnalogInputToken> {
    ensure_free(state, &ResourceKey::AnalogInput(port))?;
    let handle = state
        .hardware
        .open_analog_input(port)
        .map_err(|f| normalize::analog(port, f))?;
    let token = AnalogInputToken::new(port, handle);
    state
        .registry
        .register(ResourceToken::AnalogInput(token.clone()))?;
    info!(%port, "analog input initialized");
    Ok(token)
}

fn init_analog_output(
    state: &mut PlatformState,
    port: AnalogPort,
    initial: f64,
) -> Outcome<AnalogOutputToken> {
    ensure_free(state, &ResourceKey::AnalogOutput(port))?;
    let volts = finite(initial).ok_or_else(|| PlatformError::AnalogPortError {
        port,
        details: format!("initial voltage {initial} is not a finite number"),
    })?;
    let handle = state
        .hardware
        .open_analog_output(port)
        .map_err(|f| normalize::analog(port, f))?;
    handle
        .set_voltage(volts)
        .map_err(|f| normalize::analog(port, f))?;
    let token = AnalogOutputToken::new(port, handle);
    state
        .registry
        .register(ResourceToken::AnalogOutput(token.clone()))?;
    info!(%port, volts, "analog output initialized");
    Ok(token)
}

fn init_pwm_output(state: &mut PlatformState, port: PwmPort, initial: f64) -> Outcome<PwmOutputToken> {
    ensure_free(state, &ResourceKey::PwmOutput(port))?;
    let value = finite(initial).ok_or_else(|| PlatformError::PwmPortError {
        port,
        details: format!("initial value {initial} is not a finite number"),
    })?;
    let handle = state
        .hardware
        .open_pwm_output(port)
        .map_err(|f| normalize::pwm(port, f))?;
    handle.set(value).map_err(|f| normalize::pwm(port, f))?;
    let token = PwmOutputToken::new(port, handle);
    state
        .registry
        .register(ResourceToken::PwmOutput(token.clone()))?;
    info!(%port, value, "PWM output initialized");
    Ok(token)
}

fn init_hid_input(state: &mut PlatformState, slot: HidSlot) -> Outcome<HidInputToken> {
    if slot >= HID_SLOT_COUNT {
        return Err(PlatformError::PortInitializationError {
            details: format!("HID slot {slot} is outside 0..{HID_SLOT_COUNT}"),
        });
    }
    ensure_free(state, &ResourceKey::HidInput(slot))?;
    let token = HidInputToken::new(slot);
    state.registry.register(ResourceToken::HidInput(token))?;
    info!(slot, "HID input initialized");
    Ok(token)
}

fn can_key(kind: CanDeviceKind, id: CanId) -> ResourceKey {
    match kind {
        CanDeviceKind::Neo | CanDeviceKind::Talon => ResourceKey::CanMotor(id),
        CanDeviceKind::Encoder => ResourceKey::CanEncoder(id),
        CanDeviceKind::Pigeon => ResourceKey::CanGyro(id),
    }
}

/// Allocate and probe a CAN device. Phoenix devices must answer a status
/// refresh within the configured bound; a SPARK MAX must report no latched
/// error and a firmware version.
fn init_can_device(
    state: &mut PlatformState,
    kind: CanDeviceKind,
    id: CanId,
) -> Outcome<CanDeviceToken> {
    ensure_free(state, &can_key(kind, id))?;
    let timeout = state.settings.can_probe_timeout;
    let hardware = &state.hardware;
    let token = match kind {
        CanDeviceKind::Neo => {
            let handle = hardware.open_neo(id).map_err(|f| normalize::can(id, f))?;
            normalize::rev(id, handle.last_error())?;
            if handle.firmware_string().is_empty() {
                return Err(PlatformError::RevError {
                    can_id: id,
                    status: RevStatus::CanDisconnected,
                });
            }
            CanDeviceToken::Motor(CanMotorToken::Neo(NeoMotorToken::new(id, handle)))
        }
        CanDeviceKind::Talon => {
            let handle = hardware.open_talon(id).map_err(|f| normalize::can(id, f))?;
            normalize::phoenix(id, handle.wait_for_status(timeout))?;
            CanDeviceToken::Motor(CanMotorToken::Talon(TalonMotorToken::new(id, handle)))
        }
        CanDeviceKind::Encoder => {
            let handle = hardware
                .open_cancoder(id)
                .map_err(|f| normalize::can(id, f))?;
            normalize::phoenix(id, handle.wait_for_status(timeout))?;
            CanDeviceToken::Encoder(EncoderToken::new(id, handle))
        }
        CanDeviceKind::Pigeon => {
            let handle = hardware.open_pigeon(id).map_err(|f| normalize::can(id, f))?;
            normalize::phoenix(id, handle.wait_for_status(timeout))?;
            CanDeviceToken::Gyro(GyroToken::new(id, handle))
        }
    };
    state
        .registry
        .register(ResourceToken::CanDevice(token.clone()))?;
    info!(can_id = id, ?kind, "CAN device initialized");
    Ok(token)
}

fn init_websocket(state: &mut PlatformState, url: &str) -> Outcome<WebSocketToken> {
    ensure_free(state, &ResourceKey::WebSocket(url.to_string()))?;
    let session =
        WebSocketSession::connect(&state.network, url, state.settings.websocket_connect_timeout)
            .map_err(|e| normalize::websocket(url, e))?;
    let token = WebSocketToken::new(session);
    state
        .registry
        .register(ResourceToken::WebSocket(token.clone()))?;
    info!(url, "websocket session opened");
    Ok(token)
}

// ── mutation ────────────────────────────────────────────────────────────────

fn set_digital_port_state(
    state: &PlatformState,
    token: &DigitalOutputToken,
    level: DigitalState,
) -> Outcome<DigitalPort> {
    let port = token.port();
    if !state.registry.holds(&ResourceKey::DigitalOutput(port), token.grant()) {
        return Err(PlatformError::DigitalPortError {
            port,
            details: "not initialized as an output".into(),
        });
    }
    token
        .handle()
        .set(level.is_high())
        .map_err(|f| normalize::digital(port, f))?;
    Ok(port)
}

fn set_analog_port_voltage(
    state: &PlatformState,
    token: &AnalogOutputToken,
    volts: f64,
) -> Outcome<AnalogPort> {
    let port = token.port();
    if !state.registry.holds(&ResourceKey::AnalogOutput(port), token.grant()) {
        return Err(PlatformError::AnalogPortError {
            port,
            details: "not initialized as an output".into(),
        });
    }
    let volts = finite(volts).ok_or_else(|| PlatformError::AnalogPortError {
        port,
        details: format!("voltage {volts} is not a finite number"),
    })?;
    token
        .handle()
        .set_voltage(volts)
        .map_err(|f| normalize::analog(port, f))?;
    Ok(port)
}

fn set_pwm_value(state: &PlatformState, token: &PwmOutputToken, value: f64) -> Outcome<PwmPort> {
    let port = token.port();
    if !state.registry.holds(&ResourceKey::PwmOutput(port), token.grant()) {
        return Err(PlatformError::PwmPortError {
            port,
            details: "not initialized".into(),
        });
    }
    let value = finite(value).ok_or_else(|| PlatformError::PwmPortError {
        port,
        details: format!("value {value} is not a finite number"),
    })?;
    token
        .handle()
        .set(value)
        .map_err(|f| normalize::pwm(port, f))?;
    Ok(port)
}

fn set_can_motor_speed(state: &PlatformState, token: &CanMotorToken, value: f64) -> Outcome<CanId> {
    let id = token.can_id();
    let live = state.registry.holds(&ResourceKey::CanMotor(id), token.grant());
    match token {
        CanMotorToken::Talon(talon) => {
            if !live {
                return Err(PlatformError::PhoenixError {
                    can_id: id,
                    status: PhoenixStatus::EcuIsNotPresent,
                });
            }
            let value = finite(value).ok_or(PlatformError::PhoenixError {
                can_id: id,
                status: PhoenixStatus::InvalidParamValue,
            })?;
            normalize::phoenix(id, talon.handle().set(value))?;
        }
        CanMotorToken::Neo(neo) => {
            if !live {
                return Err(PlatformError::RevError {
                    can_id: id,
                    status: RevStatus::CanDisconnected,
                });
            }
            let value = finite(value).ok_or(PlatformError::RevError {
                can_id: id,
                status: RevStatus::Error,
            })?;
            normalize::rev(id, neo.handle().set(value))?;
        }
    }
    Ok(id)
}

fn forward_port(
    state: &mut PlatformState,
    local_port: u16,
    remote_host: &str,
    remote_port: u16,
) -> Outcome<u16> {
    if local_port != 0 && state.forwards.contains_key(&local_port) {
        return Err(PlatformError::AlreadyInitialized);
    }
    let forward = PortForward::start(&state.network, local_port, remote_host, remote_port)
        .map_err(|e| normalize::forward(local_port, e))?;
    let bound = forward.local_port();
    state.forwards.insert(bound, forward);
    Ok(bound)
}

// ── song sessions ───────────────────────────────────────────────────────────

/// Write `song` to a fresh scratch file and bind an orchestra to `motor`.
/// A second load for a motor whose session is still open is refused.
fn load_song(
    state: &mut PlatformState,
    motor: &TalonMotorToken,
    song: &[u8],
) -> Outcome<OrchestraToken> {
    let id = motor.can_id();
    if !state.registry.holds(&ResourceKey::CanMotor(id), motor.grant()) {
        return Err(PlatformError::PhoenixError {
            can_id: id,
            status: PhoenixStatus::EcuIsNotPresent,
        });
    }
    ensure_free(state, &ResourceKey::Orchestra(id))?;

    let dir = state.settings.song_dir.as_path();
    fs::create_dir_all(dir).map_err(|e| normalize::write(dir, e))?;
    let path = dir.join(format!("{}.chrp", Uuid::new_v4()));
    fs::write(&path, song).map_err(|e| normalize::write(&path, e))?;

    let orchestra = match state.hardware.load_orchestra(motor.handle(), &path) {
        Ok(orchestra) => orchestra,
        Err(fault) => {
            remove_song_file(&path);
            return Err(normalize::can(id, fault));
        }
    };
    let token = OrchestraToken::new(id, path, orchestra);
    state
        .registry
        .register(ResourceToken::Orchestra(token.clone()))?;
    info!(motor = id, session = %token.session(), bytes = song.len(), "song loaded");
    Ok(token)
}

fn remove_song_file(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "could not delete song file");
    }
}

/// The registered session `session` refers to, if it is still that one.
fn live_session(state: &PlatformState, session: &OrchestraToken) -> Outcome<OrchestraToken> {
    match state
        .registry
        .lookup(&ResourceKey::Orchestra(session.motor()))
    {
        Some(ResourceToken::Orchestra(live)) if live.session() == session.session() => {
            Ok(live.clone())
        }
        _ => Err(PlatformError::SongNotLoaded),
    }
}

fn play_song(state: &mut PlatformState, session: &OrchestraToken) -> Outcome<()> {
    let live = live_session(state, session)?;
    normalize::phoenix(live.motor(), live.orchestra().play())?;
    state.playing.insert(live.motor());
    debug!(motor = live.motor(), "song playing");
    Ok(())
}

/// Stop, close and release the session. An idle session is released too,
/// but reported as [`PlatformError::SongNotPlaying`].
fn stop_song(state: &mut PlatformState, session: &OrchestraToken) -> Outcome<()> {
    let live = live_session(state, session)?;
    let motor = live.motor();
    let was_playing = state.playing.remove(&motor);
    let status = end_song_session(&live, was_playing);
    state.registry.release(&ResourceKey::Orchestra(motor));
    debug!(motor, was_playing, "song session released");
    match status {
        None => Err(PlatformError::SongNotPlaying),
        Some(status) => normalize::phoenix(motor, status),
    }
}

// ── files ───────────────────────────────────────────────────────────────────

fn read_file(path: &Path) -> Outcome<Vec<u8>> {
    if path.as_os_str().is_empty() {
        return Err(PlatformError::InvalidPath {
            path: String::new(),
            reason: "empty path".into(),
        });
    }
    fs::read(path).map_err(|e| normalize::read(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use teaforge_hal::SimHardware;
    use teaforge_hal::sim::SimChannel;
    use teaforge_net::NetworkRuntime;

    use crate::state::PlatformSettings;

    fn platform(sim: &SimHardware, song_dir: &Path) -> PlatformState {
        PlatformState::new(
            Arc::new(sim.clone()),
            NetworkRuntime::new(1).unwrap(),
            PlatformSettings {
                song_dir: song_dir.to_path_buf(),
                ..PlatformSettings::default()
            },
        )
    }

    fn run<T>(state: PlatformState, effect: Effect<Outcome<T>>) -> (PlatformState, Outcome<T>) {
        let (state, message) = apply(state, effect);
        (state, message.expect("effect resolved without a message"))
    }

    fn talon(state: PlatformState, id: CanId) -> (PlatformState, TalonMotorToken) {
        let (state, result) = run(state, Effect::init_can_device(CanDeviceKind::Talon, id, |r| r));
        match result.unwrap() {
            CanDeviceToken::Motor(CanMotorToken::Talon(token)) => (state, token),
            other => panic!("expected a Talon token, got {other:?}"),
        }
    }

    #[test]
    fn timestamp_format() {
        assert_eq!(format_timestamp(0), "[00:00:00:000]");
        assert_eq!(format_timestamp(3_723_004_000), "[01:02:03:004]");
    }

    #[test]
    fn log_produces_no_message() {
        let dir = tempfile::tempdir().unwrap();
        let state = platform(&SimHardware::new(), dir.path());
        let (state, message) = apply(state, Effect::<()>::log("autonomous start"));
        assert!(message.is_none());
        state.shutdown();
    }

    #[test]
    fn second_init_is_already_initialized() {
        let dir = tempfile::tempdir().unwrap();
        let sim = SimHardware::builder().with_talon(5).build();
        let state = platform(&sim, dir.path());

        let (state, first) = run(state, Effect::init_digital_input(DigitalPort::Zero, |r| r));
        assert!(first.is_ok());
        let (state, _) = talon(state, 5);
        let before = state.registry().len();

        let (state, second) = run(state, Effect::init_digital_input(DigitalPort::Zero, |r| r));
        assert_eq!(second.unwrap_err(), PlatformError::AlreadyInitialized);
        let (state, again) = run(state, Effect::init_can_device(CanDeviceKind::Talon, 5, |r| r));
        assert_eq!(again.unwrap_err(), PlatformError::AlreadyInitialized);
        assert_eq!(state.registry().len(), before);
        state.shutdown();
    }

    #[test]
    fn digital_output_writes_initial_and_later_states() {
        let dir = tempfile::tempdir().unwrap();
        let sim = SimHardware::new();
        let state = platform(&sim, dir.path());

        let (state, token) = run(
            state,
            Effect::init_digital_output(DigitalPort::Two, DigitalState::High, |r| r),
        );
        let token = token.unwrap();
        assert_eq!(sim.digital_output(DigitalPort::Two), Some(true));

        let (state, echoed) = run(
            state,
            Effect::set_digital_port_state(token, DigitalState::Low, |r| r),
        );
        assert_eq!(echoed.unwrap(), DigitalPort::Two);
        assert_eq!(sim.digital_output(DigitalPort::Two), Some(false));
        state.shutdown();
    }

    #[test]
    fn digital_line_cannot_be_both_input_and_output() {
        let dir = tempfile::tempdir().unwrap();
        let state = platform(&SimHardware::new(), dir.path());
        let (state, _) = run(state, Effect::init_digital_input(DigitalPort::Four, |r| r));
        let (state, result) = run(
            state,
            Effect::init_digital_output(DigitalPort::Four, DigitalState::Low, |r| r),
        );
        assert!(matches!(
            result,
            Err(PlatformError::DigitalPortError { port: DigitalPort::Four, .. })
        ));
        state.shutdown();
    }

    #[test]
    fn rejected_allocation_is_not_registered() {
        let dir = tempfile::tempdir().unwrap();
        let sim = SimHardware::new();
        sim.reject_allocation(SimChannel::Pwm(PwmPort::Seven));
        let state = platform(&sim, dir.path());

        let (state, result) = run(state, Effect::init_pwm_output(PwmPort::Seven, 0.0, |r| r));
        assert!(matches!(
            result,
            Err(PlatformError::PwmPortError { port: PwmPort::Seven, .. })
        ));
        assert!(!state.registry().contains(&ResourceKey::PwmOutput(PwmPort::Seven)));
        state.shutdown();
    }

    #[test]
    fn write_faults_are_port_errors() {
        let dir = tempfile::tempdir().unwrap();
        let sim = SimHardware::new();
        let state = platform(&sim, dir.path());
        let (state, token) = run(state, Effect::init_analog_output(AnalogPort::One, 1.5, |r| r));
        let token = token.unwrap();
        assert_eq!(sim.analog_output(AnalogPort::One), Some(1.5));

        sim.fail_writes(SimChannel::Analog(AnalogPort::One));
        let (state, result) = run(state, Effect::set_analog_port_voltage(token, 2.0, |r| r));
        assert!(matches!(
            result,
            Err(PlatformError::AnalogPortError { port: AnalogPort::One, .. })
        ));
        state.shutdown();
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sim = SimHardware::builder().with_talon(2).build();
        let state = platform(&sim, dir.path());

        let (state, pwm) = run(state, Effect::init_pwm_output(PwmPort::One, 0.0, |r| r));
        let (state, result) = run(state, Effect::set_pwm_value(pwm.unwrap(), f64::NAN, |r| r));
        assert!(matches!(result, Err(PlatformError::PwmPortError { .. })));

        let (state, motor) = talon(state, 2);
        let (state, result) = run(
            state,
            Effect::set_can_motor_speed(CanMotorToken::Talon(motor), f64::INFINITY, |r| r),
        );
        assert_eq!(
            result.unwrap_err(),
            PlatformError::PhoenixError {
                can_id: 2,
                status: PhoenixStatus::InvalidParamValue
            }
        );
        assert_eq!(sim.motor_output(2), None);
        state.shutdown();
    }

    #[test]
    fn pwm_value_reaches_the_channel() {
        let dir = tempfile::tempdir().unwrap();
        let sim = SimHardware::new();
        let state = platform(&sim, dir.path());
        let (state, pwm) = run(state, Effect::init_pwm_output(PwmPort::Three, 0.0, |r| r));
        let (state, echoed) = run(state, Effect::set_pwm_value(pwm.unwrap(), -0.25, |r| r));
        assert_eq!(echoed.unwrap(), PwmPort::Three);
        assert_eq!(sim.pwm_output(PwmPort::Three), Some(-0.25));
        state.shutdown();
    }

    #[test]
    fn absent_phoenix_device_fails_probe_and_stays_unregistered() {
        let dir = tempfile::tempdir().unwrap();
        let state = platform(&SimHardware::new(), dir.path());
        let (state, result) = run(state, Effect::init_can_encoder(11, |r| r));
        assert_eq!(
            result.unwrap_err(),
            PlatformError::PhoenixError {
                can_id: 11,
                status: PhoenixStatus::RxTimeout
            }
        );
        assert!(!state.registry().contains(&ResourceKey::CanEncoder(11)));
        state.shutdown();
    }

    #[test]
    fn neo_probe_checks_latched_error() {
        let dir = tempfile::tempdir().unwrap();
        let sim = SimHardware::builder().with_neo(6).build();
        sim.set_neo_status(6, RevStatus::FirmwareTooOld);
        let state = platform(&sim, dir.path());

        let (state, result) = run(state, Effect::init_can_device(CanDeviceKind::Neo, 6, |r| r));
        assert_eq!(
            result.unwrap_err(),
            PlatformError::RevError {
                can_id: 6,
                status: RevStatus::FirmwareTooOld
            }
        );

        // A failed probe leaves the id free for a retry.
        sim.set_neo_status(6, RevStatus::Ok);
        let (state, result) = run(state, Effect::init_can_device(CanDeviceKind::Neo, 6, |r| r));
        let token = match result.unwrap() {
            CanDeviceToken::Motor(motor) => motor,
            other => panic!("expected a motor, got {other:?}"),
        };
        let (state, echoed) = run(state, Effect::set_can_motor_speed(token, 0.4, |r| r));
        assert_eq!(echoed.unwrap(), 6);
        assert_eq!(sim.motor_output(6), Some(0.4));
        state.shutdown();
    }

    #[test]
    fn absent_neo_reports_disconnected() {
        let dir = tempfile::tempdir().unwrap();
        let state = platform(&SimHardware::new(), dir.path());
        let (state, result) = run(state, Effect::init_can_device(CanDeviceKind::Neo, 1, |r| r));
        assert!(matches!(result, Err(PlatformError::RevError { can_id: 1, .. })));
        state.shutdown();
    }

    #[test]
    fn token_from_another_state_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sim = SimHardware::builder().with_talon(9).build();
        let first = platform(&sim, dir.path());
        let (first, motor) = talon(first, 9);
        first.shutdown();

        let second = platform(&sim, dir.path());
        let (second, result) = run(
            second,
            Effect::set_can_motor_speed(CanMotorToken::Talon(motor), 0.5, |r| r),
        );
        assert!(matches!(result, Err(PlatformError::PhoenixError { can_id: 9, .. })));
        assert_eq!(sim.motor_output(9), None);
        second.shutdown();
    }

    #[test]
    fn stale_talon_token_cannot_drive_a_reregistered_neo() {
        let dir = tempfile::tempdir().unwrap();
        let sim = SimHardware::builder().with_talon(9).with_neo(9).build();
        let first = platform(&sim, dir.path());
        let (first, stale) = talon(first, 9);
        first.shutdown();

        let second = platform(&sim, dir.path());
        let (second, neo) = run(second, Effect::init_can_device(CanDeviceKind::Neo, 9, |r| r));
        assert!(neo.is_ok());
        let (second, result) = run(
            second,
            Effect::set_can_motor_speed(CanMotorToken::Talon(stale), 0.5, |r| r),
        );
        assert_eq!(
            result,
            Err(PlatformError::PhoenixError {
                can_id: 9,
                status: PhoenixStatus::EcuIsNotPresent,
            })
        );
        assert_ne!(sim.motor_output(9), Some(0.5));
        second.shutdown();
    }

    #[test]
    fn stale_output_token_is_refused_after_reinit() {
        let dir = tempfile::tempdir().unwrap();
        let sim = SimHardware::new();
        let first = platform(&sim, dir.path());
        let (first, stale) = run(
            first,
            Effect::init_digital_output(DigitalPort::Three, DigitalState::Low, |r| r),
        );
        let stale = stale.unwrap();
        first.shutdown();

        let second = platform(&sim, dir.path());
        let (second, fresh) = run(
            second,
            Effect::init_digital_output(DigitalPort::Three, DigitalState::Low, |r| r),
        );
        assert!(fresh.is_ok());
        let (second, result) = run(
            second,
            Effect::set_digital_port_state(stale, DigitalState::High, |r| r),
        );
        assert!(matches!(
            result,
            Err(PlatformError::DigitalPortError { port: DigitalPort::Three, .. })
        ));
        assert_eq!(sim.digital_output(DigitalPort::Three), Some(false));
        second.shutdown();
    }

    #[test]
    fn hid_slot_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let state = platform(&SimHardware::new(), dir.path());
        let (state, ok) = run(state, Effect::init_hid_input(0, |r| r));
        assert_eq!(ok.unwrap().slot(), 0);
        let (state, err) = run(state, Effect::init_hid_input(HID_SLOT_COUNT, |r| r));
        assert!(matches!(err, Err(PlatformError::PortInitializationError { .. })));
        state.shutdown();
    }

    #[test]
    fn read_file_returns_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auto.txt");
        fs::write(&path, b"left side").unwrap();
        let state = platform(&SimHardware::new(), dir.path());
        let (state, bytes) = run(state, Effect::read_file(&path, |r| r));
        assert_eq!(bytes.unwrap(), b"left side");
        state.shutdown();
    }

    #[test]
    fn read_file_classifies_failures() {
        let dir = tempfile::tempdir().unwrap();
        let state = platform(&SimHardware::new(), dir.path());

        let missing = dir.path().join("missing.json");
        let (state, result) = run(state, Effect::read_file(&missing, |r| r));
        assert_eq!(
            result.unwrap_err(),
            PlatformError::FileNotFound {
                path: missing.display().to_string()
            }
        );

        let (state, result) = run(state, Effect::read_file(dir.path(), |r| r));
        assert!(matches!(result, Err(PlatformError::InvalidPath { .. })));

        let (state, result) = run(state, Effect::read_file("", |r| r));
        assert!(matches!(result, Err(PlatformError::InvalidPath { .. })));
        state.shutdown();
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_access_denied() {
        use std::io;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.bin");
        fs::write(&path, b"x").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();
        assert!(matches!(
            normalize::read(&path, io::Error::from(io::ErrorKind::PermissionDenied)),
            PlatformError::FileAccessDenied { .. }
        ));
        if fs::read(&path).is_ok() {
            eprintln!("skipping read_file check: running with privileges that bypass file modes");
            return;
        }
        let state = platform(&SimHardware::new(), dir.path());
        let (state, result) = run(state, Effect::read_file(&path, |r| r));
        assert!(matches!(result, Err(PlatformError::FileAccessDenied { .. })));
        state.shutdown();
    }

    #[test]
    fn song_session_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let sim = SimHardware::builder().with_talon(4).build();
        let state = platform(&sim, dir.path());
        let (state, motor) = talon(state, 4);

        let (state, session) = run(state, Effect::load_song(motor.clone(), vec![1, 2, 3], |r| r));
        let session = session.unwrap();
        assert!(session.song_path().starts_with(dir.path()));
        assert_eq!(fs::read(session.song_path()).unwrap(), vec![1, 2, 3]);

        // One open session per motor.
        let (state, second) = run(state, Effect::load_song(motor.clone(), vec![9], |r| r));
        assert_eq!(second.unwrap_err(), PlatformError::AlreadyInitialized);

        let (state, played) = run(state, Effect::play_song(session.clone(), |r| r));
        assert!(played.is_ok());
        assert!(state.is_playing(4));
        assert!(sim.song_state(4).unwrap().playing);

        let (state, stopped) = run(state, Effect::stop_song(session.clone(), |r| r));
        assert!(stopped.is_ok());
        assert!(!state.is_playing(4));
        assert!(!session.song_path().exists());
        assert!(sim.song_state(4).unwrap().closed);
        assert!(!state.registry().contains(&ResourceKey::Orchestra(4)));

        let (state, again) = run(state, Effect::stop_song(session, |r| r));
        assert_eq!(again.unwrap_err(), PlatformError::SongNotLoaded);

        // The motor is free for a new song.
        let (state, reloaded) = run(state, Effect::load_song(motor, vec![4], |r| r));
        assert!(reloaded.is_ok());
        state.shutdown();
    }

    #[test]
    fn stopping_an_idle_session_releases_it() {
        let dir = tempfile::tempdir().unwrap();
        let sim = SimHardware::builder().with_talon(4).build();
        let state = platform(&sim, dir.path());
        let (state, motor) = talon(state, 4);
        let (state, session) = run(state, Effect::load_song(motor, vec![0], |r| r));
        let session = session.unwrap();

        let (state, result) = run(state, Effect::stop_song(session.clone(), |r| r));
        assert_eq!(result.unwrap_err(), PlatformError::SongNotPlaying);
        assert!(!state.registry().contains(&ResourceKey::Orchestra(4)));
        assert!(!session.song_path().exists());
        state.shutdown();
    }

    #[test]
    fn stale_session_token_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sim = SimHardware::builder().with_talon(4).build();
        let state = platform(&sim, dir.path());
        let (state, motor) = talon(state, 4);

        let (state, old) = run(state, Effect::load_song(motor.clone(), vec![0], |r| r));
        let old = old.unwrap();
        let (state, _) = run(state, Effect::stop_song(old.clone(), |r| r));
        let (state, fresh) = run(state, Effect::load_song(motor, vec![1], |r| r));
        assert!(fresh.is_ok());

        let (state, result) = run(state, Effect::play_song(old, |r| r));
        assert_eq!(result.unwrap_err(), PlatformError::SongNotLoaded);
        assert!(!state.is_playing(4));
        state.shutdown();
    }

    #[test]
    fn failed_orchestra_load_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let sim = SimHardware::builder().with_talon(3).build();
        let state = platform(&sim, dir.path());
        let (state, motor) = talon(state, 3);

        sim.fail_orchestra(PhoenixStatus::CouldNotLoadMusic);
        let (state, result) = run(state, Effect::load_song(motor, vec![7, 7], |r| r));
        assert_eq!(
            result.unwrap_err(),
            PlatformError::PhoenixError {
                can_id: 3,
                status: PhoenixStatus::CouldNotLoadMusic
            }
        );
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        state.shutdown();
    }

    #[test]
    fn shutdown_deletes_song_files() {
        let dir = tempfile::tempdir().unwrap();
        let sim = SimHardware::builder().with_talon(8).build();
        let state = platform(&sim, dir.path());
        let (state, motor) = talon(state, 8);
        let (state, session) = run(state, Effect::load_song(motor, vec![5], |r| r));
        let session = session.unwrap();
        let (state, _) = run(state, Effect::play_song(session.clone(), |r| r));

        state.shutdown();
        assert!(!session.song_path().exists());
        let song = sim.song_state(8).unwrap();
        assert!(!song.playing);
        assert!(song.closed);
    }

    #[test]
    fn forwarded_port_is_keyed_by_local_port() {
        let dir = tempfile::tempdir().unwrap();
        let state = platform(&SimHardware::new(), dir.path());
        let (state, bound) = run(state, Effect::forward_port(0, "127.0.0.1", 5800, |r| r));
        let bound = bound.unwrap();
        assert_eq!(state.forwarded_ports(), vec![bound]);

        let (state, again) = run(state, Effect::forward_port(bound, "127.0.0.1", 5801, |r| r));
        assert_eq!(again.unwrap_err(), PlatformError::AlreadyInitialized);
        state.shutdown();
    }

    #[test]
    fn websocket_connect_failure_is_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let state = platform(&SimHardware::new(), dir.path());
        let (state, result) = run(state, Effect::init_websocket("not a url", |r| r));
        assert!(matches!(
            result,
            Err(PlatformError::WebSocketInitializationError { ref url, .. }) if url == "not a url"
        ));
        assert!(state.registry().is_empty());
        state.shutdown();
    }

    #[test]
    fn apply_all_keeps_submission_order() {
        let dir = tempfile::tempdir().unwrap();
        let state = platform(&SimHardware::new(), dir.path());
        let effects = vec![
            Effect::init_digital_input(DigitalPort::One, |r| ("first", r.is_ok())),
            Effect::log("between"),
            Effect::init_digital_input(DigitalPort::One, |r| ("second", r.is_ok())),
        ];
        let (state, messages) = apply_all(state, effects);
        assert_eq!(messages, vec![("first", true), ("second", false)]);
        state.shutdown();
    }
}
