//! The effect vocabulary: one-shot commands issued by the control program.
//!
//! An effect is pure data plus a callback that turns its result into the
//! program's message type `M`. [`Effect::map`] re-targets that callback so
//! a sub-program's effects can be lifted into its parent's message type.

use std::fmt;
use std::path::PathBuf;

use teaforge_types::{AnalogPort, CanId, DigitalPort, DigitalState, HidSlot, PlatformError, PwmPort};

use crate::token::{
    AnalogInputToken, AnalogOutputToken, CanDeviceToken, CanMotorToken, DigitalInputToken,
    DigitalOutputToken, HidInputToken, OrchestraToken, PwmOutputToken, TalonMotorToken,
    WebSocketToken,
};

/// Result of an effect as seen by its callback.
pub type Outcome<T> = Result<T, PlatformError>;

/// Turns an effect's outcome into a program message. Called at most once.
pub type Callback<A, M> = Box<dyn FnOnce(A) -> M + Send>;

/// Which kind of device an `InitCanDevice` effect expects at the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanDeviceKind {
    Neo,
    Talon,
    Encoder,
    Pigeon,
}

pub enum Effect<M> {
    /// Write a timestamped line to the log. Produces no message.
    Log(String),
    InitDigitalInput {
        port: DigitalPort,
        on_result: Callback<Outcome<DigitalInputToken>, M>,
    },
    InitDigitalOutput {
        port: DigitalPort,
        initial: DigitalState,
        on_result: Callback<Outcome<DigitalOutputToken>, M>,
    },
    InitAnalogInput {
        port: AnalogPort,
        on_result: Callback<Outcome<AnalogInputToken>, M>,
    },
    InitAnalogOutput {
        port: AnalogPort,
        initial: f64,
        on_result: Callback<Outcome<AnalogOutputToken>, M>,
    },
    InitPwmOutput {
        port: PwmPort,
        initial: f64,
        on_result: Callback<Outcome<PwmOutputToken>, M>,
    },
    InitHidInput {
        slot: HidSlot,
        on_result: Callback<Outcome<HidInputToken>, M>,
    },
    InitCanDevice {
        kind: CanDeviceKind,
        id: CanId,
        on_result: Callback<Outcome<CanDeviceToken>, M>,
    },
    InitWebSocket {
        url: String,
        on_result: Callback<Outcome<WebSocketToken>, M>,
    },
    SetDigitalPortState {
        token: DigitalOutputToken,
        state: DigitalState,
        on_result: Callback<Outcome<DigitalPort>, M>,
    },
    SetAnalogPortVoltage {
        token: AnalogOutputToken,
        volts: f64,
        on_result: Callback<Outcome<AnalogPort>, M>,
    },
    SetPwmValue {
        token: PwmOutputToken,
        value: f64,
        on_result: Callback<Outcome<PwmPort>, M>,
    },
    SetCanMotorSpeed {
        token: CanMotorToken,
        value: f64,
        on_result: Callback<Outcome<CanId>, M>,
    },
    /// Expose `remote_host:remote_port` on `local_port` of the controller.
    /// Resolves to the bound local port.
    ForwardPort {
        local_port: u16,
        remote_host: String,
        remote_port: u16,
        on_result: Callback<Outcome<u16>, M>,
    },
    LoadSong {
        motor: TalonMotorToken,
        song: Vec<u8>,
        on_result: Callback<Outcome<OrchestraToken>, M>,
    },
    PlaySong {
        session: OrchestraToken,
        on_result: Callback<Outcome<()>, M>,
    },
    StopSong {
        session: OrchestraToken,
        on_result: Callback<Outcome<()>, M>,
    },
    ReadFile {
        path: PathBuf,
        on_result: Callback<Outcome<Vec<u8>>, M>,
    },
}

fn boxed<A, M>(f: impl FnOnce(A) -> M + Send + 'static) -> Callback<A, M> {
    Box::new(f)
}

fn chain<A: 'static, M: 'static, N: 'static>(
    callback: Callback<A, M>,
    f: impl FnOnce(M) -> N + Send + 'static,
) -> Callback<A, N> {
    Box::new(move |a| f(callback(a)))
}

impl<M: 'static> Effect<M> {
    pub fn log(text: impl Into<String>) -> Self {
        Effect::Log(text.into())
    }

    pub fn init_digital_input(
        port: DigitalPort,
        on_result: impl FnOnce(Outcome<DigitalInputToken>) -> M + Send + 'static,
    ) -> Self {
        Effect::InitDigitalInput {
            port,
            on_result: boxed(on_result),
        }
    }

    pub fn init_digital_output(
        port: DigitalPort,
        initial: DigitalState,
        on_result: impl FnOnce(Outcome<DigitalOutputToken>) -> M + Send + 'static,
    ) -> Self {
        Effect::InitDigitalOutput {
            port,
            initial,
            on_result: boxed(on_result),
        }
    }

    pub fn init_analog_input(
        port: AnalogPort,
        on_result: impl FnOnce(Outcome<AnalogInputToken>) -> M + Send + 'static,
    ) -> Self {
        Effect::InitAnalogInput {
            port,
            on_result: boxed(on_result),
        }
    }

    pub fn init_analog_output(
        port: AnalogPort,
        initial: f64,
        on_result: impl FnOnce(Outcome<AnalogOutputToken>) -> M + Send + 'static,
    ) -> Self {
        Effect::InitAnalogOutput {
            port,
            initial,
            on_result: boxed(on_result),
        }
    }

    pub fn init_pwm_output(
        port: PwmPort,
        initial: f64,
        on_result: impl FnOnce(Outcome<PwmOutputToken>) -> M + Send + 'static,
    ) -> Self {
        Effect::InitPwmOutput {
            port,
            initial,
            on_result: boxed(on_result),
        }
    }

    pub fn init_hid_input(
        slot: HidSlot,
        on_result: impl FnOnce(Outcome<HidInputToken>) -> M + Send + 'static,
    ) -> Self {
        Effect::InitHidInput {
            slot,
            on_result: boxed(on_result),
        }
    }

    pub fn init_can_device(
        kind: CanDeviceKind,
        id: CanId,
        on_result: impl FnOnce(Outcome<CanDeviceToken>) -> M + Send + 'static,
    ) -> Self {
        Effect::InitCanDevice {
            kind,
            id,
            on_result: boxed(on_result),
        }
    }

    /// `InitCanDevice` for a CANcoder.
    pub fn init_can_encoder(
        id: CanId,
        on_result: impl FnOnce(Outcome<CanDeviceToken>) -> M + Send + 'static,
    ) -> Self {
        Self::init_can_device(CanDeviceKind::Encoder, id, on_result)
    }

    /// `InitCanDevice` for a Pigeon 2.
    pub fn init_can_gyro(
        id: CanId,
        on_result: impl FnOnce(Outcome<CanDeviceToken>) -> M + Send + 'static,
    ) -> Self {
        Self::init_can_device(CanDeviceKind::Pigeon, id, on_result)
    }

    pub fn init_websocket(
        url: impl Into<String>,
        on_result: impl FnOnce(Outcome<WebSocketToken>) -> M + Send + 'static,
    ) -> Self {
        Effect::InitWebSocket {
            url: url.into(),
            on_result: boxed(on_result),
        }
    }

    pub fn set_digital_port_state(
        token: DigitalOutputToken,
        state: DigitalState,
        on_result: impl FnOnce(Outcome<DigitalPort>) -> M + Send + 'static,
    ) -> Self {
        Effect::SetDigitalPortState {
            token,
            state,
            on_result: boxed(on_result),
        }
    }

    pub fn set_analog_port_voltage(
        token: AnalogOutputToken,
        volts: f64,
        on_result: impl FnOnce(Outcome<AnalogPort>) -> M + Send + 'static,
    ) -> Self {
        Effect::SetAnalogPortVoltage {
            token,
            volts,
            on_result: boxed(on_result),
        }
    }

    pub fn set_pwm_value(
        token: PwmOutputToken,
        value: f64,
        on_result: impl FnOnce(Outcome<PwmPort>) -> M + Send + 'static,
    ) -> Self {
        Effect::SetPwmValue {
            token,
            value,
            on_result: boxed(on_result),
        }
    }

    pub fn set_can_motor_speed(
        token: CanMotorToken,
        value: f64,
        on_result: impl FnOnce(Outcome<CanId>) -> M + Send + 'static,
    ) -> Self {
        Effect::SetCanMotorSpeed {
            token,
            value,
            on_result: boxed(on_result),
        }
    }

    pub fn forward_port(
        local_port: u16,
        remote_host: impl Into<String>,
        remote_port: u16,
        on_result: impl FnOnce(Outcome<u16>) -> M + Send + 'static,
    ) -> Self {
        Effect::ForwardPort {
            local_port,
            remote_host: remote_host.into(),
            remote_port,
            on_result: boxed(on_result),
        }
    }

    pub fn load_song(
        motor: TalonMotorToken,
        song: Vec<u8>,
        on_result: impl FnOnce(Outcome<OrchestraToken>) -> M + Send + 'static,
    ) -> Self {
        Effect::LoadSong {
            motor,
            song,
            on_result: boxed(on_result),
        }
    }

    pub fn play_song(
        session: OrchestraToken,
        on_result: impl FnOnce(Outcome<()>) -> M + Send + 'static,
    ) -> Self {
        Effect::PlaySong {
            session,
            on_result: boxed(on_result),
        }
    }

    pub fn stop_song(
        session: OrchestraToken,
        on_result: impl FnOnce(Outcome<()>) -> M + Send + 'static,
    ) -> Self {
        Effect::StopSong {
            session,
            on_result: boxed(on_result),
        }
    }

    pub fn read_file(
        path: impl Into<PathBuf>,
        on_result: impl FnOnce(Outcome<Vec<u8>>) -> M + Send + 'static,
    ) -> Self {
        Effect::ReadFile {
            path: path.into(),
            on_result: boxed(on_result),
        }
    }

    /// Re-target the message type.
    pub fn map<N: 'static>(self, f: impl FnOnce(M) -> N + Send + 'static) -> Effect<N> {
        match self {
            Effect::Log(text) => Effect::Log(text),
            Effect::InitDigitalInput { port, on_result } => Effect::InitDigitalInput {
                port,
                on_result: chain(on_result, f),
            },
            Effect::InitDigitalOutput {
                port,
                initial,
                on_result,
            } => Effect::InitDigitalOutput {
                port,
                initial,
                on_result: chain(on_result, f),
            },
            Effect::InitAnalogInput { port, on_result } => Effect::InitAnalogInput {
                port,
                on_result: chain(on_result, f),
            },
            Effect::InitAnalogOutput {
                port,
                initial,
                on_result,
            } => Effect::InitAnalogOutput {
                port,
                initial,
                on_result: chain(on_result, f),
            },
            Effect::InitPwmOutput {
                port,
                initial,
                on_result,
            } => Effect::InitPwmOutput {
                port,
                initial,
                on_result: chain(on_result, f),
            },
            Effect::InitHidInput { slot, on_result } => Effect::InitHidInput {
                slot,
                on_result: chain(on_result, f),
            },
            Effect::InitCanDevice {
                kind,
                id,
                on_result,
            } => Effect::InitCanDevice {
                kind,
                id,
                on_result: chain(on_result, f),
            },
            Effect::InitWebSocket { url, on_result } => Effect::InitWebSocket {
                url,
                on_result: chain(on_result, f),
            },
            Effect::SetDigitalPortState {
                token,
                state,
                on_result,
            } => Effect::SetDigitalPortState {
                token,
                state,
                on_result: chain(on_result, f),
            },
            Effect::SetAnalogPortVoltage {
                token,
                volts,
                on_result,
            } => Effect::SetAnalogPortVoltage {
                token,
                volts,
                on_result: chain(on_result, f),
            },
            Effect::SetPwmValue {
                token,
                value,
                on_result,
            } => Effect::SetPwmValue {
                token,
                value,
                on_result: chain(on_result, f),
            },
            Effect::SetCanMotorSpeed {
                token,
                value,
                on_result,
            } => Effect::SetCanMotorSpeed {
                token,
                value,
                on_result: chain(on_result, f),
            },
            Effect::ForwardPort {
                local_port,
                remote_host,
                remote_port,
                on_result,
            } => Effect::ForwardPort {
                local_port,
                remote_host,
                remote_port,
                on_result: chain(on_result, f),
            },
            Effect::LoadSong {
                motor,
                song,
                on_result,
            } => Effect::LoadSong {
                motor,
                song,
                on_result: chain(on_result, f),
            },
            Effect::PlaySong { session, on_result } => Effect::PlaySong {
                session,
                on_result: chain(on_result, f),
            },
            Effect::StopSong { session, on_result } => Effect::StopSong {
                session,
                on_result: chain(on_result, f),
            },
            Effect::ReadFile { path, on_result } => Effect::ReadFile {
                path,
                on_result: chain(on_result, f),
            },
        }
    }
}

impl<M> Effect<M> {
    /// Variant name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Log(_) => "Log",
            Effect::InitDigitalInput { .. } => "InitDigitalInput",
            Effect::InitDigitalOutput { .. } => "InitDigitalOutput",
            Effect::InitAnalogInput { .. } => "InitAnalogInput",
            Effect::InitAnalogOutput { .. } => "InitAnalogOutput",
            Effect::InitPwmOutput { .. } => "InitPwmOutput",
            Effect::InitHidInput { .. } => "InitHidInput",
            Effect::InitCanDevice { .. } => "InitCanDevice",
            Effect::InitWebSocket { .. } => "InitWebSocket",
            Effect::SetDigitalPortState { .. } => "SetDigitalPortState",
            Effect::SetAnalogPortVoltage { .. } => "SetAnalogPortVoltage",
            Effect::SetPwmValue { .. } => "SetPwmValue",
            Effect::SetCanMotorSpeed { .. } => "SetCanMotorSpeed",
            Effect::ForwardPort { .. } => "ForwardPort",
            Effect::LoadSong { .. } => "LoadSong",
            Effect::PlaySong { .. } => "PlaySong",
            Effect::StopSong { .. } => "StopSong",
            Effect::ReadFile { .. } => "ReadFile",
        }
    }
}

impl<M> fmt::Debug for Effect<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Log(text) => f.debug_tuple("Log").field(text).finish(),
            Effect::InitDigitalInput { port, .. } => {
                f.debug_struct(self.name()).field("port", port).finish()
            }
            Effect::InitDigitalOutput { port, initial, .. } => f
                .debug_struct(self.name())
                .field("port", port)
                .field("initial", initial)
                .finish(),
            Effect::InitAnalogInput { port, .. } => {
                f.debug_struct(self.name()).field("port", port).finish()
            }
            Effect::InitAnalogOutput { port, initial, .. } => f
                .debug_struct(self.name())
                .field("port", port)
                .field("initial", initial)
                .finish(),
            Effect::InitPwmOutput { port, initial, .. } => f
                .debug_struct(self.name())
                .field("port", port)
                .field("initial", initial)
                .finish(),
            Effect::InitHidInput { slot, .. } => {
                f.debug_struct(self.name()).field("slot", slot).finish()
            }
            Effect::InitCanDevice { kind, id, .. } => f
                .debug_struct(self.name())
                .field("kind", kind)
                .field("id", id)
                .finish(),
            Effect::InitWebSocket { url, .. } => {
                f.debug_struct(self.name()).field("url", url).finish()
            }
            Effect::SetDigitalPortState { token, state, .. } => f
                .debug_struct(self.name())
                .field("port", &token.port())
                .field("state", state)
                .finish(),
            Effect::SetAnalogPortVoltage { token, volts, .. } => f
                .debug_struct(self.name())
                .field("port", &token.port())
                .field("volts", volts)
                .finish(),
            Effect::SetPwmValue { token, value, .. } => f
                .debug_struct(self.name())
                .field("port", &token.port())
                .field("value", value)
                .finish(),
            Effect::SetCanMotorSpeed { token, value, .. } => f
                .debug_struct(self.name())
                .field("can_id", &token.can_id())
                .field("value", value)
                .finish(),
            Effect::ForwardPort {
                local_port,
                remote_host,
                remote_port,
                ..
            } => f
                .debug_struct(self.name())
                .field("local_port", local_port)
                .field("remote_host", remote_host)
                .field("remote_port", remote_port)
                .finish(),
            Effect::LoadSong { motor, song, .. } => f
                .debug_struct(self.name())
                .field("motor", &motor.can_id())
                .field("bytes", &song.len())
                .finish(),
            Effect::PlaySong { session, .. } | Effect::StopSong { session, .. } => f
                .debug_struct(self.name())
                .field("motor", &session.motor())
                .field("session", &session.session())
                .finish(),
            Effect::ReadFile { path, .. } => {
                f.debug_struct(self.name()).field("path", path).finish()
            }
        }
    }
}
