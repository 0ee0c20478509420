//! The subscription vocabulary: standing requests to be told about hardware,
//! run state, time and inbound network frames.
//!
//! Like effects, subscriptions are data plus a message-producing handler;
//! unlike effect callbacks, handlers are called once per firing and so are
//! `Fn`. Starting, polling and stopping live in [`crate::schedule`].

use std::fmt;
use std::time::Duration;

use teaforge_types::{
    DigitalState, EncoderSnapshot, GyroSnapshot, HidValue, MotorSnapshot, RunningRobotState,
};

use crate::token::{
    AnalogInputToken, DigitalInputToken, EncoderToken, GyroToken, HidInputToken, TalonMotorToken,
    WebSocketToken,
};

/// Turns one observation into a program message.
pub type Handler<A, M> = Box<dyn Fn(A) -> M + Send>;

pub enum Subscription<M> {
    /// Fires every `period`, delivering how late the tick was observed.
    Interval {
        period: Duration,
        on_tick: Handler<Duration, M>,
    },
    DigitalValue {
        token: DigitalInputToken,
        period: Duration,
        on_value: Handler<DigitalState, M>,
    },
    DigitalChanged {
        token: DigitalInputToken,
        on_change: Handler<(DigitalState, DigitalState), M>,
    },
    AnalogValue {
        token: AnalogInputToken,
        period: Duration,
        use_average: bool,
        on_value: Handler<f64, M>,
    },
    AnalogChanged {
        token: AnalogInputToken,
        use_average: bool,
        on_change: Handler<(f64, f64), M>,
    },
    /// Fires every cycle with a fresh snapshot.
    HidValue {
        token: HidInputToken,
        on_value: Handler<HidValue, M>,
    },
    HidChanged {
        token: HidInputToken,
        on_change: Handler<(HidValue, HidValue), M>,
    },
    RobotState {
        on_value: Handler<RunningRobotState, M>,
    },
    RobotStateChanged {
        on_change: Handler<(RunningRobotState, RunningRobotState), M>,
    },
    /// CANcoder positions in degrees, velocity in rad/s. `period` sets how
    /// often the device publishes.
    CanEncoderValue {
        token: EncoderToken,
        period: Duration,
        on_value: Handler<EncoderSnapshot, M>,
    },
    /// Pigeon 2 angles in degrees, rates in rad/s. `period` sets how often
    /// the device publishes.
    CanGyroValue {
        token: GyroToken,
        period: Duration,
        on_value: Handler<GyroSnapshot, M>,
    },
    /// TalonFX rotor position in degrees, velocity in rad/s.
    CanMotorValue {
        token: TalonMotorToken,
        on_value: Handler<MotorSnapshot, M>,
    },
    /// One message per inbound text frame.
    Websocket {
        token: WebSocketToken,
        on_message: Handler<String, M>,
    },
}

fn handler<A, M>(f: impl Fn(A) -> M + Send + 'static) -> Handler<A, M> {
    Box::new(f)
}

fn change_handler<A, M>(f: impl Fn(A, A) -> M + Send + 'static) -> Handler<(A, A), M> {
    Box::new(move |(old, new)| f(old, new))
}

fn lift<A: 'static, M: 'static, N: 'static>(
    handler: Handler<A, M>,
    f: impl Fn(M) -> N + Send + 'static,
) -> Handler<A, N> {
    Box::new(move |a| f(handler(a)))
}

impl<M: 'static> Subscription<M> {
    pub fn interval(period: Duration, on_tick: impl Fn(Duration) -> M + Send + 'static) -> Self {
        Subscription::Interval {
            period,
            on_tick: handler(on_tick),
        }
    }

    pub fn digital_value(
        token: DigitalInputToken,
        period: Duration,
        on_value: impl Fn(DigitalState) -> M + Send + 'static,
    ) -> Self {
        Subscription::DigitalValue {
            token,
            period,
            on_value: handler(on_value),
        }
    }

    /// `on_change` receives `(previous, current)`.
    pub fn digital_changed(
        token: DigitalInputToken,
        on_change: impl Fn(DigitalState, DigitalState) -> M + Send + 'static,
    ) -> Self {
        Subscription::DigitalChanged {
            token,
            on_change: change_handler(on_change),
        }
    }

    pub fn analog_value(
        token: AnalogInputToken,
        period: Duration,
        use_average: bool,
        on_value: impl Fn(f64) -> M + Send + 'static,
    ) -> Self {
        Subscription::AnalogValue {
            token,
            period,
            use_average,
            on_value: handler(on_value),
        }
    }

    pub fn analog_changed(
        token: AnalogInputToken,
        use_average: bool,
        on_change: impl Fn(f64, f64) -> M + Send + 'static,
    ) -> Self {
        Subscription::AnalogChanged {
            token,
            use_average,
            on_change: change_handler(on_change),
        }
    }

    pub fn hid_value(
        token: HidInputToken,
        on_value: impl Fn(HidValue) -> M + Send + 'static,
    ) -> Self {
        Subscription::HidValue {
            token,
            on_value: handler(on_value),
        }
    }

    pub fn hid_changed(
        token: HidInputToken,
        on_change: impl Fn(HidValue, HidValue) -> M + Send + 'static,
    ) -> Self {
        Subscription::HidChanged {
            token,
            on_change: change_handler(on_change),
        }
    }

    pub fn robot_state(on_value: impl Fn(RunningRobotState) -> M + Send + 'static) -> Self {
        Subscription::RobotState {
            on_value: handler(on_value),
        }
    }

    pub fn robot_state_changed(
        on_change: impl Fn(RunningRobotState, RunningRobotState) -> M + Send + 'static,
    ) -> Self {
        Subscription::RobotStateChanged {
            on_change: change_handler(on_change),
        }
    }

    pub fn can_encoder_value(
        token: EncoderToken,
        period: Duration,
        on_value: impl Fn(EncoderSnapshot) -> M + Send + 'static,
    ) -> Self {
        Subscription::CanEncoderValue {
            token,
            period,
            on_value: handler(on_value),
        }
    }

    pub fn can_gyro_value(
        token: GyroToken,
        period: Duration,
        on_value: impl Fn(GyroSnapshot) -> M + Send + 'static,
    ) -> Self {
        Subscription::CanGyroValue {
            token,
            period,
            on_value: handler(on_value),
        }
    }

    pub fn can_motor_value(
        token: TalonMotorToken,
        on_value: impl Fn(MotorSnapshot) -> M + Send + 'static,
    ) -> Self {
        Subscription::CanMotorValue {
            token,
            on_value: handler(on_value),
        }
    }

    pub fn websocket(
        token: WebSocketToken,
        on_message: impl Fn(String) -> M + Send + 'static,
    ) -> Self {
        Subscription::Websocket {
            token,
            on_message: handler(on_message),
        }
    }

    /// Re-target the message type.
    pub fn map<N: 'static>(self, f: impl Fn(M) -> N + Send + 'static) -> Subscription<N> {
        match self {
            Subscription::Interval { period, on_tick } => Subscription::Interval {
                period,
                on_tick: lift(on_tick, f),
            },
            Subscription::DigitalValue {
                token,
                period,
                on_value,
            } => Subscription::DigitalValue {
                token,
                period,
                on_value: lift(on_value, f),
            },
            Subscription::DigitalChanged { token, on_change } => Subscription::DigitalChanged {
                token,
                on_change: lift(on_change, f),
            },
            Subscription::AnalogValue {
                token,
                period,
                use_average,
                on_value,
            } => Subscription::AnalogValue {
                token,
                period,
                use_average,
                on_value: lift(on_value, f),
            },
            Subscription::AnalogChanged {
                token,
                use_average,
                on_change,
            } => Subscription::AnalogChanged {
                token,
                use_average,
                on_change: lift(on_change, f),
            },
            Subscription::HidValue { token, on_value } => Subscription::HidValue {
                token,
                on_value: lift(on_value, f),
            },
            Subscription::HidChanged { token, on_change } => Subscription::HidChanged {
                token,
                on_change: lift(on_change, f),
            },
            Subscription::RobotState { on_value } => Subscription::RobotState {
                on_value: lift(on_value, f),
            },
            Subscription::RobotStateChanged { on_change } => Subscription::RobotStateChanged {
                on_change: lift(on_change, f),
            },
            Subscription::CanEncoderValue {
                token,
                period,
                on_value,
            } => Subscription::CanEncoderValue {
                token,
                period,
                on_value: lift(on_value, f),
            },
            Subscription::CanGyroValue {
                token,
                period,
                on_value,
            } => Subscription::CanGyroValue {
                token,
                period,
                on_value: lift(on_value, f),
            },
            Subscription::CanMotorValue { token, on_value } => Subscription::CanMotorValue {
                token,
                on_value: lift(on_value, f),
            },
            Subscription::Websocket { token, on_message } => Subscription::Websocket {
                token,
                on_message: lift(on_message, f),
            },
        }
    }
}

impl<M> Subscription<M> {
    /// Variant name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Subscription::Interval { .. } => "Interval",
            Subscription::DigitalValue { .. } => "DigitalValue",
            Subscription::DigitalChanged { .. } => "DigitalChanged",
            Subscription::AnalogValue { .. } => "AnalogValue",
            Subscription::AnalogChanged { .. } => "AnalogChanged",
            Subscription::HidValue { .. } => "HidValue",
            Subscription::HidChanged { .. } => "HidChanged",
            Subscription::RobotState { .. } => "RobotState",
            Subscription::RobotStateChanged { .. } => "RobotStateChanged",
            Subscription::CanEncoderValue { .. } => "CanEncoderValue",
            Subscription::CanGyroValue { .. } => "CanGyroValue",
            Subscription::CanMotorValue { .. } => "CanMotorValue",
            Subscription::Websocket { .. } => "Websocket",
        }
    }
}

impl<M> fmt::Debug for Subscription<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct(self.name());
        match self {
            Subscription::Interval { period, .. } => out.field("period", period),
            Subscription::DigitalValue { token, period, .. } => {
                out.field("port", &token.port()).field("period", period)
            }
            Subscription::DigitalChanged { token, .. } => out.field("port", &token.port()),
            Subscription::AnalogValue {
                token,
                period,
                use_average,
                ..
            } => out
                .field("port", &token.port())
                .field("period", period)
                .field("use_average", use_average),
            Subscription::AnalogChanged {
                token, use_average, ..
            } => out
                .field("port", &token.port())
                .field("use_average", use_average),
            Subscription::HidValue { token, .. } | Subscription::HidChanged { token, .. } => {
                out.field("slot", &token.slot())
            }
            Subscription::RobotState { .. } | Subscription::RobotStateChanged { .. } => &mut out,
            Subscription::CanEncoderValue { token, period, .. } => {
                out.field("can_id", &token.can_id()).field("period", period)
            }
            Subscription::CanGyroValue { token, period, .. } => {
                out.field("can_id", &token.can_id()).field("period", period)
            }
            Subscription::CanMotorValue { token, .. } => out.field("can_id", &token.can_id()),
            Subscription::Websocket { token, .. } => out.field("url", &token.url()),
        };
        out.finish()
    }
}
