//! Subscription scheduler.
//!
//! [`Subscription::start`] turns a subscription into a [`SubscriptionRecord`]
//! holding the device handle and the gate state it needs; the record is then
//! polled once per cycle and emits at most one message per poll. Nothing here
//! blocks: CAN reads return the latest cached sample and websocket polls only
//! look at frames already received.
//!
//! Gating rules:
//!
//! | subscription              | fires when                                        |
//! |---------------------------|---------------------------------------------------|
//! | `Interval`                | `now` reaches the next due time; catches up once  |
//! | `DigitalValue/AnalogValue`| first poll at or after each period boundary       |
//! | `*Changed`                | the read differs from the last one                |
//! | `HidValue`, `RobotState`  | every poll                                        |
//! | `Can*Value`               | any signal carries a newer timestamp              |
//! | `Websocket`               | a text frame is waiting                           |

use std::f64::consts::TAU;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use teaforge_hal::{
    AnalogInput, CanCoder, DigitalInput, HidDevice, PhoenixDevice, Pigeon, TalonMotor, read_hid,
};
use teaforge_types::{
    DigitalState, EncoderSnapshot, GyroSnapshot, HidValue, MotorSnapshot, RunningRobotState,
};
use tracing::{debug, warn};

use crate::registry::{ResourceKey, ResourceToken};
use crate::state::{PlatformState, close_websocket};
use crate::subscription::{Handler, Subscription};
use crate::token::WebSocketToken;

const DEGREES_PER_ROTATION: f64 = 360.0;
const RADIANS_PER_ROTATION: f64 = TAU;

/// A started subscription.
pub struct SubscriptionRecord<M> {
    kind: &'static str,
    gate: Gate<M>,
}

enum Gate<M> {
    Interval {
        period: u64,
        next_due: u64,
        on_tick: Handler<Duration, M>,
    },
    DigitalValue {
        input: Arc<dyn DigitalInput>,
        period: u64,
        boundary: u64,
        on_value: Handler<DigitalState, M>,
    },
    DigitalChanged {
        input: Arc<dyn DigitalInput>,
        last: DigitalState,
        on_change: Handler<(DigitalState, DigitalState), M>,
    },
    AnalogValue {
        input: Arc<dyn AnalogInput>,
        use_average: bool,
        period: u64,
        boundary: u64,
        on_value: Handler<f64, M>,
    },
    AnalogChanged {
        input: Arc<dyn AnalogInput>,
        use_average: bool,
        last: f64,
        on_change: Handler<(f64, f64), M>,
    },
    HidValue {
        device: Arc<dyn HidDevice>,
        on_value: Handler<HidValue, M>,
    },
    HidChanged {
        device: Arc<dyn HidDevice>,
        last: HidValue,
        on_change: Handler<(HidValue, HidValue), M>,
    },
    RobotState {
        on_value: Handler<RunningRobotState, M>,
    },
    RobotStateChanged {
        last: RunningRobotState,
        on_change: Handler<(RunningRobotState, RunningRobotState), M>,
    },
    CanEncoder {
        device: Arc<dyn CanCoder>,
        last: EncoderSnapshot,
        on_value: Handler<EncoderSnapshot, M>,
    },
    CanGyro {
        device: Arc<dyn Pigeon>,
        last: GyroSnapshot,
        on_value: Handler<GyroSnapshot, M>,
    },
    CanMotor {
        device: Arc<dyn TalonMotor>,
        last: MotorSnapshot,
        on_value: Handler<MotorSnapshot, M>,
    },
    Websocket {
        token: WebSocketToken,
        on_message: Handler<String, M>,
    },
}

impl<M> Subscription<M> {
    /// Begin watching: capture baselines and device handles, and ask CAN
    /// sensors to publish at the requested period.
    pub fn start(self, state: &PlatformState) -> SubscriptionRecord<M> {
        let kind = self.name();
        let now = state.hardware.now_micros();
        let gate = match self {
            Subscription::Interval { period, on_tick } => {
                let period = micros(period);
                Gate::Interval {
                    period,
                    next_due: now.saturating_add(period),
                    on_tick,
                }
            }
            Subscription::DigitalValue {
                token,
                period,
                on_value,
            } => Gate::DigitalValue {
                input: Arc::clone(token.handle()),
                period: micros(period),
                boundary: now,
                on_value,
            },
            Subscription::DigitalChanged { token, on_change } => Gate::DigitalChanged {
                last: DigitalState::from(token.handle().get()),
                input: Arc::clone(token.handle()),
                on_change,
            },
            Subscription::AnalogValue {
                token,
                period,
                use_average,
                on_value,
            } => Gate::AnalogValue {
                input: Arc::clone(token.handle()),
                use_average,
                period: micros(period),
                boundary: now,
                on_value,
            },
            Subscription::AnalogChanged {
                token,
                use_average,
                on_change,
            } => Gate::AnalogChanged {
                last: read_analog(token.handle().as_ref(), use_average),
                input: Arc::clone(token.handle()),
                use_average,
                on_change,
            },
            Subscription::HidValue { token, on_value } => Gate::HidValue {
                device: state.hardware.open_hid(token.slot()),
                on_value,
            },
            Subscription::HidChanged { token, on_change } => {
                let device = state.hardware.open_hid(token.slot());
                Gate::HidChanged {
                    last: read_hid(device.as_ref()),
                    device,
                    on_change,
                }
            }
            Subscription::RobotState { on_value } => Gate::RobotState { on_value },
            Subscription::RobotStateChanged { on_change } => Gate::RobotStateChanged {
                last: state.hardware.robot_state(),
                on_change,
            },
            Subscription::CanEncoderValue {
                token,
                period,
                on_value,
            } => {
                let device = Arc::clone(token.handle());
                publish_every(device.as_ref(), period);
                Gate::CanEncoder {
                    last: read_encoder(device.as_ref()),
                    device,
                    on_value,
                }
            }
            Subscription::CanGyroValue {
                token,
                period,
                on_value,
            } => {
                let device = Arc::clone(token.handle());
                publish_every(device.as_ref(), period);
                Gate::CanGyro {
                    last: read_gyro(device.as_ref()),
                    device,
                    on_value,
                }
            }
            Subscription::CanMotorValue { token, on_value } => {
                let device = Arc::clone(token.handle());
                Gate::CanMotor {
                    last: read_motor(device.as_ref()),
                    device,
                    on_value,
                }
            }
            Subscription::Websocket { token, on_message } => {
                Gate::Websocket { token, on_message }
            }
        };
        debug!(kind, "subscription started");
        SubscriptionRecord { kind, gate }
    }
}

impl<M> SubscriptionRecord<M> {
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Check the source once and produce a message if the gate opens.
    pub fn poll(&mut self, state: &PlatformState) -> Option<M> {
        match &mut self.gate {
            Gate::Interval {
                period,
                next_due,
                on_tick,
            } => {
                let now = state.hardware.now_micros();
                if now < *next_due {
                    return None;
                }
                let late = now - *next_due;
                let missed = late / *period;
                *next_due = next_due.saturating_add(period.saturating_mul(missed + 1));
                Some(on_tick(Duration::from_micros(late)))
            }
            Gate::DigitalValue {
                input,
                period,
                boundary,
                on_value,
            } => {
                if !crossed_boundary(state.hardware.now_micros(), *period, boundary) {
                    return None;
                }
                Some(on_value(DigitalState::from(input.get())))
            }
            Gate::DigitalChanged {
                input,
                last,
                on_change,
            } => {
                let current = DigitalState::from(input.get());
                changed(last, current).map(|pair| on_change(pair))
            }
            Gate::AnalogValue {
                input,
                use_average,
                period,
                boundary,
                on_value,
            } => {
                if !crossed_boundary(state.hardware.now_micros(), *period, boundary) {
                    return None;
                }
                Some(on_value(read_analog(input.as_ref(), *use_average)))
            }
            Gate::AnalogChanged {
                input,
                use_average,
                last,
                on_change,
            } => {
                let current = read_analog(input.as_ref(), *use_average);
                changed(last, current).map(|pair| on_change(pair))
            }
            Gate::HidValue { device, on_value } => Some(on_value(read_hid(device.as_ref()))),
            Gate::HidChanged {
                device,
                last,
                on_change,
            } => {
                let current = read_hid(device.as_ref());
                changed(last, current).map(|pair| on_change(pair))
            }
            Gate::RobotState { on_value } => Some(on_value(state.hardware.robot_state())),
            Gate::RobotStateChanged { last, on_change } => {
                changed(last, state.hardware.robot_state()).map(|pair| on_change(pair))
            }
            Gate::CanEncoder {
                device,
                last,
                on_value,
            } => {
                let current = read_encoder(device.as_ref());
                if !current.advanced_since(last) {
                    return None;
                }
                *last = current;
                Some(on_value(encoder_units(current)))
            }
            Gate::CanGyro {
                device,
                last,
                on_value,
            } => {
                let current = read_gyro(device.as_ref());
                if !current.advanced_since(last) {
                    return None;
                }
                *last = current;
                Some(on_value(gyro_units(current)))
            }
            Gate::CanMotor {
                device,
                last,
                on_value,
            } => {
                let current = read_motor(device.as_ref());
                if !current.advanced_since(last) {
                    return None;
                }
                *last = current;
                Some(on_value(motor_units(current)))
            }
            Gate::Websocket { token, on_message } => {
                let text = token.lock().as_mut()?.try_recv_text()?;
                Some(on_message(text))
            }
        }
    }

    /// Tear the subscription down. Websocket subscriptions close their
    /// session and free its URL for a later `InitWebSocket`.
    pub fn stop(self, mut state: PlatformState) -> PlatformState {
        if let Gate::Websocket { token, .. } = self.gate {
            close_websocket(&token, state.settings.websocket_close_timeout);
            let key = ResourceKey::WebSocket(token.url().to_string());
            let same_session = matches!(
                state.registry.lookup(&key),
                Some(ResourceToken::WebSocket(live)) if live.session() == token.session()
            );
            if same_session {
                state.registry.release(&key);
            }
        }
        debug!(kind = self.kind, "subscription stopped");
        state
    }
}

impl<M> fmt::Debug for SubscriptionRecord<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRecord")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

fn micros(period: Duration) -> u64 {
    u64::try_from(period.as_micros()).unwrap_or(u64::MAX).max(1)
}

/// Grid-aligned period gate: opens on the first poll at or after the next
/// multiple of `period` past the start time, skipping boundaries that were
/// missed entirely.
fn crossed_boundary(now: u64, period: u64, boundary: &mut u64) -> bool {
    let elapsed = now.saturating_sub(*boundary);
    if elapsed < period {
        return false;
    }
    *boundary += period * (elapsed / period);
    true
}

/// Replace `last` with `current` and hand back `(previous, current)` when
/// they differ.
fn changed<T: PartialEq + Clone>(last: &mut T, current: T) -> Option<(T, T)> {
    if *last == current {
        return None;
    }
    let previous = std::mem::replace(last, current.clone());
    Some((previous, current))
}

fn read_analog(input: &dyn AnalogInput, use_average: bool) -> f64 {
    if use_average {
        input.average_voltage()
    } else {
        input.voltage()
    }
}

fn publish_every<D: PhoenixDevice + ?Sized>(device: &D, period: Duration) {
    if period.is_zero() {
        return;
    }
    let hz = 1.0 / period.as_secs_f64();
    let status = device.set_update_frequency(hz);
    if !status.is_ok() {
        warn!(can_id = device.can_id(), hz, ?status, "could not set update frequency");
    }
}

fn read_encoder(device: &dyn CanCoder) -> EncoderSnapshot {
    EncoderSnapshot {
        absolute_position: device.absolute_position(),
        relative_position: device.position_since_boot(),
        velocity: CanCoder::velocity(device),
    }
}

fn read_gyro(device: &dyn Pigeon) -> GyroSnapshot {
    GyroSnapshot {
        yaw: device.yaw(),
        pitch: device.pitch(),
        roll: device.roll(),
        yaw_rate: device.angular_velocity_z_world(),
        pitch_rate: device.angular_velocity_y_world(),
        roll_rate: device.angular_velocity_x_world(),
    }
}

fn read_motor(device: &dyn TalonMotor) -> MotorSnapshot {
    MotorSnapshot {
        position: device.position(),
        velocity: TalonMotor::velocity(device),
    }
}

fn encoder_units(raw: EncoderSnapshot) -> EncoderSnapshot {
    EncoderSnapshot {
        absolute_position: raw.absolute_position.scaled(DEGREES_PER_ROTATION),
        relative_position: raw.relative_position.scaled(DEGREES_PER_ROTATION),
        velocity: raw.velocity.scaled(RADIANS_PER_ROTATION),
    }
}

fn gyro_units(raw: GyroSnapshot) -> GyroSnapshot {
    let to_radians = 1f64.to_radians();
    GyroSnapshot {
        yaw_rate: raw.yaw_rate.scaled(to_radians),
        pitch_rate: raw.pitch_rate.scaled(to_radians),
        roll_rate: raw.roll_rate.scaled(to_radians),
        ..raw
    }
}

fn motor_units(raw: MotorSnapshot) -> MotorSnapshot {
    MotorSnapshot {
        position: raw.position.scaled(DEGREES_PER_ROTATION),
        velocity: raw.velocity.scaled(RADIANS_PER_ROTATION),
    }
}
