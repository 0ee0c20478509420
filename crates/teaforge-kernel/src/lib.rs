//! # teaforge-kernel
//!
//! The platform core behind a teaforge robot program. A program describes
//! what it wants done as [`Effect`] values and what it wants to hear about as
//! [`Subscription`] values; this crate performs the former and polls the
//! latter against a [`PlatformState`] that is threaded by value through every
//! call.
//!
//! - [`apply`] runs one effect and returns the state plus the callback's
//!   message. Failures arrive as [`PlatformError`](teaforge_types::PlatformError)
//!   values inside that message.
//! - [`Subscription::start`] produces a [`SubscriptionRecord`] whose
//!   [`poll`](SubscriptionRecord::poll) emits at most one message per cycle.
//! - [`TokenRegistry`] guarantees a hardware resource is opened at most once.

pub mod effect;
pub mod interpret;
mod normalize;
pub mod registry;
pub mod schedule;
pub mod state;
pub mod subscription;
pub mod token;

pub use effect::{Callback, CanDeviceKind, Effect, Outcome};
pub use interpret::{apply, apply_all};
pub use registry::{ResourceKey, ResourceToken, TokenRegistry};
pub use schedule::SubscriptionRecord;
pub use state::{PlatformSettings, PlatformState};
pub use subscription::{Handler, Subscription};
pub use token::{
    AnalogInputToken, AnalogOutputToken, CanDeviceToken, CanMotorToken, DigitalInputToken,
    DigitalOutputToken, EncoderToken, GyroToken, HidInputToken, NeoMotorToken, OrchestraToken,
    PwmOutputToken, TalonMotorToken, WebSocketToken,
};
