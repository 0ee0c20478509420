//! [`TokenRegistry`] – the set of live capability tokens.
//!
//! One logical map per resource kind, realized as a single map keyed by
//! [`ResourceKey`] (kind + identifier). [`TokenRegistry::register`] is the
//! only idempotency guard in the platform: a second registration for a live
//! key is refused with [`PlatformError::AlreadyInitialized`]. Releasing a key
//! forgets the token but never touches the hardware behind it.

use std::collections::HashMap;
use std::fmt;

use teaforge_types::{AnalogPort, CanId, DigitalPort, HidSlot, PlatformError, PwmPort};
use uuid::Uuid;

use crate::token::{
    AnalogInputToken, AnalogOutputToken, CanDeviceToken, DigitalInputToken, DigitalOutputToken,
    HidInputToken, OrchestraToken, PwmOutputToken, WebSocketToken,
};

/// Kind and identifier of an allocatable resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    DigitalInput(DigitalPort),
    DigitalOutput(DigitalPort),
    AnalogInput(AnalogPort),
    AnalogOutput(AnalogPort),
    PwmOutput(PwmPort),
    HidInput(HidSlot),
    /// NEO or TalonFX; one motor per CAN id.
    CanMotor(CanId),
    CanEncoder(CanId),
    CanGyro(CanId),
    /// Playback session, keyed by its motor.
    Orchestra(CanId),
    WebSocket(String),
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::DigitalInput(p) => write!(f, "digital input {p}"),
            ResourceKey::DigitalOutput(p) => write!(f, "digital output {p}"),
            ResourceKey::AnalogInput(p) => write!(f, "analog input {p}"),
            ResourceKey::AnalogOutput(p) => write!(f, "analog output {p}"),
            ResourceKey::PwmOutput(p) => write!(f, "PWM output {p}"),
            ResourceKey::HidInput(slot) => write!(f, "HID slot {slot}"),
            ResourceKey::CanMotor(id) => write!(f, "CAN motor {id}"),
            ResourceKey::CanEncoder(id) => write!(f, "CAN encoder {id}"),
            ResourceKey::CanGyro(id) => write!(f, "CAN gyro {id}"),
            ResourceKey::Orchestra(id) => write!(f, "orchestra on motor {id}"),
            ResourceKey::WebSocket(url) => write!(f, "websocket {url}"),
        }
    }
}

/// Any token the registry can hold.
#[derive(Debug, Clone)]
pub enum ResourceToken {
    DigitalInput(DigitalInputToken),
    DigitalOutput(DigitalOutputToken),
    AnalogInput(AnalogInputToken),
    AnalogOutput(AnalogOutputToken),
    PwmOutput(PwmOutputToken),
    HidInput(HidInputToken),
    CanDevice(CanDeviceToken),
    Orchestra(OrchestraToken),
    WebSocket(WebSocketToken),
}

impl ResourceToken {
    pub fn key(&self) -> ResourceKey {
        match self {
            ResourceToken::DigitalInput(t) => ResourceKey::DigitalInput(t.port()),
            ResourceToken::DigitalOutput(t) => ResourceKey::DigitalOutput(t.port()),
            ResourceToken::AnalogInput(t) => ResourceKey::AnalogInput(t.port()),
            ResourceToken::AnalogOutput(t) => ResourceKey::AnalogOutput(t.port()),
            ResourceToken::PwmOutput(t) => ResourceKey::PwmOutput(t.port()),
            ResourceToken::HidInput(t) => ResourceKey::HidInput(t.slot()),
            ResourceToken::CanDevice(CanDeviceToken::Motor(t)) => ResourceKey::CanMotor(t.can_id()),
            ResourceToken::CanDevice(CanDeviceToken::Encoder(t)) => {
                ResourceKey::CanEncoder(t.can_id())
            }
            ResourceToken::CanDevice(CanDeviceToken::Gyro(t)) => ResourceKey::CanGyro(t.can_id()),
            ResourceToken::Orchestra(t) => ResourceKey::Orchestra(t.motor()),
            ResourceToken::WebSocket(t) => ResourceKey::WebSocket(t.url().to_string()),
        }
    }

    /// Identity of the initialization that minted this token. HID tokens
    /// carry none; a slot has no driver state to go stale.
    pub(crate) fn grant(&self) -> Option<Uuid> {
        match self {
            ResourceToken::DigitalInput(t) => Some(t.grant()),
            ResourceToken::DigitalOutput(t) => Some(t.grant()),
            ResourceToken::AnalogInput(t) => Some(t.grant()),
            ResourceToken::AnalogOutput(t) => Some(t.grant()),
            ResourceToken::PwmOutput(t) => Some(t.grant()),
            ResourceToken::HidInput(_) => None,
            ResourceToken::CanDevice(t) => Some(t.grant()),
            ResourceToken::Orchestra(t) => Some(t.session()),
            ResourceToken::WebSocket(t) => Some(t.session()),
        }
    }
}

/// Live tokens of one platform state.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    tokens: HashMap<ResourceKey, ResourceToken>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `token` as live.
    ///
    /// # Errors
    ///
    /// [`PlatformError::AlreadyInitialized`] when a token for the same key is
    /// already live; the registry is left unchanged.
    pub(crate) fn register(&mut self, token: ResourceToken) -> Result<(), PlatformError> {
        let key = token.key();
        if self.tokens.contains_key(&key) {
            return Err(PlatformError::AlreadyInitialized);
        }
        self.tokens.insert(key, token);
        Ok(())
    }

    pub fn lookup(&self, key: &ResourceKey) -> Option<&ResourceToken> {
        self.tokens.get(key)
    }

    /// Forget the token for `key`, returning it. No-op for unknown keys.
    pub(crate) fn release(&mut self, key: &ResourceKey) -> Option<ResourceToken> {
        self.tokens.remove(key)
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.tokens.contains_key(key)
    }

    /// `true` when the token live under `key` is the one minted with `grant`.
    pub(crate) fn holds(&self, key: &ResourceKey, grant: Uuid) -> bool {
        self.tokens.get(key).and_then(ResourceToken::grant) == Some(grant)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Remove and return every token.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = ResourceToken> + '_ {
        self.tokens.drain().map(|(_, token)| token)
    }
}
