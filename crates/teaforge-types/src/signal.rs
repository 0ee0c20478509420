//! Timestamped CAN samples.
//!
//! A [`SignalValue`] is what a Phoenix device reports for one status signal.
//! The timestamp is the authoritative freshness marker: two reads are the
//! same sample iff their timestamps are equal, even when the values match
//! by coincidence or differ by re-conversion.

use serde::{Deserialize, Serialize};

use crate::status::PhoenixStatus;

/// One sample of a device status signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalValue {
    pub value: f64,
    /// Monotonic receive time in microseconds.
    pub timestamp: u64,
    pub status: PhoenixStatus,
}

impl SignalValue {
    pub fn new(value: f64, timestamp: u64, status: PhoenixStatus) -> Self {
        Self {
            value,
            timestamp,
            status,
        }
    }

    pub fn is_same_sample(&self, other: &SignalValue) -> bool {
        self.timestamp == other.timestamp
    }

    /// Rescale the value, keeping timestamp and status.
    pub fn scaled(self, factor: f64) -> SignalValue {
        SignalValue {
            value: self.value * factor,
            ..self
        }
    }
}

fn any_advanced(current: &[&SignalValue], previous: &[&SignalValue]) -> bool {
    current
        .iter()
        .zip(previous)
        .any(|(now, before)| !now.is_same_sample(before))
}

/// CANcoder signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EncoderSnapshot {
    pub absolute_position: SignalValue,
    pub relative_position: SignalValue,
    pub velocity: SignalValue,
}

impl EncoderSnapshot {
    fn signals(&self) -> [&SignalValue; 3] {
        [&self.absolute_position, &self.relative_position, &self.velocity]
    }

    /// `true` when at least one signal carries a newer sample than `previous`.
    pub fn advanced_since(&self, previous: &EncoderSnapshot) -> bool {
        any_advanced(&self.signals(), &previous.signals())
    }
}

/// Pigeon 2 orientation and world-frame angular rates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GyroSnapshot {
    pub yaw: SignalValue,
    pub pitch: SignalValue,
    pub roll: SignalValue,
    pub yaw_rate: SignalValue,
    pub pitch_rate: SignalValue,
    pub roll_rate: SignalValue,
}

impl GyroSnapshot {
    fn signals(&self) -> [&SignalValue; 6] {
        [
            &self.yaw,
            &self.pitch,
            &self.roll,
            &self.yaw_rate,
            &self.pitch_rate,
            &self.roll_rate,
        ]
    }

    pub fn advanced_since(&self, previous: &GyroSnapshot) -> bool {
        any_advanced(&self.signals(), &previous.signals())
    }
}

/// TalonFX rotor signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorSnapshot {
    pub position: SignalValue,
    pub velocity: SignalValue,
}

impl MotorSnapshot {
    pub fn advanced_since(&self, previous: &MotorSnapshot) -> bool {
        any_advanced(
            &[&self.position, &self.velocity],
            &[&previous.position, &previous.velocity],
        )
    }
}
