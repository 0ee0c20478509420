//! Capability tokens.
//!
//! A token proves that a resource was initialized by the interpreter and
//! carries the shared driver handle needed to address it again. Every
//! constructor is `pub(crate)`: code outside this crate can clone, inspect
//! and hand back tokens, but never make one up.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use teaforge_hal::{
    AnalogInput, AnalogOutput, CanCoder, DigitalInput, DigitalOutput, NeoMotor, Orchestra,
    Pigeon, PwmOutput, TalonMotor,
};
use teaforge_net::WebSocketSession;
use teaforge_types::{AnalogPort, CanId, DigitalPort, HidSlot, PwmPort};
use uuid::Uuid;

macro_rules! port_token {
    ($(#[$meta:meta])* $name:ident, $port_ty:ty, $handle:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            port: $port_ty,
            grant: Uuid,
            handle: Arc<dyn $handle>,
        }

        impl $name {
            pub(crate) fn new(port: $port_ty, handle: Arc<dyn $handle>) -> Self {
                Self {
                    port,
                    grant: Uuid::new_v4(),
                    handle,
                }
            }

            pub fn port(&self) -> $port_ty {
                self.port
            }

            pub(crate) fn grant(&self) -> Uuid {
                self.grant
            }

            pub(crate) fn handle(&self) -> &Arc<dyn $handle> {
                &self.handle
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("port", &self.port)
                    .finish_non_exhaustive()
            }
        }
    };
}

port_token!(
    /// A digital line configured as an input.
    DigitalInputToken, DigitalPort, DigitalInput
);
port_token!(
    /// A digital line configured as an output.
    DigitalOutputToken, DigitalPort, DigitalOutput
);
port_token!(AnalogInputToken, AnalogPort, AnalogInput);
port_token!(AnalogOutputToken, AnalogPort, AnalogOutput);
port_token!(PwmOutputToken, PwmPort, PwmOutput);

/// A driver-station joystick slot. Subscriptions open their own device view
/// from the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HidInputToken {
    slot: HidSlot,
}

impl HidInputToken {
    pub(crate) fn new(slot: HidSlot) -> Self {
        Self { slot }
    }

    pub fn slot(&self) -> HidSlot {
        self.slot
    }
}

macro_rules! can_token {
    ($(#[$meta:meta])* $name:ident, $handle:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            id: CanId,
            grant: Uuid,
            handle: Arc<dyn $handle>,
        }

        impl $name {
            pub(crate) fn new(id: CanId, handle: Arc<dyn $handle>) -> Self {
                Self {
                    id,
                    grant: Uuid::new_v4(),
                    handle,
                }
            }

            pub fn can_id(&self) -> CanId {
                self.id
            }

            pub(crate) fn grant(&self) -> Uuid {
                self.grant
            }

            pub(crate) fn handle(&self) -> &Arc<dyn $handle> {
                &self.handle
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("can_id", &self.id)
                    .finish_non_exhaustive()
            }
        }
    };
}

can_token!(
    /// SPARK MAX + NEO.
    NeoMotorToken, NeoMotor
);
can_token!(
    /// TalonFX. Also the instrument for song playback.
    TalonMotorToken, TalonMotor
);
can_token!(
    /// CANcoder.
    EncoderToken, CanCoder
);
can_token!(
    /// Pigeon 2.
    GyroToken, Pigeon
);

/// A motor controller of either vendor family.
#[derive(Debug, Clone)]
pub enum CanMotorToken {
    Neo(NeoMotorToken),
    Talon(TalonMotorToken),
}

impl CanMotorToken {
    pub fn can_id(&self) -> CanId {
        match self {
            CanMotorToken::Neo(t) => t.can_id(),
            CanMotorToken::Talon(t) => t.can_id(),
        }
    }

    pub(crate) fn grant(&self) -> Uuid {
        match self {
            CanMotorToken::Neo(t) => t.grant(),
            CanMotorToken::Talon(t) => t.grant(),
        }
    }
}

/// Result of `InitCanDevice`: whichever device family was asked for.
#[derive(Debug, Clone)]
pub enum CanDeviceToken {
    Motor(CanMotorToken),
    Encoder(EncoderToken),
    Gyro(GyroToken),
}

impl CanDeviceToken {
    pub fn can_id(&self) -> CanId {
        match self {
            CanDeviceToken::Motor(t) => t.can_id(),
            CanDeviceToken::Encoder(t) => t.can_id(),
            CanDeviceToken::Gyro(t) => t.can_id(),
        }
    }

    pub(crate) fn grant(&self) -> Uuid {
        match self {
            CanDeviceToken::Motor(t) => t.grant(),
            CanDeviceToken::Encoder(t) => t.grant(),
            CanDeviceToken::Gyro(t) => t.grant(),
        }
    }
}

/// A loaded song bound to one TalonFX.
///
/// The session id tells two loads on the same motor apart, so a token kept
/// from a stopped session cannot address its successor.
#[derive(Clone)]
pub struct OrchestraToken {
    motor: CanId,
    session: Uuid,
    song: PathBuf,
    orchestra: Arc<dyn Orchestra>,
}

impl OrchestraToken {
    pub(crate) fn new(motor: CanId, song: PathBuf, orchestra: Arc<dyn Orchestra>) -> Self {
        Self {
            motor,
            session: Uuid::new_v4(),
            song,
            orchestra,
        }
    }

    pub fn motor(&self) -> CanId {
        self.motor
    }

    pub fn session(&self) -> Uuid {
        self.session
    }

    /// Scratch file the song bytes were written to.
    pub fn song_path(&self) -> &Path {
        &self.song
    }

    pub(crate) fn orchestra(&self) -> &Arc<dyn Orchestra> {
        &self.orchestra
    }
}

impl fmt::Debug for OrchestraToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestraToken")
            .field("motor", &self.motor)
            .field("session", &self.session)
            .field("song", &self.song)
            .finish_non_exhaustive()
    }
}

/// An open websocket connection.
///
/// All clones share the session; closing it through one (subscription stop
/// or platform shutdown) closes it for every holder.
#[derive(Clone)]
pub struct WebSocketToken {
    url: String,
    session_id: Uuid,
    session: Arc<Mutex<Option<WebSocketSession>>>,
}

impl WebSocketToken {
    pub(crate) fn new(session: WebSocketSession) -> Self {
        Self {
            url: session.url().to_string(),
            session_id: Uuid::new_v4(),
            session: Arc::new(Mutex::new(Some(session))),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn session(&self) -> Uuid {
        self.session_id
    }

    /// `false` once the session was closed.
    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Option<WebSocketSession>> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take the session out for closing. Later holders see it closed.
    pub(crate) fn take(&self) -> Option<WebSocketSession> {
        self.lock().take()
    }
}

impl fmt::Debug for WebSocketToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketToken")
            .field("url", &self.url)
            .field("session", &self.session_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teaforge_hal::{Hardware, SimHardware};

    #[test]
    fn can_motor_token_reports_its_id() {
        let sim = SimHardware::builder().with_talon(7).with_neo(8).build();
        let talon = CanMotorToken::Talon(TalonMotorToken::new(7, sim.open_talon(7).unwrap()));
        let neo = CanMotorToken::Neo(NeoMotorToken::new(8, sim.open_neo(8).unwrap()));
        assert_eq!(talon.can_id(), 7);
        assert_eq!(neo.can_id(), 8);
        assert_eq!(CanDeviceToken::Motor(talon).can_id(), 7);
    }

    #[test]
    fn debug_output_hides_handles() {
        let sim = SimHardware::new();
        let token =
            DigitalInputToken::new(DigitalPort::Three, sim.open_digital_input(DigitalPort::Three).unwrap());
        let text = format!("{token:?}");
        assert!(text.contains("DigitalInputToken"));
        assert!(text.contains("Three"));
    }
}
