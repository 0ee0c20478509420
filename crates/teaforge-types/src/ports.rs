//! Fixed catalog of addressable controller channels.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a device on the CAN bus.
pub type CanId = u8;

/// Driver-station joystick slot.
pub type HidSlot = u8;

/// Number of joystick slots the driver station exposes.
pub const HID_SLOT_COUNT: HidSlot = 6;

macro_rules! channel_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident = $channel:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every channel, in ascending order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Hardware channel number.
            pub const fn channel(self) -> u8 {
                match self {
                    $($name::$variant => $channel),+
                }
            }

            /// Look a channel up by its number.
            pub fn from_channel(channel: u8) -> Option<Self> {
                match channel {
                    $($channel => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", stringify!($name), self.channel())
            }
        }
    };
}

channel_enum! {
    /// Onboard digital I/O header.
    DigitalPort {
        Zero = 0, One = 1, Two = 2, Three = 3, Four = 4,
        Five = 5, Six = 6, Seven = 7, Eight = 8, Nine = 9,
    }
}

channel_enum! {
    /// Onboard analog input header.
    AnalogPort { Zero = 0, One = 1, Two = 2, Three = 3 }
}

channel_enum! {
    /// Onboard PWM header.
    PwmPort {
        Zero = 0, One = 1, Two = 2, Three = 3, Four = 4,
        Five = 5, Six = 6, Seven = 7, Eight = 8, Nine = 9,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_numbers_are_dense() {
        for (i, port) in DigitalPort::ALL.iter().enumerate() {
            assert_eq!(port.channel() as usize, i);
        }
        assert_eq!(AnalogPort::ALL.len(), 4);
        assert_eq!(PwmPort::ALL.len(), 10);
    }

    #[test]
    fn from_channel_rejects_out_of_range() {
        assert_eq!(DigitalPort::from_channel(7), Some(DigitalPort::Seven));
        assert_eq!(AnalogPort::from_channel(4), None);
        assert_eq!(PwmPort::from_channel(10), None);
    }

    #[test]
    fn display_names_the_header() {
        assert_eq!(PwmPort::Three.to_string(), "PwmPort3");
        assert_eq!(AnalogPort::Zero.to_string(), "AnalogPort0");
    }
}
