//! This module contains the small identity and state types used across the bus API.

use core::fmt;

use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::status::ChannelLayout;
use crate::validate::{ParamValue, RELAY_INDEX, ValidationError};

/// One of the two independent output channels.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Channel {
    A,
    B,
}

impl Channel {
    /// The channel letter as used inside command paths.
    pub fn token(self) -> &'static str {
        self.into()
    }

    /// Bits of the shared measurement event register owned by this channel.
    pub const fn layout(self) -> ChannelLayout {
        match self {
            Channel::A => ChannelLayout::CHANNEL_A,
            Channel::B => ChannelLayout::CHANNEL_B,
        }
    }

    /// Starts a pulse measurement on this channel only.
    pub const fn arm_token(self) -> &'static str {
        match self {
            Channel::A => "*AARM",
            Channel::B => "*BARM",
        }
    }

    /// Arms this channel and issues a soft trigger.
    pub const fn trigger_token(self) -> &'static str {
        match self {
            Channel::A => "*ATRG",
            Channel::B => "*BTRG",
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Channel::A => 0,
            Channel::B => 1,
        }
    }
}

/// One of the four output relays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Relay(u8);

impl Relay {
    pub const ALL: [Relay; 4] = [Relay(1), Relay(2), Relay(3), Relay(4)];

    /// Relays are numbered 1 to 4.
    pub fn new(number: u8) -> Result<Self, ValidationError> {
        RELAY_INDEX.validate(&ParamValue::from(number))?;
        Ok(Relay(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl fmt::Display for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "relay {}", self.0)
    }
}

/// On/off state of an output, relay or switch. Written as `ON`/`OFF`, read back as `1`/`0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum State {
    /// Disabled.
    #[default]
    Off,
    /// Enabled.
    On,
}

impl State {
    pub const fn token(self) -> &'static str {
        match self {
            State::Off => "OFF",
            State::On => "ON",
        }
    }

    /// Interpret a device response such as `1`, `0`, `ON` or `OFF`.
    pub fn from_response(response: &str) -> Option<Self> {
        match response.trim() {
            "1" => Some(State::On),
            "0" => Some(State::Off),
            other if other.eq_ignore_ascii_case("ON") => Some(State::On),
            other if other.eq_ignore_ascii_case("OFF") => Some(State::Off),
            _ => None,
        }
    }
}

impl From<State> for bool {
    fn from(value: State) -> Self {
        match value {
            State::Off => false,
            State::On => true,
        }
    }
}

impl From<bool> for State {
    fn from(value: bool) -> Self {
        match value {
            true => State::On,
            false => State::Off,
        }
    }
}

/// Quantity measured by the channel's sense function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum Quantity {
    #[strum(serialize = "VOLT")]
    Voltage,
    #[strum(serialize = "CURR")]
    Current,
}

impl Quantity {
    pub fn token(self) -> &'static str {
        self.into()
    }
}

/// Statistic evaluated over a measurement interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, IntoStaticStr)]
pub enum Statistic {
    #[strum(serialize = "LOW")]
    Low,
    #[strum(serialize = "HIGH")]
    High,
    #[strum(serialize = "MIN")]
    Min,
    #[strum(serialize = "PEAK")]
    Peak,
    #[strum(serialize = "AVER")]
    Average,
    #[strum(serialize = "RMS")]
    Rms,
    /// Reading of the digital voltmeter input.
    #[strum(serialize = "DVM")]
    Dvm,
}

impl Statistic {
    pub fn token(self) -> &'static str {
        self.into()
    }
}

/// Target of an arm or soft trigger command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerTarget {
    Both,
    Channel(Channel),
}

impl TriggerTarget {
    pub const fn arm_token(self) -> &'static str {
        match self {
            TriggerTarget::Both => "*ARM",
            TriggerTarget::Channel(channel) => channel.arm_token(),
        }
    }

    pub const fn trigger_token(self) -> &'static str {
        match self {
            TriggerTarget::Both => "*TTRG",
            TriggerTarget::Channel(channel) => channel.trigger_token(),
        }
    }
}

impl From<Channel> for TriggerTarget {
    fn from(value: Channel) -> Self {
        TriggerTarget::Channel(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn channel_parses_case_insensitively() {
        assert_eq!("a".parse::<Channel>().unwrap(), Channel::A);
        assert_eq!("B".parse::<Channel>().unwrap(), Channel::B);
        assert!("c".parse::<Channel>().is_err());
        assert_eq!(Channel::B.to_string(), "B");
    }

    #[test]
    fn channel_tokens_are_distinct() {
        assert_ne!(Channel::A.arm_token(), Channel::B.arm_token());
        assert_ne!(Channel::A.trigger_token(), Channel::B.trigger_token());
        for (i, channel) in Channel::iter().enumerate() {
            assert_eq!(channel.index(), i);
        }
    }

    #[test]
    fn relay_numbers_are_validated() {
        assert_eq!(Relay::new(4).unwrap(), Relay::ALL[3]);
        assert!(Relay::new(0).is_err());
        assert!(Relay::new(5).is_err());
        assert_eq!(Relay::ALL[1].index(), 1);
        assert_eq!(Relay::ALL[1].to_string(), "relay 2");
    }

    #[test]
    fn state_from_response() {
        assert_eq!(State::from_response("1\n"), Some(State::On));
        assert_eq!(State::from_response("off"), Some(State::Off));
        assert_eq!(State::from_response("maybe"), None);
        assert!(bool::from(State::from(true)));
    }

    #[test]
    fn trigger_targets() {
        assert_eq!(TriggerTarget::Both.arm_token(), "*ARM");
        assert_eq!(TriggerTarget::from(Channel::B).trigger_token(), "*BTRG");
        assert_eq!(Statistic::Average.token(), "AVER");
        assert_eq!(Quantity::Current.token(), "CURR");
    }
}
