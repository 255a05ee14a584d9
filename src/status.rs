//! This module models the IEEE 488.2 / SCPI status registers of the instrument.
//!
//! There are three register groups (measurement, operation, questionable), each with an event,
//! condition and enable register:
//! * Event registers latch and are cleared by reading them.
//! * Condition registers reflect the live state and can be read any number of times.
//! * Enable registers select which event bits propagate into the status byte.

use modular_bitfield::prelude::*;
use strum_macros::{Display, EnumIter};

use crate::command::{CommandChannel, Dispatch};
use crate::error::{Error, Result};
use crate::parameter::ParameterCache;
use crate::transport::Transport;
use crate::validate::{ParamValue, REGISTER_16};

/// A status register group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
pub enum RegisterGroup {
    Measurement,
    Operation,
    Questionable,
}

/// One of the three registers of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum RegisterRole {
    /// Latched events, cleared on read.
    Event,
    /// Live state.
    Condition,
    /// Mask of events reported in the status byte.
    Enable,
}

impl RegisterGroup {
    pub const fn path(self) -> &'static str {
        match self {
            RegisterGroup::Measurement => ":STAT:MEAS",
            RegisterGroup::Operation => ":STAT:OPER",
            RegisterGroup::Questionable => ":STAT:QUES",
        }
    }

    /// Query for the given register of this group.
    pub fn query(self, role: RegisterRole) -> String {
        match role {
            RegisterRole::Event => format!("{}:EVEN?", self.path()),
            RegisterRole::Condition => format!("{}:COND?", self.path()),
            RegisterRole::Enable => format!("{}:ENAB?", self.path()),
        }
    }

    /// Write path of the enable register. Event and condition registers are read only.
    pub fn enable_write(self) -> String {
        format!("{}:ENAB", self.path())
    }
}

/// The status byte, as returned by `*STB?` and masked by `*SRE`.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusByte {
    /// Summary of the enabled measurement events.
    pub measurement_summary: bool,
    #[skip]
    __: B1,
    pub error_queue_not_empty: bool,
    pub questionable_summary: bool,
    pub message_available: bool,
    /// Summary of the enabled standard events, see [`StandardEvent`].
    pub event_summary: bool,
    /// The device is requesting service.
    pub request_service: bool,
    pub operation_summary: bool,
}

impl StatusByte {
    pub fn bits(self) -> u8 {
        self.into_bytes()[0]
    }
}

impl From<u8> for StatusByte {
    fn from(value: u8) -> Self {
        StatusByte::from_bytes([value])
    }
}

/// The standard event status register, as returned by `*ESR?` and masked by `*ESE`.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardEvent {
    pub operation_complete: bool,
    pub request_control: bool,
    pub query_error: bool,
    pub device_error: bool,
    pub execution_error: bool,
    pub command_error: bool,
    pub user_request: bool,
    pub power_on: bool,
}

impl StandardEvent {
    pub fn bits(self) -> u8 {
        self.into_bytes()[0]
    }
}

impl From<u8> for StandardEvent {
    fn from(value: u8) -> Self {
        StandardEvent::from_bytes([value])
    }
}

/// Bits owned by one channel in the shared measurement register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLayout {
    pub reading_available: u16,
    pub trigger_timeout: u16,
    pub overflow: u16,
}

impl ChannelLayout {
    pub const CHANNEL_A: Self = Self {
        reading_available: 1 << 5,
        trigger_timeout: 1 << 4,
        overflow: 1 << 3,
    };

    pub const CHANNEL_B: Self = Self {
        reading_available: 1 << 8,
        trigger_timeout: 1 << 7,
        overflow: 1 << 6,
    };

    /// All bits of this layout, the value written to the measurement enable register.
    pub const fn mask(self) -> u16 {
        self.reading_available | self.trigger_timeout | self.overflow
    }

    pub const fn decode(self, event: u16) -> ChannelEvents {
        ChannelEvents {
            reading_available: event & self.reading_available != 0,
            trigger_timeout: event & self.trigger_timeout != 0,
            overflow: event & self.overflow != 0,
        }
    }
}

/// A measurement event register value seen through a [`ChannelLayout`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelEvents {
    pub reading_available: bool,
    pub trigger_timeout: bool,
    pub overflow: bool,
}

/// Register access for the three groups, plus the error queue.
///
/// Enable registers are cached from device echoes like any other parameter.
#[derive(Debug, Default)]
pub struct StatusRegisters {
    enable: ParameterCache<RegisterGroup>,
}

impl StatusRegisters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and thereby clear the event register of `group`.
    pub fn read_event<T: Transport>(
        &mut self,
        bus: &mut CommandChannel<T>,
        group: RegisterGroup,
    ) -> Result<u16, T::Error> {
        let response = bus.read(&group.query(RegisterRole::Event))?;
        parse_register(&response)
    }

    pub fn read_condition<T: Transport>(
        &mut self,
        bus: &mut CommandChannel<T>,
        group: RegisterGroup,
    ) -> Result<u16, T::Error> {
        let response = bus.read(&group.query(RegisterRole::Condition))?;
        parse_register(&response)
    }

    /// Query the enable register of `group` from the device.
    pub fn enable<T: Transport>(
        &mut self,
        bus: &mut CommandChannel<T>,
        group: RegisterGroup,
    ) -> Result<u16, T::Error> {
        let response = bus.sync(&group.query(RegisterRole::Enable), &mut self.enable, group)?;
        parse_register(&response)
    }

    /// Program the enable register of `group`, caching the device echo.
    pub fn set_enable<T: Transport>(
        &mut self,
        bus: &mut CommandChannel<T>,
        group: RegisterGroup,
        value: u16,
    ) -> Result<Dispatch, T::Error> {
        bus.read_write(
            &group.query(RegisterRole::Enable),
            &group.enable_write(),
            &REGISTER_16,
            Some(&ParamValue::from(value)),
            &mut self.enable,
            group,
        )
    }

    /// Last enable value confirmed by the device.
    pub fn cached_enable(&self, group: RegisterGroup) -> Option<u16> {
        self.enable
            .get(&group)
            .and_then(|response| parse_register::<core::convert::Infallible>(response).ok())
    }

    /// Reset all enable registers to their power on state.
    pub fn preset<T: Transport>(&mut self, bus: &mut CommandChannel<T>) -> Result<(), T::Error> {
        bus.send(":STAT:PRES")
    }

    pub fn clear_error_queue<T: Transport>(
        &mut self,
        bus: &mut CommandChannel<T>,
    ) -> Result<(), T::Error> {
        bus.send(":SYST:CLE")
    }

    /// Pop the oldest entry of the error queue, e.g. `0,"No error"`.
    pub fn error_queue<T: Transport>(
        &mut self,
        bus: &mut CommandChannel<T>,
    ) -> Result<String, T::Error> {
        bus.read(":SYST:ERR?")
    }
}

/// Parse a register response such as `+48`.
pub(crate) fn parse_register<I: embedded_io::Error>(response: &str) -> Result<u16, I> {
    response
        .trim()
        .trim_start_matches('+')
        .parse()
        .map_err(|_| Error::invalid(response))
}
