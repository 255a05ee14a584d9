//! We use this mocking module in unit tests to emulate an instrument on the command bus.
//!
//! Query responses are scripted per command. A write can be linked to a query so the query
//! afterwards echoes the written token, and a pinned response overrides the echo to emulate an
//! instrument clamping a value.

use std::collections::{BTreeMap, VecDeque};

use fugit::MillisDurationU32;
use strum::IntoEnumIterator;

use crate::error::{Error, Result};
use crate::parameter::{Parameter, Scope, ScopeKind};
use crate::status::{RegisterGroup, RegisterRole};
use crate::transport::{Notification, Transport};
use crate::types::{Channel, Relay};

/// One recorded bus operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    Write(String),
    Query(String),
    ReadRaw,
    /// Notification wait, with the timeout in milliseconds.
    Wait(u32),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MockBusError {
    /// A query was issued which has no scripted response.
    #[error("No scripted response for {0:?}")]
    Unscripted(String),
    /// Simulated failure for testing.
    #[error("Simulated bus error")]
    SimulatedError,
}

impl embedded_io::Error for MockBusError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockBusError::Unscripted(_) => embedded_io::ErrorKind::InvalidInput,
            MockBusError::SimulatedError => embedded_io::ErrorKind::Other,
        }
    }
}

/// Our mock type used to emulate the instrument side of a [`Transport`].
#[derive(Debug, Default)]
pub struct MockBus {
    /// Responses returned on every matching query.
    sticky: BTreeMap<String, String>,
    /// Responses consumed one at a time, before any sticky response.
    queued: BTreeMap<String, VecDeque<String>>,
    /// Responses which win over echoed writes.
    pinned: BTreeMap<String, String>,
    /// Write path to the query which echoes it.
    links: BTreeMap<String, String>,
    /// Commands which fail with a simulated bus error.
    failing: Vec<String>,
    raw: VecDeque<Vec<u8>>,
    notification: Option<Notification>,
    ops: Vec<BusOp>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// An instrument which answers every parameter and register query with a plausible value.
    pub fn with_ngmo2_defaults() -> Self {
        let mut bus = Self::new();
        for kind in [ScopeKind::Device, ScopeKind::Channel, ScopeKind::Relay] {
            for scope in scopes(kind) {
                for parameter in Parameter::of_kind(kind) {
                    let query = parameter.query_token(scope);
                    bus.respond(&query, default_response(parameter));
                    bus.link(&parameter.write_token(scope), &query);
                }
            }
        }
        for group in RegisterGroup::iter() {
            for role in RegisterRole::iter() {
                bus.respond(&group.query(role), "0");
            }
            bus.link(&group.enable_write(), &group.query(RegisterRole::Enable));
        }
        for register in ["*SRE", "*ESE", "*SAV", "*RCL"] {
            bus.respond(&format!("{register}?"), "0");
            bus.link(register, &format!("{register}?"));
        }
        bus.respond(":SYST:ERR?", "0,\"No error\"");
        bus.notify(Notification::ServiceRequest);
        bus
    }

    /// Answer `query` with `response` until told otherwise.
    pub fn respond(&mut self, query: &str, response: &str) {
        self.sticky.insert(query.into(), response.into());
    }

    /// Answer the next `query` with `response`. Queued responses are used in order.
    pub fn queue(&mut self, query: &str, response: &str) {
        self.queued
            .entry(query.into())
            .or_default()
            .push_back(response.into());
    }

    /// Always answer `query` with `response`, whatever was written.
    pub fn pin(&mut self, query: &str, response: &str) {
        self.pinned.insert(query.into(), response.into());
    }

    /// After `<write> <token>`, answer `query` with `token`.
    pub fn link(&mut self, write: &str, query: &str) {
        self.links.insert(write.into(), query.into());
    }

    pub fn fail_on(&mut self, command: &str) {
        self.failing.push(command.into());
    }

    pub fn queue_raw(&mut self, data: &[u8]) {
        self.raw.push_back(data.to_vec());
    }

    /// Outcome of every subsequent notification wait. Waits time out when unset.
    pub fn notify(&mut self, notification: Notification) {
        self.notification = Some(notification);
    }

    pub fn ops(&self) -> &[BusOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    pub fn writes(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                BusOp::Write(command) => Some(command.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn queries(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                BusOp::Query(command) => Some(command.as_str()),
                _ => None,
            })
            .collect()
    }

    fn check_failure(&self, command: &str) -> Result<(), MockBusError> {
        if self.failing.iter().any(|failing| failing == command) {
            return Err(Error::Bus(MockBusError::SimulatedError));
        }
        Ok(())
    }
}

impl Transport for MockBus {
    type Error = MockBusError;

    fn write(&mut self, command: &str) -> Result<(), MockBusError> {
        self.check_failure(command)?;
        self.ops.push(BusOp::Write(command.into()));
        if let Some((path, token)) = command.split_once(' ') {
            if let Some(query) = self.links.get(path).cloned() {
                self.sticky.insert(query, token.into());
            }
        }
        Ok(())
    }

    fn query(&mut self, command: &str) -> Result<String, MockBusError> {
        self.check_failure(command)?;
        self.ops.push(BusOp::Query(command.into()));
        if let Some(response) = self
            .queued
            .get_mut(command)
            .and_then(|responses| responses.pop_front())
        {
            return Ok(response);
        }
        self.pinned
            .get(command)
            .or_else(|| self.sticky.get(command))
            .cloned()
            .ok_or_else(|| Error::Bus(MockBusError::Unscripted(command.into())))
    }

    fn read_raw(&mut self) -> Result<Vec<u8>, MockBusError> {
        self.ops.push(BusOp::ReadRaw);
        self.raw.pop_front().ok_or(Error::Timeout)
    }

    fn wait_for_notification(
        &mut self,
        timeout: MillisDurationU32,
    ) -> Result<Notification, MockBusError> {
        self.ops.push(BusOp::Wait(timeout.to_millis()));
        Ok(self.notification.unwrap_or(Notification::TimedOut))
    }
}

fn scopes(kind: ScopeKind) -> Vec<Scope> {
    match kind {
        ScopeKind::Device => vec![Scope::Device],
        ScopeKind::Channel => Channel::iter().map(Scope::from).collect(),
        ScopeKind::Relay => Relay::ALL.into_iter().map(Scope::from).collect(),
    }
}

fn default_response(parameter: Parameter) -> &'static str {
    match parameter {
        Parameter::Output | Parameter::DisplayEnabled | Parameter::RelayState => "0",
        Parameter::Voltage | Parameter::CurrentLimit => "0.000",
        Parameter::CurrentRange => "AUTO",
        Parameter::MeasurementInterval => "0.020",
        Parameter::AverageCount | Parameter::TriggerCount => "1",
        Parameter::Impedance => "0.00",
        Parameter::OutputBandwidth => "LOW",
        Parameter::Sense => "VOLT",
        Parameter::SampleLength => "100",
        Parameter::SampleSource => "CURR",
        Parameter::SampleType => "AVER",
        Parameter::SampleInterval => "0.01000",
        Parameter::TriggerSource => "INT",
        Parameter::TriggerLevelLow
        | Parameter::TriggerLevelHigh
        | Parameter::TriggerLevelDvm => "AUTO",
        Parameter::TriggerSlope => "POS",
        Parameter::TriggerOffset => "0",
        Parameter::TriggerTimeout => "INF",
        Parameter::DisplayChannel => "A",
        Parameter::DataFormat => "ASC",
        Parameter::ByteOrder => "NORM",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unscripted_query_names_the_command() {
        let mut bus = MockBus::new();
        let error = bus.query(":SOUR:A:VOLT?").unwrap_err();
        assert!(matches!(error, Error::Bus(MockBusError::Unscripted(_))));
        if let Error::Bus(inner) = error {
            assert_eq!(embedded_io::Error::kind(&inner), embedded_io::ErrorKind::InvalidInput);
            assert_eq!(inner.to_string(), "No scripted response for \":SOUR:A:VOLT?\"");
        }
    }

    #[test]
    fn queued_responses_come_before_sticky_ones() {
        let mut bus = MockBus::new();
        bus.respond("*STB?", "0");
        bus.queue("*STB?", "64");
        assert_eq!(bus.query("*STB?").unwrap(), "64");
        assert_eq!(bus.query("*STB?").unwrap(), "0");
    }
}
