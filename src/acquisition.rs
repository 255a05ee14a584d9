//! Pulse acquisition: arm a channel, wait for the instrument to signal completion and fetch the
//! captured samples.
//!
//! A run moves through `Idle -> Armed -> WaitingForNotification` and ends in one of `DataReady`,
//! `TimedOut` or `Unknown` before returning to `Idle`. The measurement enable register and the
//! service request enable mask are reprogrammed for the duration of a run and restored on every
//! exit path, including bus errors.

use fugit::MillisDurationU32;
use tracing::{debug, info, trace, warn};

use crate::command::CommandChannel;
use crate::common::CommonCommands;
use crate::error::{Error, Result};
use crate::parameter::{Parameter, ParameterCache, SAMPLE_LENGTH, Scope};
use crate::status::{ChannelEvents, RegisterGroup, StatusByte, StatusRegisters};
use crate::transport::Transport;
use crate::types::Channel;
use crate::validate::NumericDomain;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AcquisitionState {
    #[default]
    Idle,
    Armed,
    WaitingForNotification,
    DataReady,
    TimedOut,
    Unknown,
}

/// Quantity captured by a pulse acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    Current,
    Voltage,
}

impl SampleKind {
    /// Interpret the sample source setting. `CURR` and `CURRENT` select current, anything else is
    /// a voltage.
    pub fn from_source(source: &str) -> Self {
        let source = source.trim();
        if source.eq_ignore_ascii_case("CURR") || source.eq_ignore_ascii_case("CURRENT") {
            SampleKind::Current
        } else {
            SampleKind::Voltage
        }
    }
}

/// Samples of the last successful acquisition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleBuffer {
    kind: Option<SampleKind>,
    values: Vec<f64>,
    seconds: Vec<f64>,
}

impl SampleBuffer {
    pub fn kind(&self) -> Option<SampleKind> {
        self.kind
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Time axis of the acquisition in seconds.
    ///
    /// Built from the configured sample length and interval, so it need not have the same length
    /// as [`Self::values`].
    pub fn seconds(&self) -> &[f64] {
        &self.seconds
    }

    pub fn current(&self) -> Option<&[f64]> {
        (self.kind == Some(SampleKind::Current)).then_some(self.values.as_slice())
    }

    pub fn voltage(&self) -> Option<&[f64]> {
        (self.kind == Some(SampleKind::Voltage)).then_some(self.values.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// How an acquisition run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Samples were fetched into the channel's [`SampleBuffer`].
    DataReady { kind: SampleKind, points: usize },
    /// The instrument gave up waiting for a trigger.
    TimedOut,
    /// Neither a reading nor a trigger timeout was flagged. Holds the raw event register.
    Unknown { event: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionReport {
    pub outcome: Outcome,
    /// The measurement range overflowed during the run. Samples may be clipped.
    pub overflow: bool,
    /// Measurement event register as read after the wait.
    pub event: u16,
}

/// Runs pulse acquisitions on one channel.
#[derive(Debug)]
pub struct AcquisitionController {
    channel: Channel,
    state: AcquisitionState,
    samples: SampleBuffer,
}

impl AcquisitionController {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            state: AcquisitionState::Idle,
            samples: SampleBuffer::default(),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn samples(&self) -> &SampleBuffer {
        &self.samples
    }

    /// Run one acquisition.
    ///
    /// `settings` holds the channel's device-confirmed parameters. The sample source, length and
    /// interval are taken from there, without querying the device again.
    ///
    /// Trigger timeouts and unknown outcomes are reported in the [`AcquisitionReport`], only bus
    /// failures and unusable responses are errors.
    pub fn run<T: Transport>(
        &mut self,
        bus: &mut CommandChannel<T>,
        common: &mut CommonCommands,
        status: &mut StatusRegisters,
        settings: &ParameterCache<Parameter>,
        timeout: MillisDurationU32,
    ) -> Result<AcquisitionReport, T::Error> {
        self.samples.clear();
        status.clear_error_queue(bus)?;
        // Stale events from earlier runs would be misread as this run's outcome.
        status.read_event(bus, RegisterGroup::Measurement)?;

        let saved = status.enable(bus, RegisterGroup::Measurement)?;
        let outcome = self.arm_and_classify(bus, common, status, settings, timeout);
        let restored = status.set_enable(bus, RegisterGroup::Measurement, saved);
        self.transition(AcquisitionState::Idle);

        let report = outcome?;
        restored?;
        Ok(report)
    }

    fn arm_and_classify<T: Transport>(
        &mut self,
        bus: &mut CommandChannel<T>,
        common: &mut CommonCommands,
        status: &mut StatusRegisters,
        settings: &ParameterCache<Parameter>,
        timeout: MillisDurationU32,
    ) -> Result<AcquisitionReport, T::Error> {
        let layout = self.channel.layout();
        status.set_enable(bus, RegisterGroup::Measurement, layout.mask())?;

        let waited = self.request_service_and_wait(bus, common, timeout);
        // The SRE write may have landed even if its echo failed.
        let cleared = common.sre(bus, Some(0));
        waited?;
        cleared?;

        let event = status.read_event(bus, RegisterGroup::Measurement)?;
        let events = layout.decode(event);
        let outcome = self.classify(bus, settings, event, events)?;

        if events.overflow {
            warn!(channel = %self.channel, event, "measurement range overflow");
        }

        Ok(AcquisitionReport {
            outcome,
            overflow: events.overflow,
            event,
        })
    }

    fn request_service_and_wait<T: Transport>(
        &mut self,
        bus: &mut CommandChannel<T>,
        common: &mut CommonCommands,
        timeout: MillisDurationU32,
    ) -> Result<(), T::Error> {
        let service_request = StatusByte::new().with_measurement_summary(true).bits();
        common.sre(bus, Some(service_request))?;
        self.transition(AcquisitionState::Armed);

        common.wait(bus)?;
        bus.send(self.channel.arm_token())?;
        self.transition(AcquisitionState::WaitingForNotification);
        let notification = bus.transport_mut().wait_for_notification(timeout)?;
        debug!(channel = %self.channel, ?notification, "wait finished");
        Ok(())
    }

    fn classify<T: Transport>(
        &mut self,
        bus: &mut CommandChannel<T>,
        settings: &ParameterCache<Parameter>,
        event: u16,
        events: ChannelEvents,
    ) -> Result<Outcome, T::Error> {
        if events.reading_available {
            self.transition(AcquisitionState::DataReady);
            let (kind, points) = self.fetch(bus, settings)?;
            info!(channel = %self.channel, ?kind, points, "acquisition complete");
            Ok(Outcome::DataReady { kind, points })
        } else if events.trigger_timeout {
            self.transition(AcquisitionState::TimedOut);
            warn!(channel = %self.channel, event, "trigger timeout");
            Ok(Outcome::TimedOut)
        } else {
            self.transition(AcquisitionState::Unknown);
            warn!(channel = %self.channel, event, "acquisition ended without a reading");
            Ok(Outcome::Unknown { event })
        }
    }

    fn fetch<T: Transport>(
        &mut self,
        bus: &mut CommandChannel<T>,
        settings: &ParameterCache<Parameter>,
    ) -> Result<(SampleKind, usize), T::Error> {
        let source = self.setting::<T::Error>(settings, Parameter::SampleSource)?;
        let kind = SampleKind::from_source(source);
        let interval = self.numeric_setting::<T::Error>(settings, Parameter::SampleInterval)?;
        let length = self.sample_length::<T::Error>(settings)?;

        let response = bus.read(&format!(":FETC:{}:ARR?", self.channel.token()))?;
        let values = parse_samples::<T::Error>(&response)?;
        let points = values.len();

        self.samples = SampleBuffer {
            kind: Some(kind),
            values,
            seconds: (0..length).map(|i| i as f64 * interval).collect(),
        };
        Ok((kind, points))
    }

    fn setting<'a, I: embedded_io::Error>(
        &self,
        settings: &'a ParameterCache<Parameter>,
        parameter: Parameter,
    ) -> Result<&'a str, I> {
        settings
            .get(&parameter)
            .ok_or(Error::NotCached(parameter, Scope::Channel(self.channel)))
    }

    fn numeric_setting<I: embedded_io::Error>(
        &self,
        settings: &ParameterCache<Parameter>,
        parameter: Parameter,
    ) -> Result<f64, I> {
        let response = self.setting::<I>(settings, parameter)?;
        response
            .trim()
            .parse()
            .map_err(|_| Error::invalid(response))
    }

    /// Lengths may be reported in exponent notation. `9.91E+37` is the SCPI not-a-number value.
    fn sample_length<I: embedded_io::Error>(
        &self,
        settings: &ParameterCache<Parameter>,
    ) -> Result<usize, I> {
        let length = self.numeric_setting::<I>(settings, Parameter::SampleLength)?;
        let max = match SAMPLE_LENGTH.numeric_branch() {
            Some(NumericDomain::IntegerRange { max, .. }) => max as f64,
            _ => f64::from(u16::MAX),
        };
        if !(0.0..=max).contains(&length) {
            return Err(Error::invalid(settings.get(&Parameter::SampleLength).unwrap_or("")));
        }
        Ok(length.round() as usize)
    }

    fn transition(&mut self, next: AcquisitionState) {
        trace!(channel = %self.channel, from = ?self.state, to = ?next, "acquisition state");
        self.state = next;
    }
}

/// Parse an ASCII array response, e.g. `1.0;2.0;3.0`.
fn parse_samples<I: embedded_io::Error>(response: &str) -> Result<Vec<f64>, I> {
    response
        .split([';', ','])
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.parse().map_err(|_| Error::invalid(response)))
        .collect()
}
