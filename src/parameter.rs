//! This module defines every settable parameter of the instrument.
//!
//! A [`Parameter`] is instantiated per [`Scope`]: the same table row describes voltage on channel
//! `A` and on channel `B`, the channel letter is spliced into the command path when it is
//! rendered.

use std::collections::BTreeMap;
use std::fmt;

use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use crate::types::{Channel, Relay};
use crate::validate::{Domain, LIMIT_ALIASES, ON_OFF};

const AUTO_LIMIT_ALIASES: &[&str] = &["AUTO", "MIN", "MAX", "DEF", "DEFAULT"];

pub const VOLTAGE: Domain = Domain::range(0.0, 15.0, 3).or_aliases(LIMIT_ALIASES);
pub const CURRENT_LIMIT: Domain = Domain::range(0.0, 5.0, 3).or_aliases(LIMIT_ALIASES);
pub const CURRENT_RANGE: Domain = Domain::set(&[5.0, 0.5, 0.005]).or_aliases(&[
    "AUTO", "LOW", "HIGH", "MIN", "MAX", "DEF", "DEFAULT", "5A", "0.5A", "0.005A",
]);
pub const MEASUREMENT_INTERVAL: Domain = Domain::range(0.002, 0.2, 3).or_aliases(LIMIT_ALIASES);
pub const AVERAGE_COUNT: Domain = Domain::integer_range(1, 10).or_aliases(LIMIT_ALIASES);
pub const IMPEDANCE: Domain = Domain::range(0.0, 1.0, 2).or_aliases(LIMIT_ALIASES);
pub const OUTPUT_BANDWIDTH: Domain =
    Domain::aliases(&["HIGH", "LOW", "MIN", "MAX", "DEF", "DEFAULT"]);
pub const SENSE_FUNCTION: Domain = Domain::aliases(&[
    "VOLT", "VOLTAGE", "CURR", "CURRENT", "DVM", "DVMETER", "AVER", "AVERAGE", "PEAK", "MIN",
    "HIGH", "LOW", "RMS",
]);
pub const SAMPLE_LENGTH: Domain = Domain::integer_range(1, 5000).or_aliases(LIMIT_ALIASES);
pub const SAMPLE_SOURCE: Domain =
    Domain::aliases(&["CURRENT", "CURR", "DVM", "MIN", "MAX", "DEF", "DEFAULT"]);
pub const SAMPLE_TYPE: Domain =
    Domain::aliases(&["AVER", "AVERAGE", "PEAK", "MIN", "HIGH", "LOW", "RMS"]);
pub const SAMPLE_INTERVAL: Domain = Domain::range(0.00001, 1.0, 5).or_aliases(LIMIT_ALIASES);
pub const TRIGGER_SOURCE: Domain =
    Domain::aliases(&["INT", "EXT", "MIN", "MAX", "DEF", "DEFAULT"]);
pub const TRIGGER_LEVEL_LOW: Domain = Domain::range(0.0, 0.5, 3).or_aliases(AUTO_LIMIT_ALIASES);
pub const TRIGGER_LEVEL_HIGH: Domain = Domain::range(0.0, 7.0, 3).or_aliases(AUTO_LIMIT_ALIASES);
pub const TRIGGER_LEVEL_DVM: Domain =
    Domain::range(-5.999, 25.0, 3).or_aliases(AUTO_LIMIT_ALIASES);
pub const TRIGGER_COUNT: Domain = Domain::integer_range(1, 100).or_aliases(LIMIT_ALIASES);
pub const TRIGGER_SLOPE: Domain =
    Domain::aliases(&["POS", "NEG", "MIN", "MAX", "DEF", "DEFAULT"]);
pub const TRIGGER_OFFSET: Domain = Domain::integer_range(-5000, 50000).or_aliases(LIMIT_ALIASES);
pub const TRIGGER_TIMEOUT: Domain =
    Domain::range(0.001, 60.0, 3).or_aliases(&["INF", "MIN", "MAX", "DEF", "DEFAULT"]);
pub const DISPLAY_CHANNEL: Domain =
    Domain::aliases(&["A", "B", "DVMA", "DVMB", "MIN", "MAX", "DEF", "DEFAULT"]);
pub const DATA_FORMAT: Domain = Domain::aliases(&[
    "ASCII", "ASC", "LONG", "SRE", "SREAL", "DREAL", "DRE", "MIN", "MAX", "DEF",
]);
pub const BYTE_ORDER: Domain = Domain::aliases(&[
    "NORMAL", "NORM", "SWAPPED", "SWAP", "MIN", "MAX", "DEF", "DEFAULT",
]);

/// The kinds of component a parameter can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ScopeKind {
    #[strum(serialize = "device")]
    Device,
    #[strum(serialize = "channel")]
    Channel,
    #[strum(serialize = "relay")]
    Relay,
}

/// A concrete component instance parameters are read from and written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    Device,
    Channel(Channel),
    Relay(Relay),
}

impl Scope {
    pub const fn kind(self) -> ScopeKind {
        match self {
            Scope::Device => ScopeKind::Device,
            Scope::Channel(_) => ScopeKind::Channel,
            Scope::Relay(_) => ScopeKind::Relay,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Device => f.write_str("device"),
            Scope::Channel(channel) => write!(f, "channel {channel}"),
            Scope::Relay(relay) => write!(f, "{relay}"),
        }
    }
}

impl From<Channel> for Scope {
    fn from(value: Channel) -> Self {
        Scope::Channel(value)
    }
}

impl From<Relay> for Scope {
    fn from(value: Relay) -> Self {
        Scope::Relay(value)
    }
}

/// A command path with a slot for the scope identifier.
///
/// Rendering inserts the channel letter or relay number between `head` and `tail`. Device scoped
/// tokens have nothing to insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    head: &'static str,
    tail: &'static str,
}

impl Token {
    pub const fn new(head: &'static str, tail: &'static str) -> Self {
        Self { head, tail }
    }

    pub fn render(&self, scope: Scope) -> String {
        match scope {
            Scope::Device => format!("{}{}", self.head, self.tail),
            Scope::Channel(channel) => format!("{}{}{}", self.head, channel.token(), self.tail),
            Scope::Relay(relay) => format!("{}{}{}", self.head, relay.number(), self.tail),
        }
    }
}

/// Query token, write token and accepted values of one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub query: Token,
    pub write: Token,
    pub domain: Domain,
}

impl ParamSpec {
    /// The common case where the query is the write path followed by `?`.
    const fn same(
        head: &'static str,
        tail: &'static str,
        query_tail: &'static str,
        domain: Domain,
    ) -> Self {
        Self {
            query: Token::new(head, query_tail),
            write: Token::new(head, tail),
            domain,
        }
    }
}

/// Every parameter of the instrument which can be read back and written.
///
/// Channel parameters exist once per output channel, relay parameters once per relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
pub enum Parameter {
    /// __Channel__ - Output on or off.
    ///
    /// Written through `:OUT:<C>` but read back from `:OUTP:<C>:STAT?`.
    Output,
    /// __Channel__ - Output voltage in volts.
    Voltage,
    /// __Channel__ - Current limit in amps.
    CurrentLimit,
    /// __Channel__ - Current measurement range.
    CurrentRange,
    /// __Channel__ - Interval of the continuous measurement in seconds.
    MeasurementInterval,
    /// __Channel__ - Number of readings averaged per measurement.
    AverageCount,
    /// __Channel__ - Simulated output impedance in ohms.
    Impedance,
    OutputBandwidth,
    /// __Channel__ - Function measured by `:MEAS` statistics.
    Sense,
    /// __Channel__ - Number of points captured per pulse acquisition.
    SampleLength,
    /// __Channel__ - Quantity captured by a pulse acquisition.
    ///
    /// `CURR`/`CURRENT` capture the output current, anything else a voltage.
    SampleSource,
    SampleType,
    /// __Channel__ - Time between pulse acquisition points in seconds.
    SampleInterval,
    TriggerSource,
    TriggerLevelLow,
    TriggerLevelHigh,
    TriggerLevelDvm,
    TriggerCount,
    TriggerSlope,
    /// __Channel__ - Offset of the first captured point relative to the trigger, in points.
    TriggerOffset,
    /// __Channel__ - Trigger timeout in seconds, or `INF`.
    TriggerTimeout,
    /// __Device__ - Front panel display on or off.
    DisplayEnabled,
    DisplayChannel,
    /// __Device__ - Format of array responses such as fetched samples.
    DataFormat,
    ByteOrder,
    /// __Relay__ - Relay closed or open.
    RelayState,
}

impl Parameter {
    pub const fn scope_kind(self) -> ScopeKind {
        match self {
            Parameter::DisplayEnabled
            | Parameter::DisplayChannel
            | Parameter::DataFormat
            | Parameter::ByteOrder => ScopeKind::Device,
            Parameter::RelayState => ScopeKind::Relay,
            _ => ScopeKind::Channel,
        }
    }

    /// All parameters existing on components of the given kind.
    pub fn of_kind(kind: ScopeKind) -> impl Iterator<Item = Parameter> {
        Parameter::iter().filter(move |parameter| parameter.scope_kind() == kind)
    }

    pub const fn spec(self) -> ParamSpec {
        match self {
            Parameter::Output => ParamSpec {
                query: Token::new(":OUTP:", ":STAT?"),
                write: Token::new(":OUT:", ""),
                domain: ON_OFF,
            },
            Parameter::Voltage => ParamSpec::same(":SOUR:", ":VOLT", ":VOLT?", VOLTAGE),
            Parameter::CurrentLimit => ParamSpec {
                query: Token::new(":SOUR:", ":CURR?"),
                write: Token::new(":SOUR:", ":CURR:LIM"),
                domain: CURRENT_LIMIT,
            },
            Parameter::CurrentRange => {
                ParamSpec::same(":SENS:", ":CURR:RANG", ":CURR:RANG?", CURRENT_RANGE)
            }
            Parameter::MeasurementInterval => {
                ParamSpec::same(":SENS:", ":MEAS:INT", ":MEAS:INT?", MEASUREMENT_INTERVAL)
            }
            Parameter::AverageCount => {
                ParamSpec::same(":SENS:", ":AVER:COUN", ":AVER:COUN?", AVERAGE_COUNT)
            }
            Parameter::Impedance => ParamSpec::same(":OUTP:", ":IMP", ":IMP?", IMPEDANCE),
            Parameter::OutputBandwidth => {
                ParamSpec::same(":OUTP:", ":BAND", ":BAND?", OUTPUT_BANDWIDTH)
            }
            Parameter::Sense => ParamSpec::same(":SENS:", ":FUNC", ":FUNC?", SENSE_FUNCTION),
            Parameter::SampleLength => ParamSpec::same(
                ":SENS:",
                ":PULS:SAMP:LENG",
                ":PULS:SAMP:LENG?",
                SAMPLE_LENGTH,
            ),
            Parameter::SampleSource => ParamSpec::same(
                ":SENS:",
                ":PULS:MEAS:CHAN",
                ":PULS:MEAS:CHAN?",
                SAMPLE_SOURCE,
            ),
            Parameter::SampleType => ParamSpec::same(
                ":SENS:",
                ":PULS:MEAS:TYPE",
                ":PULS:MEAS:TYPE?",
                SAMPLE_TYPE,
            ),
            Parameter::SampleInterval => ParamSpec::same(
                ":SENS:",
                ":PULS:SAMP:INT",
                ":PULS:SAMP:INT?",
                SAMPLE_INTERVAL,
            ),
            Parameter::TriggerSource => ParamSpec::same(
                ":SENS:",
                ":PULS:TRIG:SOUR",
                ":PULS:TRIG:SOUR?",
                TRIGGER_SOURCE,
            ),
            Parameter::TriggerLevelLow => ParamSpec::same(
                ":SENS:",
                ":PULS:TRIG:LEV:LOW",
                ":PULS:TRIG:LEV:LOW?",
                TRIGGER_LEVEL_LOW,
            ),
            Parameter::TriggerLevelHigh => ParamSpec::same(
                ":SENS:",
                ":PULS:TRIG:LEV:HIGH",
                ":PULS:TRIG:LEV:HIGH?",
                TRIGGER_LEVEL_HIGH,
            ),
            Parameter::TriggerLevelDvm => ParamSpec::same(
                ":SENS:",
                ":PULS:TRIG:LEV:DVM",
                ":PULS:TRIG:LEV:DVM?",
                TRIGGER_LEVEL_DVM,
            ),
            Parameter::TriggerCount => ParamSpec::same(
                ":SENS:",
                ":PULS:TRIG:COUN",
                ":PULS:TRIG:COUN?",
                TRIGGER_COUNT,
            ),
            Parameter::TriggerSlope => ParamSpec::same(
                ":SENS:",
                ":PULS:TRIG:SLOP",
                ":PULS:TRIG:SLOP?",
                TRIGGER_SLOPE,
            ),
            Parameter::TriggerOffset => ParamSpec::same(
                ":SENS:",
                ":PULS:TRIG:OFFS",
                ":PULS:TRIG:OFFS?",
                TRIGGER_OFFSET,
            ),
            Parameter::TriggerTimeout => ParamSpec::same(
                ":SENS:",
                ":PULS:TRIG:TIM",
                ":PULS:TRIG:TIM?",
                TRIGGER_TIMEOUT,
            ),
            Parameter::DisplayEnabled => ParamSpec::same(":DISP:ENAB", "", "?", ON_OFF),
            Parameter::DisplayChannel => ParamSpec::same(":DISP:CHAN", "", "?", DISPLAY_CHANNEL),
            Parameter::DataFormat => ParamSpec::same(":FORM:DATA", "", "?", DATA_FORMAT),
            Parameter::ByteOrder => ParamSpec::same(":FORM:BORD", "", "?", BYTE_ORDER),
            Parameter::RelayState => ParamSpec::same(":OUTP:REL", "", "?", ON_OFF),
        }
    }

    pub fn query_token(self, scope: Scope) -> String {
        self.spec().query.render(scope)
    }

    pub fn write_token(self, scope: Scope) -> String {
        self.spec().write.render(scope)
    }

    pub fn domain(self) -> Domain {
        self.spec().domain
    }
}

/// Last device-confirmed response per key.
///
/// Entries are only ever stored from a device response, never from a value the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterCache<K: Ord> {
    values: BTreeMap<K, String>,
}

impl<K: Ord> ParameterCache<K> {
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &K) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub(crate) fn store(&mut self, key: K, response: String) {
        self.values.insert(key, response);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &str)> {
        self.values.iter().map(|(key, value)| (key, value.as_str()))
    }
}

impl<K: Ord> Default for ParameterCache<K> {
    fn default() -> Self {
        Self::new()
    }
}
