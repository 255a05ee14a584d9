//! Validation of parameter values against the domains the instrument accepts.
//!
//! Every settable parameter is described by a [`Domain`]: an optional numeric branch (a range or a
//! discrete set) and an optional set of symbolic aliases such as `MIN` or `DEF`. A value is accepted
//! when either branch accepts it, and is then turned into the canonical token sent on the wire.

use core::fmt;

use thiserror::Error;

use crate::types::State;

/// Aliases most numeric parameters accept in place of a number.
pub const LIMIT_ALIASES: &[&str] = &["MIN", "MAX", "DEF", "DEFAULT"];

/// On/off switches accept `0`/`1` or `ON`/`OFF`.
pub const ON_OFF: Domain = Domain::integer_set(&[0, 1]).or_aliases(&["ON", "OFF"]);

/// 8 bit status registers, e.g. `*SRE` and `*ESE`.
pub const REGISTER_8: Domain = Domain::integer_range(0, u8::MAX as i64);

/// 16 bit status registers, e.g. `:STAT:MEAS:ENAB`.
pub const REGISTER_16: Domain = Domain::integer_range(0, u16::MAX as i64);

/// Setup memory slots used by `*SAV` and `*RCL`.
pub const PRESET: Domain = Domain::integer_range(0, 9);

/// Output relays are numbered 1 to 4.
pub const RELAY_INDEX: Domain = Domain::integer_range(1, 4);

/// A raw value handed to a parameter setter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Integer(i64),
    Number(f64),
    Symbol(String),
}

impl ParamValue {
    /// Name of the shape of this value, as used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ParamValue::Integer(_) => "integer",
            ParamValue::Number(_) => "number",
            ParamValue::Symbol(_) => "symbol",
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Integer(value) => write!(f, "{value}"),
            ParamValue::Number(value) => write!(f, "{value}"),
            ParamValue::Symbol(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Integer(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Integer(value.into())
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Integer(value.into())
    }
}

impl From<u16> for ParamValue {
    fn from(value: u16) -> Self {
        ParamValue::Integer(value.into())
    }
}

impl From<u8> for ParamValue {
    fn from(value: u8) -> Self {
        ParamValue::Integer(value.into())
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Symbol(value.into())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Symbol(value)
    }
}

impl From<State> for ParamValue {
    fn from(value: State) -> Self {
        ParamValue::Symbol(value.token().into())
    }
}

/// The numeric branch of a [`Domain`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericDomain {
    /// Any number which, rounded to `decimals` places, lies within `[min, max]`.
    Range { min: f64, max: f64, decimals: u8 },
    /// Integers within `[min, max]`. Non-integral numbers are the wrong shape.
    IntegerRange { min: i64, max: i64 },
    /// One of a discrete list of numbers.
    Set(&'static [f64]),
    /// One of a discrete list of integers.
    IntegerSet(&'static [i64]),
}

impl NumericDomain {
    fn takes_numbers(&self) -> bool {
        matches!(self, NumericDomain::Range { .. } | NumericDomain::Set(_))
    }

    fn accepts_integer(&self, value: i64) -> bool {
        match *self {
            NumericDomain::IntegerRange { min, max } => (min..=max).contains(&value),
            NumericDomain::IntegerSet(set) => set.contains(&value),
            NumericDomain::Range { .. } | NumericDomain::Set(_) => {
                self.accepts_number(value as f64)
            }
        }
    }

    fn accepts_number(&self, value: f64) -> bool {
        match *self {
            NumericDomain::Range { min, max, decimals } => {
                let rounded = round_to(value, decimals);
                min <= rounded && rounded <= max
            }
            NumericDomain::Set(set) => set.contains(&value),
            NumericDomain::IntegerRange { .. } | NumericDomain::IntegerSet(_) => false,
        }
    }
}

impl fmt::Display for NumericDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericDomain::Range { min, max, decimals } => {
                write!(f, "number in [{min}, {max}] ({decimals} decimals)")
            }
            NumericDomain::IntegerRange { min, max } => write!(f, "integer in [{min}, {max}]"),
            NumericDomain::Set(set) => write!(f, "number in {}", Listed(set)),
            NumericDomain::IntegerSet(set) => write!(f, "integer in {}", Listed(set)),
        }
    }
}

/// Describes the values a parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain {
    numeric: Option<NumericDomain>,
    /// Upper case alias tokens, matched case-insensitively.
    aliases: &'static [&'static str],
}

impl Domain {
    pub const fn range(min: f64, max: f64, decimals: u8) -> Self {
        Self::numeric(NumericDomain::Range { min, max, decimals })
    }

    pub const fn integer_range(min: i64, max: i64) -> Self {
        Self::numeric(NumericDomain::IntegerRange { min, max })
    }

    pub const fn set(values: &'static [f64]) -> Self {
        Self::numeric(NumericDomain::Set(values))
    }

    pub const fn integer_set(values: &'static [i64]) -> Self {
        Self::numeric(NumericDomain::IntegerSet(values))
    }

    /// A pure enumeration of symbolic tokens.
    pub const fn aliases(aliases: &'static [&'static str]) -> Self {
        Self {
            numeric: None,
            aliases,
        }
    }

    /// Additionally accept the given aliases.
    pub const fn or_aliases(self, aliases: &'static [&'static str]) -> Self {
        Self { aliases, ..self }
    }

    const fn numeric(numeric: NumericDomain) -> Self {
        Self {
            numeric: Some(numeric),
            aliases: &[],
        }
    }

    pub fn numeric_branch(&self) -> Option<NumericDomain> {
        self.numeric
    }

    pub fn alias_branch(&self) -> &'static [&'static str] {
        self.aliases
    }

    /// Check `value` against this domain, returning the canonical wire token.
    ///
    /// Numbers keep their own representation, aliases are upper cased.
    pub fn validate(&self, value: &ParamValue) -> Result<String, ValidationError> {
        let accepted = match (value, self.numeric) {
            (ParamValue::Symbol(symbol), _) if !self.aliases.is_empty() => self
                .aliases
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(symbol))
                .then(|| symbol.to_ascii_uppercase()),
            (ParamValue::Integer(integer), Some(numeric)) => {
                numeric.accepts_integer(*integer).then(|| integer.to_string())
            }
            (ParamValue::Number(number), Some(numeric)) if numeric.takes_numbers() => {
                numeric.accepts_number(*number).then(|| number.to_string())
            }
            _ => return Err(ValidationError::Type {
                value: value.clone(),
                domain: *self,
            }),
        };

        accepted.ok_or_else(|| ValidationError::Value {
            value: value.clone(),
            domain: *self,
        })
    }

    /// The value shapes this domain can accept at all.
    pub fn accepted_shapes(&self) -> AcceptedShapes {
        AcceptedShapes(*self)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.numeric, self.aliases.is_empty()) {
            (Some(numeric), true) => write!(f, "{numeric}"),
            (Some(numeric), false) => write!(f, "{numeric} or one of {}", Listed(self.aliases)),
            (None, _) => write!(f, "one of {}", Listed(self.aliases)),
        }
    }
}

/// Display helper listing the shapes of a [`Domain`], e.g. `integer or symbol`.
#[derive(Debug, Clone, Copy)]
pub struct AcceptedShapes(Domain);

impl fmt::Display for AcceptedShapes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let numeric: &[&str] = match self.0.numeric {
            Some(numeric) if numeric.takes_numbers() => &["integer", "number"],
            Some(_) => &["integer"],
            None => &[],
        };
        let symbolic: &[&str] = if self.0.aliases.is_empty() { &[] } else { &["symbol"] };
        for (i, shape) in numeric.iter().chain(symbolic).enumerate() {
            if i > 0 {
                f.write_str(" or ")?;
            }
            f.write_str(shape)?;
        }
        Ok(())
    }
}

/// A value rejected by a [`Domain`].
///
/// These are expected outcomes of user input rather than failures, so they are handed back as
/// data and never abort a command sequence.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The value has none of the shapes the domain accepts.
    #[error("TypeError: received {} {value}, valid types: {}", .value.kind(), .domain.accepted_shapes())]
    Type { value: ParamValue, domain: Domain },
    /// The value has an accepted shape but lies outside the domain.
    #[error("ValueError: {value} is not a {domain}")]
    Value { value: ParamValue, domain: Domain },
}

impl ValidationError {
    pub fn value(&self) -> &ParamValue {
        match self {
            ValidationError::Type { value, .. } | ValidationError::Value { value, .. } => value,
        }
    }

    pub fn domain(&self) -> &Domain {
        match self {
            ValidationError::Type { domain, .. } | ValidationError::Value { domain, .. } => domain,
        }
    }

    /// `"TypeError"` or `"ValueError"`.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::Type { .. } => "TypeError",
            ValidationError::Value { .. } => "ValueError",
        }
    }
}

/// Validate `value` against `domain`. See [`Domain::validate`].
pub fn validate(domain: &Domain, value: &ParamValue) -> Result<String, ValidationError> {
    domain.validate(value)
}

fn round_to(value: f64, decimals: u8) -> f64 {
    let scale = 10f64.powi(i32::from(decimals));
    (value * scale).round() / scale
}

struct Listed<'a, T>(&'a [T]);

impl<T: fmt::Display> fmt::Display for Listed<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, item) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{item}")?;
        }
        f.write_str("}")
    }
}
