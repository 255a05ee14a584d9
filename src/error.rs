//! Our error types for the NGMO2 bus driver.
//!
//! Rejected parameter values are not errors, see [`ValidationError`](crate::validate::ValidationError).

use thiserror::Error;

use crate::parameter::{Parameter, Scope};

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Error type for NGMO2 bus communications.
///
/// `I` is the error type of the underlying bus.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Bus communication error")]
    Bus(I),
    #[error("Communication timeout")]
    Timeout,
    #[error("Response does not fit in the receive buffer")]
    BufferError,
    #[error("Invalid response received: {0:?}")]
    InvalidResponse(String),
    #[error("No device-confirmed value for {0} on {1}")]
    NotCached(Parameter, Scope),
    #[error("Parameter {parameter} does not exist on {scope}")]
    ScopeMismatch { parameter: Parameter, scope: Scope },
}

impl<I: embedded_io::Error> Error<I> {
    /// Shorthand for a response that could not be interpreted.
    pub(crate) fn invalid(response: impl Into<String>) -> Self {
        Error::InvalidResponse(response.into())
    }
}
