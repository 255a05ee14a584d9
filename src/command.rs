//! The command channel: validated reads and writes over a [`Transport`].
//!
//! Parameter caches are only written from device responses. After a successful write the query is
//! re-issued, and whatever the device answers (possibly clamped or rounded) becomes the cached
//! value.

use tracing::{debug, warn};

use crate::error::Result;
use crate::parameter::ParameterCache;
use crate::transport::Transport;
use crate::validate::{Domain, ParamValue, ValidationError};

/// Outcome of a command which may have been suppressed by validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// No value was supplied. Holds the device response to the query.
    Read(String),
    /// The command was sent. No response was requested.
    Sent,
    /// The value was written. Holds the device's echo, which is now cached.
    Updated(String),
    /// The value was rejected. Nothing was sent to the device.
    Rejected(ValidationError),
}

impl Dispatch {
    /// The device response, if a query was issued.
    pub fn response(&self) -> Option<&str> {
        match self {
            Dispatch::Read(response) | Dispatch::Updated(response) => Some(response),
            Dispatch::Sent | Dispatch::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&ValidationError> {
        match self {
            Dispatch::Rejected(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Dispatch::Rejected(_))
    }
}

/// Thin layer over a [`Transport`] which logs every exchange and enforces value validation.
pub struct CommandChannel<T: Transport> {
    transport: T,
}

impl<T: Transport> CommandChannel<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Issue a query and return the raw response. Caches are not touched.
    pub fn read(&mut self, query: &str) -> Result<String, T::Error> {
        let response = self.transport.query(query)?;
        debug!(command = query, response = response.as_str(), "query");
        Ok(response)
    }

    /// Send a command which takes no value.
    pub fn send(&mut self, command: &str) -> Result<(), T::Error> {
        debug!(command, "write");
        self.transport.write(command)
    }

    /// Send `command` verbatim, unless `guard` is given and rejects its value.
    pub fn write(
        &mut self,
        command: &str,
        guard: Option<(&Domain, &ParamValue)>,
    ) -> Result<Dispatch, T::Error> {
        if let Some((domain, value)) = guard {
            if let Err(rejection) = domain.validate(value) {
                reject(command, &rejection);
                return Ok(Dispatch::Rejected(rejection));
            }
        }
        self.send(command)?;
        Ok(Dispatch::Sent)
    }

    /// Validated read-modify-write of a single parameter.
    ///
    /// * No `value`: plain query. The cache is left alone.
    /// * Invalid `value`: nothing is sent and the cache is left alone.
    /// * Valid `value`: sends `"<write> <token>"`, re-issues `query` and caches the response
    ///   under `key`.
    pub fn read_write<K: Ord>(
        &mut self,
        query: &str,
        write: &str,
        domain: &Domain,
        value: Option<&ParamValue>,
        cache: &mut ParameterCache<K>,
        key: K,
    ) -> Result<Dispatch, T::Error> {
        let Some(value) = value else {
            return self.read(query).map(Dispatch::Read);
        };

        let token = match domain.validate(value) {
            Ok(token) => token,
            Err(rejection) => {
                reject(write, &rejection);
                return Ok(Dispatch::Rejected(rejection));
            }
        };

        self.send(&format!("{write} {token}"))?;
        self.sync(query, cache, key).map(Dispatch::Updated)
    }

    /// Query the device and cache the response under `key`.
    pub fn sync<K: Ord>(
        &mut self,
        query: &str,
        cache: &mut ParameterCache<K>,
        key: K,
    ) -> Result<String, T::Error> {
        let response = self.read(query)?;
        cache.store(key, response.clone());
        Ok(response)
    }
}

fn reject(command: &str, rejection: &ValidationError) {
    warn!(
        command,
        value = %rejection.value(),
        domain = %rejection.domain(),
        kind = rejection.kind(),
        "rejected value: {rejection}"
    );
}
