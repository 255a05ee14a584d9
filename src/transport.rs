//! The synchronous command bus the driver talks through.
//!
//! [`Transport`] is the contract every bus implementation provides. [`StreamTransport`] implements
//! it on top of any byte stream implementing [embedded_io::Read] & [embedded_io::Write], for
//! example a serial GPIB bridge.

use std::time::{Duration, Instant};

use embedded_io::{Error as _, ErrorKind};
use fugit::MillisDurationU32;
use tracing::trace;

use crate::error::{Error, Result};
use crate::status::StatusByte;

/// What ended a [`Transport::wait_for_notification`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// The device raised a service request.
    ServiceRequest,
    /// The timeout elapsed first.
    TimedOut,
}

/// A strictly synchronous request/response bus to one instrument.
///
/// At most one query may be outstanding: every [`Transport::query`] writes a command and reads its
/// single line response before returning.
pub trait Transport {
    type Error: embedded_io::Error;

    /// Send a command. No reply is expected.
    fn write(&mut self, command: &str) -> Result<(), Self::Error>;

    /// Send a command and return its response line without the terminator.
    fn query(&mut self, command: &str) -> Result<String, Self::Error>;

    /// Read a response in one of the binary data formats.
    fn read_raw(&mut self) -> Result<Vec<u8>, Self::Error>;

    /// Block until the device raises a service request, or at most `timeout`.
    fn wait_for_notification(
        &mut self,
        timeout: MillisDurationU32,
    ) -> Result<Notification, Self::Error>;
}

/// [`Transport`] over a byte stream with line terminated messages.
///
/// Responses are collected in a buffer of `L` bytes. Binary blocks are bounded separately, see
/// [`Self::with_max_block`]. There is no out-of-band service request line on a plain stream, so
/// notifications are detected by polling the status byte.
pub struct StreamTransport<S: embedded_io::Read + embedded_io::Write, const L: usize = 256> {
    stream: S,
    terminator: u8,
    poll_interval: Duration,
    max_block: usize,
}

/// Largest definite length block accepted by default.
pub const DEFAULT_MAX_BLOCK: usize = 1 << 20;

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> StreamTransport<S, L> {
    /// Create a new transport using `\n` as message terminator and a 50ms status poll interval.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            terminator: b'\n',
            poll_interval: Duration::from_millis(50),
            max_block: DEFAULT_MAX_BLOCK,
        }
    }

    pub fn with_terminator(mut self, terminator: u8) -> Self {
        self.terminator = terminator;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: MillisDurationU32) -> Self {
        self.poll_interval = Duration::from_millis(poll_interval.to_millis().into());
        self
    }

    /// Largest binary block [`Transport::read_raw`] will allocate for.
    pub fn with_max_block(mut self, max_block: usize) -> Self {
        self.max_block = max_block;
        self
    }

    /// Release the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    fn read_byte(&mut self) -> Result<u8, S::Error> {
        let mut byte = [0u8; 1];
        match self.stream.read(&mut byte) {
            Ok(1) => Ok(byte[0]),
            // End of stream before the message was complete.
            Ok(_) => Err(Error::Timeout),
            Err(e) if e.kind() == ErrorKind::TimedOut => Err(Error::Timeout),
            Err(e) => Err(Error::Bus(e)),
        }
    }

    /// Read up to and excluding the terminator.
    fn read_line(&mut self) -> Result<heapless::Vec<u8, L>, S::Error> {
        let mut line: heapless::Vec<u8, L> = heapless::Vec::new();
        loop {
            let byte = self.read_byte()?;
            if byte == self.terminator {
                break;
            }
            line.push(byte).map_err(|_| Error::<S::Error>::BufferError)?;
        }
        // Tolerate CR LF terminated responses.
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(line)
    }

    /// Read an IEEE 488.2 definite length block (`#<n><length><data>`), the `#` already consumed.
    fn read_block(&mut self) -> Result<Vec<u8>, S::Error> {
        let header = char::from(self.read_byte()?);
        let digits = header
            .to_digit(10)
            .filter(|d| *d > 0)
            .ok_or_else(|| Error::<S::Error>::invalid(format!("#{header}")))?;

        let mut length = 0usize;
        for _ in 0..digits {
            let digit = char::from(self.read_byte()?);
            let digit = digit
                .to_digit(10)
                .ok_or_else(|| Error::<S::Error>::invalid(digit.to_string()))?;
            length = length * 10 + digit as usize;
        }
        if length > self.max_block {
            return Err(Error::BufferError);
        }

        let mut data = vec![0u8; length];
        self.stream.read_exact(&mut data).map_err(|e| match e {
            embedded_io::ReadExactError::UnexpectedEof => Error::Timeout,
            embedded_io::ReadExactError::Other(e) if e.kind() == ErrorKind::TimedOut => {
                Error::Timeout
            }
            embedded_io::ReadExactError::Other(e) => Error::Bus(e),
        })?;

        // Drop the trailing terminator.
        self.read_line()?;
        Ok(data)
    }
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> Transport
    for StreamTransport<S, L>
{
    type Error = S::Error;

    fn write(&mut self, command: &str) -> Result<(), S::Error> {
        self.stream
            .write_all(command.as_bytes())
            .map_err(Error::Bus)?;
        self.stream
            .write_all(&[self.terminator])
            .map_err(Error::Bus)?;
        self.stream.flush().map_err(Error::Bus)
    }

    fn query(&mut self, command: &str) -> Result<String, S::Error> {
        self.write(command)?;
        let line = self.read_line()?;
        String::from_utf8(line.to_vec())
            .map_err(|e| Error::invalid(String::from_utf8_lossy(e.as_bytes())))
    }

    fn read_raw(&mut self) -> Result<Vec<u8>, S::Error> {
        let first = self.read_byte()?;
        if first == b'#' {
            return self.read_block();
        }
        if first == self.terminator {
            return Ok(Vec::new());
        }
        let mut data = vec![first];
        data.extend_from_slice(&self.read_line()?);
        Ok(data)
    }

    fn wait_for_notification(
        &mut self,
        timeout: MillisDurationU32,
    ) -> Result<Notification, S::Error> {
        let timeout = Duration::from_millis(timeout.to_millis().into());
        let started = Instant::now();
        loop {
            let response = self.query("*STB?")?;
            let status = response
                .trim()
                .trim_start_matches('+')
                .parse::<u8>()
                .map_err(|_| Error::<S::Error>::invalid(response.as_str()))?;
            trace!(status, "polled status byte");
            if StatusByte::from_bytes([status]).request_service() {
                return Ok(Notification::ServiceRequest);
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Ok(Notification::TimedOut);
            }
            std::thread::sleep(self.poll_interval.min(timeout - elapsed));
        }
    }
}
