//! This crate provides an interface for communicating with and controlling NGMO2 class dual channel
//! power supplies with pulse measurement capability.
//!
//! The instrument is driven over a synchronous SCPI command bus, see [`transport::Transport`]. A
//! [`transport::StreamTransport`] is provided for any byte stream implementing
//! [embedded_io::Read] & [embedded_io::Write], such as a serial GPIB bridge.
//!
//! Parameter values are validated before they are sent. After every write the parameter is read
//! back, and the device's answer is what gets cached.
//!
//! Pulse acquisitions on either channel are run by [`psu::Ngmo2::start_sample`]. Completion is
//! signalled by the instrument through its status registers.
//!
//! Diagnostics are emitted as [tracing] events. No subscriber is installed by this crate.

pub mod acquisition;
pub mod command;
pub mod common;
pub mod config;
pub mod error;
pub mod parameter;
pub mod psu;
pub mod status;
pub mod transport;
pub mod types;
pub mod validate;

#[cfg(test)]
mod mock_bus;
#[cfg(test)]
mod mock_serial;
