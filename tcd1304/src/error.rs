use crate::protocol::ProtocolVariant;
use core::result::Result as CoreResult;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = CoreResult<T, Error>;

/// Requested timing that the firmware cannot run. Never reaches the device.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum TimingViolation {
    #[error("SH period of {ticks} ticks is outside of [{min}, {max}]")]
    ShOutOfRange { ticks: u64, min: u32, max: u32 },
    #[error("Averages count {0} is outside of [1, 255]")]
    AveragesOutOfRange(u32),
    #[error("Exposure time {0} s is not a finite, non-negative number")]
    InvalidExposure(f64),
    #[error("ICG period of {icg} ticks is shorter than {min} ticks")]
    IcgTooShort { icg: u32, min: u32 },
    #[error("ICG period of {icg} ticks is not a multiple of SH period of {sh} ticks")]
    IcgNotMultiple { icg: u32, sh: u32 },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport is not connected")]
    NotConnected,
    #[error("Could not open {path}: {reason}")]
    Open { path: String, reason: String },
    #[error("Command was only partially written ({written} of {expected} bytes)")]
    PartialWrite { written: usize, expected: usize },
    #[error("Write failed: {0}")]
    Write(std::io::Error),
    #[error("Read failed: {0}")]
    Read(std::io::Error),
    #[error("No response within {0:?}")]
    Timeout(Duration),
    #[error("Acquisition aborted")]
    Aborted,
    #[error("Device disconnected")]
    Disconnected,
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum MalformedResponse {
    #[error("Expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("Could not parse recieved data: {0}")]
    ParseError(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Timing(#[from] TimingViolation),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Malformed(#[from] MalformedResponse),
    #[error("Response does not match the {expected} protocol: {detail}")]
    ProtocolMismatch {
        expected: ProtocolVariant,
        detail: String,
    },
    #[error("Session is in error state, reset or reconnect first")]
    Faulted,
    #[error("No timing configuration was applied yet")]
    NotConfigured,
    #[error("Invalid settings: {0}")]
    Settings(#[from] toml::de::Error),
    #[error("Acquisition worker is not running")]
    WorkerStopped,
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
}
