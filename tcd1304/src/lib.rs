//! Timing and protocol controller for TCD1304 linear CCD sensors driven by STM32 firmware.
//!
//! Exposure requests are turned into firmware clock ticks by [`timing`], packed into 12 byte
//! commands by [`command`] and sent over a [`Transport`]. Responses are framed and decoded by
//! [`SpectrumCodec`], and [`AcquisitionSession`] keeps a single command in flight at a time.

pub mod acquisition;
pub mod command;
pub mod error;
pub mod firmware;
pub mod protocol;
pub mod response;
pub mod settings;
pub mod timing;
pub mod transport;
pub mod worker;

pub use acquisition::{AbortHandle, AcquisitionSession, AcquisitionState, SessionSnapshot};
pub use command::CommandPacket;
pub use error::{Error, MalformedResponse, Result, TimingViolation, TransportError};
pub use firmware::FirmwareProfile;
pub use protocol::{ProtocolVariant, ResponseFormat};
pub use response::{Spectrum, SpectrumCodec};
pub use settings::SessionSettings;
pub use timing::{compute, TimingConfig, TimingInfo, TimingRequest};
pub use transport::Transport;
pub use worker::{AcquisitionWorker, Event, Request};

#[cfg(test)]
mod tests;
