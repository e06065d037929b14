//! Session settings, loadable from TOML.
//!
//! ```toml
//! firmware = "STM32F103"
//! protocol = "er-text"
//! response_timeout = "1500ms"
//! baud_rate = 115200
//!
//! [timing]
//! exposure_seconds = 0.02
//! averages = 4
//! continuous = true
//! ```

use crate::{
    error::Result,
    firmware::FirmwareProfile,
    protocol::ProtocolVariant,
    timing::{TimingConfig, TimingRequest},
};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

#[cfg(feature = "serial")]
use crate::transport::serial::BaudRate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub firmware: FirmwareProfile,
    pub protocol: ProtocolVariant,
    /// Longest silence tolerated while a response is outstanding
    #[serde(with = "humantime_serde")]
    pub response_timeout: Duration,
    pub timing: TimingRequest,
    #[cfg(feature = "serial")]
    pub baud_rate: BaudRate,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            firmware: FirmwareProfile::default(),
            protocol: ProtocolVariant::default(),
            response_timeout: Duration::from_secs(2),
            timing: TimingRequest::default(),
            #[cfg(feature = "serial")]
            baud_rate: BaudRate::default(),
        }
    }
}

impl SessionSettings {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Resolves the configured timing against the configured firmware
    pub fn validate(&self) -> Result<TimingConfig> {
        Ok(self.timing.resolve(self.firmware)?)
    }
}
