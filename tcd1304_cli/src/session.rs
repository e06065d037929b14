use clap::Args;
use simple_eyre::Result;
use std::{path::PathBuf, str::FromStr, time::Duration};
use tcd1304::{FirmwareProfile, ProtocolVariant, SessionSettings};

/// Session options shared by every command that talks to a device
#[derive(Args)]
pub struct SessionConf {
    /// TOML file with session settings, command line options take precedence
    #[clap(short, long, value_parser, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Firmware running on the controller board, e.g. STM32F40x or STM32F103
    #[clap(short, long, value_parser = FirmwareProfile::from_str)]
    pub firmware: Option<FirmwareProfile>,

    /// Wire protocol, aa55-binary or er-text
    #[clap(short, long, value_parser = ProtocolVariant::from_str)]
    pub protocol: Option<ProtocolVariant>,

    /// Exposure time in milliseconds
    #[clap(short, long, value_parser)]
    pub exposure: Option<f64>,

    /// Number of readouts averaged on the device, 1 to 255
    #[clap(short, long, value_parser)]
    pub averages: Option<u32>,

    /// Response timeout in milliseconds
    #[clap(long, value_parser)]
    pub timeout: Option<u64>,
}

impl SessionConf {
    /// Settings file merged with command line options, timing already checked
    pub fn settings(&self) -> Result<SessionSettings> {
        let mut settings = match &self.config {
            Some(path) => {
                log::debug!("Loading settings from {:?}", path);
                SessionSettings::load(path)?
            }
            None => SessionSettings::default(),
        };
        if let Some(firmware) = self.firmware {
            settings.firmware = firmware;
        }
        if let Some(protocol) = self.protocol {
            settings.protocol = protocol;
        }
        if let Some(exposure_ms) = self.exposure {
            settings.timing.exposure_seconds = exposure_ms / 1000.0;
        }
        if let Some(averages) = self.averages {
            settings.timing.averages = averages;
        }
        if let Some(timeout) = self.timeout {
            settings.response_timeout = Duration::from_millis(timeout);
        }
        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[clap(flatten)]
        session: SessionConf,
    }

    #[test]
    fn command_line_overrides_defaults() {
        let cli = TestCli::parse_from(["test", "-f", "STM32F103", "-p", "er-text", "-e", "2.5", "-a", "3"]);
        let settings = cli.session.settings().unwrap();
        assert_eq!(settings.firmware, FirmwareProfile::Stm32F103);
        assert_eq!(settings.protocol, ProtocolVariant::ErText);
        assert_eq!(settings.timing.exposure_seconds, 0.0025);
        assert_eq!(settings.timing.averages, 3);
    }

    #[test]
    fn invalid_timing_is_refused() {
        let cli = TestCli::parse_from(["test", "-a", "0"]);
        assert!(cli.session.settings().is_err());
    }

    #[test]
    fn unknown_profile_is_a_usage_error() {
        assert!(TestCli::try_parse_from(["test", "-f", "ATmega328"]).is_err());
    }
}
