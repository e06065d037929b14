use clap::Args;
use num_traits::FromPrimitive;
use simple_eyre::Result;
use tcd1304::{
    transport::serial::{BaudRate, SerialTransport},
    AcquisitionSession, SessionSettings, Transport,
};

#[derive(Args)]
pub struct SerialConf {
    /// Name of serial port that should be used
    #[clap(short, long, value_parser)]
    pub serial: String,

    /// Baud rate of the port, overrides the settings file
    #[clap(short, long, value_parser = parse_baud_rate)]
    pub baud: Option<BaudRate>,
}

pub type SerialSession = AcquisitionSession<SerialTransport>;

fn parse_baud_rate(s: &str) -> Result<BaudRate, String> {
    s.parse()
        .ok()
        .and_then(FromPrimitive::from_u32)
        .ok_or_else(|| format!("Unsupported baud rate {}", s))
}

impl SerialConf {
    pub fn open_session(&self, mut settings: SessionSettings) -> Result<SerialSession> {
        if let Some(baud) = self.baud {
            settings.baud_rate = baud;
        }
        let transport = SerialTransport::new(&self.serial, settings.baud_rate);
        Ok(transport.open_session(settings)?)
    }
}
