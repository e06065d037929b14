use super::Transport;
use crate::error::{Result, TransportError};
use core::fmt;
use log::{debug, info, trace};
use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use std::{
    io::{ErrorKind, Read, Write},
    time::Duration,
};

#[derive(
    ToPrimitive, FromPrimitive, Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize,
)]
#[serde(try_from = "u32", into = "u32")]
pub enum BaudRate {
    Baud9600 = 9600,
    #[default]
    Baud115200 = 115200,
    Baud230400 = 230400,
    Baud460800 = 460800,
    Baud921600 = 921600,
}

impl TryFrom<u32> for BaudRate {
    type Error = String;

    fn try_from(value: u32) -> core::result::Result<Self, Self::Error> {
        num_traits::FromPrimitive::from_u32(value)
            .ok_or_else(|| format!("Unsupported baud rate {}", value))
    }
}

impl From<BaudRate> for u32 {
    fn from(baud: BaudRate) -> u32 {
        baud as u32
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{}", *self as u32))
    }
}

/// USB CDC or Bluetooth SPP (rfcomm) device, 8N1
pub struct SerialTransport {
    path: String,
    baud_rate: BaudRate,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    pub fn new(path: impl Into<String>, baud_rate: BaudRate) -> Self {
        SerialTransport {
            path: path.into(),
            baud_rate,
            port: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| TransportError::NotConnected.into())
    }
}

impl Transport for SerialTransport {
    fn connect(&mut self) -> Result<()> {
        if self.port.is_some() {
            return Ok(());
        }
        let port = serialport::new(&self.path, self.baud_rate.into())
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| TransportError::Open {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        info!("Connected to {} at {} baud", self.path, self.baud_rate);
        self.port = Some(port);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            info!("Disconnected from {}", self.path);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port()?;
        trace!("Writing {:02X?}", bytes);
        let written = port.write(bytes).map_err(TransportError::Write)?;
        if written != bytes.len() {
            return Err(TransportError::PartialWrite {
                written,
                expected: bytes.len(),
            }
            .into());
        }
        port.flush().map_err(TransportError::Write)?;
        Ok(())
    }

    fn discard_input(&mut self) -> Result<()> {
        let port = self.port()?;
        let pending = port.bytes_to_read().unwrap_or(0);
        port.clear(ClearBuffer::Input)
            .map_err(|e| TransportError::Read(e.into()))?;
        debug!("Discarded {} pending bytes", pending);
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let port = self.port()?;
        port.set_timeout(timeout)
            .map_err(|e| TransportError::Read(e.into()))?;
        match port.read(buf) {
            Ok(0) => {
                debug!("Serial port returned EOF");
                self.port = None;
                Err(TransportError::Disconnected.into())
            }
            Ok(count) => Ok(count),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                self.port = None;
                Err(TransportError::Disconnected.into())
            }
            Err(e) => Err(TransportError::Read(e).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::*;

    #[test]
    fn baud_rate_from_number() {
        assert_ok_eq!(BaudRate::try_from(115200), BaudRate::Baud115200);
        assert_err!(BaudRate::try_from(115201));
        assert_eq!(BaudRate::default().to_string(), "115200");
    }

    #[test]
    fn not_connected_until_opened() {
        let mut transport = SerialTransport::new("/dev/does-not-exist", BaudRate::default());
        assert!(!transport.is_connected());
        assert_err!(transport.send(&[0u8; 12]));
        assert_err!(transport.connect());
    }
}
