use super::Transport;
use crate::error::{Result, TransportError};
use std::{
    io::{ErrorKind, Read, Write},
    time::Duration,
};

/// Adapts any blocking `Read + Write` stream. Read timeouts are whatever the stream itself
/// is configured with.
pub struct StdIoTransport<IO: Read + Write> {
    io: IO,
    connected: bool,
}

impl<IO: Read + Write> StdIoTransport<IO> {
    pub fn new(io: IO) -> Self {
        StdIoTransport {
            io,
            connected: false,
        }
    }

    pub fn get_mut(&mut self) -> &mut IO {
        &mut self.io
    }

    pub fn into_inner(self) -> IO {
        self.io
    }
}

impl<IO: Read + Write> Transport for StdIoTransport<IO> {
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(TransportError::NotConnected.into());
        }
        let written = self.io.write(bytes).map_err(TransportError::Write)?;
        if written != bytes.len() {
            return Err(TransportError::PartialWrite {
                written,
                expected: bytes.len(),
            }
            .into());
        }
        self.io.flush().map_err(TransportError::Write)?;
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(TransportError::NotConnected.into());
        }
        match self.io.read(buf) {
            Ok(count) => Ok(count),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(0),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(e) if matches!(e.kind(), ErrorKind::BrokenPipe | ErrorKind::UnexpectedEof) => {
                self.connected = false;
                Err(TransportError::Disconnected.into())
            }
            Err(e) => Err(TransportError::Read(e).into()),
        }
    }
}
