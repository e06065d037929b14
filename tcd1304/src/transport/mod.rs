//! Byte stream channels the controller can talk through.
//!
//! The controller only needs a reliable ordered byte stream. Serial ports, Bluetooth SPP
//! links exposed as serial devices, arbitrary `Read + Write` streams and the simulated
//! device all implement [`Transport`].

#[cfg(feature = "serial")]
pub mod serial;
pub mod simulated;
pub mod std_io;

use crate::{acquisition::AcquisitionSession, error::Result, settings::SessionSettings};
use std::time::Duration;

pub trait Transport {
    fn connect(&mut self) -> Result<()>;
    fn disconnect(&mut self) -> Result<()>;
    fn is_connected(&self) -> bool;

    /// Writes the whole buffer with a single write call. A partial write is an error, the
    /// firmware expects commands to arrive in one piece.
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Reads whatever arrives within `timeout`, at most `buf.len()` bytes. Returns 0 when
    /// nothing arrived.
    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Drops anything the device sent that has not been read yet
    fn discard_input(&mut self) -> Result<()> {
        let mut buf = [0u8; 256];
        while self.receive(&mut buf, Duration::ZERO)? > 0 {}
        Ok(())
    }

    fn open_session(self, settings: SessionSettings) -> Result<AcquisitionSession<Self>>
    where
        Self: Sized,
    {
        AcquisitionSession::open(self, settings)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn disconnect(&mut self) -> Result<()> {
        (**self).disconnect()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send(bytes)
    }

    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).receive(buf, timeout)
    }

    fn discard_input(&mut self) -> Result<()> {
        (**self).discard_input()
    }
}
