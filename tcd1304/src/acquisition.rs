//! One exposure, transmit, receive cycle at a time.
//!
//! ```text
//! Idle --configure/arm--> Configuring --send--> AwaitingResponse --response--> Idle
//!                              ^                       |
//!                              +------ continuous -----+
//! any failure --> Error --reset--> Idle
//! ```
//!
//! At most one command is in flight: [`AcquisitionSession::cycle`] takes `&mut self` and only
//! returns once its response has been decoded or the cycle has failed.

use crate::{
    command::CommandPacket,
    error::{Error, MalformedResponse, Result, TransportError},
    firmware::FirmwareProfile,
    protocol::{ProtocolVariant, ResponseFormat},
    response::{Spectrum, SpectrumCodec},
    settings::SessionSettings,
    timing::{TimingConfig, TimingInfo, TimingRequest},
    transport::Transport,
};
use bytes::BytesMut;
use log::{debug, info, trace, warn};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio_util::codec::{Decoder, Encoder};

/// Longest single wait on the transport, bounds how late an abort is noticed
const POLL_INTERVAL: Duration = Duration::from_millis(50);
const READ_BUF_SIZE: usize = 4096;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AcquisitionState {
    Idle,
    Configuring,
    AwaitingResponse,
    Error,
}

/// Cancels the cycle in flight from another thread.
///
/// Once raised it stays raised until the session is reset. An abort raised while the session
/// is idle has nothing to cancel and is dropped when the next command is configured or armed.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Copy of the session state that can be handed to other threads
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: AcquisitionState,
    pub profile: FirmwareProfile,
    pub protocol: ProtocolVariant,
    pub config: Option<TimingConfig>,
    pub timing: Option<TimingInfo>,
    pub spectra_received: u64,
    pub last_error: Option<String>,
}

pub struct AcquisitionSession<T: Transport> {
    transport: T,
    settings: SessionSettings,
    codec: SpectrumCodec,
    state: AcquisitionState,
    config: Option<TimingConfig>,
    tx: BytesMut,
    rx: BytesMut,
    read_buf: Box<[u8]>,
    abort: AbortHandle,
    spectra_received: u64,
    last_error: Option<String>,
}

impl<T: Transport> AcquisitionSession<T> {
    /// Connects the transport and starts an idle session
    pub fn open(mut transport: T, settings: SessionSettings) -> Result<Self> {
        transport.connect()?;
        info!(
            "Session opened for {} using the {} protocol",
            settings.firmware.description(),
            settings.protocol
        );
        Ok(AcquisitionSession {
            transport,
            codec: SpectrumCodec::new(settings.protocol),
            settings,
            state: AcquisitionState::Idle,
            config: None,
            tx: BytesMut::new(),
            rx: BytesMut::new(),
            read_buf: vec![0u8; READ_BUF_SIZE].into_boxed_slice(),
            abort: AbortHandle::default(),
            spectra_received: 0,
            last_error: None,
        })
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn profile(&self) -> FirmwareProfile {
        self.settings.firmware
    }

    pub fn protocol(&self) -> ProtocolVariant {
        self.settings.protocol
    }

    pub fn config(&self) -> Option<TimingConfig> {
        self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            profile: self.profile(),
            protocol: self.protocol(),
            config: self.config,
            timing: self.config.map(|c| TimingInfo::new(&c, self.profile())),
            spectra_received: self.spectra_received,
            last_error: self.last_error.clone(),
        }
    }

    /// Resolves `request` against the session's firmware and makes it the next command.
    /// A timing violation is returned without touching the session.
    pub fn configure(&mut self, request: &TimingRequest) -> Result<TimingConfig> {
        if self.state == AcquisitionState::Error {
            return Err(Error::Faulted);
        }
        let config = request.resolve(self.profile())?;
        self.apply(config)?;
        Ok(config)
    }

    /// Makes an already resolved config the next command
    pub fn apply(&mut self, config: TimingConfig) -> Result<()> {
        if self.state == AcquisitionState::Error {
            return Err(Error::Faulted);
        }
        config.validate(self.profile())?;
        debug!(
            "Configuring SH={} ICG={} averages={} continuous={}",
            config.sh_ticks, config.icg_ticks, config.averages, config.continuous
        );
        if self.state == AcquisitionState::Idle {
            self.abort.clear();
        }
        self.config = Some(config);
        self.state = AcquisitionState::Configuring;
        Ok(())
    }

    /// Re-issues the current config
    pub fn arm(&mut self) -> Result<()> {
        match self.state {
            AcquisitionState::Error => Err(Error::Faulted),
            AcquisitionState::Configuring | AcquisitionState::AwaitingResponse => Ok(()),
            AcquisitionState::Idle => {
                if self.config.is_none() {
                    return Err(Error::NotConfigured);
                }
                self.abort.clear();
                self.state = AcquisitionState::Configuring;
                Ok(())
            }
        }
    }

    /// Leaves continuous mode, the current config stays for later [`arm`](Self::arm) calls
    pub fn stop(&mut self) {
        if let Some(config) = self.config.as_mut() {
            config.continuous = false;
        }
        if self.state == AcquisitionState::Configuring {
            debug!("Continuous acquisition stopped");
            self.state = AcquisitionState::Idle;
        }
    }

    /// Sends the current command and waits for its spectrum.
    ///
    /// The wait is bounded by the configured response timeout on top of the frame time the
    /// command asks for. Any failure leaves the session in [`AcquisitionState::Error`].
    pub fn cycle(&mut self) -> Result<Spectrum> {
        self.arm()?;
        let config = self.config.ok_or(Error::NotConfigured)?;
        let packet = CommandPacket::encode(&config, self.protocol());

        // Leftover rx bytes are the start of the next streamed line
        self.tx.clear();
        self.codec.encode(packet, &mut self.tx)?;
        if self.abort.is_aborted() {
            return Err(self.fault(TransportError::Aborted.into()));
        }
        trace!("Sending {}", packet);
        if let Err(e) = self.transport.send(&self.tx) {
            return Err(self.fault(e));
        }
        self.state = AcquisitionState::AwaitingResponse;

        let timeout = self.settings.response_timeout
            + Duration::from_secs_f64(config.frame_time_seconds(self.profile()));
        match self.await_response(timeout) {
            Ok(spectrum) => {
                self.spectra_received += 1;
                self.state = if config.continuous {
                    AcquisitionState::Configuring
                } else {
                    AcquisitionState::Idle
                };
                debug!(
                    "Received spectrum #{}, now {:?}",
                    spectrum.sample_index, self.state
                );
                Ok(spectrum)
            }
            Err(e) => Err(self.fault(e)),
        }
    }

    fn await_response(&mut self, timeout: Duration) -> Result<Spectrum> {
        let start = Instant::now();
        let deadline = start + timeout;
        loop {
            if self.abort.is_aborted() {
                return Err(TransportError::Aborted.into());
            }
            if let Some(spectrum) = self.codec.decode(&mut self.rx)? {
                self.check_frame_end()?;
                return Ok(spectrum);
            }
            let now = Instant::now();
            if now >= deadline {
                return match self.codec.decode_eof(&mut self.rx)? {
                    Some(spectrum) => Ok(spectrum),
                    None => Err(TransportError::Timeout(now - start).into()),
                };
            }

            let wait = (deadline - now).min(POLL_INTERVAL);
            let want = self.codec.read_hint(self.rx.len()).min(self.read_buf.len());
            let count = self.transport.receive(&mut self.read_buf[..want], wait)?;
            if count > 0 {
                trace!("Received {} bytes, {} buffered", count, self.rx.len() + count);
                self.rx.extend_from_slice(&self.read_buf[..count]);
            }
        }
    }

    /// A binary frame has no terminator, so anything still pending once the expected byte
    /// count is in means the device sent more than one frame's worth
    fn check_frame_end(&mut self) -> Result<()> {
        let expected = match self.codec.format() {
            ResponseFormat::Binary { pixel_count } => pixel_count * 2,
            ResponseFormat::Text { .. } => return Ok(()),
        };
        let extra = self.transport.receive(&mut self.read_buf, Duration::ZERO)?;
        if extra > 0 {
            return Err(MalformedResponse::LengthMismatch {
                expected,
                actual: expected + extra,
            }
            .into());
        }
        Ok(())
    }

    fn fault(&mut self, err: Error) -> Error {
        warn!("Acquisition failed: {}", err);
        // Partial responses are never interpreted
        self.rx.clear();
        self.state = AcquisitionState::Error;
        self.last_error = Some(err.to_string());
        err
    }

    /// Clears an error and returns to idle, reconnecting the transport if it dropped
    pub fn reset(&mut self) -> Result<()> {
        if !self.transport.is_connected() {
            self.transport.connect()?;
        }
        // A late answer to an aborted command must not be taken for the next one
        self.transport.discard_input()?;
        self.rx.clear();
        self.abort.clear();
        self.last_error = None;
        self.state = AcquisitionState::Idle;
        debug!("Session reset");
        Ok(())
    }

    /// Disconnects and hands the transport back
    pub fn close(mut self) -> Result<T> {
        self.transport.disconnect()?;
        info!("Session closed after {} spectra", self.spectra_received);
        Ok(self.transport)
    }
}
