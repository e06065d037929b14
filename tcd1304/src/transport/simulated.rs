//! Stand-in for a real sensor board, used for tests and for running without hardware.
//!
//! The simulated device decodes every command it is sent and answers with a synthetic
//! spectrum in the wire format of the configured protocol.

use super::Transport;
use crate::{
    command::{CommandPacket, COMMAND_LEN},
    error::{Result, TransportError},
    firmware::FirmwareProfile,
    protocol::{ProtocolVariant, ResponseFormat},
    response::Spectrum,
    timing::TimingConfig,
};
use bytes::{Buf, BytesMut};
use log::{trace, warn};
use std::{
    io,
    thread,
    time::{Duration, Instant},
};
use time::OffsetDateTime;

const DARK_LEVEL: f64 = 180.0;
const FULL_SCALE: u16 = 4095;
const NOISE_MASK: u32 = 0x1F;
/// Exposure at which the synthetic peaks reach their nominal height
const REFERENCE_EXPOSURE: f64 = 0.01;
/// (center as fraction of the line, width as fraction of the line, height in counts)
const PEAKS: [(f64, f64, f64); 3] = [(0.21, 0.004, 2600.0), (0.48, 0.012, 1400.0), (0.77, 0.006, 3100.0)];

#[derive(Debug, Clone)]
pub struct SimulatorOptions {
    /// Largest chunk handed out per `receive` call
    pub chunk_size: usize,
    /// Delay between a command and its response
    pub latency: Duration,
    /// Also wait for the frame time the command asks for
    pub pace: bool,
    /// Bytes dropped from the end of every response
    pub truncate_by: usize,
    pub fail_writes: bool,
    /// Accept commands but never answer
    pub silent: bool,
    pub seed: u32,
}

impl Default for SimulatorOptions {
    fn default() -> Self {
        SimulatorOptions {
            chunk_size: 512,
            latency: Duration::ZERO,
            pace: false,
            truncate_by: 0,
            fail_writes: false,
            silent: false,
            seed: 0x1304_1304,
        }
    }
}

pub struct SimulatedTransport {
    protocol: ProtocolVariant,
    profile: FirmwareProfile,
    options: SimulatorOptions,
    connected: bool,
    pending: BytesMut,
    ready_at: Option<Instant>,
    sample_index: u32,
    noise: u32,
    commands: Vec<CommandPacket>,
}

impl SimulatedTransport {
    pub fn new(protocol: ProtocolVariant, profile: FirmwareProfile) -> Self {
        Self::with_options(protocol, profile, SimulatorOptions::default())
    }

    pub fn with_options(
        protocol: ProtocolVariant,
        profile: FirmwareProfile,
        options: SimulatorOptions,
    ) -> Self {
        SimulatedTransport {
            protocol,
            profile,
            noise: options.seed.max(1),
            options,
            connected: false,
            pending: BytesMut::new(),
            ready_at: None,
            sample_index: 0,
            commands: Vec::new(),
        }
    }

    /// Every command accepted so far, in arrival order
    pub fn commands(&self) -> &[CommandPacket] {
        &self.commands
    }

    pub fn options_mut(&mut self) -> &mut SimulatorOptions {
        &mut self.options
    }

    // xorshift32
    fn next_noise(&mut self) -> u16 {
        let mut x = self.noise;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.noise = x;
        (x & NOISE_MASK) as u16
    }

    fn synthesize(&mut self, config: &TimingConfig, pixel_count: usize) -> Vec<u16> {
        let scale = config.exposure_seconds / REFERENCE_EXPOSURE;
        (0..pixel_count)
            .map(|i| {
                let x = i as f64 / pixel_count as f64;
                let signal: f64 = PEAKS
                    .iter()
                    .map(|(center, width, height)| {
                        let d = (x - center) / width;
                        height * (-0.5 * d * d).exp()
                    })
                    .sum();
                let level = (DARK_LEVEL + signal * scale).min(FULL_SCALE as f64) as u16;
                level.saturating_add(self.next_noise()).min(FULL_SCALE)
            })
            .collect()
    }

    fn respond(&mut self, config: &TimingConfig) {
        let format = self.protocol.response_format();
        let pixels = self.synthesize(config, format.pixel_count());
        let spectrum = Spectrum {
            sample_index: self.sample_index,
            pixels,
            captured_at: OffsetDateTime::now_utc(),
        };
        self.sample_index = self.sample_index.wrapping_add(1);

        let mut response = match format {
            ResponseFormat::Binary { .. } => spectrum
                .pixels
                .iter()
                .flat_map(|px| px.to_le_bytes())
                .collect::<Vec<u8>>(),
            ResponseFormat::Text { .. } => spectrum.to_text_line().into_bytes(),
        };
        let keep = response.len().saturating_sub(self.options.truncate_by);
        response.truncate(keep);

        let mut delay = self.options.latency;
        if self.options.pace {
            delay += Duration::from_secs_f64(config.frame_time_seconds(self.profile));
        }
        self.ready_at = Some(Instant::now() + delay);
        self.pending.extend_from_slice(&response);
    }
}

impl Transport for SimulatedTransport {
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        self.pending.clear();
        self.ready_at = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(TransportError::NotConnected.into());
        }
        if self.options.fail_writes {
            return Err(TransportError::Write(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "simulated write failure",
            ))
            .into());
        }
        trace!("Simulated device received {:02X?}", bytes);
        if bytes.len() != COMMAND_LEN {
            warn!("Simulated device ignored a {} byte write", bytes.len());
            return Ok(());
        }
        let config = match CommandPacket::decode(bytes, self.protocol, self.profile) {
            Ok(config) => config,
            Err(e) => {
                warn!("Simulated device ignored command: {}", e);
                return Ok(());
            }
        };
        if let Err(e) = config.validate(self.profile) {
            warn!("Simulated device ignored command: {}", e);
            return Ok(());
        }
        self.commands.push(CommandPacket::encode(&config, self.protocol));
        if !self.options.silent {
            self.respond(&config);
        }
        Ok(())
    }

    fn discard_input(&mut self) -> Result<()> {
        self.pending.clear();
        self.ready_at = None;
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(TransportError::NotConnected.into());
        }
        let deadline = Instant::now() + timeout;
        let ready_at = match self.ready_at {
            Some(t) if !self.pending.is_empty() => t,
            _ => {
                thread::sleep(timeout);
                return Ok(0);
            }
        };
        if ready_at > deadline {
            thread::sleep(timeout);
            return Ok(0);
        }
        thread::sleep(ready_at.saturating_duration_since(Instant::now()));

        let count = buf.len().min(self.options.chunk_size).min(self.pending.len());
        buf[..count].copy_from_slice(&self.pending[..count]);
        self.pending.advance(count);
        Ok(count)
    }
}
