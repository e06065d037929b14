pub mod binary;
pub mod text;

use bytes::{Buf, BytesMut};
use time::OffsetDateTime;
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    command::{CommandPacket, COMMAND_LEN},
    error::{Error, MalformedResponse, Result},
    protocol::{ProtocolVariant, ResponseFormat},
};

/// Widest decimal pixel or index value plus separator
const MAX_TOKEN_LEN: usize = 11;
/// Chunk size requested from the transport while waiting for a text line
const TEXT_READ_CHUNK: usize = 1024;

/// One spectrum as returned by the device, already averaged on the device side
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Spectrum {
    pub sample_index: u32,
    pub pixels: Vec<u16>,
    pub captured_at: OffsetDateTime,
}

impl Spectrum {
    /// Index and a few pixels from both ends, for status displays
    pub fn summary(&self) -> String {
        let px = &self.pixels;
        let mut parts = vec![self.sample_index.to_string()];
        if px.len() > 9 {
            parts.extend(px[..3].iter().map(u16::to_string));
            parts.push("...".to_string());
            parts.extend(px[px.len() - 2..].iter().map(u16::to_string));
        } else {
            parts.extend(px.iter().map(u16::to_string));
        }
        parts.join("\t")
    }

    /// Same line layout as the text wire format
    pub fn to_text_line(&self) -> String {
        let mut line = self.sample_index.to_string();
        for px in &self.pixels {
            line.push('\t');
            line.push_str(&px.to_string());
        }
        line.push('\n');
        line
    }
}

/// Frames commands and spectra on the byte stream of one session.
///
/// The decoder only yields a spectrum once a complete frame is buffered, so callers can keep
/// feeding it transport chunks until it does.
#[derive(Debug)]
pub struct SpectrumCodec {
    protocol: ProtocolVariant,
    format: ResponseFormat,
    next_index: u32,
}

impl SpectrumCodec {
    pub fn new(protocol: ProtocolVariant) -> Self {
        SpectrumCodec {
            protocol,
            format: protocol.response_format(),
            next_index: 0,
        }
    }

    pub fn format(&self) -> ResponseFormat {
        self.format
    }

    /// Upper bound of bytes that can be read from the transport without reading past the
    /// current frame. Binary frames have a known length, text lines do not.
    pub fn read_hint(&self, buffered: usize) -> usize {
        match self.format {
            ResponseFormat::Binary { pixel_count } => (pixel_count * 2).saturating_sub(buffered),
            ResponseFormat::Text { .. } => TEXT_READ_CHUNK,
        }
    }

    fn spectrum(&mut self, sample_index: u32, pixels: Vec<u16>) -> Spectrum {
        self.next_index = sample_index.wrapping_add(1);
        Spectrum {
            sample_index,
            pixels,
            captured_at: OffsetDateTime::now_utc(),
        }
    }

    fn decode_binary(&mut self, src: &mut BytesMut, pixel_count: usize) -> Result<Option<Spectrum>> {
        let expected = pixel_count * 2;
        if src.len() < expected {
            // Preallocate space for a frame
            src.reserve(expected - src.len());
            return Ok(None);
        }
        if src.len() > expected {
            return Err(MalformedResponse::LengthMismatch {
                expected,
                actual: src.len(),
            }
            .into());
        }
        let frame = src.split_to(expected);
        let pixels = binary::decode_pixels(&frame, pixel_count)?;
        let idx = self.next_index;
        Ok(Some(self.spectrum(idx, pixels)))
    }

    fn decode_text(&mut self, src: &mut BytesMut, pixel_count: usize) -> Result<Option<Spectrum>> {
        loop {
            let newline = src.iter().position(|b| *b == b'\n');
            let scanned = newline.map(|pos| pos + 1).unwrap_or(src.len());
            if let Some(b) = src[..scanned]
                .iter()
                .find(|b| !(b.is_ascii_graphic() || matches!(b, b' ' | b'\t' | b'\r' | b'\n')))
            {
                return Err(Error::ProtocolMismatch {
                    expected: self.protocol,
                    detail: format!("byte 0x{:02X} in a text response", b),
                });
            }

            match newline {
                None => {
                    let max_len = (pixel_count + 1) * MAX_TOKEN_LEN + 2;
                    if src.len() > max_len {
                        return Err(MalformedResponse::ParseError(format!(
                            "No line ending within {} bytes",
                            max_len
                        ))
                        .into());
                    }
                    return Ok(None);
                }
                Some(pos) if src[..pos].iter().all(|b| b.is_ascii_whitespace()) => {
                    // Blank keep-alive line
                    src.advance(pos + 1);
                }
                Some(pos) => {
                    let line = src.split_to(pos + 1);
                    let (idx, pixels) = text::decode_line(&line, pixel_count)?;
                    return Ok(Some(self.spectrum(idx, pixels)));
                }
            }
        }
    }
}

impl Decoder for SpectrumCodec {
    type Item = Spectrum;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.format {
            ResponseFormat::Binary { pixel_count } => self.decode_binary(src, pixel_count),
            ResponseFormat::Text { pixel_count } => self.decode_text(src, pixel_count),
        }
    }

    /// Called once no more data will arrive for the current frame
    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None => Err(match self.format {
                ResponseFormat::Binary { pixel_count } => MalformedResponse::LengthMismatch {
                    expected: pixel_count * 2,
                    actual: buf.len(),
                },
                ResponseFormat::Text { .. } => MalformedResponse::ParseError(format!(
                    "Line ended after {} bytes without a line ending",
                    buf.len()
                )),
            }
            .into()),
        }
    }
}

impl Encoder<CommandPacket> for SpectrumCodec {
    type Error = Error;

    fn encode(&mut self, cmd: CommandPacket, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(COMMAND_LEN);
        dst.extend_from_slice(cmd.as_ref());
        Ok(())
    }
}
