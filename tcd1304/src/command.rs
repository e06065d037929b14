use crate::{
    error::{Error, MalformedResponse, Result},
    firmware::FirmwareProfile,
    protocol::ProtocolVariant,
    timing::TimingConfig,
};
use core::fmt;
use nom::{
    bytes::complete::take,
    number::complete::{be_u32, be_u8},
    sequence::tuple,
    IResult,
};

pub const COMMAND_LEN: usize = 12;

/// Timing command as sent to the firmware, always written in one piece.
///
/// | bytes | field                         |
/// |-------|-------------------------------|
/// | 0-1   | protocol header               |
/// | 2-5   | SH period, big-endian         |
/// | 6-9   | ICG period, big-endian        |
/// | 10    | mode (reserved or continuous) |
/// | 11    | averages                      |
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct CommandPacket([u8; COMMAND_LEN]);

impl CommandPacket {
    pub fn encode(config: &TimingConfig, protocol: ProtocolVariant) -> Self {
        let [h1, h2] = protocol.header();
        let [sh1, sh2, sh3, sh4] = config.sh_ticks.to_be_bytes();
        let [icg1, icg2, icg3, icg4] = config.icg_ticks.to_be_bytes();
        CommandPacket([
            h1,
            h2,
            sh1,
            sh2,
            sh3,
            sh4,
            icg1,
            icg2,
            icg3,
            icg4,
            protocol.mode_byte(config.continuous),
            config.averages,
        ])
    }

    /// Parses a raw command back into the timing it carries. Ranges are not checked, use
    /// [`TimingConfig::validate`] for that.
    pub fn decode(
        bytes: &[u8],
        protocol: ProtocolVariant,
        profile: FirmwareProfile,
    ) -> Result<TimingConfig> {
        if bytes.len() != COMMAND_LEN {
            return Err(MalformedResponse::LengthMismatch {
                expected: COMMAND_LEN,
                actual: bytes.len(),
            }
            .into());
        }
        let (_, (header, sh_ticks, icg_ticks, mode, averages)) = fields(bytes)
            .map_err(|e| MalformedResponse::ParseError(format!("Invalid command: {}", e)))?;
        if header != protocol.header() {
            return Err(Error::ProtocolMismatch {
                expected: protocol,
                detail: format!("unexpected command header {:02X?}", header),
            });
        }
        Ok(TimingConfig {
            exposure_seconds: sh_ticks as f64 / profile.params().mclk_hz as f64,
            sh_ticks,
            icg_ticks,
            averages,
            continuous: protocol.continuous_from_mode(mode),
        })
    }

    pub fn as_bytes(&self) -> &[u8; COMMAND_LEN] {
        &self.0
    }

    pub fn header(&self) -> [u8; 2] {
        [self.0[0], self.0[1]]
    }

    pub fn sh_ticks(&self) -> u32 {
        u32::from_be_bytes([self.0[2], self.0[3], self.0[4], self.0[5]])
    }

    pub fn icg_ticks(&self) -> u32 {
        u32::from_be_bytes([self.0[6], self.0[7], self.0[8], self.0[9]])
    }

    pub fn mode(&self) -> u8 {
        self.0[10]
    }

    pub fn averages(&self) -> u8 {
        self.0[11]
    }
}

fn fields(input: &[u8]) -> IResult<&[u8], ([u8; 2], u32, u32, u8, u8)> {
    let (input, (header, sh, icg, mode, averages)) =
        tuple((take(2usize), be_u32, be_u32, be_u8, be_u8))(input)?;
    // take(2) always yields 2 bytes
    Ok((input, ([header[0], header[1]], sh, icg, mode, averages)))
}

impl AsRef<[u8]> for CommandPacket {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Space separated upper-case hex, `AA 55 00 03 ...`
impl fmt::Display for CommandPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for CommandPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandPacket({})", self)
    }
}
