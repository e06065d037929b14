use nom::{combinator::all_consuming, multi::fill, number::complete::le_u16, IResult};

use crate::error::MalformedResponse;

/// Raw pixel dump, every pixel a little-endian u16. Independent from the big-endian command
/// fields.
fn pixels<'a>(input: &'a [u8], buf: &mut [u16]) -> IResult<&'a [u8], ()> {
    all_consuming(fill(le_u16, buf))(input)
}

/// Decodes exactly `pixel_count` pixels. Any other amount of bytes is a length mismatch.
pub fn decode_pixels(input: &[u8], pixel_count: usize) -> Result<Vec<u16>, MalformedResponse> {
    let expected = pixel_count * 2;
    if input.len() != expected {
        return Err(MalformedResponse::LengthMismatch {
            expected,
            actual: input.len(),
        });
    }
    let mut data = vec![0u16; pixel_count];
    pixels(input, &mut data)
        .map_err(|e| MalformedResponse::ParseError(format!("Invalid pixel data: {:?}", e)))?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::*;

    #[test]
    fn little_endian_pixels() {
        assert_ok_eq!(
            decode_pixels(&[0x34, 0x12, 0xFF, 0x0F, 0x00, 0xF0], 3),
            vec![0x1234, 0x0FFF, 0xF000]
        );
    }

    #[test]
    fn length_mismatch() {
        assert_err_eq!(
            decode_pixels(&[0u8; 7387], 3694),
            MalformedResponse::LengthMismatch {
                expected: 7388,
                actual: 7387
            }
        );
        assert_err_eq!(
            decode_pixels(&[0u8; 7389], 3694),
            MalformedResponse::LengthMismatch {
                expected: 7388,
                actual: 7389
            }
        );
    }

    #[test]
    fn values_are_not_clamped() {
        assert_ok_eq!(decode_pixels(&[0xFF, 0xFF], 1), vec![u16::MAX]);
    }
}
