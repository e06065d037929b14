use core::str::from_utf8;

use nom::{
    bytes::complete::is_not,
    character::complete::{char, line_ending, space0, u16 as dec_u16, u32 as dec_u32},
    combinator::all_consuming,
    multi::separated_list1,
    sequence::{pair, terminated},
    IResult,
};

use crate::error::MalformedResponse;

fn token(input: &[u8]) -> IResult<&[u8], &[u8]> {
    is_not(&b"\t\r\n"[..])(input)
}

/// `index\tp0\tp1\t...\tpN\n`, trailing blanks after a value or before the line ending are
/// tolerated
fn line(input: &[u8]) -> IResult<&[u8], Vec<&[u8]>> {
    terminated(separated_list1(char('\t'), token), pair(space0, line_ending))(input)
}

fn describe(token: &[u8]) -> String {
    from_utf8(token)
        .map(|s| format!("{:?}", s))
        .unwrap_or_else(|_| format!("{:02X?}", token))
}

/// Decodes one newline terminated line into sample index and pixel values
pub fn decode_line(input: &[u8], pixel_count: usize) -> Result<(u32, Vec<u16>), MalformedResponse> {
    let (_, tokens) = all_consuming(line)(input)
        .map_err(|_| MalformedResponse::ParseError("Line is not a terminated list of tab separated values".to_string()))?;
    if tokens.len() != pixel_count + 1 {
        return Err(MalformedResponse::ParseError(format!(
            "Expected {} values, got {}",
            pixel_count + 1,
            tokens.len()
        )));
    }

    let (index_token, pixel_tokens) = tokens.split_at(1);
    let (_, sample_index) =
        all_consuming(terminated(dec_u32::<_, nom::error::Error<_>>, space0))(index_token[0])
            .map_err(|_| {
                MalformedResponse::ParseError(format!(
                    "Sample index {} is not an integer",
                    describe(index_token[0])
                ))
            })?;

    let pixels = pixel_tokens
        .iter()
        .enumerate()
        .map(|(idx, tok)| {
            all_consuming(terminated(dec_u16::<_, nom::error::Error<_>>, space0))(*tok)
                .map(|(_, px)| px)
                .map_err(|_| {
                    MalformedResponse::ParseError(format!(
                        "Pixel #{} {} is not an integer",
                        idx,
                        describe(tok)
                    ))
                })
        })
        .collect::<Result<Vec<u16>, _>>()?;

    Ok((sample_index, pixels))
}
