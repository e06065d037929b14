use lazy_static::lazy_static;
use manifest_dir_macros::exist_relative_path;
use mockall::mock;
use nom::{
    bytes::complete::take_while_m_n,
    character::complete::multispace0,
    combinator::{all_consuming, map_res},
    multi::many1,
    sequence::delimited,
    IResult,
};
use std::io::{Read, Write};

/// Decodes a pair of chars formatted as hex into a byte. For example "FF" -> 255
fn hex_byte(input: &str) -> IResult<&str, u8> {
    map_res(
        take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()),
        |hex| u8::from_str_radix(hex, 16),
    )(input)
}

/// Whitespace separated hex dump, line breaks included
pub fn parse_hex_str(input: &str) -> IResult<&str, Vec<u8>> {
    all_consuming(many1(delimited(multispace0, hex_byte, multispace0)))(input)
}

lazy_static! {
    /// Little-endian pixels of one 3694 pixel frame as sent by the binary protocol
    pub static ref SINGLE_BINARY_FRAME: Vec<u8> = {
        let hex_str = include_str!(exist_relative_path!(
            "resources/test/single_binary_frame.txt"
        ));
        let (_, data) = parse_hex_str(hex_str)
            .expect("Failed to parse resources/test/single_binary_frame.txt");
        data
    };
    /// One 3648 pixel line as sent by the text protocol, sample index 42
    pub static ref SINGLE_TEXT_LINE: Vec<u8> = include_str!(exist_relative_path!(
        "resources/test/single_text_line.txt"
    ))
    .as_bytes()
    .to_vec();
}

mock! {
    pub IO {}
    impl Read for IO {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
    }
    impl Write for IO {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize>;
        fn flush(&mut self) -> std::io::Result<()>;
    }
}

/// Returns a read closure for [`MockIO`] that hands out `data` in chunks of at most
/// `chunk_size` bytes and then reports a timeout
pub fn chunked_reader(
    data: Vec<u8>,
    chunk_size: usize,
) -> impl FnMut(&mut [u8]) -> std::io::Result<usize> + Send + 'static {
    let mut offset = 0;
    move |buf: &mut [u8]| {
        if offset >= data.len() {
            return Err(std::io::ErrorKind::TimedOut.into());
        }
        let end = data.len().min(offset + chunk_size.min(buf.len()));
        let count = (&mut *buf).write(&data[offset..end])?;
        offset += count;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::*;

    #[test]
    fn hex_byte_parser() {
        assert_ok_eq!(hex_byte("FF"), ("", 255));
        assert_ok_eq!(hex_byte("ff"), ("", 255));
        assert_err!(hex_byte("NH"));
    }

    #[test]
    fn hex_str_parser() {
        assert_ok_eq!(
            parse_hex_str("DEADBEEF"),
            ("", vec![0xDE, 0xAD, 0xBE, 0xEF])
        );
        assert_ok_eq!(
            parse_hex_str(" DE   AD\nBE EF \n"),
            ("", vec![0xDE, 0xAD, 0xBE, 0xEF])
        );
        assert_err!(parse_hex_str("NOT HEX"));
    }

    #[test]
    fn fixtures_have_expected_size() {
        assert_eq!(SINGLE_BINARY_FRAME.len(), 3694 * 2);
        assert_eq!(SINGLE_TEXT_LINE.iter().filter(|b| **b == b'\t').count(), 3648);
    }

    #[test]
    fn chunked_reader_times_out_when_drained() {
        let mut read = chunked_reader(vec![1, 2, 3, 4, 5], 2);
        let mut buf = [0u8; 8];
        assert_ok_eq!(read(&mut buf), 2);
        assert_ok_eq!(read(&mut buf), 2);
        assert_ok_eq!(read(&mut buf), 1);
        assert_eq!(buf[0], 5);
        assert_eq!(
            read(&mut buf).unwrap_err().kind(),
            std::io::ErrorKind::TimedOut
        );
    }
}
