use crate::{
    error::{Error, MalformedResponse},
    protocol::ProtocolVariant,
    response::SpectrumCodec,
};

use bytes::BytesMut;
use claims::*;
use tokio_util::codec::Decoder;
use utilities::{SINGLE_BINARY_FRAME, SINGLE_TEXT_LINE};

fn deviation(pixels: &[u16]) -> f32 {
    let size = pixels.len() as f32;
    let mean = pixels.iter().fold(0f32, |accum, x| accum + (*x as f32 / size));
    (pixels
        .iter()
        .map(|val| {
            let diff = mean - *val as f32;
            diff * diff
        })
        .sum::<f32>()
        / size)
        .sqrt()
}

#[test]
fn decode_binary_frame() {
    let mut codec = SpectrumCodec::new(ProtocolVariant::Aa55Binary);
    let mut src = BytesMut::from(&SINGLE_BINARY_FRAME[..]);
    let spectrum = codec.decode(&mut src).unwrap().unwrap();
    assert!(src.is_empty());
    assert_eq!(spectrum.pixels.len(), 3694);
    assert_eq!(spectrum.pixels[0], u16::from_le_bytes([SINGLE_BINARY_FRAME[0], SINGLE_BINARY_FRAME[1]]));
    assert!(spectrum.pixels.iter().all(|px| *px <= 4095));
    // A real spectrum has peaks, a flat line would mean the bytes were misread
    assert!(deviation(&spectrum.pixels) > 100.0);
}

#[test]
fn binary_frame_in_chunks() {
    let mut codec = SpectrumCodec::new(ProtocolVariant::Aa55Binary);
    let mut src = BytesMut::new();
    let mut decoded = None;
    for chunk in SINGLE_BINARY_FRAME.chunks(333) {
        assert_none!(decoded.as_ref());
        src.extend_from_slice(chunk);
        decoded = codec.decode(&mut src).unwrap();
        if decoded.is_none() {
            assert_eq!(codec.read_hint(src.len()), 3694 * 2 - src.len());
        }
    }
    let spectrum = decoded.unwrap();
    assert_eq!(spectrum.sample_index, 0);

    src.extend_from_slice(&SINGLE_BINARY_FRAME);
    assert_eq!(codec.decode(&mut src).unwrap().unwrap().sample_index, 1);
}

#[test]
fn binary_frame_one_byte_short() {
    let mut codec = SpectrumCodec::new(ProtocolVariant::Aa55Binary);
    let mut src = BytesMut::from(&SINGLE_BINARY_FRAME[..SINGLE_BINARY_FRAME.len() - 1]);
    assert_ok_eq!(codec.decode(&mut src), None);
    assert_matches!(
        codec.decode_eof(&mut src),
        Err(Error::Malformed(MalformedResponse::LengthMismatch {
            expected: 7388,
            actual: 7387
        }))
    );
}

#[test]
fn binary_frame_with_trailing_bytes() {
    let mut codec = SpectrumCodec::new(ProtocolVariant::Aa55Binary);
    let mut src = BytesMut::from(&SINGLE_BINARY_FRAME[..]);
    src.extend_from_slice(&[0, 0]);
    assert_matches!(
        codec.decode(&mut src),
        Err(Error::Malformed(MalformedResponse::LengthMismatch { actual: 7390, .. }))
    );
}

#[test]
fn decode_text_line() {
    let mut codec = SpectrumCodec::new(ProtocolVariant::ErText);
    let mut src = BytesMut::from(&SINGLE_TEXT_LINE[..]);
    let spectrum = codec.decode(&mut src).unwrap().unwrap();
    assert!(src.is_empty());
    assert_eq!(spectrum.sample_index, 42);
    assert_eq!(spectrum.pixels.len(), 3648);
    assert!(deviation(&spectrum.pixels) > 100.0);
    assert_eq!(spectrum.to_text_line().as_bytes(), &SINGLE_TEXT_LINE[..]);
}

#[test]
fn text_line_in_chunks_after_blank_lines() {
    let mut codec = SpectrumCodec::new(ProtocolVariant::ErText);
    let mut src = BytesMut::from(&b"\r\n \n"[..]);
    assert_ok_eq!(codec.decode(&mut src), None);
    assert!(src.is_empty());

    let mut decoded = None;
    for chunk in SINGLE_TEXT_LINE.chunks(1000) {
        src.extend_from_slice(chunk);
        decoded = codec.decode(&mut src).unwrap();
    }
    assert_eq!(decoded.unwrap().sample_index, 42);
}

#[test]
fn text_line_cut_short() {
    let mut codec = SpectrumCodec::new(ProtocolVariant::ErText);
    let mut src = BytesMut::from(&SINGLE_TEXT_LINE[..SINGLE_TEXT_LINE.len() / 2]);
    assert_ok_eq!(codec.decode(&mut src), None);
    assert_matches!(
        codec.decode_eof(&mut src),
        Err(Error::Malformed(MalformedResponse::ParseError(_)))
    );
}

#[test]
fn text_line_with_missing_pixels() {
    let mut codec = SpectrumCodec::new(ProtocolVariant::ErText);
    let mut src = BytesMut::from(&b"7\t100\t200\t300\n"[..]);
    assert_matches!(
        codec.decode(&mut src),
        Err(Error::Malformed(MalformedResponse::ParseError(msg))) if msg == "Expected 3649 values, got 4"
    );
}

#[test]
fn binary_bytes_in_text_mode() {
    let mut codec = SpectrumCodec::new(ProtocolVariant::ErText);
    let mut src = BytesMut::from(&SINGLE_BINARY_FRAME[..64]);
    assert_matches!(
        codec.decode(&mut src),
        Err(Error::ProtocolMismatch {
            expected: ProtocolVariant::ErText,
            ..
        })
    );
}

#[test]
fn empty_buffer_at_eof() {
    let mut codec = SpectrumCodec::new(ProtocolVariant::Aa55Binary);
    assert_ok_eq!(codec.decode_eof(&mut BytesMut::new()), None);
}
