use super::*;

fn encode_with(
    f: impl FnOnce(&mut WireEncoder<Vec<u8>>) -> io::Result<()>,
) -> Vec<u8> {
    let mut encoder = WireEncoder::new(Vec::new());
    f(&mut encoder).unwrap();
    encoder.into_inner()
}

#[test]
fn varint_roundtrip() {
    let test_values: &[u64] =
        &[0, 1, 127, 128, 255, 256, 16383, 16384, u64::MAX / 2, u64::MAX];

    for &value in test_values {
        let bytes = encode_with(|e| e.emit_varint(value));
        assert_eq!(bytes.len(), varint_len(value));

        let mut decoder = WireDecoder::new(&bytes[..]);
        assert_eq!(decoder.read_varint().unwrap(), value);
        assert_eq!(decoder.position(), bytes.len() as u64);
    }
}

#[test]
fn varint_compactness() {
    assert_eq!(encode_with(|e| e.emit_varint(0)), [0x00]);
    assert_eq!(encode_with(|e| e.emit_varint(127)), [0x7F]);
    assert_eq!(encode_with(|e| e.emit_varint(128)), [0x80, 0x01]);
    assert_eq!(encode_with(|e| e.emit_varint(300)), [0xAC, 0x02]);
}

#[test]
fn overlong_varint_is_rejected() {
    let bytes = [0xFF; 11];
    let mut decoder = WireDecoder::new(&bytes[..]);

    let error = decoder.read_varint().unwrap_err();
    assert_eq!(error.kind(), io::ErrorKind::InvalidData);
}

#[test]
fn fixed_width_integers_are_little_endian() {
    assert_eq!(encode_with(|e| e.emit_i32(1)), [1, 0, 0, 0]);
    assert_eq!(encode_with(|e| e.emit_i32(-1)), [0xFF; 4]);
    assert_eq!(encode_with(|e| e.emit_u16(0x0102)), [0x02, 0x01]);
    assert_eq!(encode_with(|e| e.emit_i64(i64::MIN)).len(), 8);
}

#[test]
#[allow(clippy::float_cmp)]
fn scalar_roundtrip() {
    let bytes = encode_with(|e| {
        e.emit_bool(true)?;
        e.emit_char('ß')?;
        e.emit_f32(std::f32::consts::PI)?;
        e.emit_f64(std::f64::consts::E)?;
        e.emit_i128(i128::MIN)?;
        e.emit_u128(u128::MAX)
    });

    let mut decoder = WireDecoder::new(&bytes[..]);
    assert!(decoder.read_bool().unwrap());
    assert_eq!(decoder.read_char().unwrap(), 'ß');
    assert_eq!(decoder.read_f32().unwrap(), std::f32::consts::PI);
    assert_eq!(decoder.read_f64().unwrap(), std::f64::consts::E);
    assert_eq!(decoder.read_i128().unwrap(), i128::MIN);
    assert_eq!(decoder.read_u128().unwrap(), u128::MAX);
}

#[test]
fn invalid_bool_is_rejected() {
    let mut decoder = WireDecoder::new(&[2u8][..]);
    assert!(decoder.read_bool().is_err());
}

#[test]
fn string_roundtrip_spans_chunks() {
    let value = "Hello, World! ".repeat(2_000);
    let bytes = encode_with(|e| e.emit_str(&value));

    let mut decoder = WireDecoder::new(&bytes[..]);
    assert_eq!(decoder.read_string().unwrap(), value);
}

#[test]
fn truncated_string_fails_without_huge_allocation() {
    // claims 2^40 bytes but carries three
    let mut bytes = encode_with(|e| e.emit_varint(1 << 40));
    bytes.extend_from_slice(b"abc");

    let mut decoder = WireDecoder::new(&bytes[..]);
    let error = decoder.read_string().unwrap_err();
    assert_eq!(error.kind(), io::ErrorKind::UnexpectedEof);
}

#[test]
fn position_tracks_emitted_bytes() {
    let mut encoder = WireEncoder::new(Vec::new());
    encoder.emit_u8(1).unwrap();
    encoder.emit_str("abc").unwrap();
    assert_eq!(encoder.position(), 5);
}
