//! Multi-byte numeric encodings over 7-bit data bytes.

use bytes::BufMut;

use crate::error::{CodecError, Result};

/// Largest value a 14-bit field can carry.
pub const MAX_14BIT: u16 = 0x3FFF;

/// Largest magnitude [`encode32_signed`] can carry (31 bits).
pub const MAX_32BIT_MAGNITUDE: u32 = 0x7FFF_FFFF;

/// Largest significand of a scaled float (23 bits).
pub const MAX_SCALED_SIGNIFICAND: u32 = 0x7F_FFFF;

const SCALED_EXPONENT_BIAS: i32 = 11;
const SIGN_BIT_32: u8 = 0x08;
const SIGN_BIT_FLOAT: u8 = 0x40;

fn require(src: &[u8], needed: usize) -> Result<()> {
    if src.len() < needed {
        return Err(CodecError::Length {
            needed,
            actual: src.len(),
        });
    }
    Ok(())
}

/// Split a value into two 7-bit bytes, least significant first.
///
/// Bits above the 14th are discarded.
pub fn encode14(value: u16) -> [u8; 2] {
    [(value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8]
}

/// Join two 7-bit bytes, least significant first.
pub fn decode14(src: &[u8]) -> Result<u16> {
    require(src, 2)?;
    Ok(u16::from(src[0] & 0x7F) | (u16::from(src[1] & 0x7F) << 7))
}

/// Append a 14-bit value to `dst`.
pub fn put14(dst: &mut impl BufMut, value: u16) {
    dst.put_slice(&encode14(value));
}

/// Encode a signed 32-bit value as five 7-bit bytes.
///
/// The magnitude occupies 4×7 bits plus the low 3 bits of the fifth byte and
/// the sign sits in bit 3 of the fifth byte. `i32::MIN` saturates to
/// `-(2^31 - 1)` since its magnitude does not fit.
pub fn encode32_signed(value: i32) -> [u8; 5] {
    let magnitude = value.unsigned_abs().min(MAX_32BIT_MAGNITUDE);
    let mut last = ((magnitude >> 28) & 0x07) as u8;
    if value < 0 {
        last |= SIGN_BIT_32;
    }
    [
        (magnitude & 0x7F) as u8,
        ((magnitude >> 7) & 0x7F) as u8,
        ((magnitude >> 14) & 0x7F) as u8,
        ((magnitude >> 21) & 0x7F) as u8,
        last,
    ]
}

/// Decode five 7-bit bytes produced by [`encode32_signed`].
pub fn decode32_signed(src: &[u8]) -> Result<i32> {
    require(src, 5)?;
    let magnitude = u32::from(src[0] & 0x7F)
        | (u32::from(src[1] & 0x7F) << 7)
        | (u32::from(src[2] & 0x7F) << 14)
        | (u32::from(src[3] & 0x7F) << 21)
        | (u32::from(src[4] & 0x07) << 28);
    // magnitude is at most 31 bits so the cast is lossless
    let value = magnitude as i32;
    if src[4] & SIGN_BIT_32 != 0 {
        Ok(-value)
    } else {
        Ok(value)
    }
}

/// Decode a 4-byte scaled float.
///
/// Layout: 23-bit significand in bytes 0-2 and bits 0-1 of byte 3, a 4-bit
/// exponent in bits 2-5 of byte 3 biased by -11, sign in bit 6 of byte 3.
pub fn decode_scaled_float(src: &[u8]) -> Result<f64> {
    require(src, 4)?;
    let significand = u32::from(src[0] & 0x7F)
        | (u32::from(src[1] & 0x7F) << 7)
        | (u32::from(src[2] & 0x7F) << 14)
        | (u32::from(src[3] & 0x03) << 21);
    let exponent = i32::from((src[3] >> 2) & 0x0F) - SCALED_EXPONENT_BIAS;
    let negative = src[3] & SIGN_BIT_FLOAT != 0;

    let magnitude = if exponent < 0 {
        f64::from(significand) / 10f64.powi(-exponent)
    } else {
        f64::from(significand) * 10f64.powi(exponent)
    };
    Ok(if negative { -magnitude } else { magnitude })
}

/// Encode a value as a 4-byte scaled float.
///
/// Picks the smallest exponent whose significand still fits in 23 bits.
/// Values too large for any exponent saturate; NaN encodes as zero.
pub fn encode_scaled_float(value: f64) -> [u8; 4] {
    let negative = value.is_sign_negative() && value != 0.0;
    let magnitude = if value.is_nan() { 0.0 } else { value.abs() };

    let mut chosen = (0x0F_u8, MAX_SCALED_SIGNIFICAND);
    for raw in 0u8..=0x0F {
        let exponent = i32::from(raw) - SCALED_EXPONENT_BIAS;
        let scaled = if exponent < 0 {
            magnitude * 10f64.powi(-exponent)
        } else {
            magnitude / 10f64.powi(exponent)
        };
        let rounded = scaled.round();
        if rounded <= f64::from(MAX_SCALED_SIGNIFICAND) {
            chosen = (raw, rounded as u32);
            break;
        }
    }

    let (raw_exponent, significand) = chosen;
    let mut last = ((significand >> 21) & 0x03) as u8 | (raw_exponent << 2);
    if negative {
        last |= SIGN_BIT_FLOAT;
    }
    [
        (significand & 0x7F) as u8,
        ((significand >> 7) & 0x7F) as u8,
        ((significand >> 14) & 0x7F) as u8,
        last,
    ]
}

/// Append `text` as STRING_DATA payload: each byte becomes two 7-bit bytes,
/// least significant first.
pub fn encode_string_data(text: &str, dst: &mut impl BufMut) {
    for byte in text.bytes() {
        dst.put_u8(byte & 0x7F);
        dst.put_u8((byte >> 7) & 0x01);
    }
}

/// Decode a STRING_DATA payload. A trailing odd byte is ignored.
pub fn decode_string_data(src: &[u8]) -> String {
    let bytes: Vec<u8> = src
        .chunks_exact(2)
        .map(|pair| (pair[0] & 0x7F) | ((pair[1] & 0x01) << 7))
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn fourteen_bit_boundaries() {
        assert_eq!(encode14(0), [0x00, 0x00]);
        assert_eq!(encode14(0x3FFF), [0x7F, 0x7F]);
        assert_eq!(encode14(300), [0x2C, 0x02]);
        assert_eq!(decode14(&[0x2C, 0x02]).unwrap(), 300);
        for value in [0u16, 1, 127, 128, 8191, 16383] {
            assert_eq!(decode14(&encode14(value)).unwrap(), value);
        }
    }

    #[test]
    fn fourteen_bit_truncated_input() {
        let err = decode14(&[0x01]).unwrap_err();
        assert!(matches!(err, CodecError::Length { needed: 2, actual: 1 }));
    }

    #[test]
    fn signed_32_uses_sign_magnitude() {
        assert_eq!(encode32_signed(-1), [0x01, 0x00, 0x00, 0x00, 0x08]);
        assert_eq!(encode32_signed(1), [0x01, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(decode32_signed(&[0x01, 0, 0, 0, 0x08]).unwrap(), -1);
    }

    #[test]
    fn signed_32_extremes() {
        let max = i32::MAX;
        assert_eq!(encode32_signed(max), [0x7F, 0x7F, 0x7F, 0x7F, 0x07]);
        assert_eq!(decode32_signed(&encode32_signed(max)).unwrap(), max);
        assert_eq!(decode32_signed(&encode32_signed(-max)).unwrap(), -max);
        assert_eq!(decode32_signed(&encode32_signed(i32::MIN)).unwrap(), -max);
        assert_eq!(decode32_signed(&encode32_signed(0)).unwrap(), 0);
    }

    #[test]
    fn signed_32_truncated_input() {
        let err = decode32_signed(&[0, 0, 0]).unwrap_err();
        assert!(matches!(err, CodecError::Length { needed: 5, actual: 3 }));
    }

    #[test]
    fn scaled_float_decodes_known_values() {
        // significand 1, exponent 0 (raw 11)
        assert_eq!(decode_scaled_float(&[0x01, 0x00, 0x00, 0x2C]).unwrap(), 1.0);
        // significand 25, exponent -1, negative
        assert_eq!(decode_scaled_float(&[25, 0x00, 0x00, 0x68]).unwrap(), -2.5);
        // significand 3, exponent 2
        assert_eq!(decode_scaled_float(&[3, 0x00, 0x00, 13 << 2]).unwrap(), 300.0);
    }

    #[test]
    fn scaled_float_encoding_prefers_precision() {
        let bytes = encode_scaled_float(1.5);
        assert_eq!(decode_scaled_float(&bytes).unwrap(), 1.5);
        // 1.5 needs exponent -6: 1_500_000 fits, 15_000_000 does not
        assert_eq!((bytes[3] >> 2) & 0x0F, 5);

        assert_eq!(decode_scaled_float(&encode_scaled_float(-0.25)).unwrap(), -0.25);
        assert_eq!(decode_scaled_float(&encode_scaled_float(0.0)).unwrap(), 0.0);
        assert_eq!(
            decode_scaled_float(&encode_scaled_float(123_456.0)).unwrap(),
            123_456.0
        );
    }

    #[test]
    fn scaled_float_truncated_input() {
        assert!(matches!(
            decode_scaled_float(&[0x01, 0x00]),
            Err(CodecError::Length { needed: 4, actual: 2 })
        ));
    }

    #[test]
    fn string_data_splits_each_byte() {
        let mut buf = BytesMut::new();
        encode_string_data("Hi\u{e9}", &mut buf);
        // 'H' 'i' then the two UTF-8 bytes of 'é' (0xC3 0xA9)
        assert_eq!(
            buf.as_ref(),
            &[0x48, 0x00, 0x69, 0x00, 0x43, 0x01, 0x29, 0x01]
        );
        assert_eq!(decode_string_data(&buf), "Hi\u{e9}");
    }

    #[test]
    fn string_data_ignores_odd_tail() {
        assert_eq!(decode_string_data(&[0x41, 0x00, 0x42]), "A");
    }
}
