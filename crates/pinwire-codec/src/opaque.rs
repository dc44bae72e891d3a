//! Opaque parameter blocks carried as base64 text inside sysex bodies.
//!
//! The standard alphabet is 7-bit clean, so an encoded block needs no further
//! packing.

use base64::{engine::general_purpose, Engine as _};

use crate::error::{CodecError, Result};

/// Base64-encode `data` (standard alphabet, padded).
pub fn encode_opaque(data: &[u8]) -> String {
    general_purpose::STANDARD.encode(data)
}

/// Number of bytes `encoded` decodes to, computed without decoding.
pub fn decoded_len(encoded: &[u8]) -> usize {
    let padding = encoded.iter().rev().take(2).take_while(|&&b| b == b'=').count();
    let significant = encoded.len() - padding;
    significant * 3 / 4
}

/// Decode a base64 block of at most `max` decoded bytes.
///
/// The limit is checked from the encoded length before any buffer is
/// allocated. The buffer has room for one trailing NUL so the result can be
/// handed to C-string consumers; the NUL is not part of the returned length.
pub fn decode_opaque(encoded: &[u8], max: usize) -> Result<Vec<u8>> {
    let size = decoded_len(encoded);
    if size > max {
        return Err(CodecError::MessageTooLarge { size, max });
    }

    let mut out = Vec::new();
    out.try_reserve_exact(size + 1)
        .map_err(|_| CodecError::Allocation { size: size + 1 })?;
    general_purpose::STANDARD.decode_vec(encoded, &mut out)?;
    Ok(out)
}

/// Interpret a decoded block as text, stopping at the first NUL.
pub fn opaque_str(block: &[u8]) -> String {
    let end = block.iter().position(|&b| b == 0).unwrap_or(block.len());
    String::from_utf8_lossy(&block[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_standard_alphabet() {
        assert_eq!(encode_opaque(b"MCP9808:0"), "TUNQOTgwODow");
        assert_eq!(encode_opaque(&[0xFF, 0xFE]), "//4=");
        assert_eq!(encode_opaque(b""), "");
    }

    #[test]
    fn decoded_length_accounts_for_padding() {
        assert_eq!(decoded_len(b"TUNQOTgwODow"), 9);
        assert_eq!(decoded_len(b"//4="), 2);
        assert_eq!(decoded_len(b"QQ=="), 1);
        assert_eq!(decoded_len(b""), 0);
    }

    #[test]
    fn decode_tolerates_trailing_nul() {
        let encoded = encode_opaque(b"Hello\0");
        let decoded = decode_opaque(encoded.as_bytes(), 128).unwrap();
        assert_eq!(decoded, b"Hello\0");
        assert_eq!(opaque_str(&decoded), "Hello");
        assert!(decoded.capacity() > decoded.len());
    }

    #[test]
    fn decode_rejects_oversized_block() {
        let encoded = encode_opaque(&[0u8; 200]);
        let err = decode_opaque(encoded.as_bytes(), 128).unwrap_err();
        assert!(matches!(
            err,
            CodecError::MessageTooLarge { size: 200, max: 128 }
        ));
    }

    #[test]
    fn decode_accepts_block_at_limit() {
        let encoded = encode_opaque(&[7u8; 128]);
        assert_eq!(decode_opaque(encoded.as_bytes(), 128).unwrap().len(), 128);
    }

    #[test]
    fn decode_rejects_invalid_alphabet() {
        let err = decode_opaque(b"ab!d", 128).unwrap_err();
        assert!(matches!(err, CodecError::InvalidOpaque(_)));
    }
}
