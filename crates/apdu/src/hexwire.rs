//! ASCII-hex wire codec
//!
//! Converts between binary APDU material and the two-ASCII-characters-per-byte
//! upper-hex format the secure element expects on the wire, and parses the
//! trailing status word out of hex responses. The codec holds no state.

use bytes::{BufMut, Bytes, BytesMut};

use crate::status::StatusWord;

/// Errors produced by the wire codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Nibble value outside `0..=15`
    #[error("nibble value {0:#04x} out of range")]
    NibbleRange(u8),
    /// Hex input has an odd number of characters
    #[error("hex input of odd length {0}")]
    OddLength(usize),
    /// Non-hex character in the input
    #[error("invalid hex digit {0:#04x}")]
    InvalidDigit(u8),
    /// Input shorter than a trailing status word (four characters)
    #[error("input too short for a status word: {0} bytes")]
    MissingStatus(usize),
}

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Number of ASCII characters a trailing status word occupies
pub const STATUS_WIRE_LEN: usize = 4;

/// Convert a single nibble to its ASCII hex character.
///
/// Values above 15 are rejected rather than masked; the wire contract never
/// produces them, but the conversion refuses to emit garbage if one appears.
pub const fn nibble_to_ascii(nibble: u8) -> Result<u8, CodecError> {
    if nibble > 0x0F {
        return Err(CodecError::NibbleRange(nibble));
    }
    Ok(HEX_DIGITS[nibble as usize])
}

/// Convert a byte to its (high, low) ASCII hex character pair
pub const fn byte_to_ascii(byte: u8) -> (u8, u8) {
    (
        HEX_DIGITS[(byte >> 4) as usize],
        HEX_DIGITS[(byte & 0x0F) as usize],
    )
}

/// Hex-encode `bytes` into `out`, two upper-case characters per byte
pub fn encode_into(bytes: &[u8], out: &mut BytesMut) {
    out.reserve(bytes.len() * 2);
    for &byte in bytes {
        let (hi, lo) = byte_to_ascii(byte);
        out.put_u8(hi);
        out.put_u8(lo);
    }
}

/// Hex-encode `bytes` into a fresh buffer
pub fn encode(bytes: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(bytes.len() * 2);
    encode_into(bytes, &mut out);
    out.freeze()
}

/// Decode `hex.len() / 2` bytes from ASCII hex.
///
/// Both character cases are accepted on the inbound path; the element is
/// documented as emitting valid hex, so anything else is a framing fault.
pub fn decode(hex: &[u8]) -> Result<Bytes, CodecError> {
    if hex.len() % 2 != 0 {
        return Err(CodecError::OddLength(hex.len()));
    }
    match hex::decode(hex) {
        Ok(decoded) => Ok(Bytes::from(decoded)),
        Err(hex::FromHexError::InvalidHexCharacter { c, .. }) => {
            Err(CodecError::InvalidDigit(c as u8))
        }
        Err(_) => Err(CodecError::OddLength(hex.len())),
    }
}

/// Decode the status word from the last four ASCII characters of a response
pub fn status_word(response: &[u8]) -> Result<StatusWord, CodecError> {
    if response.len() < STATUS_WIRE_LEN {
        return Err(CodecError::MissingStatus(response.len()));
    }
    let tail = &response[response.len() - STATUS_WIRE_LEN..];
    let decoded = decode(tail)?;
    Ok(StatusWord::new(decoded[0], decoded[1]))
}

/// True iff the response ends in the four ASCII characters decoding to `9000`
pub fn is_status_ok(response: &[u8]) -> bool {
    status_word(response).is_ok_and(|sw| sw.is_success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_byte_values() {
        for byte in 0..=u8::MAX {
            let encoded = encode(&[byte]);
            let decoded = decode(&encoded).unwrap();
            assert_eq!(decoded.as_ref(), &[byte]);
        }
    }

    #[test]
    fn test_nibble_conversion() {
        assert_eq!(nibble_to_ascii(0x0).unwrap(), b'0');
        assert_eq!(nibble_to_ascii(0x9).unwrap(), b'9');
        assert_eq!(nibble_to_ascii(0xA).unwrap(), b'A');
        assert_eq!(nibble_to_ascii(0xF).unwrap(), b'F');
        assert_eq!(nibble_to_ascii(0x10), Err(CodecError::NibbleRange(0x10)));
    }

    #[test]
    fn test_encode_upper_case() {
        assert_eq!(encode(&[0xDE, 0xAD, 0x01]).as_ref(), b"DEAD01");
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert_eq!(decode(b"ABC"), Err(CodecError::OddLength(3)));
        assert!(matches!(decode(b"ZZ"), Err(CodecError::InvalidDigit(_))));
        // Lower case is accepted inbound
        assert_eq!(decode(b"de").unwrap().as_ref(), &[0xDE]);
    }

    #[test]
    fn test_status_word_detection() {
        assert!(is_status_ok(b"9000"));
        assert!(is_status_ok(b"AABBCC9000"));
        assert!(!is_status_ok(b"6A82"));
        assert!(!is_status_ok(b"AABBCC6985"));
        assert!(!is_status_ok(b"90"));
        assert!(!is_status_ok(b""));
    }

    #[test]
    fn test_status_word_parse() {
        let sw = status_word(b"0102036A82").unwrap();
        assert_eq!(sw, StatusWord::new(0x6A, 0x82));
        assert_eq!(
            status_word(b"90"),
            Err(CodecError::MissingStatus(2))
        );
    }
}
