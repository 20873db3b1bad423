//! Base64 and UTF-8 boundary helpers.
//!
//! Card payloads travel as `base64(utf8(json))` inside PNG text chunks.  The
//! strict decoders here are what the read pipeline uses; the repair engine
//! layers its own fallbacks on top of them.

use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::{alphabet, Engine};

use crate::error::ParseError;

/// Canonical alphabet with optional padding.  Used on the read path, where
/// writers disagree on `=` padding.
const PADDING_OPTIONAL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Accepts missing or partial padding and non-zero trailing bits.  Only used
/// after the input has already been cleaned and re-padded.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a payload.  ASCII whitespace (line wrapping) is ignored and `=`
/// padding may be present or absent.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, ParseError> {
    let compact: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    Ok(PADDING_OPTIONAL.decode(compact)?)
}

/// Decode after the caller has stripped foreign characters and re-padded.
pub(crate) fn decode_base64_lenient(text: &str) -> Result<Vec<u8>, ParseError> {
    Ok(LENIENT.decode(text)?)
}

pub fn decode_utf8(bytes: Vec<u8>) -> Result<String, ParseError> {
    Ok(String::from_utf8(bytes)?)
}

/// Bytes to chars one-for-one.  tEXt payloads are Latin-1 by definition and
/// non-UTF-8 ZIP names are treated the same way.
pub(crate) fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_roundtrip_lengths() {
        for len in [0usize, 1, 10, 100, 1000, 10000] {
            let data: Vec<u8> = (0..len).map(|i| (i * 31 % 256) as u8).collect();
            assert_eq!(decode_base64(&encode_base64(&data)).unwrap(), data, "len {len}");
        }
    }

    #[test]
    fn test_strict_rejects_garbage() {
        assert!(decode_base64("abc!def").is_err());
        assert!(decode_base64("abcde").is_err());
    }

    #[test]
    fn test_unpadded_and_wrapped() {
        assert_eq!(decode_base64("aGk").unwrap(), b"hi");
        assert_eq!(decode_base64("aGk=").unwrap(), b"hi");
        assert_eq!(decode_base64("aGVs\nbG8g\r\nd29y bGQ=\n").unwrap(), b"hello world");
    }

    #[test]
    fn test_lenient_accepts_unpadded() {
        assert_eq!(decode_base64_lenient("aGk").unwrap(), b"hi");
    }

    #[test]
    fn test_latin1() {
        assert_eq!(latin1_to_string(&[0x41, 0xE9]), "A\u{e9}");
    }
}
