use tracing::warn;

use super::{file_name, require_int, Category, DecodeError, DecodedPayload, Decoder};
use crate::object::ResolvedObject;

pub const ENCODING_UTF8: i64 = 0;
pub const ENCODING_UTF16_LE: i64 = 1;
pub const ENCODING_UTF16_BE: i64 = 2;

/// TextAsset → UTF-8 text file.  UTF-16 input is transcoded; byte-order
/// marks are dropped.
pub struct TextDecoder;

fn to_utf8(bytes: &[u8], encoding: i64) -> Result<String, DecodeError> {
    match encoding {
        ENCODING_UTF8 => {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            match std::str::from_utf8(bytes) {
                Ok(s) => Ok(s.to_owned()),
                Err(e) => {
                    warn!(error = %e, "text asset is not valid UTF-8; replacing invalid sequences");
                    Ok(String::from_utf8_lossy(bytes).into_owned())
                }
            }
        }
        ENCODING_UTF16_LE | ENCODING_UTF16_BE => {
            if bytes.len() % 2 != 0 {
                return Err(DecodeError::InvalidText(format!("odd UTF-16 byte length {}", bytes.len())));
            }
            let units = bytes.chunks_exact(2).map(|p| {
                if encoding == ENCODING_UTF16_LE {
                    u16::from_le_bytes([p[0], p[1]])
                } else {
                    u16::from_be_bytes([p[0], p[1]])
                }
            });
            let text: String = char::decode_utf16(units)
                .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect();
            Ok(text.strip_prefix('\u{FEFF}').map(str::to_owned).unwrap_or(text))
        }
        other => Err(DecodeError::InvalidText(format!("unknown encoding flag {other}"))),
    }
}

impl Decoder for TextDecoder {
    fn name(&self) -> &'static str { "text" }

    fn output_name(&self, object: &ResolvedObject) -> String {
        file_name(object, ".txt")
    }

    fn category(&self) -> Category { Category::Text }

    fn decode(&self, object: &ResolvedObject) -> Result<DecodedPayload, DecodeError> {
        let encoding = require_int(object, "encoding")?;
        let script = object
            .bytes("script")
            .ok_or(DecodeError::MissingField { type_tag: object.type_tag, field: "script" })?;
        let text = to_utf8(script, encoding)?;
        Ok(DecodedPayload {
            output_name: self.output_name(object),
            mime_hint:   "text/plain; charset=utf-8",
            category:    self.category(),
            bytes:       text.into_bytes(),
            width:       None,
            height:      None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_variants_normalize_to_utf8() {
        let le: Vec<u8> = "\u{FEFF}héllo".encode_utf16().flat_map(u16::to_le_bytes).collect();
        let be: Vec<u8> = "héllo".encode_utf16().flat_map(u16::to_be_bytes).collect();
        assert_eq!(to_utf8(&le, ENCODING_UTF16_LE).unwrap(), "héllo");
        assert_eq!(to_utf8(&be, ENCODING_UTF16_BE).unwrap(), "héllo");
    }

    #[test]
    fn utf8_bom_is_stripped() {
        assert_eq!(to_utf8(b"\xEF\xBB\xBFdata", ENCODING_UTF8).unwrap(), "data");
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        assert_eq!(to_utf8(b"a\xFFb", ENCODING_UTF8).unwrap(), "a\u{FFFD}b");
    }

    #[test]
    fn odd_utf16_and_unknown_flags_fail() {
        assert!(to_utf8(&[0x41], ENCODING_UTF16_LE).is_err());
        assert!(to_utf8(b"x", 7).is_err());
    }
}
