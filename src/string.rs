//! String encoding as UCS code points (Spec 7.1.10).
//!
//! The length in code points comes first as an Unsigned Integer, then one
//! Unsigned Integer per code point. String-table misses and local-name
//! literals shift the length by 2 respectively 1, which the `offset`
//! variants provide. Surrogate halves never appear on the wire: Rust
//! strings carry scalar values only, and the decoder rejects surrogate
//! code points in incoming streams.

use crate::bitstream::{BitReader, BitWriter};
use crate::{Error, Result, unsigned_integer};

/// Decode-side allocation clamp for length prefixes (DoS-Schutz).
const MAX_PREALLOC: usize = 16 * 1024 * 1024;

/// Encodes a string with its plain code-point length (Spec 7.1.10).
pub fn encode(writer: &mut BitWriter, value: &str) {
    encode_with_offset(writer, value, 0);
}

/// Encodes a string with `length + offset` as prefix (Spec 7.3.1, 7.3.3).
pub fn encode_with_offset(writer: &mut BitWriter, value: &str, offset: u64) {
    if value.is_ascii() {
        // ASCII: Bytezahl == Codepoint-Zahl, und jedes Oktett ist bereits
        // der Single-Byte-Varint des Codepoints
        unsigned_integer::encode(writer, value.len() as u64 + offset);
        writer.write_bytes(value.as_bytes());
    } else {
        let count = value.chars().count() as u64;
        unsigned_integer::encode(writer, count + offset);
        for ch in value.chars() {
            unsigned_integer::encode(writer, u64::from(u32::from(ch)));
        }
    }
}

/// Decodes a string after the length prefix has been consumed
/// (Spec 7.1.10).
pub fn decode_chars(reader: &mut BitReader, len: u64) -> Result<String> {
    let len_usize =
        usize::try_from(len).map_err(|_| Error::invalid_value("string length"))?;
    if len_usize > reader.remaining_bits() / 8 {
        // Jeder Codepoint braucht mindestens ein Oktett
        return Err(Error::UnexpectedEndOfStream);
    }
    let mut s = String::with_capacity(len_usize.min(MAX_PREALLOC));
    for _ in 0..len_usize {
        let cp = unsigned_integer::decode(reader)?;
        let ch = u32::try_from(cp)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| Error::invalid_value(format!("code point U+{cp:X}")))?;
        s.push(ch);
    }
    Ok(s)
}

/// Decodes a string including its plain length prefix (Spec 7.1.10).
pub fn decode(reader: &mut BitReader) -> Result<String> {
    let len = unsigned_integer::decode(reader)?;
    decode_chars(reader, len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: &str) -> String {
        let mut w = BitWriter::new();
        encode(&mut w, value);
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        decode(&mut r).unwrap()
    }

    #[test]
    fn empty_string() {
        assert_eq!(round_trip(""), "");
        let mut w = BitWriter::new();
        encode(&mut w, "");
        assert_eq!(w.into_vec(), vec![0x00]);
    }

    /// "hi" as plain string: length 2, 'h' = 104, 'i' = 105.
    #[test]
    fn ascii_layout() {
        let mut w = BitWriter::new();
        encode(&mut w, "hi");
        assert_eq!(w.into_vec(), vec![0x02, 0x68, 0x69]);
    }

    /// The offset variant shifts only the prefix, not the content.
    #[test]
    fn offset_layout() {
        let mut w = BitWriter::new();
        encode_with_offset(&mut w, "hi", 2);
        assert_eq!(w.into_vec(), vec![0x04, 0x68, 0x69]);
    }

    #[test]
    fn length_counts_code_points_not_bytes() {
        let mut w = BitWriter::new();
        encode(&mut w, "aé");
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        assert_eq!(unsigned_integer::decode(&mut r).unwrap(), 2);
    }

    #[test]
    fn non_ascii_round_trips() {
        for s in ["é", "漢字", "😀", "Hello, 世界! 🌍"] {
            assert_eq!(round_trip(s), s);
        }
    }

    /// Supplementary-plane characters travel as one code point.
    #[test]
    fn supplementary_is_single_code_point() {
        let mut w = BitWriter::new();
        encode(&mut w, "😀");
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        assert_eq!(unsigned_integer::decode(&mut r).unwrap(), 1);
        assert_eq!(unsigned_integer::decode(&mut r).unwrap(), 0x1F600);
    }

    #[test]
    fn boundary_code_points() {
        let s: String = ['\0', '\u{FFFF}', '\u{10000}', '\u{10FFFF}'].iter().collect();
        assert_eq!(round_trip(&s), s);
    }

    /// ASCII bulk path and per-code-point path must agree byte for byte.
    #[test]
    fn ascii_fast_path_byte_identical() {
        let value = "Hello, World!";
        let mut slow = BitWriter::new();
        unsigned_integer::encode(&mut slow, value.len() as u64);
        for ch in value.chars() {
            unsigned_integer::encode(&mut slow, u64::from(u32::from(ch)));
        }
        let mut fast = BitWriter::new();
        encode(&mut fast, value);
        assert_eq!(fast.into_vec(), slow.into_vec());
    }

    #[test]
    fn surrogate_code_points_rejected() {
        for cp in [0xD800u64, 0xDFFF] {
            let mut w = BitWriter::new();
            unsigned_integer::encode(&mut w, 1);
            unsigned_integer::encode(&mut w, cp);
            let data = w.into_vec();
            let mut r = BitReader::new(&data);
            assert!(
                matches!(decode(&mut r).unwrap_err(), Error::InvalidValue(_)),
                "U+{cp:X} must be rejected"
            );
        }
    }

    #[test]
    fn code_point_beyond_unicode_rejected() {
        let mut w = BitWriter::new();
        unsigned_integer::encode(&mut w, 1);
        unsigned_integer::encode(&mut w, 0x110000);
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        assert!(matches!(decode(&mut r).unwrap_err(), Error::InvalidValue(_)));
    }

    #[test]
    fn decode_eof_cases() {
        let mut r = BitReader::new(&[]);
        assert_eq!(decode(&mut r).unwrap_err(), Error::UnexpectedEndOfStream);

        let mut w = BitWriter::new();
        unsigned_integer::encode(&mut w, 3);
        unsigned_integer::encode(&mut w, u64::from(u32::from('A')));
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        assert_eq!(decode(&mut r).unwrap_err(), Error::UnexpectedEndOfStream);
    }

    /// A huge length prefix fails before any allocation happens.
    #[test]
    fn oversized_length_fails_fast() {
        let mut w = BitWriter::new();
        unsigned_integer::encode(&mut w, u64::MAX);
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        assert_eq!(decode(&mut r).unwrap_err(), Error::UnexpectedEndOfStream);
    }

    #[test]
    fn sequential_strings() {
        let mut w = BitWriter::new();
        encode(&mut w, "abc");
        encode(&mut w, "");
        encode(&mut w, "日本");
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        assert_eq!(decode(&mut r).unwrap(), "abc");
        assert_eq!(decode(&mut r).unwrap(), "");
        assert_eq!(decode(&mut r).unwrap(), "日本");
    }
}
