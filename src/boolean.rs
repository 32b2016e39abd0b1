//! Boolean encoding (Spec 7.1.2).
//!
//! One bit in bit-packed streams; one full octet (0 or 1) in byte-aligned
//! streams, any non-zero octet decoding as true.

use crate::Result;
use crate::bitstream::{BitReader, BitWriter};

/// Encodes a boolean as a single bit (Spec 7.1.2).
#[inline]
pub fn encode(writer: &mut BitWriter, value: bool) {
    writer.write_bit(value);
}

/// Decodes a boolean from a single bit (Spec 7.1.2).
#[inline]
pub fn decode(reader: &mut BitReader) -> Result<bool> {
    reader.read_bit()
}

/// Encodes a boolean as one octet (Spec 7.1.2, byte-aligned modes).
pub fn encode_byte_aligned(writer: &mut BitWriter, value: bool) {
    writer.write_byte(u8::from(value));
}

/// Decodes a boolean from one octet (Spec 7.1.2, byte-aligned modes).
pub fn decode_byte_aligned(reader: &mut BitReader) -> Result<bool> {
    Ok(reader.read_byte()? != 0)
}

/// Mode dispatch used by the event coder.
#[inline]
pub fn encode_mode(writer: &mut BitWriter, value: bool, byte_aligned: bool) {
    if byte_aligned {
        encode_byte_aligned(writer, value);
    } else {
        encode(writer, value);
    }
}

/// Mode dispatch used by the event coder.
#[inline]
pub fn decode_mode(reader: &mut BitReader, byte_aligned: bool) -> Result<bool> {
    if byte_aligned {
        decode_byte_aligned(reader)
    } else {
        decode(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_bit_layout() {
        let mut w = BitWriter::new();
        encode(&mut w, false);
        assert_eq!(w.bit_position(), 1);
        assert_eq!(w.into_vec(), vec![0x00]);

        let mut w = BitWriter::new();
        encode(&mut w, true);
        assert_eq!(w.into_vec(), vec![0x80]);
    }

    #[test]
    fn bit_round_trip() {
        for v in [true, false] {
            let mut w = BitWriter::new();
            encode(&mut w, v);
            let data = w.into_vec();
            let mut r = BitReader::new(&data);
            assert_eq!(decode(&mut r).unwrap(), v);
        }
    }

    #[test]
    fn byte_aligned_layout() {
        let mut w = BitWriter::new();
        encode_byte_aligned(&mut w, false);
        encode_byte_aligned(&mut w, true);
        assert_eq!(w.into_vec(), vec![0x00, 0x01]);
    }

    #[test]
    fn byte_aligned_nonzero_is_true() {
        let mut r = BitReader::new(&[0xFF]);
        assert!(decode_byte_aligned(&mut r).unwrap());
    }

    #[test]
    fn decode_eof() {
        let mut r = BitReader::new(&[]);
        assert_eq!(decode(&mut r).unwrap_err(), crate::Error::UnexpectedEndOfStream);
        let mut r = BitReader::new(&[]);
        assert_eq!(
            decode_byte_aligned(&mut r).unwrap_err(),
            crate::Error::UnexpectedEndOfStream
        );
    }

    #[test]
    fn mode_dispatch() {
        let mut w = BitWriter::new();
        encode_mode(&mut w, true, false);
        encode_mode(&mut w, true, true);
        let data = w.into_vec();
        // 1 Bit + Alignment-Fallback: das Oktett folgt ab Bit 1
        let mut r = BitReader::new(&data);
        assert!(decode_mode(&mut r, false).unwrap());
        assert!(decode_mode(&mut r, true).unwrap());
    }
}
