//! The outer EXI header (Spec 5.1, 5.2, 5.3).
//!
//! Layout: an optional 4-octet `$EXI` cookie, the distinguishing bits
//! `10`, one options-presence bit, one preview bit and the format version
//! as a run of 4-bit chunks (15 continues, 0..14 terminates; the chunks
//! sum to version minus 1). The embedded options document and the
//! alignment padding are handled by the caller, because the body mode is
//! only known once the options are decoded.

use crate::bitstream::{BitReader, BitWriter};
use crate::{Error, Result, n_bit_unsigned_integer};

/// The EXI cookie `$EXI` (Spec 5.1).
pub const EXI_COOKIE: [u8; 4] = [0x24, 0x45, 0x58, 0x49];

const DISTINGUISHING_BITS: u8 = 0b10;

/// Decoded outer-header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExiHeader {
    /// Cookie present.
    pub cookie: bool,
    /// Options document follows.
    pub options_present: bool,
    /// Format version; only final version 1 is accepted.
    pub version: u16,
}

impl Default for ExiHeader {
    fn default() -> Self {
        Self { cookie: false, options_present: false, version: 1 }
    }
}

/// Writes the outer header up to the end of the version field (Spec 5).
pub fn encode(writer: &mut BitWriter, header: &ExiHeader) {
    if header.cookie {
        writer.write_bytes(&EXI_COOKIE);
    }
    writer.write_bits(u64::from(DISTINGUISHING_BITS), 2);
    writer.write_bit(header.options_present);
    // Preview-Bit: diese Implementierung schreibt nur Final-Versionen
    writer.write_bit(false);
    let mut remaining = header.version - 1;
    while remaining >= 15 {
        n_bit_unsigned_integer::encode(writer, 15, 4);
        remaining -= 15;
    }
    n_bit_unsigned_integer::encode(writer, u64::from(remaining), 4);
}

/// Reads the outer header up to the end of the version field (Spec 5).
///
/// The cookie is recognised by one-octet look-ahead: a leading `$`
/// commits to a full cookie and anything else there is an error.
pub fn decode(reader: &mut BitReader) -> Result<ExiHeader> {
    let cookie = match reader.peek_byte() {
        Some(b'$') => {
            let mut buf = [0u8; 4];
            reader.read_bytes(&mut buf)?;
            if buf != EXI_COOKIE {
                return Err(Error::malformed("EXI cookie mismatch"));
            }
            true
        }
        _ => false,
    };

    let dist = reader.read_bits(2)? as u8;
    if dist != DISTINGUISHING_BITS {
        return Err(Error::malformed("distinguishing bits are not 10"));
    }
    let options_present = reader.read_bit()?;

    let preview = reader.read_bit()?;
    let mut version: u16 = 1;
    loop {
        let chunk = n_bit_unsigned_integer::decode(reader, 4)? as u16;
        version = version.saturating_add(chunk);
        if chunk < 15 {
            break;
        }
    }
    if preview || version != 1 {
        return Err(Error::UnsupportedOption(format!(
            "EXI format version {version}{}",
            if preview { " (preview)" } else { "" }
        )));
    }

    Ok(ExiHeader { cookie, options_present, version })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(header: &ExiHeader) -> ExiHeader {
        let mut w = BitWriter::new();
        encode(&mut w, header);
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        decode(&mut r).unwrap()
    }

    /// Default header: `10 0 0 0000` padded, a single `0x80` octet.
    #[test]
    fn default_header_is_one_byte_0x80() {
        let mut w = BitWriter::new();
        encode(&mut w, &ExiHeader::default());
        assert_eq!(w.bit_position(), 8);
        assert_eq!(w.into_vec(), vec![0x80]);
    }

    /// With the options-presence bit set: `10 1 0 0000` = 0xA0.
    #[test]
    fn options_present_header_is_0xa0() {
        let header = ExiHeader { options_present: true, ..ExiHeader::default() };
        let mut w = BitWriter::new();
        encode(&mut w, &header);
        assert_eq!(w.into_vec(), vec![0xA0]);
        assert_eq!(round_trip(&header), header);
    }

    #[test]
    fn cookie_round_trip() {
        let header = ExiHeader { cookie: true, ..ExiHeader::default() };
        let mut w = BitWriter::new();
        encode(&mut w, &header);
        let data = w.into_vec();
        assert_eq!(&data[..4], b"$EXI");
        assert_eq!(data.len(), 5);
        assert_eq!(round_trip(&header), header);
    }

    #[test]
    fn cookie_is_optional_on_decode() {
        assert_eq!(round_trip(&ExiHeader::default()), ExiHeader::default());
    }

    #[test]
    fn corrupt_cookie_rejected() {
        let mut data = b"$EXJ".to_vec();
        data.push(0x80);
        let mut r = BitReader::new(&data);
        assert!(matches!(
            decode(&mut r).unwrap_err(),
            Error::MalformedBitstream(_)
        ));
    }

    #[test]
    fn truncated_cookie_rejected() {
        let data = b"$EX".to_vec();
        let mut r = BitReader::new(&data);
        assert_eq!(decode(&mut r).unwrap_err(), Error::UnexpectedEndOfStream);
    }

    #[test]
    fn wrong_distinguishing_bits_rejected() {
        // 01...: XML-Deklaration statt EXI
        let mut r = BitReader::new(&[0x3C]);
        assert!(matches!(
            decode(&mut r).unwrap_err(),
            Error::MalformedBitstream(_)
        ));
    }

    #[test]
    fn preview_version_rejected() {
        // 10 0 1 0000: Preview-Bit gesetzt
        let mut r = BitReader::new(&[0b1001_0000]);
        assert!(matches!(
            decode(&mut r).unwrap_err(),
            Error::UnsupportedOption(_)
        ));
    }

    #[test]
    fn later_final_version_rejected() {
        // Version 2: Chunk 0001
        let mut r = BitReader::new(&[0b1000_0001]);
        assert!(matches!(
            decode(&mut r).unwrap_err(),
            Error::UnsupportedOption(_)
        ));
    }

    /// Multi-chunk version fields are summed (15 continues).
    #[test]
    fn version_chunks_accumulate() {
        // 10 0 0 1111 0001 -> Version 1 + 15 + 1 = 17, final
        let mut w = BitWriter::new();
        w.write_bits(0b10, 2);
        w.write_bit(false);
        w.write_bit(false);
        w.write_bits(15, 4);
        w.write_bits(1, 4);
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        let err = decode(&mut r).unwrap_err();
        assert!(matches!(err, Error::UnsupportedOption(msg) if msg.contains("17")));
    }

    #[test]
    fn decode_eof() {
        let mut r = BitReader::new(&[]);
        assert_eq!(decode(&mut r).unwrap_err(), Error::UnexpectedEndOfStream);
    }
}
