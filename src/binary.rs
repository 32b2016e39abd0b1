//! Binary encoding (Spec 7.1.1).
//!
//! A length prefix as an Unsigned Integer followed by the raw octets.

use crate::bitstream::{BitReader, BitWriter};
use crate::{Error, Result, unsigned_integer};

/// Encodes binary content (Spec 7.1.1).
pub fn encode(writer: &mut BitWriter, value: &[u8]) {
    log::trace!("enc binary value length {}", value.len());
    unsigned_integer::encode(writer, value.len() as u64);
    writer.write_bytes(value);
}

/// Decodes binary content (Spec 7.1.1).
pub fn decode(reader: &mut BitReader) -> Result<Vec<u8>> {
    let len = unsigned_integer::decode(reader)?;
    let len = usize::try_from(len).map_err(|_| Error::invalid_value("binary length"))?;
    if len * 8 > reader.remaining_bits() {
        return Err(Error::UnexpectedEndOfStream);
    }
    let mut buf = vec![0u8; len];
    reader.read_bytes(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: &[u8]) -> Vec<u8> {
        let mut w = BitWriter::new();
        encode(&mut w, value);
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        decode(&mut r).unwrap()
    }

    #[test]
    fn empty_binary() {
        assert_eq!(round_trip(&[]), Vec::<u8>::new());
        let mut w = BitWriter::new();
        encode(&mut w, &[]);
        assert_eq!(w.into_vec(), vec![0x00]);
    }

    #[test]
    fn octet_runs() {
        assert_eq!(round_trip(&[0xAB]), vec![0xAB]);
        let data = vec![0xDE, 0xAD, 0xBE, 0xEF];
        assert_eq!(round_trip(&data), data);
        assert_eq!(round_trip(&[0x00; 10]), vec![0x00; 10]);
    }

    #[test]
    fn length_is_octet_count() {
        let mut w = BitWriter::new();
        encode(&mut w, &[1, 2, 3]);
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        assert_eq!(unsigned_integer::decode(&mut r).unwrap(), 3);
    }

    #[test]
    fn misaligned_round_trip() {
        let mut w = BitWriter::new();
        w.write_bits(0b101, 3);
        encode(&mut w, &[0x42, 0x43]);
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        r.read_bits(3).unwrap();
        assert_eq!(decode(&mut r).unwrap(), vec![0x42, 0x43]);
    }

    #[test]
    fn decode_eof_on_length_and_data() {
        let mut r = BitReader::new(&[]);
        assert_eq!(decode(&mut r).unwrap_err(), Error::UnexpectedEndOfStream);

        let mut w = BitWriter::new();
        unsigned_integer::encode(&mut w, 5);
        w.write_byte(0xAA);
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        assert_eq!(decode(&mut r).unwrap_err(), Error::UnexpectedEndOfStream);
    }

    /// An absurd length prefix must fail fast, not allocate.
    #[test]
    fn oversized_length_rejected_before_allocation() {
        let mut w = BitWriter::new();
        unsigned_integer::encode(&mut w, u64::MAX / 2);
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        assert_eq!(decode(&mut r).unwrap_err(), Error::UnexpectedEndOfStream);
    }
}
