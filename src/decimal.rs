//! Decimal encoding (Spec 7.1.3).
//!
//! A Boolean sign followed by two Unsigned Integers: the integral portion
//! and the fractional portion with its digits in reverse order. Reversing
//! preserves leading zeros after the decimal point across the
//! trailing-zero-trim inherent in integer encoding. Minus zero is
//! representable (sign = 1, both portions 0).

use crate::bitstream::{BitReader, BitWriter};
use crate::unsigned_integer::{self, UnsignedValue};
use crate::{Result, boolean};

/// A decoded EXI decimal (Spec 7.1.3).
///
/// `rev_fractional` traegt die Nachkommastellen in umgekehrter Reihenfolge,
/// "12.340" also als integral 12 und rev_fractional 43 (die Original-Null
/// am Ende geht im Integer-Encoding verloren).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecimalValue {
    /// True for negative values, including minus zero.
    pub negative: bool,
    /// Integral portion.
    pub integral: UnsignedValue,
    /// Fractional portion, digits reversed.
    pub rev_fractional: UnsignedValue,
}

impl DecimalValue {
    /// Convenience constructor from small components.
    pub fn new(negative: bool, integral: u64, rev_fractional: u64) -> Self {
        Self {
            negative,
            integral: UnsignedValue::from(integral),
            rev_fractional: UnsignedValue::from(rev_fractional),
        }
    }
}

/// Encodes a decimal value (Spec 7.1.3).
pub fn encode(writer: &mut BitWriter, value: &DecimalValue, byte_aligned: bool) {
    boolean::encode_mode(writer, value.negative, byte_aligned);
    unsigned_integer::encode_value(writer, &value.integral);
    unsigned_integer::encode_value(writer, &value.rev_fractional);
}

/// Decodes a decimal value (Spec 7.1.3).
pub fn decode(reader: &mut BitReader, byte_aligned: bool) -> Result<DecimalValue> {
    let negative = boolean::decode_mode(reader, byte_aligned)?;
    let integral = unsigned_integer::decode_value(reader)?;
    let rev_fractional = unsigned_integer::decode_value(reader)?;
    Ok(DecimalValue {
        negative,
        integral,
        rev_fractional,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::unsigned_integer::UnsignedBig;

    fn round_trip(value: &DecimalValue) -> DecimalValue {
        let mut w = BitWriter::new();
        encode(&mut w, value, false);
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        decode(&mut r, false).unwrap()
    }

    /// -12.34: sign 1, integral 12, reverse-fractional 43.
    #[test]
    fn negative_twelve_point_three_four() {
        let d = DecimalValue::new(true, 12, 43);
        assert_eq!(round_trip(&d), d);

        let mut w = BitWriter::new();
        encode(&mut w, &d, false);
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        assert!(r.read_bit().unwrap());
        assert_eq!(unsigned_integer::decode(&mut r).unwrap(), 12);
        assert_eq!(unsigned_integer::decode(&mut r).unwrap(), 43);
    }

    #[test]
    fn minus_zero_is_distinct() {
        let neg = DecimalValue::new(true, 0, 0);
        let pos = DecimalValue::new(false, 0, 0);
        assert_eq!(round_trip(&neg), neg);
        assert_ne!(neg, pos);
    }

    /// "0.123" keeps its leading zero through reversal: rev_fractional 321.
    #[test]
    fn fractional_only() {
        let d = DecimalValue::new(false, 0, 321);
        assert_eq!(round_trip(&d), d);
    }

    #[test]
    fn big_components() {
        let d = DecimalValue {
            negative: false,
            integral: UnsignedValue::Big(
                UnsignedBig::from_decimal_str("123456789012345678901234567890").unwrap(),
            ),
            rev_fractional: UnsignedValue::Int(5),
        };
        assert_eq!(round_trip(&d), d);
    }

    #[test]
    fn byte_aligned_sign_is_full_octet() {
        let d = DecimalValue::new(true, 1, 2);
        let mut w = BitWriter::new();
        encode(&mut w, &d, true);
        let data = w.into_vec();
        assert_eq!(data, vec![0x01, 0x01, 0x02]);
        let mut r = BitReader::new(&data);
        assert_eq!(decode(&mut r, true).unwrap(), d);
    }

    #[test]
    fn decode_eof_on_each_component() {
        let mut r = BitReader::new(&[]);
        assert_eq!(decode(&mut r, false).unwrap_err(), Error::UnexpectedEndOfStream);

        let mut w = BitWriter::new();
        boolean::encode(&mut w, false);
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        // Padding-Bits liefern integral 0, dann fehlt rev_fractional...
        // Der 1-Bit-Sign laesst 7 Null-Bits zurueck, die als integral=0
        // gelesen werden; das zweite Unsigned Integer stoesst ans Ende.
        assert_eq!(decode(&mut r, false).unwrap_err(), Error::UnexpectedEndOfStream);
    }

    #[test]
    fn sequential_decimals() {
        let values = [
            DecimalValue::new(false, 1, 2),
            DecimalValue::new(true, 0, 0),
            DecimalValue::new(false, 999, 999),
        ];
        let mut w = BitWriter::new();
        for v in &values {
            encode(&mut w, v, false);
        }
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        for v in &values {
            assert_eq!(&decode(&mut r, false).unwrap(), v);
        }
    }
}
