//! Float encoding (Spec 7.1.4).
//!
//! Two consecutive Integers: the mantissa and the base-10 exponent. The
//! exponent value -(2^14) marks the specials: mantissa 1 is INF, mantissa
//! -1 is -INF, everything else NaN. Normal exponents are limited to
//! -(2^14-1) ..= 2^14-1; mantissas span the full i64 range.

use crate::bitstream::{BitReader, BitWriter};
use crate::{Error, Result, integer};

const EXPONENT_MIN: i64 = -(1 << 14) + 1;
const EXPONENT_MAX: i64 = (1 << 14) - 1;
const SPECIAL_EXPONENT: i64 = -(1 << 14);

/// A decoded EXI float (Spec 7.1.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatValue {
    /// A finite value `mantissa × 10^exponent`.
    Value { mantissa: i64, exponent: i64 },
    /// Positive infinity.
    Infinity,
    /// Negative infinity.
    NegativeInfinity,
    /// Not-a-number.
    NaN,
}

/// Encodes a float value (Spec 7.1.4).
///
/// Returns [`Error::InvalidValue`] for exponents outside the accepted range.
pub fn encode(writer: &mut BitWriter, value: FloatValue, byte_aligned: bool) -> Result<()> {
    let (mantissa, exponent) = match value {
        FloatValue::Value { mantissa, exponent } => {
            if !(EXPONENT_MIN..=EXPONENT_MAX).contains(&exponent) {
                return Err(Error::invalid_value("float exponent out of range"));
            }
            (mantissa, exponent)
        }
        FloatValue::Infinity => (1, SPECIAL_EXPONENT),
        FloatValue::NegativeInfinity => (-1, SPECIAL_EXPONENT),
        FloatValue::NaN => (0, SPECIAL_EXPONENT),
    };
    integer::encode_mode(writer, mantissa, byte_aligned);
    integer::encode_mode(writer, exponent, byte_aligned);
    Ok(())
}

/// Decodes a float value (Spec 7.1.4).
pub fn decode(reader: &mut BitReader, byte_aligned: bool) -> Result<FloatValue> {
    let mantissa = integer::decode_mode(reader, byte_aligned)?;
    let exponent = integer::decode_mode(reader, byte_aligned)?;

    if exponent == SPECIAL_EXPONENT {
        return Ok(match mantissa {
            1 => FloatValue::Infinity,
            -1 => FloatValue::NegativeInfinity,
            _ => FloatValue::NaN,
        });
    }
    if !(EXPONENT_MIN..=EXPONENT_MAX).contains(&exponent) {
        return Err(Error::invalid_value("float exponent out of range"));
    }
    Ok(FloatValue::Value { mantissa, exponent })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: FloatValue) -> FloatValue {
        let mut w = BitWriter::new();
        encode(&mut w, value, false).unwrap();
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        decode(&mut r, false).unwrap()
    }

    /// 1.5 as 15 × 10^-1.
    #[test]
    fn basic_value() {
        let f = FloatValue::Value { mantissa: 15, exponent: -1 };
        assert_eq!(round_trip(f), f);
    }

    #[test]
    fn zero() {
        let f = FloatValue::Value { mantissa: 0, exponent: 0 };
        assert_eq!(round_trip(f), f);
    }

    #[test]
    fn mantissa_boundaries() {
        for m in [i64::MIN, i64::MAX] {
            let f = FloatValue::Value { mantissa: m, exponent: 0 };
            assert_eq!(round_trip(f), f);
        }
    }

    #[test]
    fn exponent_boundaries() {
        for e in [EXPONENT_MIN, EXPONENT_MAX] {
            let f = FloatValue::Value { mantissa: 1, exponent: e };
            assert_eq!(round_trip(f), f);
        }
    }

    #[test]
    fn specials() {
        assert_eq!(round_trip(FloatValue::Infinity), FloatValue::Infinity);
        assert_eq!(
            round_trip(FloatValue::NegativeInfinity),
            FloatValue::NegativeInfinity
        );
        assert_eq!(round_trip(FloatValue::NaN), FloatValue::NaN);
    }

    /// Any mantissa besides 1/-1 with the special exponent is NaN.
    #[test]
    fn special_exponent_fallback_is_nan() {
        for &m in &[0i64, 2, -2, i64::MAX, i64::MIN] {
            let mut w = BitWriter::new();
            integer::encode(&mut w, m);
            integer::encode(&mut w, SPECIAL_EXPONENT);
            let data = w.into_vec();
            let mut r = BitReader::new(&data);
            assert_eq!(decode(&mut r, false).unwrap(), FloatValue::NaN, "mantissa={m}");
        }
    }

    #[test]
    fn encode_rejects_out_of_range_exponent() {
        let mut w = BitWriter::new();
        let bad = FloatValue::Value { mantissa: 0, exponent: EXPONENT_MAX + 1 };
        assert!(matches!(
            encode(&mut w, bad, false).unwrap_err(),
            Error::InvalidValue(_)
        ));
        let bad = FloatValue::Value { mantissa: 0, exponent: SPECIAL_EXPONENT };
        assert!(matches!(
            encode(&mut w, bad, false).unwrap_err(),
            Error::InvalidValue(_)
        ));
    }

    #[test]
    fn decode_rejects_out_of_range_exponent() {
        let mut w = BitWriter::new();
        integer::encode(&mut w, 0);
        integer::encode(&mut w, EXPONENT_MAX + 1);
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        assert!(matches!(
            decode(&mut r, false).unwrap_err(),
            Error::InvalidValue(_)
        ));
    }

    #[test]
    fn decode_eof() {
        let mut r = BitReader::new(&[]);
        assert_eq!(
            decode(&mut r, false).unwrap_err(),
            Error::UnexpectedEndOfStream
        );
    }

    #[test]
    fn byte_aligned_round_trip() {
        let f = FloatValue::Value { mantissa: -42, exponent: 3 };
        let mut w = BitWriter::new();
        encode(&mut w, f, true).unwrap();
        let data = w.into_vec();
        // Sign-Oktett 1, varint 41, Sign-Oktett 0, varint 3
        assert_eq!(data, vec![0x01, 41, 0x00, 0x03]);
        let mut r = BitReader::new(&data);
        assert_eq!(decode(&mut r, true).unwrap(), f);
    }

    #[test]
    fn sequential_floats() {
        let values = [
            FloatValue::Value { mantissa: 1, exponent: 0 },
            FloatValue::Infinity,
            FloatValue::NaN,
            FloatValue::Value { mantissa: -99, exponent: -5 },
        ];
        let mut w = BitWriter::new();
        for &v in &values {
            encode(&mut w, v, false).unwrap();
        }
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        for &v in &values {
            assert_eq!(decode(&mut r, false).unwrap(), v);
        }
    }
}
