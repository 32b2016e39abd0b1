//! Signed integer encoding (Spec 7.1.5, unbounded case).
//!
//! One sign bit (1 = negative) followed by the magnitude as an unsigned
//! integer. Negative values store `|n| - 1`, which removes the minus-zero
//! ambiguity of a plain sign-magnitude form.

use crate::bitstream::{BitReader, BitWriter};
use crate::unsigned_integer::{self, UnsignedBig, UnsignedValue};
use crate::{Error, Result};

/// Encodes a signed integer (Spec 7.1.5).
pub fn encode(writer: &mut BitWriter, value: i64) {
    if value >= 0 {
        writer.write_bit(false);
        unsigned_integer::encode(writer, value as u64);
    } else {
        writer.write_bit(true);
        // (-value - 1) ueber Bit-Negation, vermeidet Overflow bei i64::MIN
        unsigned_integer::encode(writer, !(value as u64));
    }
}

/// Decodes a signed integer bounded to `i64` (Spec 7.1.5).
pub fn decode(reader: &mut BitReader) -> Result<i64> {
    let negative = reader.read_bit()?;
    let magnitude = unsigned_integer::decode(reader)?;
    if negative {
        if magnitude > i64::MAX as u64 {
            return Err(Error::invalid_value("signed integer below i64::MIN"));
        }
        Ok(-(magnitude as i64) - 1)
    } else {
        if magnitude > i64::MAX as u64 {
            return Err(Error::invalid_value("signed integer above i64::MAX"));
        }
        Ok(magnitude as i64)
    }
}

/// Signed integer whose sign bit widens to a full octet in byte-aligned
/// mode (Spec 7.1.2, 7.1.5).
pub fn encode_mode(writer: &mut BitWriter, value: i64, byte_aligned: bool) {
    if !byte_aligned {
        encode(writer, value);
        return;
    }
    if value >= 0 {
        writer.write_byte(0);
        unsigned_integer::encode(writer, value as u64);
    } else {
        writer.write_byte(1);
        unsigned_integer::encode(writer, !(value as u64));
    }
}

/// Mode-aware counterpart of [`decode`].
pub fn decode_mode(reader: &mut BitReader, byte_aligned: bool) -> Result<i64> {
    if !byte_aligned {
        return decode(reader);
    }
    let negative = reader.read_byte()? != 0;
    let magnitude = unsigned_integer::decode(reader)?;
    if magnitude > i64::MAX as u64 {
        return Err(Error::invalid_value("signed integer exceeds i64 range"));
    }
    Ok(if negative {
        -(magnitude as i64) - 1
    } else {
        magnitude as i64
    })
}

/// Encodes a sign and an arbitrary-precision magnitude (Spec 7.1.5).
///
/// `magnitude` ist der Absolutwert; bei `negative` wird die Spec-Bias
/// (`|n| - 1`) hier angewendet.
pub fn encode_big(writer: &mut BitWriter, negative: bool, magnitude: &UnsignedBig) {
    writer.write_bit(negative);
    if negative {
        let mut biased = magnitude.clone();
        biased.decrement();
        unsigned_integer::encode_big(writer, &biased);
    } else {
        unsigned_integer::encode_big(writer, magnitude);
    }
}

/// Decodes with promotion past 64 bits (Spec 7.1.5, 7.1.6).
///
/// Returns the sign and the unbiased magnitude.
pub fn decode_value(reader: &mut BitReader) -> Result<(bool, UnsignedValue)> {
    let negative = reader.read_bit()?;
    let mut magnitude = unsigned_integer::decode_value(reader)?;
    if negative {
        // Bias zuruecknehmen: gespeichert ist |n| - 1
        magnitude = match magnitude {
            UnsignedValue::Int(v) => match v.checked_add(1) {
                Some(v1) => UnsignedValue::Int(v1),
                None => UnsignedValue::Long(u64::from(v) + 1),
            },
            UnsignedValue::Long(v) => match v.checked_add(1) {
                Some(v1) => UnsignedValue::Long(v1),
                None => {
                    let mut big = UnsignedBig::from_u64(u64::MAX);
                    big.increment();
                    UnsignedValue::Big(big)
                }
            },
            UnsignedValue::Big(mut b) => {
                b.increment();
                UnsignedValue::Big(b)
            }
        };
    }
    Ok((negative, magnitude))
}
