//! Typed values and their wire representations (Spec 7.1, 7.4).
//!
//! Attribute and character content is a closed union of typed values. The
//! schema-less coder only ever produces and consumes [`Value::String`];
//! schema-informed productions carry a [`Datatype`] that selects one of the
//! channel codecs, possibly overridden by a datatype representation map
//! entry from the header (Spec 7.4).

use std::fmt;
use std::rc::Rc;

use crate::bitstream::{BitReader, BitWriter};
use crate::datetime::{self, DateTimeKind, DateTimeValue};
use crate::decimal::{self, DecimalValue};
use crate::float::{self, FloatValue};
use crate::qname::QName;
use crate::unsigned_integer::{UnsignedBig, UnsignedValue};
use crate::{Error, Result, binary, bit_width, boolean, integer, n_bit_unsigned_integer};

/// The EXI namespace, also the namespace of datatype representations.
pub const EXI_NS: &str = "http://www.w3.org/2009/exi";
/// The XML Schema namespace.
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";

/// Signed integer with the promotion ladder of Spec 7.1.5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegerValue {
    /// Fits 32 bits.
    Int(i32),
    /// Fits 64 bits.
    Long(i64),
    /// Beyond 64 bits: sign and magnitude.
    Big {
        negative: bool,
        magnitude: UnsignedBig,
    },
}

impl IntegerValue {
    /// Builds the smallest tier that holds `v`.
    pub fn from_i64(v: i64) -> Self {
        match i32::try_from(v) {
            Ok(small) => Self::Int(small),
            Err(_) => Self::Long(v),
        }
    }

    /// Returns the value as `i64` when it fits.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(i64::from(*v)),
            Self::Long(v) => Some(*v),
            Self::Big { negative, magnitude } => {
                let m = magnitude.to_u64()?;
                if *negative {
                    // |n| <= 2^63 bleibt darstellbar
                    if m > i64::MAX as u64 + 1 {
                        None
                    } else {
                        Some((m as i64).wrapping_neg())
                    }
                } else {
                    i64::try_from(m).ok()
                }
            }
        }
    }
}

impl fmt::Display for IntegerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Big { negative, magnitude } => {
                if *negative {
                    write!(f, "-{magnitude}")
                } else {
                    write!(f, "{magnitude}")
                }
            }
        }
    }
}

/// A typed attribute or character value (Spec 7.1).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(Rc<str>),
    Boolean(bool),
    Integer(IntegerValue),
    Decimal(DecimalValue),
    Float(FloatValue),
    DateTime(DateTimeValue),
    Binary(Vec<u8>),
    QName(QName),
}

impl Value {
    /// Convenience constructor for string content.
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Self::String(s.into())
    }

    /// The string slice when this is string content.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

/// Wire representation applied to a production's content (Spec 7.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datatype {
    /// String-table coded string content; the schema-less default.
    String,
    Boolean,
    Integer,
    UnsignedInteger,
    Decimal,
    Float,
    DateTime(DateTimeKind),
    Binary,
    /// Bounded integer in `⌈log₂(hi - lo + 1)⌉` bits (Spec 7.1.9).
    NBitInteger(i64, i64),
}

impl Datatype {
    /// Resolves a datatype representation qname from the header map
    /// (Spec 7.4). `None` for representations this core does not provide.
    pub fn from_representation(qname: &QName) -> Option<Self> {
        if &*qname.uri != EXI_NS {
            return None;
        }
        match &*qname.local_name {
            "string" => Some(Self::String),
            "boolean" => Some(Self::Boolean),
            "integer" => Some(Self::Integer),
            "nonNegativeInteger" => Some(Self::UnsignedInteger),
            "decimal" => Some(Self::Decimal),
            "double" => Some(Self::Float),
            "dateTime" => Some(Self::DateTime(DateTimeKind::DateTime)),
            "base64Binary" | "hexBinary" => Some(Self::Binary),
            _ => None,
        }
    }
}

/// Encodes a typed value through the matching channel codec.
///
/// String content is handled by the string table, not here; passing
/// [`Datatype::String`] is an invariant violation.
pub fn encode_typed(
    writer: &mut BitWriter,
    value: &Value,
    datatype: Datatype,
    byte_aligned: bool,
) -> Result<()> {
    match (datatype, value) {
        (Datatype::Boolean, Value::Boolean(b)) => {
            boolean::encode_mode(writer, *b, byte_aligned);
            Ok(())
        }
        (Datatype::Integer, Value::Integer(iv)) => {
            match iv {
                IntegerValue::Int(v) => integer::encode_mode(writer, i64::from(*v), byte_aligned),
                IntegerValue::Long(v) => integer::encode_mode(writer, *v, byte_aligned),
                IntegerValue::Big { negative, magnitude } => {
                    // Sign-Oktett in byte-aligned Streams
                    if byte_aligned {
                        writer.write_byte(u8::from(*negative));
                        let mut biased = magnitude.clone();
                        if *negative {
                            biased.decrement();
                        }
                        crate::unsigned_integer::encode_big(writer, &biased);
                    } else {
                        integer::encode_big(writer, *negative, magnitude);
                    }
                }
            }
            Ok(())
        }
        (Datatype::UnsignedInteger, Value::Integer(iv)) => match iv {
            IntegerValue::Int(v) if *v >= 0 => {
                crate::unsigned_integer::encode(writer, *v as u64);
                Ok(())
            }
            IntegerValue::Long(v) if *v >= 0 => {
                crate::unsigned_integer::encode(writer, *v as u64);
                Ok(())
            }
            IntegerValue::Big { negative: false, magnitude } => {
                crate::unsigned_integer::encode_big(writer, magnitude);
                Ok(())
            }
            _ => Err(Error::invalid_value("negative value for unsigned datatype")),
        },
        (Datatype::Decimal, Value::Decimal(d)) => {
            decimal::encode(writer, d, byte_aligned);
            Ok(())
        }
        (Datatype::Float, Value::Float(fv)) => float::encode(writer, *fv, byte_aligned),
        (Datatype::DateTime(kind), Value::DateTime(dt)) => {
            if dt.kind != kind {
                return Err(Error::invalid_value("date-time kind mismatch"));
            }
            datetime::encode(writer, dt, byte_aligned)
        }
        (Datatype::Binary, Value::Binary(b)) => {
            binary::encode(writer, b);
            Ok(())
        }
        (Datatype::NBitInteger(lo, hi), Value::Integer(iv)) => {
            let v = iv
                .to_i64()
                .filter(|v| (lo..=hi).contains(v))
                .ok_or_else(|| Error::invalid_value("value outside n-bit integer bounds"))?;
            let n = bit_width::for_count((hi - lo + 1) as usize);
            n_bit_unsigned_integer::encode_mode(writer, (v - lo) as u64, n, byte_aligned);
            Ok(())
        }
        (Datatype::String, _) => Err(Error::invariant(
            "string content must go through the string table",
        )),
        _ => Err(Error::invalid_value("value does not match datatype")),
    }
}

/// Decodes a typed value through the matching channel codec.
pub fn decode_typed(
    reader: &mut BitReader,
    datatype: Datatype,
    byte_aligned: bool,
) -> Result<Value> {
    match datatype {
        Datatype::Boolean => Ok(Value::Boolean(boolean::decode_mode(reader, byte_aligned)?)),
        Datatype::Integer => {
            let (negative, magnitude) = if byte_aligned {
                let neg = reader.read_byte()? != 0;
                let mut m = crate::unsigned_integer::decode_value(reader)?;
                if neg {
                    m = unbias(m);
                }
                (neg, m)
            } else {
                integer::decode_value(reader)?
            };
            Ok(Value::Integer(match magnitude {
                UnsignedValue::Int(v) => {
                    let signed = if negative {
                        -i64::from(v)
                    } else {
                        i64::from(v)
                    };
                    IntegerValue::from_i64(signed)
                }
                UnsignedValue::Long(v) => {
                    if !negative && v <= i64::MAX as u64 {
                        IntegerValue::from_i64(v as i64)
                    } else if negative && v <= i64::MAX as u64 {
                        IntegerValue::from_i64(-(v as i64))
                    } else if negative && v == i64::MAX as u64 + 1 {
                        IntegerValue::Long(i64::MIN)
                    } else {
                        IntegerValue::Big {
                            negative,
                            magnitude: UnsignedBig::from_u64(v),
                        }
                    }
                }
                UnsignedValue::Big(b) => IntegerValue::Big {
                    negative,
                    magnitude: b,
                },
            }))
        }
        Datatype::UnsignedInteger => {
            let v = crate::unsigned_integer::decode_value(reader)?;
            Ok(Value::Integer(match v {
                UnsignedValue::Int(v) => match i32::try_from(v) {
                    Ok(small) => IntegerValue::Int(small),
                    Err(_) => IntegerValue::Long(i64::from(v)),
                },
                UnsignedValue::Long(v) => match i64::try_from(v) {
                    Ok(signed) => IntegerValue::Long(signed),
                    Err(_) => IntegerValue::Big {
                        negative: false,
                        magnitude: UnsignedBig::from_u64(v),
                    },
                },
                UnsignedValue::Big(b) => IntegerValue::Big {
                    negative: false,
                    magnitude: b,
                },
            }))
        }
        Datatype::Decimal => Ok(Value::Decimal(decimal::decode(reader, byte_aligned)?)),
        Datatype::Float => Ok(Value::Float(float::decode(reader, byte_aligned)?)),
        Datatype::DateTime(kind) => Ok(Value::DateTime(datetime::decode(
            reader,
            kind,
            byte_aligned,
        )?)),
        Datatype::Binary => Ok(Value::Binary(binary::decode(reader)?)),
        Datatype::NBitInteger(lo, hi) => {
            let n = bit_width::for_count((hi - lo + 1) as usize);
            let offset = n_bit_unsigned_integer::decode_mode(reader, n, byte_aligned)?;
            let v = lo
                .checked_add(offset as i64)
                .filter(|v| *v <= hi)
                .ok_or_else(|| Error::invalid_value("n-bit integer outside bounds"))?;
            Ok(Value::Integer(IntegerValue::from_i64(v)))
        }
        Datatype::String => Err(Error::invariant(
            "string content must go through the string table",
        )),
    }
}

/// Removes the `|n| - 1` bias from a decoded negative magnitude.
fn unbias(v: UnsignedValue) -> UnsignedValue {
    match v {
        UnsignedValue::Int(x) => match x.checked_add(1) {
            Some(x1) => UnsignedValue::Int(x1),
            None => UnsignedValue::Long(u64::from(x) + 1),
        },
        UnsignedValue::Long(x) => match x.checked_add(1) {
            Some(x1) => UnsignedValue::Long(x1),
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
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: &Value, datatype: Datatype) -> Value {
        let mut w = BitWriter::new();
        encode_typed(&mut w, value, datatype, false).unwrap();
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        decode_typed(&mut r, datatype, false).unwrap()
    }

    #[test]
    fn boolean_round_trip() {
        let v = Value::Boolean(true);
        assert_eq!(round_trip(&v, Datatype::Boolean), v);
    }

    #[test]
    fn integer_tiers_round_trip() {
        for v in [0i64, 42, -42, i64::from(i32::MAX) + 1, i64::MIN] {
            let val = Value::Integer(IntegerValue::from_i64(v));
            assert_eq!(round_trip(&val, Datatype::Integer), val, "v={v}");
        }
    }

    #[test]
    fn big_integer_round_trip() {
        let val = Value::Integer(IntegerValue::Big {
            negative: true,
            magnitude: UnsignedBig::from_decimal_str("340282366920938463463374607431768211455")
                .unwrap(),
        });
        assert_eq!(round_trip(&val, Datatype::Integer), val);
    }

    #[test]
    fn unsigned_rejects_negative() {
        let mut w = BitWriter::new();
        let val = Value::Integer(IntegerValue::from_i64(-1));
        assert!(matches!(
            encode_typed(&mut w, &val, Datatype::UnsignedInteger, false).unwrap_err(),
            Error::InvalidValue(_)
        ));
    }

    #[test]
    fn decimal_and_float_round_trip() {
        let d = Value::Decimal(DecimalValue::new(true, 12, 43));
        assert_eq!(round_trip(&d, Datatype::Decimal), d);
        let f = Value::Float(FloatValue::Value { mantissa: 15, exponent: -1 });
        assert_eq!(round_trip(&f, Datatype::Float), f);
    }

    #[test]
    fn datetime_kind_must_match() {
        let dt = Value::DateTime(DateTimeValue {
            kind: DateTimeKind::GYear,
            year: 1999,
            month_day: 0,
            time: 0,
            fractional_secs: None,
            timezone_minutes: None,
        });
        assert_eq!(round_trip(&dt, Datatype::DateTime(DateTimeKind::GYear)), dt);

        let mut w = BitWriter::new();
        assert!(matches!(
            encode_typed(&mut w, &dt, Datatype::DateTime(DateTimeKind::Date), false).unwrap_err(),
            Error::InvalidValue(_)
        ));
    }

    #[test]
    fn n_bit_integer_bounds() {
        let val = Value::Integer(IntegerValue::from_i64(3));
        let dt = Datatype::NBitInteger(-5, 5);
        assert_eq!(round_trip(&val, dt), val);

        let mut w = BitWriter::new();
        let out = Value::Integer(IntegerValue::from_i64(6));
        assert!(matches!(
            encode_typed(&mut w, &out, dt, false).unwrap_err(),
            Error::InvalidValue(_)
        ));
    }

    /// A single-valued range occupies zero bits.
    #[test]
    fn n_bit_integer_zero_width() {
        let val = Value::Integer(IntegerValue::from_i64(7));
        let mut w = BitWriter::new();
        encode_typed(&mut w, &val, Datatype::NBitInteger(7, 7), false).unwrap();
        assert_eq!(w.bit_position(), 0);
    }

    #[test]
    fn string_datatype_is_not_a_channel() {
        let mut w = BitWriter::new();
        assert!(matches!(
            encode_typed(&mut w, &Value::string("x"), Datatype::String, false).unwrap_err(),
            Error::InvariantViolation(_)
        ));
    }

    #[test]
    fn representation_map_resolution() {
        let q = QName::new(EXI_NS, "decimal");
        assert_eq!(Datatype::from_representation(&q), Some(Datatype::Decimal));
        let q = QName::new(EXI_NS, "double");
        assert_eq!(Datatype::from_representation(&q), Some(Datatype::Float));
        let q = QName::new(EXI_NS, "no-such-codec");
        assert_eq!(Datatype::from_representation(&q), None);
        let q = QName::new("urn:other", "decimal");
        assert_eq!(Datatype::from_representation(&q), None);
    }

    #[test]
    fn integer_display_forms() {
        assert_eq!(IntegerValue::from_i64(-7).to_string(), "-7");
        let big = IntegerValue::Big {
            negative: true,
            magnitude: UnsignedBig::from_decimal_str("18446744073709551616").unwrap(),
        };
        assert_eq!(big.to_string(), "-18446744073709551616");
    }
}
