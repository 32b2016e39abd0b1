//! Date-time encoding (Spec 7.1.8).
//!
//! The eight XML Schema date-time kinds share one component layout: a year
//! as a signed integer offset by 2000, a 9-bit month-day field packing
//! `month * 32 + day`, a 17-bit time field packing
//! `hour * 4096 + minute * 64 + second`, optional fractional seconds
//! (presence bit, then a varint with digits reversed) and an optional
//! timezone (presence bit, then an 11-bit field offset by 896 minutes).
//! Each kind encodes exactly the components it has.

use crate::bitstream::{BitReader, BitWriter};
use crate::{Error, Result, boolean, integer, n_bit_unsigned_integer, unsigned_integer};

/// Offset subtracted from the calendar year before signed encoding.
pub const YEAR_OFFSET: i64 = 2000;
/// Width of the packed month-day component.
pub const MONTHDAY_BITS: u8 = 9;
/// Width of the packed time component.
pub const TIME_BITS: u8 = 17;
/// Width of the timezone component.
pub const TIMEZONE_BITS: u8 = 11;
/// Offset added to timezone minutes: range -896 ..= +955.
pub const TIMEZONE_OFFSET_MINUTES: i32 = 896;

/// The XML Schema date-time kind controlling which components appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateTimeKind {
    GYear,
    GYearMonth,
    Date,
    DateTime,
    Time,
    GMonth,
    GMonthDay,
    GDay,
}

impl DateTimeKind {
    fn has_year(self) -> bool {
        matches!(self, Self::GYear | Self::GYearMonth | Self::Date | Self::DateTime)
    }

    fn has_month_day(self) -> bool {
        matches!(
            self,
            Self::GYearMonth
                | Self::Date
                | Self::DateTime
                | Self::GMonth
                | Self::GMonthDay
                | Self::GDay
        )
    }

    fn has_time(self) -> bool {
        matches!(self, Self::DateTime | Self::Time)
    }
}

/// A decoded EXI date-time value (Spec 7.1.8).
///
/// Month-day und Time bleiben in der gepackten Drahtform; die Getter
/// entpacken bei Bedarf. Komponenten ohne Bedeutung fuer die jeweilige
/// Art sind 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTimeValue {
    pub kind: DateTimeKind,
    /// Calendar year (not offset).
    pub year: i64,
    /// `month * 32 + day`; month or day 0 when absent from the kind.
    pub month_day: u32,
    /// `hour * 4096 + minute * 64 + second`.
    pub time: u32,
    /// Fractional seconds, digits reversed. `None` when absent.
    pub fractional_secs: Option<u64>,
    /// Timezone offset in minutes from UTC. `None` when absent.
    pub timezone_minutes: Option<i32>,
}

impl DateTimeValue {
    /// Packs the month-day component.
    pub fn pack_month_day(month: u32, day: u32) -> u32 {
        month * 32 + day
    }

    /// Packs the time component.
    pub fn pack_time(hour: u32, minute: u32, second: u32) -> u32 {
        hour * 4096 + minute * 64 + second
    }

    /// Month (1..=12), 0 when absent.
    pub fn month(&self) -> u32 {
        self.month_day / 32
    }

    /// Day (1..=31), 0 when absent.
    pub fn day(&self) -> u32 {
        self.month_day % 32
    }

    /// Hour (0..=24).
    pub fn hour(&self) -> u32 {
        self.time / 4096
    }

    /// Minute (0..=59).
    pub fn minute(&self) -> u32 {
        (self.time / 64) % 64
    }

    /// Second (0..=63 on the wire, 60 for leap seconds).
    pub fn second(&self) -> u32 {
        self.time % 64
    }

    fn validate(&self) -> Result<()> {
        if self.month_day >= 1 << MONTHDAY_BITS {
            return Err(Error::invalid_value("month-day component out of range"));
        }
        if self.time >= 1 << TIME_BITS {
            return Err(Error::invalid_value("time component out of range"));
        }
        if let Some(tz) = self.timezone_minutes {
            let shifted = tz + TIMEZONE_OFFSET_MINUTES;
            if shifted < 0 || shifted >= 1 << TIMEZONE_BITS {
                return Err(Error::invalid_value("timezone offset out of range"));
            }
        }
        Ok(())
    }
}

/// Encodes a date-time value (Spec 7.1.8).
pub fn encode(writer: &mut BitWriter, value: &DateTimeValue, byte_aligned: bool) -> Result<()> {
    value.validate()?;
    let kind = value.kind;

    if kind.has_year() {
        log::trace!("enc dt year {}", value.year);
        integer::encode_mode(writer, value.year - YEAR_OFFSET, byte_aligned);
    }
    if kind.has_month_day() {
        n_bit_unsigned_integer::encode_mode(
            writer,
            u64::from(value.month_day),
            MONTHDAY_BITS,
            byte_aligned,
        );
    }
    if kind.has_time() {
        n_bit_unsigned_integer::encode_mode(writer, u64::from(value.time), TIME_BITS, byte_aligned);
        boolean::encode_mode(writer, value.fractional_secs.is_some(), byte_aligned);
        if let Some(frac) = value.fractional_secs {
            unsigned_integer::encode(writer, frac);
        }
    }
    boolean::encode_mode(writer, value.timezone_minutes.is_some(), byte_aligned);
    if let Some(tz) = value.timezone_minutes {
        n_bit_unsigned_integer::encode_mode(
            writer,
            (tz + TIMEZONE_OFFSET_MINUTES) as u64,
            TIMEZONE_BITS,
            byte_aligned,
        );
    }
    Ok(())
}

/// Decodes a date-time value of the given kind (Spec 7.1.8).
pub fn decode(
    reader: &mut BitReader,
    kind: DateTimeKind,
    byte_aligned: bool,
) -> Result<DateTimeValue> {
    let year = if kind.has_year() {
        integer::decode_mode(reader, byte_aligned)?
            .checked_add(YEAR_OFFSET)
            .ok_or_else(|| Error::invalid_value("year out of range"))?
    } else {
        0
    };

    let month_day = if kind.has_month_day() {
        n_bit_unsigned_integer::decode_mode(reader, MONTHDAY_BITS, byte_aligned)? as u32
    } else {
        0
    };

    let (time, fractional_secs) = if kind.has_time() {
        let time = n_bit_unsigned_integer::decode_mode(reader, TIME_BITS, byte_aligned)? as u32;
        let frac = if boolean::decode_mode(reader, byte_aligned)? {
            Some(unsigned_integer::decode(reader)?)
        } else {
            None
        };
        (time, frac)
    } else {
        (0, None)
    };

    let timezone_minutes = if boolean::decode_mode(reader, byte_aligned)? {
        let raw = n_bit_unsigned_integer::decode_mode(reader, TIMEZONE_BITS, byte_aligned)? as i32;
        Some(raw - TIMEZONE_OFFSET_MINUTES)
    } else {
        None
    };

    Ok(DateTimeValue {
        kind,
        year,
        month_day,
        time,
        fractional_secs,
        timezone_minutes,
    })
}
