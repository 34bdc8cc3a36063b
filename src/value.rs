//! Decoding of textual row cells into typed values.
//!
//! The text protocol transmits every cell as a UTF-8 string (binary columns
//! as raw bytes); the column metadata decides what the string means.

use std::borrow::Cow;
use std::str::{self, FromStr};

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::protocol::payloads::{ColumnDefinition, ColumnType};
use crate::Error;

/// Decode toggles carried by the session configuration.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DecodeOptions {
    /// Map all-zero dates to the minimum date instead of failing.
    pub convert_zero_datetime: bool,
    /// Read `BINARY(16)` as a GUID and `CHAR(36)` as plain text.
    pub old_guids: bool,
}

/// A single decoded cell.
///
/// Borrowing variants point into the cursor's current row buffer and are
/// valid until the next read on the session; call [`into_owned`](Self::into_owned)
/// to keep a value longer.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    /// SQL NULL, the only value any NULL cell decodes to.
    Null,
    /// `TINYINT(1)`.
    Bool(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    /// `DECIMAL`, kept exact.
    Decimal(Decimal),
    /// `DATE`.
    Date(NaiveDate),
    /// `DATETIME` and `TIMESTAMP`, microsecond precision.
    DateTime(NaiveDateTime),
    /// `TIME`: a signed interval, not a time of day.
    Time(Duration),
    /// `CHAR(36)` (or `BINARY(16)` with `old_guids`).
    Uuid(Uuid),
    /// Binary-charset string and blob columns.
    Bytes(Cow<'a, [u8]>),
    /// Text-charset string columns and `JSON`.
    Text(Cow<'a, str>),
}

impl Value<'_> {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Detaches the value from the row buffer it may borrow from.
    pub fn into_owned(self) -> Value<'static> {
        match self {
            Value::Null => Value::Null,
            Value::Bool(v) => Value::Bool(v),
            Value::Int8(v) => Value::Int8(v),
            Value::UInt8(v) => Value::UInt8(v),
            Value::Int16(v) => Value::Int16(v),
            Value::UInt16(v) => Value::UInt16(v),
            Value::Int32(v) => Value::Int32(v),
            Value::UInt32(v) => Value::UInt32(v),
            Value::Int64(v) => Value::Int64(v),
            Value::UInt64(v) => Value::UInt64(v),
            Value::Float(v) => Value::Float(v),
            Value::Double(v) => Value::Double(v),
            Value::Decimal(v) => Value::Decimal(v),
            Value::Date(v) => Value::Date(v),
            Value::DateTime(v) => Value::DateTime(v),
            Value::Time(v) => Value::Time(v),
            Value::Uuid(v) => Value::Uuid(v),
            Value::Bytes(v) => Value::Bytes(Cow::Owned(v.into_owned())),
            Value::Text(v) => Value::Text(Cow::Owned(v.into_owned())),
        }
    }
}

/// Decodes one textual cell according to its column metadata.
pub(crate) fn decode_text<'a>(
    bytes: &'a [u8],
    column: &ColumnDefinition,
    options: DecodeOptions,
) -> crate::Result<Value<'a>> {
    match column.column_type {
        ColumnType::Tiny => {
            if column.column_length == 1 {
                Ok(Value::Bool(parse_number::<i8>(bytes)? != 0))
            } else if column.is_unsigned() {
                Ok(Value::UInt8(parse_number(bytes)?))
            } else {
                Ok(Value::Int8(parse_number(bytes)?))
            }
        }
        ColumnType::Short => {
            if column.is_unsigned() {
                Ok(Value::UInt16(parse_number(bytes)?))
            } else {
                Ok(Value::Int16(parse_number(bytes)?))
            }
        }
        ColumnType::Int24 | ColumnType::Long => {
            if column.is_unsigned() {
                Ok(Value::UInt32(parse_number(bytes)?))
            } else {
                Ok(Value::Int32(parse_number(bytes)?))
            }
        }
        ColumnType::Longlong => {
            if column.is_unsigned() {
                Ok(Value::UInt64(parse_number(bytes)?))
            } else {
                Ok(Value::Int64(parse_number(bytes)?))
            }
        }
        ColumnType::Year => Ok(Value::Int32(parse_number(bytes)?)),
        ColumnType::Float => Ok(Value::Float(parse_number(bytes)?)),
        ColumnType::Double => Ok(Value::Double(parse_number(bytes)?)),
        ColumnType::Decimal | ColumnType::NewDecimal => {
            let text = utf8(bytes)?;
            Decimal::from_str(text)
                .map(Value::Decimal)
                .map_err(|e| Error::Conversion(format!("invalid decimal '{}': {}", text, e).into()))
        }
        // BIT travels as raw bytes, most significant byte first.
        ColumnType::Bit => {
            if bytes.len() > 8 {
                return Err(Error::Conversion(
                    format!("BIT value of {} bytes does not fit in 64 bits", bytes.len()).into(),
                ));
            }
            let value = bytes.iter().fold(0u64, |acc, b| acc * 256 + u64::from(*b));
            Ok(Value::UInt64(value))
        }
        ColumnType::Date | ColumnType::Newdate => Ok(Value::Date(parse_date(
            utf8(bytes)?,
            options.convert_zero_datetime,
        )?)),
        ColumnType::Datetime | ColumnType::Timestamp => Ok(Value::DateTime(parse_datetime(
            utf8(bytes)?,
            options.convert_zero_datetime,
        )?)),
        ColumnType::Time => Ok(Value::Time(parse_time(utf8(bytes)?)?)),
        ColumnType::Json => Ok(Value::Text(Cow::Borrowed(utf8(bytes)?))),
        ColumnType::Null => Ok(Value::Null),
        ColumnType::String => {
            if column.is_binary() {
                if options.old_guids && bytes.len() == 16 {
                    Ok(Value::Uuid(Uuid::from_slice(bytes)?))
                } else {
                    Ok(Value::Bytes(Cow::Borrowed(bytes)))
                }
            } else if !options.old_guids && column.char_length() == 36 {
                Ok(Value::Uuid(Uuid::parse_str(utf8(bytes)?)?))
            } else {
                Ok(Value::Text(Cow::Borrowed(utf8(bytes)?)))
            }
        }
        ColumnType::Varchar
        | ColumnType::VarString
        | ColumnType::Enum
        | ColumnType::Set
        | ColumnType::TinyBlob
        | ColumnType::MediumBlob
        | ColumnType::LongBlob
        | ColumnType::Blob => {
            if column.is_binary() {
                if options.old_guids && bytes.len() == 16 {
                    Ok(Value::Uuid(Uuid::from_slice(bytes)?))
                } else {
                    Ok(Value::Bytes(Cow::Borrowed(bytes)))
                }
            } else {
                Ok(Value::Text(Cow::Borrowed(utf8(bytes)?)))
            }
        }
        ColumnType::Geometry => Ok(Value::Bytes(Cow::Borrowed(bytes))),
    }
}

fn utf8(bytes: &[u8]) -> crate::Result<&str> {
    Ok(str::from_utf8(bytes)?)
}

fn parse_number<T: FromStr>(bytes: &[u8]) -> crate::Result<T> {
    let text = utf8(bytes)?;
    text.parse().map_err(|_| {
        Error::Conversion(format!("'{}' is not a valid numeric literal", text).into())
    })
}

/// `YYYY-MM-DD`; all-zero dates are gated by `ConvertZeroDateTime`.
fn parse_date(text: &str, convert_zero_datetime: bool) -> crate::Result<NaiveDate> {
    let mut parts = text.splitn(3, '-');
    let mut next = || {
        parts
            .next()
            .and_then(|part| part.parse::<u32>().ok())
            .ok_or_else(|| Error::Conversion(format!("invalid date '{}'", text).into()))
    };

    let year = next()?;
    let month = next()?;
    let day = next()?;

    if year == 0 && month == 0 && day == 0 {
        if convert_zero_datetime {
            return Ok(min_date());
        }
        return Err(Error::Conversion(
            "zero dates require the ConvertZeroDateTime option".into(),
        ));
    }

    NaiveDate::from_ymd_opt(year as i32, month, day)
        .ok_or_else(|| Error::Conversion(format!("invalid date '{}'", text).into()))
}

/// `YYYY-MM-DD[ HH:MM:SS[.ffffff]]`.
fn parse_datetime(text: &str, convert_zero_datetime: bool) -> crate::Result<NaiveDateTime> {
    match text.split_once(' ') {
        None => Ok(parse_date(text, convert_zero_datetime)?.and_time(NaiveTime::MIN)),
        Some((date_part, clock_part)) => {
            let date = parse_date(date_part, convert_zero_datetime)?;
            let (hours, minutes, seconds, microseconds) = parse_clock(clock_part)?;
            date.and_hms_micro_opt(hours, minutes, seconds, microseconds)
                .ok_or_else(|| Error::Conversion(format!("invalid datetime '{}'", text).into()))
        }
    }
}

/// `[-]HHH:MM:SS[.ffffff]`; the sign on the hours applies to the whole
/// interval.
fn parse_time(text: &str) -> crate::Result<Duration> {
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let (hours, minutes, seconds, microseconds) = parse_clock(rest)?;

    let total_microseconds = (i64::from(hours) * 3600 + i64::from(minutes) * 60
        + i64::from(seconds))
        * 1_000_000
        + i64::from(microseconds);

    Ok(Duration::microseconds(if negative {
        -total_microseconds
    } else {
        total_microseconds
    }))
}

/// `HH:MM:SS[.ffffff]`, fraction right-padded to microseconds.
fn parse_clock(text: &str) -> crate::Result<(u32, u32, u32, u32)> {
    let invalid = || Error::Conversion(format!("invalid time '{}'", text).into());

    let (clock, fraction) = match text.split_once('.') {
        Some((clock, fraction)) => (clock, fraction),
        None => (text, ""),
    };

    let mut parts = clock.splitn(3, ':');
    let mut next = || {
        parts
            .next()
            .and_then(|part| part.parse::<u32>().ok())
            .ok_or_else(invalid)
    };

    let hours = next()?;
    let minutes = next()?;
    let seconds = next()?;

    let microseconds = if fraction.is_empty() {
        0
    } else {
        if fraction.len() > 6 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let parsed: u32 = fraction.parse().map_err(|_| invalid())?;
        parsed * 10u32.pow(6 - fraction.len() as u32)
    };

    Ok((hours, minutes, seconds, microseconds))
}

/// The stand-in for all-zero dates under `ConvertZeroDateTime`.
fn min_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1, 1, 1).expect("the minimum date is valid")
}
