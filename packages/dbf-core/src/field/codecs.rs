//! Per-type field codecs.

use std::borrow::Cow;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};

use crate::charset::CodePage;
use crate::error::DbfError;
use crate::memo::{MemoKind, MemoStore, MemoValue};

use super::descriptor::ASCII_MEMO_LEN;
use super::sealed::Sealed;
use super::{FieldCodec, FieldDescriptor, FieldType, FieldValue, Logical, Numeric};

/// Difference between the Julian Day Number and the proleptic Gregorian
/// ordinal (day 1 = 0001-01-01).
const JDN_GDN_DIFF: i64 = 1_721_425;

static CHARACTER: CharacterCodec = CharacterCodec;
static NUMERIC: NumericCodec = NumericCodec {
    field_type: FieldType::Numeric,
};
static FLOAT: NumericCodec = NumericCodec {
    field_type: FieldType::Float,
};
static INTEGER: IntegerCodec = IntegerCodec;
static CURRENCY: CurrencyCodec = CurrencyCodec;
static LOGICAL: LogicalCodec = LogicalCodec;
static DATE: DateCodec = DateCodec;
static DATE_TIME: DateTimeCodec = DateTimeCodec;
static MEMO: MemoCodec = MemoCodec {
    field_type: FieldType::Memo,
    kind: MemoKind::Text,
};
static GENERAL: MemoCodec = MemoCodec {
    field_type: FieldType::General,
    kind: MemoKind::Object,
};
static PICTURE: MemoCodec = MemoCodec {
    field_type: FieldType::Picture,
    kind: MemoKind::Picture,
};

pub(super) fn codec_for(field_type: FieldType) -> &'static dyn FieldCodec {
    match field_type {
        FieldType::Character => &CHARACTER,
        FieldType::Numeric => &NUMERIC,
        FieldType::Float => &FLOAT,
        FieldType::Integer => &INTEGER,
        FieldType::Currency => &CURRENCY,
        FieldType::Logical => &LOGICAL,
        FieldType::Date => &DATE,
        FieldType::DateTime => &DATE_TIME,
        FieldType::Memo => &MEMO,
        FieldType::General => &GENERAL,
        FieldType::Picture => &PICTURE,
    }
}

/// Encodes field text, failing on characters the code page cannot represent.
fn encode_text(
    field: &FieldDescriptor,
    text: &str,
    code_page: &CodePage,
) -> Result<Vec<u8>, DbfError> {
    code_page
        .encode_strict(text)
        .map(Cow::into_owned)
        .ok_or_else(|| {
            DbfError::invalid_value(
                field.name(),
                format!("'{}' is not representable in {}", text, code_page),
            )
        })
}

fn type_mismatch(field: &FieldDescriptor, expected: &str, value: &FieldValue) -> DbfError {
    DbfError::TypeMismatch {
        field: field.name().to_string(),
        expected: expected.to_string(),
        got: value.kind_name().to_string(),
    }
}

fn expect_len(field: &FieldDescriptor, raw: &[u8], len: usize) -> Result<(), DbfError> {
    if raw.len() != len {
        return Err(DbfError::invalid_value(
            field.name(),
            format!("expected {} bytes, got {}", len, raw.len()),
        ));
    }
    Ok(())
}

/// Character field: code page text, right-padded with spaces.
struct CharacterCodec;

impl Sealed for CharacterCodec {}

impl FieldCodec for CharacterCodec {
    fn field_type(&self) -> FieldType {
        FieldType::Character
    }

    fn default_value(&self) -> FieldValue {
        FieldValue::Character(String::new())
    }

    fn decode(
        &self,
        _field: &FieldDescriptor,
        raw: &[u8],
        code_page: &CodePage,
        _memo: Option<&mut dyn MemoStore>,
    ) -> Result<FieldValue, DbfError> {
        let text = code_page.decode(raw);
        Ok(FieldValue::Character(text.trim_end_matches(' ').to_string()))
    }

    fn encode(
        &self,
        field: &FieldDescriptor,
        value: &FieldValue,
        code_page: &CodePage,
        _memo: Option<&mut dyn MemoStore>,
    ) -> Result<Vec<u8>, DbfError> {
        let text = match value {
            FieldValue::Character(s) => Cow::Borrowed(s.as_str()),
            other => Cow::Owned(other.to_string()),
        };
        let length = field.length() as usize;
        let mut out = encode_text(field, &text, code_page)?;
        out.truncate(length);
        out.resize(length, b' ');
        Ok(out)
    }
}

/// Numeric and Float fields: right-justified fixed-point text.
struct NumericCodec {
    field_type: FieldType,
}

impl Sealed for NumericCodec {}

impl NumericCodec {
    fn format(field: &FieldDescriptor, value: &FieldValue) -> Result<String, DbfError> {
        let width = field.length() as usize;
        let precision = field.decimal_count() as usize;
        let integer = match value {
            FieldValue::Numeric(Numeric::Integer(v)) => Some(*v),
            FieldValue::Integer(v) => Some(i64::from(*v)),
            _ => None,
        };
        match integer {
            Some(v) if precision == 0 => Ok(format!("{:>width$}", v, width = width)),
            _ => {
                let v = value
                    .as_f64()
                    .ok_or_else(|| type_mismatch(field, "numeric", value))?;
                if !v.is_finite() {
                    return Err(DbfError::invalid_value(
                        field.name(),
                        format!("{} cannot be stored as text", v),
                    ));
                }
                Ok(format!(
                    "{:>width$.precision$}",
                    v,
                    width = width,
                    precision = precision
                ))
            }
        }
    }
}

impl FieldCodec for NumericCodec {
    fn field_type(&self) -> FieldType {
        self.field_type
    }

    fn default_value(&self) -> FieldValue {
        FieldValue::Numeric(Numeric::Integer(0))
    }

    fn decode(
        &self,
        field: &FieldDescriptor,
        raw: &[u8],
        code_page: &CodePage,
        _memo: Option<&mut dyn MemoStore>,
    ) -> Result<FieldValue, DbfError> {
        let decoded = code_page.decode(raw);
        let text = decoded.trim_matches(|c| c == ' ' || c == '\0');
        let number = if text.is_empty() {
            Numeric::Integer(0)
        } else if text.contains('.') {
            let v = text.parse::<f64>().map_err(|e| {
                DbfError::invalid_value(field.name(), format!("'{}': {}", text, e))
            })?;
            Numeric::Decimal(v)
        } else {
            let v = text.parse::<i64>().map_err(|e| {
                DbfError::invalid_value(field.name(), format!("'{}': {}", text, e))
            })?;
            Numeric::Integer(v)
        };
        Ok(FieldValue::Numeric(number))
    }

    fn encode(
        &self,
        field: &FieldDescriptor,
        value: &FieldValue,
        code_page: &CodePage,
        _memo: Option<&mut dyn MemoStore>,
    ) -> Result<Vec<u8>, DbfError> {
        let mut text = Self::format(field, value)?;
        let width = field.length() as usize;
        if text.len() > width {
            // Only fractional digits may be cut off
            match text.find('.') {
                Some(pos) if pos <= width => text.truncate(width),
                _ => {
                    return Err(DbfError::NumericOverflow {
                        field: field.name().to_string(),
                        text,
                        width,
                    })
                }
            }
        }
        Ok(code_page.encode(&text).into_owned())
    }
}

/// Integer field: little-endian i32.
struct IntegerCodec;

impl Sealed for IntegerCodec {}

impl FieldCodec for IntegerCodec {
    fn field_type(&self) -> FieldType {
        FieldType::Integer
    }

    fn default_value(&self) -> FieldValue {
        FieldValue::Integer(0)
    }

    fn decode(
        &self,
        field: &FieldDescriptor,
        raw: &[u8],
        _code_page: &CodePage,
        _memo: Option<&mut dyn MemoStore>,
    ) -> Result<FieldValue, DbfError> {
        expect_len(field, raw, 4)?;
        Ok(FieldValue::Integer(i32::from_le_bytes([
            raw[0], raw[1], raw[2], raw[3],
        ])))
    }

    fn encode(
        &self,
        field: &FieldDescriptor,
        value: &FieldValue,
        _code_page: &CodePage,
        _memo: Option<&mut dyn MemoStore>,
    ) -> Result<Vec<u8>, DbfError> {
        let overflow = |text: String| DbfError::NumericOverflow {
            field: field.name().to_string(),
            text,
            width: 4,
        };
        let v = match value {
            FieldValue::Integer(v) => *v,
            FieldValue::Numeric(Numeric::Integer(v)) => {
                i32::try_from(*v).map_err(|_| overflow(v.to_string()))?
            }
            FieldValue::Numeric(Numeric::Decimal(v)) | FieldValue::Currency(v) => {
                let truncated = v.trunc();
                if !truncated.is_finite()
                    || truncated < f64::from(i32::MIN)
                    || truncated > f64::from(i32::MAX)
                {
                    return Err(overflow(v.to_string()));
                }
                truncated as i32
            }
            other => return Err(type_mismatch(field, "integer", other)),
        };
        Ok(v.to_le_bytes().to_vec())
    }
}

/// Currency field: little-endian i64 holding value x 10000.
struct CurrencyCodec;

impl Sealed for CurrencyCodec {}

impl FieldCodec for CurrencyCodec {
    fn field_type(&self) -> FieldType {
        FieldType::Currency
    }

    fn default_value(&self) -> FieldValue {
        FieldValue::Currency(0.0)
    }

    fn decode(
        &self,
        field: &FieldDescriptor,
        raw: &[u8],
        _code_page: &CodePage,
        _memo: Option<&mut dyn MemoStore>,
    ) -> Result<FieldValue, DbfError> {
        expect_len(field, raw, 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(raw);
        Ok(FieldValue::Currency(i64::from_le_bytes(buf) as f64 / 10000.0))
    }

    fn encode(
        &self,
        field: &FieldDescriptor,
        value: &FieldValue,
        _code_page: &CodePage,
        _memo: Option<&mut dyn MemoStore>,
    ) -> Result<Vec<u8>, DbfError> {
        let v = value
            .as_f64()
            .ok_or_else(|| type_mismatch(field, "currency", value))?;
        let scaled = (v * 10000.0).round_ties_even();
        if !scaled.is_finite() || scaled < i64::MIN as f64 || scaled >= i64::MAX as f64 {
            return Err(DbfError::NumericOverflow {
                field: field.name().to_string(),
                text: v.to_string(),
                width: 8,
            });
        }
        Ok((scaled as i64).to_le_bytes().to_vec())
    }
}

/// Logical field: one of `?`, `NnFf `, `YyTt`.
struct LogicalCodec;

impl Sealed for LogicalCodec {}

impl FieldCodec for LogicalCodec {
    fn field_type(&self) -> FieldType {
        FieldType::Logical
    }

    fn default_value(&self) -> FieldValue {
        FieldValue::Logical(Logical::Undetermined)
    }

    fn decode(
        &self,
        field: &FieldDescriptor,
        raw: &[u8],
        _code_page: &CodePage,
        _memo: Option<&mut dyn MemoStore>,
    ) -> Result<FieldValue, DbfError> {
        expect_len(field, raw, 1)?;
        let logical = match raw[0] {
            b'?' => Logical::Undetermined,
            b'N' | b'n' | b'F' | b'f' | b' ' => Logical::False,
            b'Y' | b'y' | b'T' | b't' => Logical::True,
            other => {
                return Err(DbfError::invalid_value(
                    field.name(),
                    format!("invalid logical byte 0x{:02X}", other),
                ))
            }
        };
        Ok(FieldValue::Logical(logical))
    }

    fn encode(
        &self,
        _field: &FieldDescriptor,
        value: &FieldValue,
        _code_page: &CodePage,
        _memo: Option<&mut dyn MemoStore>,
    ) -> Result<Vec<u8>, DbfError> {
        let byte = match value {
            FieldValue::Logical(Logical::True) => b'T',
            FieldValue::Logical(Logical::Undetermined) => b'?',
            FieldValue::Integer(-1) | FieldValue::Numeric(Numeric::Integer(-1)) => b'?',
            _ => b'F',
        };
        Ok(vec![byte])
    }
}

/// Parses `yyyymmdd` or `yyyy-mm-dd` text.
fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.len() == 8 && text.bytes().all(|b| b.is_ascii_digit()) {
        let year = text[..4].parse().ok()?;
        let month = text[4..6].parse().ok()?;
        let day = text[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

/// Date field: `yyyymmdd` text, 8 spaces for no date.
struct DateCodec;

impl Sealed for DateCodec {}

impl FieldCodec for DateCodec {
    fn field_type(&self) -> FieldType {
        FieldType::Date
    }

    fn default_value(&self) -> FieldValue {
        FieldValue::Date(Some(Local::now().date_naive()))
    }

    fn decode(
        &self,
        field: &FieldDescriptor,
        raw: &[u8],
        code_page: &CodePage,
        _memo: Option<&mut dyn MemoStore>,
    ) -> Result<FieldValue, DbfError> {
        if raw.iter().all(|&b| b == b' ' || b == 0) {
            return Ok(FieldValue::Date(None));
        }
        let text = code_page.decode(raw);
        let date = parse_date_text(&text).ok_or_else(|| {
            DbfError::invalid_value(field.name(), format!("invalid date '{}'", text))
        })?;
        Ok(FieldValue::Date(Some(date)))
    }

    fn encode(
        &self,
        field: &FieldDescriptor,
        value: &FieldValue,
        code_page: &CodePage,
        _memo: Option<&mut dyn MemoStore>,
    ) -> Result<Vec<u8>, DbfError> {
        let date = match value {
            FieldValue::Date(d) => *d,
            FieldValue::DateTime(dt) => dt.map(|dt| dt.date()),
            FieldValue::Character(s) if s.trim().is_empty() => None,
            FieldValue::Character(s) => Some(parse_date_text(s).ok_or_else(|| {
                DbfError::invalid_value(field.name(), format!("invalid date '{}'", s))
            })?),
            other => return Err(type_mismatch(field, "date", other)),
        };
        match date {
            None => Ok(vec![b' '; field.length() as usize]),
            Some(d) if (0..=9999).contains(&d.year()) => {
                let text = d.format("%Y%m%d").to_string();
                Ok(code_page.encode(&text).into_owned())
            }
            Some(d) => Err(DbfError::invalid_value(
                field.name(),
                format!("year of {} does not fit 4 digits", d),
            )),
        }
    }
}

/// DateTime field: little-endian Julian day and milliseconds since midnight.
struct DateTimeCodec;

impl Sealed for DateTimeCodec {}

impl FieldCodec for DateTimeCodec {
    fn field_type(&self) -> FieldType {
        FieldType::DateTime
    }

    fn default_value(&self) -> FieldValue {
        FieldValue::DateTime(Some(Local::now().naive_local()))
    }

    fn decode(
        &self,
        field: &FieldDescriptor,
        raw: &[u8],
        _code_page: &CodePage,
        _memo: Option<&mut dyn MemoStore>,
    ) -> Result<FieldValue, DbfError> {
        expect_len(field, raw, 8)?;
        let jdn = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let millis = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
        if jdn < 1 {
            return Ok(FieldValue::DateTime(None));
        }

        let invalid = || {
            DbfError::invalid_value(
                field.name(),
                format!("julian day {} with {} ms is out of range", jdn, millis),
            )
        };
        let ordinal = i32::try_from(i64::from(jdn) - JDN_GDN_DIFF).map_err(|_| invalid())?;
        let date = NaiveDate::from_num_days_from_ce_opt(ordinal)
            .filter(|_| ordinal >= 1)
            .ok_or_else(invalid)?;
        let value = NaiveDateTime::new(date, NaiveTime::MIN)
            .checked_add_signed(TimeDelta::milliseconds(i64::from(millis)))
            .ok_or_else(invalid)?;
        Ok(FieldValue::DateTime(Some(value)))
    }

    fn encode(
        &self,
        field: &FieldDescriptor,
        value: &FieldValue,
        _code_page: &CodePage,
        _memo: Option<&mut dyn MemoStore>,
    ) -> Result<Vec<u8>, DbfError> {
        let value = match value {
            FieldValue::DateTime(dt) => *dt,
            FieldValue::Date(d) => d.map(|d| NaiveDateTime::new(d, NaiveTime::MIN)),
            other => return Err(type_mismatch(field, "datetime", other)),
        };
        let Some(dt) = value else {
            return Ok(vec![0u8; 8]);
        };

        let jdn = u32::try_from(i64::from(dt.date().num_days_from_ce()) + JDN_GDN_DIFF)
            .map_err(|_| {
                DbfError::invalid_value(field.name(), format!("{} precedes the julian epoch", dt))
            })?;
        let millis = (dt.hour() * 3600 + dt.minute() * 60 + dt.second()) * 1000;

        let mut out = Vec::with_capacity(8);
        out.extend_from_slice(&jdn.to_le_bytes());
        out.extend_from_slice(&millis.to_le_bytes());
        Ok(out)
    }
}

/// Memo, General and Picture fields: block pointer into the memo store.
///
/// The pointer is a little-endian u32 in 4-byte fields and right-justified
/// ASCII digits in 10-byte dBase III fields.
struct MemoCodec {
    field_type: FieldType,
    kind: MemoKind,
}

impl Sealed for MemoCodec {}

impl MemoCodec {
    fn read_pointer(field: &FieldDescriptor, raw: &[u8]) -> Result<u32, DbfError> {
        match raw.len() {
            4 => Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
            len if len == ASCII_MEMO_LEN as usize => {
                let text = String::from_utf8_lossy(raw);
                let digits = text.trim_matches(|c| c == ' ' || c == '\0');
                if digits.is_empty() {
                    return Ok(0);
                }
                digits.parse().map_err(|_| {
                    DbfError::invalid_value(field.name(), format!("invalid memo pointer '{}'", text))
                })
            }
            len => Err(DbfError::invalid_value(
                field.name(),
                format!("memo pointer of {} bytes", len),
            )),
        }
    }

    fn write_pointer(field: &FieldDescriptor, block: u32) -> Vec<u8> {
        if field.length() == ASCII_MEMO_LEN {
            if block == 0 {
                vec![b' '; ASCII_MEMO_LEN as usize]
            } else {
                format!("{:>10}", block).into_bytes()
            }
        } else {
            block.to_le_bytes().to_vec()
        }
    }
}

impl FieldCodec for MemoCodec {
    fn field_type(&self) -> FieldType {
        self.field_type
    }

    fn default_value(&self) -> FieldValue {
        FieldValue::Memo(MemoValue::empty(self.kind))
    }

    fn decode(
        &self,
        field: &FieldDescriptor,
        raw: &[u8],
        _code_page: &CodePage,
        memo: Option<&mut dyn MemoStore>,
    ) -> Result<FieldValue, DbfError> {
        let block = Self::read_pointer(field, raw)?;
        if block == 0 {
            return Ok(FieldValue::Memo(MemoValue::empty(self.kind)));
        }
        let store = memo.ok_or_else(|| DbfError::MemoStoreMissing {
            field: field.name().to_string(),
        })?;
        Ok(FieldValue::Memo(store.read(block)?))
    }

    fn encode(
        &self,
        field: &FieldDescriptor,
        value: &FieldValue,
        code_page: &CodePage,
        memo: Option<&mut dyn MemoStore>,
    ) -> Result<Vec<u8>, DbfError> {
        let data = match value {
            FieldValue::Memo(m) => m.data.clone(),
            FieldValue::Character(s) => encode_text(field, s, code_page)?,
            other => return Err(type_mismatch(field, "memo", other)),
        };
        if data.is_empty() {
            return Ok(Self::write_pointer(field, 0));
        }
        let store = memo.ok_or_else(|| DbfError::MemoStoreMissing {
            field: field.name().to_string(),
        })?;
        let block = store.write(&MemoValue::new(self.kind, data))?;
        Ok(Self::write_pointer(field, block))
    }
}
