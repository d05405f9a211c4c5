//! Record values and the per-row binary codec.

use std::io::{Read, Seek, SeekFrom, Write};

use serde::Serialize;
use tracing::{trace, warn};

use crate::error::DbfError;
use crate::field::{Cell, FieldValue};
use crate::header::TableHeader;
use crate::io_utils::{classify_io_error, read_up_to};
use crate::memo::{reborrow, MemoStore};

/// Deletion flag of a live record.
pub const FLAG_LIVE: u8 = b' ';

/// Deletion flag of a deleted record.
pub const FLAG_DELETED: u8 = b'*';

/// Where a record stands relative to the table stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// No index yet; storing appends it
    Unbound,
    /// Index assigned, values not yet written
    Positioned,
    /// Values written at the record's position
    Persisted,
}

/// One table row: deletion flag plus one cell per header field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    index: Option<u32>,
    deleted: bool,
    values: Vec<Cell>,
    #[serde(skip)]
    persisted: bool,
}

impl Record {
    /// Creates an unbound record holding each field's default value.
    pub fn new(header: &TableHeader) -> Self {
        Self::from_values(
            header
                .fields()
                .iter()
                .map(|f| Cell::Valid(f.default_value()))
                .collect(),
        )
    }

    /// Creates an unbound record from explicit cells in header field order.
    pub fn from_values(values: Vec<Cell>) -> Self {
        Self {
            index: None,
            deleted: false,
            values,
            persisted: false,
        }
    }

    pub fn state(&self) -> RecordState {
        match (self.index, self.persisted) {
            (None, _) => RecordState::Unbound,
            (Some(_), false) => RecordState::Positioned,
            (Some(_), true) => RecordState::Persisted,
        }
    }

    pub fn index(&self) -> Option<u32> {
        self.index
    }

    pub fn set_index(&mut self, index: u32) {
        self.index = Some(index);
        self.persisted = false;
    }

    /// Puts back an index held before a failed write.
    pub(crate) fn restore_index(&mut self, index: Option<u32>) {
        self.index = index;
        self.persisted = false;
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
        self.persisted = false;
    }

    /// Marks the record as deleted; the row stays in the table.
    pub fn delete(&mut self) {
        self.set_deleted(true);
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    /// Cell at a field position.
    pub fn value(&self, index: usize) -> Result<&Cell, DbfError> {
        self.values.get(index).ok_or(DbfError::IndexOutOfRange {
            index,
            len: self.values.len(),
        })
    }

    /// Replaces the cell at a field position.
    pub fn set_value(&mut self, index: usize, value: impl Into<FieldValue>) -> Result<(), DbfError> {
        let len = self.values.len();
        let cell = self
            .values
            .get_mut(index)
            .ok_or(DbfError::IndexOutOfRange { index, len })?;
        *cell = Cell::Valid(value.into());
        self.persisted = false;
        Ok(())
    }

    /// Cell of the named field, ignoring case.
    pub fn get(&self, header: &TableHeader, name: &str) -> Result<&Cell, DbfError> {
        self.value(header.index_of_field(name)?)
    }

    /// Replaces the cell of the named field, ignoring case.
    pub fn set(
        &mut self,
        header: &TableHeader,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), DbfError> {
        self.set_value(header.index_of_field(name)?, value)
    }

    /// Field names paired with their cells.
    pub fn as_pairs<'a>(&'a self, header: &'a TableHeader) -> Vec<(&'a str, &'a Cell)> {
        header.field_names().into_iter().zip(self.values.iter()).collect()
    }

    pub fn into_values(self) -> Vec<Cell> {
        self.values
    }
}

/// Binary codec for records, driven by header geometry.
pub struct RecordCodec;

impl RecordCodec {
    /// Byte offset of an existing record.
    ///
    /// # Errors
    /// `IndexOutOfRange` if `index >= record_count`.
    pub fn position(header: &TableHeader, index: u32) -> Result<u64, DbfError> {
        if index >= header.record_count() {
            return Err(DbfError::IndexOutOfRange {
                index: index as usize,
                len: header.record_count() as usize,
            });
        }
        Ok(Self::offset(header, index))
    }

    /// Byte offset of the next appended record.
    pub fn append_position(header: &TableHeader) -> u64 {
        Self::offset(header, header.record_count())
    }

    fn offset(header: &TableHeader, index: u32) -> u64 {
        u64::from(header.header_length()) + u64::from(index) * u64::from(header.record_length())
    }

    /// Decodes `record_length` raw bytes.
    ///
    /// With ignore-errors enabled on the header, a field whose value cannot
    /// be decoded becomes [`Cell::Invalid`] and the remaining fields still
    /// decode.
    ///
    /// # Errors
    /// * `MalformedRecord` - the deletion flag is neither `' '` nor `'*'`
    /// * `IoError` - fewer than `record_length` bytes
    /// * any field decode error when ignore-errors is disabled
    pub fn decode(
        header: &TableHeader,
        raw: &[u8],
        index: Option<u32>,
        mut memo: Option<&mut dyn MemoStore>,
    ) -> Result<Record, DbfError> {
        let record_length = usize::from(header.record_length());
        if raw.len() < record_length || raw.is_empty() {
            return Err(DbfError::IoError(format!(
                "record is {} bytes, expected {}",
                raw.len(),
                record_length
            )));
        }

        let deleted = match raw[0] {
            FLAG_LIVE => false,
            FLAG_DELETED => true,
            flag => return Err(DbfError::MalformedRecord { flag }),
        };

        let code_page = header.code_page();
        let mut values = Vec::with_capacity(header.fields().len());
        for field in header.fields() {
            let start = field.start() as usize;
            let slice = &raw[start..field.end() as usize];
            match field.decode(slice, code_page, reborrow(&mut memo)) {
                Ok(value) => values.push(Cell::Valid(value)),
                Err(e) if header.ignore_errors() && e.is_value_error() => {
                    warn!(
                        "Record {:?}: field '{}' cannot be decoded: {}",
                        index,
                        field.name(),
                        e
                    );
                    values.push(Cell::Invalid(e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Record {
            index,
            deleted,
            values,
            persisted: false,
        })
    }

    /// Encodes a record into exactly `record_length` bytes.
    ///
    /// # Errors
    /// * `CorruptSchema` - the record does not hold one cell per field
    /// * `InvalidValue` - an invalid cell cannot be written back
    /// * `EncodedLengthMismatch` - a codec produced the wrong byte count
    /// * any field encode error
    pub fn encode(
        header: &TableHeader,
        record: &Record,
        mut memo: Option<&mut dyn MemoStore>,
    ) -> Result<Vec<u8>, DbfError> {
        let fields = header.fields();
        if record.values.len() != fields.len() {
            return Err(DbfError::CorruptSchema(format!(
                "record has {} values for {} fields",
                record.values.len(),
                fields.len()
            )));
        }

        let code_page = header.code_page();
        let mut out = Vec::with_capacity(usize::from(header.record_length()));
        out.push(if record.deleted { FLAG_DELETED } else { FLAG_LIVE });
        for (field, cell) in fields.iter().zip(record.values.iter()) {
            let value = match cell {
                Cell::Valid(value) => value,
                Cell::Invalid(_) => {
                    return Err(DbfError::invalid_value(
                        field.name(),
                        "value could not be decoded and cannot be written back",
                    ))
                }
            };
            let bytes = field.encode(value, code_page, reborrow(&mut memo))?;
            if bytes.len() != usize::from(field.length()) {
                return Err(DbfError::EncodedLengthMismatch {
                    field: field.name().to_string(),
                    expected: usize::from(field.length()),
                    got: bytes.len(),
                });
            }
            out.extend_from_slice(&bytes);
        }
        Ok(out)
    }

    /// Rewrites only the deletion flag byte of an existing record.
    ///
    /// Field bytes and memo blocks are left as they are.
    pub fn write_deleted_flag<W: Write + Seek + ?Sized>(
        header: &TableHeader,
        writer: &mut W,
        index: u32,
        deleted: bool,
    ) -> Result<(), DbfError> {
        let position = Self::position(header, index)?;
        let flag = if deleted { FLAG_DELETED } else { FLAG_LIVE };
        writer
            .seek(SeekFrom::Start(position))
            .map_err(|e| classify_io_error(e, "seek to record"))?;
        writer
            .write_all(&[flag])
            .map_err(|e| classify_io_error(e, "write deletion flag"))?;
        trace!("Set deletion flag of record {} to {}", index, deleted);
        Ok(())
    }

    /// Seeks to an existing record and decodes it.
    pub fn read_from<R: Read + Seek + ?Sized>(
        header: &TableHeader,
        reader: &mut R,
        index: u32,
        memo: Option<&mut dyn MemoStore>,
    ) -> Result<Record, DbfError> {
        let position = Self::position(header, index)?;
        reader
            .seek(SeekFrom::Start(position))
            .map_err(|e| classify_io_error(e, "seek to record"))?;
        let mut raw = vec![0u8; usize::from(header.record_length())];
        let n = read_up_to(reader, &mut raw, "read record")?;
        raw.truncate(n);
        trace!("Read record {} at offset {}", index, position);
        Self::decode(header, &raw, Some(index), memo)
    }

    /// Encodes a record and writes it at its index.
    ///
    /// The index may point one past the last record to append; the caller
    /// updates the header's record count.
    ///
    /// # Errors
    /// `IndexOutOfRange` if the record is unbound or its index lies beyond
    /// the append position.
    pub fn write_to<W: Write + Seek + ?Sized>(
        header: &TableHeader,
        writer: &mut W,
        record: &mut Record,
        memo: Option<&mut dyn MemoStore>,
    ) -> Result<(), DbfError> {
        let len = header.record_count() as usize;
        let index = match record.index {
            Some(i) if i <= header.record_count() => i,
            Some(i) => {
                return Err(DbfError::IndexOutOfRange {
                    index: i as usize,
                    len,
                })
            }
            None => return Err(DbfError::IndexOutOfRange { index: len + 1, len }),
        };

        let bytes = Self::encode(header, record, memo)?;
        let position = Self::offset(header, index);
        writer
            .seek(SeekFrom::Start(position))
            .map_err(|e| classify_io_error(e, "seek to record"))?;
        writer
            .write_all(&bytes)
            .map_err(|e| classify_io_error(e, "write record"))?;
        trace!("Wrote record {} at offset {}", index, position);
        record.persisted = true;
        Ok(())
    }
}
