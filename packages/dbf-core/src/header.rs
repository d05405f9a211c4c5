//! Table header: the 32-byte file header plus the field descriptor array.

use std::fmt;
use std::io::{Read, Seek, SeekFrom, Write};

use chrono::{Datelike, Local, NaiveDate};
use tracing::{debug, warn};

use crate::charset::CodePage;
use crate::config::{DbfConfig, SIGNATURE_DBASE3};
use crate::error::DbfError;
use crate::field::{validate_name, FieldDescriptor, DESCRIPTOR_LEN};
use crate::io_utils::{classify_io_error, read_up_to};
use crate::memo::MemoStore;

/// Size of the fixed file header.
pub const HEADER_LEN: usize = 32;

/// Byte closing the field descriptor array.
pub const FIELD_TERMINATOR: u8 = 0x0D;

/// Visual FoxPro signature; tables with it carry a database backlink.
pub const SIGNATURE_VFP: u8 = 0x30;

/// dBase III table with a DBT memo file.
pub const SIGNATURE_DBASE3_MEMO: u8 = 0x83;

/// Signatures that already announce a memo file.
pub const MEMO_SIGNATURES: [u8; 6] = [0x30, 0x83, 0x8B, 0xCB, 0xE5, 0xF5];

/// Zero-filled backlink area following the terminator in `0x30` tables.
pub const VFP_BACKLINK_LEN: usize = 263;

/// Table flag bit set when the table has memo-bearing fields.
pub const FLAG_HAS_MEMO: u8 = 0x02;

/// Parsed or in-construction DBF table header.
///
/// `record_length` and `header_length` are derived from the field list and
/// kept in sync by every schema mutation. Once the table holds records the
/// field list is frozen.
#[derive(Debug, Clone, PartialEq)]
pub struct TableHeader {
    signature: u8,
    last_update: NaiveDate,
    record_count: u32,
    header_length: u16,
    record_length: u16,
    flag: u8,
    code_page: CodePage,
    reserved: [u8; 16],
    reserved_tail: [u8; 2],
    fields: Vec<FieldDescriptor>,
    ignore_errors: bool,
    changed: bool,
}

impl Default for TableHeader {
    fn default() -> Self {
        Self::new(SIGNATURE_DBASE3, CodePage::default())
    }
}

impl TableHeader {
    /// Creates an empty header with no fields.
    pub fn new(signature: u8, code_page: CodePage) -> Self {
        let mut header = Self {
            signature,
            last_update: Local::now().date_naive(),
            record_count: 0,
            header_length: 0,
            record_length: 1,
            flag: 0,
            code_page,
            reserved: [0; 16],
            reserved_tail: [0; 2],
            fields: Vec::new(),
            ignore_errors: false,
            changed: false,
        };
        header.header_length = header.computed_header_length();
        header
    }

    /// Creates an empty header for a new table.
    pub fn from_config(config: &DbfConfig) -> Self {
        let mut header = Self::new(config.signature, CodePage::new(config.code_page));
        header.ignore_errors = config.ignore_errors;
        header
    }

    /// Parses a header and its field descriptors from a stream.
    ///
    /// Reading starts at the current stream position and stops right after
    /// the `0x0D` terminator.
    ///
    /// # Errors
    /// * `MalformedHeader` - fewer than 32 header bytes, a truncated descriptor
    ///   or end of stream before the terminator
    /// * `UnknownType` / `InvalidLength` - a descriptor that cannot be parsed
    /// * `CorruptSchema` - descriptor offsets or record length disagree with
    ///   the descriptors
    pub fn parse<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DbfError> {
        let mut raw = [0u8; HEADER_LEN];
        let n = read_up_to(reader, &mut raw, "read header")?;
        if n < HEADER_LEN {
            return Err(DbfError::malformed_header(format!(
                "header data is {} bytes, expected {}",
                n, HEADER_LEN
            )));
        }

        let signature = raw[0];
        let year = match raw[1] {
            y if y < 80 => 2000 + i32::from(y),
            y => 1900 + i32::from(y),
        };
        let last_update = NaiveDate::from_ymd_opt(year, u32::from(raw[2]), u32::from(raw[3]))
            .ok_or_else(|| {
                DbfError::malformed_header(format!(
                    "invalid last update date {}-{}-{}",
                    year, raw[2], raw[3]
                ))
            })?;
        let record_count = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
        let header_length = u16::from_le_bytes([raw[8], raw[9]]);
        let record_length = u16::from_le_bytes([raw[10], raw[11]]);
        let mut reserved = [0u8; 16];
        reserved.copy_from_slice(&raw[12..28]);
        let flag = raw[28];
        let code_page = CodePage::new(raw[29]);
        let reserved_tail = [raw[30], raw[31]];

        let mut fields = Vec::new();
        // Offset 0 holds the deletion flag
        let mut offset: u32 = 1;
        loop {
            let mut descriptor = [0u8; DESCRIPTOR_LEN];
            let n = read_up_to(reader, &mut descriptor[..1], "read field descriptor")?;
            if n == 0 {
                return Err(DbfError::malformed_header(
                    "end of stream before field terminator",
                ));
            }
            if descriptor[0] == FIELD_TERMINATOR {
                break;
            }
            let n = read_up_to(reader, &mut descriptor[1..], "read field descriptor")?;
            if n < DESCRIPTOR_LEN - 1 {
                return Err(DbfError::malformed_header(format!(
                    "field descriptor {} is truncated",
                    fields.len()
                )));
            }

            let mut field = FieldDescriptor::parse(&descriptor, &code_page)?;
            if field.start() != 0 && field.start() != offset {
                return Err(DbfError::CorruptSchema(format!(
                    "field '{}' starts at {}, expected {}",
                    field.name(),
                    field.start(),
                    offset
                )));
            }
            field.set_start(offset);
            offset = field.end();
            fields.push(field);
        }

        if !fields.is_empty() && offset != u32::from(record_length) {
            return Err(DbfError::CorruptSchema(format!(
                "record length is {} but fields need {}",
                record_length, offset
            )));
        }

        let header = Self {
            signature,
            last_update,
            record_count,
            header_length,
            record_length,
            flag,
            code_page,
            reserved,
            reserved_tail,
            fields,
            ignore_errors: false,
            changed: false,
        };
        debug!(
            "Parsed DBF header: signature 0x{:02X}, {} fields, {} records, code page {}",
            header.signature,
            header.fields.len(),
            header.record_count,
            header.code_page
        );
        Ok(header)
    }

    /// Parses a header from a byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DbfError> {
        let mut slice = bytes;
        Self::parse(&mut slice)
    }

    /// Appends one field definition.
    pub fn add_field(&mut self, field: FieldDescriptor) -> Result<(), DbfError> {
        self.add_fields(std::iter::once(field))
    }

    /// Appends field definitions in order.
    ///
    /// Either every definition is added or none is.
    ///
    /// # Errors
    /// * `SchemaFrozen` - the table already holds records
    /// * `InvalidFieldName` - a name exceeds 10 bytes or cannot be encoded in the code page
    /// * `FieldAlreadyExists` - a name is already defined or repeated in the batch
    /// * `CorruptSchema` - the resulting record or header would exceed 65535 bytes
    pub fn add_fields<I>(&mut self, fields: I) -> Result<(), DbfError>
    where
        I: IntoIterator<Item = FieldDescriptor>,
    {
        if self.record_count > 0 {
            return Err(DbfError::SchemaFrozen {
                record_count: self.record_count,
            });
        }

        let mut added: Vec<FieldDescriptor> = Vec::new();
        let mut offset = u32::from(self.record_length.max(1));
        for mut field in fields {
            validate_name(field.name(), &self.code_page)?;
            let duplicate = self
                .fields
                .iter()
                .chain(added.iter())
                .any(|f| f.name() == field.name());
            if duplicate {
                return Err(DbfError::FieldAlreadyExists {
                    name: field.name().to_string(),
                });
            }
            field.set_start(offset);
            offset = field.end();
            added.push(field);
        }

        let record_length = u16::try_from(offset).map_err(|_| {
            DbfError::CorruptSchema(format!("record length {} exceeds 65535 bytes", offset))
        })?;
        let field_count = self.fields.len() + added.len();
        Self::header_length_for(self.signature, field_count)?;

        debug!(
            "Adding {} fields, record length {} -> {}",
            added.len(),
            self.record_length,
            record_length
        );
        self.fields.extend(added);
        self.record_length = record_length;
        self.header_length = self.computed_header_length();
        self.changed = true;
        Ok(())
    }

    /// Attaches the memo store dialect to the header.
    ///
    /// When memo-bearing fields exist and the signature does not announce a
    /// memo file, switches to `0x30` for FPT stores or `0x83` otherwise and
    /// recomputes `header_length`. A parsed header length is kept as is.
    pub fn set_memo_store(&mut self, store: &dyn MemoStore) {
        if self.has_memo() && !MEMO_SIGNATURES.contains(&self.signature) {
            let signature = if store.is_fpt() {
                SIGNATURE_VFP
            } else {
                SIGNATURE_DBASE3_MEMO
            };
            debug!(
                "Switching signature 0x{:02X} -> 0x{:02X} for memo fields",
                self.signature, signature
            );
            self.signature = signature;
            self.header_length = self.computed_header_length();
            self.changed = true;
        }
    }

    /// Encodes the 32-byte file header.
    ///
    /// Syncs the has-memo flag bit with the field list first.
    pub fn to_bytes(&mut self) -> [u8; HEADER_LEN] {
        if self.has_memo() {
            self.flag |= FLAG_HAS_MEMO;
        } else {
            self.flag &= !FLAG_HAS_MEMO;
        }

        let year = (self.last_update.year() - 1900).clamp(0, i32::from(u8::MAX)) as u8;
        let mut out = [0u8; HEADER_LEN];
        out[0] = self.signature;
        out[1] = year;
        out[2] = self.last_update.month() as u8;
        out[3] = self.last_update.day() as u8;
        out[4..8].copy_from_slice(&self.record_count.to_le_bytes());
        out[8..10].copy_from_slice(&self.header_length.to_le_bytes());
        out[10..12].copy_from_slice(&self.record_length.to_le_bytes());
        out[12..28].copy_from_slice(&self.reserved);
        out[28] = self.flag;
        out[29] = self.code_page.code();
        out[30..32].copy_from_slice(&self.reserved_tail);
        out
    }

    /// Writes header, descriptors and terminator at the stream start.
    ///
    /// The space up to `header_length` is zero-filled.
    pub fn write<W: Write + Seek + ?Sized>(&mut self, writer: &mut W) -> Result<(), DbfError> {
        let mut buf = Vec::with_capacity(usize::from(self.header_length));
        buf.extend_from_slice(&self.to_bytes());
        for field in &self.fields {
            buf.extend_from_slice(&field.to_bytes(&self.code_page));
        }
        buf.push(FIELD_TERMINATOR);
        if buf.len() < usize::from(self.header_length) {
            buf.resize(usize::from(self.header_length), 0);
        }

        writer
            .seek(SeekFrom::Start(0))
            .map_err(|e| classify_io_error(e, "seek to header"))?;
        writer
            .write_all(&buf)
            .map_err(|e| classify_io_error(e, "write header"))?;
        self.changed = false;
        Ok(())
    }

    /// Stamps today's date and rewrites the header if it changed.
    pub fn flush<W: Write + Seek + ?Sized>(&mut self, writer: &mut W) -> Result<(), DbfError> {
        if !self.changed {
            return Ok(());
        }
        self.set_last_update(None);
        self.write(writer)
    }

    /// Looks up a field by name, ignoring case.
    pub fn field_by_name(&self, name: &str) -> Result<&FieldDescriptor, DbfError> {
        self.index_of_field(name).map(|i| &self.fields[i])
    }

    /// Looks up a field by position.
    pub fn field_by_index(&self, index: usize) -> Result<&FieldDescriptor, DbfError> {
        self.fields.get(index).ok_or(DbfError::IndexOutOfRange {
            index,
            len: self.fields.len(),
        })
    }

    /// Position of the named field, ignoring case.
    pub fn index_of_field(&self, name: &str) -> Result<usize, DbfError> {
        let upper = name.to_uppercase();
        self.fields
            .iter()
            .position(|f| f.name() == upper)
            .ok_or_else(|| DbfError::FieldNotFound {
                name: name.to_string(),
            })
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name()).collect()
    }

    /// `true` if at least one field stores its value in the memo file.
    pub fn has_memo(&self) -> bool {
        self.fields.iter().any(|f| f.is_memo())
    }

    /// Sets the last update date, today when `None`.
    pub fn set_last_update(&mut self, date: Option<NaiveDate>) {
        self.last_update = date.unwrap_or_else(|| Local::now().date_naive());
        self.changed = true;
    }

    pub fn set_ignore_errors(&mut self, ignore_errors: bool) {
        self.ignore_errors = ignore_errors;
    }

    /// Records that table content changed, so the next flush restamps the date.
    pub(crate) fn mark_changed(&mut self) {
        self.changed = true;
    }

    /// Updates the record count; the schema freezes once it is non-zero.
    pub fn set_record_count(&mut self, record_count: u32) {
        if record_count != self.record_count {
            self.record_count = record_count;
            self.changed = true;
        }
    }

    pub fn signature(&self) -> u8 {
        self.signature
    }

    pub fn last_update(&self) -> NaiveDate {
        self.last_update
    }

    pub fn record_count(&self) -> u32 {
        self.record_count
    }

    pub fn header_length(&self) -> u16 {
        self.header_length
    }

    pub fn record_length(&self) -> u16 {
        self.record_length
    }

    pub fn flag(&self) -> u8 {
        self.flag
    }

    pub fn code_page(&self) -> &CodePage {
        &self.code_page
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn ignore_errors(&self) -> bool {
        self.ignore_errors
    }

    /// `true` when the header differs from what was last written or parsed.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    fn computed_header_length(&self) -> u16 {
        match Self::header_length_for(self.signature, self.fields.len()) {
            Ok(len) => len,
            Err(e) => {
                warn!("{}", e);
                u16::MAX
            }
        }
    }

    fn header_length_for(signature: u8, field_count: usize) -> Result<u16, DbfError> {
        let mut len = HEADER_LEN + DESCRIPTOR_LEN * field_count + 1;
        if signature == SIGNATURE_VFP {
            len += VFP_BACKLINK_LEN;
        }
        u16::try_from(len).map_err(|_| {
            DbfError::CorruptSchema(format!("header length {} exceeds 65535 bytes", len))
        })
    }
}

impl fmt::Display for TableHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Version (signature): 0x{:02X}", self.signature)?;
        writeln!(f, "        Last update: {}", self.last_update)?;
        writeln!(f, "      Header length: {}", self.header_length)?;
        writeln!(f, "      Record length: {}", self.record_length)?;
        writeln!(f, "       Record count: {}", self.record_count)?;
        writeln!(f, "         Table flag: 0x{:02X}", self.flag)?;
        writeln!(
            f,
            "          Code page: 0x{:02X} ({})",
            self.code_page.code(),
            self.code_page
        )?;
        writeln!(f)?;
        write!(f, " FieldName Type Len Dec")?;
        for field in &self.fields {
            let (name, tag, length, decimals) = field.info();
            write!(f, "\n{:>10} {:>4} {:>3} {:>3}", name, tag, length, decimals)?;
        }
        Ok(())
    }
}
