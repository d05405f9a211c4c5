//! 32-byte field descriptor.
//!
//! Layout: name(11, NUL padded) type(1) start(4, LE) length(1)
//! decimal_count(1) flag(1) autoincrement_next(4, LE) autoincrement_step(1)
//! reserved(8).

use crate::charset::CodePage;
use crate::error::DbfError;
use crate::memo::MemoStore;

use super::{FieldCodec, FieldType, FieldValue};

/// Size of an encoded field descriptor.
pub const DESCRIPTOR_LEN: usize = 32;

/// Maximum field name length in encoded bytes.
pub const MAX_NAME_LEN: usize = 10;

const NAME_AREA: usize = 11;

/// Length of the dBase III style ASCII memo pointer.
pub(crate) const ASCII_MEMO_LEN: u8 = 10;

/// Field definition within a table header.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    name: String,
    raw_name: Option<[u8; NAME_AREA]>,
    field_type: FieldType,
    /// Type tag byte as stored; parsed tags keep their case
    tag: u8,
    start: u32,
    length: u8,
    decimal_count: u8,
    /// Field flags (system, nullable, binary); passed through untouched
    pub flag: u8,
    /// Next autoincrement value; passed through untouched
    pub autoincrement_next: u32,
    /// Autoincrement step; passed through untouched
    pub autoincrement_step: u8,
    reserved: [u8; 8],
}

impl FieldDescriptor {
    /// Creates a new field definition.
    ///
    /// # Arguments
    /// * `name` - Field name, stored uppercased; its encoded length is
    ///   checked again against the table code page when the field is added
    /// * `field_type` - Field type
    /// * `length` - Byte length; ignored for fixed-length types
    /// * `decimal_count` - Decimal places for Numeric/Float fields
    ///
    /// # Returns
    /// `Result<FieldDescriptor, DbfError>` containing the definition or an error.
    pub fn new(
        name: &str,
        field_type: FieldType,
        length: usize,
        decimal_count: u8,
    ) -> Result<Self, DbfError> {
        let name = name.to_uppercase();
        if name.is_empty() {
            return Err(name_error(&name, "name is empty".to_string()));
        }
        let chars = name.chars().count();
        if chars > MAX_NAME_LEN {
            return Err(name_error(
                &name,
                format!("{} characters exceeds {} byte limit", chars, MAX_NAME_LEN),
            ));
        }

        let length = match field_type.fixed_length() {
            Some(fixed) => fixed,
            None => match u8::try_from(length) {
                Ok(len) if len > 0 => len,
                _ => {
                    return Err(DbfError::InvalidLength {
                        field: name,
                        length,
                    })
                }
            },
        };

        let decimal_count = match field_type {
            FieldType::Numeric | FieldType::Float => decimal_count,
            FieldType::Currency => 4,
            _ => 0,
        };

        Ok(Self {
            name,
            raw_name: None,
            field_type,
            tag: field_type.tag(),
            start: 0,
            length,
            decimal_count,
            flag: 0,
            autoincrement_next: 0,
            autoincrement_step: 0,
            reserved: [0; 8],
        })
    }

    /// Character field of the given width.
    pub fn character(name: &str, length: usize) -> Result<Self, DbfError> {
        Self::new(name, FieldType::Character, length, 0)
    }

    /// Numeric field of the given width and decimal places.
    pub fn numeric(name: &str, length: usize, decimal_count: u8) -> Result<Self, DbfError> {
        Self::new(name, FieldType::Numeric, length, decimal_count)
    }

    /// Field of a fixed-length type.
    pub fn fixed(name: &str, field_type: FieldType) -> Result<Self, DbfError> {
        Self::new(name, field_type, 0, 0)
    }

    /// Parses a 32-byte descriptor.
    ///
    /// The stored start offset is taken as is; the header checks it against
    /// the running record offset.
    pub fn parse(bytes: &[u8], code_page: &CodePage) -> Result<Self, DbfError> {
        if bytes.len() != DESCRIPTOR_LEN {
            return Err(DbfError::malformed_header(format!(
                "field descriptor is {} bytes, expected {}",
                bytes.len(),
                DESCRIPTOR_LEN
            )));
        }

        let field_type = FieldType::from_tag(bytes[11])?;

        let mut raw_name = [0u8; NAME_AREA];
        raw_name.copy_from_slice(&bytes[..NAME_AREA]);
        let name_end = raw_name.iter().position(|&b| b == 0).unwrap_or(NAME_AREA);
        let name = code_page
            .decode(&raw_name[..name_end])
            .trim_end_matches(' ')
            .to_uppercase();

        let start = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
        let length = bytes[16];
        let decimal_count = bytes[17];

        let length_ok = match field_type.fixed_length() {
            None => length > 0,
            Some(_) if field_type.is_memo() => length == 4 || length == ASCII_MEMO_LEN,
            Some(fixed) => length == fixed,
        };
        if !length_ok {
            return Err(DbfError::InvalidLength {
                field: name,
                length: length as usize,
            });
        }

        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&bytes[24..32]);

        Ok(Self {
            name,
            raw_name: Some(raw_name),
            field_type,
            tag: bytes[11],
            start,
            length,
            decimal_count,
            flag: bytes[18],
            autoincrement_next: u32::from_le_bytes([bytes[19], bytes[20], bytes[21], bytes[22]]),
            autoincrement_step: bytes[23],
            reserved,
        })
    }

    /// Encodes the descriptor into 32 bytes.
    ///
    /// A parsed descriptor reproduces its original name bytes.
    pub fn to_bytes(&self, code_page: &CodePage) -> [u8; DESCRIPTOR_LEN] {
        let mut out = [0u8; DESCRIPTOR_LEN];
        match &self.raw_name {
            Some(raw) => out[..NAME_AREA].copy_from_slice(raw),
            None => {
                let encoded = code_page.encode(&self.name);
                let n = encoded.len().min(MAX_NAME_LEN);
                out[..n].copy_from_slice(&encoded[..n]);
            }
        }
        out[11] = self.tag;
        out[12..16].copy_from_slice(&self.start.to_le_bytes());
        out[16] = self.length;
        out[17] = self.decimal_count;
        out[18] = self.flag;
        out[19..23].copy_from_slice(&self.autoincrement_next.to_le_bytes());
        out[23] = self.autoincrement_step;
        out[24..32].copy_from_slice(&self.reserved);
        out
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Byte offset within the record (1-based; 0 is the deletion flag).
    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn length(&self) -> u8 {
        self.length
    }

    pub fn decimal_count(&self) -> u8 {
        self.decimal_count
    }

    /// Returns the end offset of this field (start + length).
    pub fn end(&self) -> u32 {
        self.start + u32::from(self.length)
    }

    pub fn is_memo(&self) -> bool {
        self.field_type.is_memo()
    }

    pub fn codec(&self) -> &'static dyn FieldCodec {
        self.field_type.codec()
    }

    pub fn default_value(&self) -> FieldValue {
        self.codec().default_value()
    }

    /// Decodes this field's raw value bytes.
    pub fn decode(
        &self,
        raw: &[u8],
        code_page: &CodePage,
        memo: Option<&mut dyn MemoStore>,
    ) -> Result<FieldValue, DbfError> {
        self.codec().decode(self, raw, code_page, memo)
    }

    /// Encodes a value into exactly `length` bytes.
    pub fn encode(
        &self,
        value: &FieldValue,
        code_page: &CodePage,
        memo: Option<&mut dyn MemoStore>,
    ) -> Result<Vec<u8>, DbfError> {
        self.codec().encode(self, value, code_page, memo)
    }

    /// Name, type tag, length and decimal count.
    pub fn info(&self) -> (&str, char, u8, u8) {
        (
            &self.name,
            self.field_type.tag() as char,
            self.length,
            self.decimal_count,
        )
    }

    pub(crate) fn set_start(&mut self, start: u32) {
        self.start = start;
    }
}

fn name_error(name: &str, reason: String) -> DbfError {
    DbfError::InvalidFieldName {
        name: name.to_string(),
        reason,
    }
}

/// Checks a field name against the 10-byte limit once encoded in the code page.
pub(crate) fn validate_name(name: &str, code_page: &CodePage) -> Result<(), DbfError> {
    if name.is_empty() {
        return Err(name_error(name, "name is empty".to_string()));
    }
    let encoded = code_page.encode_strict(name).ok_or_else(|| {
        name_error(name, format!("not representable in {}", code_page))
    })?;
    if encoded.len() > MAX_NAME_LEN {
        return Err(name_error(
            name,
            format!("{} bytes exceeds {} byte limit", encoded.len(), MAX_NAME_LEN),
        ));
    }
    Ok(())
}
