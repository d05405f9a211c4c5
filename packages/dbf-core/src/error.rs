//! DBF codec error types.

use thiserror::Error;

/// Errors raised while parsing or producing DBF structures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DbfError {
    /// Header shorter than 32 bytes or field terminator missing
    #[error("Malformed header: {reason}")]
    MalformedHeader { reason: String },

    /// Declared layout disagrees with the field descriptors
    #[error("Corrupt schema: {0}")]
    CorruptSchema(String),

    /// Field list mutation after records exist
    #[error("Schema is frozen: table already holds {record_count} records")]
    SchemaFrozen { record_count: u32 },

    /// Unregistered field type tag
    #[error("Unknown field type tag 0x{tag:02X}")]
    UnknownType { tag: u8 },

    /// Field name empty or longer than 10 bytes once encoded
    #[error("Invalid field name '{name}': {reason}")]
    InvalidFieldName { name: String, reason: String },

    /// Field already defined in the header
    #[error("Field '{name}' already exists")]
    FieldAlreadyExists { name: String },

    /// Field length not acceptable for its type
    #[error("Field '{field}' has invalid length {length}")]
    InvalidLength { field: String, length: usize },

    /// Raw bytes or a value that cannot be converted
    #[error("Invalid value for field '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Formatted numeric text would lose integer digits
    #[error("Numeric overflow in field '{field}': '{text}' does not fit width {width}")]
    NumericOverflow {
        field: String,
        text: String,
        width: usize,
    },

    /// Value variant not accepted by the field type
    #[error("Type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    /// Record or field index outside the valid range
    #[error("Index {index} out of range (len: {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Field name lookup miss
    #[error("Field '{name}' not found")]
    FieldNotFound { name: String },

    /// Deletion flag byte is neither space nor asterisk
    #[error("Malformed record: deletion flag 0x{flag:02X}")]
    MalformedRecord { flag: u8 },

    /// Write attempted on a read-only sink
    #[error("Stream is not writable")]
    StreamNotWritable,

    /// Memo field needs a memo store but none was supplied
    #[error("Field '{field}' requires a memo store")]
    MemoStoreMissing { field: String },

    /// Memo store has no block with this id
    #[error("Memo block {block} not found")]
    MemoBlockNotFound { block: u32 },

    /// Field codec produced the wrong number of bytes
    #[error("Field '{field}' encoded to {got} bytes, expected {expected}")]
    EncodedLengthMismatch {
        field: String,
        expected: usize,
        got: usize,
    },

    /// I/O error on the underlying stream
    #[error("I/O error: {0}")]
    IoError(String),
}

impl DbfError {
    /// Returns `true` for errors scoped to a single field value.
    ///
    /// These are the errors that ignore-errors decoding replaces with an
    /// invalid cell; everything else aborts the operation.
    pub fn is_value_error(&self) -> bool {
        matches!(
            self,
            DbfError::InvalidValue { .. }
                | DbfError::NumericOverflow { .. }
                | DbfError::TypeMismatch { .. }
                | DbfError::MemoStoreMissing { .. }
                | DbfError::MemoBlockNotFound { .. }
        )
    }

    pub(crate) fn invalid_value(field: &str, message: impl Into<String>) -> Self {
        DbfError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn malformed_header(reason: impl Into<String>) -> Self {
        DbfError::MalformedHeader {
            reason: reason.into(),
        }
    }
}
