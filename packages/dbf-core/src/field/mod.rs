//! Field types, descriptors and per-type value codecs.
//!
//! The set of field types is closed: [`FieldType`] maps a one-byte type tag
//! to one of the static codec implementations in `codecs`. There is no
//! runtime registration.

mod codecs;
mod descriptor;
mod value;

use std::fmt;

pub use descriptor::{FieldDescriptor, DESCRIPTOR_LEN, MAX_NAME_LEN};
pub(crate) use descriptor::validate_name;
pub use value::{Cell, FieldValue, Logical, Numeric};

use crate::charset::CodePage;
use crate::error::DbfError;
use crate::memo::{MemoKind, MemoStore};

mod sealed {
    pub trait Sealed {}
}

/// Value codec for one field type.
///
/// `decode` receives exactly the field's slice of the record; `encode` must
/// return exactly `field.length()` bytes. Memo-bearing codecs use the memo
/// store passed in; the others ignore it.
pub trait FieldCodec: sealed::Sealed + Send + Sync {
    /// Field type handled by this codec.
    fn field_type(&self) -> FieldType;

    /// Value of a freshly created record.
    fn default_value(&self) -> FieldValue;

    /// Decodes raw field bytes.
    fn decode(
        &self,
        field: &FieldDescriptor,
        raw: &[u8],
        code_page: &CodePage,
        memo: Option<&mut dyn MemoStore>,
    ) -> Result<FieldValue, DbfError>;

    /// Encodes a value into raw field bytes.
    fn encode(
        &self,
        field: &FieldDescriptor,
        value: &FieldValue,
        code_page: &CodePage,
        memo: Option<&mut dyn MemoStore>,
    ) -> Result<Vec<u8>, DbfError>;
}

/// DBF field type, keyed by its one-byte tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// `C`
    Character,
    /// `N`
    Numeric,
    /// `F`, same encoding as Numeric
    Float,
    /// `I`
    Integer,
    /// `Y`
    Currency,
    /// `L`
    Logical,
    /// `D`
    Date,
    /// `T`
    DateTime,
    /// `M`
    Memo,
    /// `G` (OLE object)
    General,
    /// `P`
    Picture,
}

impl FieldType {
    /// All registered field types.
    pub const ALL: [FieldType; 11] = [
        FieldType::Character,
        FieldType::Numeric,
        FieldType::Float,
        FieldType::Integer,
        FieldType::Currency,
        FieldType::Logical,
        FieldType::Date,
        FieldType::DateTime,
        FieldType::Memo,
        FieldType::General,
        FieldType::Picture,
    ];

    /// Type tag stored in the field descriptor.
    pub fn tag(self) -> u8 {
        match self {
            FieldType::Character => b'C',
            FieldType::Numeric => b'N',
            FieldType::Float => b'F',
            FieldType::Integer => b'I',
            FieldType::Currency => b'Y',
            FieldType::Logical => b'L',
            FieldType::Date => b'D',
            FieldType::DateTime => b'T',
            FieldType::Memo => b'M',
            FieldType::General => b'G',
            FieldType::Picture => b'P',
        }
    }

    /// Looks up a field type by tag, ignoring ASCII case.
    pub fn from_tag(tag: u8) -> Result<Self, DbfError> {
        let upper = tag.to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.tag() == upper)
            .ok_or(DbfError::UnknownType { tag })
    }

    /// Fixed byte length, `None` for caller-sized types.
    pub fn fixed_length(self) -> Option<u8> {
        match self {
            FieldType::Character | FieldType::Numeric | FieldType::Float => None,
            FieldType::Logical => Some(1),
            FieldType::Integer => Some(4),
            FieldType::Currency | FieldType::Date | FieldType::DateTime => Some(8),
            FieldType::Memo | FieldType::General | FieldType::Picture => Some(4),
        }
    }

    /// `true` if values live in the memo store.
    pub fn is_memo(self) -> bool {
        self.memo_kind().is_some()
    }

    /// Memo payload kind for memo-bearing types.
    pub fn memo_kind(self) -> Option<MemoKind> {
        match self {
            FieldType::Memo => Some(MemoKind::Text),
            FieldType::General => Some(MemoKind::Object),
            FieldType::Picture => Some(MemoKind::Picture),
            _ => None,
        }
    }

    /// Codec implementing this type.
    pub fn codec(self) -> &'static dyn FieldCodec {
        codecs::codec_for(self)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag() as char)
    }
}

/// Returns the codec registered for a type tag.
pub fn lookup(tag: u8) -> Result<&'static dyn FieldCodec, DbfError> {
    Ok(FieldType::from_tag(tag)?.codec())
}
