//! Binary codec for dBase (DBF) tables.
//!
//! Parses and produces the 32-byte file header, the field descriptors and
//! the fixed-length record bytes, with typed field codecs for every
//! supported column type and an optional table façade over seekable streams.

pub mod charset;
pub mod config;
pub mod error;
pub mod field;
pub mod header;
pub mod io_utils;
pub mod memo;
pub mod record;
pub mod table;

pub use charset::CodePage;
pub use config::DbfConfig;
pub use error::DbfError;
pub use field::{Cell, FieldDescriptor, FieldType, FieldValue, Logical, Numeric};
pub use header::TableHeader;
pub use memo::{MemoKind, MemoStore, MemoValue, MemoryMemoStore};
pub use record::{Record, RecordCodec, RecordState};
pub use table::Table;
