//! Memo store capability.
//!
//! Memo, General and Picture fields keep only a block pointer in the record;
//! the payload lives in a companion FPT/DBT file owned by a [`MemoStore`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::charset::CodePage;
use crate::error::DbfError;

/// Kind of payload held in a memo block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoKind {
    /// Text memo (`M` fields)
    Text,
    /// OLE object (`G` fields)
    Object,
    /// Picture (`P` fields)
    Picture,
}

/// Memo payload with its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoValue {
    pub kind: MemoKind,
    pub data: Vec<u8>,
}

impl MemoValue {
    pub fn new(kind: MemoKind, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    /// Empty payload, the value behind block id 0.
    pub fn empty(kind: MemoKind) -> Self {
        Self {
            kind,
            data: Vec::new(),
        }
    }

    /// Text memo encoded with the table code page.
    pub fn text(text: &str, code_page: &CodePage) -> Self {
        Self {
            kind: MemoKind::Text,
            data: code_page.encode(text).into_owned(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Payload decoded as text with the table code page.
    pub fn as_text(&self, code_page: &CodePage) -> String {
        code_page.decode(&self.data).into_owned()
    }
}

/// Block storage for memo payloads.
///
/// The codec calls `read`/`write` at most once per field per record
/// operation and never re-enters the store.
pub trait MemoStore {
    /// Reads the payload stored at `block`.
    fn read(&mut self, block: u32) -> Result<MemoValue, DbfError>;

    /// Stores a payload and returns its block id (never 0).
    fn write(&mut self, value: &MemoValue) -> Result<u32, DbfError>;

    /// `true` for FoxPro FPT files, `false` for dBase III DBT files.
    fn is_fpt(&self) -> bool;

    /// Memo file path belonging to a table path.
    fn memo_file_name_for(&self, table_path: &Path) -> PathBuf {
        memo_file_name(table_path, self.is_fpt())
    }

    /// Flushes pending writes to the backing storage.
    fn flush(&mut self) -> Result<(), DbfError> {
        Ok(())
    }
}

/// Reborrows an optional store for one field operation.
pub(crate) fn reborrow<'a>(
    memo: &'a mut Option<&mut dyn MemoStore>,
) -> Option<&'a mut dyn MemoStore> {
    match memo {
        Some(store) => Some(&mut **store),
        None => None,
    }
}

/// Swaps the table extension for `fpt` or `dbt`, keeping the extension case.
pub fn memo_file_name(table_path: &Path, fpt: bool) -> PathBuf {
    let ext = if fpt { "fpt" } else { "dbt" };
    let upper = table_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| !e.is_empty() && e.chars().all(|c| !c.is_ascii_lowercase()))
        .unwrap_or(false);
    if upper {
        table_path.with_extension(ext.to_ascii_uppercase())
    } else {
        table_path.with_extension(ext)
    }
}

/// Memo store kept entirely in memory.
///
/// Block ids start at 1; every write allocates a new block.
#[derive(Debug, Default)]
pub struct MemoryMemoStore {
    blocks: Vec<MemoValue>,
    fpt: bool,
}

impl MemoryMemoStore {
    /// Creates an empty store reporting the FPT or DBT dialect.
    pub fn new(fpt: bool) -> Self {
        Self {
            blocks: Vec::new(),
            fpt,
        }
    }

    /// Number of allocated blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl MemoStore for MemoryMemoStore {
    fn read(&mut self, block: u32) -> Result<MemoValue, DbfError> {
        let index = (block as usize)
            .checked_sub(1)
            .ok_or(DbfError::MemoBlockNotFound { block })?;
        self.blocks
            .get(index)
            .cloned()
            .ok_or(DbfError::MemoBlockNotFound { block })
    }

    fn write(&mut self, value: &MemoValue) -> Result<u32, DbfError> {
        self.blocks.push(value.clone());
        u32::try_from(self.blocks.len())
            .map_err(|_| DbfError::IoError("memo store full".to_string()))
    }

    fn is_fpt(&self) -> bool {
        self.fpt
    }
}
