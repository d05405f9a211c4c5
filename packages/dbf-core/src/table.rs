//! Single-writer table façade over a seekable stream.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::config::DbfConfig;
use crate::error::DbfError;
use crate::field::FieldDescriptor;
use crate::header::TableHeader;
use crate::io_utils::classify_io_error;
use crate::memo::MemoStore;
use crate::record::{Record, RecordCodec};

/// End-of-file marker written after the last record.
pub const EOF_MARKER: u8 = 0x1A;

/// DBF table bound to a stream.
///
/// The table owns the stream, the header and the optional memo store;
/// every mutation goes through `&mut self`.
pub struct Table<S> {
    stream: S,
    header: TableHeader,
    memo: Option<Box<dyn MemoStore>>,
    config: DbfConfig,
}

fn memo_ref(memo: &mut Option<Box<dyn MemoStore>>) -> Option<&mut dyn MemoStore> {
    match memo {
        Some(store) => Some(&mut **store),
        None => None,
    }
}

impl<S: Read + Write + Seek> Table<S> {
    /// Opens an existing table by parsing its header.
    pub fn open(mut stream: S, config: DbfConfig) -> Result<Self, DbfError> {
        stream
            .seek(SeekFrom::Start(0))
            .map_err(|e| classify_io_error(e, "seek to header"))?;
        let mut header = TableHeader::parse(&mut stream)?;
        header.set_ignore_errors(config.ignore_errors);
        debug!(
            "Opened table with {} fields and {} records",
            header.fields().len(),
            header.record_count()
        );
        Ok(Self {
            stream,
            header,
            memo: None,
            config,
        })
    }

    /// Creates an empty table and writes its header.
    ///
    /// # Errors
    /// `StreamNotWritable` when the configuration is read-only.
    pub fn create(stream: S, config: DbfConfig) -> Result<Self, DbfError> {
        if config.read_only {
            return Err(DbfError::StreamNotWritable);
        }
        let header = TableHeader::from_config(&config);
        let mut table = Self {
            stream,
            header,
            memo: None,
            config,
        };
        table.header.write(&mut table.stream)?;
        debug!(
            "Created table with signature 0x{:02X}",
            table.header.signature()
        );
        Ok(table)
    }

    pub fn header(&self) -> &TableHeader {
        &self.header
    }

    pub fn config(&self) -> &DbfConfig {
        &self.config
    }

    /// Number of records, deleted ones included.
    pub fn len(&self) -> u32 {
        self.header.record_count()
    }

    pub fn is_empty(&self) -> bool {
        self.header.record_count() == 0
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.header.field_names()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        self.header.fields()
    }

    /// Switches ignore-errors decoding for subsequent reads.
    pub fn set_ignore_errors(&mut self, ignore_errors: bool) {
        self.config.ignore_errors = ignore_errors;
        self.header.set_ignore_errors(ignore_errors);
    }

    fn ensure_writable(&self) -> Result<(), DbfError> {
        if self.config.read_only {
            return Err(DbfError::StreamNotWritable);
        }
        Ok(())
    }

    /// Appends field definitions; only allowed before the first record.
    pub fn add_fields<I>(&mut self, fields: I) -> Result<(), DbfError>
    where
        I: IntoIterator<Item = FieldDescriptor>,
    {
        self.ensure_writable()?;
        self.header.add_fields(fields)?;
        if let Some(store) = self.memo.as_deref() {
            self.header.set_memo_store(store);
        }
        Ok(())
    }

    /// Attaches the store holding memo payloads.
    pub fn set_memo_store(&mut self, store: Box<dyn MemoStore>) {
        self.header.set_memo_store(store.as_ref());
        self.memo = Some(store);
    }

    /// Takes the memo store back out of the table.
    pub fn take_memo_store(&mut self) -> Option<Box<dyn MemoStore>> {
        self.memo.take()
    }

    /// New unbound record with default values.
    pub fn new_record(&self) -> Record {
        Record::new(&self.header)
    }

    /// Reads the record at `index`.
    pub fn get(&mut self, index: u32) -> Result<Record, DbfError> {
        RecordCodec::read_from(
            &self.header,
            &mut self.stream,
            index,
            memo_ref(&mut self.memo),
        )
    }

    /// Reads a record counted from the end; `1` is the last record.
    ///
    /// # Errors
    /// `IndexOutOfRange` when `back` is 0 or exceeds the record count.
    pub fn get_from_end(&mut self, back: u32) -> Result<Record, DbfError> {
        let len = self.len();
        let index = len
            .checked_sub(back)
            .filter(|_| back > 0)
            .ok_or(DbfError::IndexOutOfRange {
                index: back as usize,
                len: len as usize,
            })?;
        self.get(index)
    }

    /// Iterates over every record in order.
    pub fn iter(&mut self) -> Records<'_, S> {
        Records {
            table: self,
            next: 0,
        }
    }

    /// Writes a record: appends unbound records, replaces positioned ones.
    pub fn store(&mut self, record: &mut Record) -> Result<(), DbfError> {
        match record.index() {
            None => self.append(record),
            Some(index) => self.put(index, record),
        }
    }

    /// Writes `record` at `index`, leaving its previous index in place if
    /// the write fails.
    fn write_at(&mut self, index: u32, record: &mut Record) -> Result<(), DbfError> {
        let previous = record.index();
        record.set_index(index);
        let result = RecordCodec::write_to(
            &self.header,
            &mut self.stream,
            record,
            memo_ref(&mut self.memo),
        );
        match result {
            Ok(()) => {
                self.header.mark_changed();
                Ok(())
            }
            Err(e) => {
                record.restore_index(previous);
                Err(e)
            }
        }
    }

    /// Appends a record and assigns its index.
    ///
    /// On failure the record keeps the index it had before the call.
    pub fn append(&mut self, record: &mut Record) -> Result<(), DbfError> {
        self.ensure_writable()?;
        let index = self.header.record_count();
        self.write_at(index, record)?;
        self.header.set_record_count(index + 1);
        if self.config.write_eof_marker {
            self.stream
                .write_all(&[EOF_MARKER])
                .map_err(|e| classify_io_error(e, "write end-of-file marker"))?;
        }
        Ok(())
    }

    /// Replaces the record at `index`.
    pub fn put(&mut self, index: u32, record: &mut Record) -> Result<(), DbfError> {
        self.ensure_writable()?;
        RecordCodec::position(&self.header, index)?;
        self.write_at(index, record)
    }

    /// Marks the record at `index` as deleted.
    ///
    /// Only the flag byte is rewritten, so rows with undecodable values can
    /// be deleted and memo blocks are not written again.
    pub fn delete(&mut self, index: u32) -> Result<(), DbfError> {
        self.ensure_writable()?;
        RecordCodec::write_deleted_flag(&self.header, &mut self.stream, index, true)?;
        self.header.mark_changed();
        Ok(())
    }

    /// Rewrites the header with today's date if the table changed, then
    /// flushes the stream and memo store. Read-only tables are left untouched.
    pub fn flush(&mut self) -> Result<(), DbfError> {
        if self.config.read_only {
            return Ok(());
        }
        self.header.flush(&mut self.stream)?;
        self.stream
            .flush()
            .map_err(|e| classify_io_error(e, "flush table"))?;
        if let Some(store) = self.memo.as_mut() {
            store.flush()?;
        }
        Ok(())
    }

    /// Returns the underlying stream without flushing.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl Table<File> {
    /// Opens a table file; read-only configurations open it without write access.
    pub fn open_path<P: AsRef<Path>>(path: P, config: DbfConfig) -> Result<Self, DbfError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(!config.read_only)
            .open(path)
            .map_err(|e| classify_io_error(e, &format!("open {}", path.display())))?;
        info!("Opening table {}", path.display());
        Self::open(file, config)
    }

    /// Creates or truncates a table file.
    pub fn create_path<P: AsRef<Path>>(path: P, config: DbfConfig) -> Result<Self, DbfError> {
        if config.read_only {
            return Err(DbfError::StreamNotWritable);
        }
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| classify_io_error(e, &format!("create {}", path.display())))?;
        info!("Creating table {}", path.display());
        Self::create(file, config)
    }
}

/// Iterator over the records of a table.
pub struct Records<'a, S> {
    table: &'a mut Table<S>,
    next: u32,
}

impl<S: Read + Write + Seek> Iterator for Records<'_, S> {
    type Item = Result<Record, DbfError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.table.len() {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.table.get(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.table.len().saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}
