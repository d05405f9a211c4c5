//! Memo field tests through an attached memo store.

use std::collections::HashMap;
use std::path::Path;

use ntest::timeout;
use tempfile::tempdir;

use dbf_core::header::{FLAG_HAS_MEMO, SIGNATURE_DBASE3_MEMO, SIGNATURE_VFP, VFP_BACKLINK_LEN};
use dbf_core::{
    Cell, DbfConfig, DbfError, FieldDescriptor, FieldType, FieldValue, MemoKind, MemoStore,
    MemoValue, MemoryMemoStore, Table,
};

/// Store keyed by block id that survives the table being dropped.
#[derive(Default)]
struct SharedStore {
    blocks: HashMap<u32, MemoValue>,
    next: u32,
}

impl MemoStore for SharedStore {
    fn read(&mut self, block: u32) -> Result<MemoValue, DbfError> {
        self.blocks
            .get(&block)
            .cloned()
            .ok_or(DbfError::MemoBlockNotFound { block })
    }

    fn write(&mut self, value: &MemoValue) -> Result<u32, DbfError> {
        self.next += 8;
        self.blocks.insert(self.next, value.clone());
        Ok(self.next)
    }

    fn is_fpt(&self) -> bool {
        false
    }
}

fn memo_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::character("TITLE", 10).unwrap(),
        FieldDescriptor::fixed("BODY", FieldType::Memo).unwrap(),
        FieldDescriptor::fixed("LOGO", FieldType::Picture).unwrap(),
    ]
}

#[timeout(1000)]
#[test]
fn test_memo_table_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("notes.dbf");

    let mut table = Table::create_path(&path, DbfConfig::default()).unwrap();
    table.add_fields(memo_fields()).unwrap();
    table.set_memo_store(Box::new(MemoryMemoStore::new(true)));
    assert_eq!(table.header().signature(), SIGNATURE_VFP);
    assert_eq!(
        usize::from(table.header().header_length()),
        32 + 32 * 3 + 1 + VFP_BACKLINK_LEN
    );

    let mut record = table.new_record();
    record.set(table.header(), "title", "first").unwrap();
    record.set(table.header(), "body", "hello memo").unwrap();
    table.store(&mut record).unwrap();

    let mut empty = table.new_record();
    empty.set(table.header(), "title", "empty").unwrap();
    table.store(&mut empty).unwrap();
    table.flush().unwrap();

    let first = table.get(0).unwrap();
    assert_eq!(
        first.values()[1],
        Cell::Valid(FieldValue::Memo(MemoValue::new(
            MemoKind::Text,
            b"hello memo".to_vec()
        )))
    );
    assert_eq!(
        first.values()[2],
        Cell::Valid(FieldValue::Memo(MemoValue::empty(MemoKind::Picture)))
    );

    let second = table.get(1).unwrap();
    assert_eq!(
        second.values()[1],
        Cell::Valid(FieldValue::Memo(MemoValue::empty(MemoKind::Text)))
    );

    let store = table.take_memo_store().unwrap();
    assert_eq!(store.memo_file_name_for(&path), dir.path().join("notes.fpt"));
    drop(table);

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes[0], SIGNATURE_VFP);
    assert_eq!(bytes[28] & FLAG_HAS_MEMO, FLAG_HAS_MEMO);
}

#[timeout(1000)]
#[test]
fn test_dbt_store_and_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("NOTES.DBF");

    let mut table = Table::create_path(&path, DbfConfig::default()).unwrap();
    table.set_memo_store(Box::new(SharedStore::default()));
    table.add_fields(memo_fields()).unwrap();
    assert_eq!(table.header().signature(), SIGNATURE_DBASE3_MEMO);

    let mut record = table.new_record();
    record.set(table.header(), "title", "logo").unwrap();
    record
        .set(
            table.header(),
            "logo",
            MemoValue::new(MemoKind::Picture, vec![0xFF, 0xD8, 0xFF]),
        )
        .unwrap();
    table.store(&mut record).unwrap();
    table.flush().unwrap();
    let store = table.take_memo_store().unwrap();
    assert_eq!(
        store.memo_file_name_for(Path::new("NOTES.DBF")),
        Path::new("NOTES.DBT")
    );
    drop(table);

    let mut reopened = Table::open_path(&path, DbfConfig::default()).unwrap();
    assert!(reopened.header().has_memo());
    assert!(matches!(
        reopened.get(0),
        Err(DbfError::MemoStoreMissing { .. })
    ));

    reopened.set_memo_store(store);
    let record = reopened.get(0).unwrap();
    assert_eq!(
        record.get(reopened.header(), "logo").unwrap(),
        &Cell::Valid(FieldValue::Memo(MemoValue::new(
            MemoKind::Picture,
            vec![0xFF, 0xD8, 0xFF]
        )))
    );
}

#[timeout(1000)]
#[test]
fn test_missing_memo_block() {
    let mut table = Table::create(std::io::Cursor::new(Vec::new()), DbfConfig::default()).unwrap();
    table.set_memo_store(Box::new(MemoryMemoStore::new(true)));
    table.add_fields(memo_fields()).unwrap();

    let mut record = table.new_record();
    record.set(table.header(), "body", "lost").unwrap();
    table.store(&mut record).unwrap();

    // A fresh store knows no blocks
    table.set_memo_store(Box::new(MemoryMemoStore::new(true)));
    assert_eq!(
        table.get(0).unwrap_err(),
        DbfError::MemoBlockNotFound { block: 1 }
    );

    table.set_ignore_errors(true);
    let record = table.get(0).unwrap();
    assert!(record.values()[1].is_invalid());
    assert!(!record.values()[0].is_invalid());
}
