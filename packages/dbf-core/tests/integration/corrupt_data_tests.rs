//! Corrupt data tests: structural failures and ignore-errors decoding.

use std::fs;
use std::io::Cursor;

use ntest::timeout;
use tempfile::tempdir;

use dbf_core::{Cell, DbfConfig, DbfError, FieldValue, Table};

use super::helpers::{create_people_table, PEOPLE_HEADER_LEN, PEOPLE_RECORD_LEN};

const ROWS: &[(&str, &str, f64, bool)] = &[
    ("Alice", "1980-10-11", 5200.5, true),
    ("Bob", "1975-02-03", 4100.0, false),
    ("Carol", "2001-12-31", 6999.99, true),
];

/// Offsets inside a people record.
const BIRTH_OFFSET: usize = 13;
const SALARY_OFFSET: usize = 21;
const ACTIVE_OFFSET: usize = 30;

fn corrupted_people() -> Vec<u8> {
    let dir = tempdir().unwrap();
    let path = dir.path().join("people.dbf");
    create_people_table(&path, ROWS);
    let mut bytes = fs::read(&path).unwrap();

    let bob = PEOPLE_HEADER_LEN + PEOPLE_RECORD_LEN;
    bytes[bob + BIRTH_OFFSET..bob + BIRTH_OFFSET + 8].copy_from_slice(b"19751302");
    bytes[bob + ACTIVE_OFFSET] = b'X';
    let carol = bob + PEOPLE_RECORD_LEN;
    bytes[carol + SALARY_OFFSET..carol + SALARY_OFFSET + 9].copy_from_slice(b"*********");
    bytes
}

#[timeout(1000)]
#[test]
fn test_corrupt_values_abort_by_default() {
    let mut table = Table::open(Cursor::new(corrupted_people()), DbfConfig::default()).unwrap();
    assert!(table.get(0).is_ok());
    assert!(matches!(
        table.get(1),
        Err(DbfError::InvalidValue { .. })
    ));

    let results: Vec<_> = table.iter().collect();
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
    assert!(results[2].is_err());
}

#[timeout(1000)]
#[test]
fn test_ignore_errors_yields_every_record() {
    let config = DbfConfig {
        ignore_errors: true,
        ..DbfConfig::default()
    };
    let mut table = Table::open(Cursor::new(corrupted_people()), config).unwrap();
    let records: Vec<_> = table.iter().collect::<Result<_, _>>().unwrap();
    assert_eq!(records.len(), 3);

    assert!(records[0].values().iter().all(|c| !c.is_invalid()));

    let bob = records[1].values();
    assert_eq!(bob[0], Cell::Valid(FieldValue::Character("Bob".to_string())));
    assert!(bob[1].is_invalid());
    assert!(!bob[2].is_invalid());
    assert!(bob[3].is_invalid());

    let carol = records[2].values();
    assert!(carol[2].is_invalid());
    assert_eq!(carol[2].to_string(), "<invalid>");
}

#[timeout(1000)]
#[test]
fn test_invalid_cells_cannot_be_stored() {
    let config = DbfConfig {
        ignore_errors: true,
        ..DbfConfig::default()
    };
    let mut table = Table::open(Cursor::new(corrupted_people()), config).unwrap();
    let mut bob = table.get(1).unwrap();
    assert!(matches!(
        table.store(&mut bob),
        Err(DbfError::InvalidValue { .. })
    ));

    bob.set(table.header(), "birth", "1975-12-02").unwrap();
    bob.set(table.header(), "active", false).unwrap();
    table.store(&mut bob).unwrap();
    assert!(table.get(1).unwrap().values().iter().all(|c| !c.is_invalid()));
}

#[timeout(1000)]
#[test]
fn test_malformed_record_flag_is_fatal() {
    let mut bytes = corrupted_people();
    bytes[PEOPLE_HEADER_LEN] = 0x58;
    let config = DbfConfig {
        ignore_errors: true,
        ..DbfConfig::default()
    };
    let mut table = Table::open(Cursor::new(bytes), config).unwrap();
    assert_eq!(
        table.get(0).unwrap_err(),
        DbfError::MalformedRecord { flag: 0x58 }
    );
    assert!(table.get(2).is_ok());
}

#[timeout(1000)]
#[test]
fn test_truncated_header() {
    let bytes = corrupted_people();
    assert!(matches!(
        Table::open(Cursor::new(bytes[..31].to_vec()), DbfConfig::default()),
        Err(DbfError::MalformedHeader { .. })
    ));
    assert!(matches!(
        Table::open(Cursor::new(bytes[..80].to_vec()), DbfConfig::default()),
        Err(DbfError::MalformedHeader { .. })
    ));
}

#[timeout(1000)]
#[test]
fn test_declared_record_length_mismatch() {
    let mut bytes = corrupted_people();
    bytes[10..12].copy_from_slice(&40u16.to_le_bytes());
    assert!(matches!(
        Table::open(Cursor::new(bytes), DbfConfig::default()),
        Err(DbfError::CorruptSchema(_))
    ));
}

#[timeout(1000)]
#[test]
fn test_truncated_record_region() {
    let bytes = corrupted_people();
    let cut = PEOPLE_HEADER_LEN + PEOPLE_RECORD_LEN + 5;
    let mut table = Table::open(Cursor::new(bytes[..cut].to_vec()), DbfConfig::default()).unwrap();
    assert!(table.get(0).is_ok());
    assert!(matches!(table.get(1), Err(DbfError::IoError(_))));
}
