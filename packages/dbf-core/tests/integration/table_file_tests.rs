//! Table file tests: create, append, reopen, replace, delete.

use std::fs;

use chrono::NaiveDate;
use ntest::timeout;
use tempfile::tempdir;

use dbf_core::header::FIELD_TERMINATOR;
use dbf_core::table::EOF_MARKER;
use dbf_core::{Cell, DbfConfig, DbfError, FieldValue, Logical, Numeric, Table, TableHeader};

use super::helpers::{create_people_table, open, PEOPLE_HEADER_LEN, PEOPLE_RECORD_LEN};

const ROWS: &[(&str, &str, f64, bool)] = &[
    ("Alice", "1980-10-11", 5200.5, true),
    ("Bob", "19750203", 4100.0, false),
    ("Carol", "2001-12-31", 6999.99, true),
];

#[timeout(1000)]
#[test]
fn test_file_layout() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("people.dbf");
    create_people_table(&path, ROWS);

    let bytes = fs::read(&path).unwrap();
    assert_eq!(
        bytes.len(),
        PEOPLE_HEADER_LEN + ROWS.len() * PEOPLE_RECORD_LEN + 1
    );
    assert_eq!(bytes[0], 0x03);
    assert_eq!(&bytes[4..8], &3u32.to_le_bytes());
    assert_eq!(&bytes[8..10], &(PEOPLE_HEADER_LEN as u16).to_le_bytes());
    assert_eq!(&bytes[10..12], &(PEOPLE_RECORD_LEN as u16).to_le_bytes());
    assert_eq!(bytes[PEOPLE_HEADER_LEN - 1], FIELD_TERMINATOR);
    assert_eq!(*bytes.last().unwrap(), EOF_MARKER);

    let first = &bytes[PEOPLE_HEADER_LEN..PEOPLE_HEADER_LEN + PEOPLE_RECORD_LEN];
    assert_eq!(first, b" Alice       19801011  5200.50T");
}

#[timeout(1000)]
#[test]
fn test_reopen_and_iterate() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("people.dbf");
    create_people_table(&path, ROWS);

    let mut table = open(&path);
    assert_eq!(table.len(), 3);
    assert_eq!(
        table.field_names(),
        vec!["NAME", "BIRTH", "SALARY", "ACTIVE"]
    );

    let records: Vec<_> = table.iter().collect::<Result<_, _>>().unwrap();
    assert_eq!(records.len(), 3);

    let header = table.header();
    let bob = &records[1];
    assert_eq!(bob.index(), Some(1));
    assert_eq!(
        bob.get(header, "name").unwrap(),
        &Cell::Valid(FieldValue::Character("Bob".to_string()))
    );
    assert_eq!(
        bob.get(header, "birth").unwrap(),
        &Cell::Valid(FieldValue::Date(NaiveDate::from_ymd_opt(1975, 2, 3)))
    );
    assert_eq!(
        bob.get(header, "salary").unwrap(),
        &Cell::Valid(FieldValue::Numeric(Numeric::Decimal(4100.0)))
    );
    assert_eq!(
        bob.get(header, "active").unwrap(),
        &Cell::Valid(FieldValue::Logical(Logical::False))
    );
}

#[timeout(1000)]
#[test]
fn test_replace_and_delete_persist() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("people.dbf");
    create_people_table(&path, ROWS);

    {
        let mut table = open(&path);
        let mut carol = table.get(2).unwrap();
        carol.set(table.header(), "salary", 7100i64).unwrap();
        table.store(&mut carol).unwrap();
        table.delete(0).unwrap();
        table.flush().unwrap();
    }

    let mut table = open(&path);
    assert_eq!(table.len(), 3);
    assert!(table.get(0).unwrap().is_deleted());
    assert_eq!(
        table.get(2).unwrap().values()[2],
        Cell::Valid(FieldValue::Numeric(Numeric::Decimal(7100.0)))
    );
}

#[timeout(1000)]
#[test]
fn test_append_after_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("people.dbf");
    create_people_table(&path, &ROWS[..1]);

    {
        let mut table = open(&path);
        let mut record = table.new_record();
        record.set(table.header(), "name", "Dave").unwrap();
        record.set(table.header(), "birth", "").unwrap();
        table.append(&mut record).unwrap();
        assert_eq!(record.index(), Some(1));
        table.flush().unwrap();
    }

    let bytes = fs::read(&path).unwrap();
    assert_eq!(bytes.len(), PEOPLE_HEADER_LEN + 2 * PEOPLE_RECORD_LEN + 1);

    let mut table = open(&path);
    let dave = table.get(1).unwrap();
    assert_eq!(dave.values()[1], Cell::Valid(FieldValue::Date(None)));
    assert_eq!(
        dave.values()[3],
        Cell::Valid(FieldValue::Logical(Logical::Undetermined))
    );
}

#[timeout(1000)]
#[test]
fn test_read_only_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("people.dbf");
    create_people_table(&path, ROWS);
    let before = fs::read(&path).unwrap();

    let config = DbfConfig {
        read_only: true,
        ..DbfConfig::default()
    };
    let mut table = Table::open_path(&path, config).unwrap();
    assert_eq!(table.iter().count(), 3);
    assert_eq!(table.delete(1), Err(DbfError::StreamNotWritable));
    table.flush().unwrap();
    drop(table);

    assert_eq!(fs::read(&path).unwrap(), before);
}

#[timeout(1000)]
#[test]
fn test_open_missing_file() {
    let dir = tempdir().unwrap();
    let result = Table::open_path(dir.path().join("absent.dbf"), DbfConfig::default());
    assert!(matches!(result, Err(DbfError::IoError(_))));
}

#[timeout(1000)]
#[test]
fn test_header_parse_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("PEOPLE.DBF");
    create_people_table(&path, ROWS);

    let bytes = fs::read(&path).unwrap();
    let header = TableHeader::from_bytes(&bytes).unwrap();
    assert_eq!(header.record_count(), 3);
    assert_eq!(usize::from(header.record_length()), PEOPLE_RECORD_LEN);
    assert_eq!(header.field_by_name("Salary").unwrap().decimal_count(), 2);
    assert!(!header.has_memo());
    assert_eq!(header.flag() & 0x02, 0);
}

#[timeout(1000)]
#[test]
fn test_record_serializes_to_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("people.dbf");
    create_people_table(&path, ROWS);

    let mut table = open(&path);
    let record = table.get(0).unwrap();
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["index"], 0);
    assert_eq!(json["deleted"], false);
    assert_eq!(json["values"][0]["Valid"]["Character"], "Alice");
    assert_eq!(json["values"][1]["Valid"]["Date"], "1980-10-11");
    assert_eq!(json["values"][2]["Valid"]["Numeric"], 5200.5);
    assert_eq!(json["values"][3]["Valid"]["Logical"], "True");
    assert!(json.get("persisted").is_none());
}

#[timeout(1000)]
#[test]
fn test_dos_code_page_table_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("kunden.dbf");
    let config = DbfConfig {
        code_page: 0x01,
        ..DbfConfig::default()
    };

    let mut table = Table::create_path(&path, config).unwrap();
    table
        .add_fields(vec![dbf_core::FieldDescriptor::character("NAME", 8).unwrap()])
        .unwrap();
    let mut record = table.new_record();
    record.set(table.header(), "name", "Müller").unwrap();
    table.store(&mut record).unwrap();
    table.flush().unwrap();
    drop(table);

    let bytes = fs::read(&path).unwrap();
    assert_eq!(bytes[29], 0x01);
    let start = 32 + 32 + 1;
    assert_eq!(&bytes[start..start + 9], b" M\x81ller  ");

    let mut table = open(&path);
    let mut record = table.get(0).unwrap();
    assert_eq!(
        record.values()[0],
        Cell::Valid(FieldValue::Character("Müller".to_string()))
    );
    table.store(&mut record).unwrap();
    drop(table);
    assert_eq!(fs::read(&path).unwrap(), bytes);
}
