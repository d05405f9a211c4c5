//! Shared fixtures for integration tests.

use std::fs::File;
use std::path::Path;

use dbf_core::{DbfConfig, FieldDescriptor, FieldType, Table};

/// Field layout used by most tests: NAME C(12), BIRTH D, SALARY N(9,2), ACTIVE L.
pub fn people_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::character("NAME", 12).unwrap(),
        FieldDescriptor::fixed("BIRTH", FieldType::Date).unwrap(),
        FieldDescriptor::numeric("SALARY", 9, 2).unwrap(),
        FieldDescriptor::fixed("ACTIVE", FieldType::Logical).unwrap(),
    ]
}

/// Creates a people table at `path` holding the given rows and flushes it.
pub fn create_people_table(path: &Path, rows: &[(&str, &str, f64, bool)]) {
    let mut table = Table::create_path(path, DbfConfig::default()).unwrap();
    table.add_fields(people_fields()).unwrap();
    for (name, birth, salary, active) in rows {
        let mut record = table.new_record();
        let header = table.header();
        record.set(header, "name", *name).unwrap();
        record.set(header, "birth", *birth).unwrap();
        record.set(header, "salary", *salary).unwrap();
        record.set(header, "active", *active).unwrap();
        table.store(&mut record).unwrap();
    }
    table.flush().unwrap();
}

/// Opens a table file with default settings.
pub fn open(path: &Path) -> Table<File> {
    Table::open_path(path, DbfConfig::default()).unwrap()
}

/// Byte offset of the first record of the people table.
pub const PEOPLE_HEADER_LEN: usize = 32 + 32 * 4 + 1;

/// Record length of the people table.
pub const PEOPLE_RECORD_LEN: usize = 1 + 12 + 8 + 9 + 1;
