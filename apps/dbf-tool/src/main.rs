//! CLI tool for DBF table inspection.
//!
//! Provides commands for:
//! - Printing the table header
//! - Listing field definitions
//! - Dumping records as text or JSON lines

use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};

use dbf_core::{Cell, CodePage, DbfConfig, FieldValue, Logical, MemoKind, Numeric, Record, Table};

/// Command-line arguments for the DBF tool.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the table header
    Info {
        /// Path to the .dbf file
        path: PathBuf,
    },
    /// List field definitions
    Fields {
        /// Path to the .dbf file
        path: PathBuf,
    },
    /// Dump records
    Dump {
        /// Path to the .dbf file
        path: PathBuf,

        /// Replace undecodable values instead of aborting
        #[arg(long)]
        ignore_errors: bool,

        /// Maximum number of records to print
        #[arg(long)]
        limit: Option<u32>,

        /// Print one JSON object per record
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt::init();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.command {
        Command::Info { path } => {
            let table = open(&path, false)?;
            writeln!(out, "{}", table.header())?;
        }
        Command::Fields { path } => {
            let table = open(&path, false)?;
            write_fields(&table, &mut out)?;
        }
        Command::Dump {
            path,
            ignore_errors,
            limit,
            json,
        } => {
            let mut table = open(&path, ignore_errors)?;
            dump(&mut table, &mut out, limit, json)?;
        }
    }
    Ok(())
}

fn open(path: &Path, ignore_errors: bool) -> Result<Table<std::fs::File>> {
    let config = DbfConfig {
        read_only: true,
        ignore_errors,
        ..DbfConfig::default()
    };
    let table = Table::open_path(path, config)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    tracing::debug!(
        "Opened {}: {} fields, {} records",
        path.display(),
        table.fields().len(),
        table.len()
    );
    Ok(table)
}

fn write_fields<S, W>(table: &Table<S>, out: &mut W) -> Result<()>
where
    S: Read + Write + Seek,
    W: Write,
{
    writeln!(out, "{:<10} {:>4} {:>5} {:>3} {:>5}", "NAME", "TYPE", "START", "LEN", "DEC")?;
    for field in table.fields() {
        let (name, tag, length, decimals) = field.info();
        writeln!(
            out,
            "{:<10} {:>4} {:>5} {:>3} {:>5}",
            name,
            tag,
            field.start(),
            length,
            decimals
        )?;
    }
    Ok(())
}

fn dump<S, W>(table: &mut Table<S>, out: &mut W, limit: Option<u32>, json: bool) -> Result<()>
where
    S: Read + Write + Seek,
    W: Write,
{
    let header = table.header().clone();
    let code_page = *header.code_page();
    let names = header.field_names();
    let width = names.iter().map(|n| n.len()).max().unwrap_or(0);
    let count = limit.map_or(table.len(), |l| l.min(table.len()));

    for index in 0..count {
        let record = table
            .get(index)
            .with_context(|| format!("Failed to read record {}", index))?;
        if json {
            writeln!(out, "{}", record_json(&record, &names, &code_page))?;
            continue;
        }

        let marker = if record.is_deleted() { " (deleted)" } else { "" };
        writeln!(out, "-- record {}{}", index, marker)?;
        for (name, cell) in names.iter().zip(record.values()) {
            writeln!(
                out,
                "{:>width$}: {}",
                name,
                cell_text(cell, &code_page),
                width = width
            )?;
        }
    }
    Ok(())
}

fn cell_text(cell: &Cell, code_page: &CodePage) -> String {
    match cell {
        Cell::Valid(FieldValue::Memo(memo)) if memo.kind == MemoKind::Text => {
            memo.as_text(code_page)
        }
        Cell::Valid(value) => value.to_string(),
        Cell::Invalid(message) => format!("<invalid: {}>", message),
    }
}

fn record_json(record: &Record, names: &[&str], code_page: &CodePage) -> Value {
    let mut map = Map::new();
    map.insert("_deleted".to_string(), Value::Bool(record.is_deleted()));
    for (name, cell) in names.iter().zip(record.values()) {
        map.insert(name.to_string(), cell_json(cell, code_page));
    }
    Value::Object(map)
}

fn cell_json(cell: &Cell, code_page: &CodePage) -> Value {
    let value = match cell {
        Cell::Valid(value) => value,
        Cell::Invalid(_) => return Value::Null,
    };
    match value {
        FieldValue::Character(s) => json!(s),
        FieldValue::Numeric(Numeric::Integer(v)) => json!(v),
        FieldValue::Numeric(Numeric::Decimal(v)) => json!(v),
        FieldValue::Integer(v) => json!(v),
        FieldValue::Currency(v) => json!(v),
        FieldValue::Logical(Logical::Undetermined) => Value::Null,
        FieldValue::Logical(l) => json!(l.as_bool()),
        FieldValue::Date(d) => d.map_or(Value::Null, |d| json!(d.to_string())),
        FieldValue::DateTime(dt) => dt.map_or(Value::Null, |dt| json!(dt.to_string())),
        FieldValue::Memo(memo) if memo.kind == MemoKind::Text => json!(memo.as_text(code_page)),
        FieldValue::Memo(memo) => json!({ "kind": memo.kind, "bytes": memo.data.len() }),
    }
}
