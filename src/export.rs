//! Exporters for the accumulated result table.
//!
//! Every exporter writes the same four columns, `File, field, value,
//! confidence`, one record per row, in the order given. An empty record
//! list is a no-op that returns `Ok(0)` and touches nothing on disk.
//! CSV, XLSX and JSON replace the target file; SQLite appends to the
//! `invoices` table, creating it when missing.

use crate::error::ExportError;
use crate::output::ResultRecord;
use rusqlite::{params, Connection};
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Column headers shared by every export format.
pub const COLUMNS: [&str; 4] = ["File", "field", "value", "confidence"];

/// Sheet name used by [`write_xlsx`].
pub const SHEET_NAME: &str = "Invoices";

/// Excel refuses longer cell strings.
const XLSX_MAX_CELL_CHARS: usize = 32_767;

const XLSX_MAX_COLUMN_WIDTH: usize = 60;

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS invoices (
    filename TEXT,
    field TEXT,
    value TEXT,
    confidence TEXT
)";

fn create_file(path: &Path) -> Result<BufWriter<File>, ExportError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// CSV with a header row.
pub fn write_csv(records: &[ResultRecord], path: &Path) -> Result<usize, ExportError> {
    if records.is_empty() {
        return Ok(0);
    }
    let mut wtr = csv::Writer::from_writer(create_file(path)?);
    wtr.write_record(COLUMNS)?;
    for r in records {
        wtr.write_record([&r.file, &r.field, &r.value, &r.confidence])?;
    }
    wtr.flush().map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Wrote {} rows to {}", records.len(), path.display());
    Ok(records.len())
}

/// Excel workbook with one sheet: bold frozen header, all cells as text.
pub fn write_xlsx(records: &[ResultRecord], path: &Path) -> Result<usize, ExportError> {
    if records.is_empty() {
        return Ok(0);
    }
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let header_format = Format::new().set_bold();
    let text_format = Format::new();

    for (col, header) in COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    let mut widths: Vec<usize> = COLUMNS.iter().map(|h| h.chars().count()).collect();
    for (idx, r) in records.iter().enumerate() {
        let row = (idx + 1) as u32;
        for (col, cell) in [&r.file, &r.field, &r.value, &r.confidence]
            .into_iter()
            .enumerate()
        {
            let text = truncate_cell(cell);
            widths[col] = widths[col].max(text.chars().count());
            worksheet.write_string_with_format(row, col as u16, &text, &text_format)?;
        }
    }

    for (col, w) in widths.iter().enumerate() {
        let width = (*w).min(XLSX_MAX_COLUMN_WIDTH) + 2;
        worksheet.set_column_width(col as u16, width as f64)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    workbook.save(path)?;
    info!("Wrote {} rows to {}", records.len(), path.display());
    Ok(records.len())
}

fn truncate_cell(value: &str) -> String {
    if value.chars().count() <= XLSX_MAX_CELL_CHARS {
        value.to_string()
    } else {
        value.chars().take(XLSX_MAX_CELL_CHARS).collect()
    }
}

/// Pretty JSON array of `{File, field, value, confidence}` objects,
/// 4-space indent, non-ASCII written as-is.
pub fn write_json(records: &[ResultRecord], path: &Path) -> Result<usize, ExportError> {
    if records.is_empty() {
        return Ok(0);
    }
    let mut out = create_file(path)?;
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    records.serialize(&mut ser)?;
    out.flush().map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Wrote {} rows to {}", records.len(), path.display());
    Ok(records.len())
}

/// Append to the `invoices` table of a SQLite database, in one transaction.
pub fn write_sqlite(records: &[ResultRecord], path: &Path) -> Result<usize, ExportError> {
    if records.is_empty() {
        return Ok(0);
    }
    let mut conn = Connection::open(path)?;
    conn.execute(CREATE_TABLE_SQL, [])?;

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO invoices (filename, field, value, confidence) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for r in records {
            stmt.execute(params![r.file, r.field, r.value, r.confidence])?;
        }
    }
    tx.commit()?;
    info!("Wrote {} rows to {}", records.len(), path.display());
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<ResultRecord> {
        vec![
            ResultRecord {
                file: "a.pdf".into(),
                field: "invoice_number".into(),
                value: "123".into(),
                confidence: "ai".into(),
            },
            ResultRecord {
                file: "a.pdf".into(),
                field: "vendor".into(),
                value: "Müller, \"GmbH\"".into(),
                confidence: "ai".into(),
            },
        ]
    }

    #[test]
    fn empty_input_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        assert_eq!(write_csv(&[], &path).unwrap(), 0);
        assert_eq!(write_json(&[], &path).unwrap(), 0);
        assert_eq!(write_xlsx(&[], &path).unwrap(), 0);
        assert_eq!(write_sqlite(&[], &path).unwrap(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn csv_round_trips_quoted_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        assert_eq!(write_csv(&records(), &path).unwrap(), 2);

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = rdr.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, COLUMNS);
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[1][2], "Müller, \"GmbH\"");
    }

    #[test]
    fn json_is_indented_and_keeps_unicode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_json(&records(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Müller"));
        assert!(text.contains("\n        \"File\": \"a.pdf\""));
        let back: Vec<ResultRecord> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, records());
    }

    #[test]
    fn sqlite_appends_across_exports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.db");
        write_sqlite(&records(), &path).unwrap();
        write_sqlite(&records(), &path).unwrap();

        let conn = Connection::open(&path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM invoices", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 4);
        let value: String = conn
            .query_row(
                "SELECT value FROM invoices WHERE field = 'vendor' LIMIT 1",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(value, "Müller, \"GmbH\"");
    }

    #[test]
    fn xlsx_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        assert_eq!(write_xlsx(&records(), &path).unwrap(), 2);
        let bytes = std::fs::read(&path).unwrap();
        // xlsx is a zip container
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn long_cells_are_truncated() {
        let long = "x".repeat(XLSX_MAX_CELL_CHARS + 10);
        assert_eq!(truncate_cell(&long).len(), XLSX_MAX_CELL_CHARS);
        assert_eq!(truncate_cell("short"), "short");
    }
}
