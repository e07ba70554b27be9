use crate::error::Error;
use crate::table::Table;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

/// Column never emitted in CSV reports.
const EXCLUDED_COLUMN: &str = "id";

/// Renders a table as CSV: a header row, then one line per row.
/// Missing cells become empty fields.
pub fn to_csv(table: &Table) -> Result<String, Error> {
    let table = table.without_column(EXCLUDED_COLUMN);
    if table.columns().is_empty() {
        return Ok(String::new());
    }

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(table.column_names())?;
    for row in table.rows() {
        wtr.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    wtr.flush()?;

    let bytes = wtr
        .into_inner()
        .map_err(|err| Error::Io(err.into_error()))?;
    String::from_utf8(bytes).map_err(|err| Error::Io(std::io::Error::other(err)))
}

/// Writes `csv` to `<output_dir>/<timestamp>_<name>.csv`, creating the
/// directory when needed, and returns the path written.
pub fn persist(output_dir: &Path, name: &str, csv: &str) -> Result<PathBuf, Error> {
    fs::create_dir_all(output_dir)?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = output_dir.join(format!("{}_{}.csv", timestamp, file_safe(name)));
    fs::write(&path, csv)?;

    Ok(path)
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
