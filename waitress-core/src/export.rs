//! Timestamped spreadsheet exports of catalog and library tables.

use chrono::{DateTime, Local};
use rust_xlsxwriter::{Workbook, XlsxError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

use crate::catalog::{DiffEntry, JoinedRecord};
use crate::categories::CategoryRecord;
use crate::contract::RemoteRecord;

pub const SHEET_NAME: &str = "all_remote_actions";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] XlsxError),
}

pub enum Cell {
    Text(String),
    Flag(bool),
    Blank,
}

impl From<Option<&str>> for Cell {
    fn from(value: Option<&str>) -> Self {
        value.map_or(Cell::Blank, |v| Cell::Text(v.to_owned()))
    }
}

/// A record that can be written as one spreadsheet row.
pub trait TableRow {
    fn headers() -> &'static [&'static str];
    fn cells(&self) -> Vec<Cell>;
}

impl TableRow for JoinedRecord {
    fn headers() -> &'static [&'static str] {
        &["Name", "Category", "Internal", "Doc", "Description", "Purpose", "Type", "Path"]
    }

    fn cells(&self) -> Vec<Cell> {
        let path = self.path.as_ref().map(|p| p.display().to_string());
        vec![
            Cell::Text(self.name.clone()),
            self.category.as_deref().into(),
            Cell::Flag(self.internal),
            self.doc.as_deref().into(),
            self.description.as_deref().into(),
            self.purpose.as_deref().into(),
            self.ra_type.map(|t| t.as_str()).into(),
            path.as_deref().into(),
        ]
    }
}

impl TableRow for CategoryRecord {
    fn headers() -> &'static [&'static str] {
        &["Name", "Category", "Internal", "Doc"]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.name.clone()),
            self.category.as_deref().into(),
            Cell::Flag(self.internal),
            self.doc.as_deref().into(),
        ]
    }
}

impl TableRow for RemoteRecord {
    fn headers() -> &'static [&'static str] {
        &["Id", "Name", "LastModifiedDate", "Description", "Category", "OS", "Details"]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.id.clone()),
            self.name.as_deref().into(),
            self.last_modified_date.as_deref().into(),
            self.description.as_deref().into(),
            self.category.as_deref().into(),
            self.os.as_deref().into(),
            self.details.as_deref().into(),
        ]
    }
}

impl TableRow for DiffEntry {
    fn headers() -> &'static [&'static str] {
        &["Name", "FoundIn"]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.name.clone()),
            Cell::Text(self.found_in.to_string()),
        ]
    }
}

/// `MM-DD-YYYY-HH-MM-SS`, used in export and log file names.
pub fn file_timestamp(now: DateTime<Local>) -> String {
    now.format("%m-%d-%Y-%H-%M-%S").to_string()
}

/// Write `rows` to `<dir>/<name>_<timestamp>.xlsx` and return the file path.
pub fn export_to_spreadsheet<T: TableRow>(
    rows: &[T],
    dir: &Path,
    name: &str,
) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(format!("{name}_{}.xlsx", file_timestamp(Local::now())));

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, header) in T::headers().iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }
    for (idx, row) in rows.iter().enumerate() {
        let line = idx as u32 + 1;
        for (col, cell) in row.cells().into_iter().enumerate() {
            match cell {
                Cell::Text(text) => worksheet.write_string(line, col as u16, text)?,
                Cell::Flag(flag) => worksheet.write_boolean(line, col as u16, flag)?,
                Cell::Blank => continue,
            };
        }
    }

    if let Err(e) = workbook.save(&path) {
        error!(error = %e, path = %path.display(), "Cannot write spreadsheet export");
        return Err(e.into());
    }
    info!(rows = rows.len(), path = %path.display(), "Exported table to spreadsheet");
    Ok(path)
}
