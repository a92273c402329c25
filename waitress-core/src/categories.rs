//! Category workbook loading.
//!
//! The first worksheet is read; its first non-blank row is the header. Columns are
//! located by header name, so a leading index column (as written by spreadsheet
//! exporters) or any additional taxonomy columns are tolerated. Unknown named
//! columns are kept verbatim in [`CategoryRecord::extra`].

use calamine::{open_workbook_auto, Data, Reader};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::catalog::CatalogError;

const NAME: &str = "Name";
const CATEGORY: &str = "Category";
const INTERNAL: &str = "Internal";
const DOC: &str = "Doc";

/// One row of the category workbook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRecord {
    pub name: String,
    pub category: Option<String>,
    /// Internal entries are never published to the library.
    pub internal: bool,
    /// Documentation URL shown as the record's details link.
    pub doc: Option<String>,
    pub extra: BTreeMap<String, String>,
}

fn cell_text(cell: &Data) -> Option<String> {
    let text = cell.to_string();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_owned())
}

/// Interpret an `Internal` cell. Blank or unrecognised values count as internal so
/// that a row is only published when it is explicitly marked public.
fn cell_flag(cell: &Data) -> bool {
    match cell {
        Data::Bool(b) => *b,
        Data::Int(i) => *i != 0,
        Data::Float(f) => *f != 0.0,
        Data::String(s) => !matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "false" | "no" | "n" | "0"
        ),
        _ => true,
    }
}

struct Columns {
    name: usize,
    category: usize,
    internal: usize,
    doc: Option<usize>,
    extra: Vec<(usize, String)>,
}

impl Columns {
    fn locate(header: &[Data]) -> Result<Self, CatalogError> {
        let labels: Vec<Option<String>> = header.iter().map(cell_text).collect();
        let find = |wanted: &str| labels.iter().position(|l| l.as_deref() == Some(wanted));
        let require = |wanted: &'static str| {
            find(wanted).ok_or_else(|| {
                error!(column = wanted, "[CATALOG] Category sheet is missing a required column");
                CatalogError::MissingColumn(wanted)
            })
        };

        let extra = labels
            .iter()
            .enumerate()
            .filter_map(|(idx, label)| match label.as_deref() {
                Some(NAME | CATEGORY | INTERNAL | DOC) | None => None,
                Some(other) => Some((idx, other.to_owned())),
            })
            .collect();

        Ok(Columns {
            name: require(NAME)?,
            category: require(CATEGORY)?,
            internal: require(INTERNAL)?,
            doc: find(DOC),
            extra,
        })
    }
}

/// Load the category workbook at `path`.
pub fn load_categories(path: &Path) -> Result<Vec<CategoryRecord>, CatalogError> {
    info!(path = %path.display(), "[CATALOG] Loading Remote Action categories");
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        error!(error = %e, path = %path.display(), "[CATALOG] Couldn't open category workbook");
        CatalogError::Workbook {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        error!(path = %path.display(), "[CATALOG] Category workbook has no worksheet");
        return Err(CatalogError::Workbook {
            path: path.to_path_buf(),
            message: "workbook has no worksheet".into(),
        });
    };
    let range = workbook.worksheet_range(&sheet).map_err(|e| {
        error!(error = %e, sheet = %sheet, "[CATALOG] Couldn't read category worksheet");
        CatalogError::Workbook {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    let mut rows = range
        .rows()
        .skip_while(|row| row.iter().all(|c| cell_text(c).is_none()));
    let header = rows.next().ok_or(CatalogError::MissingColumn(NAME))?;
    let columns = Columns::locate(header)?;

    let mut records = Vec::new();
    for (idx, row) in rows.enumerate() {
        let cell = |i: usize| row.get(i).unwrap_or(&Data::Empty);
        let Some(name) = cell_text(cell(columns.name)) else {
            debug!(row = idx + 2, "[CATALOG] Skipping category row without a name");
            continue;
        };
        let extra = columns
            .extra
            .iter()
            .filter_map(|(i, label)| cell_text(cell(*i)).map(|v| (label.clone(), v)))
            .collect();
        records.push(CategoryRecord {
            name,
            category: cell_text(cell(columns.category)),
            internal: cell_flag(cell(columns.internal)),
            doc: columns.doc.and_then(|i| cell_text(cell(i))),
            extra,
        });
    }

    if records.is_empty() {
        warn!(path = %path.display(), "[CATALOG] Category workbook holds no entries");
    }
    info!(count = records.len(), path = %path.display(), "[CATALOG] Categories successfully loaded");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_flag_parsing() {
        assert!(!cell_flag(&Data::Bool(false)));
        assert!(cell_flag(&Data::Bool(true)));
        assert!(!cell_flag(&Data::Float(0.0)));
        assert!(cell_flag(&Data::Int(1)));
        assert!(!cell_flag(&Data::String(" FALSE ".into())));
        assert!(cell_flag(&Data::String("yes".into())));
        assert!(cell_flag(&Data::Empty));
    }

    #[test]
    fn header_requires_name_category_internal() {
        let header = vec![
            Data::Empty,
            Data::String("Name".into()),
            Data::String("Category".into()),
            Data::String("Internal".into()),
            Data::String("Owner".into()),
        ];
        let cols = Columns::locate(&header).expect("header should resolve");
        assert_eq!(cols.name, 1);
        assert_eq!(cols.doc, None);
        assert_eq!(cols.extra, vec![(4, "Owner".to_string())]);

        let missing = vec![Data::String("Name".into()), Data::String("Category".into())];
        assert!(matches!(
            Columns::locate(&missing),
            Err(CatalogError::MissingColumn("Internal"))
        ));
    }
}
