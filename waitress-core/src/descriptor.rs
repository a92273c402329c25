//! Remote Action JSON descriptors: recursive discovery, field extraction and
//! platform classification.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::catalog::CatalogError;

/// Platform support of a Remote Action, derived from its `scriptInfo` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RaType {
    Windows,
    #[serde(rename = "macOS")]
    MacOs,
    Combined,
    /// Neither platform script present (or no `scriptInfo` at all).
    #[serde(rename = "")]
    Unknown,
}

impl RaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RaType::Windows => "Windows",
            RaType::MacOs => "macOS",
            RaType::Combined => "Combined",
            RaType::Unknown => "",
        }
    }
}

impl fmt::Display for RaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata extracted from one descriptor file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptorRecord {
    pub name: String,
    pub description: Option<String>,
    pub purpose: Option<String>,
    pub ra_type: RaType,
    pub path: PathBuf,
}

/// Python-style truthiness: null, false, 0, "" and empty containers are all "absent".
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(true, |f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

fn is_missing(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

/// Classify a descriptor by which platform scripts its `scriptInfo` carries.
///
/// A platform counts as supported only when its script field is truthy. A falsy but
/// non-null field on one side (e.g. `"scriptMacOs": ""`) does not count as "absent",
/// so such descriptors classify as [`RaType::Unknown`].
pub fn classify(descriptor: &Value) -> RaType {
    let script_info = descriptor.get("scriptInfo");
    if !is_truthy(script_info) {
        error!("[CATALOG] No scriptInfo field found in the JSON file");
        return RaType::Unknown;
    }
    let windows = script_info.and_then(|s| s.get("scriptWindows"));
    let macos = script_info.and_then(|s| s.get("scriptMacOs"));

    if is_truthy(windows) && is_truthy(macos) {
        RaType::Combined
    } else if is_truthy(windows) && is_missing(macos) {
        RaType::Windows
    } else if is_missing(windows) && is_truthy(macos) {
        RaType::MacOs
    } else {
        let name = descriptor.get("name").and_then(Value::as_str).unwrap_or("<unnamed>");
        error!(name, "[CATALOG] No info found on the OS compatible for Remote Action");
        RaType::Unknown
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Read one descriptor file. Returns `None` (after logging) when the file cannot be
/// read, is not valid JSON, or has no `name`.
pub fn read_descriptor(path: &Path) -> Option<DescriptorRecord> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, path = %path.display(), "[CATALOG] Failed to read descriptor file");
            return None;
        }
    };
    let json: Value = match serde_json::from_str(&content) {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, path = %path.display(), "[CATALOG] Descriptor is not valid JSON");
            return None;
        }
    };
    let Some(name) = string_field(&json, "name") else {
        error!(path = %path.display(), "[CATALOG] Descriptor has no name");
        return None;
    };

    let record = DescriptorRecord {
        description: string_field(&json, "description"),
        purpose: string_field(&json, "purpose"),
        ra_type: classify(&json),
        path: path.to_path_buf(),
        name,
    };
    debug!(name = %record.name, ra_type = %record.ra_type, "[CATALOG] JSON file parsed with success");
    Some(record)
}

/// Walk `root` recursively and extract every `*.json` descriptor.
///
/// Fails with [`CatalogError::MissingFolder`] if `root` does not exist and with
/// [`CatalogError::NoDescriptors`] if no descriptor could be extracted at all.
/// Individual unreadable files are logged and skipped.
pub fn parse_folder(root: &Path) -> Result<Vec<DescriptorRecord>, CatalogError> {
    info!(path = %root.display(), "[CATALOG] Parsing Remote Action JSON folder");
    if !root.exists() {
        error!(path = %root.display(), "[CATALOG] JSON folder does not exist");
        return Err(CatalogError::MissingFolder(root.to_path_buf()));
    }

    let mut records = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            error!(error = %e, "[CATALOG] Failed to walk JSON folder");
            CatalogError::Walk(e)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_json = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(".json"));
        if !is_json {
            continue;
        }
        match read_descriptor(entry.path()) {
            Some(record) => records.push(record),
            None => warn!(path = %entry.path().display(), "[CATALOG] Couldn't extract metadata from JSON file"),
        }
    }

    if records.is_empty() {
        warn!(path = %root.display(), "[CATALOG] No JSON files found in the specified location");
        return Err(CatalogError::NoDescriptors(root.to_path_buf()));
    }
    info!(count = records.len(), "[CATALOG] Parsed Remote Action descriptors");
    Ok(records)
}
