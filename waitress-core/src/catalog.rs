//! Joining the category workbook with parsed descriptors into the publishable catalog.
//!
//! The category workbook is the source of truth: every category row survives the join,
//! descriptors only contribute their path, platform type, description and purpose
//! where a name matches.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info};

use crate::categories::CategoryRecord;
use crate::descriptor::{DescriptorRecord, RaType};

/// Errors raised while building the local catalog. All of them are fatal for a run;
/// [`CatalogError::NoDescriptors`] is the one "nothing to do" case.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("JSON folder {0} does not exist")]
    MissingFolder(PathBuf),

    #[error("no Remote Action JSON files found in {0}")]
    NoDescriptors(PathBuf),

    #[error("failed to walk JSON folder: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("couldn't load category workbook {path}: {message}")]
    Workbook { path: PathBuf, message: String },

    #[error("category sheet has no '{0}' column")]
    MissingColumn(&'static str),

    #[error("cannot join catalog: {0} table is empty")]
    EmptyInput(&'static str),
}

/// A category row enriched with its descriptor (if any).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedRecord {
    pub name: String,
    pub category: Option<String>,
    pub internal: bool,
    pub doc: Option<String>,
    pub extra: BTreeMap<String, String>,
    pub description: Option<String>,
    pub purpose: Option<String>,
    pub ra_type: Option<RaType>,
    pub path: Option<PathBuf>,
}

impl JoinedRecord {
    fn from_parts(category: &CategoryRecord, descriptor: Option<&DescriptorRecord>) -> Self {
        JoinedRecord {
            name: category.name.clone(),
            category: category.category.clone(),
            internal: category.internal,
            doc: category.doc.clone(),
            extra: category.extra.clone(),
            description: descriptor.and_then(|d| d.description.clone()),
            purpose: descriptor.and_then(|d| d.purpose.clone()),
            ra_type: descriptor.map(|d| d.ra_type),
            path: descriptor.map(|d| d.path.clone()),
        }
    }
}

/// Left join `categories` with `descriptors` on name.
///
/// Each category row yields one output row per matching descriptor, or a single row
/// with empty descriptor fields when nothing matches. Category order is preserved.
pub fn join_all(
    categories: &[CategoryRecord],
    descriptors: &[DescriptorRecord],
) -> Result<Vec<JoinedRecord>, CatalogError> {
    if categories.is_empty() {
        error!("[CATALOG] Cannot build full catalog: category table is empty");
        return Err(CatalogError::EmptyInput("category"));
    }
    if descriptors.is_empty() {
        error!("[CATALOG] Cannot build full catalog: descriptor table is empty");
        return Err(CatalogError::EmptyInput("descriptor"));
    }

    let mut by_name: HashMap<&str, Vec<&DescriptorRecord>> = HashMap::new();
    for d in descriptors {
        by_name.entry(d.name.as_str()).or_default().push(d);
    }

    let mut joined = Vec::with_capacity(categories.len());
    for category in categories {
        match by_name.get(category.name.as_str()) {
            Some(matches) => joined.extend(
                matches
                    .iter()
                    .map(|d| JoinedRecord::from_parts(category, Some(*d))),
            ),
            None => joined.push(JoinedRecord::from_parts(category, None)),
        }
    }
    info!(rows = joined.len(), "[CATALOG] Merge between metadata and JSON data successful");
    Ok(joined)
}

/// Rows that may be published (everything not flagged internal).
pub fn publishable(joined: &[JoinedRecord]) -> Vec<JoinedRecord> {
    joined.iter().filter(|r| !r.internal).cloned().collect()
}

/// Names present on only one side of the descriptor/category pairing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogDiff {
    /// Descriptors with no category row yet.
    pub only_in_descriptors: Vec<String>,
    /// Category rows with no descriptor file.
    pub only_in_categories: Vec<String>,
}

impl CatalogDiff {
    pub fn is_empty(&self) -> bool {
        self.only_in_descriptors.is_empty() && self.only_in_categories.is_empty()
    }

    /// The symmetric difference as one sorted name list.
    pub fn names(&self) -> Vec<String> {
        let mut all: Vec<String> = self
            .only_in_descriptors
            .iter()
            .chain(&self.only_in_categories)
            .cloned()
            .collect();
        all.sort();
        all
    }

    pub fn entries(&self) -> Vec<DiffEntry> {
        let descriptors = self.only_in_descriptors.iter().map(|name| DiffEntry {
            name: name.clone(),
            found_in: "json",
        });
        let categories = self.only_in_categories.iter().map(|name| DiffEntry {
            name: name.clone(),
            found_in: "categories",
        });
        descriptors.chain(categories).collect()
    }
}

/// One name of a [`CatalogDiff`], tagged with the only side it was found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub name: String,
    pub found_in: &'static str,
}

pub fn diff(descriptors: &[DescriptorRecord], categories: &[CategoryRecord]) -> CatalogDiff {
    let parsed: BTreeSet<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();
    let listed: BTreeSet<&str> = categories.iter().map(|c| c.name.as_str()).collect();
    CatalogDiff {
        only_in_descriptors: parsed.difference(&listed).map(|s| s.to_string()).collect(),
        only_in_categories: listed.difference(&parsed).map(|s| s.to_string()).collect(),
    }
}
