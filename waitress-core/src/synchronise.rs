//! High-level pipeline: reconciles the local catalog with the CRM library.
//!
//! For every publishable catalog row the pipeline walks a fixed sequence of dependent calls
//! against a [`RecordStore`]:
//!
//!   pending → created → uploaded → permitted
//!
//! Any failed or refused call ends that row at the step it reached (`failed@step`), is
//! logged, and the pipeline moves on to the next row. Nothing is retried and partial
//! progress is not rolled back, so a created record without its attachment can remain.
//!
//! Before publishing, existing library records are removed either wholesale
//! (`from_scratch`) or per name collision, keeping at most one record per name.
//!
//! # Navigation
//! - Main entrypoint: [`reconcile`]
//! - Bulk removal: [`delete_all`]
//! - Supporting types: [`SynchroniseReport`], [`DeleteSummary`]

use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, warn};

use crate::catalog::JoinedRecord;
use crate::contract::{ApiResult, Attachment, NewRecord, RecordStore, RemoteRecord, StoreError};

/// Maximum number of ids the CRM accepts in one bulk delete.
pub const DELETE_CHUNK_SIZE: usize = 200;

/// The step at which a row stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Deleting the records already published under the row's name.
    Replace,
    Create,
    Upload,
    Permission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Published,
    Failed(Step),
}

#[derive(Debug)]
pub struct RowReport {
    pub name: String,
    pub outcome: RowOutcome,
}

#[derive(Debug, Default)]
pub struct SynchroniseReport {
    /// Library records removed during the run.
    pub deleted: usize,
    pub rows: Vec<RowReport>,
}

impl SynchroniseReport {
    pub fn published(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.outcome == RowOutcome::Published)
            .count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &RowReport> {
        self.rows
            .iter()
            .filter(|r| r.outcome != RowOutcome::Published)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    pub requested: usize,
    pub deleted: usize,
    pub failed_ids: Vec<String>,
}

impl DeleteSummary {
    pub fn all_deleted(&self) -> bool {
        self.failed_ids.is_empty()
    }
}

/// Delete every record in `existing`, in chunks of [`DELETE_CHUNK_SIZE`].
///
/// A failing chunk is logged and the remaining chunks are still attempted. Ids the
/// server did not confirm as deleted end up in [`DeleteSummary::failed_ids`].
pub async fn delete_all<S>(store: &S, existing: &[RemoteRecord]) -> DeleteSummary
where
    S: RecordStore + ?Sized,
{
    let ids: Vec<String> = existing.iter().map(|r| r.id.clone()).collect();
    let mut summary = DeleteSummary {
        requested: ids.len(),
        ..Default::default()
    };
    if ids.is_empty() {
        info!("[SYNC][DELETE] No records to delete");
        return summary;
    }
    info!(count = ids.len(), "[SYNC][DELETE] Deleting all Remote Action records from the library");

    for (chunk_no, chunk) in ids.chunks(DELETE_CHUNK_SIZE).enumerate() {
        debug!(chunk_no, size = chunk.len(), "[SYNC][DELETE] Sending bulk delete");
        match store.delete_batch(chunk).await {
            Ok(results) => {
                let confirmed: HashSet<&str> = results
                    .iter()
                    .filter(|r| r.success)
                    .filter_map(|r| r.id.as_deref())
                    .collect();
                let not_deleted: Vec<String> = chunk
                    .iter()
                    .filter(|id| !confirmed.contains(id.as_str()))
                    .cloned()
                    .collect();
                summary.deleted += chunk.len() - not_deleted.len();
                if !not_deleted.is_empty() {
                    error!(chunk_no, ids = ?not_deleted, "[SYNC][DELETE] Failed to delete these items");
                }
                summary.failed_ids.extend(not_deleted);
            }
            Err(e) => {
                error!(chunk_no, error = %e, "[SYNC][DELETE] Bulk delete request failed");
                summary.failed_ids.extend(chunk.iter().cloned());
            }
        }
    }

    if summary.all_deleted() {
        info!(deleted = summary.deleted, "[SYNC][DELETE] All records were deleted from the library");
    } else {
        warn!(
            deleted = summary.deleted,
            failed = summary.failed_ids.len(),
            "[SYNC][DELETE] Some records could not be deleted"
        );
    }
    summary
}

/// Publish `rows` to the library, replacing what is already there.
///
/// With `from_scratch` the whole library is emptied first; otherwise only records
/// sharing a name with a row are deleted, right before that row is recreated.
pub async fn reconcile<S>(
    store: &S,
    rows: &[JoinedRecord],
    existing: &[RemoteRecord],
    from_scratch: bool,
) -> SynchroniseReport
where
    S: RecordStore + ?Sized,
{
    info!(rows = rows.len(), existing = existing.len(), from_scratch, "[SYNC] Starting library reconciliation");
    let mut report = SynchroniseReport::default();

    let mut published_ids: HashMap<&str, Vec<&str>> = HashMap::new();
    if from_scratch {
        let summary = delete_all(store, existing).await;
        report.deleted += summary.deleted;
        if !summary.all_deleted() {
            error!(
                failed = summary.failed_ids.len(),
                "[SYNC][ERROR] Library could not be emptied completely, publishing anyway"
            );
        }
    } else {
        for record in existing {
            if let Some(name) = record.name.as_deref() {
                published_ids.entry(name).or_default().push(record.id.as_str());
            }
        }
    }

    for row in rows {
        let stale = published_ids.remove(row.name.as_str()).unwrap_or_default();
        let outcome = match replace(store, &row.name, &stale).await {
            Ok(deleted) => {
                report.deleted += deleted;
                match publish_row(store, row).await {
                    Ok(()) => RowOutcome::Published,
                    Err(step) => RowOutcome::Failed(step),
                }
            }
            Err(step) => RowOutcome::Failed(step),
        };
        report.rows.push(RowReport {
            name: row.name.clone(),
            outcome,
        });
    }

    info!(
        published = report.published(),
        failed = report.rows.len() - report.published(),
        deleted = report.deleted,
        "[SYNC] Reconciliation finished"
    );
    report
}

/// Delete the library records already published under `name`.
async fn replace<S>(store: &S, name: &str, ids: &[&str]) -> Result<usize, Step>
where
    S: RecordStore + ?Sized,
{
    for id in ids {
        match store.delete_one(id).await {
            Ok(true) => debug!(name, id, "[SYNC] Deleted existing record"),
            Ok(false) => {
                error!(name, id, "[SYNC][ERROR] Existing record was not deleted, skipping row");
                return Err(Step::Replace);
            }
            Err(e) => {
                error!(name, id, error = %e, "[SYNC][ERROR] Deleting existing record failed, skipping row");
                return Err(Step::Replace);
            }
        }
    }
    if !ids.is_empty() {
        info!(name, count = ids.len(), "[SYNC] Removed existing records before recreating");
    }
    Ok(ids.len())
}

fn accepted(
    step: Step,
    name: &str,
    result: Result<ApiResult, StoreError>,
) -> Result<ApiResult, Step> {
    match result {
        Ok(ack) if ack.success => Ok(ack),
        Ok(ack) => {
            info!(name, ?step, errors = ?ack.errors, "[SYNC] Request refused by the library");
            Err(step)
        }
        Err(e) => {
            error!(name, ?step, error = %e, "[SYNC][ERROR] Request failed");
            Err(step)
        }
    }
}

async fn publish_row<S>(store: &S, row: &JoinedRecord) -> Result<(), Step>
where
    S: RecordStore + ?Sized,
{
    let name = row.name.as_str();

    let Some(record) = NewRecord::from_row(row) else {
        info!(name, "[SYNC] Cannot create record: required fields missing");
        return Err(Step::Create);
    };
    let created = accepted(Step::Create, name, store.create_record(&record).await)?;
    debug!(name, id = ?created.id, "[SYNC] Record created with success");

    let attachment = Attachment::from_row(row).map_err(|e| {
        info!(name, error = %e, "[SYNC] Cannot upload file");
        Step::Upload
    })?;
    let uploaded = accepted(Step::Upload, name, store.upload_attachment(&attachment).await)?;
    debug!(name, id = ?uploaded.id, "[SYNC] Remote Action file successfully uploaded");

    accepted(
        Step::Permission,
        name,
        store.grant_permission(&created, &uploaded).await,
    )?;
    info!(name, "[SYNC] Remote Action was loaded to the library successfully");
    Ok(())
}
