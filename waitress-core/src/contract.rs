//! # contract: the CRM record store seam
//!
//! This module defines the [`RecordStore`] trait and the plain data types exchanged with
//! the CRM object store that hosts the Remote Action library.
//!
//! - The production implementation (OAuth + REST) lives in the `waitress` binary crate.
//! - The trait is annotated for `mockall`, so the synchronise pipeline can be tested
//!   against a [`MockRecordStore`] without a live org.
//! - Request payloads serialize straight to the CRM's field names.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::catalog::JoinedRecord;

/// A Remote Action record as stored in the CRM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "LastModifiedDate", default)]
    pub last_modified_date: Option<String>,
    #[serde(rename = "Description__c", default)]
    pub description: Option<String>,
    #[serde(rename = "Category__c", default)]
    pub category: Option<String>,
    #[serde(rename = "OS__c", default)]
    pub os: Option<String>,
    #[serde(rename = "Details_URL__c", default)]
    pub details: Option<String>,
}

impl RemoteRecord {
    /// A listed record whose fields could not be fetched. Bulk deletes still cover it;
    /// name-based replacement cannot.
    pub fn id_only(id: &str) -> Self {
        RemoteRecord {
            id: id.to_owned(),
            name: None,
            last_modified_date: None,
            description: None,
            category: None,
            os: None,
            details: None,
        }
    }
}

/// Payload creating one Remote Action record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRecord {
    #[serde(rename = "Category__c")]
    pub category: String,
    #[serde(rename = "Description__c")]
    pub description: Option<String>,
    #[serde(rename = "Details_URL__c")]
    pub details_url: Option<String>,
    #[serde(rename = "OS__c")]
    pub os: Option<String>,
    #[serde(rename = "Name")]
    pub name: String,
}

impl NewRecord {
    /// Map a catalog row to a create payload. `None` when the category is missing.
    pub fn from_row(row: &JoinedRecord) -> Option<Self> {
        if row.name.trim().is_empty() {
            return None;
        }
        Some(NewRecord {
            category: row.category.clone()?,
            description: row.description.clone(),
            details_url: row.doc.clone(),
            os: row.ra_type.map(|t| t.as_str().to_owned()),
            name: row.name.clone(),
        })
    }
}

/// A file version upload: the descriptor file, base64 encoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    #[serde(rename = "VersionData")]
    pub version_data: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "PathOnClient")]
    pub path_on_client: String,
}

impl Attachment {
    pub fn new(file_name: &str, content: &[u8]) -> Self {
        Attachment {
            version_data: STANDARD.encode(content),
            title: file_name.to_owned(),
            path_on_client: file_name.to_owned(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(&file_name, &content))
    }

    /// Build the upload for a catalog row from its descriptor path.
    pub fn from_row(row: &JoinedRecord) -> Result<Self, StoreError> {
        let path = row.path.as_deref().ok_or(StoreError::MissingField("Path"))?;
        Self::from_file(path)
    }
}

/// Outcome of a create, upload, share or per-id delete call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiResult {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<Value>,
}

impl ApiResult {
    pub fn ok(id: &str) -> Self {
        ApiResult {
            id: Some(id.to_owned()),
            success: true,
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} answered HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Operations the synchronise pipeline needs from the CRM.
///
/// Implementations are expected to be authenticated already. Every method reports a
/// failed request as `Err`; a request the server accepted but refused shows up as an
/// [`ApiResult`] with `success == false`.
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every Remote Action record currently in the library.
    async fn list_existing(&self) -> Result<Vec<RemoteRecord>, StoreError>;

    async fn create_record(&self, record: &NewRecord) -> Result<ApiResult, StoreError>;

    async fn upload_attachment(&self, attachment: &Attachment) -> Result<ApiResult, StoreError>;

    /// Share the uploaded file with everyone, linked to the created record.
    async fn grant_permission(
        &self,
        record: &ApiResult,
        upload: &ApiResult,
    ) -> Result<ApiResult, StoreError>;

    async fn delete_one(&self, id: &str) -> Result<bool, StoreError>;

    /// Delete up to [`crate::synchronise::DELETE_CHUNK_SIZE`] records in one request.
    async fn delete_batch(&self, ids: &[String]) -> Result<Vec<ApiResult>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_only_record_keeps_id_for_deletion() {
        let record = RemoteRecord::id_only("a0B001");
        assert_eq!(record.id, "a0B001");
        assert!(record.name.is_none());
    }

    fn row() -> JoinedRecord {
        JoinedRecord {
            name: "Get-Battery".into(),
            category: Some("Hardware".into()),
            internal: false,
            doc: Some("https://docs.example/get-battery".into()),
            extra: Default::default(),
            description: Some("Battery health".into()),
            purpose: None,
            ra_type: Some(crate::descriptor::RaType::Windows),
            path: None,
        }
    }

    #[test]
    fn new_record_serializes_to_crm_fields() {
        let record = NewRecord::from_row(&row()).expect("row has required fields");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["Name"], "Get-Battery");
        assert_eq!(json["Category__c"], "Hardware");
        assert_eq!(json["OS__c"], "Windows");
        assert_eq!(json["Details_URL__c"], "https://docs.example/get-battery");
        assert_eq!(json["Description__c"], "Battery health");
    }

    #[test]
    fn new_record_requires_category() {
        let mut r = row();
        r.category = None;
        assert!(NewRecord::from_row(&r).is_none());
    }

    #[test]
    fn attachment_is_base64_of_content() {
        let a = Attachment::new("Get-Battery.json", b"{\"name\":\"Get-Battery\"}");
        assert_eq!(a.version_data, "eyJuYW1lIjoiR2V0LUJhdHRlcnkifQ==");
        assert_eq!(a.title, "Get-Battery.json");
        assert_eq!(a.path_on_client, "Get-Battery.json");
    }

    #[test]
    fn attachment_without_path_is_missing_field() {
        assert!(matches!(
            Attachment::from_row(&row()),
            Err(StoreError::MissingField("Path"))
        ));
    }
}
