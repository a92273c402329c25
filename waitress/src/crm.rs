//! # CRM client
//!
//! Concrete [`RecordStore`] over the CRM REST API, used by the CLI for every networked call.
//!
//! - Construct with [`CrmClient::authenticate`] (OAuth2 resource-owner-password grant).
//! - The bearer token and JSON headers are built once and sent with every request.
//! - Transport, status and decoding failures surface as [`StoreError`]; a request the
//!   server accepted but refused comes back as an [`ApiResult`] with `success == false`.
//!
//! For the trait contract and payload types see `waitress_core::contract`.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use waitress_core::config::{Credentials, Endpoints};
use waitress_core::contract::{
    ApiResult, Attachment, NewRecord, RecordStore, RemoteRecord, StoreError,
};

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct QueryPage {
    #[serde(rename = "totalSize", default)]
    total_size: u64,
    #[serde(default = "query_done_default")]
    done: bool,
    #[serde(default)]
    records: Vec<RecordRef>,
    #[serde(rename = "nextRecordsUrl", default)]
    next_records_url: Option<String>,
}

fn query_done_default() -> bool {
    true
}

#[derive(Deserialize)]
struct RecordRef {
    #[serde(rename = "Id")]
    id: String,
}

#[derive(Deserialize)]
struct ContentDocumentLookup {
    #[serde(default)]
    records: Vec<ContentDocumentRef>,
}

#[derive(Deserialize)]
struct ContentDocumentRef {
    #[serde(rename = "ContentDocumentId")]
    content_document_id: Option<String>,
}

/// Sharing link making a file visible to all users from the linked record.
#[derive(Debug, Serialize, PartialEq)]
struct ShareLink<'a> {
    #[serde(rename = "ContentDocumentId")]
    content_document_id: &'a str,
    #[serde(rename = "ShareType")]
    share_type: &'a str,
    #[serde(rename = "Visibility")]
    visibility: &'a str,
    #[serde(rename = "LinkedEntityId")]
    linked_entity_id: &'a str,
}

impl<'a> ShareLink<'a> {
    fn view_for_all(content_document_id: &'a str, linked_entity_id: &'a str) -> Self {
        ShareLink {
            content_document_id,
            share_type: "V",
            visibility: "AllUsers",
            linked_entity_id,
        }
    }
}

fn content_doc_url(template: &str, version_id: &str) -> String {
    template.replacen("{}", version_id, 1)
}

fn bulk_delete_url(prefix: &str, ids: &[String]) -> String {
    format!("{prefix}{}&allOrNone=false", ids.join(","))
}

pub struct CrmClient {
    http: Client,
    endpoints: Endpoints,
    headers: HeaderMap,
}

impl CrmClient {
    /// Exchange the credentials for a bearer token and build an authorised client.
    pub async fn authenticate(
        endpoints: Endpoints,
        credentials: &Credentials,
    ) -> Result<Self, StoreError> {
        let http = Client::new();
        let url = endpoints.url_oauth_token.clone();
        info!(url = %url, client_id = %credentials.client_id, "[CRM] Requesting bearer token");

        let form = [
            ("grant_type", credentials.grant_type.as_str()),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ];
        let response = http.post(&url).form(&form).send().await.map_err(|e| {
            error!(error = %e, "[CRM] Cannot retrieve token");
            StoreError::Auth(e.to_string())
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "[CRM] Token request was rejected");
            return Err(StoreError::Auth(format!("HTTP {status}: {body}")));
        }
        let token: TokenResponse = response.json().await.map_err(|e| {
            error!(error = %e, "[CRM] Token response has no access_token");
            StoreError::Auth(format!("malformed token response: {e}"))
        })?;
        debug!("[CRM] Bearer token retrieved");

        Self::from_parts(http, endpoints, &token.access_token)
    }

    /// Build a client around an already issued bearer token.
    pub fn with_token(endpoints: Endpoints, token: &str) -> Result<Self, StoreError> {
        Self::from_parts(Client::new(), endpoints, token)
    }

    fn from_parts(http: Client, endpoints: Endpoints, token: &str) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| StoreError::Auth(format!("token is not a valid header value: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        debug!("[CRM] Header updated with bearer token and content type");
        Ok(CrmClient {
            http,
            endpoints,
            headers,
        })
    }

    async fn send<B>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, StoreError>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self
            .http
            .request(method.clone(), url)
            .headers(self.headers.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|e| {
            error!(%method, url, error = %e, "[CRM] Request failed");
            StoreError::Transport {
                url: url.to_owned(),
                message: e.to_string(),
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%method, url, status = status.as_u16(), body = %body, "[CRM] Request returned an error status");
            return Err(StoreError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
                body,
            });
        }
        debug!(%method, url, "[CRM] Request successfully executed");
        Ok(response)
    }

    async fn send_json<B, T>(&self, method: Method, url: &str, body: Option<&B>) -> Result<T, StoreError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(method, url, body).await?;
        response.json::<T>().await.map_err(|e| {
            error!(url, error = %e, "[CRM] Response is not the expected JSON");
            StoreError::Decode {
                url: url.to_owned(),
                message: e.to_string(),
            }
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, StoreError> {
        self.send_json::<(), T>(Method::GET, url, None).await
    }

    async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, StoreError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::POST, url, Some(body)).await
    }

    /// Resolve a `nextRecordsUrl` (a server-relative path) against the query endpoint.
    fn next_page_url(&self, next: &str) -> Result<String, StoreError> {
        let base = Url::parse(&self.endpoints.url_query_all).map_err(|e| StoreError::Decode {
            url: self.endpoints.url_query_all.clone(),
            message: format!("query url is not absolute: {e}"),
        })?;
        base.join(next).map(String::from).map_err(|e| StoreError::Decode {
            url: next.to_owned(),
            message: e.to_string(),
        })
    }

    async fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        let mut url = self.endpoints.url_query_all.clone();
        loop {
            let page: QueryPage = self.get_json(&url).await?;
            debug!(total = page.total_size, page = page.records.len(), "[CRM] Fetched query page");
            ids.extend(page.records.into_iter().map(|r| r.id));
            match (page.done, page.next_records_url) {
                (false, Some(next)) => url = self.next_page_url(&next)?,
                _ => break,
            }
        }
        Ok(ids)
    }
}

#[async_trait]
impl RecordStore for CrmClient {
    async fn list_existing(&self) -> Result<Vec<RemoteRecord>, StoreError> {
        let ids = self.list_ids().await?;
        if ids.is_empty() {
            info!("[CRM] No records found. Remote Action library is empty");
            return Ok(Vec::new());
        }

        let mut records = Vec::with_capacity(ids.len());
        let mut unfetched = 0usize;
        for id in &ids {
            let url = format!("{}{}", self.endpoints.url_to_record, id);
            match self.get_json::<RemoteRecord>(&url).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(id = %id, error = %e, "[CRM] Record could not be fetched, keeping its Id only");
                    unfetched += 1;
                    records.push(RemoteRecord::id_only(id));
                }
            }
        }
        info!(count = records.len(), unfetched, "[CRM] Fetched existing library records");
        Ok(records)
    }

    async fn create_record(&self, record: &NewRecord) -> Result<ApiResult, StoreError> {
        debug!(name = %record.name, "[CRM] Creating record");
        self.post_json(&self.endpoints.url_to_record, record).await
    }

    async fn upload_attachment(&self, attachment: &Attachment) -> Result<ApiResult, StoreError> {
        debug!(title = %attachment.title, "[CRM] Uploading file");
        self.post_json(&self.endpoints.url_file_upload, attachment).await
    }

    async fn grant_permission(
        &self,
        record: &ApiResult,
        upload: &ApiResult,
    ) -> Result<ApiResult, StoreError> {
        let record_id = record.id.as_deref().ok_or(StoreError::MissingField("id"))?;
        let version_id = upload.id.as_deref().ok_or(StoreError::MissingField("id"))?;
        debug!(record_id, version_id, "[CRM] Granting file the view permissions");

        let lookup_url = content_doc_url(&self.endpoints.url_content_doc_id, version_id);
        let lookup: ContentDocumentLookup = self.get_json(&lookup_url).await?;
        let content_document_id = lookup
            .records
            .into_iter()
            .next()
            .and_then(|r| r.content_document_id)
            .ok_or_else(|| StoreError::Decode {
                url: lookup_url.clone(),
                message: "no ContentDocumentId for uploaded file".into(),
            })?;

        let link = ShareLink::view_for_all(&content_document_id, record_id);
        self.post_json(&self.endpoints.url_grant_permission, &link).await
    }

    async fn delete_one(&self, id: &str) -> Result<bool, StoreError> {
        let url = format!("{}{}", self.endpoints.url_delete_one, id);
        match self.send::<()>(Method::DELETE, &url, None).await {
            Ok(_) => {
                debug!(id, "[CRM] Deleted record");
                Ok(true)
            }
            Err(StoreError::Status { status, .. }) => {
                warn!(id, status, "[CRM] Record was not deleted");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_batch(&self, ids: &[String]) -> Result<Vec<ApiResult>, StoreError> {
        let url = bulk_delete_url(&self.endpoints.url_delete_all, ids);
        self.send_json::<(), Vec<ApiResult>>(Method::DELETE, &url, None)
            .await
    }
}
