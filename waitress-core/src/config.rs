use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Fully resolved run configuration: CRM endpoints, OAuth credentials and local catalog paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Free-form environment label (e.g. "dev", "prod"), only used for logging.
    #[serde(default)]
    pub env: Option<String>,
    #[serde(flatten)]
    pub endpoints: Endpoints,
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(flatten)]
    pub paths: CatalogPaths,
}

/// REST endpoints of the CRM org.
///
/// `url_to_record`, `url_delete_one` and `url_delete_all` are prefixes: the record id
/// (or comma-joined id list) is appended verbatim. `url_content_doc_id` is a template
/// whose `{}` placeholder receives the uploaded file version id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoints {
    pub url_oauth_token: String,
    pub url_query_all: String,
    pub url_delete_all: String,
    pub url_delete_one: String,
    pub url_to_record: String,
    pub url_file_upload: String,
    pub url_content_doc_id: String,
    pub url_grant_permission: String,
}

/// OAuth2 resource-owner-password grant fields.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("grant_type", &self.grant_type)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogPaths {
    /// Root of the Remote Action JSON descriptor tree.
    pub path_to_json: PathBuf,
    /// Category workbook (the authoritative list of catalog entries).
    pub remote_actions_metadata: PathBuf,
    /// Where spreadsheet exports are written.
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Config {
    pub fn trace_loaded(&self) {
        info!(
            env = self.env.as_deref().unwrap_or("default"),
            path_to_json = %self.paths.path_to_json.display(),
            remote_actions_metadata = %self.paths.remote_actions_metadata.display(),
            export_dir = %self.paths.export_dir.display(),
            "Loaded Config"
        );
        debug!(config = ?self, "Config loaded (full debug)");
    }
}
