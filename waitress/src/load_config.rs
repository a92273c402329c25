/// `load_config` module: loads the JSON run profile and injects secrets from the environment.
///
/// This is the only place where the user-supplied config file is parsed and mapped to the
/// strongly-typed [`Config`] used by the rest of the program.
///
/// # Responsibilities
/// - Parse the JSON profile (endpoints, OAuth fields, local paths)
/// - Inject `client_secret` and `password` from `WAITRESS_CLIENT_SECRET` / `WAITRESS_PASSWORD`
///   when set, so profiles can be committed without credentials
/// - Fail with a clear message when a required key or secret is missing
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary (exit code 1).
use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

use waitress_core::config::{CatalogPaths, Config, Credentials, Endpoints};

pub const CLIENT_SECRET_ENV: &str = "WAITRESS_CLIENT_SECRET";
pub const PASSWORD_ENV: &str = "WAITRESS_PASSWORD";

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    env: Option<String>,
    #[serde(flatten)]
    endpoints: Endpoints,
    grant_type: String,
    client_id: String,
    #[serde(default)]
    client_secret: Option<String>,
    username: String,
    #[serde(default)]
    password: Option<String>,
    #[serde(flatten)]
    paths: CatalogPaths,
}

/// Environment wins over the file; empty values count as unset.
fn secret(field: &str, env_key: &str, from_file: Option<String>) -> Result<String> {
    match std::env::var(env_key) {
        Ok(value) if !value.is_empty() => {
            info!(field, env_key, "Secret injected from environment");
            Ok(value)
        }
        _ => from_file.filter(|v| !v.is_empty()).ok_or_else(|| {
            error!(field, env_key, "Secret missing from config file and environment");
            anyhow!("{field} is not set: add it to the config file or export {env_key}")
        }),
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    let raw: RawConfig = match serde_json::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config JSON successfully");
            conf
        }
        Err(e) => {
            error!(error = %e, config_path = ?path_ref, "Failed to parse config JSON");
            return Err(anyhow!("Failed to parse config JSON: {e}"));
        }
    };

    let credentials = Credentials {
        client_secret: secret("client_secret", CLIENT_SECRET_ENV, raw.client_secret)?,
        password: secret("password", PASSWORD_ENV, raw.password)?,
        grant_type: raw.grant_type,
        client_id: raw.client_id,
        username: raw.username,
    };

    let config = Config {
        env: raw.env,
        endpoints: raw.endpoints,
        credentials,
        paths: raw.paths,
    };
    config.trace_loaded();
    Ok(config)
}
