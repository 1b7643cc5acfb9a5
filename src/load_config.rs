/// `load_config` module: resolves the settings of a run from the environment
/// or the key vault, and reads the optional non-secret YAML options file.
///
/// This is the only place that looks at environment variables; everything
/// below the entry point receives an [`ArchiveConfig`](crate::config::ArchiveConfig).
///
/// # Modes
/// - Environment: all six settings are read from the environment.
/// - Key vault (`KEY_VAULT_URL` set): `BLOB_CONTAINER_NAME` comes from the
///   environment, the other five are secrets resolved by name.
///
/// Missing settings are reported together, before anything else happens.
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{error, info};

use crate::config::{
    present, validate_environment, ConfigSource, Options, Settings, BLOB_CONTAINER_NAME,
    SECRET_NAMES, SMB_PASSWORD, SMB_SERVER, SMB_SHARE, SMB_USERNAME, STORAGE_CONNECTION_STRING,
};
use crate::contract::SecretResolver;
use crate::error::{ConfigError, JobError};
use crate::secrets::{KeyVaultClient, ManagedIdentityCredential};

/// Reads the YAML options file, or returns defaults when no path is given.
pub fn load_options(path: Option<&Path>) -> Result<Options, ConfigError> {
    let Some(path) = path else {
        info!("No options file given, using defaults");
        return Ok(Options::default());
    };
    info!(config_path = ?path, "Loading options from file");

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read options file");
            return Err(ConfigError::ReadOptions {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    match serde_yaml::from_str::<Option<Options>>(&content) {
        Ok(options) => {
            info!(config_path = ?path, "Parsed options YAML successfully");
            Ok(options.unwrap_or_default())
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse options YAML");
            Err(ConfigError::ParseOptions(e))
        }
    }
}

/// Builds [`Settings`] purely from `lookup`, failing with every missing key.
pub fn settings_from_env<F>(lookup: F) -> Result<Settings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing = Vec::new();
    let mut take = |key: &str| {
        present(&lookup, key).unwrap_or_else(|| {
            missing.push(key.to_string());
            String::new()
        })
    };
    let settings = Settings {
        smb_server: take(SMB_SERVER),
        smb_share: take(SMB_SHARE),
        smb_username: take(SMB_USERNAME),
        smb_password: take(SMB_PASSWORD),
        storage_connection_string: take(STORAGE_CONNECTION_STRING),
        container_name: take(BLOB_CONTAINER_NAME),
    };
    if missing.is_empty() {
        Ok(settings)
    } else {
        Err(ConfigError::MissingKeys(missing))
    }
}

/// Key vault mode: container from `lookup`, the rest from `resolver`.
pub async fn settings_from_secrets<F, R>(lookup: F, resolver: &R) -> Result<Settings, JobError>
where
    F: Fn(&str) -> Option<String>,
    R: SecretResolver,
{
    let container_name = present(&lookup, BLOB_CONTAINER_NAME)
        .ok_or_else(|| ConfigError::MissingKeys(vec![BLOB_CONTAINER_NAME.to_string()]))?;

    let mut resolved: HashMap<&str, String> = HashMap::new();
    for (setting, secret) in SECRET_NAMES {
        match resolver.get_secret(secret).await {
            Ok(value) if value.trim().is_empty() => {
                error!(setting, secret, "Secret resolved to a blank value");
                return Err(ConfigError::MissingKeys(vec![secret.to_string()]).into());
            }
            Ok(value) => {
                info!(setting, secret, "Resolved setting from key vault");
                resolved.insert(setting, value);
            }
            Err(e) => {
                error!(setting, secret, error = %e, "Failed to resolve secret");
                return Err(e.into());
            }
        }
    }
    let mut take = |setting: &str| resolved.remove(setting).unwrap_or_default();

    Ok(Settings {
        smb_server: take(SMB_SERVER),
        smb_share: take(SMB_SHARE),
        smb_username: take(SMB_USERNAME),
        smb_password: take(SMB_PASSWORD),
        storage_connection_string: take(STORAGE_CONNECTION_STRING),
        container_name,
    })
}

/// Validates the environment, then resolves settings in the detected mode.
pub async fn resolve_settings<F>(lookup: F) -> Result<Settings, JobError>
where
    F: Fn(&str) -> Option<String>,
{
    let source = match validate_environment(&lookup) {
        Ok(source) => source,
        Err(e) => {
            error!(error = %e, "Configuration incomplete");
            return Err(e.into());
        }
    };

    let settings = match source {
        ConfigSource::Environment => settings_from_env(&lookup)?,
        ConfigSource::KeyVault { vault_url } => {
            info!(vault_url = %vault_url, "Resolving settings from key vault");
            let credential = ManagedIdentityCredential::from_lookup(&lookup)?;
            let client = KeyVaultClient::new(&vault_url, credential)?;
            settings_from_secrets(&lookup, &client).await?
        }
    };
    settings.trace_loaded();
    Ok(settings)
}
