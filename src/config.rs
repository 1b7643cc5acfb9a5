// log-archiver/src/config.rs

use std::path::PathBuf;

use tracing::{debug, info};

use crate::contract::{ShareCredentials, SharePath};
use crate::error::ConfigError;

pub const SMB_SERVER: &str = "SMB_SERVER";
pub const SMB_SHARE: &str = "SMB_SHARE";
pub const SMB_USERNAME: &str = "SMB_USERNAME";
pub const SMB_PASSWORD: &str = "SMB_PASSWORD";
pub const STORAGE_CONNECTION_STRING: &str = "STORAGE_CONNECTION_STRING";
pub const BLOB_CONTAINER_NAME: &str = "BLOB_CONTAINER_NAME";
pub const KEY_VAULT_URL: &str = "KEY_VAULT_URL";

/// Settings required when everything comes from the environment.
pub const ENVIRONMENT_KEYS: [&str; 6] = [
    SMB_SERVER,
    SMB_SHARE,
    SMB_USERNAME,
    SMB_PASSWORD,
    STORAGE_CONNECTION_STRING,
    BLOB_CONTAINER_NAME,
];

/// Settings required from the environment in key vault mode.
pub const KEY_VAULT_KEYS: [&str; 2] = [KEY_VAULT_URL, BLOB_CONTAINER_NAME];

/// Secret names resolved from the key vault, paired with the setting they fill.
pub const SECRET_NAMES: [(&str, &str); 5] = [
    (SMB_SERVER, "smb-server"),
    (SMB_SHARE, "smb-share"),
    (SMB_USERNAME, "smb-username"),
    (SMB_PASSWORD, "smb-password"),
    (STORAGE_CONNECTION_STRING, "storage-connection-string"),
];

/// Where settings are resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Environment,
    KeyVault { vault_url: String },
}

impl ConfigSource {
    /// Key vault mode is selected by the presence of `KEY_VAULT_URL`.
    pub fn detect<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match present(&lookup, KEY_VAULT_URL) {
            Some(vault_url) => ConfigSource::KeyVault { vault_url },
            None => ConfigSource::Environment,
        }
    }

    pub fn required_keys(&self) -> &'static [&'static str] {
        match self {
            ConfigSource::Environment => &ENVIRONMENT_KEYS,
            ConfigSource::KeyVault { .. } => &KEY_VAULT_KEYS,
        }
    }
}

/// Checks every key required by the detected mode and reports all the
/// missing ones in a single error.
pub fn validate_environment<F>(lookup: F) -> Result<ConfigSource, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let source = ConfigSource::detect(&lookup);
    let missing: Vec<String> = source
        .required_keys()
        .iter()
        .filter(|key| present(&lookup, key).is_none())
        .map(|key| key.to_string())
        .collect();
    if missing.is_empty() {
        debug!(?source, "Required configuration present");
        Ok(source)
    } else {
        Err(ConfigError::MissingKeys(missing))
    }
}

/// Treats empty and whitespace-only values as absent.
pub(crate) fn present<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.trim().is_empty())
}

/// Fully resolved settings, before any handle is built.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub smb_server: String,
    pub smb_share: String,
    pub smb_username: String,
    pub smb_password: String,
    pub storage_connection_string: String,
    pub container_name: String,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("smb_server", &self.smb_server)
            .field("smb_share", &self.smb_share)
            .field("smb_username", &self.smb_username)
            .field("smb_password", &"<redacted>")
            .field("storage_connection_string", &"<redacted>")
            .field("container_name", &self.container_name)
            .finish()
    }
}

impl Settings {
    pub fn trace_loaded(&self) {
        info!(
            smb_server = %self.smb_server,
            smb_share = %self.smb_share,
            container = %self.container_name,
            "Loaded settings"
        );
        debug!(settings = ?self, "Settings loaded (full debug)");
    }
}

/// Non-secret options read from the optional YAML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct Options {
    #[serde(default)]
    pub share: ShareOptions,
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ShareOptions {
    /// Directory under which shares are mounted as `<server>/<share>`.
    #[serde(default = "default_mount_root")]
    pub mount_root: PathBuf,
}

impl Default for ShareOptions {
    fn default() -> Self {
        Self {
            mount_root: default_mount_root(),
        }
    }
}

fn default_mount_root() -> PathBuf {
    PathBuf::from("/mnt")
}

/// Everything the batch driver and the per-file processor need, built once
/// at the entry point and passed down by reference.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub share_root: SharePath,
    pub credentials: ShareCredentials,
    pub container: String,
    /// Directory for staged artifacts. `None` uses the OS temp dir.
    pub staging_dir: Option<PathBuf>,
}

impl ArchiveConfig {
    pub fn new(settings: &Settings, options: &Options) -> Self {
        Self {
            share_root: SharePath::root(&settings.smb_server, &settings.smb_share),
            credentials: ShareCredentials {
                username: settings.smb_username.clone(),
                password: settings.smb_password.clone(),
            },
            container: settings.container_name.clone(),
            staging_dir: options.staging_dir.clone(),
        }
    }
}
