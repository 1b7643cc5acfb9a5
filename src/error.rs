//! Error taxonomy for a run.
//!
//! Configuration, secret and connectivity errors abort the run. Everything
//! that goes wrong while handling a single file is wrapped in
//! [`FileProcessingError`] and recovered by the batch driver.

use std::path::PathBuf;

use thiserror::Error;

/// A required setting is missing or malformed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error("invalid storage connection string: {0}")]
    InvalidConnectionString(String),

    #[error("failed to read options file {path:?}: {source}")]
    ReadOptions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse options YAML: {0}")]
    ParseOptions(#[from] serde_yaml::Error),
}

/// The secret store could not produce a value.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("invalid key vault URL {0}")]
    InvalidVaultUrl(String),

    #[error("failed to acquire managed identity token: {0}")]
    Identity(String),

    #[error("secret {0} not found in key vault")]
    NotFound(String),

    #[error("key vault returned {status} for secret {name}: {body}")]
    Status {
        name: String,
        status: u16,
        body: String,
    },

    #[error("key vault request for secret {name} failed: {source}")]
    Request {
        name: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Failure talking to the remote share.
#[derive(Debug, Error)]
pub enum ShareError {
    #[error("share {path} is unreachable: {reason}")]
    Unreachable { path: String, reason: String },

    #[error("access to {path} denied: {reason}")]
    AccessDenied { path: String, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ShareError {
    /// True for the connection/authentication class of failures.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            ShareError::Unreachable { .. } | ShareError::AccessDenied { .. }
        )
    }
}

/// Failure writing an object to the blob sink.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("blob request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("blob service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid blob URL: {0}")]
    InvalidUrl(String),

    #[error("failed to sign blob request: {0}")]
    Signing(String),
}

/// Why a single file was not archived. Never aborts the batch.
#[derive(Debug, Error)]
pub enum FileProcessingError {
    #[error("failed to read {file}: {source}")]
    Read {
        file: String,
        #[source]
        source: ShareError,
    },

    #[error("failed to stage filtered lines of {file}: {source}")]
    Stage {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to upload {object_name} for {file}: {source}")]
    Upload {
        file: String,
        object_name: String,
        #[source]
        source: UploadError,
    },

    #[error("uploaded {file} but failed to delete the original: {source}")]
    Delete {
        file: String,
        #[source]
        source: ShareError,
    },
}

impl FileProcessingError {
    pub fn file(&self) -> &str {
        match self {
            FileProcessingError::Read { file, .. }
            | FileProcessingError::Stage { file, .. }
            | FileProcessingError::Upload { file, .. }
            | FileProcessingError::Delete { file, .. } => file,
        }
    }
}

/// Fatal errors surfaced to the scheduler.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    SecretResolution(#[from] SecretError),

    #[error("share connection error: {0}")]
    Connectivity(#[from] ShareError),
}
