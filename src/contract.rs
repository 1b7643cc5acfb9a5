//! # contract: collaborator interfaces for the archive pipeline
//!
//! The pipeline talks to three external systems, each behind an async trait:
//! - [`RemoteShare`]: the network share holding the log files (list/read/delete)
//! - [`BlobSink`]: the object store receiving filtered content (put)
//! - [`SecretResolver`]: the secret store used to resolve settings by name
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`; the generated `Mock*` types are
//!   exported under the default `test-export-mocks` feature so integration
//!   tests can drive the pipeline without a real share or storage account.
//!
//! ## Adding New Backends
//! - Implement the trait for your transport.
//! - Map transport failures onto the crate error types; connection and
//!   authentication failures of a share must surface as a connectivity
//!   [`ShareError`] so listing failures abort the run.

use std::fmt;

use async_trait::async_trait;

#[allow(unused_imports)]
use mockall::{automock, predicate::*};

use crate::error::{SecretError, ShareError, UploadError};

/// One entry produced by listing the share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileEntry {
    pub name: String,
}

impl RemoteFileEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Username/password pair used for every share operation.
#[derive(Clone, PartialEq, Eq)]
pub struct ShareCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ShareCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Location of the share root, or of one file directly under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePath {
    pub server: String,
    pub share: String,
    pub file: Option<String>,
}

impl SharePath {
    pub fn root(server: impl Into<String>, share: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            share: share.into(),
            file: None,
        }
    }

    /// Path of `file_name` inside this share.
    pub fn join(&self, file_name: &str) -> Self {
        Self {
            server: self.server.clone(),
            share: self.share.clone(),
            file: Some(file_name.to_string()),
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file.as_deref()
    }
}

impl fmt::Display for SharePath {
    /// Renders the UNC form, e.g. `\\server-01\Shared02\app.log`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r"\\{}\{}", self.server, self.share)?;
        if let Some(file) = &self.file {
            write!(f, r"\{file}")?;
        }
        Ok(())
    }
}

/// Network file share accessed with a username/password.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RemoteShare: Send + Sync {
    /// List the entries directly under `path`.
    async fn list(
        &self,
        path: &SharePath,
        credentials: &ShareCredentials,
    ) -> Result<Vec<RemoteFileEntry>, ShareError>;

    /// Read a whole file as UTF-8 text.
    async fn read_to_string(
        &self,
        path: &SharePath,
        credentials: &ShareCredentials,
    ) -> Result<String, ShareError>;

    /// Remove a file from the share.
    async fn delete(&self, path: &SharePath, credentials: &ShareCredentials)
        -> Result<(), ShareError>;
}

/// Object store addressed by container + object name.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait BlobSink: Send + Sync {
    /// Store `content` under `object_name`. With `overwrite` an existing
    /// object of the same name is replaced.
    async fn put(
        &self,
        container: &str,
        object_name: &str,
        content: Vec<u8>,
        overwrite: bool,
    ) -> Result<(), UploadError>;
}

/// Secret store resolving values by secret name.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_path_renders_unc() {
        let root = SharePath::root("servidor-01", "Shared02");
        assert_eq!(root.to_string(), r"\\servidor-01\Shared02");
        assert_eq!(root.join("app.log").to_string(), r"\\servidor-01\Shared02\app.log");
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = ShareCredentials {
            username: "svc".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("svc"));
        assert!(!rendered.contains("hunter2"));
    }
}
