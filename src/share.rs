use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::contract::{RemoteFileEntry, RemoteShare, ShareCredentials, SharePath};
use crate::error::ShareError;

/// [`RemoteShare`] over an SMB share mounted into the local filesystem at
/// `<mount_root>/<server>/<share>`.
///
/// The mount carries the authentication, so credentials are only logged.
#[derive(Debug, Clone)]
pub struct MountedShare {
    mount_root: PathBuf,
}

impl MountedShare {
    pub fn new(mount_root: impl Into<PathBuf>) -> Self {
        Self {
            mount_root: mount_root.into(),
        }
    }

    /// Local path backing `path`.
    pub fn local_path(&self, path: &SharePath) -> PathBuf {
        let mut local = self.share_dir(path);
        if let Some(file) = path.file_name() {
            local.push(file);
        }
        local
    }

    fn share_dir(&self, path: &SharePath) -> PathBuf {
        self.mount_root.join(&path.server).join(&path.share)
    }
}

fn share_error(path: &SharePath, local: &Path, source: std::io::Error) -> ShareError {
    match source.kind() {
        ErrorKind::PermissionDenied => ShareError::AccessDenied {
            path: path.to_string(),
            reason: format!("{}: {source}", local.display()),
        },
        _ => ShareError::Io {
            path: path.to_string(),
            source,
        },
    }
}

#[async_trait]
impl RemoteShare for MountedShare {
    async fn list(
        &self,
        path: &SharePath,
        credentials: &ShareCredentials,
    ) -> Result<Vec<RemoteFileEntry>, ShareError> {
        let local = self.local_path(path);
        debug!(share = %path, local = %local.display(), username = %credentials.username, "Listing mounted share");

        let mut dir = match tokio::fs::read_dir(&local).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ShareError::Unreachable {
                    path: path.to_string(),
                    reason: format!("{} is not mounted: {e}", local.display()),
                });
            }
            Err(e) => return Err(share_error(path, &local, e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| share_error(path, &local, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| share_error(path, &entry.path(), e))?;
            if !file_type.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => entries.push(RemoteFileEntry { name }),
                Err(raw) => warn!(name = ?raw, "Skipping entry with a non UTF-8 name"),
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn read_to_string(
        &self,
        path: &SharePath,
        credentials: &ShareCredentials,
    ) -> Result<String, ShareError> {
        let local = self.local_path(path);
        let share_dir = self.share_dir(path);
        if !tokio::fs::try_exists(&share_dir).await.unwrap_or(false) {
            return Err(ShareError::Unreachable {
                path: path.to_string(),
                reason: format!("{} is not mounted", share_dir.display()),
            });
        }
        debug!(file = %path, username = %credentials.username, "Reading file from mounted share");
        tokio::fs::read_to_string(&local)
            .await
            .map_err(|e| share_error(path, &local, e))
    }

    async fn delete(
        &self,
        path: &SharePath,
        credentials: &ShareCredentials,
    ) -> Result<(), ShareError> {
        let local = self.local_path(path);
        debug!(file = %path, username = %credentials.username, "Removing file from mounted share");
        tokio::fs::remove_file(&local)
            .await
            .map_err(|e| share_error(path, &local, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn credentials() -> ShareCredentials {
        ShareCredentials {
            username: "svc".into(),
            password: "pw".into(),
        }
    }

    #[tokio::test]
    async fn lists_only_regular_files_sorted() {
        let mount = tempdir().unwrap();
        let share_dir = mount.path().join("srv").join("logs");
        std::fs::create_dir_all(share_dir.join("archive")).unwrap();
        std::fs::write(share_dir.join("b.log"), "x").unwrap();
        std::fs::write(share_dir.join("a.txt"), "y").unwrap();

        let share = MountedShare::new(mount.path());
        let entries = share
            .list(&SharePath::root("srv", "logs"), &credentials())
            .await
            .unwrap();
        assert_eq!(
            entries,
            vec![RemoteFileEntry::new("a.txt"), RemoteFileEntry::new("b.log")]
        );
    }

    #[tokio::test]
    async fn missing_share_is_unreachable() {
        let mount = tempdir().unwrap();
        let share = MountedShare::new(mount.path());
        let err = share
            .list(&SharePath::root("srv", "absent"), &credentials())
            .await
            .unwrap_err();
        assert!(err.is_connectivity(), "expected connectivity error, got {err:?}");
    }

    #[tokio::test]
    async fn reads_and_deletes_a_file() {
        let mount = tempdir().unwrap();
        let share_dir = mount.path().join("srv").join("logs");
        std::fs::create_dir_all(&share_dir).unwrap();
        std::fs::write(share_dir.join("a.log"), "user login ok\n").unwrap();

        let share = MountedShare::new(mount.path());
        let path = SharePath::root("srv", "logs").join("a.log");
        assert_eq!(
            share.read_to_string(&path, &credentials()).await.unwrap(),
            "user login ok\n"
        );
        share.delete(&path, &credentials()).await.unwrap();
        assert!(!share_dir.join("a.log").exists());
    }

    #[tokio::test]
    async fn reading_a_missing_file_is_not_a_connectivity_error() {
        let mount = tempdir().unwrap();
        std::fs::create_dir_all(mount.path().join("srv").join("logs")).unwrap();
        let share = MountedShare::new(mount.path());
        let err = share
            .read_to_string(&SharePath::root("srv", "logs").join("gone.log"), &credentials())
            .await
            .unwrap_err();
        assert!(!err.is_connectivity());
    }
}
