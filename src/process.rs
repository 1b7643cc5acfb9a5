//! Single-file processor: read → filter → stage → upload → delete.
//!
//! A file's failures stay inside the returned [`Result`]; nothing here aborts
//! the batch. The original file is deleted only once its filtered content has
//! been uploaded, and the staged copy is removed on every exit path.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Local};
use tempfile::NamedTempFile;
use tracing::{debug, error, info};

use crate::config::ArchiveConfig;
use crate::contract::{BlobSink, RemoteShare};
use crate::error::FileProcessingError;
use crate::filter::{filter_log_lines, split_lines};

/// What happened to a file that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Filtered lines uploaded under `object_name`, original deleted.
    Archived { object_name: String },
    /// Nothing matched; the original is left on the share.
    NoRelevantLines,
}

/// `processed_<YYYYMMDD>_<HHMMSS>_<file_name>`.
pub fn object_name(file_name: &str, at: DateTime<Local>) -> String {
    format!("processed_{}_{file_name}", at.format("%Y%m%d_%H%M%S"))
}

/// Processes one file of the share and logs any failure with its name.
pub async fn process_file<S, B>(
    config: &ArchiveConfig,
    share: &S,
    sink: &B,
    file_name: &str,
) -> Result<FileOutcome, FileProcessingError>
where
    S: RemoteShare,
    B: BlobSink,
{
    let result = archive_file(config, share, sink, file_name).await;
    if let Err(e) = &result {
        error!(file = file_name, error = %e, "[FILE][ERROR] Failed to process file");
    }
    result
}

async fn archive_file<S, B>(
    config: &ArchiveConfig,
    share: &S,
    sink: &B,
    file_name: &str,
) -> Result<FileOutcome, FileProcessingError>
where
    S: RemoteShare,
    B: BlobSink,
{
    let path = config.share_root.join(file_name);

    let content = share
        .read_to_string(&path, &config.credentials)
        .await
        .map_err(|source| FileProcessingError::Read {
            file: file_name.to_string(),
            source,
        })?;

    let lines = split_lines(&content);
    let filtered = filter_log_lines(&lines);
    debug!(
        file = file_name,
        total = lines.len(),
        kept = filtered.len(),
        "[FILE] Filtered lines"
    );
    if filtered.is_empty() {
        info!(file = file_name, "[FILE] No relevant lines found");
        return Ok(FileOutcome::NoRelevantLines);
    }

    let stage_error = |source| FileProcessingError::Stage {
        file: file_name.to_string(),
        source,
    };
    // Removed from disk when dropped, whichever way this function returns.
    let staged = stage_lines(&filtered, config.staging_dir.as_deref()).map_err(stage_error)?;
    let bytes = tokio::fs::read(staged.path()).await.map_err(stage_error)?;

    let object_name = object_name(file_name, Local::now());
    sink.put(&config.container, &object_name, bytes, true)
        .await
        .map_err(|source| FileProcessingError::Upload {
            file: file_name.to_string(),
            object_name: object_name.clone(),
            source,
        })?;
    info!(file = file_name, object_name = %object_name, "[UPLOAD] File sent to blob storage");

    share
        .delete(&path, &config.credentials)
        .await
        .map_err(|source| FileProcessingError::Delete {
            file: file_name.to_string(),
            source,
        })?;
    info!(file = file_name, "[FILE] Original removed from share");

    Ok(FileOutcome::Archived { object_name })
}

/// Writes the filtered lines, UTF-8 encoded, to a fresh temporary file.
fn stage_lines(lines: &[String], dir: Option<&Path>) -> std::io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("log-archiver-").suffix(".staged");
    let mut staged = match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    for line in lines {
        staged.write_all(line.as_bytes())?;
    }
    staged.flush()?;
    debug!(path = %staged.path().display(), lines = lines.len(), "[FILE] Staged filtered lines");
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn object_name_embeds_second_resolution_timestamp() {
        let at = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        assert_eq!(
            object_name("app.LOG", at),
            "processed_20240307_090502_app.LOG"
        );
    }

    #[test]
    fn staged_file_holds_lines_and_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let lines = vec!["user login ok\n".to_string(), "fail".to_string()];
        let staged = stage_lines(&lines, Some(dir.path())).unwrap();
        let path = staged.path().to_path_buf();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "user login ok\nfail");
        drop(staged);
        assert!(!path.exists());
    }
}
