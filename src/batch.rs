//! Batch driver: one pass over the share's current listing.
//!
//! Listing failures (share unreachable, authentication) abort the run. Every
//! per-file failure is logged, recorded in the [`BatchReport`] and skipped;
//! the file stays on the share and is picked up again by the next run.

use tracing::{debug, error, info};

use crate::config::ArchiveConfig;
use crate::contract::{BlobSink, RemoteShare};
use crate::error::ShareError;
use crate::process::{process_file, FileOutcome};

/// Extensions eligible for processing, compared case-insensitively.
pub const CANDIDATE_EXTENSIONS: [&str; 2] = [".log", ".txt"];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub archived: Vec<ArchivedFile>,
    pub no_relevant_lines: Vec<String>,
    pub failed: Vec<FailedFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedFile {
    pub file_name: String,
    pub object_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub file_name: String,
    pub error: String,
}

impl BatchReport {
    /// Files filtered non-empty, uploaded and deleted.
    pub fn processed_count(&self) -> usize {
        self.archived.len()
    }
}

pub fn is_candidate(file_name: &str) -> bool {
    let lowered = file_name.to_ascii_lowercase();
    CANDIDATE_EXTENSIONS
        .iter()
        .any(|extension| lowered.ends_with(extension))
}

/// Lists the share and archives every candidate file, one at a time.
pub async fn process_log_files<S, B>(
    config: &ArchiveConfig,
    share: &S,
    sink: &B,
) -> Result<BatchReport, ShareError>
where
    S: RemoteShare,
    B: BlobSink,
{
    info!(share = %config.share_root, container = %config.container, "[BATCH] Listing share");
    let entries = match share.list(&config.share_root, &config.credentials).await {
        Ok(entries) => entries,
        Err(e) => {
            error!(
                share = %config.share_root,
                connectivity = e.is_connectivity(),
                error = %e,
                "[BATCH][ERROR] SMB connection error"
            );
            return Err(e);
        }
    };
    debug!(entries = entries.len(), "[BATCH] Share listed");

    let mut report = BatchReport::default();
    for entry in entries {
        if !is_candidate(&entry.name) {
            debug!(file = %entry.name, "[BATCH] Skipping non-log file");
            continue;
        }

        info!(file = %entry.name, "[BATCH] Processing file");
        match process_file(config, share, sink, &entry.name).await {
            Ok(FileOutcome::Archived { object_name }) => report.archived.push(ArchivedFile {
                file_name: entry.name,
                object_name,
            }),
            Ok(FileOutcome::NoRelevantLines) => report.no_relevant_lines.push(entry.name),
            Err(e) => {
                error!(file = %entry.name, error = %e, "[BATCH][ERROR] Skipping file after failure");
                report.failed.push(FailedFile {
                    file_name: entry.name,
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        processed = report.processed_count(),
        no_relevant_lines = report.no_relevant_lines.len(),
        failed = report.failed.len(),
        "[BATCH] Batch finished"
    );
    Ok(report)
}
