//! Run entry point for one scheduled invocation.

use chrono::Utc;
use tracing::{error, info, warn};

use crate::batch::{process_log_files, BatchReport};
use crate::config::ArchiveConfig;
use crate::contract::{BlobSink, RemoteShare};
use crate::error::JobError;

/// What the scheduler told us about this invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Trigger {
    /// The scheduled time was missed and this run is catching up.
    pub past_due: bool,
}

/// Runs one batch, logs its summary and hands any fatal error back to the
/// caller so the scheduler sees the run as failed.
pub async fn run_job<S, B>(
    config: &ArchiveConfig,
    share: &S,
    sink: &B,
    trigger: Trigger,
) -> Result<BatchReport, JobError>
where
    S: RemoteShare,
    B: BlobSink,
{
    if trigger.past_due {
        warn!("The timer is past due!");
    }
    info!(started_at = %Utc::now().to_rfc3339(), "Log archive job executed");

    match process_log_files(config, share, sink).await {
        Ok(report) => {
            info!(
                processed = report.processed_count(),
                "Processing complete. {} files processed.",
                report.processed_count()
            );
            Ok(report)
        }
        Err(e) => {
            error!(error = %e, "Error during processing");
            Err(JobError::Connectivity(e))
        }
    }
}
