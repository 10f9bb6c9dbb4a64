//! A single task that funnels `Archive`/`Stop`/`QueueData` messages from
//! every worker connection through one channel and reacts to them in
//! receipt order -- the async expression of the original's single
//! "probe any source, any tag" dispatch loop.

use fsched_config::SchedError;
use fsched_protocol::Message;
use fsched_scheduler::NodeFeedback;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// One message tagged with the rank of the connection it arrived on.
pub struct RankedMessage {
    pub rank: usize,
    pub message: Message,
}

#[derive(Debug, Default)]
pub struct ArchiveSummary {
    pub archived: usize,
    pub archive_failures: usize,
}

/// Drain `rx` until `worker_count` `Stop` acknowledgements have been seen,
/// archiving matched files and recording queue feedback along the way.
pub async fn run_archive_listener(
    mut rx: mpsc::Receiver<RankedMessage>,
    archive_dir: PathBuf,
    worker_count: usize,
    feedback: Arc<NodeFeedback>,
) -> ArchiveSummary {
    let mut summary = ArchiveSummary::default();
    let mut stop_acks = 0usize;

    while stop_acks < worker_count {
        let Some(RankedMessage { rank, message }) = rx.recv().await else {
            warn!(seen = stop_acks, "Archive listener channel closed before every worker acknowledged stop");
            break;
        };

        match message {
            Message::Archive(path) => match archive_file(Path::new(&path), &archive_dir) {
                Ok(()) => {
                    summary.archived += 1;
                    info!(rank, %path, "Archived file");
                }
                Err(e) => {
                    summary.archive_failures += 1;
                    warn!(rank, %path, error = %e, "Failed to archive file");
                }
            },
            Message::QueueData(value) => {
                feedback.record(rank, value);
            }
            Message::Stop(_) => {
                stop_acks += 1;
                info!(rank, acked = stop_acks, total = worker_count, "Worker acknowledged stop");
            }
            Message::Assign { .. } => {
                warn!(rank, "Ignoring unexpected Assign message from worker");
            }
        }
    }

    summary
}

/// Move `path` into `archive_dir`, preserving its basename. Falls back to
/// copy-then-remove when the rename crosses a filesystem boundary.
fn archive_file(path: &Path, archive_dir: &Path) -> Result<(), SchedError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"))?;
    let dest = archive_dir.join(file_name);

    const EXDEV: i32 = 18; // cross-device link, same value on Linux and macOS

    match std::fs::rename(path, &dest) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(EXDEV) => {
            std::fs::copy(path, &dest)?;
            std::fs::remove_file(path)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
