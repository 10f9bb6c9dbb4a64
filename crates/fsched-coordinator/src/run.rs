//! Top-level coordinator orchestration: accept workers, enumerate and
//! dispatch files, broadcast stop, and wait for the archive listener to
//! finish draining.

use crate::archive_listener::{run_archive_listener, RankedMessage};
use crate::enumerate::enumerate_files;
use anyhow::{Context, Result};
use fsched_config::CoordinatorCli;
use fsched_protocol::{frame_async, Message};
use fsched_queue::PriorityQueue;
use fsched_scheduler::{NodeFeedback, Scheduler};
use std::sync::Arc;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub struct RunSummary {
    pub files_enumerated: usize,
    pub files_archived: usize,
    pub archive_failures: usize,
}

pub async fn run(cli: CoordinatorCli) -> Result<RunSummary> {
    cli.validate().context("validating coordinator configuration")?;

    let socket_path = cli.socket_path();
    if socket_path.exists() {
        std::fs::remove_file(&socket_path).context("removing stale coordinator socket")?;
    }

    let listener = UnixListener::bind(&socket_path)
        .with_context(|| format!("binding coordinator socket at {}", socket_path.display()))?;
    info!(socket = %socket_path.display(), workers = cli.workers, "Listening for workers");

    let (tx, rx) = mpsc::channel::<RankedMessage>(1024);
    let mut write_halves: Vec<OwnedWriteHalf> = Vec::with_capacity(cli.workers);
    let mut reader_tasks = Vec::with_capacity(cli.workers);

    for rank in 1..=cli.workers {
        let (stream, _addr) = listener
            .accept()
            .await
            .with_context(|| format!("accepting connection for rank {rank}"))?;
        info!(rank, "Worker connected");

        let (read_half, write_half) = stream.into_split();
        write_halves.push(write_half);
        reader_tasks.push(tokio::spawn(read_worker_messages(rank, read_half, tx.clone())));
    }
    drop(tx);

    let feedback = Arc::new(NodeFeedback::new(cli.workers));
    let archive_dir = cli.archive_dir.clone();
    let worker_count = cli.workers;
    let listener_feedback = feedback.clone();
    let listener_handle =
        tokio::spawn(async move { run_archive_listener(rx, archive_dir, worker_count, listener_feedback).await });

    let files = enumerate_files(&cli.work_dir, cli.priority_option())
        .with_context(|| format!("enumerating {}", cli.work_dir.display()))?;
    let files_enumerated = files.len();
    info!(count = files_enumerated, "Enumerated work directory");

    let pq: PriorityQueue<fsched_protocol::FileDescriptor> = PriorityQueue::new();
    for file in files {
        pq.enqueue(file);
    }

    let mut scheduler = Scheduler::new(cli.policy(), cli.workers, files_enumerated);
    let needs_feedback = cli.policy().needs_worker_feedback();

    while let Some(file) = pq.dequeue() {
        let rank = scheduler.pick_rank(if needs_feedback { Some(&feedback) } else { None });
        let write_half = &mut write_halves[rank - 1];
        let message = Message::assign(file.path.clone(), file.size, file.priority)?;
        frame_async::write_message(write_half, &message)
            .await
            .with_context(|| format!("dispatching {} to rank {rank}", file.path))?;
        info!(rank, path = %file.path, "Dispatched file");
    }

    for (idx, write_half) in write_halves.iter_mut().enumerate() {
        let rank = idx + 1;
        if let Err(e) = frame_async::write_message(write_half, &Message::Stop(1)).await {
            warn!(rank, error = %e, "Failed to send stop to worker");
        }
    }
    info!("Stop broadcast complete");

    let summary = listener_handle.await.context("archive listener task panicked")?;
    for task in reader_tasks {
        let _ = task.await;
    }

    info!(
        archived = summary.archived,
        failures = summary.archive_failures,
        "Coordinator run complete"
    );

    Ok(RunSummary {
        files_enumerated,
        files_archived: summary.archived,
        archive_failures: summary.archive_failures,
    })
}

/// Reads every message from one worker's connection and forwards it to the
/// archive listener, tagged with that worker's rank. Returns once the
/// connection closes or a protocol error occurs.
async fn read_worker_messages(rank: usize, mut read_half: OwnedReadHalf, tx: mpsc::Sender<RankedMessage>) {
    loop {
        match frame_async::read_message(&mut read_half).await {
            Ok(message) => {
                if tx.send(RankedMessage { rank, message }).await.is_err() {
                    return;
                }
            }
            Err(fsched_protocol::ProtocolError::ConnectionClosed) => return,
            Err(e) => {
                warn!(rank, error = %e, "Reader task error");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use fsched_config::CoordinatorCli;
    use std::fs;
    use tempfile::tempdir;
    use tokio::net::UnixStream;

    async fn run_worker_stub(socket_path: std::path::PathBuf, search_key: &'static str) {
        let stream = UnixStream::connect(&socket_path).await.unwrap();
        let (mut read_half, mut write_half) = stream.into_split();
        loop {
            match frame_async::read_message(&mut read_half).await.unwrap() {
                Message::Assign { path, .. } => {
                    let contents = std::fs::read_to_string(&path).unwrap();
                    if contents.lines().any(|line| {
                        line.split_once('=').map(|(k, _)| k) == Some(search_key)
                    }) {
                        frame_async::write_message(&mut write_half, &Message::Archive(path))
                            .await
                            .unwrap();
                    }
                }
                Message::Stop(_) => {
                    frame_async::write_message(&mut write_half, &Message::Stop(1)).await.unwrap();
                    return;
                }
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn end_to_end_cyclic_dispatch_archives_matches() {
        let work = tempdir().unwrap();
        let archive = tempdir().unwrap();
        fs::write(work.path().join("a.sen"), "k=v\n").unwrap();
        fs::write(work.path().join("b.sen"), "other=1\n").unwrap();

        let socket_path = tempdir().unwrap().path().join("coord.sock");
        let cli = CoordinatorCli::parse_from([
            "fsched-coordinator",
            work.path().to_str().unwrap(),
            archive.path().to_str().unwrap(),
            "k",
            "--workers",
            "1",
            "--socket",
            socket_path.to_str().unwrap(),
        ]);

        let run_future = tokio::spawn(run(cli));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        run_worker_stub(socket_path, "k").await;

        let summary = run_future.await.unwrap().unwrap();
        assert_eq!(summary.files_enumerated, 2);
        assert_eq!(summary.files_archived, 1);
        assert!(archive.path().join("a.sen").exists());
        assert!(work.path().join("b.sen").exists());
    }
}
