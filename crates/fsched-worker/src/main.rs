mod processor;

use anyhow::{Context, Result};
use clap::Parser;
use fsched_config::logging::{init_logging, LogLevel};
use fsched_config::WorkerCli;
use fsched_protocol::{frame_sync, FileDescriptor, Message, ProtocolError};
use fsched_queue::PriorityQueue;
use processor::process_file;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

/// How long the processor thread waits for a new item before re-checking
/// whether it should keep running. Short enough that shutdown is prompt,
/// long enough not to busy-spin.
const PROCESSOR_POLL_TIMEOUT: Duration = Duration::from_millis(200);

fn main() -> Result<()> {
    let cli = WorkerCli::parse();
    init_logging(LogLevel::from_verbosity(cli.verbose));

    let stream = UnixStream::connect(&cli.socket)
        .with_context(|| format!("connecting to coordinator at {}", cli.socket.display()))?;
    info!(socket = %cli.socket.display(), "Connected to coordinator");

    let mut read_stream = stream.try_clone().context("duplicating socket for reads")?;
    let writer = Arc::new(Mutex::new(stream));

    let queue: Arc<PriorityQueue<FileDescriptor>> = Arc::new(PriorityQueue::new());
    let do_process = Arc::new(AtomicBool::new(true));

    let processor_handle = {
        let queue = queue.clone();
        let do_process = do_process.clone();
        let search_key = cli.search_key.clone();
        let writer = writer.clone();
        std::thread::spawn(move || {
            while do_process.load(Ordering::Acquire) || queue.len() > 0 {
                if let Some(file) = queue.dequeue_blocking(PROCESSOR_POLL_TIMEOUT) {
                    process_file(&file, &search_key, &writer);
                }
            }
        })
    };

    loop {
        let message = match frame_sync::read_message(&mut read_stream) {
            Ok(message) => message,
            Err(ProtocolError::ConnectionClosed) => {
                warn!("Coordinator closed the connection before sending Stop");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read message from coordinator");
                break;
            }
        };

        match message {
            Message::Assign { path, size, priority } => {
                queue.enqueue(FileDescriptor { path, size, priority });
                if cli.report_feedback {
                    let feedback_value = queue.len() as i64;
                    let mut w = writer.lock().expect("worker writer mutex poisoned");
                    if let Err(e) = frame_sync::write_message(&mut *w, &Message::QueueData(feedback_value)) {
                        warn!(error = %e, "Failed to send queue feedback");
                    }
                }
            }
            Message::Stop(_) => {
                info!("Received stop, draining local queue");
                do_process.store(false, Ordering::Release);
                break;
            }
            other => {
                warn!(message = ?other, "Ignoring unexpected message from coordinator");
            }
        }
    }

    processor_handle.join().expect("processor thread panicked");

    let residue = queue.drain_all();
    if !residue.is_empty() {
        warn!(count = residue.len(), "Discarding residual queue entries at shutdown");
    }

    {
        let mut w = writer.lock().expect("worker writer mutex poisoned");
        frame_sync::write_message(&mut *w, &Message::Stop(1)).context("sending final stop acknowledgement")?;
    }
    info!("Worker shutdown complete");

    Ok(())
}
