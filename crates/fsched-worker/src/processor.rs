//! The processor thread's per-file work: scan for a matching `key=value`
//! line, request an archive on a hit, and simulate the persistence step the
//! original offloaded to a database insert.

use fsched_protocol::{frame_sync, FileDescriptor, Message};
use std::io::{BufRead, BufReader, Write};
use std::sync::Mutex;
use tracing::{info, warn};

/// Split a line on its first `=`. A line with no `=` yields the whole
/// trimmed line as the key and an empty value -- such a line can never
/// match a non-empty search key. The key/value either side of a present
/// `=` are taken verbatim, untrimmed, so a key like `" k"` never matches
/// a search key of `"k"`.
fn split_key_value(line: &str) -> (&str, &str) {
    match line.split_once('=') {
        Some((key, value)) => (key, value),
        None => (line.trim(), ""),
    }
}

/// A stand-in for "insert into a database", preserved as an opaque,
/// deliberately wasted amount of CPU work rather than any real I/O.
fn simulate_persist() {
    let mut acc: u64 = 0;
    for i in 0..500u64 {
        acc = acc.wrapping_add(i);
    }
    std::hint::black_box(acc);
}

/// Process one assigned file: read it line by line looking for
/// `search_key`; on a match, send an `Archive` request for the file and
/// stop reading. Returns whether a match was found.
pub fn process_file<W: Write>(
    file: &FileDescriptor,
    search_key: &str,
    writer: &Mutex<W>,
) -> bool {
    let handle = match std::fs::File::open(&file.path) {
        Ok(handle) => handle,
        Err(e) => {
            warn!(path = %file.path, error = %e, "Failed to open assigned file");
            return false;
        }
    };

    let reader = BufReader::new(handle);
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(path = %file.path, error = %e, "Failed to read line");
                break;
            }
        };

        let (key, value) = split_key_value(&line);
        if key == search_key {
            info!(path = %file.path, key, value, "Key match found");

            let mut w = writer.lock().expect("worker writer mutex poisoned");
            if let Err(e) = frame_sync::write_message(&mut *w, &Message::Archive(file.path.clone())) {
                warn!(path = %file.path, error = %e, "Failed to send archive request");
            }
            drop(w);

            simulate_persist();
            return true;
        }
    }

    false
}
