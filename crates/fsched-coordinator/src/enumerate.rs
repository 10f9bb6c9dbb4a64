//! Work-directory enumeration: find candidate files and assign each an
//! initial priority before it ever touches the dispatch queue.

use fsched_config::{PriorityOption, SchedError};
use fsched_protocol::FileDescriptor;
use std::path::Path;

/// List every direct child of `work_dir` that is a regular file, whose name
/// does not start with `.`, and ends in `.sen`, assigning each a priority
/// under `priority_option`.
pub fn enumerate_files(
    work_dir: &Path,
    priority_option: PriorityOption,
) -> Result<Vec<FileDescriptor>, SchedError> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(work_dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if !file_type.is_file() {
            continue;
        }

        let name = entry.file_name();
        let name = match name.to_str() {
            Some(n) => n,
            None => continue,
        };

        if !is_valid_file_name(name) {
            continue;
        }

        let metadata = entry.metadata()?;
        let priority = priority_option.priority_for(name);

        files.push(FileDescriptor {
            path: entry.path().to_string_lossy().into_owned(),
            size: metadata.len(),
            priority,
        });
    }

    Ok(files)
}

/// A file is eligible when its name does not start with `.` and ends in
/// `.sen`.
fn is_valid_file_name(name: &str) -> bool {
    !name.starts_with('.') && name.ends_with(".sen")
}
