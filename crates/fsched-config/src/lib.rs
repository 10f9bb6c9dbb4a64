//! Configuration, CLI parsing, and structured logging shared by the
//! `fsched-coordinator` and `fsched-worker` binaries.

pub mod logging;

use clap::{ArgGroup, Parser};
use fsched_scheduler::SchedPolicy;
use std::path::PathBuf;

/// Library-level failures shared by the coordinator and worker: bad
/// configuration, and the I/O failures that enumeration and archiving can
/// hit (opening a file, renaming into the archive directory).
#[derive(Debug, thiserror::Error)]
pub enum SchedError {
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How file priority is derived from a file's name during enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityOption {
    /// Every file gets priority 1.
    NoPriority,
    /// Priority is `-T`, where `T` is the integer found one character past
    /// the first `_` in the file's name (0 if absent or unparseable), so a
    /// numerically smaller `T` (older) dispatches first.
    OldestFirst,
}

impl Default for PriorityOption {
    fn default() -> Self {
        PriorityOption::NoPriority
    }
}

impl PriorityOption {
    /// Compute the priority of `file_name` under this option.
    pub fn priority_for(self, file_name: &str) -> i64 {
        match self {
            PriorityOption::NoPriority => 1,
            PriorityOption::OldestFirst => {
                let t = file_name
                    .find('_')
                    .and_then(|idx| file_name.get(idx + 1..))
                    .map(|rest| {
                        let digits: String =
                            rest.chars().take_while(|c| c.is_ascii_digit()).collect();
                        digits.parse::<i64>().unwrap_or(0)
                    })
                    .unwrap_or(0);
                -t
            }
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "fsched-coordinator")]
#[command(version, about = "Dispatches .sen files from a work directory to a pool of workers")]
#[command(group(ArgGroup::new("policy").args(["cyclic", "block", "random", "queue_size", "queue_length"])))]
#[command(group(ArgGroup::new("priority").args(["no_priority", "oldest_first"])))]
pub struct CoordinatorCli {
    /// Directory to scan for `.sen` files.
    pub work_dir: PathBuf,

    /// Directory matched files are archived into.
    pub archive_dir: PathBuf,

    /// Key to search for within each file's `key=value` lines.
    pub search_key: String,

    /// Number of worker connections to accept before dispatch begins.
    #[arg(long)]
    pub workers: usize,

    /// Path of the Unix domain socket to listen on. Defaults to a path
    /// under the system temp directory when omitted.
    #[arg(long)]
    pub socket: Option<PathBuf>,

    #[arg(short = 'c', long, help = "Round-robin dispatch (default)")]
    pub cyclic: bool,
    #[arg(short = 'b', long, help = "Dispatch files in contiguous blocks per worker")]
    pub block: bool,
    #[arg(short = 'r', long, help = "Dispatch to a uniformly random worker")]
    pub random: bool,
    #[arg(long = "qs", help = "Dispatch to the worker with the smallest reported queue size")]
    pub queue_size: bool,
    #[arg(long = "ql", help = "Dispatch to the worker with the shortest reported queue length")]
    pub queue_length: bool,

    #[arg(short = 'n', long = "no-priority", help = "Every file has equal priority (default)")]
    pub no_priority: bool,
    #[arg(long = "op", help = "Prioritize files by an embedded sequence number, oldest first")]
    pub oldest_first: bool,

    /// Increase log verbosity. Repeatable.
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl CoordinatorCli {
    pub fn policy(&self) -> SchedPolicy {
        if self.block {
            SchedPolicy::Block
        } else if self.random {
            SchedPolicy::Random
        } else if self.queue_size {
            SchedPolicy::QueueSize
        } else if self.queue_length {
            SchedPolicy::QueueLength
        } else {
            SchedPolicy::Cyclic
        }
    }

    pub fn priority_option(&self) -> PriorityOption {
        if self.oldest_first {
            PriorityOption::OldestFirst
        } else {
            PriorityOption::NoPriority
        }
    }

    pub fn socket_path(&self) -> PathBuf {
        self.socket.clone().unwrap_or_else(default_socket_path)
    }

    /// Reject configuration that parses fine but can never run, such as a
    /// worker count of zero. `clap`'s `ArgGroup`s already rule out
    /// conflicting policy/priority flags; this covers what they can't.
    pub fn validate(&self) -> Result<(), SchedError> {
        if self.workers == 0 {
            return Err(SchedError::InvalidConfig {
                reason: "--workers must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(name = "fsched-worker")]
#[command(version, about = "Processes files assigned by a coordinator, archiving key matches")]
pub struct WorkerCli {
    /// Path of the coordinator's Unix domain socket.
    #[arg(long)]
    pub socket: PathBuf,

    /// Key to search for within each assigned file's `key=value` lines.
    /// Must match the coordinator's search key for this run.
    #[arg(long)]
    pub search_key: String,

    /// Report local queue size/length back to the coordinator after every
    /// assignment. Set this when the coordinator was started with `--qs`
    /// or `--ql`; every worker in a run must agree on this flag the same
    /// way every rank in the original shared one `sched_type` argument.
    #[arg(long)]
    pub report_feedback: bool,

    /// Increase log verbosity. Repeatable.
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn default_socket_path() -> PathBuf {
    std::env::temp_dir().join(format!("fsched-{}.sock", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_priority_is_always_one() {
        assert_eq!(PriorityOption::NoPriority.priority_for("a_99.sen"), 1);
        assert_eq!(PriorityOption::NoPriority.priority_for("whatever.sen"), 1);
    }

    #[test]
    fn oldest_first_extracts_sequence_after_first_underscore() {
        assert_eq!(PriorityOption::OldestFirst.priority_for("f_10.sen"), -10);
        assert_eq!(PriorityOption::OldestFirst.priority_for("f_200.sen"), -200);
    }

    #[test]
    fn oldest_first_falls_back_to_zero_when_unparseable() {
        assert_eq!(PriorityOption::OldestFirst.priority_for("noundersore.sen"), 0);
        assert_eq!(PriorityOption::OldestFirst.priority_for("f_abc.sen"), 0);
    }

    #[test]
    fn oldest_first_orders_smaller_sequence_higher() {
        let older = PriorityOption::OldestFirst.priority_for("f_10.sen");
        let newer = PriorityOption::OldestFirst.priority_for("f_20.sen");
        assert!(older > newer);
    }

    #[test]
    fn coordinator_cli_parses_policy_flags() {
        let cli = CoordinatorCli::parse_from([
            "fsched-coordinator",
            "/work",
            "/archive",
            "key",
            "--workers",
            "3",
            "-b",
        ]);
        assert_eq!(cli.policy(), fsched_scheduler::SchedPolicy::Block);
    }

    #[test]
    fn coordinator_cli_defaults_to_cyclic_and_no_priority() {
        let cli = CoordinatorCli::parse_from([
            "fsched-coordinator",
            "/work",
            "/archive",
            "key",
            "--workers",
            "2",
        ]);
        assert_eq!(cli.policy(), fsched_scheduler::SchedPolicy::Cyclic);
        assert_eq!(cli.priority_option(), PriorityOption::NoPriority);
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let cli = CoordinatorCli::parse_from([
            "fsched-coordinator",
            "/work",
            "/archive",
            "key",
            "--workers",
            "0",
        ]);
        assert!(matches!(cli.validate(), Err(SchedError::InvalidConfig { .. })));
    }

    #[test]
    fn validate_accepts_at_least_one_worker() {
        let cli = CoordinatorCli::parse_from([
            "fsched-coordinator",
            "/work",
            "/archive",
            "key",
            "--workers",
            "1",
        ]);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn default_socket_path_is_under_temp_dir() {
        let path = default_socket_path();
        assert!(path.starts_with(std::env::temp_dir()));
    }
}
