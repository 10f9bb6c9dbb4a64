mod archive_listener;
mod enumerate;
mod run;

use anyhow::Result;
use clap::Parser;
use fsched_config::logging::{init_logging, LogLevel};
use fsched_config::CoordinatorCli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CoordinatorCli::parse();
    init_logging(LogLevel::from_verbosity(cli.verbose));

    let summary = run::run(cli).await?;
    tracing::info!(
        files_enumerated = summary.files_enumerated,
        files_archived = summary.files_archived,
        archive_failures = summary.archive_failures,
        "fsched-coordinator finished"
    );
    Ok(())
}
