//! childproc - run a child process through one of the adapter operations.
//!
//! Prints the captured output, or the failure and its stderr, and exits with
//! the child's exit code. `--json` prints the whole result record instead.

mod cli;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{execute, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("childproc=warn"))?;
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let code = execute(cli).await?;
    std::process::exit(code);
}
