use anyhow::Result;
use clap::Parser;
use scratchtext_core::cli::Args;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();

    let args = Args::parse();
    scratchtext_core::run_cli(&args)
}
