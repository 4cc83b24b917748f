use anyhow::Result;
use clap::Parser;
use orderledger::cli::Cli;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output on stdout stays machine-readable.
    // Override with RUST_LOG, e.g. RUST_LOG=orderledger=debug
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("orderledger=info")),
        )
        .init();

    let cli = Cli::parse();
    cli.run().await
}
