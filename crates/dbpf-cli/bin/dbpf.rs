//! `dbpf` binary entry point.
//!
//! Parses arguments, initializes logging and runs the selected command.
//! For library usage, see the dbpf-cli crate documentation.

use anyhow::Result;
use clap::Parser;
use dbpf_cli::{Cli, run};
use std::io::{self, Write};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise info, or debug with -v
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run(&cli, &mut out)?;
    out.flush()?;
    Ok(())
}
