// SPDX-License-Identifier: MIT OR Apache-2.0
//! `shadelib` - shader library command-line tool
//!
//! Lists library folders, inspects and validates shading network files, and
//! writes default library settings. Log verbosity follows `RUST_LOG`.

mod commands;

use clap::Parser;
use commands::Cli;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("shadelib=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("shadelib v{}", env!("CARGO_PKG_VERSION"));

    // Usage errors exit with 1 like every other failure; help and version exit with 0
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(1);
        }
        Err(e) => e.exit(),
    };
    if let Err(e) = cli.command.run(&mut std::io::stdout().lock()) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
