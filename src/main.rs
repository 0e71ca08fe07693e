mod aggregate;
mod batch;
mod cache;
mod cli;
mod coverage;
mod distribution;
mod finder;
mod gremlin;
mod hasher;
mod instrument;
mod operators;
mod options;
mod orchestrator;
mod out;
mod pool;
mod project;
mod report;
mod results;
mod run_report;
mod runner;
mod selector;
mod source;
mod store;
mod syntax;
mod ui;
mod worker;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

/// Entry point for the `gremlins` binary.
fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    cli::run()
}
