mod arcs;
mod candidates;
mod cli;
mod commands;
mod error;
mod evaluate;
mod model;
mod recommend;
mod semantic;
mod similarity;
mod store;
#[cfg(test)]
mod test_support;
mod tfidf;
mod util;
mod vectors;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let store = &cli.store;

    match cli.command {
        Commands::Import(args) => commands::import::run(args, store),
        Commands::Vectorize(args) => commands::vectorize::run(args, store),
        Commands::Sample(args) => commands::sample::run(args, store),
        Commands::Arcs(args) => commands::arcs::run(args, store),
        Commands::Recommend(args) => commands::recommend::run(args, store),
        Commands::Evaluate(args) => commands::evaluate::run(args, store),
        Commands::Status => commands::status::run(store),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
