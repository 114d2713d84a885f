#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use reel_cli::{logging, serve};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "reel")]
#[command(author, version, about = "Build-and-serve development tool for reel animation projects", long_about = None)]
struct Cli {
    /// Project entry file
    project: PathBuf,

    /// Also bundle the companion editor UI
    #[arg(long)]
    ui: bool,

    /// Destination directory for rendered artifacts
    #[arg(long, short = 'o', default_value = "output")]
    output: PathBuf,

    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit JSON formatted logs (stable, machine-readable)
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose, cli.json);

    let action = serve::ServeAction {
        project: cli.project,
        ui: cli.ui,
        output: cli.output,
        cwd: std::env::current_dir().into_diagnostic()?,
    };

    serve::run(action).await
}
