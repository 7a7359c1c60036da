mod cli;

use std::path::PathBuf;

use anyhow::Result;
use bmagent::{config::Config, logging};
use clap::Parser;

use crate::cli::Command;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Config file to read instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.command.folder());

    let config = Config::load(args.config)?;
    cli::run(args.command, &config)
}
