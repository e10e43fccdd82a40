//! Tally CLI

use std::process::ExitCode;

use clap::Parser;
use tally::logging;

mod cli;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    if let Err(error) = logging::init(cli.logging()) {
        eprintln!("{error}");
        return ExitCode::FAILURE;
    }

    match cli.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}
