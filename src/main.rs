//! fleet-merge CLI

mod cli;

use anstream::eprintln;
use clap::Parser;
use cli::{Cli, Stylize};
use std::process::ExitCode;

/// Exit code for failures that stop the run before any task finishes
const FATAL_EXIT_CODE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli::run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{} {e:#}", "error:".error());
            ExitCode::from(FATAL_EXIT_CODE)
        }
    }
}
