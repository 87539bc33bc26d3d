// src/bin/nifty.rs

//! `nifty`: Perforce operations from the command line or an editor hook.

use anyhow::Result;
use clap::{CommandFactory, Parser};
use colored::*;
use nifty_p4::cli::{Cli, dispatcher, session::Session};
use nifty_p4::t;

/// Sets up logging, parses arguments, runs the action and waits for every operation
/// it submitted. Exit codes: 0 success, 1 error, 2 when an operation failed.
fn main() {
    env_logger::init();

    match run_cli(Cli::parse()) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            // Argument errors and `--help` of an action are rendered by clap itself.
            if let Some(clap_err) = e.downcast_ref::<clap::Error>() {
                clap_err.exit();
            }
            eprintln!("\n{}: {:#}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn run_cli(cli: Cli) -> Result<i32> {
    log::debug!("CLI args parsed: {:?}", cli);

    if cli.args.is_empty() {
        Cli::command().print_help()?;
        return Ok(0);
    }

    let session = Session::open(cli.config)?;
    dispatcher::dispatch(cli.args, &session)?;

    let summary = session.wait_all();
    log::debug!("Summary: {:?}", summary);
    if summary.failed > 0 {
        eprintln!(
            "{}",
            format!(t!("summary.failed"), failed = summary.failed).red()
        );
        return Ok(2);
    }
    Ok(0)
}
