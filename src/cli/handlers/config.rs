// src/cli/handlers/config.rs

//! `nifty config`: prints the settings file in use.

use crate::cli::session::Session;
use anyhow::Result;
use clap::Parser;
use colored::*;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Shows the settings file and its values.")]
struct ConfigArgs {
    /// Only print the settings file path.
    #[arg(long)]
    path: bool,
}

/// Prints the settings path, or the settings themselves.
pub fn handle(args: Vec<String>, session: &Session) -> Result<()> {
    let args = ConfigArgs::try_parse_from(&args)?;
    if args.path {
        println!("{}", session.settings_path().display());
        return Ok(());
    }
    println!(
        "# {} {}\n",
        t!("config.label.file").dimmed(),
        session.settings_path().display()
    );
    println!("{}", session.settings().to_toml()?);
    Ok(())
}
