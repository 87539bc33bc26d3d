// src/cli/handlers/revert.rs

//! `nifty revert`, with a confirmation prompt.

use crate::cli::handlers::commons;
use crate::cli::session::Session;
use anyhow::Result;
use clap::Parser;
use colored::*;
use dialoguer::{Confirm, theme::ColorfulTheme};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Reverts opened files.")]
struct RevertArgs {
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Only revert files that have not been changed (`p4 revert -a`). Never asks.
    #[arg(short = 'a', long)]
    unchanged: bool,
    /// Do not ask for confirmation.
    #[arg(short, long)]
    yes: bool,
}

/// The handler for `revert`. Reverting discards local changes, so each file is
/// confirmed first unless `--unchanged` or `--yes` is given.
pub fn handle(args: Vec<String>, session: &Session) -> Result<()> {
    let args = RevertArgs::try_parse_from(&args)?;
    for path in commons::resolve_targets(&args.files) {
        if !args.unchanged && !args.yes {
            let confirmed = Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(format!(
                    t!("revert.prompt.confirm"),
                    path = path.display()
                ))
                .default(false)
                .interact()?;
            if !confirmed {
                println!("{}", t!("revert.cancelled").dimmed());
                continue;
            }
        }
        session.record(session.ops().revert_file(&path, args.unchanged));
    }
    Ok(())
}
