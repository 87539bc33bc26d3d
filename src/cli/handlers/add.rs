// src/cli/handlers/add.rs

//! `nifty add`: marks files for add.

use crate::cli::handlers::commons;
use crate::cli::session::Session;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Marks files for add.")]
struct AddArgs {
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

/// Submits `p4 add` for each file.
pub fn handle(args: Vec<String>, session: &Session) -> Result<()> {
    let args = AddArgs::try_parse_from(&args)?;
    for path in commons::resolve_targets(&args.files) {
        session.record(session.ops().add_file(&path));
    }
    Ok(())
}
