// src/cli/handlers/delete.rs

//! `nifty delete`: marks files for delete.

use crate::cli::handlers::commons;
use crate::cli::session::Session;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Marks files for delete.")]
struct DeleteArgs {
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

/// Submits `p4 delete` for each file.
pub fn handle(args: Vec<String>, session: &Session) -> Result<()> {
    let args = DeleteArgs::try_parse_from(&args)?;
    for path in commons::resolve_targets(&args.files) {
        session.record(session.ops().delete_file(&path));
    }
    Ok(())
}
