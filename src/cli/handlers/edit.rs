// src/cli/handlers/edit.rs

//! `nifty edit` and `nifty edit-modified`.

use crate::cli::handlers::commons;
use crate::cli::session::Session;
use crate::core::perforce::EditOptions;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    about = "Opens files for edit, together with their companion files."
)]
struct EditArgs {
    /// Files to open for edit.
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Edit even when the file is already writable.
    #[arg(short, long)]
    force: bool,
    /// Try synchronously first, the way an editor does on save.
    #[arg(long)]
    immediate: bool,
}

#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    about = "Opens every modified document for edit (read-only files only)."
)]
struct EditModifiedArgs {
    /// The modified documents.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

/// The handler for `edit`.
pub fn handle(args: Vec<String>, session: &Session) -> Result<()> {
    let args = EditArgs::try_parse_from(&args)?;
    let options = EditOptions {
        immediate: args.immediate,
        force: args.force,
    };
    for path in commons::resolve_targets(&args.files) {
        session.record_all(session.ops().edit_file(&path, options).into_results());
    }
    Ok(())
}

/// The handler for `edit-modified`.
pub fn handle_modified(args: Vec<String>, session: &Session) -> Result<()> {
    let args = EditModifiedArgs::try_parse_from(&args)?;
    let paths = commons::resolve_targets(&args.files);
    for result in session.ops().edit_modified(&paths) {
        session.record_all(result.into_results());
    }
    Ok(())
}
