// src/cli/handlers/views.rs

//! Handlers that open a Perforce viewer: diff, history, time-lapse, revision graph, show.

use crate::cli::handlers::commons;
use crate::cli::session::Session;
use crate::core::perforce::{OperationResult, P4Operations};
use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(no_binary_name = true)]
struct ViewArgs {
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Open the mainline version instead (see `mainline_path` in the settings).
    #[arg(short, long)]
    mainline: bool,
}

#[derive(Parser, Debug)]
#[command(no_binary_name = true)]
struct FileArgs {
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn run_view(
    args: Vec<String>,
    session: &Session,
    operation: fn(&P4Operations, &Path, bool) -> OperationResult,
) -> Result<()> {
    let args = ViewArgs::try_parse_from(&args)?;
    for path in commons::resolve_targets(&args.files) {
        session.record(operation(session.ops(), &path, args.mainline));
    }
    Ok(())
}

fn run_plain(
    args: Vec<String>,
    session: &Session,
    operation: fn(&P4Operations, &Path) -> OperationResult,
) -> Result<()> {
    let args = FileArgs::try_parse_from(&args)?;
    for path in commons::resolve_targets(&args.files) {
        session.record(operation(session.ops(), &path));
    }
    Ok(())
}

/// The handler for `diff`.
pub fn handle_diff(args: Vec<String>, session: &Session) -> Result<()> {
    run_plain(args, session, P4Operations::diff_file)
}

/// The handler for `history`.
pub fn handle_history(args: Vec<String>, session: &Session) -> Result<()> {
    run_view(args, session, P4Operations::revision_history)
}

/// The handler for `timelapse`.
pub fn handle_timelapse(args: Vec<String>, session: &Session) -> Result<()> {
    run_view(args, session, P4Operations::time_lapse)
}

/// The handler for `revgraph`.
pub fn handle_revgraph(args: Vec<String>, session: &Session) -> Result<()> {
    run_view(args, session, P4Operations::revision_graph)
}

/// The handler for `show`.
pub fn handle_show(args: Vec<String>, session: &Session) -> Result<()> {
    run_plain(args, session, P4Operations::show_in_workspace)
}
