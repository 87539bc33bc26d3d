// src/cli/handlers/remap.rs

//! `nifty remap`: prints the mainline version of a file.

use crate::cli::handlers::commons;
use crate::cli::session::Session;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    about = "Prints the mainline depot path a branch file was integrated from."
)]
struct RemapArgs {
    file: PathBuf,
    /// Mainline depot path, e.g. `//depot/main/`. Defaults to `mainline_path`.
    #[arg(long)]
    mainline: Option<String>,
}

/// Prints the mainline depot path of each file.
pub fn handle(args: Vec<String>, session: &Session) -> Result<()> {
    let args = RemapArgs::try_parse_from(&args)?;
    let path = commons::resolve_target(&args.file);
    let remapped = session
        .ops()
        .remap_to_main(&path, args.mainline.as_deref())?;
    println!("{}", remapped);
    Ok(())
}
