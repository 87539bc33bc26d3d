// src/cli/handlers/connection.rs

//! `nifty connection`: shows the connection GUI tools would get.

use crate::cli::handlers::commons;
use crate::cli::session::Session;
use crate::core::connection;
use crate::core::settings::LookupSource;
use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use colored::*;
use std::path::PathBuf;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Set,
    Info,
}

impl From<Source> for LookupSource {
    fn from(source: Source) -> Self {
        match source {
            Source::Set => Self::Set,
            Source::Info => Self::Info,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    about = "Shows the server, user and client the visual tools connect with."
)]
struct ConnectionArgs {
    /// Directory to discover the connection for. Defaults to the current directory.
    #[arg(long)]
    dir: Option<PathBuf>,
    /// Query to try first. Defaults to `connection.lookup` in the settings.
    #[arg(long, value_enum)]
    source: Option<Source>,
}

/// Prints the connection parameters for a directory.
pub fn handle(args: Vec<String>, session: &Session) -> Result<()> {
    let args = ConnectionArgs::try_parse_from(&args)?;
    let dir = commons::resolve_target(&args.dir.unwrap_or_else(|| PathBuf::from(".")));
    let settings = &session.settings().connection;

    let params = if settings.use_system_env {
        let p4 = session
            .ops()
            .tools()
            .p4
            .clone()
            .ok_or_else(|| anyhow!(t!("notice.p4_missing")))?;
        let order = args.source.map(LookupSource::from).unwrap_or(settings.lookup);
        connection::discover(session.ops().runner().as_ref(), &p4, &dir, order)
    } else {
        println!("{}", t!("connection.static").dimmed());
        settings.static_params()
    };

    if params.is_empty() {
        println!("{}", t!("connection.none").yellow());
        return Ok(());
    }
    println!("  {:<10} {}", t!("connection.label.server").blue(), params.server);
    println!("  {:<10} {}", t!("connection.label.user").blue(), params.user);
    println!("  {:<10} {}", t!("connection.label.client").blue(), params.client);
    println!("  {:<10} {}", t!("connection.label.args").blue(), params);
    Ok(())
}
