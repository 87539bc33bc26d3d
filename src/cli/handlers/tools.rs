// src/cli/handlers/tools.rs

//! `nifty tools`: the discovery report.

use crate::cli::session::Session;
use anyhow::Result;
use clap::Parser;
use colored::*;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Shows which Perforce tools were found.")]
struct ToolsArgs {
    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

/// Prints the tool discovery report, as text or JSON.
pub fn handle(args: Vec<String>, session: &Session) -> Result<()> {
    let args = ToolsArgs::try_parse_from(&args)?;
    let tools = session.ops().tools();

    if args.json {
        println!("{}", serde_json::to_string_pretty(tools.as_ref())?);
        return Ok(());
    }

    println!("\n--- {} ---", t!("tools.header").yellow());
    match &tools.install_root {
        Some(root) => println!(
            "  {:<15} {}",
            t!("tools.label.install_root").blue(),
            root.display()
        ),
        None => println!(
            "  {:<15} {}",
            t!("tools.label.install_root").blue(),
            t!("tools.value.path_search").dimmed()
        ),
    }
    for (found, description) in tools.report() {
        if found {
            println!("  [{}] {}", "X".green(), description);
        } else {
            println!("  [ ] {}", description.dimmed());
        }
    }
    Ok(())
}
