// src/cli/dispatcher.rs

//! Maps `nifty <action>` to the handler of that action.

use crate::cli::{handlers, session::Session};
use anyhow::{Result, anyhow};

/// A CLI action, its aliases and its handler.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>, &Session) -> Result<()>,
}

/// Every action `nifty` understands.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "edit",
        aliases: &["checkout", "co"],
        handler: handlers::edit::handle,
    },
    CommandDefinition {
        name: "edit-modified",
        aliases: &[],
        handler: handlers::edit::handle_modified,
    },
    CommandDefinition {
        name: "add",
        aliases: &[],
        handler: handlers::add::handle,
    },
    CommandDefinition {
        name: "delete",
        aliases: &["del", "rm"],
        handler: handlers::delete::handle,
    },
    CommandDefinition {
        name: "revert",
        aliases: &[],
        handler: handlers::revert::handle,
    },
    CommandDefinition {
        name: "diff",
        aliases: &[],
        handler: handlers::views::handle_diff,
    },
    CommandDefinition {
        name: "history",
        aliases: &["log"],
        handler: handlers::views::handle_history,
    },
    CommandDefinition {
        name: "timelapse",
        aliases: &["tlv"],
        handler: handlers::views::handle_timelapse,
    },
    CommandDefinition {
        name: "revgraph",
        aliases: &["revisiongraph"],
        handler: handlers::views::handle_revgraph,
    },
    CommandDefinition {
        name: "show",
        aliases: &[],
        handler: handlers::views::handle_show,
    },
    CommandDefinition {
        name: "remap",
        aliases: &[],
        handler: handlers::remap::handle,
    },
    CommandDefinition {
        name: "hook",
        aliases: &[],
        handler: handlers::hook::handle,
    },
    CommandDefinition {
        name: "tools",
        aliases: &[],
        handler: handlers::tools::handle,
    },
    CommandDefinition {
        name: "connection",
        aliases: &["conn"],
        handler: handlers::connection::handle,
    },
    CommandDefinition {
        name: "config",
        aliases: &[],
        handler: handlers::config::handle,
    },
];

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Routes `nifty <action> [args...]` to the action's handler.
pub fn dispatch(all_args: Vec<String>, session: &Session) -> Result<()> {
    log::debug!("Dispatching args: {:?}", all_args);

    let mut args = all_args.into_iter();
    let action = args.next().ok_or_else(|| anyhow!(t!("cli.error.no_action")))?;
    let command = find_command(&action)
        .ok_or_else(|| anyhow!(t!("cli.error.unknown_action"), action = action))?;

    (command.handler)(args.collect(), session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_and_aliases_are_unique() {
        let mut seen = HashSet::new();
        for cmd in COMMAND_REGISTRY {
            assert!(seen.insert(cmd.name), "duplicate name {}", cmd.name);
            for alias in cmd.aliases {
                assert!(seen.insert(*alias), "duplicate alias {}", alias);
            }
        }
    }

    #[test]
    fn test_aliases_resolve_to_their_command() {
        assert_eq!(find_command("co").map(|c| c.name), Some("edit"));
        assert_eq!(find_command("tlv").map(|c| c.name), Some("timelapse"));
        assert!(find_command("edit-modified").is_some());
        assert!(find_command("submit").is_none());
    }
}
