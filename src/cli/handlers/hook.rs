// src/cli/handlers/hook.rs

//! `nifty hook`: editor notifications routed through the auto features.

use crate::cli::handlers::commons;
use crate::cli::session::Session;
use crate::core::auto_features::{AutoFeatures, HostEvent};
use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum EventName {
    ItemAdded,
    ItemRemoved,
    ProjectAdded,
    ProjectRemoved,
    BeforeSave,
    TextEdited,
    ProjectChanged,
}

#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    about = "Forwards an editor event; the matching automatic feature decides what to run."
)]
struct HookArgs {
    event: EventName,
    /// The project the files belong to (item events) or the project file (project events).
    #[arg(long)]
    project: Option<PathBuf>,
    /// The solution a project was added to or removed from.
    #[arg(long)]
    solution: Option<PathBuf>,
    /// The affected files.
    files: Vec<PathBuf>,
}

fn required(value: Option<PathBuf>, flag: &str, event: EventName) -> Result<PathBuf> {
    value
        .map(|p| commons::resolve_target(&p))
        .ok_or_else(|| {
            anyhow!(
                t!("hook.error.missing_flag"),
                flag = flag,
                event = format!("{:?}", event)
            )
        })
}

fn single_file(files: &[PathBuf], event: EventName) -> Result<PathBuf> {
    match files {
        [file] => Ok(commons::resolve_target(file)),
        _ => Err(anyhow!(
            t!("hook.error.single_file"),
            event = format!("{:?}", event)
        )),
    }
}

fn build_event(args: HookArgs) -> Result<HostEvent> {
    let event = args.event;
    Ok(match event {
        EventName::ItemAdded => HostEvent::ItemAdded {
            project: required(args.project, "--project", event)?,
            files: commons::resolve_targets(&args.files),
        },
        EventName::ItemRemoved => HostEvent::ItemRemoved {
            project: required(args.project, "--project", event)?,
            files: commons::resolve_targets(&args.files),
        },
        EventName::ProjectAdded => HostEvent::ProjectAdded {
            solution: required(args.solution, "--solution", event)?,
            project: required(args.project, "--project", event)?,
        },
        EventName::ProjectRemoved => HostEvent::ProjectRemoved {
            solution: required(args.solution, "--solution", event)?,
            project: required(args.project, "--project", event)?,
        },
        EventName::BeforeSave => HostEvent::BeforeSave(single_file(&args.files, event)?),
        EventName::TextEdited => HostEvent::TextEdited(single_file(&args.files, event)?),
        EventName::ProjectChanged => {
            HostEvent::ProjectChanged(required(args.project, "--project", event)?)
        }
    })
}

/// The handler for `hook`.
pub fn handle(args: Vec<String>, session: &Session) -> Result<()> {
    let event = build_event(HookArgs::try_parse_from(&args)?)?;
    log::debug!("Host event: {:?}", event);
    session.record_all(AutoFeatures::new(session.ops()).handle(&event));
    Ok(())
}
