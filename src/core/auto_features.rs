// src/core/auto_features.rs

//! Reactions to editor notifications: checkout on edit or save, add and delete on
//! project changes. Each reaction is switched on or off in the settings.

use crate::core::perforce::{EditOptions, OperationResult, P4Operations};
use std::path::PathBuf;

/// A notification forwarded by the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Files were added to `project`.
    ItemAdded {
        /// The project file.
        project: PathBuf,
        /// The files added.
        files: Vec<PathBuf>,
    },
    /// Files were removed from `project`.
    ItemRemoved {
        /// The project file.
        project: PathBuf,
        /// The files removed.
        files: Vec<PathBuf>,
    },
    /// `project` was added to `solution`.
    ProjectAdded {
        /// The solution file.
        solution: PathBuf,
        /// The project file.
        project: PathBuf,
    },
    /// `project` was removed from `solution`.
    ProjectRemoved {
        /// The solution file.
        solution: PathBuf,
        /// The project file.
        project: PathBuf,
    },
    /// A document is about to be saved.
    BeforeSave(PathBuf),
    /// The first edit of a document's buffer.
    TextEdited(PathBuf),
    /// The project's properties changed.
    ProjectChanged(PathBuf),
}

impl HostEvent {
    /// Event name, as accepted by `nifty hook`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ItemAdded { .. } => "item-added",
            Self::ItemRemoved { .. } => "item-removed",
            Self::ProjectAdded { .. } => "project-added",
            Self::ProjectRemoved { .. } => "project-removed",
            Self::BeforeSave(_) => "before-save",
            Self::TextEdited(_) => "text-edited",
            Self::ProjectChanged(_) => "project-changed",
        }
    }
}

/// Maps [`HostEvent`]s to operations according to the settings.
#[derive(Debug)]
pub struct AutoFeatures<'a> {
    ops: &'a P4Operations,
}

impl<'a> AutoFeatures<'a> {
    /// Reacts using `ops` and its settings.
    pub fn new(ops: &'a P4Operations) -> Self {
        Self { ops }
    }

    /// Applies `event`. Returns one result per attempted operation; empty when the
    /// matching setting is off.
    pub fn handle(&self, event: &HostEvent) -> Vec<OperationResult> {
        let settings = self.ops.settings();
        let enabled = match event {
            HostEvent::ItemAdded { .. } | HostEvent::ProjectAdded { .. } => settings.auto_add,
            HostEvent::ItemRemoved { .. } | HostEvent::ProjectRemoved { .. } => {
                settings.auto_delete
            }
            HostEvent::BeforeSave(_) => settings.auto_checkout_on_save,
            HostEvent::TextEdited(_) => settings.auto_checkout_on_edit,
            HostEvent::ProjectChanged(_) => settings.auto_checkout_project,
        };
        if !enabled {
            log::debug!("Ignoring '{}': the feature is turned off.", event.name());
            return Vec::new();
        }

        let edit = |path: &PathBuf| {
            self.ops
                .edit_file(path, EditOptions::default())
                .into_results()
        };
        match event {
            HostEvent::ItemAdded { project, files } => {
                let mut results = edit(project);
                results.extend(
                    files
                        .iter()
                        .filter(|file| file.is_file())
                        .map(|file| self.ops.add_file(file)),
                );
                results
            }
            HostEvent::ItemRemoved { project, files } => {
                let mut results = edit(project);
                results.extend(files.iter().map(|file| self.ops.delete_file(file)));
                results
            }
            HostEvent::ProjectAdded { solution, project } => {
                let mut results = edit(solution);
                results.push(self.ops.add_file(project));
                results
            }
            HostEvent::ProjectRemoved { solution, project } => {
                let mut results = edit(solution);
                results.push(self.ops.delete_file(project));
                results
            }
            HostEvent::BeforeSave(path) => self.ops.edit_file_immediate(path).into_results(),
            HostEvent::TextEdited(path) | HostEvent::ProjectChanged(path) => edit(path),
        }
    }
}
