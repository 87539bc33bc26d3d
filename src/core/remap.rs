// src/core/remap.rs

//! Maps a branch file to its counterpart on the mainline using `p4 integrated`.

use crate::system::process_runner::ExecutionError;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref INTEGRATED_LINE: Regex =
        Regex::new(r"//(.*)#\d+ - .*//([^#]+)#\d+").expect("valid p4 integrated regex");
}

/// Why a file could not be remapped to its mainline version.
#[derive(Error, Debug)]
pub enum RemapError {
    /// No mainline path is configured.
    #[error("Cannot find the mainline version of '{0}': the mainline path is empty.")]
    EmptyMainline(String),
    /// `p4` was not found.
    #[error("Cannot find the mainline version of '{0}': p4 is not available.")]
    P4Missing(String),
    /// `p4 integrated` failed.
    #[error("Could not query the integration history of '{path}': {source}")]
    Query {
        /// The file being remapped.
        path: String,
        /// The runner error.
        #[source]
        source: ExecutionError,
    },
}

/// Picks the mainline target out of `p4 integrated` output.
///
/// Each line looks like `//branch/foo.cs#3 - branch from //main/foo.cs#1`. The first
/// target (lower-cased) that starts with `mainline` wins. Without a match `filename` is
/// returned unchanged.
pub fn remap_from_integrated(
    output: &str,
    filename: &str,
    mainline: &str,
) -> Result<String, RemapError> {
    if mainline.is_empty() {
        return Err(RemapError::EmptyMainline(filename.to_string()));
    }
    let mainline = mainline.to_lowercase();

    let found = INTEGRATED_LINE
        .captures_iter(output)
        .filter_map(|caps| caps.get(2))
        .map(|target| format!("//{}", target.as_str()).to_lowercase())
        .find(|candidate| candidate.starts_with(&mainline));

    match found {
        Some(candidate) => {
            log::debug!("Mainline version of '{}' is '{}'", filename, candidate);
            Ok(candidate)
        }
        None => {
            log::debug!("No integration of '{}' from '{}'", filename, mainline);
            Ok(filename.to_string())
        }
    }
}
