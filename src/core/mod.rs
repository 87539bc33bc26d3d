//! # Perforce Core
//!
//! Everything between an editor request and a dispatched command line.
//!
//! - **`perforce`**: `P4Operations`, the command formatter. Owns the settings, the tool
//!   availability, the token lock and the dispatcher.
//! - **`token_lock`**: rejects a second operation of the same kind on the same file
//!   while the first is in flight.
//! - **`tools`**, **`connection`**, **`remap`**, **`companions`**: discovery and lookups the
//!   formatter builds on.
//! - **`auto_features`**: editor notifications mapped to operations.
//! - **`settings`**, **`paths`**: the TOML settings file and where it lives.

pub mod auto_features;
pub mod commons;
pub mod companions;
pub mod connection;
pub mod notify;
pub mod paths;
pub mod perforce;
pub mod remap;
pub mod settings;
pub mod token_lock;
pub mod tools;
