//! # nifty-p4
//!
//! Perforce integration core for editors and IDE hosts. The crate never speaks the
//! Perforce protocol; it formats `p4`, `p4v` and `p4vc` command lines, runs them off
//! the caller's thread, and makes sure at most one operation per (kind, file) pair
//! is in flight at any time.

include!(concat!(env!("OUT_DIR"), "/translations.rs"));

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod system;
