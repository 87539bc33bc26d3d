// src/cli/handlers/mod.rs

//! One module per CLI action.

pub mod add;
pub mod commons;
pub mod config;
pub mod connection;
pub mod delete;
pub mod edit;
pub mod hook;
pub mod remap;
pub mod revert;
pub mod tools;
pub mod views;
