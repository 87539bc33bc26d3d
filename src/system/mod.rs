//! # System Interaction Layer
//!
//! Boundary between the Perforce logic and the operating system.
//!
//! - **`process_runner`**: spawns `p4`, `p4v` and `p4vc`, enforcing timeouts and capturing
//!   output. Exposed through the `CommandRunner` trait.
//! - **`dispatch`**: the background queue that serializes dispatch of scheduled commands
//!   and runs each one on its own thread.

pub mod dispatch;
pub mod process_runner;

#[cfg(test)]
pub(crate) mod fake;
