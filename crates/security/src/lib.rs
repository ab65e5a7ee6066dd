//! Security policies for memloop tools.
//!
//! Provides:
//! - **Command allowlist**: which base commands `execute_command` may run
//! - **Path validation**: keep file tools away from forbidden locations

pub mod command;
pub mod path;

pub use command::{CommandPolicy, CommandRejected, DEFAULT_ALLOWED_COMMANDS};
pub use path::{validate_path, PathValidationError};
