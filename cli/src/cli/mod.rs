//! CLI module for cogauth.

pub mod args;
pub mod commands;
pub mod prompt;

pub use args::{Cli, Commands, OutputFormat, ShellType};
