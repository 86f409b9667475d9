//! Presentation layer for toolbridge
//!
//! This crate contains CLI definitions, the JSON input files the commands
//! read, scripted replay, and output formatters.

pub mod cli;
pub mod input;
pub mod output;
pub mod replay;

// Re-export commonly used types
pub use cli::commands::{Cli, Command, OutputFormat};
pub use input::{BatchInput, ReplayScript, ReplayTurn, ScriptedFailure, TurnInput};
pub use output::{ConsoleFormatter, JsonFormatter, OutputFormatter, formatter_for};
pub use replay::{ReplayReport, StepReport, TurnReport, run_replay};
