//! CLI command definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable, colored text
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

/// CLI arguments for toolbridge
#[derive(Parser, Debug)]
#[command(name = "toolbridge")]
#[command(author, version, about = "Tool-call lifecycle and coordination engine")]
#[command(long_about = r#"
toolbridge sits between a model that proposes tool calls and the executor
that runs them. It enforces the tool-choice directive on each response,
orders the calls by their data dependencies, and tracks every call from
proposal to result.

Configuration files are loaded from (in priority order):
1. --config <path>     Explicit config file
2. ./toolbridge.toml   Project-level config
3. ~/.config/toolbridge/config.toml   Global config
4. TOOLBRIDGE_<SECTION>__<KEY> environment variables

Example:
  toolbridge coordinate batch.json
  toolbridge enforce --choice none response.json
  toolbridge --events events.jsonl replay session.json
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write diagnostic logs to rolling files in this directory
    #[arg(long, value_name = "DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    /// Append bridge events to this JSONL file
    #[arg(long, value_name = "PATH", global = true)]
    pub events: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Order a batch of proposed calls and report their dependencies
    Coordinate {
        /// JSON file: an array of calls, or {"calls": [...], "hints": {...}}
        file: PathBuf,

        /// Session the batch belongs to (for log context only)
        #[arg(long, value_name = "ID")]
        session: Option<String>,
    },

    /// Apply a tool-choice directive to a response
    Enforce {
        /// Directive: auto, none, required or function:<name>.
        /// Defaults to the file's "tool_choice", then auto.
        #[arg(short, long, value_name = "CHOICE")]
        choice: Option<String>,

        /// JSON file: {"content": ..., "tool_calls": [...], "finish_reason": ...}
        file: PathBuf,
    },

    /// Run a scripted session through the engine and print the final state
    Replay {
        /// JSON file: {"session_id": ..., "turns": [...]}
        file: PathBuf,
    },
}
