//! Configuration file loading for toolbridge
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `--config <path>` specified file
//! 2. Project root: `./toolbridge.toml` or `./.toolbridge.toml`
//! 3. XDG config: `$XDG_CONFIG_HOME/toolbridge/config.toml`
//! 4. Environment: `TOOLBRIDGE_<SECTION>__<KEY>`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    FileBudgetsConfig, FileChoiceConfig, FileConfig, FileEngineConfig, FileLoggingConfig,
};
pub use loader::{ConfigError, ConfigLoader};
