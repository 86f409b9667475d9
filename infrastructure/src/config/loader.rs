//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};
use thiserror::Error;
use toolbridge_domain::ConfigIssue;

/// File names checked in the working directory, in order.
const PROJECT_FILES: [&str; 2] = ["toolbridge.toml", ".toolbridge.toml"];

/// Prefix of environment overrides, e.g. `TOOLBRIDGE_ENGINE__MAX_PARALLEL_CALLS=8`.
const ENV_PREFIX: &str = "TOOLBRIDGE_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration ({} error(s))", .0.iter().filter(|i| i.is_error()).count())]
    Invalid(Vec<ConfigIssue>),
}

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. Explicit config path (if provided)
    /// 2. Project root: `./toolbridge.toml` or `./.toolbridge.toml`
    /// 3. XDG config: `$XDG_CONFIG_HOME/toolbridge/config.toml`
    /// 4. Environment: `TOOLBRIDGE_<SECTION>__<KEY>`
    /// 5. Default values
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, Box<figment::Error>> {
        Self::figment(config_path).extract().map_err(Box::new)
    }

    /// Load, then validate. Warnings are returned alongside the config;
    /// any error-severity issue fails the load.
    pub fn load_validated(
        config_path: Option<&PathBuf>,
    ) -> Result<(FileConfig, Vec<ConfigIssue>), ConfigError> {
        let config = Self::load(config_path)?;
        let issues = config.validate();
        if FileConfig::has_errors(&issues) {
            return Err(ConfigError::Invalid(issues));
        }
        Ok((config, issues))
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    fn figment(config_path: Option<&PathBuf>) -> Figment {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(FileConfig::default()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(&global_path));
        }

        if let Some(path) = Self::project_config_path() {
            figment = figment.merge(Toml::file(path));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment
    }

    /// Get the global config file path
    ///
    /// Returns XDG_CONFIG_HOME/toolbridge/config.toml if set,
    /// otherwise the platform config directory.
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("toolbridge").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Describe the config sources being used (for --show-config)
    pub fn describe_sources(config_path: Option<&Path>) -> Vec<String> {
        let found = |exists: bool| if exists { "[FOUND]" } else { "[     ]" };
        let mut lines = vec!["Configuration sources (in priority order):".to_string()];

        if let Some(path) = config_path {
            lines.push(format!("  {} Explicit: {}", found(path.exists()), path.display()));
        }

        match Self::project_config_path() {
            Some(path) => lines.push(format!("  {} Project: {}", found(true), path.display())),
            None => lines.push(format!(
                "  {} Project: ./{} or ./{}",
                found(false),
                PROJECT_FILES[0],
                PROJECT_FILES[1]
            )),
        }

        if let Some(path) = Self::global_config_path() {
            lines.push(format!("  {} Global:  {}", found(path.exists()), path.display()));
        }

        let env_set = std::env::vars().any(|(k, _)| k.starts_with(ENV_PREFIX));
        lines.push(format!("  {} Env:     {}*", found(env_set), ENV_PREFIX));
        lines.push("  [     ] Default: built-in defaults".to_string());
        lines
    }
}
