//! CLI entrypoint for toolbridge
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use toolbridge_application::{BridgeEngine, BridgeEventLogger, Clock, NoEventLogger, SystemClock};
use toolbridge_domain::{ConfigIssue, SessionId, ToolChoice};
use toolbridge_infrastructure::{ConfigError, ConfigLoader, FileConfig, JsonlEventLogger};
use toolbridge_presentation::{
    BatchInput, Cli, Command, OutputFormatter, ReplayScript, TurnInput, formatter_for, run_replay,
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if cli.show_config {
        show_config(&cli)?;
        return Ok(ExitCode::SUCCESS);
    }

    let (config, warnings) = load_config(&cli)?;

    let log_dir = cli.log_dir.clone().or_else(|| config.logging.log_dir_path());
    let _guard = init_logging(cli.verbose, log_dir.as_deref())?;
    for issue in &warnings {
        warn!(code = ?issue.code, "{}", issue.message);
    }

    let Some(command) = cli.command.clone() else {
        bail!("No command given. Run `toolbridge --help` for usage.");
    };

    // === Dependency Injection ===
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let events_path = cli.events.clone().or_else(|| config.logging.events_path());
    let events: Arc<dyn BridgeEventLogger> = match &events_path {
        Some(path) => Arc::new(
            JsonlEventLogger::open(path, clock.clone())
                .with_context(|| format!("Could not open event log {}", path.display()))?,
        ),
        None => Arc::new(NoEventLogger),
    };
    let engine = BridgeEngine::new(config.to_engine_params(), clock, events);
    let formatter = formatter_for(cli.output);

    info!(command = ?command, "Starting toolbridge");
    let success = match command {
        Command::Coordinate { file, session } => {
            coordinate(&engine, formatter.as_ref(), &file, session).await?
        }
        Command::Enforce { choice, file } => {
            enforce(&engine, formatter.as_ref(), &file, choice.as_deref()).await?
        }
        Command::Replay { file } => replay(&engine, formatter.as_ref(), &file).await?,
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn show_config(cli: &Cli) -> Result<()> {
    for line in ConfigLoader::describe_sources(cli.config.as_deref()) {
        println!("{}", line);
    }
    let (config, issues) = if cli.no_config {
        (ConfigLoader::load_defaults(), Vec::new())
    } else {
        let config = ConfigLoader::load(cli.config.as_ref())?;
        let issues = config.validate();
        (config, issues)
    };
    println!();
    println!("Effective configuration:");
    println!("{}", toml::to_string_pretty(&config)?);
    for issue in issues {
        println!("[{}] {}", issue.severity, issue.message);
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<(FileConfig, Vec<ConfigIssue>)> {
    if cli.no_config {
        return Ok((ConfigLoader::load_defaults(), Vec::new()));
    }
    match ConfigLoader::load_validated(cli.config.as_ref()) {
        Ok(loaded) => Ok(loaded),
        Err(ConfigError::Invalid(issues)) => {
            let details: Vec<String> = issues
                .iter()
                .map(|i| format!("  [{}] {}", i.severity, i.message))
                .collect();
            bail!("Invalid configuration:\n{}", details.join("\n"))
        }
        Err(e) => Err(e.into()),
    }
}

/// Install the tracing subscriber. With a log directory, logs go to a
/// daily-rolling file; the returned guard must be held until exit.
fn init_logging(verbose: u8, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Could not create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "toolbridge.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
            Ok(None)
        }
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Could not read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Could not parse {}", path.display()))
}

async fn coordinate(
    engine: &BridgeEngine,
    formatter: &dyn OutputFormatter,
    file: &Path,
    session: Option<String>,
) -> Result<bool> {
    let (calls, hints) = read_json::<BatchInput>(file).await?.into_parts();
    let session = session.map(SessionId::new);
    let (requests, result) = engine.coordinator().coordinate_proposed(
        calls,
        &hints,
        engine.id_source(),
        session.as_ref(),
    );
    println!("{}", formatter.coordination(&requests, &result));
    Ok(result.success)
}

async fn enforce(
    engine: &BridgeEngine,
    formatter: &dyn OutputFormatter,
    file: &Path,
    choice: Option<&str>,
) -> Result<bool> {
    let input = read_json::<TurnInput>(file).await?;
    let choice = match choice {
        Some(raw) => raw.parse::<ToolChoice>()?,
        None => input.choice()?.unwrap_or_default(),
    };
    let response = input.into_response(engine.id_source())?;
    let verdict = engine.enforcer().enforce_choice(&choice, &response)?;
    println!("{}", formatter.verdict(&choice, &verdict));
    Ok(verdict.success)
}

async fn replay(
    engine: &BridgeEngine,
    formatter: &dyn OutputFormatter,
    file: &Path,
) -> Result<bool> {
    let script = read_json::<ReplayScript>(file).await?;
    let report = run_replay(engine, script);
    println!("{}", formatter.replay(&report));
    Ok(report.failed_steps() == 0 && report.turns.iter().all(|t| t.input_error.is_none()))
}
