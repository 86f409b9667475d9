//! Output formatter trait

use crate::cli::commands::OutputFormat;
use crate::output::console::ConsoleFormatter;
use crate::output::json::JsonFormatter;
use crate::replay::ReplayReport;
use toolbridge_domain::{ChoiceVerdict, CoordinationResult, ToolCallRequest, ToolChoice};

/// Trait for rendering command results
pub trait OutputFormatter {
    /// A coordinated batch: order, layers, dependencies and diagnostics
    fn coordination(&self, calls: &[ToolCallRequest], result: &CoordinationResult) -> String;

    /// A tool-choice verdict
    fn verdict(&self, choice: &ToolChoice, verdict: &ChoiceVerdict) -> String;

    /// A replayed session
    fn replay(&self, report: &ReplayReport) -> String;
}

/// The formatter for the selected output format.
pub fn formatter_for(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Text => Box::new(ConsoleFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}
