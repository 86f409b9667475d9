//! JSON output

use crate::output::formatter::OutputFormatter;
use crate::replay::ReplayReport;
use serde::Serialize;
use serde_json::json;
use toolbridge_domain::{ChoiceVerdict, CoordinationResult, ToolCallRequest, ToolChoice};

/// Pretty-printed JSON, for scripting
pub struct JsonFormatter;

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

impl OutputFormatter for JsonFormatter {
    fn coordination(&self, calls: &[ToolCallRequest], result: &CoordinationResult) -> String {
        pretty(&json!({
            "calls": calls,
            "result": result,
        }))
    }

    fn verdict(&self, choice: &ToolChoice, verdict: &ChoiceVerdict) -> String {
        pretty(&json!({
            "tool_choice": choice,
            "verdict": verdict,
        }))
    }

    fn replay(&self, report: &ReplayReport) -> String {
        pretty(report)
    }
}
