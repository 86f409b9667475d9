//! Console output formatter

use crate::output::formatter::OutputFormatter;
use crate::replay::{ReplayReport, StepReport, TurnReport};
use colored::Colorize;
use std::collections::HashMap;
use toolbridge_domain::core::string::truncate;
use toolbridge_domain::{
    AssistantResponse, CallId, ChoiceAction, ChoiceVerdict, CoordinationResult, OperationKind,
    SessionSnapshot, Severity, Timing, ToolCallRequest, ToolChoice,
};

/// Longest argument payload shown for a forwarded call.
const ARGUMENTS_PREVIEW: usize = 80;

/// Formats command results for console display
pub struct ConsoleFormatter;

impl OutputFormatter for ConsoleFormatter {
    fn coordination(&self, calls: &[ToolCallRequest], result: &CoordinationResult) -> String {
        let mut output = String::new();

        if !result.success {
            output.push_str(&format!("{}\n", "Batch rejected".red().bold()));
            for error in &result.errors {
                output.push_str(&format!("  {} {}\n", "x".red(), error));
            }
            return output;
        }

        output.push_str(&Self::header(&format!(
            "Coordinated batch ({} calls, {} layers)",
            result.order.len(),
            result.layers.len()
        )));

        let names: HashMap<&CallId, &str> =
            calls.iter().map(|c| (&c.id, c.name.as_str())).collect();
        let mut position = 0;
        for (n, layer) in result.layers.iter().enumerate() {
            output.push_str(&format!("\n{}\n", format!("Layer {}", n + 1).cyan().bold()));
            for id in layer {
                position += 1;
                let name = names.get(id).copied().unwrap_or("?");
                output.push_str(&format!(
                    "  {:>2}. {:<28} {:<20} {}\n",
                    position,
                    id.as_str(),
                    name,
                    format!("[{}]", OperationKind::classify(name)).dimmed()
                ));
            }
        }

        let edges: Vec<_> = result
            .dependencies
            .iter()
            .filter(|(_, providers)| !providers.is_empty())
            .collect();
        if !edges.is_empty() {
            output.push_str(&Self::section_header("Dependencies"));
            for (dependent, providers) in edges {
                let providers: Vec<&str> = providers.iter().map(CallId::as_str).collect();
                output.push_str(&format!("  {} <- {}\n", dependent, providers.join(", ")));
            }
        }

        if !result.diagnostics.is_empty() {
            output.push_str(&Self::section_header("Diagnostics"));
            for d in &result.diagnostics {
                output.push_str(&format!(
                    "  {} {}: {}\n",
                    Self::severity_mark(d.severity),
                    d.code,
                    d.message
                ));
            }
        }

        output.push_str(&format!("\n{}\n", Self::timing(&result.timing)));
        output
    }

    fn verdict(&self, choice: &ToolChoice, verdict: &ChoiceVerdict) -> String {
        let mut output = String::new();
        output.push_str(&format!("{} {}\n", "Tool choice:".cyan().bold(), choice));

        let action = verdict.action.to_string();
        let action = match verdict.action {
            ChoiceAction::None => action.green(),
            ChoiceAction::RejectResponse => action.red().bold(),
            _ => action.yellow(),
        };
        let status = if verdict.compliant {
            "compliant"
        } else if verdict.success {
            "repaired"
        } else {
            "rejected"
        };
        output.push_str(&format!("{} {} ({})\n", "Action:".cyan().bold(), action, status));

        if !verdict.violations.is_empty() {
            output.push_str(&Self::section_header("Violations"));
            for v in &verdict.violations {
                output.push_str(&format!(
                    "  {} {}: {}\n",
                    Self::severity_mark(v.severity),
                    v.kind,
                    v.message
                ));
            }
        }

        if let Some(repaired) = &verdict.repaired {
            output.push_str(&Self::section_header("Forwarded response"));
            output.push_str(&Self::response(repaired));
        }

        if let Some(timing) = &verdict.timing {
            output.push_str(&format!("\n{}\n", Self::timing(timing)));
        }
        output
    }

    fn replay(&self, report: &ReplayReport) -> String {
        let mut output = Self::header(&format!("Replay of session {}", report.session_id));

        for (n, turn) in report.turns.iter().enumerate() {
            output.push_str(&format!("\n{}\n", format!("Turn {}", n + 1).cyan().bold()));
            output.push_str(&Self::turn(turn));
        }

        output.push_str(&Self::section_header("Final state"));
        match &report.snapshot {
            Some(snapshot) => output.push_str(&Self::snapshot(snapshot)),
            None => output.push_str(&format!("  {}\n", "no calls recorded".dimmed())),
        }

        if let Some(cleanup) = &report.cleanup {
            output.push_str(&format!(
                "\n{} {} swept, {} remaining, {} session(s) removed, ~{} bytes freed\n",
                "Cleanup:".cyan().bold(),
                cleanup.cleaned,
                cleanup.remaining,
                cleanup.sessions_removed,
                cleanup.estimated_bytes_freed
            ));
        }
        if let Some(ended) = &report.ended {
            output.push_str(&format!(
                "{} dropped {} entries, {} correlations, {} ids\n",
                "Session ended:".cyan().bold(),
                ended.entries,
                ended.correlations,
                ended.ids
            ));
        }

        let failed = report.failed_steps();
        if failed > 0 {
            output.push_str(&format!("\n{}\n", format!("{failed} step(s) failed").red().bold()));
        }
        output.push_str(&Self::footer());
        output
    }
}

impl ConsoleFormatter {
    fn turn(turn: &TurnReport) -> String {
        let mut output = String::new();
        if let Some(error) = &turn.input_error {
            output.push_str(&format!("  {} {}\n", "invalid input:".red(), error));
            return output;
        }
        let Some(outcome) = &turn.outcome else {
            return output;
        };

        if outcome.admitted {
            let ids: Vec<&str> = outcome.admitted_ids.iter().map(CallId::as_str).collect();
            output.push_str(&format!(
                "  {} {}\n",
                "admitted".green(),
                if ids.is_empty() {
                    "(text only)".to_string()
                } else {
                    ids.join(" -> ")
                }
            ));
        } else if let Some(failure) = &outcome.failure {
            output.push_str(&format!("  {} {}\n", "rejected".red(), failure));
        }
        if let Some(verdict) = &outcome.verdict
            && !verdict.compliant
        {
            output.push_str(&format!("  {} {}\n", "choice:".dimmed(), verdict.action));
        }

        for step in &turn.steps {
            output.push_str(&Self::step(step));
        }
        output
    }

    fn step(step: &StepReport) -> String {
        match (&step.state, &step.error) {
            (_, Some(error)) => format!(
                "    {} {:<7} {} {}\n",
                "x".red(),
                step.step,
                step.call_id,
                error.red()
            ),
            (Some(state), None) => format!(
                "    {} {:<7} {} -> {}\n",
                "+".green(),
                step.step,
                step.call_id,
                state
            ),
            (None, None) => format!("    {:<9} {}\n", step.step, step.call_id),
        }
    }

    fn snapshot(snapshot: &SessionSnapshot) -> String {
        let c = &snapshot.counts;
        format!(
            "  {} total, turn {}\n  pending {}  in_progress {}  completed {}  failed {}  cancelled {}\n",
            snapshot.total,
            snapshot.conversation_turn,
            c.pending,
            c.in_progress,
            c.completed.to_string().green(),
            c.failed.to_string().red(),
            c.cancelled.to_string().yellow()
        )
    }

    fn response(response: &AssistantResponse) -> String {
        let mut output = String::new();
        if response.has_text() {
            output.push_str(&format!("{}\n", Self::indent(response.text(), "  ")));
        }
        for call in &response.tool_calls {
            output.push_str(&format!(
                "  {} {}({})\n",
                call.id.as_str().dimmed(),
                call.name,
                truncate(&call.arguments, ARGUMENTS_PREVIEW)
            ));
        }
        if let Some(reason) = &response.finish_reason {
            output.push_str(&format!("  {} {}\n", "finish:".dimmed(), reason.as_str()));
        }
        output
    }

    fn severity_mark(severity: Severity) -> colored::ColoredString {
        match severity {
            Severity::Error => "x".red().bold(),
            Severity::Warning => "!".yellow().bold(),
        }
    }

    fn timing(timing: &Timing) -> String {
        let text = format!("{}ms / {}ms budget", timing.elapsed_ms(), timing.budget_ms());
        if timing.over_budget {
            format!("{} {}", "Timing:".dimmed(), text.red())
        } else {
            format!("{} {}", "Timing:".dimmed(), text.dimmed())
        }
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}\n", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use toolbridge_application::{Coordinator, ManualClock};
    use toolbridge_domain::{ChoiceViolation, ViolationKind};

    fn plain() {
        colored::control::set_override(false);
    }

    fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCallRequest {
        ToolCallRequest::with_json(CallId::new(id).unwrap(), name, &args)
    }

    #[test]
    fn test_coordination_lists_layers_and_dependencies() {
        plain();
        let calls = vec![
            call("fetch", "web_fetch", json!({"url": "https://x", "save_to": "p.html"})),
            call("parse", "read_file", json!({"path": "p.html"})),
        ];
        let coordinator = Coordinator::new(
            Arc::new(ManualClock::default()),
            32,
            Duration::from_millis(10),
        );
        let result = coordinator.coordinate(&calls, None);
        let out = ConsoleFormatter.coordination(&calls, &result);

        assert!(out.contains("Coordinated batch (2 calls, 2 layers)"));
        assert!(out.contains("Layer 1"));
        assert!(out.contains("parse <- fetch"));
        assert!(out.contains("[fetch]"));
    }

    #[test]
    fn test_rejected_batch_lists_errors() {
        plain();
        let result = CoordinationResult::failed(
            vec![toolbridge_domain::CoordinationIssue::EmptyBatch],
            Timing::new(Duration::ZERO, Duration::from_millis(10)),
        );
        let out = ConsoleFormatter.coordination(&[], &result);
        assert!(out.starts_with("Batch rejected"));
        assert_eq!(out.lines().count(), 2);
    }

    #[test]
    fn test_verdict_shows_violations() {
        plain();
        let verdict = ChoiceVerdict::rejected(vec![ChoiceViolation::error(
            ViolationKind::MissingForcedFunction,
            "no call to X",
            Vec::new(),
        )]);
        let out = ConsoleFormatter.verdict(&ToolChoice::Function("X".to_string()), &verdict);
        assert!(out.contains("Tool choice: function:X"));
        assert!(out.contains("rejectResponse (rejected)"));
        assert!(out.contains("x missing forced function: no call to X"));
    }

    #[test]
    fn test_forwarded_arguments_are_shortened() {
        plain();
        let long = "x".repeat(200);
        let repaired = AssistantResponse::with_tool_calls(vec![call(
            "a",
            "read_file",
            json!({ "path": long }),
        )]);
        let verdict = ChoiceVerdict::repaired(ChoiceAction::FilterTools, Vec::new(), repaired);
        let out = ConsoleFormatter.verdict(&ToolChoice::Function("read_file".to_string()), &verdict);
        let line = out.lines().find(|l| l.contains("read_file(")).unwrap();
        assert!(line.ends_with("...)"));
        assert!(line.len() < 120);
    }

    #[test]
    fn test_indent() {
        assert_eq!(ConsoleFormatter::indent("a\nb", "> "), "> a\n> b");
    }
}
