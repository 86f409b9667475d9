//! Enforcement rules per directive.

use super::directive::ToolChoice;
use super::verdict::{ChoiceAction, ChoiceVerdict, ChoiceViolation, ViolationKind};
use crate::call::{AssistantResponse, CallId, FinishReason, ToolCallRequest};

/// Check `response` against `choice` and repair it where possible.
///
/// `fallback_text` replaces an empty body when tool calls are stripped.
pub fn evaluate(choice: &ToolChoice, response: &AssistantResponse, fallback_text: &str) -> ChoiceVerdict {
    match choice {
        ToolChoice::Auto => ChoiceVerdict::compliant(),
        ToolChoice::None => enforce_none(response, fallback_text),
        ToolChoice::Required => enforce_required(response),
        ToolChoice::Function(name) => enforce_function(name, response),
    }
}

fn call_ids<'a>(calls: impl IntoIterator<Item = &'a ToolCallRequest>) -> Vec<CallId> {
    calls.into_iter().map(|c| c.id.clone()).collect()
}

fn enforce_none(response: &AssistantResponse, fallback_text: &str) -> ChoiceVerdict {
    if !response.has_tool_calls() {
        return ChoiceVerdict::compliant();
    }

    let violation = ChoiceViolation::error(
        ViolationKind::UnexpectedToolCalls,
        format!(
            "Tool choice is none but the response has {} tool call(s): {}",
            response.tool_calls.len(),
            response.called_functions().join(", ")
        ),
        call_ids(&response.tool_calls),
    );

    let text = if response.has_text() {
        response.text().to_string()
    } else {
        fallback_text.to_string()
    };

    ChoiceVerdict::repaired(
        ChoiceAction::ForceTextOnly,
        vec![violation],
        AssistantResponse::from_text(text),
    )
}

fn enforce_required(response: &AssistantResponse) -> ChoiceVerdict {
    if response.has_tool_calls() {
        return ChoiceVerdict::compliant();
    }
    ChoiceVerdict::rejected(vec![ChoiceViolation::error(
        ViolationKind::MissingToolCall,
        "Tool choice is required but the response has no tool calls",
        Vec::new(),
    )])
}

fn enforce_function(name: &str, response: &AssistantResponse) -> ChoiceVerdict {
    let (matching, others): (Vec<&ToolCallRequest>, Vec<&ToolCallRequest>) =
        response.tool_calls.iter().partition(|c| c.name == name);

    let mut violations = Vec::new();
    if !others.is_empty() {
        let names: Vec<&str> = others.iter().map(|c| c.name.as_str()).collect();
        violations.push(ChoiceViolation::warning(
            ViolationKind::UnexpectedFunction,
            format!("Calls to functions other than {}: {}", name, names.join(", ")),
            call_ids(others.iter().copied()),
        ));
    }

    if matching.is_empty() {
        violations.insert(
            0,
            ChoiceViolation::error(
                ViolationKind::MissingForcedFunction,
                format!("Tool choice forces {} but the response does not call it", name),
                Vec::new(),
            ),
        );
        return ChoiceVerdict::rejected(violations);
    }

    let marker_ok = response.finish_reason == Some(FinishReason::ToolCalls);
    if others.is_empty() && marker_ok {
        return ChoiceVerdict::compliant();
    }

    let mut repaired = response.clone();
    repaired.tool_calls = matching.into_iter().cloned().collect();
    repaired.finish_reason = Some(FinishReason::ToolCalls);

    let action = if others.is_empty() {
        violations.push(ChoiceViolation::warning(
            ViolationKind::FinishReasonMismatch,
            format!(
                "Completion marker is {} instead of tool_calls",
                response
                    .finish_reason
                    .as_ref()
                    .map(FinishReason::as_str)
                    .unwrap_or("missing")
            ),
            Vec::new(),
        ));
        ChoiceAction::ForceFunction
    } else {
        ChoiceAction::FilterTools
    };

    ChoiceVerdict::repaired(action, violations, repaired)
}
