//! Coordinator: validates a batch and computes its execution order.

use crate::ports::clock::{Clock, measure};
use std::sync::Arc;
use std::time::Duration;
use toolbridge_domain::coordination::validate_batch;
use toolbridge_domain::{
    CoordinationIssue, CoordinationResult, DependencyGraph, DependencyMap, Diagnostic,
    DiagnosticCode, IdSource, ProposedCall, SessionId, ToolCallRequest,
};
use tracing::{debug, warn};

pub struct Coordinator {
    clock: Arc<dyn Clock>,
    max_parallel_calls: usize,
    budget: Duration,
}

impl Coordinator {
    pub fn new(clock: Arc<dyn Clock>, max_parallel_calls: usize, budget: Duration) -> Self {
        Self {
            clock,
            max_parallel_calls,
            budget,
        }
    }

    /// Order a batch by inferred dependencies and kind priority.
    ///
    /// Never fails because of a cycle: cycles are broken and reported as
    /// diagnostics. Input problems are all collected into `errors`.
    pub fn coordinate(
        &self,
        calls: &[ToolCallRequest],
        session: Option<&SessionId>,
    ) -> CoordinationResult {
        self.coordinate_with_hints(calls, &DependencyMap::new(), session)
    }

    /// Like [`coordinate`](Self::coordinate), with explicit extra edges.
    pub fn coordinate_with_hints(
        &self,
        calls: &[ToolCallRequest],
        hints: &DependencyMap,
        session: Option<&SessionId>,
    ) -> CoordinationResult {
        self.run(calls, hints, Vec::new(), session)
    }

    /// Normalize proposed calls, then coordinate them with `hints`.
    ///
    /// Missing ids are generated from `ids`; malformed ids are reported as
    /// `InvalidId` issues alongside any other batch problem. Returns the
    /// normalized requests with the result.
    pub fn coordinate_proposed(
        &self,
        proposed: Vec<ProposedCall>,
        hints: &DependencyMap,
        ids: &dyn IdSource,
        session: Option<&SessionId>,
    ) -> (Vec<ToolCallRequest>, CoordinationResult) {
        let submitted = proposed.len();
        let mut requests = Vec::with_capacity(submitted);
        let mut issues = Vec::new();

        for (index, call) in proposed.into_iter().enumerate() {
            let raw_id = call.id.clone().unwrap_or_default();
            match call.into_request(ids) {
                Ok(request) => requests.push(request),
                Err(_) => issues.push(CoordinationIssue::InvalidId { index, id: raw_id }),
            }
        }

        let result = if issues.is_empty() {
            self.run(&requests, hints, Vec::new(), session)
        } else {
            // Keep the count check honest for the whole submitted batch.
            let mut extra = Vec::new();
            if submitted > self.max_parallel_calls {
                extra.push(CoordinationIssue::TooManyCalls {
                    count: submitted,
                    max: self.max_parallel_calls,
                });
            }
            extra.append(&mut issues);
            let measured = measure(self.clock.as_ref(), self.budget, |_| {
                validate_batch(&requests, usize::MAX)
                    .into_iter()
                    .filter(|issue| !matches!(issue, CoordinationIssue::EmptyBatch))
            });
            extra.extend(measured.outcome);
            warn!(session = ?session, errors = extra.len(), "Coordination rejected batch");
            CoordinationResult::failed(extra, measured.timing)
        };
        (requests, result)
    }

    fn run(
        &self,
        calls: &[ToolCallRequest],
        hints: &DependencyMap,
        mut issues: Vec<CoordinationIssue>,
        session: Option<&SessionId>,
    ) -> CoordinationResult {
        let measured = measure(self.clock.as_ref(), self.budget, |_| {
            issues.extend(validate_batch(calls, self.max_parallel_calls));
            if !issues.is_empty() {
                return Err(issues);
            }
            let mut graph = DependencyGraph::infer(calls);
            graph.add_hints(hints);
            Ok((graph.dependency_map(), graph.schedule()))
        });

        let timing = measured.timing;
        match measured.outcome {
            Err(errors) => {
                warn!(session = ?session, errors = errors.len(), "Coordination rejected batch");
                CoordinationResult::failed(errors, timing)
            }
            Ok((dependencies, schedule)) => {
                let mut diagnostics = schedule.diagnostics;
                if timing.over_budget {
                    warn!(
                        session = ?session,
                        elapsed_ms = timing.elapsed_ms(),
                        budget_ms = timing.budget_ms(),
                        "Coordination over budget"
                    );
                    diagnostics.push(Diagnostic::warning(
                        DiagnosticCode::OverBudget,
                        format!(
                            "Coordination took {}ms, budget {}ms",
                            timing.elapsed_ms(),
                            timing.budget_ms()
                        ),
                        Vec::new(),
                    ));
                }
                for d in diagnostics.iter().filter(|d| d.code == DiagnosticCode::CycleBroken) {
                    warn!(session = ?session, "{}", d.message);
                }
                debug!(
                    session = ?session,
                    calls = calls.len(),
                    layers = schedule.layers.len(),
                    "Coordinated batch"
                );
                CoordinationResult {
                    success: true,
                    order: schedule.order,
                    layers: schedule.layers,
                    dependencies,
                    diagnostics,
                    errors: Vec::new(),
                    timing,
                }
            }
        }
    }
}
