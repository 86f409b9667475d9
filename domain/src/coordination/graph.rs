//! Dependency graph and layered ordering for one batch.
//!
//! Edges are inferred from resources: a call that depends on a path waits
//! for the nearest earlier call in the batch that provides it. Later
//! providers never become dependencies, so a read followed by a write of
//! the same file keeps the read first. Explicit hints may add any edge,
//! including ones that close a cycle.
//!
//! Ordering proceeds in layers. Each layer holds every call whose
//! dependencies are already placed, sorted by kind priority and then by
//! batch position. When no call is ready the remaining calls form a cycle;
//! the call with the fewest unplaced dependencies is forced out on its own
//! and a `cycle_broken` diagnostic records it.

use super::resources::CallResources;
use super::result::{DependencyMap, Diagnostic, DiagnosticCode};
use crate::call::{CallId, ToolCallRequest};
use std::collections::HashMap;

/// One call in the graph.
#[derive(Debug, Clone)]
pub struct CallNode {
    pub id: CallId,
    /// Position in the submitted batch.
    pub index: usize,
    pub resources: CallResources,
    pub priority: u8,
}

/// Dependency graph over a batch, indexed by batch position.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<CallNode>,
    /// `deps[i]` lists the positions call `i` waits for, ascending.
    deps: Vec<Vec<usize>>,
    index: HashMap<CallId, usize>,
    diagnostics: Vec<Diagnostic>,
}

/// Output of [`DependencyGraph::schedule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub order: Vec<CallId>,
    pub layers: Vec<Vec<CallId>>,
    pub diagnostics: Vec<Diagnostic>,
}

impl DependencyGraph {
    /// Build the graph for a batch whose ids are already known to be unique.
    pub fn infer(calls: &[ToolCallRequest]) -> Self {
        let mut nodes = Vec::with_capacity(calls.len());
        let mut deps = vec![Vec::new(); calls.len()];
        let mut index = HashMap::with_capacity(calls.len());
        let mut diagnostics = Vec::new();
        let mut latest_provider: HashMap<String, usize> = HashMap::new();

        for (i, call) in calls.iter().enumerate() {
            let resources = CallResources::infer(call);
            if resources.unparsed_arguments {
                diagnostics.push(Diagnostic::warning(
                    DiagnosticCode::UnparsedArguments,
                    format!(
                        "Arguments of {} ({}) are not a JSON object; no dependencies inferred",
                        call.id, call.name
                    ),
                    vec![call.id.clone()],
                ));
            }

            for path in &resources.depends {
                if let Some(&provider) = latest_provider.get(path)
                    && provider != i
                    && !deps[i].contains(&provider)
                {
                    deps[i].push(provider);
                }
            }
            for path in &resources.provides {
                latest_provider.insert(path.clone(), i);
            }
            deps[i].sort_unstable();

            index.insert(call.id.clone(), i);
            nodes.push(CallNode {
                id: call.id.clone(),
                index: i,
                priority: resources.kind.priority(),
                resources,
            });
        }

        Self {
            nodes,
            deps,
            index,
            diagnostics,
        }
    }

    /// Merge explicit dependency hints.
    ///
    /// Hints naming ids outside the batch and self-references are dropped
    /// with a warning.
    pub fn add_hints(&mut self, hints: &DependencyMap) {
        for (dependent, providers) in hints {
            let Some(&i) = self.index.get(dependent) else {
                self.diagnostics.push(Diagnostic::warning(
                    DiagnosticCode::UnknownHintTarget,
                    format!("Dependency hint for unknown call {dependent} ignored"),
                    vec![dependent.clone()],
                ));
                continue;
            };
            for provider in providers {
                match self.index.get(provider) {
                    Some(&j) if j == i => {
                        self.diagnostics.push(Diagnostic::warning(
                            DiagnosticCode::SelfDependencyHint,
                            format!("Call {dependent} cannot depend on itself; hint ignored"),
                            vec![dependent.clone()],
                        ));
                    }
                    Some(&j) => {
                        if !self.deps[i].contains(&j) {
                            self.deps[i].push(j);
                            self.deps[i].sort_unstable();
                        }
                    }
                    None => {
                        self.diagnostics.push(Diagnostic::warning(
                            DiagnosticCode::UnknownHintTarget,
                            format!("Call {dependent} hinted to depend on unknown call {provider}; ignored"),
                            vec![dependent.clone()],
                        ));
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[CallNode] {
        &self.nodes
    }

    /// Every call id with the ids it depends on, in batch order.
    pub fn dependency_map(&self) -> DependencyMap {
        self.nodes
            .iter()
            .map(|node| {
                let providers = self.deps[node.index]
                    .iter()
                    .map(|&j| self.nodes[j].id.clone())
                    .collect();
                (node.id.clone(), providers)
            })
            .collect()
    }

    /// Compute the layered execution order.
    pub fn schedule(&self) -> Schedule {
        let n = self.nodes.len();
        let mut placed = vec![false; n];
        let mut order = Vec::with_capacity(n);
        let mut layers = Vec::new();
        let mut diagnostics = self.diagnostics.clone();

        while order.len() < n {
            let mut ready: Vec<usize> = (0..n)
                .filter(|&i| !placed[i] && self.deps[i].iter().all(|&j| placed[j]))
                .collect();

            if ready.is_empty() {
                let forced = self.pick_cycle_breaker(&placed);
                let waiting: Vec<CallId> = self.deps[forced]
                    .iter()
                    .filter(|&&j| !placed[j])
                    .map(|&j| self.nodes[j].id.clone())
                    .collect();
                let forced_id = self.nodes[forced].id.clone();
                let message = format!(
                    "Dependency cycle broken: {} scheduled before {}",
                    forced_id,
                    waiting
                        .iter()
                        .map(CallId::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                let mut call_ids = vec![forced_id];
                call_ids.extend(waiting);
                diagnostics.push(Diagnostic::warning(DiagnosticCode::CycleBroken, message, call_ids));
                ready = vec![forced];
            }

            ready.sort_by_key(|&i| (self.nodes[i].priority, i));
            let layer: Vec<CallId> = ready
                .iter()
                .map(|&i| {
                    placed[i] = true;
                    self.nodes[i].id.clone()
                })
                .collect();
            order.extend(layer.iter().cloned());
            layers.push(layer);
        }

        Schedule {
            order,
            layers,
            diagnostics,
        }
    }

    /// Among unplaced calls, the one with the fewest unplaced dependencies,
    /// then lowest priority value, then earliest position.
    fn pick_cycle_breaker(&self, placed: &[bool]) -> usize {
        (0..self.nodes.len())
            .filter(|&i| !placed[i])
            .min_by_key(|&i| {
                let unresolved = self.deps[i].iter().filter(|&&j| !placed[j]).count();
                (unresolved, self.nodes[i].priority, i)
            })
            .unwrap_or(0)
    }
}
