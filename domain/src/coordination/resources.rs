//! Resource inference from call arguments.
//!
//! Coordination works on resource paths named in call arguments. What a
//! path means depends on the call's [`OperationKind`]:
//!
//! | Kind | Depends on | Provides |
//! |------|-----------|----------|
//! | read / list / search | path keys, `source` | – |
//! | write | `source` (copies, moves) | path keys, `destination`, `output_path` |
//! | transform | `input_path`, `input`, `source`, `from` | `output_path`, `output`, `destination`, `to` |
//! | fetch | – | `output_path`, `save_to`, `destination` |
//! | execute / unknown | – | – |
//!
//! A transform that only names a plain `path` both reads and rewrites it.

use crate::call::{OperationKind, ToolCallRequest};
use crate::core::string::normalize_path;
use serde_json::{Map, Value};

/// Keys that name the primary resource of a call.
const PATH_KEYS: &[&str] = &[
    "path",
    "file_path",
    "filepath",
    "file",
    "filename",
    "target_file",
    "directory",
    "dir",
    "paths",
];
const SOURCE_KEYS: &[&str] = &["source", "src", "source_path"];
const WRITE_EXTRA_KEYS: &[&str] = &["destination", "dest", "output_path"];
const TRANSFORM_INPUT_KEYS: &[&str] = &["input_path", "input", "source", "src", "from"];
const TRANSFORM_OUTPUT_KEYS: &[&str] = &["output_path", "output", "destination", "dest", "to"];
const FETCH_OUTPUT_KEYS: &[&str] = &["output_path", "save_to", "destination"];

/// Longest string still considered a path.
const MAX_PATH_LEN: usize = 4096;

/// What one call reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResources {
    pub kind: OperationKind,
    /// Normalized paths this call needs to exist in their final form.
    pub depends: Vec<String>,
    /// Normalized paths this call produces.
    pub provides: Vec<String>,
    /// The argument payload was not a JSON object.
    pub unparsed_arguments: bool,
}

impl CallResources {
    /// Infer resources for a call.
    pub fn infer(request: &ToolCallRequest) -> Self {
        let kind = OperationKind::classify(&request.name);
        let Some(args) = request.argument_map() else {
            return Self {
                kind,
                depends: Vec::new(),
                provides: Vec::new(),
                unparsed_arguments: !request.arguments.trim().is_empty(),
            };
        };

        let (depends, provides) = match kind {
            OperationKind::Read | OperationKind::List | OperationKind::Search => {
                let mut depends = collect(&args, PATH_KEYS);
                extend_unique(&mut depends, collect(&args, SOURCE_KEYS));
                (depends, Vec::new())
            }
            OperationKind::Write => {
                let mut provides = collect(&args, PATH_KEYS);
                extend_unique(&mut provides, collect(&args, WRITE_EXTRA_KEYS));
                (collect(&args, SOURCE_KEYS), provides)
            }
            OperationKind::Transform => {
                let mut depends = collect(&args, TRANSFORM_INPUT_KEYS);
                let mut provides = collect(&args, TRANSFORM_OUTPUT_KEYS);
                if depends.is_empty() && provides.is_empty() {
                    let in_place = collect(&args, PATH_KEYS);
                    depends = in_place.clone();
                    provides = in_place;
                }
                (depends, provides)
            }
            OperationKind::Fetch => (Vec::new(), collect(&args, FETCH_OUTPUT_KEYS)),
            OperationKind::Execute | OperationKind::Unknown => (Vec::new(), Vec::new()),
        };

        Self {
            kind,
            depends,
            provides,
            unparsed_arguments: false,
        }
    }
}

/// Collect normalized path-like strings under `keys`, in key order, without duplicates.
fn collect(args: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    let mut out = Vec::new();
    for key in keys {
        match args.get(*key) {
            Some(Value::String(s)) => push_path(&mut out, s),
            Some(Value::Array(items)) => {
                for item in items {
                    if let Value::String(s) = item {
                        push_path(&mut out, s);
                    }
                }
            }
            _ => {}
        }
    }
    out
}

fn push_path(out: &mut Vec<String>, raw: &str) {
    if !looks_like_path(raw) {
        return;
    }
    if let Some(path) = normalize_path(raw)
        && !out.contains(&path)
    {
        out.push(path);
    }
}

fn extend_unique(target: &mut Vec<String>, extra: Vec<String>) {
    for path in extra {
        if !target.contains(&path) {
            target.push(path);
        }
    }
}

/// URLs, multi-line strings and oversized values are not resource paths.
fn looks_like_path(raw: &str) -> bool {
    let trimmed = raw.trim();
    !trimmed.is_empty()
        && trimmed.len() <= MAX_PATH_LEN
        && !trimmed.contains('\n')
        && !trimmed.contains("://")
}
