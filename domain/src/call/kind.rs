//! Operation kinds and the static scheduling priority table.
//!
//! Every function name is classified into an [`OperationKind`]. The kind
//! decides two things: which arguments name resources the call reads or
//! writes (see [`crate::coordination::resources`]), and where the call goes
//! among calls that are ready at the same time.
//!
//! | Kind | Priority | Examples |
//! |------|----------|----------|
//! | `Read` | 10 | `read_file`, `view`, `cat` |
//! | `List` | 10 | `list_directory`, `glob_search`, `tree` |
//! | `Search` | 20 | `grep_search`, `search_files`, `find` |
//! | `Fetch` | 30 | `web_fetch`, `http_get`, `download` |
//! | `Transform` | 40 | `transform_file`, `convert_file` |
//! | `Write` | 40 | `write_file`, `edit_file`, `delete_file` |
//! | `Unknown` | 45 | anything unrecognised |
//! | `Execute` | 50 | `run_command`, `bash`, `execute` |
//!
//! Lower numbers run first: cheap, informative work goes ahead of work with
//! side effects, and command execution goes last.

use serde::{Deserialize, Serialize};

/// Classification of a function by what it does to resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Read,
    List,
    Search,
    Fetch,
    Write,
    /// Reads a declared input path and writes a declared output path.
    Transform,
    Execute,
    Unknown,
}

/// Exact names checked before the keyword heuristics.
const KNOWN_NAMES: &[(&str, OperationKind)] = &[
    ("read_file", OperationKind::Read),
    ("read", OperationKind::Read),
    ("view", OperationKind::Read),
    ("cat", OperationKind::Read),
    ("list_directory", OperationKind::List),
    ("list_files", OperationKind::List),
    ("ls", OperationKind::List),
    ("glob", OperationKind::List),
    ("glob_search", OperationKind::List),
    ("tree", OperationKind::List),
    ("grep", OperationKind::Search),
    ("grep_search", OperationKind::Search),
    ("search_files", OperationKind::Search),
    ("find", OperationKind::Search),
    ("web_search", OperationKind::Search),
    ("web_fetch", OperationKind::Fetch),
    ("fetch", OperationKind::Fetch),
    ("http_get", OperationKind::Fetch),
    ("download", OperationKind::Fetch),
    ("write_file", OperationKind::Write),
    ("write", OperationKind::Write),
    ("edit_file", OperationKind::Write),
    ("edit", OperationKind::Write),
    ("create_file", OperationKind::Write),
    ("delete_file", OperationKind::Write),
    ("transform_file", OperationKind::Transform),
    ("convert_file", OperationKind::Transform),
    ("run_command", OperationKind::Execute),
    ("bash", OperationKind::Execute),
    ("shell", OperationKind::Execute),
    ("execute", OperationKind::Execute),
];

/// Keyword heuristics, checked in order. The first match wins, so the
/// side-effecting keywords come before the read-like ones (`read_and_write`
/// must not be scheduled as a read).
const KEYWORDS: &[(&str, OperationKind)] = &[
    ("transform", OperationKind::Transform),
    ("convert", OperationKind::Transform),
    ("exec", OperationKind::Execute),
    ("run", OperationKind::Execute),
    ("bash", OperationKind::Execute),
    ("shell", OperationKind::Execute),
    ("command", OperationKind::Execute),
    ("write", OperationKind::Write),
    ("edit", OperationKind::Write),
    ("create", OperationKind::Write),
    ("delete", OperationKind::Write),
    ("remove", OperationKind::Write),
    ("update", OperationKind::Write),
    ("patch", OperationKind::Write),
    ("move", OperationKind::Write),
    ("rename", OperationKind::Write),
    ("mkdir", OperationKind::Write),
    ("save", OperationKind::Write),
    ("fetch", OperationKind::Fetch),
    ("http", OperationKind::Fetch),
    ("download", OperationKind::Fetch),
    ("url", OperationKind::Fetch),
    ("search", OperationKind::Search),
    ("grep", OperationKind::Search),
    ("find", OperationKind::Search),
    ("query", OperationKind::Search),
    ("list", OperationKind::List),
    ("glob", OperationKind::List),
    ("tree", OperationKind::List),
    ("read", OperationKind::Read),
    ("get", OperationKind::Read),
    ("view", OperationKind::Read),
    ("show", OperationKind::Read),
    ("open", OperationKind::Read),
];

impl OperationKind {
    /// Classify a function name.
    pub fn classify(function_name: &str) -> Self {
        let name = function_name.trim().to_ascii_lowercase();

        if let Some((_, kind)) = KNOWN_NAMES.iter().find(|(known, _)| *known == name) {
            return *kind;
        }

        KEYWORDS
            .iter()
            .find(|(keyword, _)| name.contains(keyword))
            .map(|(_, kind)| *kind)
            .unwrap_or(OperationKind::Unknown)
    }

    /// Static scheduling priority. Lower runs first.
    pub fn priority(&self) -> u8 {
        match self {
            OperationKind::Read | OperationKind::List => 10,
            OperationKind::Search => 20,
            OperationKind::Fetch => 30,
            OperationKind::Write | OperationKind::Transform => 40,
            OperationKind::Unknown => 45,
            OperationKind::Execute => 50,
        }
    }

    /// Whether the call only observes resources.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            OperationKind::Read | OperationKind::List | OperationKind::Search | OperationKind::Fetch
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Read => "read",
            OperationKind::List => "list",
            OperationKind::Search => "search",
            OperationKind::Fetch => "fetch",
            OperationKind::Write => "write",
            OperationKind::Transform => "transform",
            OperationKind::Execute => "execute",
            OperationKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_names() {
        assert_eq!(OperationKind::classify("read_file"), OperationKind::Read);
        assert_eq!(OperationKind::classify("glob_search"), OperationKind::List);
        assert_eq!(OperationKind::classify("grep_search"), OperationKind::Search);
        assert_eq!(OperationKind::classify("web_fetch"), OperationKind::Fetch);
        assert_eq!(OperationKind::classify("write_file"), OperationKind::Write);
        assert_eq!(OperationKind::classify("transform_file"), OperationKind::Transform);
        assert_eq!(OperationKind::classify("run_command"), OperationKind::Execute);
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(OperationKind::classify("Read_File"), OperationKind::Read);
        assert_eq!(OperationKind::classify(" BASH "), OperationKind::Execute);
    }

    #[test]
    fn test_classify_keywords() {
        assert_eq!(OperationKind::classify("mcp__fs__read_text"), OperationKind::Read);
        assert_eq!(OperationKind::classify("list_buckets"), OperationKind::List);
        assert_eq!(OperationKind::classify("read_and_write"), OperationKind::Write);
        assert_eq!(OperationKind::classify("convert_image"), OperationKind::Transform);
        assert_eq!(OperationKind::classify("run_tests"), OperationKind::Execute);
        assert_eq!(OperationKind::classify("summarize"), OperationKind::Unknown);
    }

    #[test]
    fn test_priority_order() {
        assert!(OperationKind::Read.priority() < OperationKind::Search.priority());
        assert_eq!(OperationKind::Read.priority(), OperationKind::List.priority());
        assert!(OperationKind::Search.priority() < OperationKind::Fetch.priority());
        assert!(OperationKind::Fetch.priority() < OperationKind::Write.priority());
        assert!(OperationKind::Write.priority() < OperationKind::Execute.priority());
        assert!(OperationKind::Unknown.priority() < OperationKind::Execute.priority());
    }

    #[test]
    fn test_read_only() {
        assert!(OperationKind::Read.is_read_only());
        assert!(OperationKind::Fetch.is_read_only());
        assert!(!OperationKind::Write.is_read_only());
        assert!(!OperationKind::Execute.is_read_only());
    }
}
