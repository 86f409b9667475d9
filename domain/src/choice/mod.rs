//! Tool choice domain module
//!
//! A [`ToolChoice`] constrains whether, and which, functions a turn may call.
//! [`rules::evaluate`] checks a candidate response against it and produces a
//! [`ChoiceVerdict`], repairing the response where that is possible:
//!
//! | Directive | Violation | Repair |
//! |-----------|-----------|--------|
//! | `auto` | never | none |
//! | `none` | any tool call (error) | strip calls, keep or substitute text (`forceTextOnly`) |
//! | `required` | no tool call (error) | none, rejected |
//! | `function(X)` | no call to X (error) | none, rejected |
//! | `function(X)` | calls to others (warning) | keep only calls to X (`filterTools`) |
//! | `function(X)` | marker not `tool_calls` (warning) | fix marker (`forceFunction`) |

pub mod directive;
pub mod rules;
pub mod verdict;

pub use directive::ToolChoice;
pub use rules::evaluate;
pub use verdict::{ChoiceAction, ChoiceVerdict, ChoiceViolation, ViolationKind};
