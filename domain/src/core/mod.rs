//! Core domain concepts shared across all subdomains.
//!
//! - [`error::BridgeError`] / [`error::ChoiceError`]: domain failures and the
//!   [`error::ErrorKind`] taxonomy they map onto
//! - [`validation::Severity`]: severity shared by diagnostics, violations and config issues
//! - [`timing::Timing`]: elapsed-vs-budget measurement attached to mutating operations

pub mod error;
pub mod string;
pub mod timing;
pub mod validation;
