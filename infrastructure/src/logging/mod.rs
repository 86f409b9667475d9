//! Logging infrastructure: structured bridge-event logging.
//!
//! Provides [`JsonlEventLogger`], a JSONL file writer that implements
//! the [`BridgeEventLogger`](toolbridge_application::BridgeEventLogger) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlEventLogger;
