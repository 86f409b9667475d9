//! JSONL file writer for bridge events.
//!
//! Each [`BridgeEvent`] becomes one JSON line: the payload's fields plus
//! `type` and `timestamp`. Timestamps come from the engine's clock so a
//! replay under a manual clock produces a reproducible log.

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use toolbridge_application::{BridgeEvent, BridgeEventLogger, Clock};
use tracing::warn;

/// Append-only JSONL event log.
pub struct JsonlEventLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl JsonlEventLogger {
    /// Open `path` for appending, creating it and its parent directories.
    pub fn open(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
            clock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record(&self, event: BridgeEvent) -> Value {
        let timestamp = self
            .clock
            .now()
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        let mut record = match event.payload {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        record.insert("type".to_string(), Value::from(event.event_type));
        record.insert("timestamp".to_string(), Value::String(timestamp));
        Value::Object(record)
    }
}

impl BridgeEventLogger for JsonlEventLogger {
    fn log(&self, event: BridgeEvent) {
        let event_type = event.event_type;
        let line = match serde_json::to_string(&self.record(event)) {
            Ok(line) => line,
            Err(e) => {
                warn!(event_type, error = %e, "Could not serialize bridge event");
                return;
            }
        };

        let mut writer = self.writer.lock();
        // Flushed per line so the log survives a crash
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            warn!(path = %self.path.display(), error = %e, "Could not write bridge event");
        }
    }
}

impl Drop for JsonlEventLogger {
    fn drop(&mut self) {
        let _ = self.writer.get_mut().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use toolbridge_application::{ManualClock, event_types};

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ))
    }

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_writes_one_object_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let logger = JsonlEventLogger::open(&path, clock()).unwrap();

        logger.log(BridgeEvent::new(
            event_types::TURN_ADMITTED,
            json!({"session_id": "s1", "order": ["c1", "c2"]}),
        ));
        logger.log(BridgeEvent::new(
            event_types::CALL_TRANSITIONED,
            json!({"session_id": "s1", "call_id": "c1", "state": "in_progress"}),
        ));
        drop(logger);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "turn_admitted");
        assert_eq!(lines[0]["timestamp"], "2024-05-01T12:00:00.000Z");
        assert_eq!(lines[0]["order"], json!(["c1", "c2"]));
        assert_eq!(lines[1]["type"], "call_transitioned");
        assert_eq!(lines[1]["state"], "in_progress");
    }

    #[test]
    fn test_non_object_payload_is_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let logger = JsonlEventLogger::open(&path, clock()).unwrap();
        logger.log(BridgeEvent::new(event_types::ORPHAN_RESULT, json!("ghost")));
        drop(logger);

        let lines = read_lines(&path);
        assert_eq!(lines[0]["type"], "orphan_result");
        assert_eq!(lines[0]["data"], "ghost");
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("events.jsonl");
        for n in 0..2 {
            let logger = JsonlEventLogger::open(&path, clock()).unwrap();
            logger.log(BridgeEvent::new(event_types::SESSION_ENDED, json!({"n": n})));
        }
        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["n"], 1);
    }

    #[test]
    fn test_open_fails_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        assert!(JsonlEventLogger::open(blocker.join("events.jsonl"), clock()).is_err());
    }
}
