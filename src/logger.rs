use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use crate::diff::diff_payload;
use crate::protocol::Message;

/// Default suppression window for repeated payload warnings (4 hours).
pub const DEFAULT_LOG_SUPPRESSION: Duration = Duration::from_secs(14400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLogMode {
    Full,
    Diffed,
}

/// NDJSON trace of the messages exchanged with a device.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous_payloads: HashMap<String, Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous_payloads: HashMap::new(),
        })
    }

    pub fn log_request(&mut self, message: &Message) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "namespace": message.header.namespace,
            "method": message.header.method,
            "messageId": message.header.message_id,
            "payload": message.payload,
        });
        self.write_line(&entry);
    }

    pub fn log_response(&mut self, message: &Message) {
        let namespace = message.header.namespace.as_str();
        let base = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "resp",
            "namespace": namespace,
            "method": message.header.method,
            "messageId": message.header.message_id,
        });

        let entry = match self.mode {
            MessageLogMode::Full => with_field(base, "payload", message.payload.clone()),
            MessageLogMode::Diffed => match self.previous_payloads.get(namespace) {
                None => {
                    let entry = with_field(base, "full", Value::Bool(true));
                    with_field(entry, "payload", message.payload.clone())
                }
                Some(prev) => {
                    let mut changes = Vec::new();
                    diff_payload(prev, &message.payload, "", &mut changes);
                    let change_entries: Vec<Value> = changes
                        .iter()
                        .map(|c| json!({ "path": c.path, "old": c.old, "new": c.new }))
                        .collect();
                    with_field(base, "changes", Value::Array(change_entries))
                }
            },
        };
        self.write_line(&entry);

        if self.mode == MessageLogMode::Diffed {
            self.previous_payloads
                .insert(namespace.to_string(), message.payload.clone());
        }
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}

fn with_field(mut entry: Value, key: &str, value: Value) -> Value {
    if let Value::Object(map) = &mut entry {
        map.insert(key.to_string(), value);
    }
    entry
}

/// Lets a given warning through at most once per window.
#[derive(Debug)]
pub struct LogThrottle {
    window: Duration,
    last_logged: HashMap<String, Instant>,
}

impl LogThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_logged: HashMap::new(),
        }
    }

    pub fn should_log(&mut self, key: &str) -> bool {
        let now = Instant::now();
        match self.last_logged.get(key) {
            Some(last) if now.duration_since(*last) < self.window => false,
            _ => {
                self.last_logged.insert(key.to_string(), now);
                true
            }
        }
    }
}

impl Default for LogThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_SUPPRESSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::{Method, Namespace};
    use crate::protocol::{build_request, DEFAULT_FROM};
    use tempfile::NamedTempFile;

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn response(payload: Value) -> Message {
        let mut msg = build_request(Namespace::ToggleX, Method::Get, payload, "", DEFAULT_FROM);
        msg.header.method = Method::GetAck;
        msg
    }

    #[test]
    fn log_request_writes_ndjson() {
        let tmp = NamedTempFile::new().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, tmp.path()).unwrap();
        let msg = build_request(Namespace::ToggleX, Method::Set, json!({"togglex": {}}), "", DEFAULT_FROM);
        logger.log_request(&msg);

        let lines = read_lines(tmp.path());
        assert_eq!(lines[0]["dir"], "req");
        assert_eq!(lines[0]["method"], "SET");
        assert_eq!(lines[0]["namespace"], "Appliance.Control.ToggleX");
        assert!(lines[0]["ts"].as_str().is_some());
    }

    #[test]
    fn diffed_mode_logs_full_first_then_changes() {
        let tmp = NamedTempFile::new().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, tmp.path()).unwrap();
        logger.log_response(&response(json!({"togglex": [{"channel": 0, "onoff": 0}]})));
        logger.log_response(&response(json!({"togglex": [{"channel": 0, "onoff": 1}]})));
        logger.log_response(&response(json!({"togglex": [{"channel": 0, "onoff": 1}]})));

        let lines = read_lines(tmp.path());
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["full"], true);
        assert!(lines[0]["payload"].is_object());
        assert_eq!(lines[1]["changes"][0]["path"], "togglex.[0].onoff");
        assert_eq!(lines[2]["changes"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn full_mode_keeps_payload() {
        let tmp = NamedTempFile::new().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, tmp.path()).unwrap();
        logger.log_response(&response(json!({"togglex": {"channel": 0, "onoff": 1}})));
        let lines = read_lines(tmp.path());
        assert_eq!(lines[0]["dir"], "resp");
        assert_eq!(lines[0]["payload"]["togglex"]["onoff"], 1);
    }

    #[test]
    fn throttle_suppresses_within_window() {
        let mut throttle = LogThrottle::new(Duration::from_secs(3600));
        assert!(throttle.should_log("a"));
        assert!(!throttle.should_log("a"));
        assert!(throttle.should_log("b"));
    }

    #[test]
    fn zero_window_never_suppresses() {
        let mut throttle = LogThrottle::new(Duration::ZERO);
        assert!(throttle.should_log("a"));
        assert!(throttle.should_log("a"));
    }
}
