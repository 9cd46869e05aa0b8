//! Append-only JSONL mirror of published events.
//!
//! Every bus publish is echoed as one compact JSON line `{ts, topic, data}`
//! for quick local inspection. The file is opened per append under a
//! dedicated lock so any context may log safely; journal faults never
//! disturb the publish path.

use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct EventJournal {
    path: Option<PathBuf>,
    fsync: bool,
    lock: Mutex<()>,
}

impl EventJournal {
    pub fn new(path: Option<PathBuf>, fsync: bool) -> EventJournal {
        EventJournal {
            path,
            fsync,
            lock: Mutex::new(()),
        }
    }

    pub fn disabled() -> EventJournal {
        EventJournal::new(None, false)
    }

    /// Mirror one published payload. The entry timestamp is the payload's
    /// `ts` field when present, else the current wall clock.
    pub fn append<T: Serialize>(&self, topic: &str, payload: &T) {
        let Some(path) = self.path.clone() else {
            return;
        };
        let data = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("journal: unserializable payload on {}: {}", topic, e);
                return;
            }
        };
        let ts = data
            .get("ts")
            .and_then(|v| v.as_f64())
            .unwrap_or_else(crate::utc_timestamp);
        let entry = serde_json::json!({"ts": ts, "topic": topic, "data": data});

        if let Err(e) = self.write_line(&path, &entry.to_string()) {
            log::warn!("journal append to {} failed: {}", path.display(), e);
        }
    }

    fn write_line(&self, path: &Path, line: &str) -> std::io::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        if self.fsync {
            file.sync_data()?;
        }
        Ok(())
    }
}
