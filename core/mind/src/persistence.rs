use anyhow::{Context, Result};
use daylife_schemas::{Event, RunId, RunRecord};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::services::{LogAppender, RecordStore};

pub const RECORD_FILE: &str = "record.json";
pub const LOG_FILE: &str = "daylife.log";

/// JSON files under one output directory: the run record plus one event
/// forest snapshot per completed day.
pub struct JsonRecordStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonRecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn record_path(&self) -> PathBuf {
        self.dir.join(RECORD_FILE)
    }

    pub fn snapshot_path(&self, date: &str) -> PathBuf {
        self.dir.join(format!("events_{}.json", date))
    }
}

impl RecordStore for JsonRecordStore {
    fn load(&self) -> Result<RunRecord> {
        let path = self.record_path();
        if !path.exists() {
            return Ok(RunRecord::default());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if text.trim().is_empty() {
            return Ok(RunRecord::default());
        }
        serde_json::from_str(&text).with_context(|| format!("Malformed record {}", path.display()))
    }

    fn save(&self, record: &RunRecord) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        write_json(&self.record_path(), record)?;
        debug!("Saved run record for {:?}", record.date);
        Ok(())
    }

    fn save_event_snapshot(&self, date: &str, events: &[Event]) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        write_json(&self.snapshot_path(date), &events)?;
        debug!("Saved {} top-level events for {}", events.len(), date);
        Ok(())
    }
}

/// Writes through a sibling temp file so readers never see half a document
fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, text).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

/// Shared append-only text log; every block is headed with the run id
pub struct FileLogAppender {
    path: PathBuf,
    run_id: RunId,
    lock: Mutex<()>,
}

impl FileLogAppender {
    pub fn new(dir: impl AsRef<Path>, run_id: RunId) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        Ok(Self {
            path: dir.join(LOG_FILE),
            run_id,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogAppender for FileLogAppender {
    fn append(&self, text: &str, date: &str, section: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        writeln!(file, "=== {} {} [{}] ===", self.run_id, date, section)?;
        writeln!(file, "{}", text.trim_end())?;
        writeln!(file)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daylife_schemas::generate_run_id;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_missing_record_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonRecordStore::new(dir.path()).unwrap();

        let record = store.load().unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonRecordStore::new(dir.path().join("nested")).unwrap();

        let record = RunRecord {
            date: Some("2025-01-01".to_string()),
            persona: json!({"name": "李华"}),
            long_memory: "喜欢跑步".to_string(),
            thought: "明天早起".to_string(),
            ..RunRecord::default()
        };
        store.save(&record).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.long_memory, "喜欢跑步");
        assert_eq!(loaded.persona["name"], "李华");
        assert!(!store.record_path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_event_snapshot_is_overwritten() {
        let dir = TempDir::new().unwrap();
        let store = JsonRecordStore::new(dir.path()).unwrap();

        store
            .save_event_snapshot("2025-01-01", &[Event::new("1", "上班", &["2025-01-01"])])
            .unwrap();
        store
            .save_event_snapshot(
                "2025-01-01",
                &[
                    Event::new("1", "上班", &["2025-01-01"]),
                    Event::new("2", "健身", &["2025-01-01"]),
                ],
            )
            .unwrap();

        let text = fs::read_to_string(store.snapshot_path("2025-01-01")).unwrap();
        let events: Vec<Event> = serde_json::from_str(&text).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_log_blocks_are_appended() {
        let dir = TempDir::new().unwrap();
        let run_id = generate_run_id();
        let log = FileLogAppender::new(dir.path(), run_id.clone()).unwrap();

        log.append("早上出门", "2025-01-01", "t1").unwrap();
        log.append("晚上回家", "2025-01-01", "t2").unwrap();

        let text = fs::read_to_string(log.path()).unwrap();
        assert!(text.contains(&format!("=== {} 2025-01-01 [t1] ===\n早上出门", run_id)));
        assert!(text.find("[t1]").unwrap() < text.find("[t2]").unwrap());
    }
}
