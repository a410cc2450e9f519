//! Diagnostic trace of bus activity
//!
//! A `TraceSink` observes every subscribe, dispatch, handler invocation and
//! lifecycle transition without being part of the delivery contract. Sink
//! failures are logged and never affect dispatch.

use crate::config::TraceConfig;
use crate::error::{BusError, Result};
use crate::types::SubscriptionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Kind of bus activity recorded in the trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TraceAction {
    Subscribe,
    Unsubscribe,
    /// Event queued before start
    Buffer,
    /// Event entered the delivery chain
    Dispatch,
    /// One handler invocation
    Consume,
    /// A handler stopped the chain
    ShortCircuit,
    Start,
    Close,
}

/// One line of the trace log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceRecord {
    pub timestamp: DateTime<Utc>,

    pub action: TraceAction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,

    /// Free-form detail (replay counts, drop reasons)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl TraceRecord {
    /// Create a record stamped with the current time
    pub fn new(action: TraceAction) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            event_id: None,
            subscription: None,
            priority: None,
            detail: None,
        }
    }

    pub fn event(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    pub fn subscription(mut self, id: SubscriptionId, priority: i32) -> Self {
        self.subscription = Some(id.to_string());
        self.priority = Some(priority);
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Destination for trace records
pub trait TraceSink: Send + Sync {
    /// Record one bus action
    fn record(&self, record: &TraceRecord) -> Result<()>;

    /// Flush buffered records
    fn flush(&self) -> Result<()>;
}

/// JSON-lines file sink
///
/// Writes one JSON object per line through a buffered writer. Parent
/// directories are created on open.
pub struct FileTraceSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileTraceSink {
    /// Open (truncating) a trace file
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(path.into(), false)
    }

    /// Open a trace file as described by `config`
    pub fn from_config(config: &TraceConfig) -> Result<Self> {
        Self::open(config.path.clone(), config.append)
    }

    fn open(path: PathBuf, append: bool) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    BusError::Trace(format!(
                        "Failed to create trace directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)
            .map_err(|e| {
                BusError::Trace(format!(
                    "Failed to open trace file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        tracing::debug!(path = %path.display(), append, "Trace sink opened");
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TraceSink for FileTraceSink {
    fn record(&self, record: &TraceRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| BusError::Trace(format!("Failed to acquire trace lock: {}", e)))?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| BusError::Trace(format!("Failed to acquire trace lock: {}", e)))?;
        writer.flush()?;
        Ok(())
    }
}

/// In-memory trace sink for testing
#[derive(Default)]
pub struct MemoryTraceSink {
    records: Mutex<Vec<TraceRecord>>,
}

impl MemoryTraceSink {
    /// All records captured so far
    pub fn records(&self) -> Vec<TraceRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Just the actions, in order
    pub fn actions(&self) -> Vec<TraceAction> {
        self.records().iter().map(|r| r.action).collect()
    }
}

impl TraceSink for MemoryTraceSink {
    fn record(&self, record: &TraceRecord) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| BusError::Trace(format!("Failed to acquire trace lock: {}", e)))?;
        records.push(record.clone());
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_lines(path: &Path) -> Vec<TraceRecord> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_record_builder() {
        let id = SubscriptionId::new();
        let record = TraceRecord::new(TraceAction::Consume)
            .event("bird")
            .subscription(id, 99);

        assert_eq!(record.action, TraceAction::Consume);
        assert_eq!(record.event_id.as_deref(), Some("bird"));
        assert_eq!(record.subscription, Some(id.to_string()));
        assert_eq!(record.priority, Some(99));
        assert!(record.detail.is_none());
    }

    #[test]
    fn test_record_json_omits_empty_fields() {
        let record = TraceRecord::new(TraceAction::Start).detail("replayed 2");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["action"], "start");
        assert_eq!(json["detail"], "replayed 2");
        assert!(json.get("eventId").is_none());
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemoryTraceSink::default();
        sink.record(&TraceRecord::new(TraceAction::Subscribe)).unwrap();
        sink.record(&TraceRecord::new(TraceAction::Dispatch).event("bird"))
            .unwrap();
        sink.flush().unwrap();

        assert_eq!(
            sink.actions(),
            vec![TraceAction::Subscribe, TraceAction::Dispatch]
        );
        assert_eq!(sink.records()[1].event_id.as_deref(), Some("bird"));
    }

    #[test]
    fn test_file_sink_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");

        let sink = FileTraceSink::create(&path).unwrap();
        sink.record(&TraceRecord::new(TraceAction::Buffer).event("work_dir_change"))
            .unwrap();
        sink.record(&TraceRecord::new(TraceAction::Start)).unwrap();
        sink.flush().unwrap();

        let records = read_lines(&path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action, TraceAction::Buffer);
        assert_eq!(records[0].event_id.as_deref(), Some("work_dir_change"));
        assert_eq!(records[1].action, TraceAction::Start);
    }

    #[test]
    fn test_file_sink_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deep/trace.jsonl");

        let sink = FileTraceSink::create(&path).unwrap();
        sink.flush().unwrap();
        assert!(path.exists());
        assert_eq!(sink.path(), path.as_path());
    }

    #[test]
    fn test_file_sink_truncate_vs_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");

        let first = FileTraceSink::create(&path).unwrap();
        first.record(&TraceRecord::new(TraceAction::Start)).unwrap();
        first.flush().unwrap();
        drop(first);

        let appending = FileTraceSink::from_config(&TraceConfig {
            path: path.clone(),
            append: true,
        })
        .unwrap();
        appending.record(&TraceRecord::new(TraceAction::Close)).unwrap();
        appending.flush().unwrap();
        drop(appending);
        assert_eq!(read_lines(&path).len(), 2);

        let truncating = FileTraceSink::create(&path).unwrap();
        truncating.flush().unwrap();
        assert!(read_lines(&path).is_empty());
    }
}
