//! JSONL session trail for audit events.
//!
//! The trail is append-only: opening the sink writes one header record
//! with the wall-clock start time, and every engine event becomes one
//! line carrying a monotonic sequence number and the milliseconds
//! elapsed since the session opened. Replaying a trail therefore
//! reconstructs both the order and the pacing of a session's rounds.

use conclave_application::ports::audit::{AuditEvent, AuditSink};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::warn;

/// One line of the trail after the header
#[derive(Serialize)]
struct TrailRecord {
    /// Monotonic position within this session
    seq: u64,
    /// Milliseconds since the sink was opened
    elapsed_ms: u64,
    event: &'static str,
    detail: serde_json::Value,
}

/// Audit sink appending one JSON line per engine event.
///
/// Line-buffered, so each record hits the file as soon as its newline
/// is written; a crashed session keeps everything up to its last event.
pub struct JsonlAuditSink {
    writer: Mutex<LineWriter<File>>,
    sequence: AtomicU64,
    opened: Instant,
    path: PathBuf,
}

impl JsonlAuditSink {
    /// Open (or create) a trail file and stamp the session header.
    ///
    /// Existing trails are appended to, so one file can hold several
    /// sessions back to back, each introduced by its own header.
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = LineWriter::new(file);
        let header = serde_json::json!({
            "trail": "conclave-session",
            "started": chrono::Utc::now().to_rfc3339(),
        });
        writeln!(writer, "{}", header)?;

        Ok(Self {
            writer: Mutex::new(writer),
            sequence: AtomicU64::new(0),
            opened: Instant::now(),
            path,
        })
    }

    /// Get the path to the trail file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, event: AuditEvent) {
        let record = TrailRecord {
            seq: self.sequence.fetch_add(1, Ordering::Relaxed),
            elapsed_ms: self.opened.elapsed().as_millis() as u64,
            event: event.event_type,
            detail: event.payload,
        };

        // The engine never blocks on its trail; a failed write is
        // logged and the session carries on
        if let Ok(line) = serde_json::to_string(&record)
            && let Ok(mut writer) = self.writer.lock()
            && let Err(e) = writeln!(writer, "{}", line)
        {
            warn!("Audit trail write failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_header_then_sequenced_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.audit.jsonl");
        let sink = JsonlAuditSink::new(&path).unwrap();

        sink.record(AuditEvent::new(
            "strategy_selected",
            serde_json::json!({ "strategy": "best_of_n", "calls": 3 }),
        ));
        sink.record(AuditEvent::new(
            "session_done",
            serde_json::json!({ "iterations": 1 }),
        ));
        drop(sink);

        let records = lines(&path);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["trail"], "conclave-session");
        assert!(records[0]["started"].is_string());

        assert_eq!(records[1]["seq"], 0);
        assert_eq!(records[1]["event"], "strategy_selected");
        assert_eq!(records[1]["detail"]["calls"], 3);

        assert_eq!(records[2]["seq"], 1);
        assert_eq!(records[2]["event"], "session_done");
        assert!(records[2]["elapsed_ms"].is_u64());
    }

    #[test]
    fn test_sessions_append_to_one_trail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trail.jsonl");

        let first = JsonlAuditSink::new(&path).unwrap();
        first.record(AuditEvent::new("session_done", serde_json::json!({})));
        drop(first);

        let second = JsonlAuditSink::new(&path).unwrap();
        second.record(AuditEvent::new("session_done", serde_json::json!({})));
        drop(second);

        let records = lines(&path);
        // Two headers, two events; the second session restarts seq
        assert_eq!(records.len(), 4);
        assert_eq!(records[2]["trail"], "conclave-session");
        assert_eq!(records[3]["seq"], 0);
    }

    #[test]
    fn test_parent_directories_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("trail.jsonl");

        let sink = JsonlAuditSink::new(&path).unwrap();
        sink.record(AuditEvent::new("session_done", serde_json::json!({})));
        assert_eq!(sink.path(), path.as_path());
        drop(sink);

        assert!(path.exists());
    }
}
