//! JSONL activity log
//!
//! Records are handed to a background writer task over an unbounded channel
//! so the queue never waits on disk. Each record becomes one line in
//! `{log_dir}/activity.jsonl`.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use eyre::Context;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::ActivityLog;
use super::record::ActivityRecord;

const ACTIVITY_FILE: &str = "activity.jsonl";

/// Activity sink that appends to a JSONL file
#[derive(Clone)]
pub struct JsonlActivityLog {
    tx: mpsc::UnboundedSender<ActivityRecord>,
    path: PathBuf,
}

impl JsonlActivityLog {
    /// Open (or create) the log under `log_dir` and spawn its writer task
    ///
    /// The writer exits once every clone of the returned log is dropped.
    pub fn spawn(log_dir: impl AsRef<Path>) -> eyre::Result<(Self, tokio::task::JoinHandle<()>)> {
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir).context(format!("Failed to create activity dir {}", log_dir.display()))?;

        let path = log_dir.join(ACTIVITY_FILE);
        debug!(?path, "JsonlActivityLog::spawn: opening log file");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context(format!("Failed to open activity log {}", path.display()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(write_loop(BufWriter::new(file), rx));

        Ok((Self { tx, path }, handle))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ActivityLog for JsonlActivityLog {
    fn record(&self, record: ActivityRecord) {
        if self.tx.send(record).is_err() {
            warn!("JsonlActivityLog::record: writer task has stopped");
        }
    }
}

async fn write_loop<W: Write>(mut writer: W, mut rx: mpsc::UnboundedReceiver<ActivityRecord>) {
    debug!("JsonlActivityLog: writer started");
    while let Some(record) = rx.recv().await {
        if let Err(e) = write_record(&mut writer, &record) {
            error!(task_id = %record.task_id, error = %e, "JsonlActivityLog: failed to write record");
        }
    }
    let _ = writer.flush();
    debug!("JsonlActivityLog: writer stopped");
}

fn write_record<W: Write>(writer: &mut W, record: &ActivityRecord) -> eyre::Result<()> {
    let json = serde_json::to_string(record)?;
    writeln!(writer, "{}", json)?;
    writer.flush()?;
    Ok(())
}

/// Read all records from an activity log directory
pub fn read_activity(log_dir: impl AsRef<Path>) -> eyre::Result<Vec<ActivityRecord>> {
    let path = log_dir.as_ref().join(ACTIVITY_FILE);
    debug!(?path, "read_activity: reading log file");

    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&path)?;
    let mut records = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ActivityRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(line, error = %e, "read_activity: failed to parse line");
            }
        }
    }

    debug!(count = records.len(), "read_activity: loaded records");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityKind;
    use crate::domain::{NewTask, TaskPayload};
    use std::time::Duration;
    use tempfile::tempdir;

    fn record(kind: ActivityKind) -> ActivityRecord {
        let task = NewTask::new(TaskPayload::DailyReport {
            repo_name: "acme/widgets".to_string(),
        })
        .with_repo(1)
        .into_task(3);
        ActivityRecord::for_task(kind, &task, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_records_are_appended_and_read_back() {
        let temp = tempdir().unwrap();
        let (log, handle) = JsonlActivityLog::spawn(temp.path()).unwrap();

        log.record(record(ActivityKind::Enqueued));
        log.record(record(ActivityKind::Completed));
        drop(log);
        handle.await.unwrap();

        let records = read_activity(temp.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, ActivityKind::Enqueued);
        assert_eq!(records[1].kind, ActivityKind::Completed);
    }

    #[tokio::test]
    async fn test_reopen_appends() {
        let temp = tempdir().unwrap();
        for _ in 0..2 {
            let (log, handle) = JsonlActivityLog::spawn(temp.path()).unwrap();
            log.record(record(ActivityKind::Failed));
            drop(log);
            handle.await.unwrap();
        }
        assert_eq!(read_activity(temp.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_read_missing_log() {
        let temp = tempdir().unwrap();
        assert!(read_activity(temp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_read_skips_garbage_lines() {
        let temp = tempdir().unwrap();
        let good = serde_json::to_string(&record(ActivityKind::Retrying)).unwrap();
        fs::write(temp.path().join(ACTIVITY_FILE), format!("{}\nnot json\n\n", good)).unwrap();

        let records = read_activity(temp.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ActivityKind::Retrying);
    }
}
