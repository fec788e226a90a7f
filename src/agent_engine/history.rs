use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::errors::SandpilotResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub ts: i64,
    pub role: String,
    pub content: Option<String>,
    pub tool_call: Option<serde_json::Value>,
}

/// Append-only JSONL transcript of one run, kept alongside the in-memory
/// conversation so a session can be audited after the fact.
pub struct SessionHistory {
    pub session_id: String,
    entries: Vec<HistoryEntry>,
    file_path: std::path::PathBuf,
}

impl SessionHistory {
    pub fn new() -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        let dir = data_dir_or_cwd();
        let file_path = dir.join(format!("session_{session_id}.jsonl"));
        Self {
            session_id,
            entries: Vec::new(),
            file_path,
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub fn record(&mut self, role: &str, content: Option<String>, tool_call: Option<serde_json::Value>) {
        self.push(HistoryEntry {
            ts: chrono::Utc::now().timestamp_millis(),
            role: role.to_string(),
            content,
            tool_call,
        });
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "history flush failed");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append the latest entry to the JSONL file.
    pub fn flush(&self) -> SandpilotResult<()> {
        if let Some(last) = self.entries.last() {
            let line = serde_json::to_string(last)?;
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.file_path)?;
            writeln!(file, "{}", line)?;
            tracing::debug!(
                path = %self.file_path.display(),
                "history entry flushed"
            );
        }
        Ok(())
    }
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns `~/.local/share/sandpilot/sessions` (or the platform data dir),
/// falling back to the current working directory.
fn data_dir_or_cwd() -> std::path::PathBuf {
    if let Some(data_dir) = dirs::data_local_dir() {
        let d = data_dir.join("sandpilot").join("sessions");
        let _ = std::fs::create_dir_all(&d);
        return d;
    }
    std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."))
}
