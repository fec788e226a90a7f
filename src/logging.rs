use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Styling hint attached to a run-log line. Mapped onto tracing levels here;
/// embedders rendering the log file may map it onto colours instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStyle {
    Plain,
    Gray,
    Green,
    Blue,
    Red,
    Yellow,
}

/// Append-only per-run log.
///
/// `line` returns the text unchanged so callers can log and forward in one
/// expression, e.g. `messages.push(user_text(&log.line(&thought, LogStyle::Green)))`.
pub struct RunLog {
    file: Option<Mutex<std::fs::File>>,
    path: Option<PathBuf>,
}

impl RunLog {
    /// Open `log.txt` under `output_dir` for appending.
    pub fn new(output_dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join("log.txt");
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::debug!(path = %path.display(), "run log opened");
        Ok(Self {
            file: Some(Mutex::new(file)),
            path: Some(path),
        })
    }

    /// A log that only forwards to tracing, without a backing file.
    pub fn disabled() -> Self {
        Self {
            file: None,
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record one tagged line and return it unchanged.
    pub fn line(&self, text: &str, style: LogStyle) -> String {
        match style {
            LogStyle::Gray => tracing::debug!("{text}"),
            LogStyle::Red => tracing::warn!("{text}"),
            _ => tracing::info!("{text}"),
        }

        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                if let Err(e) = writeln!(f, "{text}") {
                    tracing::warn!(error = %e, "run log write failed");
                }
            }
        }

        text.to_string()
    }
}
