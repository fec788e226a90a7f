use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::errors::SandpilotResult;

/// Per-run store for captured frames and annotation images.
///
/// Files are written into a temporary directory that lives as long as the
/// store; a monotonically increasing counter keeps filenames distinct.
/// Exactly one "latest" screenshot reference exists at a time.
pub struct ScreenshotStore {
    dir: TempDir,
    counter: u32,
    latest: Option<PathBuf>,
}

impl ScreenshotStore {
    pub fn new() -> SandpilotResult<Self> {
        let dir = tempfile::tempdir()?;
        tracing::debug!(path = %dir.path().display(), "screenshot store created");
        Ok(Self {
            dir,
            counter: 0,
            latest: None,
        })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Write `bytes` as `<prefix>_<n>.png` and return the path.
    pub fn save_image(&mut self, bytes: &[u8], prefix: &str) -> SandpilotResult<PathBuf> {
        self.counter += 1;
        let path = self.dir.path().join(format!("{prefix}_{}.png", self.counter));
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Save a captured frame and make it the latest screenshot reference.
    pub fn record_capture(&mut self, bytes: &[u8]) -> SandpilotResult<PathBuf> {
        let path = self.save_image(bytes, "screenshot")?;
        self.latest = Some(path.clone());
        Ok(path)
    }

    /// Path of the most recent captured frame, if any.
    pub fn latest(&self) -> Option<&Path> {
        self.latest.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_are_numbered_across_prefixes() {
        let mut store = ScreenshotStore::new().unwrap();
        let a = store.record_capture(b"frame-1").unwrap();
        let b = store.save_image(b"dot", "location").unwrap();
        let c = store.record_capture(b"frame-2").unwrap();

        assert!(a.ends_with("screenshot_1.png"));
        assert!(b.ends_with("location_2.png"));
        assert!(c.ends_with("screenshot_3.png"));
    }

    #[test]
    fn latest_tracks_captures_only() {
        let mut store = ScreenshotStore::new().unwrap();
        assert!(store.latest().is_none());

        let first = store.record_capture(b"frame-1").unwrap();
        assert_eq!(store.latest().unwrap(), first);

        // Annotation images do not move the latest reference.
        store.save_image(b"dot", "location").unwrap();
        assert_eq!(store.latest().unwrap(), first);

        let second = store.record_capture(b"frame-2").unwrap();
        assert_eq!(store.latest().unwrap(), second);
        assert_eq!(std::fs::read(second).unwrap(), b"frame-2");
    }
}
