use std::time::Duration;

use async_trait::async_trait;

use crate::errors::SandpilotResult;

/// Output of a synchronous shell command inside the sandbox.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Merge stdout/stderr into one observation string.
    pub fn narrate(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
            (false, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (true, true) => "The command finished running.".to_string(),
        }
    }
}

/// The remote desktop sandbox collaborator.
///
/// Implementations wrap whatever transport the sandbox service exposes;
/// every failure surfaces as an error and is converted to an observation
/// by the action dispatcher.
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn run_command(&self, command: &str, timeout: Duration) -> SandpilotResult<CommandOutput>;

    async fn run_background(&self, command: &str) -> SandpilotResult<()>;

    /// Capture the current frame as PNG bytes.
    async fn capture_screenshot(&self) -> SandpilotResult<Vec<u8>>;

    async fn move_pointer(&self, x: u32, y: u32) -> SandpilotResult<()>;

    async fn primary_click(&self) -> SandpilotResult<()>;

    async fn secondary_click(&self) -> SandpilotResult<()>;

    async fn double_click(&self) -> SandpilotResult<()>;

    async fn send_text(&self, text: &str) -> SandpilotResult<()>;

    async fn send_hotkey(&self, keys: &[String]) -> SandpilotResult<()>;

    /// Push the sandbox session's expiry out by `seconds`.
    async fn extend_session_timeout(&self, seconds: u64) -> SandpilotResult<()>;
}
