pub mod actions;
pub mod descriptor;
pub mod registry;

use async_trait::async_trait;

use crate::errors::{SandpilotError, SandpilotResult};

pub use actions::{register_desktop_tools, DesktopControls};
pub use descriptor::{ParamField, ToolDescriptor};
pub use registry::ToolRegistry;

/// Keyword-style arguments of one tool call.
pub type ToolArgs = serde_json::Map<String, serde_json::Value>;

/// Bound implementation of a registered tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool and return a human-readable confirmation string.
    /// Errors are converted to observations by the dispatcher.
    async fn invoke(&self, args: &ToolArgs) -> SandpilotResult<String>;
}

pub(crate) fn required_str<'a>(args: &'a ToolArgs, key: &str) -> SandpilotResult<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| SandpilotError::Executor(format!("missing required parameter `{key}`")))
}
