use std::fmt;
use std::sync::Arc;

use crate::llm::types::ToolCall;
use crate::tools::registry::ToolRegistry;
use crate::tools::ToolArgs;

/// Textual result of executing one tool call, appended to conversation
/// history. Failures are data, not exceptions: the model sees them as just
/// another observation and can adapt.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub text: String,
    pub is_error: bool,
}

impl Observation {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Resolves proposed tool calls against the registry and invokes the bound
/// implementation. The single point of contact with the sandbox: nothing
/// past this boundary ever raises into the control loop.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Dispatch a wire-format tool call (arguments as a JSON string).
    pub async fn dispatch(&self, call: &ToolCall) -> Observation {
        let name = &call.function.name;
        let raw = call.function.arguments.trim();
        let args: ToolArgs = if raw.is_empty() {
            ToolArgs::new()
        } else {
            match serde_json::from_str(raw) {
                Ok(args) => args,
                Err(e) => {
                    tracing::warn!(tool = %name, error = %e, "malformed tool-call arguments");
                    return Observation::failure(format!("Malformed arguments for {name}: {e}"));
                }
            }
        };
        self.dispatch_parts(name, &args).await
    }

    /// Dispatch an already-parsed name + argument map (used by plan steps).
    pub async fn dispatch_parts(&self, name: &str, args: &ToolArgs) -> Observation {
        let Some(entry) = self.registry.lookup(name) else {
            tracing::warn!(tool = %name, "tool not found in registry");
            return Observation::failure("Tool not implemented.");
        };

        match entry.handler().invoke(args).await {
            Ok(text) => Observation::success(text),
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "tool execution failed");
                Observation::failure(format!("Error executing {name}: {e}"))
            }
        }
    }
}
