use std::collections::HashMap;
use std::sync::Arc;

use crate::llm::types::ToolDef;
use crate::tools::descriptor::ToolDescriptor;
use crate::tools::ToolHandler;

/// A descriptor plus its bound implementation.
pub struct RegisteredTool {
    descriptor: ToolDescriptor,
    handler: Arc<dyn ToolHandler>,
}

impl RegisteredTool {
    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    pub fn handler(&self) -> &Arc<dyn ToolHandler> {
        &self.handler
    }
}

/// Catalog of the tools available to one agent instance.
///
/// Built once per session via ordinary `register` calls; owned by the agent
/// or orchestrator and passed explicitly to the dispatcher. No removal
/// operation: registries live exactly as long as their session.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A name collision replaces the previous entry
    /// in place (last write wins) and is logged so it is never silent.
    pub fn register(&mut self, descriptor: ToolDescriptor, handler: Arc<dyn ToolHandler>) {
        let name = descriptor.name.clone();
        let entry = RegisteredTool { descriptor, handler };
        if let Some(&pos) = self.index.get(&name) {
            tracing::warn!(tool = %name, "tool re-registered, replacing previous entry");
            self.entries[pos] = entry;
        } else {
            self.index.insert(name, self.entries.len());
            self.entries.push(entry);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&RegisteredTool> {
        self.index.get(name).map(|&pos| &self.entries[pos])
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    /// Function catalog handed to the action model.
    pub fn tool_defs(&self) -> Vec<ToolDef> {
        self.entries
            .iter()
            .map(|e| e.descriptor.to_tool_def())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SandpilotResult;
    use crate::tools::ToolArgs;
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl crate::tools::ToolHandler for Canned {
        async fn invoke(&self, _args: &ToolArgs) -> SandpilotResult<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn descriptors_keep_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolDescriptor::new("stop", "Stop."), Arc::new(Canned("")));
        registry.register(ToolDescriptor::new("click", "Click."), Arc::new(Canned("")));
        registry.register(ToolDescriptor::new("type_text", "Type."), Arc::new(Canned("")));

        let names: Vec<_> = registry.descriptors().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["stop", "click", "type_text"]);
        assert_eq!(registry.tool_defs().len(), 3);
    }

    #[tokio::test]
    async fn collision_is_last_write_wins() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolDescriptor::new("click", "Old."), Arc::new(Canned("old")));
        registry.register(ToolDescriptor::new("click", "New."), Arc::new(Canned("new")));

        assert_eq!(registry.len(), 1);
        let entry = registry.lookup("click").unwrap();
        assert_eq!(entry.descriptor().description, "New.");
        let out = entry.handler().invoke(&ToolArgs::new()).await.unwrap();
        assert_eq!(out, "new");
    }

    #[test]
    fn lookup_unknown_is_none() {
        let registry = ToolRegistry::new();
        assert!(registry.lookup("nonexistent_tool").is_none());
    }
}
