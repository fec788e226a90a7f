use serde::{Deserialize, Serialize};

use crate::llm::types::{FunctionDef, ToolDef};

/// One named parameter of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamField {
    pub name: String,
    /// JSON-schema scalar type, e.g. "string".
    pub kind: String,
    pub required: bool,
    pub description: String,
}

/// Declarative description of a registered tool. Immutable after
/// registration; the orchestrator derives its analyses from this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamField>,
}

impl ToolDescriptor {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            params: Vec::new(),
        }
    }

    /// Add a required string parameter.
    pub fn param(mut self, name: &str, description: &str) -> Self {
        self.params.push(ParamField {
            name: name.to_string(),
            kind: "string".to_string(),
            required: true,
            description: description.to_string(),
        });
        self
    }

    /// Add an optional string parameter.
    pub fn optional_param(mut self, name: &str, description: &str) -> Self {
        self.params.push(ParamField {
            name: name.to_string(),
            kind: "string".to_string(),
            required: false,
            description: description.to_string(),
        });
        self
    }

    /// Derive the OpenAI-style function definition handed to the action model.
    pub fn to_tool_def(&self) -> ToolDef {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for p in &self.params {
            properties.insert(
                p.name.clone(),
                serde_json::json!({
                    "type": p.kind,
                    "description": p.description,
                }),
            );
            if p.required {
                required.push(serde_json::Value::String(p.name.clone()));
            }
        }

        ToolDef {
            def_type: "function".to_string(),
            function: FunctionDef {
                name: self.name.clone(),
                description: self.description.clone(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                }),
            },
        }
    }
}
