use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::tools::descriptor::{ParamField, ToolDescriptor};

/// What a tool can do, inferred from its description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    BrowserInteraction,
    MouseInteraction,
    TextInput,
    ContentExtraction,
    ShellExecution,
}

impl Capability {
    pub fn tag(self) -> &'static str {
        match self {
            Capability::BrowserInteraction => "browser_interaction",
            Capability::MouseInteraction => "mouse_interaction",
            Capability::TextInput => "text_input",
            Capability::ContentExtraction => "content_extraction",
            Capability::ShellExecution => "shell_execution",
        }
    }
}

/// Precondition a capability implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    BrowserMustBeOpen,
    TargetElementMustBeFocused,
}

impl Requirement {
    pub fn tag(self) -> &'static str {
        match self {
            Requirement::BrowserMustBeOpen => "browser_must_be_open",
            Requirement::TargetElementMustBeFocused => "target_element_must_be_focused",
        }
    }
}

/// The keyword-to-capability vocabulary, kept as data so the inference
/// stays centralized and testable.
const CAPABILITY_KEYWORDS: &[(&str, Capability)] = &[
    ("browser", Capability::BrowserInteraction),
    ("chrome", Capability::BrowserInteraction),
    ("click", Capability::MouseInteraction),
    ("type", Capability::TextInput),
    ("input", Capability::TextInput),
    ("read", Capability::ContentExtraction),
    ("get", Capability::ContentExtraction),
    ("shell", Capability::ShellExecution),
    ("command", Capability::ShellExecution),
];

const IMPLIED_REQUIREMENTS: &[(Capability, Requirement)] = &[
    (Capability::BrowserInteraction, Requirement::BrowserMustBeOpen),
    (Capability::TextInput, Requirement::TargetElementMustBeFocused),
];

/// Schema summary carried alongside the inferred tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSummary {
    pub kind: String,
    pub required: bool,
    pub description: String,
}

impl From<&ParamField> for ParamSummary {
    fn from(p: &ParamField) -> Self {
        Self {
            kind: p.kind.clone(),
            required: p.required,
            description: p.description.clone(),
        }
    }
}

/// Derived capability/requirement metadata for one registered tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolAnalysis {
    pub name: String,
    pub description: String,
    pub capabilities: BTreeSet<Capability>,
    pub requirements: BTreeSet<Requirement>,
    pub parameters: BTreeMap<String, ParamSummary>,
}

/// Pure function over a descriptor: keyword matching against the fixed
/// vocabulary, then the implied requirements. Deterministic and
/// order-independent (set semantics throughout).
pub fn analyze(descriptor: &ToolDescriptor) -> ToolAnalysis {
    let desc_lower = descriptor.description.to_lowercase();

    let capabilities: BTreeSet<Capability> = CAPABILITY_KEYWORDS
        .iter()
        .filter(|(keyword, _)| desc_lower.contains(keyword))
        .map(|&(_, cap)| cap)
        .collect();

    let requirements: BTreeSet<Requirement> = IMPLIED_REQUIREMENTS
        .iter()
        .filter(|(cap, _)| capabilities.contains(cap))
        .map(|&(_, req)| req)
        .collect();

    let parameters = descriptor
        .params
        .iter()
        .map(|p| (p.name.clone(), ParamSummary::from(p)))
        .collect();

    ToolAnalysis {
        name: descriptor.name.clone(),
        description: descriptor.description.clone(),
        capabilities,
        requirements,
        parameters,
    }
}
