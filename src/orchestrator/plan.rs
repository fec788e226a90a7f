use serde::{Deserialize, Serialize};

use crate::errors::{SandpilotError, SandpilotResult};
use crate::tools::ToolArgs;

/// Ordered action sequence produced by the planner, consumed sequentially
/// and never mutated during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub description: String,
    pub tool: String,
    #[serde(default)]
    pub parameters: ToolArgs,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub success_criteria: Option<String>,
    #[serde(default)]
    pub fallback: Option<String>,
}

/// Outcome of executing one plan step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    pub fn succeeded(step: &Step, result: String) -> Self {
        Self {
            step: step.description.clone(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(step: &Step, error: String) -> Self {
        Self {
            step: step.description.clone(),
            success: false,
            result: None,
            error: Some(error),
        }
    }
}

/// Parse the planner's reply into a `Plan`.
///
/// Tries the whole reply as JSON first, then a fenced ```json block, then
/// the first top-level object in the text. Models wrap their JSON more
/// often than not.
pub fn parse_plan(text: &str) -> SandpilotResult<Plan> {
    if let Ok(plan) = serde_json::from_str::<Plan>(text.trim()) {
        return Ok(plan);
    }

    let fenced = regex::Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid regex");
    if let Some(caps) = fenced.captures(text) {
        if let Ok(plan) = serde_json::from_str::<Plan>(&caps[1]) {
            return Ok(plan);
        }
    }

    if let Some(start) = text.find('{') {
        if let Some(end) = text.rfind('}') {
            if start < end {
                if let Ok(plan) = serde_json::from_str::<Plan>(&text[start..=end]) {
                    return Ok(plan);
                }
            }
        }
    }

    Err(SandpilotError::Planner(format!(
        "planner reply is not a plan: {:?}",
        text.chars().take(200).collect::<String>()
    )))
}
