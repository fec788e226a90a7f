use std::sync::Arc;
use std::time::Duration;

use crate::errors::SandpilotResult;
use crate::executor::dispatcher::{Dispatcher, Observation};
use crate::llm::registry::ProviderRegistry;
use crate::llm::types::ChatMessage;
use crate::logging::{LogStyle, RunLog};
use crate::orchestrator::analysis::{analyze, ToolAnalysis};
use crate::orchestrator::plan::{parse_plan, Plan, Step, StepResult};
use crate::tools::registry::ToolRegistry;

/// Pluggable predicate over a finished step. Not installed by default:
/// without one, step success is simply the dispatch outcome.
pub trait SuccessCriteria: Send + Sync {
    fn evaluate(&self, step: &Step, observation: &Observation) -> bool;
}

const PLANNING_RULES: &str = "\
Tool Dependencies and Requirements:
1. Browser Interaction Chain:
   - Opening browser must happen before navigation
   - Navigation must happen before page interaction
   - Element interaction requires proper element state

2. Input/Output Chain:
   - Reading content requires page to be loaded
   - Text input requires element focus
   - Clicking requires element to be visible

Your Planning Process:
1. Analyze the user's high-level goal
2. Break down what information or actions are needed
3. For each step:
   - Match required action with tool capabilities
   - Verify all tool requirements are met
   - Plan for potential failures
4. Sequence steps based on tool dependencies

Respond with a JSON structure containing:
- steps: list of steps, each with:
    - description: what needs to be done
    - tool: name of the tool to use
    - parameters: required parameters for the tool
    - requirements: list of conditions that must be true
    - success_criteria: specific conditions that indicate success
    - fallback: what to do if the step fails";

/// Plans multi-step tasks over the declared tool catalog and executes them
/// with the same dispatch semantics as the control loop.
///
/// Tool analyses are derived once at construction and cached for the
/// lifetime of the instance.
pub struct Orchestrator {
    dispatcher: Dispatcher,
    llm: Arc<ProviderRegistry>,
    analyses: Vec<ToolAnalysis>,
    step_delay: Duration,
    criteria: Option<Arc<dyn SuccessCriteria>>,
    log: Arc<RunLog>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ToolRegistry>,
        llm: Arc<ProviderRegistry>,
        step_delay: Duration,
    ) -> Self {
        let analyses = registry.descriptors().map(analyze).collect();
        Self {
            dispatcher: Dispatcher::new(registry),
            llm,
            analyses,
            step_delay,
            criteria: None,
            log: Arc::new(RunLog::disabled()),
        }
    }

    pub fn with_run_log(mut self, log: Arc<RunLog>) -> Self {
        self.log = log;
        self
    }

    pub fn with_success_criteria(mut self, criteria: Arc<dyn SuccessCriteria>) -> Self {
        self.criteria = Some(criteria);
        self
    }

    /// Cached analysis for one tool, if it is registered.
    pub fn analysis(&self, name: &str) -> Option<&ToolAnalysis> {
        self.analyses.iter().find(|a| a.name == name)
    }

    /// The aggregated tool-knowledge section embedded into the planning
    /// prompt.
    pub fn tool_knowledge_prompt(&self) -> String {
        let mut sections = vec!["Available Tools and Their Capabilities:".to_string()];

        for analysis in &self.analyses {
            let mut lines = vec![format!("{}:", analysis.name)];
            lines.push(format!("Description: {}", analysis.description));

            if !analysis.capabilities.is_empty() {
                let caps: Vec<_> = analysis.capabilities.iter().map(|c| c.tag()).collect();
                lines.push(format!("Capabilities: {}", caps.join(", ")));
            }
            if !analysis.requirements.is_empty() {
                let reqs: Vec<_> = analysis.requirements.iter().map(|r| r.tag()).collect();
                lines.push(format!("Requirements: {}", reqs.join(", ")));
            }
            if !analysis.parameters.is_empty() {
                let params: Vec<_> = analysis
                    .parameters
                    .iter()
                    .map(|(name, p)| {
                        format!(
                            "- {}: {} ({})",
                            name,
                            p.description,
                            if p.required { "required" } else { "optional" }
                        )
                    })
                    .collect();
                lines.push(format!("Parameters:\n{}", params.join("\n")));
            }

            sections.push(lines.join("\n"));
        }

        sections.join("\n\n")
    }

    fn planning_prompt(&self) -> String {
        format!(
            "You are an orchestrator agent that understands high-level user requests \
             and breaks them down into actionable steps using available tools.\n\n\
             {}\n\n{}",
            self.tool_knowledge_prompt(),
            PLANNING_RULES
        )
    }

    /// Ask the planner role for a structured plan for `task`.
    pub async fn plan(&self, task: &str) -> SandpilotResult<Plan> {
        let messages = vec![
            ChatMessage::system(self.planning_prompt()),
            ChatMessage::user(task),
        ];

        let (provider, cfg) = self.llm.call_config_for_role("planner")?;
        let response = provider.chat(messages, Vec::new(), &cfg).await?;

        let plan = parse_plan(&response.content)?;
        tracing::info!(task, steps = plan.steps.len(), "plan created");
        Ok(plan)
    }

    /// Execute the plan's steps in order, one result per step.
    ///
    /// Individual failures (including unresolvable tool names) are recorded
    /// and execution continues with the remaining steps.
    pub async fn execute(&self, plan: &Plan) -> Vec<StepResult> {
        let mut results = Vec::with_capacity(plan.steps.len());

        for step in &plan.steps {
            // Let UI state settle before the next action lands.
            tokio::time::sleep(self.step_delay).await;

            self.log.line(
                &format!("STEP: {} ({})", step.description, step.tool),
                LogStyle::Red,
            );
            let observation = self
                .dispatcher
                .dispatch_parts(&step.tool, &step.parameters)
                .await;

            let success = match (&self.criteria, &step.success_criteria) {
                (Some(criteria), Some(_)) => criteria.evaluate(step, &observation),
                _ => !observation.is_error,
            };

            let result = if success {
                StepResult::succeeded(step, observation.text)
            } else {
                StepResult::failed(step, observation.text)
            };
            self.log.line(
                &format!(
                    "RESULT: {} {}",
                    if result.success { "ok" } else { "failed" },
                    result
                        .result
                        .as_deref()
                        .or(result.error.as_deref())
                        .unwrap_or("")
                ),
                LogStyle::Yellow,
            );
            results.push(result);
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SandpilotResult;
    use crate::llm::testing::{registry_with_roles, ScriptedProvider};
    use crate::tools::descriptor::ToolDescriptor;
    use crate::tools::{ToolArgs, ToolHandler};
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn invoke(&self, args: &ToolArgs) -> SandpilotResult<String> {
            Ok(format!(
                "echo: {}",
                args.get("text").and_then(|v| v.as_str()).unwrap_or("")
            ))
        }
    }

    fn tool_registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(
            ToolDescriptor::new("echo", "Type the given text as input.").param("text", "Text"),
            Arc::new(Echo),
        );
        registry.register(
            ToolDescriptor::new("open_browser", "Open the Chrome browser."),
            Arc::new(Echo),
        );
        Arc::new(registry)
    }

    fn llm_with_planner(reply: &str) -> Arc<ProviderRegistry> {
        let planner = Arc::new(ScriptedProvider::text_only("planner", reply));
        Arc::new(registry_with_roles(vec![("planner", planner)]))
    }

    fn step(description: &str, tool: &str) -> Step {
        Step {
            description: description.to_string(),
            tool: tool.to_string(),
            parameters: serde_json::json!({"text": "hi"})
                .as_object()
                .cloned()
                .unwrap(),
            requirements: Vec::new(),
            success_criteria: None,
            fallback: None,
        }
    }

    #[tokio::test]
    async fn execution_survives_an_unresolvable_step() {
        let orchestrator = Orchestrator::new(
            tool_registry(),
            llm_with_planner(""),
            Duration::ZERO,
        );

        let plan = Plan {
            steps: vec![
                step("first echo", "echo"),
                step("missing tool", "unregistered"),
                step("second echo", "echo"),
            ],
        };

        let results = orchestrator.execute(&plan).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert_eq!(results[1].error.as_deref(), Some("Tool not implemented."));
        assert!(results[2].success);
        assert_eq!(results[2].result.as_deref(), Some("echo: hi"));
    }

    #[tokio::test]
    async fn plan_round_trip_through_the_planner_role() {
        let reply = r#"Sure, here is the plan:
```json
{"steps": [{"description": "Say hi", "tool": "echo", "parameters": {"text": "hi"}}]}
```"#;
        let orchestrator =
            Orchestrator::new(tool_registry(), llm_with_planner(reply), Duration::ZERO);

        let plan = orchestrator.plan("greet").await.unwrap();
        assert_eq!(plan.steps.len(), 1);

        let results = orchestrator.execute(&plan).await;
        assert!(results[0].success);
    }

    #[tokio::test]
    async fn unparseable_plan_is_an_error() {
        let orchestrator = Orchestrator::new(
            tool_registry(),
            llm_with_planner("I would simply do it manually."),
            Duration::ZERO,
        );
        assert!(orchestrator.plan("greet").await.is_err());
    }

    #[test]
    fn knowledge_prompt_lists_capabilities_and_parameters() {
        let orchestrator =
            Orchestrator::new(tool_registry(), llm_with_planner(""), Duration::ZERO);

        let prompt = orchestrator.tool_knowledge_prompt();
        assert!(prompt.contains("echo:"));
        assert!(prompt.contains("text_input"));
        assert!(prompt.contains("open_browser:"));
        assert!(prompt.contains("browser_interaction"));
        assert!(prompt.contains("Requirements: browser_must_be_open"));
        assert!(prompt.contains("- text: Text (required)"));
    }

    #[test]
    fn analyses_are_cached_per_tool() {
        let orchestrator =
            Orchestrator::new(tool_registry(), llm_with_planner(""), Duration::ZERO);

        let analysis = orchestrator.analysis("open_browser").unwrap();
        assert!(analysis
            .capabilities
            .contains(&crate::orchestrator::analysis::Capability::BrowserInteraction));
        assert!(orchestrator.analysis("unknown").is_none());
    }

    struct RejectAll;

    impl SuccessCriteria for RejectAll {
        fn evaluate(&self, _step: &Step, _observation: &Observation) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn success_criteria_hook_overrides_dispatch_outcome() {
        let orchestrator =
            Orchestrator::new(tool_registry(), llm_with_planner(""), Duration::ZERO)
                .with_success_criteria(Arc::new(RejectAll));

        let mut checked = step("checked step", "echo");
        checked.success_criteria = Some("output mentions hi".to_string());
        let unchecked = step("unchecked step", "echo");

        let results = orchestrator
            .execute(&Plan {
                steps: vec![checked, unchecked],
            })
            .await;

        // The predicate only applies to steps that declare criteria.
        assert!(!results[0].success);
        assert!(results[1].success);
    }
}
