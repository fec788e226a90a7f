use std::sync::Arc;

use base64::Engine as _;

use crate::agent_engine::history::SessionHistory;
use crate::agent_engine::loop_control::{LoopConfig, LoopController};
use crate::agent_engine::state::{AgentState, StopReason};
use crate::config::AppConfig;
use crate::errors::SandpilotResult;
use crate::executor::dispatcher::Dispatcher;
use crate::llm::registry::ProviderRegistry;
use crate::llm::types::{ChatMessage, LlmResponse, ToolCall};
use crate::logging::{LogStyle, RunLog};
use crate::perception::grounding::GroundingModel;
use crate::sandbox::Sandbox;
use crate::tools::actions::{register_desktop_tools, DesktopControls};
use crate::tools::registry::ToolRegistry;

const SYSTEM_PROMPT: &str = "You are an AI assistant with computer use abilities.";

const PERCEPTION_PROMPT: &str = "\
This image shows the current display of the computer. Please respond in the following format:\n\
The objective is: [put the objective here]\n\
On the screen, I see: [an extensive list of everything that might be relevant to the objective \
including windows, icons, menus, apps, and UI elements]\n\
This means the objective is: [complete|not complete]\n\n\
(Only continue if the objective is not complete.)\n\
The next step is to [click|type|run the shell command] [put the next single step here] \
in order to [put what you expect to happen here].";

const ACTION_LEAD_IN: &str = "\
I will now use tool calls to take these actions, or use the stop command if the objective is complete.";

/// Drives one objective through the perception-action loop.
///
/// Owns the conversation history, the screenshot store (via the desktop
/// controls) and the tool registry; all state belongs to a single agent
/// instance and a single loop.
pub struct SandboxAgent {
    llm: Arc<ProviderRegistry>,
    dispatcher: Dispatcher,
    controls: Arc<DesktopControls>,
    messages: Vec<ChatMessage>,
    history: SessionHistory,
    log: Arc<RunLog>,
    state: AgentState,
    loop_config: LoopConfig,
    keepalive_secs: u64,
    bootstrap_browser: bool,
}

impl SandboxAgent {
    pub fn new(
        sandbox: Arc<dyn Sandbox>,
        grounding: Arc<dyn GroundingModel>,
        llm: Arc<ProviderRegistry>,
        config: &AppConfig,
        loop_config: LoopConfig,
    ) -> SandpilotResult<Self> {
        let log = if config.output.save_log {
            let dir = match &config.output.dir {
                Some(dir) => dir.clone(),
                None => std::env::current_dir()?,
            };
            Arc::new(RunLog::new(&dir)?)
        } else {
            Arc::new(RunLog::disabled())
        };

        let controls = Arc::new(DesktopControls::new(
            sandbox,
            grounding,
            log.clone(),
            std::time::Duration::from_secs(config.sandbox.command_timeout_secs),
        )?);

        let mut registry = ToolRegistry::new();
        register_desktop_tools(&mut registry, controls.clone());

        Ok(Self {
            llm,
            dispatcher: Dispatcher::new(Arc::new(registry)),
            controls,
            messages: Vec::new(),
            history: SessionHistory::new(),
            log,
            state: AgentState::Running,
            loop_config,
            keepalive_secs: config.sandbox.keepalive_secs,
            bootstrap_browser: config.sandbox.bootstrap_browser,
        })
    }

    /// The registry backing this agent's dispatcher (shared with the
    /// orchestrator in planned mode).
    pub fn tool_registry(&self) -> Arc<ToolRegistry> {
        self.dispatcher.registry().clone()
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    /// Conversation history of the current run.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Run the perception-action loop until a stop signal or a loop bound.
    pub async fn run(&mut self, objective: &str) -> SandpilotResult<StopReason> {
        if self.bootstrap_browser {
            self.controls.bootstrap_browser().await;
        }

        self.log.line(&format!("USER: {objective}"), LogStyle::Plain);
        self.push_user(format!("OBJECTIVE: {objective}"));
        self.state = AgentState::Running;

        let mut ctrl = LoopController::new(self.loop_config.clone());

        while self.state == AgentState::Running {
            if ctrl.should_stop() {
                tracing::info!(iterations = ctrl.iterations(), "loop bound reached");
                self.state = AgentState::Stopped {
                    reason: StopReason::IterationLimit,
                };
                break;
            }
            ctrl.begin_iteration();

            // Keep the sandbox session alive for the next stretch of work.
            if let Err(e) = self
                .controls
                .sandbox()
                .extend_session_timeout(self.keepalive_secs)
                .await
            {
                tracing::warn!(error = %e, "session keep-alive failed");
            }

            let assessment = self.perceive().await?;
            let thought = self
                .log
                .line(&format!("THOUGHT: {assessment}"), LogStyle::Green);
            self.push_user(thought);

            let response = self.select_actions().await?;

            if !response.content.is_empty() {
                let narration = self
                    .log
                    .line(&format!("THOUGHT: {}", response.content), LogStyle::Blue);
                self.push_user(narration);
            }

            if response.tool_calls.is_empty() {
                // No proposal at all is implicit completion.
                tracing::info!("no tool calls proposed, treating as completion");
                self.state = AgentState::Stopped {
                    reason: StopReason::NoActionsProposed,
                };
                break;
            }

            for call in &response.tool_calls {
                if call.function.name == "stop" {
                    // Termination takes priority over the rest of the batch.
                    self.state = AgentState::Stopped {
                        reason: StopReason::StopRequested,
                    };
                    break;
                }

                self.log.line(
                    &format!("ACTION: {} {}", call.function.name, call.function.arguments),
                    LogStyle::Red,
                );
                self.push_call_record(call);

                let observation = self.dispatcher.dispatch(call).await;
                if observation.is_error {
                    ctrl.record_failure();
                }
                let line = self
                    .log
                    .line(&format!("OBSERVATION: {observation}"), LogStyle::Yellow);
                self.push_user(line);
            }
        }

        match &self.state {
            AgentState::Stopped { reason } => {
                tracing::info!(
                    session = %self.history.session_id,
                    iterations = ctrl.iterations(),
                    ?reason,
                    "agent loop ended"
                );
                Ok(*reason)
            }
            AgentState::Running => unreachable!("loop exited while running"),
        }
    }

    /// Capture a fresh frame and ask the vision role for a structured
    /// assessment of the screen against the objective.
    async fn perceive(&self) -> SandpilotResult<String> {
        let frame = self.controls.take_screenshot().await?;
        let image_b64 = base64::engine::general_purpose::STANDARD.encode(&frame);

        let mut call_messages = self.messages.clone();
        call_messages.push(ChatMessage::user_with_image(image_b64, PERCEPTION_PROMPT));

        let (provider, cfg) = self.llm.call_config_for_role("vision")?;
        let response = provider.chat(call_messages, Vec::new(), &cfg).await?;
        Ok(response.content)
    }

    /// Ask the action role for the next batch of tool calls.
    async fn select_actions(&self) -> SandpilotResult<LlmResponse> {
        let mut call_messages = vec![ChatMessage::system(SYSTEM_PROMPT)];
        call_messages.extend(self.messages.iter().cloned());
        call_messages.push(ChatMessage::user(ACTION_LEAD_IN));

        let (provider, cfg) = self.llm.call_config_for_role("action")?;
        provider
            .chat(call_messages, self.dispatcher.registry().tool_defs(), &cfg)
            .await
    }

    fn push_user(&mut self, text: String) {
        self.history.record("user", Some(text.clone()), None);
        self.messages.push(ChatMessage::user(text));
    }

    /// Archive a tool call into history in the same shape the model emits.
    fn push_call_record(&mut self, call: &ToolCall) {
        let parameters: serde_json::Value = serde_json::from_str(&call.function.arguments)
            .unwrap_or_else(|_| serde_json::Value::String(call.function.arguments.clone()));
        let record = serde_json::json!({
            "name": call.function.name,
            "parameters": parameters,
        });
        self.history.record("assistant", None, Some(record.clone()));
        self.messages.push(ChatMessage::user(record.to_string()));
    }
}
