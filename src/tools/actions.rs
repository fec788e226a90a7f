use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::errors::SandpilotResult;
use crate::logging::{LogStyle, RunLog};
use crate::perception::annotator;
use crate::perception::grounding::GroundingModel;
use crate::perception::screenshot::ScreenshotStore;
use crate::sandbox::Sandbox;
use crate::tools::descriptor::ToolDescriptor;
use crate::tools::registry::ToolRegistry;
use crate::tools::{required_str, ToolArgs, ToolHandler};

/// Keys are sent to the sandbox in groups of this size so long passages
/// don't overrun the sandbox input buffer.
const TYPING_GROUP_SIZE: usize = 50;

const APP_LAUNCH_TIMEOUT: Duration = Duration::from_secs(2);
const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(120);

const CHROME_HEADLESS: &str =
    "google-chrome --headless --disable-gpu --remote-debugging-port=9222 --no-sandbox";

/// Pointer action variants sharing the grounding pipeline.
#[derive(Debug, Clone, Copy)]
enum ClickKind {
    Single,
    Double,
    Right,
}

impl ClickKind {
    fn label(self) -> &'static str {
        match self {
            ClickKind::Single => "click",
            ClickKind::Double => "double click",
            ClickKind::Right => "right click",
        }
    }
}

/// Shared context behind every built-in sandbox tool: the sandbox
/// collaborator, the grounding resolver, the per-run screenshot store and
/// the run log.
pub struct DesktopControls {
    sandbox: Arc<dyn Sandbox>,
    grounding: Arc<dyn GroundingModel>,
    screenshots: Mutex<ScreenshotStore>,
    log: Arc<RunLog>,
    command_timeout: Duration,
}

impl DesktopControls {
    pub fn new(
        sandbox: Arc<dyn Sandbox>,
        grounding: Arc<dyn GroundingModel>,
        log: Arc<RunLog>,
        command_timeout: Duration,
    ) -> SandpilotResult<Self> {
        Ok(Self {
            sandbox,
            grounding,
            screenshots: Mutex::new(ScreenshotStore::new()?),
            log,
            command_timeout,
        })
    }

    pub fn sandbox(&self) -> &Arc<dyn Sandbox> {
        &self.sandbox
    }

    /// Capture a frame, persist it as the latest screenshot, return the bytes.
    pub async fn take_screenshot(&self) -> SandpilotResult<Vec<u8>> {
        let bytes = self.sandbox.capture_screenshot().await?;
        let path = self.screenshots.lock().await.record_capture(&bytes)?;
        self.log
            .line(&format!("screenshot {}", path.display()), LogStyle::Gray);
        Ok(bytes)
    }

    /// Best-effort Chrome install inside the sandbox. Failures are logged
    /// and swallowed: a usable environment is an assumption the agent tries
    /// to establish, not a guarantee.
    pub async fn bootstrap_browser(&self) {
        self.log.line("Installing Chrome...", LogStyle::Gray);
        let steps = [
            "wget -q -O - https://dl-ssl.google.com/linux/linux_signing_key.pub | sudo apt-key add -",
            "echo 'deb [arch=amd64] http://dl.google.com/linux/chrome/deb/ stable main' | sudo tee /etc/apt/sources.list.d/google-chrome.list",
            "sudo apt-get update",
            "sudo apt-get install -y google-chrome-stable",
        ];
        for cmd in steps {
            if let Err(e) = self.sandbox.run_command(cmd, BOOTSTRAP_TIMEOUT).await {
                tracing::warn!(error = %e, command = cmd, "browser bootstrap failed, continuing");
                return;
            }
        }
        self.log.line("Chrome installed successfully", LogStyle::Gray);
    }

    async fn run_command(&self, command: &str) -> SandpilotResult<String> {
        let output = self
            .sandbox
            .run_command(command, self.command_timeout)
            .await?;
        Ok(output.narrate())
    }

    async fn run_background_command(&self, command: &str) -> SandpilotResult<String> {
        self.sandbox.run_background(command).await?;
        Ok("The command has been started.".to_string())
    }

    async fn send_key(&self, name: &str) -> SandpilotResult<String> {
        let keys: Vec<String> = if name.contains('+') {
            // Combinations like Ctrl+C
            name.split('+').map(|k| k.trim().to_string()).collect()
        } else {
            vec![name.to_string()]
        };
        self.sandbox.send_hotkey(&keys).await?;
        Ok("The key has been pressed.".to_string())
    }

    async fn type_text(&self, text: &str) -> SandpilotResult<String> {
        let chars: Vec<char> = text.chars().collect();
        for group in chars.chunks(TYPING_GROUP_SIZE) {
            let chunk: String = group.iter().collect();
            self.sandbox.send_text(&chunk).await?;
        }
        Ok("The text has been typed.".to_string())
    }

    /// Shared pipeline for all pointer actions: capture, ground, annotate,
    /// move, click.
    async fn click_element(&self, query: &str, kind: ClickKind) -> SandpilotResult<String> {
        let frame = self.take_screenshot().await?;
        let position = self.grounding.locate(query, &frame).await?;

        let marked = annotator::draw_marker(&frame, position)?;
        let path = self.screenshots.lock().await.save_image(&marked, "location")?;
        self.log.line(
            &format!("{} {}", kind.label(), path.display()),
            LogStyle::Gray,
        );

        self.sandbox.move_pointer(position.x, position.y).await?;
        match kind {
            ClickKind::Single => self.sandbox.primary_click().await?,
            ClickKind::Double => self.sandbox.double_click().await?,
            ClickKind::Right => self.sandbox.secondary_click().await?,
        }
        Ok(format!("The mouse has {}ed.", kind.label()))
    }

    async fn open_app(&self, app_name: &str) -> SandpilotResult<String> {
        // Convert common app names to their Linux executable names.
        let actual_app = match app_name.to_lowercase().as_str() {
            "google chrome" | "chrome" => "google-chrome".to_string(),
            "firefox" => "firefox".to_string(),
            "terminal" => "x-terminal-emulator".to_string(),
            "nautilus" => "nautilus".to_string(),
            other => other.to_string(),
        };

        if actual_app == "google-chrome" {
            // Chrome runs headless with remote debugging so navigation can
            // reuse the same instance.
            return match self
                .sandbox
                .run_background(&format!("{CHROME_HEADLESS} about:blank"))
                .await
            {
                Ok(()) => Ok(format!("{app_name} has been opened in headless mode.")),
                Err(e) => Ok(format!("Could not open {app_name}. Error: {e}")),
            };
        }

        match self.sandbox.run_command(&actual_app, APP_LAUNCH_TIMEOUT).await {
            Ok(_) => Ok(format!("{app_name} has been opened.")),
            Err(e) => Ok(format!("Could not open {app_name}. Error: {e}")),
        }
    }

    async fn navigate_to_url(&self, url: &str) -> SandpilotResult<String> {
        let url = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("https://{url}")
        };

        // Kill any existing Chrome instance; a fresh one picks up the URL.
        let _ = self.sandbox.run_command("pkill chrome", APP_LAUNCH_TIMEOUT).await;

        match self
            .sandbox
            .run_background(&format!("{CHROME_HEADLESS} {url}"))
            .await
        {
            Ok(()) => Ok(format!("Navigated to {url}")),
            Err(e) => Ok(format!("Failed to navigate to {url}. Error: {e}")),
        }
    }
}

/// Which built-in action a registered tool maps to.
#[derive(Debug, Clone, Copy)]
enum DesktopAction {
    RunCommand,
    RunBackground,
    SendKey,
    TypeText,
    Click,
    DoubleClick,
    RightClick,
    OpenApp,
    NavigateToUrl,
}

struct DesktopTool {
    controls: Arc<DesktopControls>,
    action: DesktopAction,
}

#[async_trait]
impl ToolHandler for DesktopTool {
    async fn invoke(&self, args: &ToolArgs) -> SandpilotResult<String> {
        let c = &self.controls;
        match self.action {
            DesktopAction::RunCommand => c.run_command(required_str(args, "command")?).await,
            DesktopAction::RunBackground => {
                c.run_background_command(required_str(args, "command")?).await
            }
            DesktopAction::SendKey => c.send_key(required_str(args, "name")?).await,
            DesktopAction::TypeText => c.type_text(required_str(args, "text")?).await,
            DesktopAction::Click => {
                c.click_element(required_str(args, "query")?, ClickKind::Single)
                    .await
            }
            DesktopAction::DoubleClick => {
                c.click_element(required_str(args, "query")?, ClickKind::Double)
                    .await
            }
            DesktopAction::RightClick => {
                c.click_element(required_str(args, "query")?, ClickKind::Right)
                    .await
            }
            DesktopAction::OpenApp => c.open_app(required_str(args, "app_name")?).await,
            DesktopAction::NavigateToUrl => c.navigate_to_url(required_str(args, "url")?).await,
        }
    }
}

/// The `stop` tool carries no behavior of its own: the control loop
/// intercepts it before dispatch. The handler exists so the tool is a
/// complete registry entry like any other.
struct StopTool;

#[async_trait]
impl ToolHandler for StopTool {
    async fn invoke(&self, _args: &ToolArgs) -> SandpilotResult<String> {
        Ok("The task has been marked complete.".to_string())
    }
}

/// Register the built-in sandbox toolset.
pub fn register_desktop_tools(registry: &mut ToolRegistry, controls: Arc<DesktopControls>) {
    registry.register(
        ToolDescriptor::new("stop", "Indicate that the task has been completed."),
        Arc::new(StopTool),
    );

    let mut add = |descriptor: ToolDescriptor, action: DesktopAction| {
        registry.register(
            descriptor,
            Arc::new(DesktopTool {
                controls: controls.clone(),
                action,
            }),
        );
    };

    add(
        ToolDescriptor::new("run_command", "Run a shell command and return the result.")
            .param("command", "Shell command to run synchronously"),
        DesktopAction::RunCommand,
    );
    add(
        ToolDescriptor::new(
            "run_background_command",
            "Run a shell command in the background.",
        )
        .param("command", "Shell command to run asynchronously"),
        DesktopAction::RunBackground,
    );
    add(
        ToolDescriptor::new("send_key", "Send a key or combination of keys to the system.")
            .param("name", "Key or combination (e.g. 'Return', 'Ctrl+C')"),
        DesktopAction::SendKey,
    );
    add(
        ToolDescriptor::new("type_text", "Type a specified text into the system.")
            .param("text", "Text to type"),
        DesktopAction::TypeText,
    );
    add(
        ToolDescriptor::new("click", "Click on a specified UI element.")
            .param("query", "Item or UI element on the screen to click"),
        DesktopAction::Click,
    );
    add(
        ToolDescriptor::new("double_click", "Double click on a specified UI element.")
            .param("query", "Item or UI element on the screen to double click"),
        DesktopAction::DoubleClick,
    );
    add(
        ToolDescriptor::new("right_click", "Right click on a specified UI element.")
            .param("query", "Item or UI element on the screen to right click"),
        DesktopAction::RightClick,
    );
    add(
        ToolDescriptor::new("open_app", "Open an application.").param(
            "app_name",
            "Name of the application to open (e.g., 'Google Chrome', 'Firefox', 'Safari')",
        ),
        DesktopAction::OpenApp,
    );
    add(
        ToolDescriptor::new("navigate_to_url", "Navigate to a URL in Chrome.")
            .param("url", "URL to navigate to (e.g., 'https://google.com')"),
        DesktopAction::NavigateToUrl,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::grounding::testing::FixedGrounding;
    use crate::perception::grounding::Position;
    use crate::sandbox::testing::{RecordingSandbox, SandboxCall};

    fn controls(sandbox: Arc<RecordingSandbox>) -> Arc<DesktopControls> {
        let grounding = Arc::new(FixedGrounding(Position { x: 100, y: 200 }));
        Arc::new(
            DesktopControls::new(
                sandbox,
                grounding,
                Arc::new(RunLog::disabled()),
                Duration::from_secs(5),
            )
            .unwrap(),
        )
    }

    fn registry_with(controls: Arc<DesktopControls>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        register_desktop_tools(&mut registry, controls);
        registry
    }

    async fn invoke(registry: &ToolRegistry, name: &str, args: serde_json::Value) -> String {
        let args = args.as_object().cloned().unwrap_or_default();
        registry
            .lookup(name)
            .unwrap()
            .handler()
            .invoke(&args)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn click_grounds_then_moves_then_clicks_once() {
        let sandbox = Arc::new(RecordingSandbox::new());
        let registry = registry_with(controls(sandbox.clone()));

        let msg = invoke(&registry, "click", serde_json::json!({"query": "the button"})).await;
        assert_eq!(msg, "The mouse has clicked.");

        let effects = sandbox.effects();
        assert_eq!(
            effects,
            vec![
                SandboxCall::MovePointer(100, 200),
                SandboxCall::PrimaryClick,
            ]
        );
        // Exactly one capture feeds the grounding call.
        let captures = sandbox
            .recorded()
            .iter()
            .filter(|c| matches!(c, SandboxCall::CaptureScreenshot))
            .count();
        assert_eq!(captures, 1);
    }

    #[tokio::test]
    async fn click_variants_share_the_pipeline() {
        let sandbox = Arc::new(RecordingSandbox::new());
        let registry = registry_with(controls(sandbox.clone()));

        let msg = invoke(
            &registry,
            "double_click",
            serde_json::json!({"query": "icon"}),
        )
        .await;
        assert_eq!(msg, "The mouse has double clicked.");

        let msg = invoke(
            &registry,
            "right_click",
            serde_json::json!({"query": "icon"}),
        )
        .await;
        assert_eq!(msg, "The mouse has right clicked.");

        let effects = sandbox.effects();
        assert_eq!(
            effects,
            vec![
                SandboxCall::MovePointer(100, 200),
                SandboxCall::DoubleClick,
                SandboxCall::MovePointer(100, 200),
                SandboxCall::SecondaryClick,
            ]
        );
    }

    #[tokio::test]
    async fn run_command_narrates_output() {
        let sandbox = Arc::new(RecordingSandbox::with_stdout("hello\n"));
        let registry = registry_with(controls(sandbox.clone()));

        let msg = invoke(&registry, "run_command", serde_json::json!({"command": "ls"})).await;
        assert_eq!(msg, "hello\n");
        assert_eq!(sandbox.effects(), vec![SandboxCall::RunCommand("ls".into())]);
    }

    #[tokio::test]
    async fn missing_required_parameter_is_an_error() {
        let sandbox = Arc::new(RecordingSandbox::new());
        let registry = registry_with(controls(sandbox.clone()));

        let err = registry
            .lookup("type_text")
            .unwrap()
            .handler()
            .invoke(&ToolArgs::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing required parameter `text`"));
        assert!(sandbox.effects().is_empty());
    }

    #[tokio::test]
    async fn long_text_is_typed_in_groups() {
        let sandbox = Arc::new(RecordingSandbox::new());
        let registry = registry_with(controls(sandbox.clone()));

        let text = "x".repeat(120);
        invoke(&registry, "type_text", serde_json::json!({"text": text})).await;

        let sends: Vec<String> = sandbox
            .effects()
            .into_iter()
            .map(|c| match c {
                SandboxCall::SendText(t) => t,
                other => panic!("unexpected call {other:?}"),
            })
            .collect();
        assert_eq!(sends.len(), 3);
        assert_eq!(sends[0].len(), 50);
        assert_eq!(sends[2].len(), 20);
    }

    #[tokio::test]
    async fn key_combination_is_split() {
        let sandbox = Arc::new(RecordingSandbox::new());
        let registry = registry_with(controls(sandbox.clone()));

        invoke(&registry, "send_key", serde_json::json!({"name": "Ctrl+C"})).await;
        invoke(&registry, "send_key", serde_json::json!({"name": "Return"})).await;

        assert_eq!(
            sandbox.effects(),
            vec![
                SandboxCall::SendHotkey(vec!["Ctrl".into(), "C".into()]),
                SandboxCall::SendHotkey(vec!["Return".into()]),
            ]
        );
    }

    #[tokio::test]
    async fn open_chrome_launches_headless_in_background() {
        let sandbox = Arc::new(RecordingSandbox::new());
        let registry = registry_with(controls(sandbox.clone()));

        let msg = invoke(&registry, "open_app", serde_json::json!({"app_name": "Chrome"})).await;
        assert_eq!(msg, "Chrome has been opened in headless mode.");

        match &sandbox.effects()[0] {
            SandboxCall::RunBackground(cmd) => {
                assert!(cmd.contains("google-chrome --headless"));
                assert!(cmd.ends_with("about:blank"));
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn open_app_failure_is_narrated_not_raised() {
        let sandbox = Arc::new(RecordingSandbox {
            failing_command: Some("gimp".into()),
            ..RecordingSandbox::new()
        });
        let registry = registry_with(controls(sandbox.clone()));

        let msg = invoke(&registry, "open_app", serde_json::json!({"app_name": "gimp"})).await;
        assert!(msg.starts_with("Could not open gimp."));
    }

    #[tokio::test]
    async fn navigate_prepends_scheme_and_restarts_chrome() {
        let sandbox = Arc::new(RecordingSandbox::new());
        let registry = registry_with(controls(sandbox.clone()));

        let msg = invoke(
            &registry,
            "navigate_to_url",
            serde_json::json!({"url": "example.com"}),
        )
        .await;
        assert_eq!(msg, "Navigated to https://example.com");

        let effects = sandbox.effects();
        assert_eq!(effects[0], SandboxCall::RunCommand("pkill chrome".into()));
        match &effects[1] {
            SandboxCall::RunBackground(cmd) => assert!(cmd.ends_with("https://example.com")),
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn bootstrap_failure_is_swallowed() {
        let sandbox = Arc::new(RecordingSandbox {
            failing_command: Some("sudo apt-get update".into()),
            ..RecordingSandbox::new()
        });
        let c = controls(sandbox.clone());
        c.bootstrap_browser().await;

        // Stops at the failing step without surfacing an error.
        let commands = sandbox.effects().len();
        assert_eq!(commands, 3);
    }
}
