/// Lifecycle states of a sandbox agent run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AgentState {
    Running,
    Stopped { reason: StopReason },
}

/// Why a run left the `Running` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The action model emitted an explicit `stop` call.
    StopRequested,
    /// The action model proposed no further calls — implicit completion.
    NoActionsProposed,
    /// The loop controller's iteration or failure bound was reached.
    IterationLimit,
}
