pub mod analysis;
pub mod engine;
pub mod plan;

pub use analysis::{analyze, Capability, Requirement, ToolAnalysis};
pub use engine::{Orchestrator, SuccessCriteria};
pub use plan::{Plan, Step, StepResult};
