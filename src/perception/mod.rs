pub mod annotator;
pub mod grounding;
pub mod screenshot;

pub use grounding::{GroundingModel, LlmGrounding, Position};
pub use screenshot::ScreenshotStore;
