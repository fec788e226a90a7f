use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;

use crate::errors::{SandpilotError, SandpilotResult};
use crate::llm::registry::ProviderRegistry;
use crate::llm::types::ChatMessage;

/// A pixel coordinate pair, valid only with respect to the screenshot it
/// was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

/// Resolves a natural-language UI target description to pixel coordinates
/// on a screenshot. Stateless between calls: each invocation depends only
/// on its two inputs.
#[async_trait]
pub trait GroundingModel: Send + Sync {
    async fn locate(&self, description: &str, screenshot_png: &[u8]) -> SandpilotResult<Position>;
}

const GROUNDING_PROMPT: &str = "\
Locate the following element on the screenshot and reply with its pixel \
coordinates only, formatted as (x, y):";

/// Grounding over the provider registry's `grounding` role: sends the frame
/// plus the target description and parses coordinates out of the reply.
pub struct LlmGrounding {
    registry: Arc<ProviderRegistry>,
}

impl LlmGrounding {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl GroundingModel for LlmGrounding {
    async fn locate(&self, description: &str, screenshot_png: &[u8]) -> SandpilotResult<Position> {
        let (provider, cfg) = self.registry.call_config_for_role("grounding")?;

        let image_b64 = base64::engine::general_purpose::STANDARD.encode(screenshot_png);
        let messages = vec![ChatMessage::user_with_image(
            image_b64,
            format!("{GROUNDING_PROMPT} {description}"),
        )];

        let response = provider.chat(messages, Vec::new(), &cfg).await?;
        let position = parse_coordinates(&response.content).ok_or_else(|| {
            SandpilotError::Grounding(format!(
                "no coordinates in grounding reply: {:?}",
                response.content
            ))
        })?;

        tracing::debug!(
            target = description,
            x = position.x,
            y = position.y,
            "grounding resolved"
        );
        Ok(position)
    }
}

/// Extract the first "(x, y)" (parentheses optional) coordinate pair.
pub fn parse_coordinates(text: &str) -> Option<Position> {
    let re = regex::Regex::new(r"\(?\s*(\d{1,5})\s*,\s*(\d{1,5})\s*\)?").expect("valid regex");
    let caps = re.captures(text)?;
    let x = caps[1].parse().ok()?;
    let y = caps[2].parse().ok()?;
    Some(Position { x, y })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_pair() {
        assert_eq!(
            parse_coordinates("(100, 200)"),
            Some(Position { x: 100, y: 200 })
        );
    }

    #[test]
    fn parses_pair_inside_prose() {
        assert_eq!(
            parse_coordinates("The element is located at (640,402) on the screen."),
            Some(Position { x: 640, y: 402 })
        );
        assert_eq!(
            parse_coordinates("x, y: 12, 34"),
            Some(Position { x: 12, y: 34 })
        );
    }

    #[test]
    fn rejects_text_without_coordinates() {
        assert_eq!(parse_coordinates("I cannot find that element."), None);
    }
}
