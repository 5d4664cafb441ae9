//! Multi-turn exchange accumulation for oracle conversations.
//!
//! The engine keeps one [`Exchange`] per conversation (one for planning, one
//! for iterating) so earlier turns stay visible to the model. Screenshots
//! are base64-inlined into the same user turn as the prompt text, keeping
//! the model's spatial reasoning anchored to the image it is asked about.

use base64::Engine as _;
use std::path::Path;
use std::sync::Arc;

use crate::config;
use crate::protocol::first_json_object;

use super::transport::{
    ContentBlock, ImageSource, OracleError, OracleRequest, OracleResult, OracleTransport, Turn,
};

/// Cap on inlined images per exchange, to bound payload size.
pub const MAX_IMAGES_PER_EXCHANGE: usize = 20;

/// Placeholder left behind when an old screenshot is pruned from the
/// exchange to respect [`MAX_IMAGES_PER_EXCHANGE`].
const ELIDED_IMAGE_MARKER: &str = "[earlier screenshot elided]";

/// Build the content blocks for a single user turn: prompt text first, then
/// each image base64-inlined in order.
///
/// This is the stateless one-shot variant of [`Exchange::add_turn`] for
/// callers composing a message without a persistent accumulator.
pub fn build_content(prompt: Option<&str>, images: Option<&[&Path]>) -> OracleResult<Vec<ContentBlock>> {
    let mut content = Vec::new();

    if let Some(prompt) = prompt {
        if !prompt.is_empty() {
            content.push(ContentBlock::Text { text: prompt.to_string() });
        }
    }

    if let Some(images) = images {
        for path in images {
            let bytes = std::fs::read(path)?;
            let data = base64::engine::general_purpose::STANDARD.encode(&bytes);
            content.push(ContentBlock::Image {
                source: ImageSource::base64_png(data),
            });
        }
    }

    Ok(content)
}

/// A stateful accumulator of a multi-turn oracle conversation.
pub struct Exchange {
    transport: Arc<dyn OracleTransport>,
    model: String,
    max_tokens: u32,
    system: Option<String>,
    turns: Vec<Turn>,
}

impl Exchange {
    /// New exchange over `transport`, with model parameters from the global
    /// configuration.
    pub fn new(transport: Arc<dyn OracleTransport>) -> Self {
        let oracle = &config::get().oracle;
        Self::with_model(transport, &oracle.model, oracle.max_tokens)
    }

    /// New exchange with explicit model parameters.
    pub fn with_model(
        transport: Arc<dyn OracleTransport>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            transport,
            model: model.into(),
            max_tokens,
            system: None,
            turns: Vec::new(),
        }
    }

    /// Number of accumulated turns (user and assistant).
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Append a user turn built from `prompt` and/or `images`, and/or set
    /// the system prompt. A call contributing no content is a no-op.
    ///
    /// Older screenshots are pruned once the exchange exceeds
    /// [`MAX_IMAGES_PER_EXCHANGE`] inlined images; the most recent ones are
    /// the ones the model needs.
    pub fn add_turn(
        &mut self,
        prompt: Option<&str>,
        images: Option<&[&Path]>,
        system: Option<&str>,
    ) -> OracleResult<()> {
        if let Some(system) = system {
            if !system.is_empty() {
                self.system = Some(system.to_string());
            }
        }

        let content = build_content(prompt, images)?;
        if !content.is_empty() {
            self.turns.push(Turn {
                role: "user".to_string(),
                content,
            });
            self.prune_images();
        }
        Ok(())
    }

    /// Send the accumulated exchange and return the raw response text. The
    /// response is appended as an assistant turn so the conversation can
    /// continue.
    pub async fn complete(&mut self) -> OracleResult<String> {
        let request = self.request();
        let response = self.transport.invoke(&request).await?;
        self.turns.push(Turn {
            role: "assistant".to_string(),
            content: vec![ContentBlock::Text { text: response.clone() }],
        });
        Ok(response)
    }

    /// Send the accumulated exchange and parse the first top-level JSON
    /// object embedded in the response.
    pub async fn complete_structured(&mut self) -> OracleResult<serde_json::Value> {
        let response = self.complete().await?;
        let Some(object) = first_json_object(&response) else {
            return Err(OracleError::Parse("response contains no JSON object".to_string()));
        };
        serde_json::from_str(object).map_err(|e| OracleError::Parse(e.to_string()))
    }

    fn request(&self) -> OracleRequest {
        OracleRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: self.system.clone(),
            messages: self.turns.clone(),
        }
    }

    fn image_count(&self) -> usize {
        self.turns
            .iter()
            .flat_map(|t| t.content.iter())
            .filter(|c| matches!(c, ContentBlock::Image { .. }))
            .count()
    }

    fn prune_images(&mut self) {
        let mut excess = self.image_count().saturating_sub(MAX_IMAGES_PER_EXCHANGE);
        if excess == 0 {
            return;
        }
        for turn in self.turns.iter_mut() {
            if excess == 0 {
                break;
            }
            for block in turn.content.iter_mut() {
                if excess == 0 {
                    break;
                }
                if matches!(block, ContentBlock::Image { .. }) {
                    *block = ContentBlock::Text {
                        text: ELIDED_IMAGE_MARKER.to_string(),
                    };
                    excess -= 1;
                }
            }
        }
    }
}
