use anyhow::{Context, Result};
use async_trait::async_trait;
use daylife_composer::PromptRenderer;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::services::{LlmRequest, LlmService, RouteService};

/// Route planner backed by the chat model: one round proposes places, a
/// second round checks them and writes the route narrative.
pub struct LlmRoutePlanner {
    llm: Arc<dyn LlmService>,
    renderer: PromptRenderer,
}

impl LlmRoutePlanner {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self {
            llm,
            renderer: PromptRenderer::new(),
        }
    }
}

#[async_trait]
impl RouteService for LlmRoutePlanner {
    async fn resolve_route_and_poi(&self, persona: &Value, narrative: &str) -> Result<String> {
        let candidates = self
            .llm
            .call(LlmRequest::chat(self.renderer.route_candidates(persona, narrative)))
            .await
            .context("Route planner failed to propose places")?;
        debug!("Route candidates: {} chars", candidates.chars().count());

        let route = self
            .llm
            .call(LlmRequest::chat(
                self.renderer.route_refine(persona, narrative, &candidates),
            ))
            .await
            .context("Route planner failed to refine the route")?;

        Ok(route)
    }
}
