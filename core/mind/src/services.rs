//! Collaborators the pipeline depends on, injected as trait objects.

use anyhow::Result;
use async_trait::async_trait;
use daylife_indexing::MemoryRegistry;
use daylife_schemas::{Event, RunRecord};
use daylife_timeline::HolidayCalendar;
use serde_json::Value;
use std::sync::Arc;

use crate::context::SharedContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmMode {
    Chat,
    Reasoning,
    /// Echo the prompt back without calling a model
    Passthrough,
}

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub mode: LlmMode,
    /// Keep the exchange in the provider's run record
    pub record: bool,
}

impl LlmRequest {
    pub fn chat(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            mode: LlmMode::Chat,
            record: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_mode(mut self, mode: LlmMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn recorded(mut self) -> Self {
        self.record = true;
        self
    }
}

#[async_trait]
pub trait LlmService: Send + Sync {
    async fn call(&self, request: LlmRequest) -> Result<String>;
}

/// Resolves concrete places and a route for a day's narrative
#[async_trait]
pub trait RouteService: Send + Sync {
    async fn resolve_route_and_poi(&self, persona: &Value, narrative: &str) -> Result<String>;
}

pub trait RecordStore: Send + Sync {
    /// The persisted record, or an empty one when nothing was saved yet
    fn load(&self) -> Result<RunRecord>;
    fn save(&self, record: &RunRecord) -> Result<()>;
    fn save_event_snapshot(&self, date: &str, events: &[Event]) -> Result<()>;
}

/// Append-only, section-tagged text log shared by all days
pub trait LogAppender: Send + Sync {
    fn append(&self, text: &str, date: &str, section: &str) -> Result<()>;
}

/// Everything a pipeline needs besides its own day's inputs
#[derive(Clone)]
pub struct Services {
    pub llm: Arc<dyn LlmService>,
    pub route: Arc<dyn RouteService>,
    pub records: Arc<dyn RecordStore>,
    pub log: Arc<dyn LogAppender>,
    pub context: Arc<SharedContext>,
    pub memory: Arc<MemoryRegistry>,
    pub holidays: Arc<dyn HolidayCalendar>,
}
