pub mod config;
pub mod context;
pub mod error;
pub mod llm_providers;
pub mod persistence;
pub mod pipeline;
pub mod route;
pub mod scheduler;
pub mod services;

pub use config::MindConfig;
pub use context::SharedContext;
pub use error::{MindError, Result};
pub use llm_providers::{build_llm, LlmConfig, LlmProviderKind, OllamaProvider, OpenAIProvider};
pub use persistence::{FileLogAppender, JsonRecordStore};
pub use pipeline::{DailyPipeline, PipelineSettings, PipelineState, RunState, Stage};
pub use route::LlmRoutePlanner;
pub use scheduler::{DayRunner, DayScheduler, HandOff, PipelineRunner, RunReport, StartGate};
pub use services::{LlmMode, LlmRequest, LlmService, LogAppender, RecordStore, RouteService, Services};
