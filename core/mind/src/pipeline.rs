//! One simulated day: seven model-driven stages over the event forest.
//!
//! Stages run strictly in order and each feeds the next. The first error
//! aborts the day; nothing is retried.

use chrono::NaiveDate;
use daylife_composer::{render_value, Addresses, PromptRenderer};
use daylife_indexing::MemoryIndex;
use daylife_schemas::{ContextKey, Event, MemoryRecord, RunId, RunRecord};
use daylife_timeline::{
    decode_events, decode_json, detailed_plan_view, format_day, format_with_weekday_and_holidays,
    leaf_names_on, next_n_day, plan_view, strip_json_fencing, EventStore,
};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{MindError, Result};
use crate::scheduler::HandOff;
use crate::services::{LlmRequest, Services};

/// Days of memory records gathered for the long-term memory update
const HISTORY_DAYS: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Subjective,
    Objective,
    Route,
    Detail,
    Extraction,
    Reflection,
    LongMemory,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Subjective,
        Stage::Objective,
        Stage::Route,
        Stage::Detail,
        Stage::Extraction,
        Stage::Reflection,
        Stage::LongMemory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Subjective => "subjective",
            Stage::Objective => "objective",
            Stage::Route => "route",
            Stage::Detail => "detail",
            Stage::Extraction => "extraction",
            Stage::Reflection => "reflection",
            Stage::LongMemory => "long_memory",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Pending,
    Running(Stage),
    Completed,
    Failed(Stage),
}

/// Per-run settings shared by every day's pipeline
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub run_id: RunId,
    pub country: String,
    pub addresses: Addresses,
}

/// Memory and thought carried by one day's run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunState {
    pub long_memory: String,
    pub short_memory: String,
    pub thought: String,
    pub reflection: String,
}

impl RunState {
    /// Long-term memory followed by short-term memory
    fn combined_memory(&self) -> String {
        [self.long_memory.trim(), self.short_memory.trim()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub struct DailyPipeline {
    date: NaiveDate,
    day: String,
    store: EventStore,
    memory: Arc<MemoryIndex>,
    services: Services,
    settings: PipelineSettings,
    renderer: PromptRenderer,
    run: RunState,
    state: PipelineState,
}

impl DailyPipeline {
    pub fn new(
        date: NaiveDate,
        events: Vec<Event>,
        memory: Arc<MemoryIndex>,
        services: Services,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            date,
            day: format_day(date),
            store: EventStore::from_events(events),
            memory,
            services,
            settings,
            renderer: PromptRenderer::new(),
            run: RunState::default(),
            state: PipelineState::Pending,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn run_state(&self) -> &RunState {
        &self.run
    }

    pub fn events(&self) -> &[Event] {
        self.store.events()
    }

    /// Run all stages. `handoff` is raised once the objective plan exists.
    pub async fn run(&mut self, handoff: &mut HandOff) -> Result<RunRecord> {
        info!("Day {} pipeline starting", self.day);

        match self.run_stages(handoff).await {
            Ok(record) => {
                self.state = PipelineState::Completed;
                info!("Day {} pipeline completed", self.day);
                Ok(record)
            }
            Err(err) => {
                let stage = match self.state {
                    PipelineState::Running(stage) => stage,
                    _ => Stage::Subjective,
                };
                self.state = PipelineState::Failed(stage);
                error!("Day {} failed at {}: {}", self.day, stage, err);
                Err(err)
            }
        }
    }

    async fn run_stages(&mut self, handoff: &mut HandOff) -> Result<RunRecord> {
        self.seed_from_record()?;

        let date_text = format_with_weekday_and_holidays(
            self.date,
            &self.settings.country,
            self.services.holidays.as_ref(),
        );
        let context = self.services.context.clone();
        let persona = context.get(ContextKey::Persona);

        // Stage 1
        self.enter(Stage::Subjective);
        let plan = plan_view(&self.store, self.date)?;
        let prompt = self.renderer.subjective(
            &context.get_text(ContextKey::Cognition),
            &self.run.combined_memory(),
            &self.run.thought,
            &plan,
            &date_text,
            &persona,
        );
        let subjective = ask(&self.services, LlmRequest::chat(prompt).recorded()).await?;
        self.log(&subjective, "t1")?;

        // Stage 2
        self.enter(Stage::Objective);
        let detailed_plan = detailed_plan_view(&self.store, self.date)?;
        let prompt = self.renderer.objective(
            &context.get_text(ContextKey::Cognition),
            &self.run.combined_memory(),
            &subjective,
            &detailed_plan,
            &date_text,
            &persona,
        );
        let objective = ask(&self.services, LlmRequest::chat(prompt).recorded()).await?;
        self.log(&objective, "t2")?;
        handoff.raise();

        // Stage 3
        self.enter(Stage::Route);
        let poi = self
            .services
            .route
            .resolve_route_and_poi(&persona, &objective)
            .await
            .map_err(|e| MindError::external("route planner", e))?;
        let prompt = self.renderer.route(&objective, &poi, &date_text);
        let routed = ask(&self.services, LlmRequest::chat(prompt)).await?;
        self.log(&routed, "t3")?;

        // Stage 4
        self.enter(Stage::Detail);
        let prompt = self.renderer.detail(
            &self.run.short_memory,
            &routed,
            &context.get_text(ContextKey::Cognition),
            &poi,
        );
        let detailed = ask(&self.services, LlmRequest::chat(prompt)).await?;
        self.log(&detailed, "t4")?;

        // Stage 5
        self.enter(Stage::Extraction);
        let places = [poi.trim(), self.settings.addresses.render().as_str()].join("\n");
        let prompt = self.renderer.extraction(&detailed, &places, &date_text);
        let extraction_raw = strip_json_fencing(&ask(&self.services, LlmRequest::chat(prompt)).await?);
        let new_events = decode_events(Stage::Extraction.as_str(), &extraction_raw)?;
        for event in new_events {
            let id = self.store.add_top_level(event);
            debug!("Day {} extracted event {}", self.day, id);
        }
        self.store.refresh_leaf_cache();
        let plan = plan_view(&self.store, self.date)?;

        // Stage 6
        self.enter(Stage::Reflection);
        let prompt = self.renderer.reflection(
            &context.get_text(ContextKey::Cognition),
            &self.run.combined_memory(),
            &detailed,
            &plan,
            &date_text,
        );
        let reflection_raw = ask(&self.services, LlmRequest::chat(prompt)).await?;
        let reflection: Value = decode_json(Stage::Reflection.as_str(), &reflection_raw)?;
        self.run.thought = required_text(&reflection, Stage::Reflection, "thought")?;
        self.run.reflection = reflection
            .get("reflection")
            .map(render_value)
            .unwrap_or_default();
        match reflection.get("cognition") {
            Some(cognition) if !render_value(cognition).trim().is_empty() => {
                context.set(ContextKey::Cognition, cognition.clone());
            }
            _ => debug!("Day {} reflection kept cognition unchanged", self.day),
        }

        // Stage 7
        self.enter(Stage::LongMemory);
        let history = self.gather_history(&reflection);
        let prompt = self.renderer.long_memory(
            &context.get_text(ContextKey::Cognition),
            &self.run.long_memory,
            &plan,
            &history,
            &extraction_raw,
            &self.run.thought,
            &date_text,
        );
        let long_memory_raw = ask(&self.services, LlmRequest::chat(prompt)).await?;
        let long_memory: Value = decode_json(Stage::LongMemory.as_str(), &long_memory_raw)?;
        self.run.long_memory = required_text(&long_memory, Stage::LongMemory, "long_memory")?;
        self.log(&long_memory_raw, "t2")?;

        self.finish(extraction_raw)
    }

    /// Memory, thought and reflection left by the last saved day
    fn seed_from_record(&mut self) -> Result<()> {
        let record = self
            .services
            .records
            .load()
            .map_err(|e| MindError::persistence("load run record", e))?;

        if record.is_empty() {
            debug!("Day {} starts without a saved record", self.day);
            return Ok(());
        }

        self.run = RunState {
            long_memory: record.long_memory,
            short_memory: record.short_memory,
            thought: record.thought,
            reflection: record.reflection,
        };

        let context = &self.services.context;
        for (key, value) in [
            (ContextKey::Persona, record.persona),
            (ContextKey::NarrativeContext, record.narrative_context),
            (ContextKey::Cognition, record.cognition),
            (ContextKey::Env, record.env),
        ] {
            if context.get(key).is_null() && !value.is_null() {
                context.set(key, value);
            }
        }

        Ok(())
    }

    /// Today's reflection plus the memory records of the preceding days
    fn gather_history(&self, reflection: &Value) -> Value {
        let previous_days: Vec<Value> = (1..=HISTORY_DAYS)
            .flat_map(|offset| {
                self.memory
                    .search_by_date(&format_day(next_n_day(self.date, -offset)))
            })
            .map(|record| json!({"date": record.date, "events": record.events}))
            .collect();

        json!({
            "reflection": reflection,
            "previous_days": previous_days,
        })
    }

    /// Persist the record and the forest, then publish today's memory.
    ///
    /// Short-term memory is composed from a staged index holding today's
    /// record, so nothing reaches the shared history unless both saves succeed.
    fn finish(&mut self, extraction_raw: String) -> Result<RunRecord> {
        let today = MemoryRecord::new(self.day.clone(), extraction_raw);

        let tomorrow = next_n_day(self.date, 1);
        let topic = leaf_names_on(&self.store, tomorrow)?;
        self.run.short_memory = self
            .memory
            .staged(today.clone())
            .and_then(|staged| staged.compose_short_term_memory(&topic, self.date))
            .map_err(|e| MindError::external("memory index", e))?;
        if self.run.short_memory.is_empty() {
            warn!("Day {} produced an empty short-term memory", self.day);
        }

        let context = &self.services.context;
        let record = RunRecord {
            run_id: Some(self.settings.run_id.clone()),
            date: Some(self.day.clone()),
            persona: context.get(ContextKey::Persona),
            narrative_context: context.get(ContextKey::NarrativeContext),
            cognition: context.get(ContextKey::Cognition),
            env: context.get(ContextKey::Env),
            long_memory: self.run.long_memory.clone(),
            short_memory: self.run.short_memory.clone(),
            reflection: self.run.reflection.clone(),
            thought: self.run.thought.clone(),
        };

        self.services
            .records
            .save(&record)
            .map_err(|e| MindError::persistence("save run record", e))?;
        self.services
            .records
            .save_event_snapshot(&self.day, self.store.events())
            .map_err(|e| MindError::persistence("save event snapshot", e))?;

        self.services
            .memory
            .publish(today)
            .map_err(|e| MindError::external("memory index", e))?;

        Ok(record)
    }

    fn enter(&mut self, stage: Stage) {
        self.state = PipelineState::Running(stage);
        info!("Day {} stage {}", self.day, stage);
    }

    fn log(&self, text: &str, section: &str) -> Result<()> {
        self.services
            .log
            .append(text, &self.day, section)
            .map_err(|e| MindError::persistence(format!("append {} log", section), e))
    }
}

async fn ask(services: &Services, request: LlmRequest) -> Result<String> {
    services
        .llm
        .call(request)
        .await
        .map_err(|e| MindError::external("llm", e))
}

fn required_text(value: &Value, stage: Stage, field: &'static str) -> Result<String> {
    match value.get(field) {
        Some(Value::Null) | None => Err(MindError::MissingField {
            stage: stage.as_str(),
            field,
        }),
        Some(found) => Ok(render_value(found)),
    }
}
