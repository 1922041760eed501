use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// ULID and ID Types
// ============================================================================

/// Identifies one scheduler run across log blocks and the persisted record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Range separator inside a date expression ("2025-01-01至2025-01-03")
pub const RANGE_SEPARATOR: char = '至';

/// Separator between id segments of nested events ("3-1-2")
pub const ID_SEPARATOR: char = '-';

// ============================================================================
// Event Schema
// ============================================================================

/// A node in the event forest. A node without subevents is a leaf
/// ("bottom-level") event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, deserialize_with = "deserialize_event_id")]
    pub event_id: String,
    #[serde(default)]
    pub name: String,
    /// Date expressions: either `YYYY-MM-DD` or `YYYY-MM-DD至YYYY-MM-DD`
    #[serde(default)]
    pub date: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub subevent: Vec<Event>,
}

impl Event {
    pub fn new(event_id: impl Into<String>, name: impl Into<String>, dates: &[&str]) -> Self {
        Self {
            event_id: event_id.into(),
            name: name.into(),
            date: dates.iter().map(|d| d.to_string()).collect(),
            description: String::new(),
            subevent: Vec::new(),
        }
    }

    pub fn with_subevents(mut self, subevents: Vec<Event>) -> Self {
        self.subevent = subevents;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.subevent.is_empty()
    }

    /// First id segment, i.e. the id of the top-level storyline this event belongs to
    pub fn root_id(&self) -> &str {
        self.event_id
            .split(ID_SEPARATOR)
            .next()
            .unwrap_or(&self.event_id)
    }

    /// Id with its last segment removed; `None` for top-level events
    pub fn parent_id(&self) -> Option<&str> {
        self.event_id
            .rfind(ID_SEPARATOR)
            .map(|idx| &self.event_id[..idx])
    }

    /// Copy of this event without its subtree
    pub fn without_subevents(&self) -> Self {
        Self {
            subevent: Vec::new(),
            ..self.clone()
        }
    }
}

/// Model output and hand-edited files use both `"3"` and `3` for ids
fn deserialize_event_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
        Missing(Option<()>),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
        RawId::Missing(_) => String::new(),
    })
}

/// One structural edit to the event forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventOperation {
    Delete {
        event_id: String,
    },
    Update {
        event_id: String,
        event: Event,
    },
}

impl EventOperation {
    pub fn event_id(&self) -> &str {
        match self {
            EventOperation::Delete { event_id } => event_id,
            EventOperation::Update { event_id, .. } => event_id,
        }
    }
}

// ============================================================================
// Shared Context Schema
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContextKey {
    #[serde(rename = "persona")]
    Persona,
    #[serde(rename = "persona_without_relations")]
    PersonaWithoutRelations,
    #[serde(rename = "narrative_context")]
    NarrativeContext,
    #[serde(rename = "cognition")]
    Cognition,
    #[serde(rename = "env")]
    Env,
}

impl ContextKey {
    pub const ALL: [ContextKey; 5] = [
        ContextKey::Persona,
        ContextKey::PersonaWithoutRelations,
        ContextKey::NarrativeContext,
        ContextKey::Cognition,
        ContextKey::Env,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextKey::Persona => "persona",
            ContextKey::PersonaWithoutRelations => "persona_without_relations",
            ContextKey::NarrativeContext => "narrative_context",
            ContextKey::Cognition => "cognition",
            ContextKey::Env => "env",
        }
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Memory Schema
// ============================================================================

/// Generated events of one past day, as remembered by the persona
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub date: String, // YYYY-MM-DD
    pub events: String,
}

impl MemoryRecord {
    pub fn new(date: impl Into<String>, events: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            events: events.into(),
        }
    }
}

// ============================================================================
// Run Record Schema
// ============================================================================

/// State persisted at the end of every successful day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    #[serde(default)]
    pub run_id: Option<RunId>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub persona: serde_json::Value,
    #[serde(default)]
    pub narrative_context: serde_json::Value,
    #[serde(default)]
    pub cognition: serde_json::Value,
    #[serde(default)]
    pub long_memory: String,
    #[serde(default)]
    pub short_memory: String,
    #[serde(default)]
    pub reflection: String,
    #[serde(default)]
    pub thought: String,
    #[serde(default)]
    pub env: serde_json::Value,
}

impl RunRecord {
    pub fn is_empty(&self) -> bool {
        *self == RunRecord::default()
    }
}

// ============================================================================
// Plan View Schema
// ============================================================================

/// Leaves scheduled for one day plus the events that give them context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    pub sequence: Vec<Event>,
    pub backgrounds: Vec<Event>,
}

/// Root-storyline view of a day, used by the reflection stages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanView {
    pub today: DayPlan,
    #[serde(rename = "nextWeekBackground")]
    pub next_week_background: Vec<Event>,
}

/// Parent-context view of a day with a look-ahead and a look-back window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailedPlanView {
    pub today: DayPlan,
    #[serde(rename = "next5DaysBackground")]
    pub next_5_days_background: BTreeMap<String, Vec<Event>>,
    #[serde(rename = "previousDayEvents")]
    pub previous_day_events: BTreeMap<String, Vec<Event>>,
}

// ============================================================================
// Helper Functions
// ============================================================================

pub fn generate_run_id() -> RunId {
    RunId(format!("run_{}", ulid::Ulid::new()))
}
