//! Cleanup and decoding of structured model output.
//!
//! Models wrap JSON in code fences, sprinkle in stray symbols and break
//! lines inconsistently. Everything a stage parses goes through here so
//! stages only ever see typed data or a [`DecodeError`].

use daylife_schemas::Event;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::debug;

use crate::error::DecodeError;

/// Compiled patterns for cleaning model output
pub struct OutputCleaner {
    leading_fence: Regex,
    trailing_fence: Regex,
    newline_runs: Regex,
}

impl Default for OutputCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputCleaner {
    pub fn new() -> Self {
        Self {
            leading_fence: Regex::new(r"^```[A-Za-z0-9_+\-]*[ \t]*\n?").expect("literal pattern"),
            trailing_fence: Regex::new(r"\n?[ \t]*```$").expect("literal pattern"),
            newline_runs: Regex::new(r"\n{2,}").expect("literal pattern"),
        }
    }

    pub fn clean(&self, text: &str) -> String {
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        let trimmed = normalized.trim();

        let unfenced = self.leading_fence.replace(trimmed, "");
        let unfenced = self.trailing_fence.replace(&unfenced, "");

        let filtered: String = unfenced.chars().filter(|c| is_allowed_char(*c)).collect();
        let collapsed = self.newline_runs.replace_all(&filtered, "\n");

        collapsed.trim().to_string()
    }
}

/// ASCII printable, common whitespace, CJK ideographs and the punctuation
/// blocks Chinese text uses
fn is_allowed_char(c: char) -> bool {
    matches!(c,
        '\t' | '\n' | '\r'
        | '\u{0020}'..='\u{007E}'
        | '\u{2000}'..='\u{206F}'
        | '\u{2E80}'..='\u{2FDF}'
        | '\u{3000}'..='\u{303F}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{FF00}'..='\u{FFEF}'
    )
}

fn default_cleaner() -> &'static OutputCleaner {
    static CLEANER: OnceLock<OutputCleaner> = OnceLock::new();
    CLEANER.get_or_init(OutputCleaner::new)
}

pub fn strip_json_fencing(text: &str) -> String {
    default_cleaner().clean(text)
}

/// Clean `text` and parse it as `T`
pub fn decode_json<T: DeserializeOwned>(stage: &str, text: &str) -> Result<T, DecodeError> {
    let cleaned = strip_json_fencing(text);
    debug!("Decoding {} bytes of {} output", cleaned.len(), stage);
    serde_json::from_str(&cleaned).map_err(|source| DecodeError {
        stage: stage.to_string(),
        source,
    })
}

/// New events from extraction output: a bare array, `{"events": [...]}`,
/// or a single event object
pub fn decode_events(stage: &str, text: &str) -> Result<Vec<Event>, DecodeError> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum EventsPayload {
        List(Vec<Event>),
        Wrapped { events: Vec<Event> },
        Single(Event),
    }

    let events = match decode_json::<EventsPayload>(stage, text)? {
        EventsPayload::List(events) => events,
        EventsPayload::Wrapped { events } => events,
        EventsPayload::Single(event) => vec![event],
    };

    // Every field defaults, so any object parses; an unnamed event means
    // the model answered with something other than events.
    if let Some(position) = events.iter().position(|e| e.name.trim().is_empty()) {
        return Err(DecodeError {
            stage: stage.to_string(),
            source: serde::de::Error::custom(format!("event {} has no name", position)),
        });
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_fence_with_language_tag() {
        let text = "```json\n{\"thought\": \"好\"}\n```";
        assert_eq!(strip_json_fencing(text), "{\"thought\": \"好\"}");
    }

    #[test]
    fn test_strips_fence_without_language_tag() {
        let text = "  ```\n[1, 2]\n```  ";
        assert_eq!(strip_json_fencing(text), "[1, 2]");
    }

    #[test]
    fn test_leaves_unfenced_text_alone() {
        assert_eq!(strip_json_fencing("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_drops_characters_outside_allow_list() {
        let text = "{\"mood\": \"开心😀\", \"note\": \"ok\u{200B}\"}";
        let cleaned = strip_json_fencing(text);
        assert!(!cleaned.contains('😀'));
        assert!(cleaned.contains("开心"));
        // zero-width space is general punctuation and survives
        assert!(cleaned.contains('\u{200B}'));
    }

    #[test]
    fn test_keeps_fullwidth_and_cjk_punctuation() {
        let text = "今天，我去了公园。（很开心）";
        assert_eq!(strip_json_fencing(text), text);
    }

    #[test]
    fn test_collapses_newlines_and_normalizes_line_endings() {
        let text = "{\r\n\r\n\"a\": 1,\r\n\n\n\"b\": 2\r}";
        assert_eq!(strip_json_fencing(text), "{\n\"a\": 1,\n\"b\": 2\n}");
    }

    #[test]
    fn test_decode_json_reports_stage() {
        let err = decode_json::<serde_json::Value>("reflection", "not json").unwrap_err();
        assert_eq!(err.stage, "reflection");
        assert!(err.to_string().contains("reflection"));
    }

    #[test]
    fn test_decode_events_shapes() {
        let list = r#"```json
[{"name": "午饭", "date": ["2025-01-01"], "description": "和同事吃饭"}]
```"#;
        assert_eq!(decode_events("extraction", list).unwrap().len(), 1);

        let wrapped = r#"{"events": [{"name": "a"}, {"name": "b"}]}"#;
        assert_eq!(decode_events("extraction", wrapped).unwrap().len(), 2);

        let single = r#"{"name": "散步", "date": ["2025-01-01"]}"#;
        let events = decode_events("extraction", single).unwrap();
        assert_eq!(events[0].name, "散步");
    }

    #[test]
    fn test_decode_events_rejects_objects_that_are_not_events() {
        let err = decode_events("extraction", r#"{"error": "我无法完成"}"#).unwrap_err();
        assert_eq!(err.stage, "extraction");

        let unnamed = r#"[{"name": "午饭"}, {"date": ["2025-01-01"]}]"#;
        assert!(decode_events("extraction", unnamed).is_err());

        assert!(decode_events("extraction", "[]").unwrap().is_empty());
    }
}
