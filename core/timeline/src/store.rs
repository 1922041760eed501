use chrono::NaiveDate;
use daylife_schemas::{Event, EventOperation};
use std::cell::OnceCell;
use tracing::{debug, info, warn};

use crate::dates::{date_matches, extract_start_date, format_day, normalize_expr};
use crate::error::{Result, TimelineError};

/// Owns the event forest and a cached pre-order list of its leaves.
///
/// The leaf cache holds copies, so every structural mutation made through
/// the store drops or rebuilds it.
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    events: Vec<Event>,
    bottom_cache: OnceCell<Vec<Event>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<Event>) -> Self {
        Self {
            events,
            bottom_cache: OnceCell::new(),
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Leaves in pre-order, left to right. Computed only when the cache is empty.
    pub fn leaf_events(&self) -> &[Event] {
        self.bottom_cache.get_or_init(|| collect_leaves(&self.events))
    }

    pub fn refresh_leaf_cache(&mut self) {
        self.bottom_cache = OnceCell::from(collect_leaves(&self.events));
        debug!("Leaf cache rebuilt with {} events", self.leaf_events().len());
    }

    fn invalidate_leaf_cache(&mut self) {
        self.bottom_cache = OnceCell::new();
    }

    /// Leaves with at least one date expression starting on `target`.
    ///
    /// A range belongs to its first day only.
    pub fn filter_by_date(&self, target: NaiveDate) -> Result<Vec<Event>> {
        let mut matched = Vec::new();
        for leaf in self.leaf_events() {
            for expr in &leaf.date {
                if starts_on(target, expr)? {
                    matched.push(leaf.clone());
                    break;
                }
            }
        }
        Ok(matched)
    }

    /// Top-level events with a date expression starting in `[start, end]`
    pub fn top_level_starting_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Event>> {
        filter_by_start_range(&self.events, start, end)
    }

    /// Every node with this id, depth-first. Ids are not guaranteed unique.
    pub fn find_by_id(&self, target_id: &str) -> Vec<&Event> {
        let mut found = Vec::new();
        collect_by_id(&self.events, target_id, &mut found);
        found
    }

    pub fn top_level_by_id(&self, target_id: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.event_id == target_id)
    }

    /// Append a new storyline under the next free numeric id and return that id
    pub fn add_top_level(&mut self, mut event: Event) -> String {
        let next_id = self
            .events
            .iter()
            .filter_map(|e| e.event_id.parse::<u64>().ok())
            .max()
            .map_or(1, |max| max + 1);

        event.event_id = next_id.to_string();
        debug!("Adding top-level event {} ({})", event.event_id, event.name);
        self.events.push(event);
        self.invalidate_leaf_cache();

        next_id.to_string()
    }

    /// Apply edits to a copy of the forest and swap it in.
    ///
    /// Operations compose in order: each one sees the result of the previous
    /// ones. Operations whose id is not found are skipped. Returns the number
    /// of operations applied.
    pub fn apply_operations(&mut self, ops: &[EventOperation]) -> usize {
        let mut working = self.events.clone();
        let mut applied = 0;

        for op in ops {
            let done = match op {
                EventOperation::Delete { event_id } => delete_first(&mut working, event_id),
                EventOperation::Update { event_id, event } => {
                    match find_first_mut(&mut working, event_id) {
                        Some(node) => {
                            *node = event.clone();
                            true
                        }
                        None => false,
                    }
                }
            };

            if done {
                applied += 1;
            } else {
                warn!("No event with id {} for {:?}, skipping", op.event_id(), op);
            }
        }

        self.events = working;
        self.refresh_leaf_cache();

        info!("Applied {}/{} event operations", applied, ops.len());
        applied
    }

    /// Replace every date expression of the first node with `event_id` that
    /// covers `target`. Returns whether such a node exists.
    pub fn reschedule_date_for_event(
        &mut self,
        event_id: &str,
        target: NaiveDate,
        new_date_expr: &str,
    ) -> Result<bool> {
        let Some(node) = find_first_mut(&mut self.events, event_id) else {
            return Ok(false);
        };

        let mut changed = 0;
        for expr in node.date.iter_mut() {
            if expr_matches(target, expr.as_str())? {
                *expr = new_date_expr.to_string();
                changed += 1;
            }
        }

        debug!(
            "Rescheduled {} date(s) of event {} from {} to {}",
            changed,
            event_id,
            format_day(target),
            new_date_expr
        );
        self.invalidate_leaf_cache();
        Ok(true)
    }
}

fn starts_on(target: NaiveDate, expr: &str) -> Result<bool> {
    date_matches(target, &format_day(extract_start_date(expr)?))
}

fn expr_matches(target: NaiveDate, expr: &str) -> Result<bool> {
    date_matches(target, &normalize_expr(expr)?)
}

fn collect_leaves(events: &[Event]) -> Vec<Event> {
    fn walk(events: &[Event], out: &mut Vec<Event>) {
        for event in events {
            if event.is_leaf() {
                out.push(event.clone());
            } else {
                walk(&event.subevent, out);
            }
        }
    }

    let mut leaves = Vec::new();
    walk(events, &mut leaves);
    leaves
}

fn collect_by_id<'a>(events: &'a [Event], target_id: &str, out: &mut Vec<&'a Event>) {
    for event in events {
        if event.event_id == target_id {
            out.push(event);
        }
        collect_by_id(&event.subevent, target_id, out);
    }
}

fn find_first_mut<'a>(events: &'a mut [Event], target_id: &str) -> Option<&'a mut Event> {
    for event in events.iter_mut() {
        if event.event_id == target_id {
            return Some(event);
        }
        if let Some(found) = find_first_mut(&mut event.subevent, target_id) {
            return Some(found);
        }
    }
    None
}

fn delete_first(events: &mut Vec<Event>, target_id: &str) -> bool {
    for idx in 0..events.len() {
        if events[idx].event_id == target_id {
            events.remove(idx);
            return true;
        }
        if delete_first(&mut events[idx].subevent, target_id) {
            return true;
        }
    }
    false
}

/// Events with at least one date expression whose start lies in `[start, end]`
pub fn filter_by_start_range(events: &[Event], start: NaiveDate, end: NaiveDate) -> Result<Vec<Event>> {
    if start > end {
        return Err(TimelineError::Range {
            start: format_day(start),
            end: format_day(end),
        });
    }

    let mut matched = Vec::new();
    for event in events {
        for expr in &event.date {
            let event_start = extract_start_date(expr)?;
            if start <= event_start && event_start <= end {
                matched.push(event.clone());
                break;
            }
        }
    }
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::parse_day;

    fn day(s: &str) -> NaiveDate {
        parse_day(s).unwrap()
    }

    fn sample_forest() -> Vec<Event> {
        vec![
            Event::new("1", "工作", &["2025-01-01至2025-01-05"]).with_subevents(vec![
                Event::new("1-1", "晨会", &["2025-01-01"]),
                Event::new("1-2", "项目", &["2025-01-02"]).with_subevents(vec![
                    Event::new("1-2-1", "写方案", &["2025-01-02"]),
                    Event::new("1-2-2", "评审", &["2025-01-03 14:00"]),
                ]),
            ]),
            Event::new("2", "健身", &["2025-01-02"]),
        ]
    }

    fn ids(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.event_id.as_str()).collect()
    }

    #[test]
    fn test_leaf_events_preorder() {
        let store = EventStore::from_events(sample_forest());
        assert_eq!(ids(store.leaf_events()), vec!["1-1", "1-2-1", "1-2-2", "2"]);
    }

    #[test]
    fn test_filter_by_date() {
        let store = EventStore::from_events(sample_forest());
        let matched = store.filter_by_date(day("2025-01-02")).unwrap();
        assert_eq!(ids(&matched), vec!["1-2-1", "2"]);

        // time portions are dropped before matching
        let matched = store.filter_by_date(day("2025-01-03")).unwrap();
        assert_eq!(ids(&matched), vec!["1-2-2"]);
    }

    #[test]
    fn test_filter_by_date_does_not_duplicate_leaf() {
        let store = EventStore::from_events(vec![Event::new(
            "1",
            "休假",
            &["2025-01-01至2025-01-03", "2025-01-02"],
        )]);
        assert_eq!(store.filter_by_date(day("2025-01-02")).unwrap().len(), 1);
    }

    #[test]
    fn test_filter_by_date_matches_range_on_first_day_only() {
        let store = EventStore::from_events(vec![Event::new("1", "出差", &["2025-01-01至2025-01-03"])]);

        assert_eq!(ids(&store.filter_by_date(day("2025-01-01")).unwrap()), vec!["1"]);
        assert!(store.filter_by_date(day("2025-01-02")).unwrap().is_empty());
        assert!(store.filter_by_date(day("2025-01-03")).unwrap().is_empty());
    }

    #[test]
    fn test_filter_by_date_rejects_malformed_expression() {
        let store = EventStore::from_events(vec![Event::new("1", "?", &["明天"])]);
        assert!(matches!(
            store.filter_by_date(day("2025-01-01")),
            Err(TimelineError::Format { .. })
        ));
    }

    #[test]
    fn test_filter_by_start_range() {
        let events = vec![
            Event::new("1", "出差", &["2025-01-01至2025-01-02"]),
            Event::new("2", "聚会", &["2025-01-05"]),
        ];
        let matched = filter_by_start_range(&events, day("2025-01-01"), day("2025-01-01")).unwrap();
        assert_eq!(ids(&matched), vec!["1"]);

        assert!(matches!(
            filter_by_start_range(&events, day("2025-01-02"), day("2025-01-01")),
            Err(TimelineError::Range { .. })
        ));
    }

    #[test]
    fn test_find_by_id_returns_all_matches() {
        let mut forest = sample_forest();
        forest[1].subevent.push(Event::new("1-1", "重复", &["2025-01-02"]));
        let store = EventStore::from_events(forest);

        assert_eq!(store.find_by_id("1-1").len(), 2);
        assert_eq!(store.find_by_id("1-2-2")[0].name, "评审");
        assert!(store.find_by_id("9").is_empty());
    }

    #[test]
    fn test_add_top_level_ids() {
        let mut store = EventStore::new();
        assert_eq!(store.add_top_level(Event::new("", "第一", &[])), "1");

        let mut store = EventStore::from_events(vec![
            Event::new("1", "a", &[]),
            Event::new("3", "b", &[]),
        ]);
        assert_eq!(store.add_top_level(Event::new("x", "c", &[])), "4");
        assert_eq!(store.events()[2].event_id, "4");
    }

    #[test]
    fn test_add_top_level_invalidates_cache() {
        let mut store = EventStore::from_events(sample_forest());
        assert_eq!(store.leaf_events().len(), 4);
        store.add_top_level(Event::new("", "读书", &["2025-01-04"]));
        assert_eq!(store.leaf_events().len(), 5);
    }

    #[test]
    fn test_delete_removes_subtree_and_keeps_sibling_order() {
        let mut store = EventStore::from_events(sample_forest());
        let applied = store.apply_operations(&[EventOperation::Delete {
            event_id: "1-2".to_string(),
        }]);

        assert_eq!(applied, 1);
        assert_eq!(ids(&store.events()[0].subevent), vec!["1-1"]);
        assert_eq!(ids(store.events()), vec!["1", "2"]);
        assert_eq!(ids(store.leaf_events()), vec!["1-1", "2"]);
    }

    #[test]
    fn test_update_replaces_subtree() {
        let mut store = EventStore::from_events(sample_forest());
        store.apply_operations(&[EventOperation::Update {
            event_id: "1-2".to_string(),
            event: Event::new("1-2", "项目取消", &["2025-01-02"]),
        }]);

        let node = store.find_by_id("1-2")[0];
        assert_eq!(node.name, "项目取消");
        assert!(node.is_leaf());
        assert_eq!(ids(store.leaf_events()), vec!["1-1", "1-2", "2"]);
    }

    #[test]
    fn test_operations_compose_in_order() {
        let mut store = EventStore::from_events(sample_forest());
        let applied = store.apply_operations(&[
            EventOperation::Delete {
                event_id: "1-1".to_string(),
            },
            EventOperation::Update {
                event_id: "2".to_string(),
                event: Event::new("2", "游泳", &["2025-01-02"]),
            },
            EventOperation::Delete {
                event_id: "missing".to_string(),
            },
        ]);

        assert_eq!(applied, 2);
        assert!(store.find_by_id("1-1").is_empty());
        assert_eq!(store.find_by_id("2")[0].name, "游泳");
    }

    #[test]
    fn test_reschedule_date_for_event() {
        let mut store = EventStore::from_events(vec![Event::new(
            "1",
            "旅行",
            &["2025-01-01", "2025-01-03至2025-01-04", "2025-01-06"],
        )]);
        assert_eq!(store.leaf_events()[0].date.len(), 3);

        let found = store
            .reschedule_date_for_event("1", day("2025-01-04"), "2025-01-10")
            .unwrap();
        assert!(found);
        assert_eq!(
            store.events()[0].date,
            vec!["2025-01-01", "2025-01-10", "2025-01-06"]
        );
        assert_eq!(store.leaf_events()[0].date[1], "2025-01-10");

        assert!(!store
            .reschedule_date_for_event("7", day("2025-01-04"), "2025-01-10")
            .unwrap());
    }
}
