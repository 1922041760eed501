//! Date-scoped read-only projections of the event forest used in prompts.

use chrono::NaiveDate;
use daylife_schemas::{DayPlan, DetailedPlanView, Event, PlanView};
use std::collections::{BTreeMap, HashSet};

use crate::dates::{format_day, next_n_day};
use crate::error::Result;
use crate::store::EventStore;

const NEXT_WEEK_DAYS: i64 = 7;
const LOOKAHEAD_DAYS: i64 = 5;

/// Today's leaves with the root storyline of each, plus storylines starting
/// within the coming week (subevents cleared)
pub fn plan_view(store: &EventStore, date: NaiveDate) -> Result<PlanView> {
    let sequence = store.filter_by_date(date)?;

    let mut seen = HashSet::new();
    let backgrounds = sequence
        .iter()
        .filter_map(|leaf| store.top_level_by_id(leaf.root_id()))
        .filter(|root| seen.insert(root.event_id.clone()))
        .map(Event::without_subevents)
        .collect();

    let next_week_background = store
        .top_level_starting_between(date, next_n_day(date, NEXT_WEEK_DAYS))?
        .iter()
        .map(Event::without_subevents)
        .collect();

    Ok(PlanView {
        today: DayPlan {
            sequence,
            backgrounds,
        },
        next_week_background,
    })
}

/// Today's leaves with each one's immediate parent, the leaves of the next
/// five days and those of the previous day
pub fn detailed_plan_view(store: &EventStore, date: NaiveDate) -> Result<DetailedPlanView> {
    let sequence = store.filter_by_date(date)?;

    let mut seen = HashSet::new();
    let backgrounds = sequence
        .iter()
        .filter_map(|leaf| leaf.parent_id())
        .filter_map(|parent_id| store.find_by_id(parent_id).into_iter().next())
        .filter(|parent| seen.insert(parent.event_id.clone()))
        .cloned()
        .collect();

    let mut next_5_days_background = BTreeMap::new();
    for offset in 1..=LOOKAHEAD_DAYS {
        let day = next_n_day(date, offset);
        next_5_days_background.insert(format_day(day), store.filter_by_date(day)?);
    }

    let previous_day = next_n_day(date, -1);
    let mut previous_day_events = BTreeMap::new();
    previous_day_events.insert(format_day(previous_day), store.filter_by_date(previous_day)?);

    Ok(DetailedPlanView {
        today: DayPlan {
            sequence,
            backgrounds,
        },
        next_5_days_background,
        previous_day_events,
    })
}

/// Concatenated names of the leaves scheduled on `date`
pub fn leaf_names_on(store: &EventStore, date: NaiveDate) -> Result<String> {
    Ok(store
        .filter_by_date(date)?
        .iter()
        .map(|e| e.name.as_str())
        .collect::<Vec<_>>()
        .join("，"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::parse_day;

    fn day(s: &str) -> NaiveDate {
        parse_day(s).unwrap()
    }

    fn store() -> EventStore {
        EventStore::from_events(vec![
            Event::new("1", "新工作", &["2025-01-01至2025-01-31"]).with_subevents(vec![
                Event::new("1-1", "入职第一周", &["2025-01-01至2025-01-07"]).with_subevents(vec![
                    Event::new("1-1-1", "办理入职", &["2025-01-01"]),
                    Event::new("1-1-2", "认识同事", &["2025-01-01"]),
                    Event::new("1-1-3", "熟悉项目", &["2025-01-02"]),
                ]),
            ]),
            Event::new("2", "看牙", &["2025-01-01"]),
            Event::new("3", "春节", &["2025-01-06至2025-01-10"]).with_subevents(vec![
                Event::new("3-1", "回老家", &["2025-01-06"]),
            ]),
            Event::new("4", "旅行", &["2025-01-20"]),
        ])
    }

    #[test]
    fn test_plan_view_uses_root_backgrounds() {
        let view = plan_view(&store(), day("2025-01-01")).unwrap();

        let sequence: Vec<&str> = view.today.sequence.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(sequence, vec!["1-1-1", "1-1-2", "2"]);

        // 1-1-1 and 1-1-2 share root 1, which is listed once
        let backgrounds: Vec<&str> = view.today.backgrounds.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(backgrounds, vec!["1", "2"]);
        assert!(view.today.backgrounds[0].subevent.is_empty());
    }

    #[test]
    fn test_plan_view_next_week_background() {
        let view = plan_view(&store(), day("2025-01-01")).unwrap();
        let ids: Vec<&str> = view.next_week_background.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert!(view.next_week_background.iter().all(|e| e.subevent.is_empty()));
    }

    #[test]
    fn test_detailed_plan_view_uses_parent_backgrounds() {
        let view = detailed_plan_view(&store(), day("2025-01-01")).unwrap();

        let backgrounds: Vec<&str> = view.today.backgrounds.iter().map(|e| e.event_id.as_str()).collect();
        // "2" is top-level and has no parent
        assert_eq!(backgrounds, vec!["1-1"]);
        assert_eq!(view.today.backgrounds[0].subevent.len(), 3);
    }

    #[test]
    fn test_detailed_plan_view_windows() {
        let view = detailed_plan_view(&store(), day("2025-01-02")).unwrap();

        assert_eq!(view.next_5_days_background.len(), 5);
        assert_eq!(view.next_5_days_background["2025-01-06"][0].event_id, "3-1");
        assert!(view.next_5_days_background["2025-01-03"].is_empty());

        let previous = &view.previous_day_events["2025-01-01"];
        assert_eq!(previous.len(), 3);
    }

    #[test]
    fn test_leaf_names_on() {
        assert_eq!(leaf_names_on(&store(), day("2025-01-02")).unwrap(), "熟悉项目");
        assert_eq!(leaf_names_on(&store(), day("2025-02-02")).unwrap(), "");
    }
}
