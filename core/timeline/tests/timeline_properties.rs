use daylife_schemas::{Event, EventOperation};
use daylife_timeline::{
    extract_start_date, filter_by_start_range, format_range, is_date_match, next_n_day, parse_day,
    EventStore,
};

/// Single-day expressions match exactly their own day
#[test]
fn test_single_date_matches_only_itself() {
    let base = parse_day("2024-12-25").unwrap();
    for a in -3..=3 {
        for b in -3..=3 {
            let target = next_n_day(base, a).format("%Y-%m-%d").to_string();
            let expr = next_n_day(base, b).format("%Y-%m-%d").to_string();
            assert_eq!(is_date_match(&target, &expr).unwrap(), a == b, "{} vs {}", target, expr);
        }
    }
}

/// Ranges match exactly the days between their ends
#[test]
fn test_range_matches_its_closed_interval() {
    let base = parse_day("2025-02-26").unwrap();
    let start = base;
    let end = next_n_day(base, 4);
    let expr = format_range(start, end);

    for offset in -2..=6 {
        let target = next_n_day(base, offset);
        let expected = start <= target && target <= end;
        let target = target.format("%Y-%m-%d").to_string();
        assert_eq!(is_date_match(&target, &expr).unwrap(), expected, "{}", target);
    }
}

#[test]
fn test_start_date_of_formatted_range() {
    let start = parse_day("2025-06-30").unwrap();
    let end = parse_day("2025-07-02").unwrap();
    assert_eq!(extract_start_date(&format_range(start, end)).unwrap(), start);
}

#[test]
fn test_leaf_order_is_preorder() {
    let forest = vec![Event::new("1", "R", &["2025-01-01"]).with_subevents(vec![
        Event::new("1-1", "C1", &["2025-01-01"]),
        Event::new("1-2", "C2", &["2025-01-01"]).with_subevents(vec![
            Event::new("1-2-1", "C2a", &["2025-01-01"]),
            Event::new("1-2-2", "C2b", &["2025-01-01"]),
        ]),
    ])];

    let store = EventStore::from_events(forest);
    let names: Vec<&str> = store.leaf_events().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["C1", "C2a", "C2b"]);
}

#[test]
fn test_top_level_id_assignment() {
    let mut empty = EventStore::new();
    assert_eq!(empty.add_top_level(Event::default()), "1");

    let mut store = EventStore::from_events(vec![
        Event::new("1", "a", &["2025-01-01"]),
        Event::new("3", "b", &["2025-01-01"]),
    ]);
    assert_eq!(store.add_top_level(Event::default()), "4");
}

#[test]
fn test_single_delete_removes_only_target_subtree() {
    let mut store = EventStore::from_events(vec![
        Event::new("1", "a", &["2025-01-01"]),
        Event::new("2", "b", &["2025-01-01"]).with_subevents(vec![
            Event::new("2-1", "b1", &["2025-01-01"]),
            Event::new("2-2", "b2", &["2025-01-01"]),
        ]),
        Event::new("3", "c", &["2025-01-01"]),
    ]);

    store.apply_operations(&[EventOperation::Delete {
        event_id: "2".to_string(),
    }]);

    let ids: Vec<&str> = store.events().iter().map(|e| e.event_id.as_str()).collect();
    assert_eq!(ids, vec!["1", "3"]);
    assert!(store.find_by_id("2-1").is_empty());
    assert!(store.find_by_id("2-2").is_empty());
}

#[test]
fn test_start_range_includes_event_starting_on_boundary() {
    let events = vec![Event::new("1", "trip", &["2025-01-01至2025-01-02"])];
    let day = parse_day("2025-01-01").unwrap();
    let matched = filter_by_start_range(&events, day, day).unwrap();
    assert_eq!(matched.len(), 1);
}
