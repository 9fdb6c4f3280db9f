//! Event loading and unit grouping.
//!
//! Events arrive as JSON Lines, one [`Event`] per line. They are split into
//! analysis units according to the extraction mode: one unit per session,
//! one per player, or a single population unit. Event order inside a unit
//! is the file order.

use std::fs;
use std::path::Path;

use gamelens_types::{Event, ExtractionMode};
use indexmap::IndexMap;
use tracing::warn;

use crate::error::EngineError;

/// The events of one analysis unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    /// Player the unit belongs to, if any.
    pub player_id: Option<String>,
    /// Session the unit belongs to, if any.
    pub session_id: Option<String>,
    /// Events in file order.
    pub events: Vec<Event>,
}

/// Read a JSON Lines events file. Blank lines are skipped.
pub fn read_events(path: &Path) -> Result<Vec<Event>, EngineError> {
    let text = fs::read_to_string(path).map_err(|source| EngineError::EventsIo {
        path: path.to_path_buf(),
        source,
    })?;
    parse_events(&text)
}

/// Parse JSON Lines text into events.
pub fn parse_events(text: &str) -> Result<Vec<Event>, EngineError> {
    let mut events = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let event = serde_json::from_str(line).map_err(|source| EngineError::Event {
            line: index.saturating_add(1),
            source,
        })?;
        events.push(event);
    }
    Ok(events)
}

/// Split events into units for `mode`.
///
/// Player units drop events without a `user_id`, with a warning.
pub fn group_units(events: Vec<Event>, mode: ExtractionMode) -> Vec<Unit> {
    match mode {
        ExtractionMode::Session => {
            let mut sessions: IndexMap<String, Unit> = IndexMap::new();
            for event in events {
                let unit = sessions.entry(event.session_id.clone()).or_insert_with(|| Unit {
                    player_id: event.user_id.clone(),
                    session_id: Some(event.session_id.clone()),
                    events: Vec::new(),
                });
                unit.events.push(event);
            }
            sessions.into_values().collect()
        }
        ExtractionMode::Player => {
            let mut players: IndexMap<String, Unit> = IndexMap::new();
            let mut anonymous: usize = 0;
            for event in events {
                let Some(user_id) = event.user_id.clone() else {
                    anonymous = anonymous.saturating_add(1);
                    continue;
                };
                players
                    .entry(user_id.clone())
                    .or_insert_with(|| Unit {
                        player_id: Some(user_id),
                        session_id: None,
                        events: Vec::new(),
                    })
                    .events
                    .push(event);
            }
            if anonymous > 0 {
                warn!(dropped = anonymous, "events without a user_id skipped in player mode");
            }
            players.into_values().collect()
        }
        ExtractionMode::Population | ExtractionMode::Detector => vec![Unit {
            player_id: None,
            session_id: None,
            events,
        }],
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn make_event(name: &str, session: &str, user: Option<&str>) -> Event {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        let event = Event::new(name, ts, session);
        match user {
            Some(user) => event.with_user(user),
            None => event,
        }
    }

    fn make_events() -> Vec<Event> {
        vec![
            make_event("a", "s1", Some("p1")),
            make_event("b", "s2", Some("p2")),
            make_event("c", "s1", Some("p1")),
            make_event("d", "s3", Some("p1")),
            make_event("e", "s4", None),
        ]
    }

    fn names(unit: &Unit) -> Vec<&str> {
        unit.events.iter().map(|e| e.event_name.as_str()).collect()
    }

    #[test]
    fn session_units_keep_first_seen_order() {
        let units = group_units(make_events(), ExtractionMode::Session);
        assert_eq!(units.len(), 4);
        assert_eq!(units[0].session_id.as_deref(), Some("s1"));
        assert_eq!(units[0].player_id.as_deref(), Some("p1"));
        assert_eq!(names(&units[0]), vec!["a", "c"]);
        assert_eq!(units[3].player_id, None);
    }

    #[test]
    fn player_units_skip_anonymous_events() {
        let units = group_units(make_events(), ExtractionMode::Player);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].player_id.as_deref(), Some("p1"));
        assert_eq!(units[0].session_id, None);
        assert_eq!(names(&units[0]), vec!["a", "c", "d"]);
        assert_eq!(names(&units[1]), vec!["b"]);
    }

    #[test]
    fn population_is_one_unit() {
        let units = group_units(make_events(), ExtractionMode::Population);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].events.len(), 5);
    }

    #[test]
    fn parse_skips_blank_lines_and_reports_bad_line() {
        let text = concat!(
            r#"{"event_name":"a","timestamp":"2024-06-01T08:00:00Z","session_id":"s1"}"#,
            "\n\n",
            r#"{"event_name":"b","timestamp":"2024-06-01T08:00:05Z","session_id":"s1","user_id":"p1"}"#,
            "\n",
        );
        let events = parse_events(text).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].user_id.as_deref(), Some("p1"));

        let err = parse_events("{}\n").unwrap_err();
        assert!(matches!(err, EngineError::Event { line: 1, .. }));
    }
}
