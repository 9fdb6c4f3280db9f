//! The telemetry event record consumed by every generator.
//!
//! Events are produced by an external event source and are read-only inside
//! the engine. The only way the engine creates events is through detectors,
//! which build them with [`Event::generated_from`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::enums::EventSource;

/// Opaque key/value payload carried by an event.
pub type EventData = Map<String, Value>;

/// A single logged (or detector-generated) game event.
///
/// The engine assumes events for one unit arrive with non-decreasing
/// `timestamp` and `event_sequence_index`; it never re-sorts them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Name of the event type, e.g. `"level_start"`.
    pub event_name: String,
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
    /// The player that produced the event, when known.
    #[serde(default)]
    pub user_id: Option<String>,
    /// The session the event belongs to.
    pub session_id: String,
    /// Event-specific payload.
    #[serde(default)]
    pub event_data: EventData,
    /// Version of the logging schema the event was written with.
    ///
    /// `None` means the event carries no versioning metadata; generators
    /// reject such events.
    #[serde(default)]
    pub log_version: Option<String>,
    /// Position of the event within its session.
    #[serde(default)]
    pub event_sequence_index: Option<u64>,
    /// Identifier of the game that logged the event.
    #[serde(default)]
    pub app_id: String,
    /// Version of the game build that logged the event.
    #[serde(default)]
    pub app_version: Option<String>,
    /// Whether the event was logged by the game or generated by a detector.
    #[serde(default)]
    pub event_source: EventSource,
    /// Snapshot of game state attached to the event.
    #[serde(default)]
    pub game_state: EventData,
}

impl Event {
    /// Create a game-sourced event with an empty payload.
    pub fn new(
        event_name: impl Into<String>,
        timestamp: DateTime<Utc>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            event_name: event_name.into(),
            timestamp,
            user_id: None,
            session_id: session_id.into(),
            event_data: EventData::new(),
            log_version: None,
            event_sequence_index: None,
            app_id: String::new(),
            app_version: None,
            event_source: EventSource::Game,
            game_state: EventData::new(),
        }
    }

    /// Set the log version (builder style).
    #[must_use]
    pub fn with_log_version(mut self, log_version: impl Into<String>) -> Self {
        self.log_version = Some(log_version.into());
        self
    }

    /// Set the user id (builder style).
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the sequence index (builder style).
    #[must_use]
    pub fn with_sequence_index(mut self, index: u64) -> Self {
        self.event_sequence_index = Some(index);
        self
    }

    /// Set the event payload (builder style).
    #[must_use]
    pub fn with_data(mut self, event_data: EventData) -> Self {
        self.event_data = event_data;
        self
    }

    /// Build a detector-generated event from the event that triggered it.
    ///
    /// Session, user, app, version, timestamp, and sequence index are copied
    /// from `trigger`; the new event is marked [`EventSource::Generated`].
    pub fn generated_from(
        trigger: &Self,
        event_name: impl Into<String>,
        event_data: EventData,
    ) -> Self {
        Self {
            event_name: event_name.into(),
            timestamp: trigger.timestamp,
            user_id: trigger.user_id.clone(),
            session_id: trigger.session_id.clone(),
            event_data,
            log_version: trigger.log_version.clone(),
            event_sequence_index: trigger.event_sequence_index,
            app_id: trigger.app_id.clone(),
            app_version: trigger.app_version.clone(),
            event_source: EventSource::Generated,
            game_state: trigger.game_state.clone(),
        }
    }

    /// Look up a key in the event payload.
    pub fn data(&self, key: &str) -> Option<&Value> {
        self.event_data.get(key)
    }
}
