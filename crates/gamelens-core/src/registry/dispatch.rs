//! The event dispatch table shared by both registries.

use gamelens_types::ExtractionMode;
use indexmap::IndexMap;

use super::Listener;
use crate::generator::ALL_EVENTS;

/// Event name to the listeners subscribed to it, in subscription order.
///
/// Always holds an [`ALL_EVENTS`] bucket. A generator whose dependencies
/// include the sentinel sits only in that bucket, so it is reached once per
/// event whatever the event's name.
#[derive(Debug, Clone)]
pub struct EventDispatch {
    mode: ExtractionMode,
    buckets: IndexMap<String, Vec<Listener>>,
}

impl EventDispatch {
    /// An empty table for `mode`.
    pub fn new(mode: ExtractionMode) -> Self {
        let mut buckets = IndexMap::new();
        buckets.insert(ALL_EVENTS.to_owned(), Vec::new());
        Self { mode, buckets }
    }

    /// The registry mode the table was built for.
    pub const fn mode(&self) -> ExtractionMode {
        self.mode
    }

    /// Subscribe `listener` to `events`.
    pub fn subscribe(&mut self, listener: &Listener, events: &[String]) {
        if events.iter().any(|event| event == ALL_EVENTS) {
            self.bucket_mut(ALL_EVENTS).push(listener.clone());
            return;
        }
        for event in events {
            let bucket = self.bucket_mut(event);
            if !bucket.contains(listener) {
                bucket.push(listener.clone());
            }
        }
    }

    /// Listeners for an event named `event_name`: its own bucket, then the
    /// all-events bucket.
    pub fn listeners_for<'a>(
        &'a self,
        event_name: &str,
    ) -> impl Iterator<Item = &'a Listener> + 'a {
        let named: &[Listener] = if event_name == ALL_EVENTS {
            &[]
        } else {
            self.bucket(event_name)
        };
        named.iter().chain(self.bucket(ALL_EVENTS))
    }

    /// The listeners of one bucket; empty when nobody subscribed.
    pub fn bucket(&self, event_name: &str) -> &[Listener] {
        self.buckets.get(event_name).map_or(&[][..], Vec::as_slice)
    }

    /// Event names with a bucket, in creation order.
    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    fn bucket_mut(&mut self, event_name: &str) -> &mut Vec<Listener> {
        self.buckets.entry(event_name.to_owned()).or_default()
    }
}
