//! `StopwatchTimer`: time accumulated while a virtual stopwatch runs.
//!
//! Args: `start_event` and `end_event` start and stop the watch.
//! `ignore_events` break the running interval without stopping the watch
//! (time before them is not counted). `reset_events` both break the interval
//! and stop the watch. Only game-sourced events advance the clock; detector
//! output can still start or stop it.

use chrono::{DateTime, TimeDelta, Utc};
use gamelens_types::feature::total_seconds;
use gamelens_types::{Event, EventSource, ExtractionMode, FeatureValue};
use tracing::warn;

use crate::error::GeneratorError;
use crate::extractor::Feature;
use crate::generator::{
    ALL_EVENTS, GeneratorArgs, GeneratorDescriptor, GeneratorParameters, str_arg, str_list_arg,
};

/// Registered type name.
pub const TYPE_NAME: &str = "StopwatchTimer";

const NO_EVENT: &str = "NO EVENT";

/// Descriptor for the built-in table.
pub fn descriptor() -> GeneratorDescriptor {
    GeneratorDescriptor::feature(TYPE_NAME, every_event, build).with_min_version("1")
}

fn every_event(_args: &GeneratorArgs, _mode: ExtractionMode) -> Vec<String> {
    vec![ALL_EVENTS.to_owned()]
}

fn build(
    params: &GeneratorParameters,
    args: &GeneratorArgs,
) -> Result<Box<dyn Feature>, GeneratorError> {
    Ok(Box::new(Stopwatch {
        name: params.name().to_owned(),
        start_event: str_arg(args, "start_event").unwrap_or(NO_EVENT).to_owned(),
        end_event: str_arg(args, "end_event").unwrap_or(NO_EVENT).to_owned(),
        ignore_events: str_list_arg(args, "ignore_events"),
        reset_events: str_list_arg(args, "reset_events"),
        previous: None,
        total: TimeDelta::zero(),
        counting: false,
    }))
}

struct Stopwatch {
    name: String,
    start_event: String,
    end_event: String,
    ignore_events: Vec<String>,
    reset_events: Vec<String>,
    previous: Option<DateTime<Utc>>,
    total: TimeDelta,
    counting: bool,
}

impl Feature for Stopwatch {
    fn update_from_event(&mut self, event: &Event) {
        if event.event_source == EventSource::Game {
            if self.reset_events.contains(&event.event_name) {
                self.previous = None;
                self.counting = false;
            } else if self.ignore_events.contains(&event.event_name) {
                self.previous = None;
            }
            if let Some(previous) = self.previous.filter(|_| self.counting) {
                let step = event.timestamp.signed_duration_since(previous);
                if step < TimeDelta::zero() {
                    warn!(
                        generator = %self.name,
                        event = %event.event_name,
                        "event out of order; interval skipped"
                    );
                } else {
                    self.total = self.total.checked_add(&step).unwrap_or(TimeDelta::MAX);
                }
            }
            self.previous = Some(event.timestamp);
        }
        if event.event_name == self.start_event {
            self.counting = true;
        } else if event.event_name == self.end_event {
            self.counting = false;
        }
    }

    fn feature_values(&self) -> Vec<FeatureValue> {
        vec![
            FeatureValue::Duration(self.total),
            FeatureValue::Float(total_seconds(self.total)),
        ]
    }

    fn subfeatures(&self) -> Vec<String> {
        vec!["Seconds".to_owned()]
    }
}
