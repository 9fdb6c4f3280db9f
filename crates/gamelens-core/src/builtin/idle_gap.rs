//! `IdleGap`: emits an event whenever the pause between two consecutive
//! events exceeds a threshold.
//!
//! Args: `threshold_seconds` (default 60) and `event_name` (default
//! `"idle_gap"`). The emitted event carries `gap_seconds` and
//! `previous_event` in its data.

use chrono::{DateTime, Utc};
use gamelens_types::feature::total_seconds;
use gamelens_types::{Event, EventData, ExtractionMode};
use serde_json::Value;
use tracing::warn;

use crate::detector::DetectorLogic;
use crate::error::GeneratorError;
use crate::generator::{
    ALL_EVENTS, GeneratorArgs, GeneratorDescriptor, GeneratorParameters, f64_arg, str_arg,
};

/// Registered type name.
pub const TYPE_NAME: &str = "IdleGap";

const DEFAULT_THRESHOLD_SECONDS: f64 = 60.0;
const DEFAULT_EVENT_NAME: &str = "idle_gap";

/// Descriptor for the built-in table.
pub fn descriptor() -> GeneratorDescriptor {
    GeneratorDescriptor::detector(TYPE_NAME, every_event, build)
}

fn every_event(_args: &GeneratorArgs, _mode: ExtractionMode) -> Vec<String> {
    vec![ALL_EVENTS.to_owned()]
}

fn build(
    params: &GeneratorParameters,
    args: &GeneratorArgs,
) -> Result<Box<dyn DetectorLogic>, GeneratorError> {
    let invalid = |message: String| GeneratorError::InvalidArgs {
        generator: params.name().to_owned(),
        message,
    };
    let threshold = f64_arg(args, "threshold_seconds")
        .map_err(invalid)?
        .unwrap_or(DEFAULT_THRESHOLD_SECONDS);
    if threshold < 0.0 {
        return Err(invalid(format!("`threshold_seconds` must not be negative, got {threshold}")));
    }
    Ok(Box::new(IdleGap {
        name: params.name().to_owned(),
        threshold,
        event_name: str_arg(args, "event_name").unwrap_or(DEFAULT_EVENT_NAME).to_owned(),
        last: None,
        pending: None,
    }))
}

struct IdleGap {
    name: String,
    threshold: f64,
    event_name: String,
    last: Option<(DateTime<Utc>, String)>,
    pending: Option<(f64, String)>,
}

impl DetectorLogic for IdleGap {
    fn update(&mut self, event: &Event) {
        if let Some((previous, previous_name)) = self.last.take() {
            let gap = total_seconds(event.timestamp.signed_duration_since(previous));
            if gap < 0.0 {
                warn!(
                    detector = %self.name,
                    event = %event.event_name,
                    previous = %previous_name,
                    "event out of order"
                );
            } else if gap > self.threshold {
                self.pending = Some((gap, previous_name));
            }
        }
        self.last = Some((event.timestamp, event.event_name.clone()));
    }

    fn trigger_condition(&self) -> bool {
        self.pending.is_some()
    }

    fn trigger_event(&mut self, triggering_event: &Event) -> Event {
        let mut data = EventData::new();
        if let Some((gap, previous)) = self.pending.take() {
            data.insert("gap_seconds".to_owned(), Value::from(gap));
            data.insert("previous_event".to_owned(), Value::String(previous));
        }
        Event::generated_from(triggering_event, self.event_name.clone(), data)
    }
}
