//! `Timespan`: seconds from the first start event to the last end event.
//!
//! Args: `start_event`, `end_event` (each default `"NO EVENT"`). Reports `0`
//! until both have been seen.

use chrono::{DateTime, Utc};
use gamelens_types::feature::total_seconds;
use gamelens_types::{Event, ExtractionMode, FeatureValue};
use tracing::warn;

use crate::error::GeneratorError;
use crate::extractor::Feature;
use crate::generator::{GeneratorArgs, GeneratorDescriptor, GeneratorParameters, str_arg};

/// Registered type name.
pub const TYPE_NAME: &str = "Timespan";

const NO_EVENT: &str = "NO EVENT";

/// Descriptor for the built-in table.
pub fn descriptor() -> GeneratorDescriptor {
    GeneratorDescriptor::feature(TYPE_NAME, span_events, build)
}

fn span_events(args: &GeneratorArgs, _mode: ExtractionMode) -> Vec<String> {
    vec![
        str_arg(args, "start_event").unwrap_or(NO_EVENT).to_owned(),
        str_arg(args, "end_event").unwrap_or(NO_EVENT).to_owned(),
    ]
}

fn build(
    params: &GeneratorParameters,
    args: &GeneratorArgs,
) -> Result<Box<dyn Feature>, GeneratorError> {
    if let Some(index) = params.count_index().filter(|index| *index != 0) {
        warn!(generator = params.name(), index, "timespan got a non-zero count index");
    }
    Ok(Box::new(Timespan {
        name: params.name().to_owned(),
        start_event: str_arg(args, "start_event").unwrap_or(NO_EVENT).to_owned(),
        end_event: str_arg(args, "end_event").unwrap_or(NO_EVENT).to_owned(),
        start: None,
        end: None,
    }))
}

struct Timespan {
    name: String,
    start_event: String,
    end_event: String,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl Feature for Timespan {
    fn update_from_event(&mut self, event: &Event) {
        if event.event_name == self.start_event {
            if let Some(start) = self.start {
                warn!(
                    generator = %self.name,
                    after_seconds = total_seconds(event.timestamp.signed_duration_since(start)),
                    "repeated start event; keeping the first"
                );
            } else {
                self.start = Some(event.timestamp);
            }
        } else if event.event_name == self.end_event {
            match self.start {
                None => warn!(generator = %self.name, "end event before any start event; ignored"),
                Some(start) if event.timestamp < start => {
                    warn!(generator = %self.name, "end event timestamp precedes start; ignored");
                }
                Some(_) => {
                    if let Some(end) = self.end {
                        let gap = event.timestamp.signed_duration_since(end);
                        warn!(
                            generator = %self.name,
                            after_seconds = total_seconds(gap),
                            "repeated end event; using the later one"
                        );
                    }
                    self.end = Some(event.timestamp);
                }
            }
        }
    }

    fn feature_values(&self) -> Vec<FeatureValue> {
        let seconds = match (self.start, self.end) {
            (Some(start), Some(end)) => total_seconds(end.signed_duration_since(start)),
            _ => 0.0,
        };
        vec![FeatureValue::Float(seconds)]
    }
}
