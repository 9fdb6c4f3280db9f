//! `CountEvent`: how many times one event occurred.
//!
//! Args: `target_event` (default `"NO EVENTS"`). A target of `all_events`
//! counts every event.

use gamelens_types::{Event, ExtractionMode, FeatureValue};

use crate::error::GeneratorError;
use crate::extractor::Feature;
use crate::generator::{
    ALL_EVENTS, GeneratorArgs, GeneratorDescriptor, GeneratorParameters, str_arg,
};

/// Registered type name.
pub const TYPE_NAME: &str = "CountEvent";

const NO_EVENTS: &str = "NO EVENTS";

/// Descriptor for the built-in table.
pub fn descriptor() -> GeneratorDescriptor {
    GeneratorDescriptor::feature(TYPE_NAME, target_events, build)
}

fn target(args: &GeneratorArgs) -> &str {
    str_arg(args, "target_event").unwrap_or(NO_EVENTS)
}

fn target_events(args: &GeneratorArgs, _mode: ExtractionMode) -> Vec<String> {
    vec![target(args).to_owned()]
}

fn build(
    _params: &GeneratorParameters,
    args: &GeneratorArgs,
) -> Result<Box<dyn Feature>, GeneratorError> {
    Ok(Box::new(CountEvent {
        target: target(args).to_owned(),
        count: 0,
    }))
}

struct CountEvent {
    target: String,
    count: i64,
}

impl Feature for CountEvent {
    fn update_from_event(&mut self, event: &Event) {
        if self.target == ALL_EVENTS || event.event_name == self.target {
            self.count = self.count.saturating_add(1);
        }
    }

    fn feature_values(&self) -> Vec<FeatureValue> {
        vec![FeatureValue::Int(self.count)]
    }
}
