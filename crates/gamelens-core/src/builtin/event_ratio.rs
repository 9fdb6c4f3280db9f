//! `EventRatio`: the ratio of two other features' first values.
//!
//! Args: `numerator` and `denominator`, each the name of a configured
//! feature. Second order: it listens to no events and is fed the two
//! features' output after the first-order harvest. Operands match either the
//! producer's display name or, for iterated producers, its configured base
//! name. Reports `Null` while the denominator is missing or zero.

use gamelens_types::{Event, ExtractionMode, FeatureData, FeatureValue};

use crate::error::GeneratorError;
use crate::extractor::Feature;
use crate::generator::{GeneratorArgs, GeneratorDescriptor, GeneratorParameters, str_arg};

/// Registered type name.
pub const TYPE_NAME: &str = "EventRatio";

/// Descriptor for the built-in table.
pub fn descriptor() -> GeneratorDescriptor {
    GeneratorDescriptor::feature(TYPE_NAME, no_events, build).with_feature_filter(operands)
}

const fn no_events(_args: &GeneratorArgs, _mode: ExtractionMode) -> Vec<String> {
    Vec::new()
}

fn operands(args: &GeneratorArgs, _mode: ExtractionMode) -> Vec<String> {
    ["numerator", "denominator"]
        .into_iter()
        .filter_map(|key| str_arg(args, key))
        .map(str::to_owned)
        .collect()
}

fn build(
    params: &GeneratorParameters,
    args: &GeneratorArgs,
) -> Result<Box<dyn Feature>, GeneratorError> {
    let operand = |key: &str| {
        str_arg(args, key)
            .map(str::to_owned)
            .ok_or_else(|| GeneratorError::InvalidArgs {
                generator: params.name().to_owned(),
                message: format!("missing `{key}` feature name"),
            })
    };
    Ok(Box::new(EventRatio {
        numerator_name: operand("numerator")?,
        denominator_name: operand("denominator")?,
        numerator: None,
        denominator: None,
    }))
}

struct EventRatio {
    numerator_name: String,
    denominator_name: String,
    numerator: Option<f64>,
    denominator: Option<f64>,
}

impl Feature for EventRatio {
    fn update_from_event(&mut self, _event: &Event) {}

    fn update_from_feature_data(&mut self, feature: &FeatureData) {
        let value = feature.first_value().and_then(FeatureValue::as_f64);
        let named = |name: &str| feature.name == name || feature.base_name == name;
        if named(&self.numerator_name) {
            self.numerator = value;
        }
        if named(&self.denominator_name) {
            self.denominator = value;
        }
    }

    fn feature_values(&self) -> Vec<FeatureValue> {
        let ratio = match (self.numerator, self.denominator) {
            (Some(numerator), Some(denominator)) if denominator.abs() > f64::EPSILON => {
                FeatureValue::Float(numerator / denominator)
            }
            _ => FeatureValue::Null,
        };
        vec![ratio]
    }
}
