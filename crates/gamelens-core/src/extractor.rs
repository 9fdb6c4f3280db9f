//! Feature extractors.
//!
//! Per-game logic implements [`Feature`]: it accumulates state from events
//! (and, for second-order features, from other features' output) and reports
//! an ordered list of values. The engine wraps it in an [`Extractor`], which
//! owns the gating, naming, and memoization that every feature shares.

use core::fmt;
use std::sync::Arc;

use gamelens_types::{Event, FeatureData, FeatureValue, ModeSet};

use crate::error::GeneratorError;
use crate::generator::{
    Generator, GeneratorArgs, GeneratorCore, GeneratorDescriptor, GeneratorParameters,
};

/// Game-specific feature logic.
pub trait Feature: Send {
    /// React to an event that already passed version and name gating.
    fn update_from_event(&mut self, event: &Event);

    /// React to the output of a feature this one depends on.
    fn update_from_feature_data(&mut self, feature: &FeatureData) {
        let _ = feature;
    }

    /// Current values: the base value followed by one per subfeature.
    fn feature_values(&self) -> Vec<FeatureValue>;

    /// Names of the subfeatures reported after the base value.
    fn subfeatures(&self) -> Vec<String> {
        Vec::new()
    }

    /// Suffix appended to the instance name for the base column.
    fn base_feature_suffix(&self) -> &str {
        ""
    }
}

/// A [`Feature`] bound to its instance parameters, with a memoized value
/// cache.
pub struct Extractor {
    core: GeneratorCore,
    feature: Box<dyn Feature>,
    cache: Vec<FeatureValue>,
    up_to_date: bool,
}

impl Extractor {
    /// Wrap freshly constructed feature logic. The cache starts stale.
    pub fn new(
        params: GeneratorParameters,
        descriptor: Arc<GeneratorDescriptor>,
        args: GeneratorArgs,
        feature: Box<dyn Feature>,
    ) -> Self {
        Self {
            core: GeneratorCore::new(params, descriptor, args),
            feature,
            cache: Vec::new(),
            up_to_date: false,
        }
    }

    /// Record the configured name this instance was expanded from
    /// (builder style).
    #[must_use]
    pub fn with_base_name(mut self, base_name: &str) -> Self {
        self.core.set_base_name(base_name);
        self
    }

    /// Feed the output of a dependency. Not gated on version or name.
    pub fn update_from_feature_data(&mut self, feature: &FeatureData) {
        self.feature.update_from_feature_data(feature);
        self.up_to_date = false;
    }

    /// Column names: `{name}{suffix}` then `{name}-{subfeature}` for each
    /// subfeature.
    pub fn feature_names(&self) -> Vec<String> {
        let name = self.name();
        let mut names = vec![format!("{name}{}", self.feature.base_feature_suffix())];
        names.extend(
            self.feature
                .subfeatures()
                .iter()
                .map(|sub| format!("{name}-{sub}")),
        );
        names
    }

    /// Current values, recomputed only after an update.
    pub fn feature_values(&mut self) -> &[FeatureValue] {
        if !self.up_to_date {
            self.cache = self.feature.feature_values();
            self.up_to_date = true;
        }
        &self.cache
    }

    /// Current values, checked against [`Extractor::feature_names`].
    pub fn checked_feature_values(&mut self) -> Result<Vec<FeatureValue>, GeneratorError> {
        let names = self.feature_names().len();
        let values = self.feature_values().to_vec();
        if values.len() == names {
            Ok(values)
        } else {
            Err(GeneratorError::ValueCountMismatch {
                generator: self.name().to_owned(),
                names,
                values: values.len(),
            })
        }
    }

    /// Modes of dependency output this extractor reacts to.
    pub fn feature_dependency_modes(&self) -> ModeSet {
        self.core.descriptor().dependency_modes()
    }

    /// Package the current values into a [`FeatureData`] envelope.
    pub fn to_feature_data(
        &mut self,
        player_id: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<FeatureData, GeneratorError> {
        let values = self.checked_feature_values()?;
        Ok(FeatureData {
            name: self.name().to_owned(),
            base_name: self.base_name().to_owned(),
            generator_type_name: self.type_name().to_owned(),
            count_index: self.count_index(),
            column_names: self.feature_names(),
            values,
            extraction_mode: self.extraction_mode(),
            player_id: player_id.map(str::to_owned),
            session_id: session_id.map(str::to_owned),
        })
    }
}

impl Generator for Extractor {
    fn core(&self) -> &GeneratorCore {
        &self.core
    }

    fn update_from_event(&mut self, event: &Event) {
        if self.core.validate_event(event) {
            self.feature.update_from_event(event);
            self.up_to_date = false;
        }
    }
}

impl fmt::Display for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.name(), self.description())
    }
}

impl fmt::Debug for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extractor")
            .field("name", &self.name())
            .field("type_name", &self.type_name())
            .field("up_to_date", &self.up_to_date)
            .finish_non_exhaustive()
    }
}
