//! Runs one analysis unit end to end.
//!
//! A [`UnitProcessor`] loads an [`ExtractorRegistry`] (and optionally a
//! [`DetectorRegistry`]), streams the unit's events through them in order,
//! and on [`UnitProcessor::finish`] performs the two-tier harvest: first
//! order features are harvested, fed to the second-order features that
//! depend on them, and then the second order is harvested.

use std::sync::Arc;

use gamelens_types::{Event, ExtractionMode, FeatureData, FeatureValue};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::error::RegistryError;
use crate::loader::GeneratorLoader;
use crate::registry::{DetectorRegistry, ExtractorRegistry, FeatureOrder, GeneratorRegistry};

/// Everything harvested from one unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitOutput {
    /// Player the unit belongs to, if any.
    pub player_id: Option<String>,
    /// Session the unit belongs to, if any.
    pub session_id: Option<String>,
    /// One envelope per extractor, first order then second.
    pub feature_data: Vec<FeatureData>,
    /// Column names, aligned with `values`.
    pub names: Vec<String>,
    /// Flattened values of every extractor.
    pub values: Vec<FeatureValue>,
    /// Events fed to the extractors, detector output included.
    pub events_processed: u64,
}

struct DetectorStage {
    registry: DetectorRegistry,
    queue: Arc<Mutex<Vec<Event>>>,
}

/// Drives one unit through loading, streaming, and the two-tier harvest.
pub struct UnitProcessor {
    extractors: ExtractorRegistry,
    detectors: Option<DetectorStage>,
    player_id: Option<String>,
    session_id: Option<String>,
    events_processed: u64,
}

impl UnitProcessor {
    /// Load the extractors for a unit. `overrides`, when given, names the
    /// only features to load (plus their direct dependencies).
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] if a loaded generator cannot be
    /// registered.
    pub fn new(
        config: &GameConfig,
        loader: &GeneratorLoader,
        mode: ExtractionMode,
        overrides: Option<&[String]>,
        player_id: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<Self, RegistryError> {
        let loader = loader.for_mode(mode);
        let mut extractors = ExtractorRegistry::new(mode);
        extractors.load_from_schema(config, &loader, overrides)?;
        Ok(Self {
            extractors,
            detectors: None,
            player_id: player_id.map(str::to_owned),
            session_id: session_id.map(str::to_owned),
            events_processed: 0,
        })
    }

    /// Also run the configured detectors. Their output is fed to the
    /// extractors right after the event that triggered it.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] if a loaded detector cannot be
    /// registered.
    pub fn with_detectors(
        mut self,
        config: &GameConfig,
        loader: &GeneratorLoader,
    ) -> Result<Self, RegistryError> {
        let queue = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&queue);
        let mut registry = DetectorRegistry::new(
            ExtractionMode::Detector,
            Arc::new(move |event: Event| sink.lock().push(event)),
        );
        registry.load_from_schema(config, &loader.for_mode(ExtractionMode::Detector), None)?;
        self.detectors = Some(DetectorStage { registry, queue });
        Ok(self)
    }

    /// The extractor registry.
    pub const fn extractors(&self) -> &ExtractorRegistry {
        &self.extractors
    }

    /// The detector registry, when detectors run.
    pub fn detectors(&self) -> Option<&DetectorRegistry> {
        self.detectors.as_ref().map(|stage| &stage.registry)
    }

    /// Feed one event, then whatever the detectors emitted in response.
    pub fn process_event(&mut self, event: &Event) {
        let generated = match &mut self.detectors {
            Some(stage) => {
                stage.registry.update_from_event(event);
                std::mem::take(&mut *stage.queue.lock())
            }
            None => Vec::new(),
        };
        self.feed(event);
        for event in &generated {
            debug!(event = %event.event_name, "feeding detector output");
            self.feed(event);
        }
    }

    /// Feed events in order.
    pub fn process_events<'a>(&mut self, events: impl IntoIterator<Item = &'a Event>) {
        for event in events {
            self.process_event(event);
        }
    }

    /// Harvest both tiers.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Generator`] if any extractor breaks its
    /// value count contract.
    pub fn finish(mut self) -> Result<UnitOutput, RegistryError> {
        let player_id = self.player_id.as_deref();
        let session_id = self.session_id.as_deref();
        let detector_events = self.detectors.as_mut().map_or(0, |stage| {
            stage.registry.finalize();
            stage.registry.triggered()
        });

        let mut feature_data = self
            .extractors
            .get_feature_data(FeatureOrder::First, player_id, session_id)?;
        for data in &feature_data {
            self.extractors.update_from_feature_data(data);
        }
        let second = self
            .extractors
            .get_feature_data(FeatureOrder::Second, player_id, session_id)?;
        feature_data.extend(second);

        let names = self.extractors.feature_names();
        let values = self.extractors.get_feature_values()?;
        info!(
            player = player_id.unwrap_or_default(),
            session = session_id.unwrap_or_default(),
            features = feature_data.len(),
            events = self.events_processed,
            detector_events,
            "unit finished"
        );
        Ok(UnitOutput {
            player_id: self.player_id.clone(),
            session_id: self.session_id.clone(),
            feature_data,
            names,
            values,
            events_processed: self.events_processed,
        })
    }

    fn feed(&mut self, event: &Event) {
        self.extractors.update_from_event(event);
        self.events_processed = self.events_processed.saturating_add(1);
    }
}
