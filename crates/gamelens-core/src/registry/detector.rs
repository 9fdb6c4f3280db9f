//! The detector registry.
//!
//! Detectors only watch events. Everything they emit goes to the single
//! [`TriggerCallback`] the registry was built with; the caller decides where
//! those events go next.

use core::fmt;
use std::sync::Arc;

use gamelens_types::{Event, ExtractionMode, FeatureData, IterationMode};
use indexmap::IndexMap;
use tracing::{info, warn};

use super::{
    EventDispatch, GeneratorRegistry, Listener, RegistryState, check_registration, plan_instances,
    select_candidates,
};
use crate::config::GameConfig;
use crate::detector::{Detector, TriggerCallback};
use crate::error::RegistryError;
use crate::generator::Generator;
use crate::loader::GeneratorLoader;

/// Owns the detectors of one unit.
pub struct DetectorRegistry {
    state: RegistryState,
    iteration_modes: Vec<IterationMode>,
    dispatch: EventDispatch,
    detectors: IndexMap<String, Detector>,
    trigger_callback: TriggerCallback,
}

impl DetectorRegistry {
    /// An empty registry for `mode`. Every loaded detector reports through
    /// `trigger_callback`.
    pub fn new(mode: ExtractionMode, trigger_callback: TriggerCallback) -> Self {
        Self {
            state: RegistryState::Created,
            iteration_modes: IterationMode::ALL.to_vec(),
            dispatch: EventDispatch::new(mode),
            detectors: IndexMap::new(),
            trigger_callback,
        }
    }

    /// Restrict loading to some iteration maps (builder style).
    #[must_use]
    pub fn with_iteration_modes(mut self, iteration_modes: &[IterationMode]) -> Self {
        self.iteration_modes = iteration_modes.to_vec();
        self
    }

    /// The callback handed to loaded detectors.
    pub fn trigger_callback(&self) -> TriggerCallback {
        Arc::clone(&self.trigger_callback)
    }

    /// Look up a detector by name.
    pub fn get(&self, name: &str) -> Option<&Detector> {
        self.detectors.get(name)
    }

    /// Stop accepting events. Detectors have nothing to harvest, so this
    /// is the end of their life cycle.
    pub const fn finalize(&mut self) {
        self.state = RegistryState::Finalized;
    }

    /// Events emitted so far, across all detectors.
    pub fn triggered(&self) -> u64 {
        self.detectors
            .values()
            .fold(0, |total, detector| total.saturating_add(detector.triggered()))
    }
}

impl GeneratorRegistry for DetectorRegistry {
    type Generator = Detector;

    fn mode(&self) -> ExtractionMode {
        self.dispatch.mode()
    }

    fn state(&self) -> RegistryState {
        self.state
    }

    fn register(
        &mut self,
        detector: Detector,
        iteration_mode: IterationMode,
    ) -> Result<(), RegistryError> {
        let mode = self.mode();
        let name = detector.name().to_owned();
        check_registration(&detector, mode, self.detectors.contains_key(&name))?;
        let listener = Listener::new(name.clone(), iteration_mode);
        self.dispatch
            .subscribe(&listener, &detector.event_dependencies(mode));
        self.detectors.insert(name, detector);
        Ok(())
    }

    fn generators(&self) -> Vec<&Detector> {
        self.detectors.values().collect()
    }

    fn load_from_schema(
        &mut self,
        config: &GameConfig,
        loader: &GeneratorLoader,
        overrides: Option<&[String]>,
    ) -> Result<usize, RegistryError> {
        if self.state != RegistryState::Created {
            return Err(RegistryError::AlreadyLoaded { state: self.state });
        }
        let mode = self.mode();
        let candidates =
            select_candidates(&config.detectors, mode, &self.iteration_modes, overrides);

        let mut registered: usize = 0;
        for planned in plan_instances(config, &candidates) {
            let Some(detector) = loader.load_detector(
                &planned.config.type_name,
                &planned.name,
                &planned.config.loader_args(),
                self.trigger_callback(),
                planned.count_index,
            ) else {
                continue;
            };
            let detector = detector.with_base_name(&planned.config.name);
            self.register(detector, planned.iteration_mode)?;
            registered = registered.saturating_add(1);
        }

        self.state = RegistryState::Loaded;
        info!(game = %config.game_id, %mode, registered, "detector registry loaded");
        Ok(registered)
    }

    fn update_from_event(&mut self, event: &Event) {
        if self.state == RegistryState::Finalized {
            warn!(event = %event.event_name, "event after finalize; ignored");
            return;
        }
        self.state = RegistryState::Streaming;
        for listener in self.dispatch.listeners_for(&event.event_name) {
            if let Some(detector) = self.detectors.get_mut(&listener.generator_name) {
                detector.update_from_event(event);
            }
        }
    }

    fn update_from_feature_data(&mut self, _feature: &FeatureData) {}
}

impl fmt::Display for DetectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary(None))
    }
}

impl fmt::Debug for DetectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorRegistry")
            .field("state", &self.state)
            .field("dispatch", &self.dispatch)
            .field("detectors", &self.detectors)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;

    use super::*;

    const YAML: &str = r"
game_id: TEST_GAME
quiz_range: { min: 0, max: 2 }
detectors:
  aggregate:
    Idle: { type: IdleGap, enabled: [DETECTOR], threshold_seconds: 10 }
    Broken: { type: NotAType, enabled: [DETECTOR] }
  iterated:
    QuizIdle: { type: IdleGap, enabled: [DETECTOR], count: quiz_range, prefix: q, threshold_seconds: 10 }
";

    fn make_registry(sink: &Arc<Mutex<Vec<Event>>>) -> DetectorRegistry {
        let sink = Arc::clone(sink);
        DetectorRegistry::new(
            ExtractionMode::Detector,
            Arc::new(move |event: Event| sink.lock().push(event)),
        )
    }

    fn make_event(name: &str, second: u32) -> Event {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, second).unwrap();
        Event::new(name, ts, "s1").with_log_version("1")
    }

    #[test]
    fn loads_enabled_detectors_and_skips_unknown_types() {
        let config = GameConfig::parse_yaml(YAML).unwrap();
        let loader = GeneratorLoader::builtin_only(ExtractionMode::Detector);
        let sink = Arc::new(Mutex::new(Vec::new()));
        let mut registry = make_registry(&sink);

        assert_eq!(registry.load_from_schema(&config, &loader, None).unwrap(), 3);
        assert_eq!(registry.generator_names(), vec!["Idle", "q0_QuizIdle", "q1_QuizIdle"]);
        assert_eq!(registry.get("q1_QuizIdle").unwrap().count_index(), Some(1));
        assert_eq!(registry.state(), RegistryState::Loaded);
    }

    #[test]
    fn aggregate_only_request_skips_iterated_detectors() {
        let config = GameConfig::parse_yaml(YAML).unwrap();
        let loader = GeneratorLoader::builtin_only(ExtractionMode::Detector);
        let sink = Arc::new(Mutex::new(Vec::new()));
        let mut registry = make_registry(&sink).with_iteration_modes(&[IterationMode::Aggregate]);

        assert_eq!(registry.load_from_schema(&config, &loader, None).unwrap(), 1);
        assert_eq!(registry.generator_names(), vec!["Idle"]);
    }

    #[test]
    fn overrides_choose_detectors() {
        let config = GameConfig::parse_yaml(YAML).unwrap();
        let loader = GeneratorLoader::builtin_only(ExtractionMode::Detector);
        let sink = Arc::new(Mutex::new(Vec::new()));
        let mut registry = make_registry(&sink);
        let overrides = vec!["QuizIdle".to_owned()];

        registry
            .load_from_schema(&config, &loader, Some(&overrides))
            .unwrap();
        assert_eq!(registry.generator_names(), vec!["q0_QuizIdle", "q1_QuizIdle"]);
    }

    #[test]
    fn every_detector_reports_through_the_shared_callback() {
        let config = GameConfig::parse_yaml(YAML).unwrap();
        let loader = GeneratorLoader::builtin_only(ExtractionMode::Detector);
        let sink = Arc::new(Mutex::new(Vec::new()));
        let mut registry = make_registry(&sink);
        registry.load_from_schema(&config, &loader, None).unwrap();

        registry.update_from_event(&make_event("a", 0));
        registry.update_from_event(&make_event("b", 30));

        assert_eq!(sink.lock().len(), 3);
        assert_eq!(registry.triggered(), 3);
        assert_eq!(registry.state(), RegistryState::Streaming);
    }

    #[test]
    fn finalized_registry_ignores_events() {
        let config = GameConfig::parse_yaml(YAML).unwrap();
        let loader = GeneratorLoader::builtin_only(ExtractionMode::Detector);
        let sink = Arc::new(Mutex::new(Vec::new()));
        let mut registry = make_registry(&sink);
        registry.load_from_schema(&config, &loader, None).unwrap();
        registry.update_from_event(&make_event("a", 0));
        registry.finalize();

        registry.update_from_event(&make_event("b", 30));
        assert!(sink.lock().is_empty());
        assert_eq!(registry.triggered(), 0);
        assert_eq!(registry.state(), RegistryState::Finalized);
    }

    #[test]
    fn iterated_detectors_keep_their_base_name() {
        let config = GameConfig::parse_yaml(YAML).unwrap();
        let loader = GeneratorLoader::builtin_only(ExtractionMode::Detector);
        let sink = Arc::new(Mutex::new(Vec::new()));
        let mut registry = make_registry(&sink);
        registry.load_from_schema(&config, &loader, None).unwrap();

        assert_eq!(registry.get("q1_QuizIdle").unwrap().base_name(), "QuizIdle");
        assert_eq!(registry.get("Idle").unwrap().base_name(), "Idle");
    }

    #[test]
    fn feature_data_is_ignored() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let mut registry = make_registry(&sink);
        registry.update_from_feature_data(&FeatureData {
            name: "X".to_owned(),
            base_name: "X".to_owned(),
            generator_type_name: "CountEvent".to_owned(),
            count_index: None,
            column_names: Vec::new(),
            values: Vec::new(),
            extraction_mode: ExtractionMode::Session,
            player_id: None,
            session_id: None,
        });
        assert!(registry.is_empty());
        assert_eq!(registry.state(), RegistryState::Created);
    }
}
