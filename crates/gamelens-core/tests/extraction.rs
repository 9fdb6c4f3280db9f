//! Integration tests for loading and running generators from a game
//! configuration.
//!
//! A small game table is built here with one game-specific feature
//! (`LevelScore`) and one deliberately broken feature, on top of the
//! built-in kinds the loader always falls back to.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::missing_panics_doc
)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use gamelens_core::config::GameConfig;
use gamelens_core::error::{GeneratorError, RegistryError};
use gamelens_core::extractor::{Extractor, Feature};
use gamelens_core::generator::{
    ALL_EVENTS, GeneratorArgs, GeneratorDescriptor, GeneratorParameters,
};
use gamelens_core::loader::{GeneratorLoader, GeneratorTable};
use gamelens_core::processor::UnitProcessor;
use gamelens_core::registry::{
    DetectorRegistry, ExtractorRegistry, FeatureOrder, GeneratorRegistry, RegistryState,
};
use gamelens_types::{Event, ExtractionMode, FeatureValue, IterationMode, ModeSet};
use parking_lot::Mutex;
use serde_json::{Map, json};

// ---------------------------------------------------------------------------
// Game-specific kinds
// ---------------------------------------------------------------------------

/// Sum of `score` over `level_complete` events for this instance's level.
struct LevelScore {
    level: u32,
    total: i64,
}

impl Feature for LevelScore {
    fn update_from_event(&mut self, event: &Event) {
        let level = event.data("level").and_then(serde_json::Value::as_u64);
        if level == Some(u64::from(self.level)) {
            let score = event
                .data("score")
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(0);
            self.total = self.total.saturating_add(score);
        }
    }

    fn feature_values(&self) -> Vec<FeatureValue> {
        vec![FeatureValue::Int(self.total)]
    }
}

fn level_events(_: &GeneratorArgs, _: ExtractionMode) -> Vec<String> {
    vec!["level_complete".to_owned()]
}

fn build_level_score(
    params: &GeneratorParameters,
    _: &GeneratorArgs,
) -> Result<Box<dyn Feature>, GeneratorError> {
    Ok(Box::new(LevelScore {
        level: params.count_index().unwrap_or(0),
        total: 0,
    }))
}

/// Declares a subfeature but never reports a value for it.
struct Lopsided;

impl Feature for Lopsided {
    fn update_from_event(&mut self, _event: &Event) {}

    fn feature_values(&self) -> Vec<FeatureValue> {
        vec![FeatureValue::Int(1)]
    }

    fn subfeatures(&self) -> Vec<String> {
        vec!["Missing".to_owned()]
    }
}

fn every_event(_: &GeneratorArgs, _: ExtractionMode) -> Vec<String> {
    vec![ALL_EVENTS.to_owned()]
}

fn build_lopsided(
    _: &GeneratorParameters,
    _: &GeneratorArgs,
) -> Result<Box<dyn Feature>, GeneratorError> {
    Ok(Box::new(Lopsided))
}

/// Appends `{tag}:{event}` to a shared log for every event it sees.
struct Tagger {
    tag: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl Feature for Tagger {
    fn update_from_event(&mut self, event: &Event) {
        self.log.lock().push(format!("{}:{}", self.tag, event.event_name));
    }

    fn feature_values(&self) -> Vec<FeatureValue> {
        vec![FeatureValue::Null]
    }
}

fn jump_events(_: &GeneratorArgs, _: ExtractionMode) -> Vec<String> {
    vec!["jump".to_owned()]
}

fn build_tagger(
    params: &GeneratorParameters,
    _: &GeneratorArgs,
) -> Result<Box<dyn Feature>, GeneratorError> {
    Err(GeneratorError::InvalidArgs {
        generator: params.name().to_owned(),
        message: "taggers are built directly".to_owned(),
    })
}

fn make_tagger(
    tag: &'static str,
    event_filter: fn(&GeneratorArgs, ExtractionMode) -> Vec<String>,
    log: &Arc<Mutex<Vec<String>>>,
) -> Extractor {
    Extractor::new(
        GeneratorParameters::new(tag, "", ExtractionMode::Session, None),
        Arc::new(GeneratorDescriptor::feature("Tagger", event_filter, build_tagger)),
        GeneratorArgs::new(),
        Box::new(Tagger {
            tag,
            log: Arc::clone(log),
        }),
    )
}

fn make_table() -> Arc<GeneratorTable> {
    let table = GeneratorTable::new("TEST_GAME")
        .with(GeneratorDescriptor::feature(
            "LevelScore",
            level_events,
            build_level_score,
        ))
        .unwrap()
        .with(
            GeneratorDescriptor::feature("Lopsided", every_event, build_lopsided)
                .with_modes(ModeSet::SESSION),
        )
        .unwrap();
    Arc::new(table)
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const CONFIG: &str = r"
game_id: TEST_GAME
level_range: { min: 0, max: 2 }
extractors:
  aggregate:
    EventCount:
      type: CountEvent
      enabled: [SESSION]
      target_event: all_events
    Completions:
      type: CountEvent
      enabled: [SESSION, PLAYER]
      target_event: level_complete
    FeatureA:
      type: EventRatio
      enabled: [SESSION]
      numerator: Completions
      denominator: EventCount
    Unrelated:
      type: CountEvent
      enabled: [SESSION]
      target_event: jump
  iterated:
    Score:
      type: LevelScore
      enabled: [SESSION]
      count: 3
      prefix: lvl
    LevelTotals:
      type: LevelScore
      enabled: [PLAYER]
      count: level_range
      prefix: level
detectors:
  iterated:
    Stalled:
      type: IdleGap
      enabled: [DETECTOR]
      count: 2
";

fn make_config() -> GameConfig {
    GameConfig::parse_yaml(CONFIG).unwrap()
}

fn make_event(name: &str, second: u32, data: &serde_json::Value) -> Event {
    let ts = Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, second).unwrap();
    let data: Map<String, serde_json::Value> = data.as_object().cloned().unwrap_or_default();
    Event::new(name, ts, "session-1")
        .with_user("player-1")
        .with_log_version("3")
        .with_data(data)
}

fn make_events() -> Vec<Event> {
    vec![
        make_event("level_start", 0, &json!({})),
        make_event("level_complete", 5, &json!({ "level": 0, "score": 10 })),
        make_event("level_complete", 9, &json!({ "level": 2, "score": 7 })),
        make_event("jump", 12, &json!({})),
        make_event("level_complete", 20, &json!({ "level": 0, "score": 5 })),
    ]
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn aggregate_event_count_sees_every_event() {
    let config = make_config();
    let loader = GeneratorLoader::new(make_table(), ExtractionMode::Session);
    let mut registry = ExtractorRegistry::new(ExtractionMode::Session);
    let overrides = vec!["EventCount".to_owned()];
    registry
        .load_from_schema(&config, &loader, Some(&overrides))
        .unwrap();

    for (i, name) in ["a", "b", "c", "d", "e"].into_iter().enumerate() {
        let second = u32::try_from(i).unwrap();
        registry.update_from_event(&make_event(name, second, &json!({})));
    }

    assert_eq!(registry.get_feature_values().unwrap(), vec![FeatureValue::Int(5)]);
}

#[test]
fn iterated_names_expand_with_prefix_and_index() {
    let config = make_config();
    let loader = GeneratorLoader::new(make_table(), ExtractionMode::Session);
    let mut registry = ExtractorRegistry::new(ExtractionMode::Session);
    let overrides = vec!["Score".to_owned()];
    registry
        .load_from_schema(&config, &loader, Some(&overrides))
        .unwrap();

    assert_eq!(
        registry.generator_names(),
        vec!["lvl0_Score", "lvl1_Score", "lvl2_Score"]
    );

    for event in &make_events() {
        registry.update_from_event(event);
    }
    let data = registry
        .get_feature_data(FeatureOrder::First, None, Some("session-1"))
        .unwrap();
    let scores: Vec<_> = data.iter().map(|d| d.values.clone()).collect();
    assert_eq!(
        scores,
        vec![
            vec![FeatureValue::Int(15)],
            vec![FeatureValue::Int(0)],
            vec![FeatureValue::Int(7)],
        ]
    );
    assert_eq!(data[2].count_index, Some(2));
}

#[test]
fn iterated_only_detector_is_not_loaded_for_aggregate_requests() {
    let config = make_config();
    assert!(
        config
            .enabled_detectors(&[IterationMode::Aggregate], ModeSet::DETECTOR)
            .is_empty()
    );

    let loader = GeneratorLoader::new(make_table(), ExtractionMode::Detector);
    let mut registry = DetectorRegistry::new(ExtractionMode::Detector, Arc::new(|_: Event| {}))
        .with_iteration_modes(&[IterationMode::Aggregate]);
    assert_eq!(registry.load_from_schema(&config, &loader, None).unwrap(), 0);

    let mut all = DetectorRegistry::new(ExtractionMode::Detector, Arc::new(|_: Event| {}));
    assert_eq!(all.load_from_schema(&config, &loader, None).unwrap(), 2);
    assert_eq!(all.generator_names(), vec!["pre0_Stalled", "pre1_Stalled"]);
}

#[test]
fn overrides_load_feature_and_direct_dependencies_only() {
    let config = make_config();
    let loader = GeneratorLoader::new(make_table(), ExtractionMode::Session);
    let mut registry = ExtractorRegistry::new(ExtractionMode::Session);
    let overrides = vec!["FeatureA".to_owned()];
    let loaded = registry
        .load_from_schema(&config, &loader, Some(&overrides))
        .unwrap();

    assert_eq!(loaded, 3);
    assert_eq!(
        registry.generator_names(),
        vec!["Completions", "EventCount", "FeatureA"]
    );
    assert_eq!(
        registry.first_orders_requested(),
        vec!["Completions", "EventCount"]
    );
}

#[test]
fn value_count_mismatch_fails_the_harvest() {
    let config = GameConfig::parse_yaml(
        "extractors:\n  aggregate:\n    Broken: { type: Lopsided, enabled: [SESSION] }\n",
    )
    .unwrap();
    let loader = GeneratorLoader::new(make_table(), ExtractionMode::Session);
    let mut registry = ExtractorRegistry::new(ExtractionMode::Session);
    registry.load_from_schema(&config, &loader, None).unwrap();

    assert_eq!(registry.feature_names(), vec!["Broken", "Broken-Missing"]);
    let err = registry.get_feature_values().unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Generator {
            source: GeneratorError::ValueCountMismatch { names: 2, values: 1, .. }
        }
    ));
}

#[test]
fn values_align_with_names() {
    let config = make_config();
    let loader = GeneratorLoader::new(make_table(), ExtractionMode::Session);
    let mut registry = ExtractorRegistry::new(ExtractionMode::Session);
    registry.load_from_schema(&config, &loader, None).unwrap();
    for event in &make_events() {
        registry.update_from_event(event);
    }

    let names = registry.feature_names();
    let first = registry.get_feature_values().unwrap();
    let second = registry.get_feature_values().unwrap();
    assert_eq!(first.len(), names.len());
    assert_eq!(first, second);
    assert_eq!(registry.state(), RegistryState::Finalized);
}

#[test]
fn player_mode_uses_level_range() {
    let config = make_config();
    let loader = GeneratorLoader::new(make_table(), ExtractionMode::Player);
    let mut processor = UnitProcessor::new(
        &config,
        &loader,
        ExtractionMode::Player,
        None,
        Some("player-1"),
        None,
    )
    .unwrap();
    processor.process_events(&make_events());
    let output = processor.finish().unwrap();

    assert_eq!(
        output.names,
        vec!["Completions", "level0_LevelTotals", "level1_LevelTotals"]
    );
    assert_eq!(
        output.values,
        vec![FeatureValue::Int(3), FeatureValue::Int(15), FeatureValue::Int(0)]
    );
    assert!(
        output
            .feature_data
            .iter()
            .all(|data| data.player_id.as_deref() == Some("player-1")
                && data.extraction_mode == ExtractionMode::Player)
    );
}

#[test]
fn session_run_with_detectors() {
    let config = make_config();
    let loader = GeneratorLoader::new(make_table(), ExtractionMode::Session);
    let mut processor = UnitProcessor::new(
        &config,
        &loader,
        ExtractionMode::Session,
        None,
        None,
        Some("session-1"),
    )
    .unwrap()
    .with_detectors(&config, &loader)
    .unwrap();
    processor.process_events(&make_events());
    // No gap in this session reaches the default 60s threshold.
    let detectors = processor.detectors().unwrap();
    assert_eq!(detectors.len(), 2);
    assert_eq!(detectors.triggered(), 0);
    let output = processor.finish().unwrap();
    assert_eq!(output.events_processed, 5);

    let event_count = output
        .feature_data
        .iter()
        .find(|data| data.name == "EventCount")
        .unwrap();
    assert_eq!(event_count.first_value(), Some(&FeatureValue::Int(5)));
    let ratio = output
        .feature_data
        .iter()
        .find(|data| data.name == "FeatureA")
        .unwrap();
    assert_eq!(ratio.first_value(), Some(&FeatureValue::Float(0.6)));
}

#[test]
fn listeners_run_once_each_in_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ExtractorRegistry::new(ExtractionMode::Session);
    for tagger in [
        make_tagger("First", jump_events, &log),
        make_tagger("Watcher", every_event, &log),
        make_tagger("Second", jump_events, &log),
    ] {
        registry.register(tagger, IterationMode::Aggregate).unwrap();
    }

    registry.update_from_event(&make_event("jump", 0, &json!({})));
    registry.update_from_event(&make_event("run", 1, &json!({})));

    assert_eq!(
        *log.lock(),
        vec!["First:jump", "Second:jump", "Watcher:jump", "Watcher:run"]
    );
}

#[test]
fn iterated_second_order_pairs_instances_by_index() {
    let config = GameConfig::parse_yaml(
        r"
extractors:
  aggregate:
    Completions: { type: CountEvent, enabled: [SESSION], target_event: level_complete }
  iterated:
    PointsPerCompletion:
      type: EventRatio
      enabled: [SESSION]
      count: 2
      prefix: lvl
      numerator: Points
      denominator: Completions
    Points: { type: LevelScore, enabled: [SESSION], count: 2, prefix: lvl }
",
    )
    .unwrap();
    let loader = GeneratorLoader::new(make_table(), ExtractionMode::Session);
    let overrides = vec!["PointsPerCompletion".to_owned(), "Completions".to_owned()];
    let mut processor = UnitProcessor::new(
        &config,
        &loader,
        ExtractionMode::Session,
        Some(&overrides),
        None,
        Some("session-1"),
    )
    .unwrap();

    assert_eq!(
        processor.extractors().generator_names(),
        vec![
            "Completions",
            "lvl0_Points",
            "lvl1_Points",
            "lvl0_PointsPerCompletion",
            "lvl1_PointsPerCompletion",
        ]
    );

    processor.process_events(&make_events());
    let output = processor.finish().unwrap();
    assert_eq!(
        output.values,
        vec![
            FeatureValue::Int(3),
            FeatureValue::Int(15),
            FeatureValue::Int(0),
            FeatureValue::Float(5.0),
            FeatureValue::Float(0.0),
        ]
    );
    let share = output
        .feature_data
        .iter()
        .find(|data| data.name == "lvl1_PointsPerCompletion")
        .unwrap();
    assert_eq!(share.base_name, "PointsPerCompletion");
    assert_eq!(share.count_index, Some(1));
}

#[test]
fn events_after_the_harvest_do_not_change_values() {
    let config = make_config();
    let loader = GeneratorLoader::new(make_table(), ExtractionMode::Session);
    let mut registry = ExtractorRegistry::new(ExtractionMode::Session);
    let overrides = vec!["EventCount".to_owned()];
    registry
        .load_from_schema(&config, &loader, Some(&overrides))
        .unwrap();
    registry.update_from_event(&make_event("jump", 0, &json!({})));
    assert_eq!(registry.get_feature_values().unwrap(), vec![FeatureValue::Int(1)]);

    registry.update_from_event(&make_event("jump", 1, &json!({})));
    assert_eq!(registry.state(), RegistryState::Finalized);
    assert_eq!(registry.get_feature_values().unwrap(), vec![FeatureValue::Int(1)]);
}
