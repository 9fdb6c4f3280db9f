//! Game generator configuration.
//!
//! Each game ships one configuration file naming the extractors and
//! detectors it wants, split into aggregate generators (one instance per
//! unit) and iterated generators (one instance per index of a count range).
//! Missing or malformed per-generator fields never fail the load: each is
//! replaced by its documented default and logged with a warning. Only an
//! unreadable or unparseable file is a [`ConfigError`].
//!
//! ```yaml
//! game_id: MY_GAME
//! level_range: { min: 0, max: 25 }
//! extractors:
//!   aggregate:
//!     SessionEventCount: { type: CountEvent, enabled: true, target_event: all_events }
//!   iterated:
//!     Score: { type: LevelScore, enabled: [SESSION], count: 3, prefix: lvl }
//! ```

use core::fmt;
use std::path::Path;

use gamelens_types::{ExtractionMode, IterationMode, ModeSet};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::generator::GeneratorArgs;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// Failed to parse JSON content.
    #[error("failed to parse config JSON: {source}")]
    Json {
        /// The underlying JSON parse error.
        source: serde_json::Error,
    },

    /// A generator table received the same type name twice.
    #[error("generator type `{type_name}` registered twice for game {game_id}")]
    DuplicateType {
        /// The repeated type name.
        type_name: String,
        /// The game whose table was being built.
        game_id: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(source: serde_json::Error) -> Self {
        Self::Json { source }
    }
}

const DEFAULT_GAME_ID: &str = "UNKNOWN GAME";
const DEFAULT_TYPE: &str = "UNKNOWN TYPE";
const DEFAULT_DESCRIPTION: &str = "No description";
const DEFAULT_RETURN_TYPE: &str = "str";
const DEFAULT_PREFIX: &str = "pre";
const DEFAULT_COUNT: u32 = 1;
const DEFAULT_RANGE_MAX: u32 = 1;
const LEVEL_RANGE: &str = "level_range";
const RANGE_SUFFIX: &str = "_range";

fn defaulted(generator: &str, field: &str, default: impl fmt::Display) {
    warn!(generator, field, %default, "config field missing or malformed; using default");
}

// ---------------------------------------------------------------------------
// Generator entries
// ---------------------------------------------------------------------------

/// Fields shared by every configured generator.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// Base name, the key in the configuration map.
    pub name: String,
    /// Generator kind, resolved through the loader's table.
    pub type_name: String,
    /// Modes this generator is enabled in.
    pub enabled: ModeSet,
    /// Human-readable description.
    pub description: String,
    /// Declared output type, informational.
    pub return_type: String,
    /// Every other key, handed to the generator's constructor.
    pub args: GeneratorArgs,
}

impl GeneratorConfig {
    /// Whether the generator is enabled for every mode in `modes`.
    pub const fn enabled_for(&self, modes: ModeSet) -> bool {
        self.enabled.is_superset_of(modes)
    }

    /// The arguments passed to the loader: [`GeneratorConfig::args`] plus
    /// the description, unless the args already carry one.
    pub fn loader_args(&self) -> GeneratorArgs {
        let mut args = self.args.clone();
        args.entry("description")
            .or_insert_with(|| Value::String(self.description.clone()));
        args
    }
}

/// How many instances an iterated generator gets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountSelector {
    /// Indices `0..n`.
    Count(u32),
    /// The indices of a named range such as `level_range`.
    Named(String),
}

impl fmt::Display for CountSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// An iterated generator: one instance per index, named
/// `{prefix}{index}_{name}`.
#[derive(Debug, Clone, PartialEq)]
pub struct IteratedConfig {
    /// The shared generator fields.
    pub generator: GeneratorConfig,
    /// Which indices to instantiate.
    pub count: CountSelector,
    /// Prefix of each instance name.
    pub prefix: String,
}

impl IteratedConfig {
    /// Display name of the instance at `index`.
    pub fn instance_name(&self, index: u32) -> String {
        format!("{}{index}_{}", self.prefix, self.generator.name)
    }
}

/// A borrowed view of either kind of entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeneratorEntry<'a> {
    /// One instance per unit.
    Aggregate(&'a GeneratorConfig),
    /// One instance per count index.
    Iterated(&'a IteratedConfig),
}

impl<'a> GeneratorEntry<'a> {
    /// The shared generator fields.
    pub const fn generator(self) -> &'a GeneratorConfig {
        match self {
            Self::Aggregate(config) => config,
            Self::Iterated(config) => &config.generator,
        }
    }

    /// Base name of the entry.
    pub fn name(self) -> &'a str {
        &self.generator().name
    }

    /// Which map the entry came from.
    pub const fn iteration_mode(self) -> IterationMode {
        match self {
            Self::Aggregate(_) => IterationMode::Aggregate,
            Self::Iterated(_) => IterationMode::Iterated,
        }
    }
}

/// The aggregate and iterated generators of one kind, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratorMap {
    /// One instance per unit.
    pub aggregate: IndexMap<String, GeneratorConfig>,
    /// One instance per count index.
    pub iterated: IndexMap<String, IteratedConfig>,
}

impl GeneratorMap {
    /// Every entry: aggregates first, each map in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = GeneratorEntry<'_>> {
        self.aggregate
            .values()
            .map(GeneratorEntry::Aggregate)
            .chain(self.iterated.values().map(GeneratorEntry::Iterated))
    }

    /// Entries from the requested iteration maps whose enablement covers
    /// every mode in `modes`.
    pub fn enabled(&self, iter_modes: &[IterationMode], modes: ModeSet) -> Vec<GeneratorEntry<'_>> {
        self.entries()
            .filter(|entry| iter_modes.contains(&entry.iteration_mode()))
            .filter(|entry| entry.generator().enabled_for(modes))
            .collect()
    }

    /// Look up an entry by base name in one iteration map.
    pub fn get(&self, name: &str, iter_mode: IterationMode) -> Option<GeneratorEntry<'_>> {
        match iter_mode {
            IterationMode::Aggregate => self.aggregate.get(name).map(GeneratorEntry::Aggregate),
            IterationMode::Iterated => self.iterated.get(name).map(GeneratorEntry::Iterated),
        }
    }

    /// Whether `name` exists in the given map and is enabled for `mode`.
    pub fn is_enabled(&self, name: &str, iter_mode: IterationMode, mode: ExtractionMode) -> bool {
        self.get(name, iter_mode)
            .is_some_and(|entry| entry.generator().enabled.has(mode))
    }

    /// Base names of every entry.
    pub fn names(&self) -> Vec<&str> {
        self.entries().map(GeneratorEntry::name).collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.aggregate.len().saturating_add(self.iterated.len())
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.aggregate.is_empty() && self.iterated.is_empty()
    }
}

// ---------------------------------------------------------------------------
// GameConfig
// ---------------------------------------------------------------------------

/// A half-open index range `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    /// First index.
    pub min: u32,
    /// One past the last index.
    pub max: u32,
}

impl IndexRange {
    /// The indices in the range, ascending. Empty when `max <= min`.
    pub fn indices(self) -> Vec<u32> {
        (self.min..self.max).collect()
    }
}

/// The generator configuration of one game.
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    /// Game identifier.
    pub game_id: String,
    /// The game's level range, if declared.
    pub level_range: Option<IndexRange>,
    /// Every other `*_range` declaration.
    pub other_ranges: IndexMap<String, IndexRange>,
    /// Feature extractors.
    pub extractors: GeneratorMap,
    /// Detectors.
    pub detectors: GeneratorMap,
    /// Top-level keys with no meaning to the engine.
    pub other_elements: Map<String, Value>,
}

impl GameConfig {
    /// Load configuration from a file: JSON when the extension is `.json`,
    /// YAML otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or a parse
    /// error if the content is not valid for its format.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::parse_json(&contents)
        } else {
            Self::parse_yaml(&contents)
        }
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let raw: RawGameConfig = serde_yml::from_str(yaml)?;
        Ok(Self::from_raw(raw))
    }

    /// Parse configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] if the string is not valid JSON.
    pub fn parse_json(json: &str) -> Result<Self, ConfigError> {
        let raw: RawGameConfig = serde_json::from_str(json)?;
        Ok(Self::from_raw(raw))
    }

    /// Enabled extractors from the requested iteration maps.
    pub fn enabled_extractors(
        &self,
        iter_modes: &[IterationMode],
        modes: ModeSet,
    ) -> Vec<GeneratorEntry<'_>> {
        self.extractors.enabled(iter_modes, modes)
    }

    /// Enabled detectors from the requested iteration maps.
    pub fn enabled_detectors(
        &self,
        iter_modes: &[IterationMode],
        modes: ModeSet,
    ) -> Vec<GeneratorEntry<'_>> {
        self.detectors.enabled(iter_modes, modes)
    }

    /// Whether the named extractor is enabled for `mode`.
    pub fn extractor_enabled(
        &self,
        name: &str,
        iter_mode: IterationMode,
        mode: ExtractionMode,
    ) -> bool {
        self.extractors.is_enabled(name, iter_mode, mode)
    }

    /// Whether the named detector is enabled for `mode`.
    pub fn detector_enabled(
        &self,
        name: &str,
        iter_mode: IterationMode,
        mode: ExtractionMode,
    ) -> bool {
        self.detectors.is_enabled(name, iter_mode, mode)
    }

    /// Base names of every configured extractor.
    pub fn extractor_names(&self) -> Vec<&str> {
        self.extractors.names()
    }

    /// Base names of every configured detector.
    pub fn detector_names(&self) -> Vec<&str> {
        self.detectors.names()
    }

    /// Resolve a count selector to instance indices.
    ///
    /// A name is looked up as `level_range`, then as a configured `*_range`
    /// (both half-open), then as a `{min, max}` map among the other
    /// top-level elements, whose `max` is inclusive. Anything else yields no
    /// indices and a warning.
    pub fn get_count_range(&self, selector: &CountSelector) -> Vec<u32> {
        match selector {
            CountSelector::Count(n) => (0..*n).collect(),
            CountSelector::Named(name) => {
                let range = if name.eq_ignore_ascii_case(LEVEL_RANGE) {
                    self.level_range
                } else {
                    self.other_ranges.get(name.as_str()).copied()
                };
                if let Some(range) = range {
                    return range.indices();
                }
                self.other_elements
                    .get(name.as_str())
                    .and_then(inclusive_indices)
                    .unwrap_or_else(|| {
                        warn!(
                            game = %self.game_id,
                            range = %name,
                            "unknown count range; no instances"
                        );
                        Vec::new()
                    })
            }
        }
    }

    fn from_raw(raw: RawGameConfig) -> Self {
        let game_id = raw.game_id.unwrap_or_else(|| {
            defaulted("<game>", "game_id", DEFAULT_GAME_ID);
            DEFAULT_GAME_ID.to_owned()
        });

        let mut level_range = None;
        let mut other_ranges = IndexMap::new();
        let mut other_elements = Map::new();
        for (key, value) in raw.other {
            if key.eq_ignore_ascii_case(LEVEL_RANGE) {
                level_range = parse_range(&key, &value, None);
            } else if key.ends_with(RANGE_SUFFIX) {
                if let Some(range) = parse_range(&key, &value, Some(DEFAULT_RANGE_MAX)) {
                    other_ranges.insert(key, range);
                }
            } else {
                other_elements.insert(key, value);
            }
        }

        Self {
            game_id,
            level_range,
            other_ranges,
            extractors: raw.extractors.unwrap_or_default().resolve(),
            detectors: raw.detectors.unwrap_or_default().resolve(),
            other_elements,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw (on-disk) shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawGameConfig {
    #[serde(default)]
    game_id: Option<String>,
    #[serde(default)]
    extractors: Option<RawGeneratorMap>,
    #[serde(default)]
    detectors: Option<RawGeneratorMap>,
    #[serde(flatten)]
    other: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawGeneratorMap {
    #[serde(default)]
    aggregate: Option<IndexMap<String, RawGeneratorConfig>>,
    #[serde(default, alias = "per_count", alias = "percount")]
    iterated: Option<IndexMap<String, RawGeneratorConfig>>,
}

#[derive(Debug, Deserialize)]
struct RawGeneratorConfig {
    #[serde(default, rename = "type")]
    type_name: Option<String>,
    #[serde(default)]
    enabled: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    return_type: Option<String>,
    #[serde(default)]
    count: Option<Value>,
    #[serde(default)]
    prefix: Option<String>,
    #[serde(flatten)]
    args: Map<String, Value>,
}

impl RawGeneratorMap {
    fn resolve(self) -> GeneratorMap {
        let aggregate = self
            .aggregate
            .unwrap_or_default()
            .into_iter()
            .map(|(name, raw)| {
                let config = raw.into_aggregate(&name);
                (name, config)
            })
            .collect();
        let iterated = self
            .iterated
            .unwrap_or_default()
            .into_iter()
            .map(|(name, raw)| {
                let config = raw.into_iterated(&name);
                (name, config)
            })
            .collect();
        GeneratorMap {
            aggregate,
            iterated,
        }
    }
}

impl RawGeneratorConfig {
    fn into_aggregate(mut self, name: &str) -> GeneratorConfig {
        // Iteration keys mean nothing to an aggregate; keep them as args.
        if let Some(count) = self.count.take() {
            self.args.insert("count".to_owned(), count);
        }
        if let Some(prefix) = self.prefix.take() {
            self.args.insert("prefix".to_owned(), Value::String(prefix));
        }
        self.into_generator(name)
    }

    fn into_iterated(mut self, name: &str) -> IteratedConfig {
        let count = parse_count(name, self.count.take().as_ref());
        let prefix = self.prefix.take().unwrap_or_else(|| {
            defaulted(name, "prefix", DEFAULT_PREFIX);
            DEFAULT_PREFIX.to_owned()
        });
        IteratedConfig {
            generator: self.into_generator(name),
            count,
            prefix,
        }
    }

    fn into_generator(self, name: &str) -> GeneratorConfig {
        let type_name = self.type_name.unwrap_or_else(|| {
            defaulted(name, "type", DEFAULT_TYPE);
            DEFAULT_TYPE.to_owned()
        });
        let description = self.description.unwrap_or_else(|| {
            defaulted(name, "description", DEFAULT_DESCRIPTION);
            DEFAULT_DESCRIPTION.to_owned()
        });
        let return_type = self.return_type.unwrap_or_else(|| {
            defaulted(name, "return_type", DEFAULT_RETURN_TYPE);
            DEFAULT_RETURN_TYPE.to_owned()
        });
        GeneratorConfig {
            name: name.to_owned(),
            type_name,
            enabled: parse_enabled(name, self.enabled),
            description,
            return_type,
            args: self.args,
        }
    }
}

fn parse_enabled(name: &str, value: Option<Value>) -> ModeSet {
    match value {
        Some(Value::Bool(true)) => ModeSet::all(),
        Some(Value::Bool(false)) => ModeSet::empty(),
        Some(Value::String(mode)) => parse_modes(name, &[Value::String(mode)]),
        Some(Value::Array(modes)) => parse_modes(name, &modes),
        _ => {
            defaulted(name, "enabled", ModeSet::all());
            ModeSet::all()
        }
    }
}

fn parse_modes(name: &str, modes: &[Value]) -> ModeSet {
    modes
        .iter()
        .filter_map(|value| {
            let parsed = value.as_str().map(str::parse::<ExtractionMode>);
            if let Some(Ok(mode)) = parsed {
                Some(mode)
            } else {
                warn!(generator = name, mode = %value, "unrecognized extraction mode; ignored");
                None
            }
        })
        .collect()
}

/// Integers count instances; every string names a range, even a numeric one.
fn parse_count(name: &str, value: Option<&Value>) -> CountSelector {
    let parsed = match value {
        Some(Value::Number(n)) => {
            n.as_u64().and_then(|n| u32::try_from(n).ok()).map(CountSelector::Count)
        }
        Some(Value::String(s)) => Some(CountSelector::Named(s.clone())),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        defaulted(name, "count", DEFAULT_COUNT);
        CountSelector::Count(DEFAULT_COUNT)
    })
}

fn inclusive_indices(value: &Value) -> Option<Vec<u32>> {
    let bound = |field: &str| {
        value
            .get(field)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    };
    let max = bound("max")?;
    Some((bound("min").unwrap_or(0)..=max).collect())
}

fn parse_range(key: &str, value: &Value, default_max: Option<u32>) -> Option<IndexRange> {
    let bound = |field: &str| {
        value
            .get(field)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    };
    if !value.is_object() {
        warn!(range = key, %value, "range is not a {{min, max}} map; ignored");
        return None;
    }
    let min = bound("min").unwrap_or_else(|| {
        defaulted(key, "min", 0);
        0
    });
    let max = match (bound("max"), default_max) {
        (Some(max), _) => max,
        (None, Some(default)) => {
            defaulted(key, "max", default);
            default
        }
        (None, None) => {
            warn!(range = key, "range has no usable max; ignored");
            return None;
        }
    };
    Some(IndexRange { min, max })
}
