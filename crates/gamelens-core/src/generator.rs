//! The generator contract shared by feature extractors and detectors.
//!
//! A generator kind is described statically by a [`GeneratorDescriptor`]:
//! which events it listens to, which other features it consumes, the log
//! versions it understands, and the modes it runs in. These are data, so the
//! registries can plan a run without constructing anything. An instance
//! carries its [`GeneratorParameters`] and the descriptor in a
//! [`GeneratorCore`], which performs the version and event-name gating every
//! kind shares.

use core::cmp::Ordering;
use core::fmt;
use std::sync::Arc;

use gamelens_types::{Event, ExtractionMode, ModeSet, compare_versions};
use serde_json::{Map, Value};
use tracing::debug;

use crate::detector::DetectorLogic;
use crate::error::GeneratorError;
use crate::extractor::Feature;

/// Reserved event name meaning "every event".
pub const ALL_EVENTS: &str = "all_events";

/// The non-standard elements of a generator's configuration, handed to the
/// kind's dependency filters and constructor.
pub type GeneratorArgs = Map<String, Value>;

/// Computes event or feature dependencies from arguments and mode.
pub type DependencyFilter = fn(&GeneratorArgs, ExtractionMode) -> Vec<String>;

/// Builds fresh feature logic for one instance.
pub type FeatureConstructor =
    fn(&GeneratorParameters, &GeneratorArgs) -> Result<Box<dyn Feature>, GeneratorError>;

/// Builds fresh detector logic for one instance.
pub type DetectorConstructor =
    fn(&GeneratorParameters, &GeneratorArgs) -> Result<Box<dyn DetectorLogic>, GeneratorError>;

// ---------------------------------------------------------------------------
// GeneratorParameters
// ---------------------------------------------------------------------------

/// Identity of one generator instance. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorParameters {
    name: String,
    base_name: Option<String>,
    description: String,
    mode: ExtractionMode,
    count_index: Option<u32>,
}

impl GeneratorParameters {
    /// Create parameters for an instance.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        mode: ExtractionMode,
        count_index: Option<u32>,
    ) -> Self {
        Self {
            name: name.into(),
            base_name: None,
            description: description.into(),
            mode,
            count_index,
        }
    }

    /// Record the configured name an iterated instance was expanded from
    /// (builder style).
    #[must_use]
    pub fn with_base_name(mut self, base_name: impl Into<String>) -> Self {
        self.base_name = Some(base_name.into());
        self
    }

    /// Unique display name within a registry.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configured name before iteration expansion; the display name
    /// for aggregate instances.
    pub fn base_name(&self) -> &str {
        self.base_name.as_deref().unwrap_or(&self.name)
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The mode the instance was built for.
    pub const fn mode(&self) -> ExtractionMode {
        self.mode
    }

    /// The count index of an iterated instance.
    pub const fn count_index(&self) -> Option<u32> {
        self.count_index
    }
}

// ---------------------------------------------------------------------------
// GeneratorDescriptor
// ---------------------------------------------------------------------------

/// How a generator kind is constructed.
#[derive(Debug, Clone, Copy)]
pub enum Constructor {
    /// A feature extractor kind.
    Feature(FeatureConstructor),
    /// A detector kind.
    Detector(DetectorConstructor),
}

impl Constructor {
    /// `"feature"` or `"detector"`.
    pub const fn kind(self) -> &'static str {
        match self {
            Self::Feature(_) => "feature",
            Self::Detector(_) => "detector",
        }
    }
}

/// Static capabilities of a generator kind, queryable without an instance.
#[derive(Debug, Clone)]
pub struct GeneratorDescriptor {
    type_name: String,
    event_filter: DependencyFilter,
    feature_filter: DependencyFilter,
    min_version: Option<String>,
    max_version: Option<String>,
    available_modes: ModeSet,
    dependency_modes: Option<ModeSet>,
    constructor: Constructor,
}

const fn no_dependencies(_: &GeneratorArgs, _: ExtractionMode) -> Vec<String> {
    Vec::new()
}

impl GeneratorDescriptor {
    /// Describe a feature kind available in every feature mode.
    pub fn feature(
        type_name: impl Into<String>,
        event_filter: DependencyFilter,
        constructor: FeatureConstructor,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            event_filter,
            feature_filter: no_dependencies,
            min_version: None,
            max_version: None,
            available_modes: ModeSet::FEATURE_MODES,
            dependency_modes: None,
            constructor: Constructor::Feature(constructor),
        }
    }

    /// Describe a detector kind available in detector mode.
    pub fn detector(
        type_name: impl Into<String>,
        event_filter: DependencyFilter,
        constructor: DetectorConstructor,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            event_filter,
            feature_filter: no_dependencies,
            min_version: None,
            max_version: None,
            available_modes: ModeSet::DETECTOR,
            dependency_modes: None,
            constructor: Constructor::Detector(constructor),
        }
    }

    /// Declare the features this kind consumes (builder style).
    #[must_use]
    pub fn with_feature_filter(mut self, feature_filter: DependencyFilter) -> Self {
        self.feature_filter = feature_filter;
        self
    }

    /// Set the oldest log version this kind understands (builder style).
    #[must_use]
    pub fn with_min_version(mut self, version: impl Into<String>) -> Self {
        self.min_version = Some(version.into());
        self
    }

    /// Set the newest log version this kind understands (builder style).
    #[must_use]
    pub fn with_max_version(mut self, version: impl Into<String>) -> Self {
        self.max_version = Some(version.into());
        self
    }

    /// Replace the supported modes (builder style).
    #[must_use]
    pub fn with_modes(mut self, modes: ModeSet) -> Self {
        self.available_modes = modes;
        self
    }

    /// Restrict which modes of dependency output this kind reacts to
    /// (builder style).
    #[must_use]
    pub fn with_dependency_modes(mut self, modes: ModeSet) -> Self {
        self.dependency_modes = Some(modes);
        self
    }

    /// The kind's registered type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Event names (or [`ALL_EVENTS`]) the kind listens to, deduplicated.
    pub fn event_dependencies(&self, args: &GeneratorArgs, mode: ExtractionMode) -> Vec<String> {
        dedup((self.event_filter)(args, mode))
    }

    /// Feature names the kind consumes, deduplicated.
    pub fn feature_dependencies(&self, args: &GeneratorArgs, mode: ExtractionMode) -> Vec<String> {
        dedup((self.feature_filter)(args, mode))
    }

    /// Inclusive lower log-version bound.
    pub fn min_version(&self) -> Option<&str> {
        self.min_version.as_deref()
    }

    /// Inclusive upper log-version bound.
    pub fn max_version(&self) -> Option<&str> {
        self.max_version.as_deref()
    }

    /// Modes the kind can run in.
    pub const fn available_modes(&self) -> ModeSet {
        self.available_modes
    }

    /// Modes of dependency output the kind reacts to. Defaults to
    /// [`GeneratorDescriptor::available_modes`].
    pub fn dependency_modes(&self) -> ModeSet {
        self.dependency_modes.unwrap_or(self.available_modes)
    }

    /// Whether the kind runs in `mode`.
    pub const fn supports(&self, mode: ExtractionMode) -> bool {
        self.available_modes.has(mode)
    }

    /// The kind's constructor.
    pub const fn constructor(&self) -> Constructor {
        self.constructor
    }

    /// Whether an event with log version `version` is within bounds.
    ///
    /// A missing version never is. An unparseable version is accepted only
    /// when the kind declares no bounds.
    pub fn accepts_version(&self, version: Option<&str>) -> bool {
        let Some(version) = version else {
            return false;
        };
        if let Some(min) = self.min_version() {
            match compare_versions(version, min) {
                Some(Ordering::Less) => return false,
                None => {
                    debug!(
                        generator_type = %self.type_name,
                        %version,
                        %min,
                        "unparseable log version"
                    );
                    return false;
                }
                Some(_) => {}
            }
        }
        if let Some(max) = self.max_version() {
            match compare_versions(version, max) {
                Some(Ordering::Greater) => return false,
                None => {
                    debug!(
                        generator_type = %self.type_name,
                        %version,
                        %max,
                        "unparseable log version"
                    );
                    return false;
                }
                Some(_) => {}
            }
        }
        true
    }
}

fn dedup(names: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// GeneratorCore
// ---------------------------------------------------------------------------

/// State every generator instance carries: identity, kind, arguments, and
/// the event gate derived from them.
#[derive(Debug, Clone)]
pub struct GeneratorCore {
    params: GeneratorParameters,
    descriptor: Arc<GeneratorDescriptor>,
    args: GeneratorArgs,
    event_names: Vec<String>,
}

impl GeneratorCore {
    /// Bind parameters and arguments to a kind.
    pub fn new(
        params: GeneratorParameters,
        descriptor: Arc<GeneratorDescriptor>,
        args: GeneratorArgs,
    ) -> Self {
        let event_names = descriptor.event_dependencies(&args, params.mode());
        Self {
            params,
            descriptor,
            args,
            event_names,
        }
    }

    /// Instance parameters.
    pub const fn params(&self) -> &GeneratorParameters {
        &self.params
    }

    /// The kind's descriptor.
    pub fn descriptor(&self) -> &GeneratorDescriptor {
        &self.descriptor
    }

    /// Configuration arguments.
    pub const fn args(&self) -> &GeneratorArgs {
        &self.args
    }

    pub(crate) fn set_base_name(&mut self, base_name: &str) {
        self.params.base_name = Some(base_name.to_owned());
    }

    /// Whether the instance should see `event`: the log version is within
    /// the kind's bounds and the name is one of its event dependencies.
    pub fn validate_event(&self, event: &Event) -> bool {
        self.descriptor.accepts_version(event.log_version.as_deref())
            && self.listens_to(&event.event_name)
    }

    fn listens_to(&self, event_name: &str) -> bool {
        self.event_names
            .iter()
            .any(|name| name == ALL_EVENTS || name == event_name)
    }
}

// ---------------------------------------------------------------------------
// Generator trait
// ---------------------------------------------------------------------------

/// Common contract of [`Extractor`](crate::extractor::Extractor) and
/// [`Detector`](crate::detector::Detector).
pub trait Generator: fmt::Display + Send {
    /// Shared instance state.
    fn core(&self) -> &GeneratorCore;

    /// Feed one event. Events that fail [`GeneratorCore::validate_event`]
    /// are ignored.
    fn update_from_event(&mut self, event: &Event);

    /// Unique display name.
    fn name(&self) -> &str {
        self.core().params().name()
    }

    /// Configured name before iteration expansion.
    fn base_name(&self) -> &str {
        self.core().params().base_name()
    }

    /// Human-readable description.
    fn description(&self) -> &str {
        self.core().params().description()
    }

    /// The mode the instance was built for.
    fn extraction_mode(&self) -> ExtractionMode {
        self.core().params().mode()
    }

    /// The count index of an iterated instance.
    fn count_index(&self) -> Option<u32> {
        self.core().params().count_index()
    }

    /// The kind's type name.
    fn type_name(&self) -> &str {
        self.core().descriptor().type_name()
    }

    /// Modes the kind can run in.
    fn available_modes(&self) -> ModeSet {
        self.core().descriptor().available_modes()
    }

    /// Event names this instance listens to in `mode`.
    fn event_dependencies(&self, mode: ExtractionMode) -> Vec<String> {
        let core = self.core();
        core.descriptor().event_dependencies(core.args(), mode)
    }

    /// Feature names this instance consumes in `mode`.
    fn feature_dependencies(&self, mode: ExtractionMode) -> Vec<String> {
        let core = self.core();
        core.descriptor().feature_dependencies(core.args(), mode)
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

/// A string argument, if present and a string.
pub fn str_arg<'a>(args: &'a GeneratorArgs, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

/// A list-of-strings argument. A single string counts as a one-element list;
/// non-string items are skipped.
pub fn str_list_arg(args: &GeneratorArgs, key: &str) -> Vec<String> {
    match args.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect(),
        Some(Value::String(item)) => vec![item.clone()],
        _ => Vec::new(),
    }
}

/// A numeric argument. `Ok(None)` when absent; an error message when present
/// but not a number.
pub fn f64_arg(args: &GeneratorArgs, key: &str) -> Result<Option<f64>, String> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("`{key}` must be a number, got {value}")),
    }
}
