//! Registries own the generators of one analysis unit and route events to
//! them.
//!
//! Both registries share the same life cycle and the same routing core:
//!
//! ```text
//! Created --load_from_schema--> Loaded --update_*--> Streaming --harvest--> Finalized
//!                                                        ^                      |
//!                                                        +---- order-2 feed ----+
//! ```
//!
//! Generators are stored by unique name; the [`EventDispatch`] table and the
//! feature table hold only [`Listener`] records and look generators up by
//! name when routing.

use core::fmt::{self, Write as _};

use gamelens_types::{Event, ExtractionMode, FeatureData, IterationMode, ModeSet};
use tracing::warn;

use crate::config::{GameConfig, GeneratorConfig, GeneratorEntry, GeneratorMap};
use crate::error::RegistryError;
use crate::generator::Generator;
use crate::loader::GeneratorLoader;

pub mod detector;
pub mod dispatch;
pub mod extractor;

pub use detector::DetectorRegistry;
pub use dispatch::EventDispatch;
pub use extractor::{ExtractorRegistry, FeatureOrder};

// ---------------------------------------------------------------------------
// Listener and state
// ---------------------------------------------------------------------------

/// A routing record: which generator to call, by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Listener {
    /// Unique name of the generator within its registry.
    pub generator_name: String,
    /// Whether the generator came from the aggregate or iterated map.
    pub iteration_mode: IterationMode,
}

impl Listener {
    /// Create a listener record.
    pub fn new(generator_name: impl Into<String>, iteration_mode: IterationMode) -> Self {
        Self {
            generator_name: generator_name.into(),
            iteration_mode,
        }
    }
}

impl fmt::Display for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.generator_name, self.iteration_mode)
    }
}

/// Where a registry is in its life cycle.
///
/// States only move forward. The one re-entry is the second-order feed:
/// [`GeneratorRegistry::update_from_feature_data`] after a first-order
/// harvest moves a registry back to `Streaming`. Events arriving after any
/// harvest are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// Constructed, nothing loaded yet.
    Created,
    /// Generators loaded from configuration.
    Loaded,
    /// Receiving events or dependency output.
    Streaming,
    /// Values harvested.
    Finalized,
}

// ---------------------------------------------------------------------------
// GeneratorRegistry trait
// ---------------------------------------------------------------------------

/// Routing and loading contract shared by [`ExtractorRegistry`] and
/// [`DetectorRegistry`].
pub trait GeneratorRegistry {
    /// The kind of generator the registry owns.
    type Generator: Generator;

    /// The registry's extraction mode.
    fn mode(&self) -> ExtractionMode;

    /// Current life-cycle state.
    fn state(&self) -> RegistryState;

    /// Take ownership of a generator and subscribe it to its events.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateGenerator`] if the name is taken,
    /// or a mode error if the generator cannot run in the registry's mode.
    fn register(
        &mut self,
        generator: Self::Generator,
        iteration_mode: IterationMode,
    ) -> Result<(), RegistryError>;

    /// Registered generators, in routing order.
    fn generators(&self) -> Vec<&Self::Generator>;

    /// Load every requested generator from `config`. `overrides`, when
    /// given, names the generators to load regardless of enablement.
    /// Returns how many instances were registered.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyLoaded`] outside the created state,
    /// or any [`GeneratorRegistry::register`] error. Generators the loader
    /// cannot construct are skipped.
    fn load_from_schema(
        &mut self,
        config: &GameConfig,
        loader: &GeneratorLoader,
        overrides: Option<&[String]>,
    ) -> Result<usize, RegistryError>;

    /// Route an event to its subscribers and every all-events subscriber.
    fn update_from_event(&mut self, event: &Event);

    /// Route a dependency's output to the features that consume it.
    fn update_from_feature_data(&mut self, feature: &FeatureData);

    /// Registered names, in routing order.
    fn generator_names(&self) -> Vec<String> {
        self.generators()
            .into_iter()
            .map(|generator| generator.name().to_owned())
            .collect()
    }

    /// Number of registered generators.
    fn len(&self) -> usize {
        self.generators().len()
    }

    /// Whether nothing is registered.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One `"{name} : {description}"` line per generator, cut to
    /// `max_lines` with a trailing count of the rest.
    fn summary(&self, max_lines: Option<usize>) -> String {
        let generators = self.generators();
        let limit = max_lines.unwrap_or(generators.len());
        let mut out = String::new();
        for (i, generator) in generators.iter().take(limit).enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let _ = write!(out, "{generator}");
        }
        let hidden = generators.len().saturating_sub(limit);
        if hidden > 0 {
            let _ = write!(out, "\n... and {hidden} more");
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Shared registration and planning
// ---------------------------------------------------------------------------

pub(crate) fn check_registration<G: Generator>(
    generator: &G,
    mode: ExtractionMode,
    name_taken: bool,
) -> Result<(), RegistryError> {
    if name_taken {
        return Err(RegistryError::DuplicateGenerator {
            generator: generator.name().to_owned(),
        });
    }
    if !generator.available_modes().has(mode) {
        return Err(RegistryError::ModeNotSupported {
            generator: generator.name().to_owned(),
            mode,
        });
    }
    if generator.extraction_mode() != mode {
        return Err(RegistryError::ModeMismatch {
            generator: generator.name().to_owned(),
            generator_mode: generator.extraction_mode(),
            registry_mode: mode,
        });
    }
    Ok(())
}

/// Entries a registry should load: the overrides that name configured
/// entries, or every entry enabled for `mode`. Only the requested iteration
/// maps are considered. Declaration order is kept.
pub(crate) fn select_candidates<'a>(
    map: &'a GeneratorMap,
    mode: ExtractionMode,
    iteration_modes: &[IterationMode],
    overrides: Option<&[String]>,
) -> Vec<GeneratorEntry<'a>> {
    let Some(overrides) = overrides else {
        return map.enabled(iteration_modes, ModeSet::of(mode));
    };
    for name in overrides {
        if !map.names().contains(&name.as_str()) {
            warn!(generator = %name, "requested generator is not configured; skipped");
        }
    }
    map.entries()
        .filter(|entry| iteration_modes.contains(&entry.iteration_mode()))
        .filter(|entry| overrides.iter().any(|name| name == entry.name()))
        .collect()
}

/// One generator instance to construct.
#[derive(Debug, Clone)]
pub(crate) struct PlannedInstance<'a> {
    pub name: String,
    pub count_index: Option<u32>,
    pub iteration_mode: IterationMode,
    pub config: &'a GeneratorConfig,
}

/// Expand entries into instances: one per aggregate, one per resolved count
/// index for each iterated entry. Aggregate entries come first, each map
/// sorted by configured name.
pub(crate) fn plan_instances<'a>(
    config: &GameConfig,
    entries: &[GeneratorEntry<'a>],
) -> Vec<PlannedInstance<'a>> {
    let mut entries = entries.to_vec();
    entries.sort_by(|a, b| (a.iteration_mode(), a.name()).cmp(&(b.iteration_mode(), b.name())));
    let mut planned = Vec::new();
    for entry in &entries {
        match *entry {
            GeneratorEntry::Aggregate(generator) => planned.push(PlannedInstance {
                name: generator.name.clone(),
                count_index: None,
                iteration_mode: IterationMode::Aggregate,
                config: generator,
            }),
            GeneratorEntry::Iterated(iterated) => {
                for index in config.get_count_range(&iterated.count) {
                    planned.push(PlannedInstance {
                        name: iterated.instance_name(index),
                        count_index: Some(index),
                        iteration_mode: IterationMode::Iterated,
                        config: &iterated.generator,
                    });
                }
            }
        }
    }
    planned
}
