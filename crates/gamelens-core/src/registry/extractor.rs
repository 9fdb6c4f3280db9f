//! The feature extractor registry.
//!
//! Extractors are partitioned at registration: those with no feature
//! dependencies are first order, the rest second order. Events reach both
//! tiers through the dispatch table; second-order extractors additionally
//! receive the [`FeatureData`] of the features they depend on, routed by
//! feature name and filtered by their dependency modes.

use core::fmt;

use gamelens_types::{Event, ExtractionMode, FeatureData, FeatureValue, IterationMode};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use super::{
    EventDispatch, GeneratorRegistry, Listener, RegistryState, check_registration, plan_instances,
    select_candidates,
};
use crate::config::{GameConfig, GeneratorEntry, GeneratorMap};
use crate::error::RegistryError;
use crate::extractor::Extractor;
use crate::generator::Generator;
use crate::loader::GeneratorLoader;

/// Harvest tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureOrder {
    /// Features computed from events alone.
    First,
    /// Features that also consume other features' output.
    Second,
}

impl FeatureOrder {
    /// Both tiers, in harvest order.
    pub const ALL: [Self; 2] = [Self::First, Self::Second];

    /// `1` or `2`.
    pub const fn number(self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
        }
    }
}

/// Owns the feature extractors of one unit.
#[derive(Debug)]
pub struct ExtractorRegistry {
    state: RegistryState,
    iteration_modes: Vec<IterationMode>,
    dispatch: EventDispatch,
    feature_registry: IndexMap<String, Vec<Listener>>,
    first_order: IndexMap<String, Extractor>,
    second_order: IndexMap<String, Extractor>,
    harvested: bool,
}

impl ExtractorRegistry {
    /// An empty registry for `mode`, loading both iteration maps.
    pub fn new(mode: ExtractionMode) -> Self {
        Self {
            state: RegistryState::Created,
            iteration_modes: IterationMode::ALL.to_vec(),
            dispatch: EventDispatch::new(mode),
            feature_registry: IndexMap::new(),
            first_order: IndexMap::new(),
            second_order: IndexMap::new(),
            harvested: false,
        }
    }

    /// Restrict loading to some iteration maps (builder style).
    #[must_use]
    pub fn with_iteration_modes(mut self, iteration_modes: &[IterationMode]) -> Self {
        self.iteration_modes = iteration_modes.to_vec();
        self
    }

    /// Look up an extractor in either tier.
    pub fn get(&self, name: &str) -> Option<&Extractor> {
        self.first_order
            .get(name)
            .or_else(|| self.second_order.get(name))
    }

    /// Every column name, first order then second, in registration order.
    /// The header for [`ExtractorRegistry::get_feature_values`].
    pub fn feature_names(&self) -> Vec<String> {
        self.first_order
            .values()
            .chain(self.second_order.values())
            .flat_map(Extractor::feature_names)
            .collect()
    }

    /// Harvest one tier into [`FeatureData`] envelopes.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Generator`] if any extractor reports a
    /// different number of values than names.
    pub fn get_feature_data(
        &mut self,
        order: FeatureOrder,
        player_id: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<Vec<FeatureData>, RegistryError> {
        let tier = match order {
            FeatureOrder::First => &mut self.first_order,
            FeatureOrder::Second => &mut self.second_order,
        };
        let data = tier
            .values_mut()
            .map(|extractor| extractor.to_feature_data(player_id, session_id))
            .collect::<Result<Vec<_>, _>>()?;
        self.finalize();
        debug!(order = order.number(), features = data.len(), "harvested feature data");
        Ok(data)
    }

    /// All values, first order then second, aligned with
    /// [`ExtractorRegistry::feature_names`].
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Generator`] on any value count mismatch.
    pub fn get_feature_values(&mut self) -> Result<Vec<FeatureValue>, RegistryError> {
        let mut values = Vec::new();
        for extractor in self
            .first_order
            .values_mut()
            .chain(self.second_order.values_mut())
        {
            values.extend(extractor.checked_feature_values()?);
        }
        self.finalize();
        Ok(values)
    }

    /// [`ExtractorRegistry::get_feature_values`] rendered as strings.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Generator`] on any value count mismatch.
    pub fn get_feature_string_values(&mut self) -> Result<Vec<String>, RegistryError> {
        Ok(self
            .get_feature_values()?
            .iter()
            .map(ToString::to_string)
            .collect())
    }

    /// Names of features some second-order extractor depends on.
    pub fn first_orders_requested(&self) -> Vec<&str> {
        self.feature_registry.keys().map(String::as_str).collect()
    }

    /// Number of harvest tiers.
    pub const fn order_count(&self) -> usize {
        FeatureOrder::ALL.len()
    }

    /// The event dispatch table.
    pub const fn dispatch(&self) -> &EventDispatch {
        &self.dispatch
    }

    fn contains(&self, name: &str) -> bool {
        self.first_order.contains_key(name) || self.second_order.contains_key(name)
    }

    const fn finalize(&mut self) {
        self.state = RegistryState::Finalized;
        self.harvested = true;
    }
}

fn lookup<'a>(
    first_order: &'a mut IndexMap<String, Extractor>,
    second_order: &'a mut IndexMap<String, Extractor>,
    name: &str,
) -> Option<&'a mut Extractor> {
    match first_order.get_mut(name) {
        Some(extractor) => Some(extractor),
        None => second_order.get_mut(name),
    }
}

/// Add every configured feature named as a dependency of a candidate, from
/// the candidate's own iteration map. One level only.
fn with_dependencies<'a>(
    map: &'a GeneratorMap,
    candidates: &[GeneratorEntry<'a>],
    loader: &GeneratorLoader,
    mode: ExtractionMode,
) -> Vec<GeneratorEntry<'a>> {
    let mut wanted: Vec<(IterationMode, &str)> = candidates
        .iter()
        .map(|entry| (entry.iteration_mode(), entry.name()))
        .collect();
    for entry in candidates {
        let generator = entry.generator();
        let Some(descriptor) = loader.get_feature_class(&generator.type_name) else {
            continue;
        };
        for dependency in descriptor.feature_dependencies(&generator.args, mode) {
            match map.get(&dependency, entry.iteration_mode()) {
                Some(found) => {
                    let key = (found.iteration_mode(), found.name());
                    if !wanted.contains(&key) {
                        debug!(
                            feature = %generator.name,
                            dependency = %dependency,
                            "adding dependency"
                        );
                        wanted.push(key);
                    }
                }
                None => warn!(
                    feature = %generator.name,
                    dependency = %dependency,
                    "feature dependency is not configured"
                ),
            }
        }
    }
    map.entries()
        .filter(|entry| wanted.contains(&(entry.iteration_mode(), entry.name())))
        .collect()
}

impl GeneratorRegistry for ExtractorRegistry {
    type Generator = Extractor;

    fn mode(&self) -> ExtractionMode {
        self.dispatch.mode()
    }

    fn state(&self) -> RegistryState {
        self.state
    }

    fn register(
        &mut self,
        extractor: Extractor,
        iteration_mode: IterationMode,
    ) -> Result<(), RegistryError> {
        let mode = self.mode();
        let name = extractor.name().to_owned();
        check_registration(&extractor, mode, self.contains(&name))?;

        let listener = Listener::new(name.clone(), iteration_mode);
        self.dispatch
            .subscribe(&listener, &extractor.event_dependencies(mode));

        let feature_dependencies = extractor.feature_dependencies(mode);
        if feature_dependencies.is_empty() {
            self.first_order.insert(name, extractor);
        } else {
            for dependency in feature_dependencies {
                let listeners = self.feature_registry.entry(dependency).or_default();
                if !listeners.contains(&listener) {
                    listeners.push(listener.clone());
                }
            }
            self.second_order.insert(name, extractor);
        }
        Ok(())
    }

    fn generators(&self) -> Vec<&Extractor> {
        self.first_order
            .values()
            .chain(self.second_order.values())
            .collect()
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
            select_candidates(&config.extractors, mode, &self.iteration_modes, overrides);
        let candidates = with_dependencies(&config.extractors, &candidates, loader, mode);

        let mut registered: usize = 0;
        for planned in plan_instances(config, &candidates) {
            let Some(extractor) = loader.load_feature(
                &planned.config.type_name,
                &planned.name,
                &planned.config.loader_args(),
                planned.count_index,
            ) else {
                continue;
            };
            let extractor = extractor.with_base_name(&planned.config.name);
            self.register(extractor, planned.iteration_mode)?;
            registered = registered.saturating_add(1);
        }

        self.state = RegistryState::Loaded;
        info!(
            game = %config.game_id,
            %mode,
            registered,
            first_order = self.first_order.len(),
            second_order = self.second_order.len(),
            "extractor registry loaded"
        );
        Ok(registered)
    }

    fn update_from_event(&mut self, event: &Event) {
        if self.harvested {
            warn!(event = %event.event_name, state = ?self.state, "event after harvest; ignored");
            return;
        }
        self.state = RegistryState::Streaming;
        for listener in self.dispatch.listeners_for(&event.event_name) {
            if let Some(extractor) = lookup(
                &mut self.first_order,
                &mut self.second_order,
                &listener.generator_name,
            ) {
                extractor.update_from_event(event);
            }
        }
    }

    fn update_from_feature_data(&mut self, feature: &FeatureData) {
        self.state = RegistryState::Streaming;
        // Iterated producers also reach consumers that name their base
        // name; iterated consumers only take the instance with their index.
        let direct = self.feature_registry.get(&feature.name);
        let by_base = if feature.is_iterated() {
            self.feature_registry.get(&feature.base_name)
        } else {
            None
        };
        let routes = direct
            .into_iter()
            .flatten()
            .map(|listener| (listener, false))
            .chain(by_base.into_iter().flatten().map(|listener| (listener, true)));
        for (listener, per_count) in routes {
            let Some(extractor) = lookup(
                &mut self.first_order,
                &mut self.second_order,
                &listener.generator_name,
            ) else {
                continue;
            };
            if per_count
                && extractor
                    .count_index()
                    .is_some_and(|index| Some(index) != feature.count_index)
            {
                continue;
            }
            if extractor
                .feature_dependency_modes()
                .has(feature.extraction_mode)
            {
                extractor.update_from_feature_data(feature);
            }
        }
    }
}

impl fmt::Display for ExtractorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary(None))
    }
}
