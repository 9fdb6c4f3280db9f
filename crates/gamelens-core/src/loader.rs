//! Per-game generator tables and the loader that instantiates from them.
//!
//! Each game registers its generator kinds once in a [`GeneratorTable`].
//! A [`GeneratorLoader`] binds a table to one extraction mode and turns
//! `(type name, instance name, args)` into ready [`Extractor`]s and
//! [`Detector`]s, falling back to the built-in kinds for names the game does
//! not define.

use std::sync::Arc;

use gamelens_types::ExtractionMode;
use indexmap::IndexMap;
use tracing::{debug, error};

use crate::builtin;
use crate::config::ConfigError;
use crate::detector::{Detector, TriggerCallback};
use crate::error::LoadError;
use crate::extractor::Extractor;
use crate::generator::{
    Constructor, GeneratorArgs, GeneratorDescriptor, GeneratorParameters, str_arg,
};

// ---------------------------------------------------------------------------
// GeneratorTable
// ---------------------------------------------------------------------------

/// Type name to descriptor, for one game. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct GeneratorTable {
    game_id: String,
    descriptors: IndexMap<String, Arc<GeneratorDescriptor>>,
}

impl GeneratorTable {
    /// An empty table for `game_id`.
    pub fn new(game_id: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            descriptors: IndexMap::new(),
        }
    }

    /// Add a generator kind.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateType`] if the type name is already
    /// present; the existing entry is kept.
    pub fn register(&mut self, descriptor: GeneratorDescriptor) -> Result<(), ConfigError> {
        let type_name = descriptor.type_name().to_owned();
        if self.descriptors.contains_key(&type_name) {
            return Err(ConfigError::DuplicateType {
                type_name,
                game_id: self.game_id.clone(),
            });
        }
        self.descriptors.insert(type_name, Arc::new(descriptor));
        Ok(())
    }

    /// Add a generator kind (builder style).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateType`] if the type name is already
    /// present.
    pub fn with(mut self, descriptor: GeneratorDescriptor) -> Result<Self, ConfigError> {
        self.register(descriptor)?;
        Ok(self)
    }

    /// The game this table belongs to.
    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    /// Look up a descriptor by type name.
    pub fn get(&self, type_name: &str) -> Option<&Arc<GeneratorDescriptor>> {
        self.descriptors.get(type_name)
    }

    /// Registered type names, in registration order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether no kinds are registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// GeneratorLoader
// ---------------------------------------------------------------------------

/// Instantiates generators for one game in one extraction mode.
#[derive(Debug, Clone)]
pub struct GeneratorLoader {
    table: Arc<GeneratorTable>,
    mode: ExtractionMode,
}

impl GeneratorLoader {
    /// A loader over a game's table.
    pub const fn new(table: Arc<GeneratorTable>, mode: ExtractionMode) -> Self {
        Self { table, mode }
    }

    /// A loader that only knows the built-in kinds.
    pub fn builtin_only(mode: ExtractionMode) -> Self {
        Self::new(Arc::new(GeneratorTable::new(builtin::BUILTIN_GAME_ID)), mode)
    }

    /// The same table, bound to another mode.
    #[must_use]
    pub fn for_mode(&self, mode: ExtractionMode) -> Self {
        Self::new(Arc::clone(&self.table), mode)
    }

    /// The loader's extraction mode.
    pub const fn mode(&self) -> ExtractionMode {
        self.mode
    }

    /// The game this loader serves.
    pub fn game_id(&self) -> &str {
        self.table.game_id()
    }

    /// Static descriptor of a kind: the game's table first, then the
    /// built-ins.
    pub fn get_feature_class(&self, type_name: &str) -> Option<&GeneratorDescriptor> {
        self.resolve(type_name).map(Arc::as_ref)
    }

    /// Construct a feature extractor, or log why not and return `None`.
    pub fn load_feature(
        &self,
        type_name: &str,
        name: &str,
        args: &GeneratorArgs,
        count_index: Option<u32>,
    ) -> Option<Extractor> {
        self.try_load_feature(type_name, name, args, count_index)
            .inspect_err(|err| {
                error!(game = %self.game_id(), generator = name, %err, "could not load feature");
            })
            .ok()
    }

    /// Construct a detector, or log why not and return `None`.
    pub fn load_detector(
        &self,
        type_name: &str,
        name: &str,
        args: &GeneratorArgs,
        trigger_callback: TriggerCallback,
        count_index: Option<u32>,
    ) -> Option<Detector> {
        self.try_load_detector(type_name, name, args, trigger_callback, count_index)
            .inspect_err(|err| {
                error!(game = %self.game_id(), generator = name, %err, "could not load detector");
            })
            .ok()
    }

    /// Construct a feature extractor.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] if the kind is unknown, is a detector, does
    /// not support the loader's mode, or rejects the arguments.
    pub fn try_load_feature(
        &self,
        type_name: &str,
        name: &str,
        args: &GeneratorArgs,
        count_index: Option<u32>,
    ) -> Result<Extractor, LoadError> {
        let descriptor = self.checked_descriptor(type_name, "feature")?;
        let Constructor::Feature(construct) = descriptor.constructor() else {
            return Err(LoadError::WrongKind {
                type_name: type_name.to_owned(),
                expected: "feature",
            });
        };
        let params = self.params(name, args, count_index);
        let feature = construct(&params, args)?;
        debug!(generator = name, generator_type = type_name, mode = %self.mode, "loaded feature");
        Ok(Extractor::new(params, Arc::clone(descriptor), args.clone(), feature))
    }

    /// Construct a detector.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] if the kind is unknown, is a feature, does
    /// not support the loader's mode, or rejects the arguments.
    pub fn try_load_detector(
        &self,
        type_name: &str,
        name: &str,
        args: &GeneratorArgs,
        trigger_callback: TriggerCallback,
        count_index: Option<u32>,
    ) -> Result<Detector, LoadError> {
        let descriptor = self.checked_descriptor(type_name, "detector")?;
        let Constructor::Detector(construct) = descriptor.constructor() else {
            return Err(LoadError::WrongKind {
                type_name: type_name.to_owned(),
                expected: "detector",
            });
        };
        let params = self.params(name, args, count_index);
        let logic = construct(&params, args)?;
        debug!(generator = name, generator_type = type_name, mode = %self.mode, "loaded detector");
        Ok(Detector::new(
            params,
            Arc::clone(descriptor),
            args.clone(),
            logic,
            trigger_callback,
        ))
    }

    fn resolve(&self, type_name: &str) -> Option<&Arc<GeneratorDescriptor>> {
        self.table
            .get(type_name)
            .or_else(|| builtin::table().get(type_name))
    }

    fn checked_descriptor(
        &self,
        type_name: &str,
        expected: &'static str,
    ) -> Result<&Arc<GeneratorDescriptor>, LoadError> {
        let descriptor = self.resolve(type_name).ok_or_else(|| LoadError::UnknownType {
            type_name: type_name.to_owned(),
            game_id: self.game_id().to_owned(),
        })?;
        if descriptor.constructor().kind() != expected {
            return Err(LoadError::WrongKind {
                type_name: type_name.to_owned(),
                expected,
            });
        }
        if !descriptor.supports(self.mode) {
            return Err(LoadError::ModeNotSupported {
                type_name: type_name.to_owned(),
                mode: self.mode,
            });
        }
        Ok(descriptor)
    }

    fn params(
        &self,
        name: &str,
        args: &GeneratorArgs,
        count_index: Option<u32>,
    ) -> GeneratorParameters {
        let description = str_arg(args, "description").unwrap_or_default();
        GeneratorParameters::new(name, description, self.mode, count_index)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use gamelens_types::{Event, FeatureValue, ModeSet};
    use serde_json::json;

    use super::*;
    use crate::error::GeneratorError;
    use crate::extractor::Feature;
    use crate::generator::{ALL_EVENTS, Generator};

    struct Constant;

    impl Feature for Constant {
        fn update_from_event(&mut self, _event: &Event) {}

        fn feature_values(&self) -> Vec<FeatureValue> {
            vec![FeatureValue::Int(7)]
        }
    }

    fn everything(_: &GeneratorArgs, _: ExtractionMode) -> Vec<String> {
        vec![ALL_EVENTS.to_owned()]
    }

    fn build(
        _: &GeneratorParameters,
        _: &GeneratorArgs,
    ) -> Result<Box<dyn Feature>, GeneratorError> {
        Ok(Box::new(Constant))
    }

    fn refuse(
        params: &GeneratorParameters,
        _: &GeneratorArgs,
    ) -> Result<Box<dyn Feature>, GeneratorError> {
        Err(GeneratorError::InvalidArgs {
            generator: params.name().to_owned(),
            message: "never valid".to_owned(),
        })
    }

    fn make_table() -> Arc<GeneratorTable> {
        let table = GeneratorTable::new("TEST_GAME")
            .with(GeneratorDescriptor::feature("Constant", everything, build))
            .unwrap()
            .with(
                GeneratorDescriptor::feature("SessionOnly", everything, build)
                    .with_modes(ModeSet::SESSION),
            )
            .unwrap()
            .with(GeneratorDescriptor::feature("Refuses", everything, refuse))
            .unwrap();
        Arc::new(table)
    }

    #[test]
    fn duplicate_type_names_are_rejected() {
        let mut table = GeneratorTable::new("G");
        table
            .register(GeneratorDescriptor::feature("Constant", everything, build))
            .unwrap();
        let err = table
            .register(GeneratorDescriptor::feature("Constant", everything, refuse))
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateType { .. }));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn loads_game_feature_with_description() {
        let loader = GeneratorLoader::new(make_table(), ExtractionMode::Session);
        let args = json!({ "description": "always seven" });
        let extractor = loader
            .load_feature("Constant", "Seven", args.as_object().unwrap(), Some(4))
            .unwrap();
        assert_eq!(extractor.name(), "Seven");
        assert_eq!(extractor.description(), "always seven");
        assert_eq!(extractor.count_index(), Some(4));
        assert_eq!(extractor.extraction_mode(), ExtractionMode::Session);
    }

    #[test]
    fn falls_back_to_builtins() {
        let loader = GeneratorLoader::new(make_table(), ExtractionMode::Session);
        assert!(loader.get_feature_class("CountEvent").is_some());
        assert!(
            loader
                .load_feature("CountEvent", "Clicks", &GeneratorArgs::new(), None)
                .is_some()
        );
    }

    #[test]
    fn failure_paths_return_none() {
        let session = GeneratorLoader::new(make_table(), ExtractionMode::Session);
        let player = session.for_mode(ExtractionMode::Player);
        let args = GeneratorArgs::new();

        assert!(session.load_feature("Missing", "X", &args, None).is_none());
        assert!(session.load_feature("IdleGap", "X", &args, None).is_none());
        assert!(player.load_feature("SessionOnly", "X", &args, None).is_none());
        assert!(session.load_feature("Refuses", "X", &args, None).is_none());

        assert!(matches!(
            session.try_load_feature("Missing", "X", &args, None),
            Err(LoadError::UnknownType { .. })
        ));
        assert!(matches!(
            session.try_load_feature("IdleGap", "X", &args, None),
            Err(LoadError::WrongKind { .. })
        ));
        assert!(matches!(
            player.try_load_feature("SessionOnly", "X", &args, None),
            Err(LoadError::ModeNotSupported { .. })
        ));
        assert!(matches!(
            session.try_load_feature("Refuses", "X", &args, None),
            Err(LoadError::InvalidArgs { .. })
        ));
    }

    #[test]
    fn detectors_need_detector_mode() {
        let loader = GeneratorLoader::builtin_only(ExtractionMode::Session);
        let callback: TriggerCallback = Arc::new(|_: Event| {});
        assert!(
            loader
                .load_detector(
                    "IdleGap",
                    "Idle",
                    &GeneratorArgs::new(),
                    Arc::clone(&callback),
                    None,
                )
                .is_none()
        );
        let detector_loader = loader.for_mode(ExtractionMode::Detector);
        assert!(
            detector_loader
                .load_detector("IdleGap", "Idle", &GeneratorArgs::new(), callback, None)
                .is_some()
        );
    }
}
