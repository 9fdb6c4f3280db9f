//! Generator extraction engine for the Gamelens telemetry pipeline.
//!
//! A run over one analysis unit (a session, a player, or a population)
//! loads generators from a [`GameConfig`], streams the unit's ordered events
//! through a registry, and harvests [`FeatureData`] envelopes at the end.
//!
//! # Modules
//!
//! - [`config`] -- Game generator configuration loaded from YAML or JSON.
//! - [`generator`] -- The [`Generator`] contract, parameters, and static
//!   [`GeneratorDescriptor`]s.
//! - [`extractor`] -- Feature extractors ([`Feature`] logic wrapped in an
//!   [`Extractor`]).
//! - [`detector`] -- Detectors that emit synthetic events through a
//!   [`TriggerCallback`].
//! - [`loader`] -- Per-game [`GeneratorTable`] and [`GeneratorLoader`].
//! - [`registry`] -- Event dispatch plus the extractor and detector
//!   registries.
//! - [`builtin`] -- Generators every game can use without registering them.
//! - [`processor`] -- [`UnitProcessor`], the order-1 then order-2 driver.
//! - [`error`] -- Generator, loader, and registry errors.
//!
//! [`GameConfig`]: config::GameConfig
//! [`FeatureData`]: gamelens_types::FeatureData
//! [`Generator`]: generator::Generator
//! [`GeneratorDescriptor`]: generator::GeneratorDescriptor
//! [`Feature`]: extractor::Feature
//! [`Extractor`]: extractor::Extractor
//! [`TriggerCallback`]: detector::TriggerCallback
//! [`GeneratorTable`]: loader::GeneratorTable
//! [`GeneratorLoader`]: loader::GeneratorLoader
//! [`UnitProcessor`]: processor::UnitProcessor

pub mod builtin;
pub mod config;
pub mod detector;
pub mod error;
pub mod extractor;
pub mod generator;
pub mod loader;
pub mod processor;
pub mod registry;
