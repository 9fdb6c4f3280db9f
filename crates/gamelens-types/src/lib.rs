//! Shared type definitions for the Gamelens extraction engine.
//!
//! Everything that flows between the event source, the generator registries,
//! and the export side lives here: the immutable [`Event`] record, the
//! [`FeatureData`] output envelope, and the extraction-mode enumerations that
//! every generator declares support for.
//!
//! # Modules
//!
//! - [`enums`] -- Extraction and iteration modes, event sources, [`ModeSet`]
//! - [`event`] -- The telemetry [`Event`] record
//! - [`feature`] -- [`FeatureValue`] cells and the [`FeatureData`] envelope
//! - [`version`] -- Dot-separated log-version comparison

pub mod enums;
pub mod event;
pub mod feature;
pub mod version;

// Re-export all public types at crate root for convenience.
pub use enums::{EventSource, ExtractionMode, IterationMode, ModeSet, ParseModeError};
pub use event::{Event, EventData};
pub use feature::{FeatureData, FeatureValue};
pub use version::compare_versions;
