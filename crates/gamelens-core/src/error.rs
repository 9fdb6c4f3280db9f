//! Error types for the extraction engine.
//!
//! Only structural contract violations surface as errors here. A generator
//! that cannot be loaded is reported as a [`LoadError`] inside the loader and
//! logged; the public loader API turns it into `None` so one bad feature
//! reference never aborts a run.

use gamelens_types::ExtractionMode;

use crate::registry::RegistryState;

/// A generator broke its own output contract or rejected its arguments.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    /// The generator reported a different number of values than names.
    #[error("generator {generator} lists {names} feature names but returned {values} values")]
    ValueCountMismatch {
        /// Display name of the generator.
        generator: String,
        /// Number of declared feature names.
        names: usize,
        /// Number of values actually returned.
        values: usize,
    },

    /// The configured arguments cannot construct the generator.
    #[error("invalid arguments for generator {generator}: {message}")]
    InvalidArgs {
        /// Display name of the generator.
        generator: String,
        /// What was wrong with the arguments.
        message: String,
    },
}

/// Why the loader could not construct a requested generator.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// No descriptor exists for the type name in the game or built-in table.
    #[error("unknown generator type `{type_name}` for game {game_id}")]
    UnknownType {
        /// The requested type name.
        type_name: String,
        /// The game whose table was searched.
        game_id: String,
    },

    /// The type exists but is a feature where a detector was asked for, or
    /// the other way around.
    #[error("generator type `{type_name}` is not a {expected}")]
    WrongKind {
        /// The requested type name.
        type_name: String,
        /// The kind that was requested.
        expected: &'static str,
    },

    /// The type does not support the loader's extraction mode.
    #[error("generator type `{type_name}` does not support {mode} mode")]
    ModeNotSupported {
        /// The requested type name.
        type_name: String,
        /// The loader's extraction mode.
        mode: ExtractionMode,
    },

    /// The generator's constructor rejected its arguments.
    #[error("could not construct generator: {source}")]
    InvalidArgs {
        /// The underlying generator error.
        #[from]
        source: GeneratorError,
    },
}

/// Fatal registry errors. Each one means a generator implementation or the
/// calling code is broken, not that the input data is bad.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A generator was registered in a mode it does not support.
    #[error("generator {generator} does not support {mode} mode")]
    ModeNotSupported {
        /// Display name of the generator.
        generator: String,
        /// The registry's extraction mode.
        mode: ExtractionMode,
    },

    /// A generator built for one mode was registered with a registry in
    /// another.
    #[error("generator {generator} was built for {generator_mode} but the registry runs in {registry_mode}")]
    ModeMismatch {
        /// Display name of the generator.
        generator: String,
        /// Mode in the generator's parameters.
        generator_mode: ExtractionMode,
        /// Mode of the registry.
        registry_mode: ExtractionMode,
    },

    /// A second generator with an already registered name.
    #[error("duplicate generator name: {generator}")]
    DuplicateGenerator {
        /// The repeated display name.
        generator: String,
    },

    /// `load_from_schema` was called on a registry that already left the
    /// created state.
    #[error("registry already loaded (state: {state:?})")]
    AlreadyLoaded {
        /// The registry's state at the time of the call.
        state: RegistryState,
    },

    /// A generator failed while being harvested.
    #[error("generator error: {source}")]
    Generator {
        /// The underlying generator error.
        #[from]
        source: GeneratorError,
    },
}
