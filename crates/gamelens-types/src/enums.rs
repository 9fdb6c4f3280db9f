//! Enumeration types for the Gamelens extraction engine.
//!
//! [`ExtractionMode`] selects the unit of analysis a run computes over,
//! [`IterationMode`] says whether a generator is instanced once per unit or
//! once per index of a count range, and [`ModeSet`] is the finite set type
//! used for "which modes is this enabled for / supported in" questions.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ExtractionMode
// ---------------------------------------------------------------------------

/// The unit of analysis a registry computes over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractionMode {
    /// Detector pass: generators emit synthetic events instead of values.
    Detector,
    /// One unit per play session.
    Session,
    /// One unit per player, aggregated across their sessions.
    Player,
    /// One unit for the whole population of players.
    Population,
}

impl ExtractionMode {
    /// Every extraction mode, in declaration order.
    pub const ALL: [Self; 4] = [Self::Detector, Self::Session, Self::Player, Self::Population];

    /// Upper-case name used in configuration files and log output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Detector => "DETECTOR",
            Self::Session => "SESSION",
            Self::Player => "PLAYER",
            Self::Population => "POPULATION",
        }
    }
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name an [`ExtractionMode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized extraction mode: {0}")]
pub struct ParseModeError(pub String);

impl FromStr for ExtractionMode {
    type Err = ParseModeError;

    /// Case-insensitive parse of a mode name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DETECTOR" => Ok(Self::Detector),
            "SESSION" => Ok(Self::Session),
            "PLAYER" => Ok(Self::Player),
            "POPULATION" => Ok(Self::Population),
            _ => Err(ParseModeError(s.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// IterationMode
// ---------------------------------------------------------------------------

/// How many instances of a generator a registry holds for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IterationMode {
    /// Exactly one instance per analysis unit.
    Aggregate,
    /// One instance per index of a resolved count range (e.g. per level).
    Iterated,
}

impl IterationMode {
    /// Both iteration modes.
    pub const ALL: [Self; 2] = [Self::Aggregate, Self::Iterated];
}

impl fmt::Display for IterationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aggregate => f.write_str("AGGREGATE"),
            Self::Iterated => f.write_str("ITERATED"),
        }
    }
}

// ---------------------------------------------------------------------------
// EventSource
// ---------------------------------------------------------------------------

/// Where an event came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSource {
    /// Logged by the game client.
    #[default]
    Game,
    /// Synthesized by a detector during extraction.
    Generated,
}

// ---------------------------------------------------------------------------
// ModeSet
// ---------------------------------------------------------------------------

bitflags::bitflags! {
    /// A finite set of [`ExtractionMode`] values.
    ///
    /// Used both for the modes a generator kind supports and for the modes a
    /// configured generator is enabled in. "Enabled for a request" is the
    /// superset check [`ModeSet::is_superset_of`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModeSet: u8 {
        /// [`ExtractionMode::Detector`].
        const DETECTOR = 1;
        /// [`ExtractionMode::Session`].
        const SESSION = 1 << 1;
        /// [`ExtractionMode::Player`].
        const PLAYER = 1 << 2;
        /// [`ExtractionMode::Population`].
        const POPULATION = 1 << 3;
    }
}

impl ModeSet {
    /// The modes in which feature extractors report values.
    pub const FEATURE_MODES: Self = Self::SESSION.union(Self::PLAYER).union(Self::POPULATION);

    /// The single-mode set for `mode`.
    pub const fn of(mode: ExtractionMode) -> Self {
        match mode {
            ExtractionMode::Detector => Self::DETECTOR,
            ExtractionMode::Session => Self::SESSION,
            ExtractionMode::Player => Self::PLAYER,
            ExtractionMode::Population => Self::POPULATION,
        }
    }

    /// Whether `mode` is a member of this set.
    pub const fn has(self, mode: ExtractionMode) -> bool {
        self.contains(Self::of(mode))
    }

    /// Whether every mode of `other` is also in this set.
    ///
    /// The empty set is a subset of everything.
    pub const fn is_superset_of(self, other: Self) -> bool {
        self.contains(other)
    }

    /// The member modes, in [`ExtractionMode::ALL`] order.
    pub fn modes(self) -> impl Iterator<Item = ExtractionMode> {
        ExtractionMode::ALL
            .into_iter()
            .filter(move |mode| self.has(*mode))
    }
}

impl From<ExtractionMode> for ModeSet {
    fn from(mode: ExtractionMode) -> Self {
        Self::of(mode)
    }
}

impl FromIterator<ExtractionMode> for ModeSet {
    fn from_iter<I: IntoIterator<Item = ExtractionMode>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |set, mode| set.union(Self::of(mode)))
    }
}

impl fmt::Display for ModeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, mode) in self.modes().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(mode.as_str())?;
        }
        f.write_str("}")
    }
}
