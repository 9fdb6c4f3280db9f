//! Feature values and the [`FeatureData`] output envelope.
//!
//! A [`FeatureData`] is produced once per harvest of a feature extractor. It
//! is both the engine's output contract and the message a first-order
//! feature's result travels in when a second-order feature depends on it.

use core::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::enums::ExtractionMode;

// ---------------------------------------------------------------------------
// FeatureValue
// ---------------------------------------------------------------------------

/// One output cell of a feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    /// No value could be computed.
    Null,
    /// A boolean flag.
    Bool(bool),
    /// A count or other integral value.
    Int(i64),
    /// A real-valued measurement.
    Float(f64),
    /// Free text.
    Text(String),
    /// A span of time, serialized as total seconds.
    Duration(#[serde(serialize_with = "serialize_seconds")] TimeDelta),
    /// A point in time.
    Timestamp(DateTime<Utc>),
    /// Structured data.
    Json(Value),
}

/// Total seconds of a span, including the fractional part.
#[allow(clippy::cast_precision_loss)]
pub fn total_seconds(span: TimeDelta) -> f64 {
    let whole = span.num_seconds() as f64;
    let frac = f64::from(span.subsec_nanos()) / 1_000_000_000.0;
    whole + frac
}

fn serialize_seconds<S: Serializer>(span: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(total_seconds(*span))
}

impl FeatureValue {
    /// Whether the value is [`FeatureValue::Null`].
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the value, for second-order arithmetic.
    ///
    /// Integers, floats, durations (as seconds), booleans (0/1), and JSON
    /// numbers convert; everything else is `None`.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Duration(span) => Some(total_seconds(*span)),
            Self::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
            Self::Json(value) => value.as_f64(),
            Self::Null | Self::Text(_) | Self::Timestamp(_) => None,
        }
    }
}

impl fmt::Display for FeatureValue {
    /// Canonical export rendering: `Null` is empty, durations are seconds,
    /// timestamps are RFC 3339, JSON is compact.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(flag) => write!(f, "{flag}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(text) => f.write_str(text),
            Self::Duration(span) => write!(f, "{}", total_seconds(*span)),
            Self::Timestamp(ts) => f.write_str(&ts.to_rfc3339()),
            Self::Json(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for FeatureValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for FeatureValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for FeatureValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<TimeDelta> for FeatureValue {
    fn from(v: TimeDelta) -> Self {
        Self::Duration(v)
    }
}

impl From<DateTime<Utc>> for FeatureValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for FeatureValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

// ---------------------------------------------------------------------------
// FeatureData
// ---------------------------------------------------------------------------

/// The harvested output of one feature extractor.
///
/// `column_names` and `values` always have the same length; the extractor
/// refuses to build an envelope otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureData {
    /// Display name of the producing generator (e.g. `"lvl2_Score"`).
    pub name: String,
    /// Configured name before iteration expansion (e.g. `"Score"`). Equal to
    /// `name` for aggregate generators.
    pub base_name: String,
    /// Type name the generator was loaded from (e.g. `"CountEvent"`).
    pub generator_type_name: String,
    /// Index within the count range, for iterated generators.
    pub count_index: Option<u32>,
    /// Output column names, base name first.
    pub column_names: Vec<String>,
    /// Output values, one per column.
    pub values: Vec<FeatureValue>,
    /// The mode the producing registry ran in.
    pub extraction_mode: ExtractionMode,
    /// Player the unit belongs to, when the unit is player-scoped.
    pub player_id: Option<String>,
    /// Session the unit belongs to, when the unit is session-scoped.
    pub session_id: Option<String>,
}

impl FeatureData {
    /// The base column's value.
    pub fn first_value(&self) -> Option<&FeatureValue> {
        self.values.first()
    }

    /// Value of the named column.
    pub fn value_of(&self, column: &str) -> Option<&FeatureValue> {
        self.column_names
            .iter()
            .position(|name| name == column)
            .and_then(|i| self.values.get(i))
    }

    /// Whether this envelope comes from one instance of an iterated
    /// generator.
    pub fn is_iterated(&self) -> bool {
        self.base_name != self.name
    }

    /// `(column, value)` pairs in column order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.column_names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl fmt::Display for FeatureData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.extraction_mode)?;
        if let Some(index) = self.count_index {
            write!(f, " [{index}]")?;
        }
        write!(
            f,
            " player={} session={}:",
            self.player_id.as_deref().unwrap_or("*"),
            self.session_id.as_deref().unwrap_or("*")
        )?;
        for (column, value) in self.columns() {
            write!(f, " {column}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn sample() -> FeatureData {
        FeatureData {
            name: String::from("Stopwatch"),
            base_name: String::from("Stopwatch"),
            generator_type_name: String::from("StopwatchTimer"),
            count_index: None,
            column_names: vec![String::from("Stopwatch"), String::from("Stopwatch-Seconds")],
            values: vec![
                FeatureValue::Duration(TimeDelta::milliseconds(1500)),
                FeatureValue::Float(1.5),
            ],
            extraction_mode: ExtractionMode::Session,
            player_id: None,
            session_id: Some(String::from("s-1")),
        }
    }

    #[test]
    fn display_renders_export_strings() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(FeatureValue::Null.to_string(), "");
        assert_eq!(FeatureValue::Int(7).to_string(), "7");
        assert_eq!(FeatureValue::Duration(TimeDelta::seconds(65)).to_string(), "65");
        assert_eq!(FeatureValue::Timestamp(ts).to_string(), "2024-01-02T03:04:05+00:00");
        assert_eq!(FeatureValue::Json(json!({"a": 1})).to_string(), r#"{"a":1}"#);
    }

    #[test]
    fn numeric_view() {
        assert_eq!(FeatureValue::Int(4).as_f64(), Some(4.0));
        assert_eq!(FeatureValue::Duration(TimeDelta::milliseconds(250)).as_f64(), Some(0.25));
        assert_eq!(FeatureValue::Text(String::from("x")).as_f64(), None);
        assert_eq!(FeatureValue::from(None::<i64>), FeatureValue::Null);
    }

    #[test]
    fn column_lookup() {
        let data = sample();
        assert_eq!(data.value_of("Stopwatch-Seconds"), Some(&FeatureValue::Float(1.5)));
        assert!(data.value_of("missing").is_none());
        assert_eq!(data.columns().count(), 2);
        assert!(!data.is_iterated());
    }

    #[test]
    fn serializes_durations_as_seconds() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["values"][0], json!(1.5));
        assert_eq!(value["extraction_mode"], json!("SESSION"));
        assert_eq!(value["count_index"], Value::Null);
    }
}
