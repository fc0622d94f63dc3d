//! The runtime value model
//!
//! Values are a closed sum ([`ValueData`]) wrapped with a provenance
//! path ([`Value`]): subject data entering from the host remembers where
//! in the input it came from, and field and index access extend that
//! path. Reject records report it so a caller can point at the exact
//! offending element.

mod arith;
pub mod time;

pub use arith::{binary_op, BinOutcome};
pub use time::{add_duration, add_months, days_in_month, is_leap_year, DurationUnit};

use chrono::{NaiveDateTime, SecondsFormat};
use indexmap::IndexMap;
use std::cmp::Ordering;

/// One step of a provenance path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A struct field
    Key(String),

    /// An array element
    Index(usize),
}

impl PathSegment {
    /// The segment as a JSON value (string for keys, number for indices).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PathSegment::Key(k) => serde_json::Value::String(k.clone()),
            PathSegment::Index(i) => serde_json::Value::from(*i),
        }
    }
}

/// The payload of a runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueData {
    /// A 64-bit float
    Number(f64),

    /// A UTF-8 string
    String(String),

    /// A boolean
    Boolean(bool),

    /// An ordered sequence
    Array(Vec<Value>),

    /// An insertion-ordered field map
    Struct(IndexMap<String, Value>),

    /// A calendar datetime
    Date(NaiveDateTime),

    /// A magnitude of time in a unit
    Duration {
        /// The magnitude
        value: f64,

        /// The unit the magnitude is measured in
        unit: DurationUnit,
    },

    /// The absence of a usable value
    Unknown,
}

/// A runtime value with its provenance path.
#[derive(Debug, Clone)]
pub struct Value {
    /// The payload
    pub data: ValueData,

    /// Where in the subject data this value came from (empty for
    /// script-made values)
    pub path: Vec<PathSegment>,
}

/// Equality ignores provenance.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Value {
    /// Wrap a payload with an empty provenance path.
    pub fn new(data: ValueData) -> Self {
        Self {
            data,
            path: Vec::new(),
        }
    }

    /// A number value.
    pub fn number(n: f64) -> Self {
        Self::new(ValueData::Number(n))
    }

    /// A string value.
    pub fn string(s: impl Into<String>) -> Self {
        Self::new(ValueData::String(s.into()))
    }

    /// A boolean value.
    pub fn boolean(b: bool) -> Self {
        Self::new(ValueData::Boolean(b))
    }

    /// An array value.
    pub fn array(items: Vec<Value>) -> Self {
        Self::new(ValueData::Array(items))
    }

    /// A struct value.
    pub fn record(fields: IndexMap<String, Value>) -> Self {
        Self::new(ValueData::Struct(fields))
    }

    /// A date value.
    pub fn date(dt: NaiveDateTime) -> Self {
        Self::new(ValueData::Date(dt))
    }

    /// A duration value.
    pub fn duration(value: f64, unit: DurationUnit) -> Self {
        Self::new(ValueData::Duration { value, unit })
    }

    /// The unknown value.
    pub fn unknown() -> Self {
        Self::new(ValueData::Unknown)
    }

    /// Attach a provenance path.
    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = path;
        self
    }

    /// The user-facing type name, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match &self.data {
            ValueData::Number(_) => "number",
            ValueData::String(_) => "string",
            ValueData::Boolean(_) => "boolean",
            ValueData::Array(_) => "array",
            ValueData::Struct(_) => "struct",
            ValueData::Date(_) => "date",
            ValueData::Duration { .. } => "duration",
            ValueData::Unknown => "unknown",
        }
    }

    /// Truthiness: `false`, zero, the empty string, a zero-length
    /// duration, and unknown are falsy. Arrays, structs, and dates are
    /// always truthy.
    pub fn is_truthy(&self) -> bool {
        match &self.data {
            ValueData::Number(n) => *n != 0.0,
            ValueData::String(s) => !s.is_empty(),
            ValueData::Boolean(b) => *b,
            ValueData::Array(_) | ValueData::Struct(_) | ValueData::Date(_) => true,
            ValueData::Duration { value, .. } => *value != 0.0,
            ValueData::Unknown => false,
        }
    }

    /// Numeric view of this value, when it has one.
    pub fn parse(&self) -> Option<f64> {
        match &self.data {
            ValueData::Number(n) => Some(*n),
            ValueData::String(s) => s.trim().parse::<f64>().ok(),
            ValueData::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Total milliseconds, for durations.
    pub fn duration_millis(&self) -> Option<f64> {
        match &self.data {
            ValueData::Duration { value, unit } => Some(value * unit.millis()),
            _ => None,
        }
    }

    /// Ordering for the comparison operators. `None` means the kinds are
    /// not comparable.
    ///
    /// Numbers compare numerically, and a string that parses as a number
    /// compares numerically against a number. Strings compare by bytes
    /// (`"A" < "a"`). Durations compare by total milliseconds across
    /// units. Dates compare chronologically.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (&self.data, &other.data) {
            (ValueData::Number(_), _) | (_, ValueData::Number(_)) => {
                self.parse()?.partial_cmp(&other.parse()?)
            }
            (ValueData::String(a), ValueData::String(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            (ValueData::Duration { .. }, ValueData::Duration { .. }) => self
                .duration_millis()?
                .partial_cmp(&other.duration_millis()?),
            (ValueData::Date(a), ValueData::Date(b)) => Some(a.cmp(b)),
            (ValueData::Boolean(_), ValueData::Boolean(_)) => {
                self.parse()?.partial_cmp(&other.parse()?)
            }
            _ => None,
        }
    }

    /// Equality for the `==` operator: numeric when either side is a
    /// number, structural otherwise. Durations are equal when their
    /// millisecond magnitudes are.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (&self.data, &other.data) {
            (ValueData::Number(_), _) | (_, ValueData::Number(_)) => {
                match (self.parse(), other.parse()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            (ValueData::String(a), ValueData::String(b)) => a == b,
            (ValueData::Boolean(a), ValueData::Boolean(b)) => a == b,
            (ValueData::Array(a), ValueData::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (ValueData::Struct(a), ValueData::Struct(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.loose_eq(w)))
            }
            (ValueData::Duration { .. }, ValueData::Duration { .. }) => {
                self.duration_millis() == other.duration_millis()
            }
            (ValueData::Date(a), ValueData::Date(b)) => a == b,
            (ValueData::Unknown, ValueData::Unknown) => true,
            _ => false,
        }
    }

    /// Whether comparing this pair should raise a matching-types
    /// warning. A number against a numeric string is fine, as is any
    /// duration against any duration.
    pub fn mismatches(&self, other: &Value) -> bool {
        if self.type_name() == other.type_name() {
            return false;
        }
        match (&self.data, &other.data) {
            (ValueData::Number(_), ValueData::String(s))
            | (ValueData::String(s), ValueData::Number(_)) => {
                s.trim().parse::<f64>().is_err()
            }
            _ => true,
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Host Boundary
    // ═══════════════════════════════════════════════════════════════════

    /// Build a value from host JSON, threading the provenance path down
    /// through elements and fields. Strings in full ISO 8601 datetime
    /// form become dates.
    pub fn from_json(json: &serde_json::Value, path: Vec<PathSegment>) -> Value {
        let data = match json {
            serde_json::Value::Null => ValueData::Unknown,
            serde_json::Value::Bool(b) => ValueData::Boolean(*b),
            serde_json::Value::Number(n) => ValueData::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => match parse_datetime(s) {
                Some(dt) => ValueData::Date(dt),
                None => ValueData::String(s.clone()),
            },
            serde_json::Value::Array(items) => ValueData::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let mut child = path.clone();
                        child.push(PathSegment::Index(i));
                        Value::from_json(item, child)
                    })
                    .collect(),
            ),
            serde_json::Value::Object(fields) => ValueData::Struct(
                fields
                    .iter()
                    .map(|(k, v)| {
                        let mut child = path.clone();
                        child.push(PathSegment::Key(k.clone()));
                        (k.clone(), Value::from_json(v, child))
                    })
                    .collect(),
            ),
        };
        Value { data, path }
    }

    /// Convert back to host JSON. Dates become RFC 3339 strings and
    /// durations become total milliseconds.
    pub fn unwrap(&self) -> serde_json::Value {
        match &self.data {
            ValueData::Number(n) => number_to_json(*n),
            ValueData::String(s) => serde_json::Value::String(s.clone()),
            ValueData::Boolean(b) => serde_json::Value::Bool(*b),
            ValueData::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::unwrap).collect())
            }
            ValueData::Struct(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.unwrap()))
                    .collect(),
            ),
            ValueData::Date(dt) => serde_json::Value::String(
                dt.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ValueData::Duration { .. } => {
                number_to_json(self.duration_millis().unwrap_or(0.0))
            }
            ValueData::Unknown => serde_json::Value::Null,
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Rendering
    // ═══════════════════════════════════════════════════════════════════

    /// User-facing rendering, used by `print` and string concatenation.
    pub fn to_display(&self) -> String {
        match &self.data {
            ValueData::Number(n) => display_number(*n),
            ValueData::String(s) => s.clone(),
            ValueData::Boolean(b) => b.to_string(),
            ValueData::Array(items) => {
                let inner: Vec<String> = items.iter().map(Value::to_display).collect();
                format!("[{}]", inner.join(", "))
            }
            ValueData::Struct(_) => "{..}".to_string(),
            ValueData::Date(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            ValueData::Duration { .. } => display_duration(self.duration_millis().unwrap_or(0.0)),
            ValueData::Unknown => "unknown".to_string(),
        }
    }

    /// Diagnostic rendering: strings quoted, structs expanded.
    pub fn to_debug(&self) -> String {
        self.debug_indent(0)
    }

    fn debug_indent(&self, indent: usize) -> String {
        let pad = "  ".repeat(indent);
        match &self.data {
            ValueData::String(s) => format!("{s:?}"),
            ValueData::Array(items) => {
                let inner: Vec<String> =
                    items.iter().map(|v| v.debug_indent(indent)).collect();
                format!("[{}]", inner.join(", "))
            }
            ValueData::Struct(fields) => {
                if fields.is_empty() {
                    return "{}".to_string();
                }
                let inner: Vec<String> = fields
                    .iter()
                    .map(|(k, v)| format!("{pad}  {k}: {}", v.debug_indent(indent + 1)))
                    .collect();
                format!("{{\n{}\n{pad}}}", inner.join(",\n"))
            }
            _ => self.to_display(),
        }
    }
}

/// Integral floats become JSON integers so host comparisons read
/// naturally.
fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Render a float the way scripts expect: integral values without a
/// fractional part.
pub fn display_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Render a millisecond magnitude as the largest unit it reaches,
/// rounded to one decimal place.
fn display_duration(millis: f64) -> String {
    if millis == 0.0 {
        return "0 milliseconds".to_string();
    }
    let unit = time::UNITS_DESCENDING
        .into_iter()
        .find(|u| millis.abs() >= u.millis())
        .unwrap_or(DurationUnit::Millisecond);
    let scaled = (millis / unit.millis() * 10.0).round() / 10.0;
    let name = unit.name();
    if scaled == 1.0 {
        format!("1 {name}")
    } else {
        format!("{} {name}s", display_number(scaled))
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    for format in [
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_display_number_integral() {
        assert_eq!(Value::number(1.0).to_display(), "1");
        assert_eq!(Value::number(-3.0).to_display(), "-3");
        assert_eq!(Value::number(1.5).to_display(), "1.5");
    }

    #[test]
    fn test_display_duration_largest_unit() {
        assert_eq!(
            Value::duration(90.0, DurationUnit::Second).to_display(),
            "1.5 minutes"
        );
        assert_eq!(
            Value::duration(1.0, DurationUnit::Second).to_display(),
            "1 second"
        );
        assert_eq!(
            Value::duration(36.0, DurationUnit::Hour).to_display(),
            "1.5 days"
        );
        assert_eq!(
            Value::duration(500.0, DurationUnit::Millisecond).to_display(),
            "500 milliseconds"
        );
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::number(0.0).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(!Value::boolean(false).is_truthy());
        assert!(!Value::unknown().is_truthy());
        assert!(!Value::duration(0.0, DurationUnit::Day).is_truthy());
        assert!(Value::array(vec![]).is_truthy());
        assert!(Value::number(-1.0).is_truthy());
        assert!(Value::string("0").is_truthy());
    }

    #[test]
    fn test_compare_strings_by_bytes() {
        assert_eq!(
            Value::string("A").compare(&Value::string("a")),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::string("apple").compare(&Value::string("banana")),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_compare_numeric_strings() {
        assert_eq!(
            Value::string("10").compare(&Value::number(9.0)),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::string("x").compare(&Value::number(9.0)), None);
    }

    #[test]
    fn test_compare_durations_across_units() {
        let hour = Value::duration(1.0, DurationUnit::Hour);
        let minutes = Value::duration(60.0, DurationUnit::Minute);
        assert_eq!(hour.compare(&minutes), Some(Ordering::Equal));
        assert!(hour.loose_eq(&minutes));
    }

    #[test]
    fn test_loose_eq_coercion() {
        assert!(Value::string("1").loose_eq(&Value::number(1.0)));
        assert!(!Value::string("one").loose_eq(&Value::number(1.0)));
        assert!(!Value::string("1").loose_eq(&Value::string("01")));
    }

    #[test]
    fn test_mismatch_detection() {
        assert!(Value::number(1.0).mismatches(&Value::string("x")));
        assert!(!Value::number(1.0).mismatches(&Value::string("2")));
        assert!(Value::number(1.0).mismatches(&Value::duration(1.0, DurationUnit::Day)));
        assert!(!Value::duration(1.0, DurationUnit::Hour)
            .mismatches(&Value::duration(9.0, DurationUnit::Week)));
    }

    #[test]
    fn test_from_json_threads_paths() {
        let v = Value::from_json(&json!({"items": [{"name": "a"}]}), vec![]);
        let ValueData::Struct(fields) = &v.data else {
            panic!("expected struct");
        };
        let ValueData::Array(items) = &fields["items"].data else {
            panic!("expected array");
        };
        assert_eq!(
            items[0].path,
            vec![
                PathSegment::Key("items".into()),
                PathSegment::Index(0)
            ]
        );
    }

    #[test]
    fn test_from_json_detects_dates() {
        let v = Value::from_json(&json!("2021-03-31T12:00:00Z"), vec![]);
        assert_eq!(v.type_name(), "date");
        let v = Value::from_json(&json!("not a date"), vec![]);
        assert_eq!(v.type_name(), "string");
    }

    #[test]
    fn test_unwrap_round_trip() {
        let v = Value::from_json(&json!({"a": [1, "x", true, null]}), vec![]);
        assert_eq!(v.unwrap(), json!({"a": [1, "x", true, null]}));
        assert_eq!(
            Value::duration(2.0, DurationUnit::Second).unwrap(),
            json!(2000)
        );
    }
}
