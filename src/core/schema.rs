//! Typed column identities and cell values.
//!
//! Columns are addressed by [`ColumnKey`] everywhere inside the engine.
//! String names such as `sacc-1` or `fixd2_sacc2` only exist at the output
//! boundary, produced by [`ColumnKey::name`].

use crate::core::transforms::Transform;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Offsets
// ============================================================================

/// Inclusive range of signed offsets relative to the evaluated fixation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OffsetWindow {
    pub start: i32,
    pub end: i32,
}

impl OffsetWindow {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    /// `[-radius, radius]`.
    pub fn symmetric(radius: i32) -> Self {
        Self::new(-radius, radius)
    }

    pub fn contains(&self, offset: i32) -> bool {
        offset >= self.start && offset <= self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.end - self.start) as usize + 1
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> {
        self.start..=self.end
    }

    /// Offsets present in both windows; may be empty.
    pub fn intersect(&self, other: &OffsetWindow) -> OffsetWindow {
        OffsetWindow::new(self.start.max(other.start), self.end.min(other.end))
    }
}

impl Default for OffsetWindow {
    fn default() -> Self {
        Self::new(-1, 3)
    }
}

impl fmt::Display for OffsetWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl FromStr for OffsetWindow {
    type Err = String;

    /// Parse `start:end`, e.g. `-1:3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("expected `start:end`, got `{s}`"))?;
        let start = start
            .trim()
            .parse()
            .map_err(|e| format!("bad window start `{start}`: {e}"))?;
        let end = end
            .trim()
            .parse()
            .map_err(|e| format!("bad window end `{end}`: {e}"))?;
        Ok(Self::new(start, end))
    }
}

// ============================================================================
// Passthrough columns
// ============================================================================

/// Input columns carried unchanged into every derived table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Passthrough {
    Aoi,
    AoiId,
    Label,
    Fixcount,
}

impl Passthrough {
    pub const ALL: [Passthrough; 4] = [
        Passthrough::Aoi,
        Passthrough::AoiId,
        Passthrough::Label,
        Passthrough::Fixcount,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Passthrough::Aoi => "aoi",
            Passthrough::AoiId => "aoi_id",
            Passthrough::Label => "label",
            Passthrough::Fixcount => "fixcount",
        }
    }
}

impl fmt::Display for Passthrough {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Passthrough {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Passthrough::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown passthrough column `{wanted}`"))
    }
}

impl TryFrom<String> for Passthrough {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Passthrough> for String {
    fn from(value: Passthrough) -> Self {
        value.name().to_string()
    }
}

// ============================================================================
// Column keys
// ============================================================================

/// Operand of a pairwise combination: a feature group or an auxiliary column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureRef {
    Group(Transform),
    Aux(Passthrough),
}

impl FeatureRef {
    pub fn name(&self) -> &'static str {
        match self {
            FeatureRef::Group(t) => t.name(),
            FeatureRef::Aux(p) => p.name(),
        }
    }
}

/// Identity of one column of a derived table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    /// Value of `transform` at a signed offset from the evaluated fixation
    Window { transform: Transform, offset: i32 },
    /// Input column carried through
    Passthrough(Passthrough),
    /// All selected offsets of one transform fused together
    Group(Transform),
    /// Canonical unordered pair, lexicographically greater name first
    Pair { first: FeatureRef, second: FeatureRef },
    /// Two transforms at the same offset, greater name first
    OffsetPair {
        first: Transform,
        second: Transform,
        offset: i32,
    },
}

impl ColumnKey {
    /// Canonical pair key for two operands, regardless of argument order.
    pub fn pair(a: FeatureRef, b: FeatureRef) -> ColumnKey {
        if a.name() >= b.name() {
            ColumnKey::Pair { first: a, second: b }
        } else {
            ColumnKey::Pair { first: b, second: a }
        }
    }

    /// Canonical offset-aligned pair key.
    pub fn offset_pair(a: Transform, b: Transform, offset: i32) -> ColumnKey {
        let (first, second) = if a.name() >= b.name() { (a, b) } else { (b, a) };
        ColumnKey::OffsetPair {
            first,
            second,
            offset,
        }
    }

    /// Export-boundary column name.
    pub fn name(&self) -> String {
        match self {
            ColumnKey::Window { transform, offset } => format!("{}{}", transform.name(), offset),
            ColumnKey::Passthrough(p) => p.name().to_string(),
            ColumnKey::Group(t) => t.name().to_string(),
            ColumnKey::Pair { first, second } => format!("{}_{}", first.name(), second.name()),
            ColumnKey::OffsetPair {
                first,
                second,
                offset,
            } => format!("{}{offset}_{}{offset}", first.name(), second.name()),
        }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

// ============================================================================
// Values
// ============================================================================

/// One cell of a derived table.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FeatureValue {
    /// Unpopulated offset or undefined entry; never a computed zero
    #[default]
    Missing,
    Number(f64),
    Text(String),
}

impl FeatureValue {
    pub fn from_option(value: Option<f64>) -> Self {
        value.map(FeatureValue::Number).unwrap_or_default()
    }

    pub fn from_text(value: Option<&str>) -> Self {
        value
            .map(|s| FeatureValue::Text(s.to_string()))
            .unwrap_or_default()
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FeatureValue::Missing)
    }

    /// String form used in feature dictionaries and exports.
    pub fn render(&self) -> Option<String> {
        match self {
            FeatureValue::Missing => None,
            FeatureValue::Number(v) => Some(format_number(*v)),
            FeatureValue::Text(s) => Some(s.clone()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FeatureValue::Missing => serde_json::Value::Null,
            FeatureValue::Number(v) if is_integral(*v) => {
                serde_json::Value::Number((*v as i64).into())
            }
            FeatureValue::Number(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FeatureValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Join two operands as `first|second`, keeping each side's position.
    ///
    /// A missing side renders empty; the result is `Missing` only when both are.
    pub fn conjoin(first: &FeatureValue, second: &FeatureValue) -> FeatureValue {
        if first.is_missing() && second.is_missing() {
            return FeatureValue::Missing;
        }
        FeatureValue::Text(format!(
            "{}|{}",
            first.render().unwrap_or_default(),
            second.render().unwrap_or_default()
        ))
    }
}

fn is_integral(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15
}

/// Integer-valued floats render without a fractional part.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if is_integral(value) {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// How several cells are fused into one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    /// Left-to-right sum: numbers add, text concatenates
    #[default]
    Sum,
    /// Rendered values joined with `|`
    Concat,
}

impl Aggregate {
    /// Fuse the present values; `Missing` when none are present.
    pub fn fold<I>(&self, values: I) -> FeatureValue
    where
        I: IntoIterator<Item = FeatureValue>,
    {
        let present = values.into_iter().filter(|v| !v.is_missing());

        match self {
            Aggregate::Sum => present.fold(FeatureValue::Missing, |acc, value| match (acc, value) {
                (FeatureValue::Missing, value) => value,
                (FeatureValue::Number(a), FeatureValue::Number(b)) => FeatureValue::Number(a + b),
                (acc, value) => FeatureValue::Text(format!(
                    "{}{}",
                    acc.render().unwrap_or_default(),
                    value.render().unwrap_or_default()
                )),
            }),
            Aggregate::Concat => {
                let parts: Vec<String> = present.filter_map(|v| v.render()).collect();
                if parts.is_empty() {
                    FeatureValue::Missing
                } else {
                    FeatureValue::Text(parts.join("|"))
                }
            }
        }
    }
}

impl FromStr for Aggregate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sum" => Ok(Aggregate::Sum),
            "concat" => Ok(Aggregate::Concat),
            other => Err(format!("unknown aggregate `{other}` (sum, concat)")),
        }
    }
}
