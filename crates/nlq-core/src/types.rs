//! # Query Model
//!
//! Filter fragments, result options and the assembled [`ParsedQuery`] handed
//! to a backend adapter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Result limit applied when neither the text nor the caller sets one.
pub const DEFAULT_LIMIT: u32 = 20;

/// Predicate operator of a [`FilterFragment`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Contains,
    Range,
}

impl Operator {
    /// True for the six scalar comparison operators.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Lte | Self::Gt | Self::Gte
        )
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Eq => write!(f, "eq"),
            Self::Ne => write!(f, "ne"),
            Self::Lt => write!(f, "lt"),
            Self::Lte => write!(f, "lte"),
            Self::Gt => write!(f, "gt"),
            Self::Gte => write!(f, "gte"),
            Self::In => write!(f, "in"),
            Self::Contains => write!(f, "contains"),
            Self::Range => write!(f, "range"),
        }
    }
}

/// Operand of a fragment.
///
/// Variant order matters for untagged deserialization: `Scalar` accepts any
/// JSON value and must come last.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FilterValue {
    /// Half-open `[start, end)` interval.
    Range {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    Set(Vec<String>),
    /// A number or a string.
    Scalar(serde_json::Value),
}

/// One unit of filter intent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterFragment {
    /// Dotted field reference, e.g. `data.country`.
    pub path: String,
    pub op: Operator,
    pub value: FilterValue,
}

impl FilterFragment {
    pub fn new(path: impl Into<String>, op: Operator, value: FilterValue) -> Self {
        Self {
            path: path.into(),
            op,
            value,
        }
    }

    pub fn scalar(path: impl Into<String>, op: Operator, value: serde_json::Value) -> Self {
        Self::new(path, op, FilterValue::Scalar(value))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

impl SortDir {
    /// Maps `asc`/`ascending`/`desc`/`descending` (any case).
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(Self::Asc),
            "desc" | "descending" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl FromStr for SortDir {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_keyword(s).ok_or_else(|| format!("invalid sort direction '{}'", s))
    }
}

impl std::fmt::Display for SortDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pagination, sort and projection parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Options {
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_dir: SortDir,
    #[serde(default)]
    pub fields: Option<Vec<String>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            limit: Some(DEFAULT_LIMIT),
            offset: 0,
            sort_by: None,
            sort_dir: SortDir::Desc,
            fields: None,
        }
    }
}

/// Caller-supplied options that take precedence over parsed ones,
/// field by field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryOverrides {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_dir: Option<SortDir>,
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    /// Collection or table the query runs against.
    #[serde(default)]
    pub target: Option<String>,
}

/// Output of the parser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedQuery {
    /// Query text with whitespace collapsed, original casing kept.
    pub original_text: String,
    /// One fragment per unique path.
    pub filter: BTreeMap<String, FilterFragment>,
    pub options: Options,
    /// Words no extractor consumed (filler words excluded).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unmatched: Vec<String>,
}

impl ParsedQuery {
    pub fn fragments(&self) -> impl Iterator<Item = &FilterFragment> {
        self.filter.values()
    }

    pub fn get(&self, path: &str) -> Option<&FilterFragment> {
        self.filter.get(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_options() {
        let opts = Options::default();
        assert_eq!(opts.limit, Some(20));
        assert_eq!(opts.offset, 0);
        assert_eq!(opts.sort_dir, SortDir::Desc);
        assert!(opts.sort_by.is_none());
        assert!(opts.fields.is_none());
    }

    #[test]
    fn test_sort_dir_keywords() {
        assert_eq!(SortDir::from_keyword("ASC"), Some(SortDir::Asc));
        assert_eq!(SortDir::from_keyword("descending"), Some(SortDir::Desc));
        assert_eq!(SortDir::from_keyword("sideways"), None);
        assert!("up".parse::<SortDir>().is_err());
    }

    #[test]
    fn test_filter_value_serializes_untagged() {
        let start = Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        let frag =
            FilterFragment::new("created_at", Operator::Range, FilterValue::Range { start, end });
        let json = serde_json::to_value(&frag).unwrap();
        assert_eq!(json["op"], "range");
        assert_eq!(json["value"]["start"], "2024-03-03T00:00:00Z");

        let set: FilterValue = serde_json::from_str(r#"["a","b"]"#).unwrap();
        assert_eq!(set, FilterValue::Set(vec!["a".into(), "b".into()]));
        let scalar: FilterValue = serde_json::from_str("42").unwrap();
        assert_eq!(scalar, FilterValue::Scalar(serde_json::json!(42)));
    }

    #[test]
    fn test_overrides_deserialize_partial() {
        let o: QueryOverrides =
            serde_json::from_str(r#"{"limit": 10, "sort_dir": "asc"}"#).unwrap();
        assert_eq!(o.limit, Some(10));
        assert_eq!(o.sort_dir, Some(SortDir::Asc));
        assert!(o.fields.is_none());
    }
}
