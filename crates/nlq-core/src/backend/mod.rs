//! # Backend Dialects
//!
//! A [`ParsedQuery`] is store-agnostic. A [`Dialect`] renders it into one
//! store's native representation through a fixed capability set: compare,
//! range, set membership, substring match, sort, page and projection.
//!
//! - [`sql::SqlJsonb`]: Postgres with a JSONB payload column.
//! - [`document::DocumentStore`]: Mongo-style query documents.

pub mod document;
pub mod sql;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{FilterFragment, FilterValue, Operator, ParsedQuery, SortDir};

pub use document::{DocumentQuery, DocumentStore};
pub use sql::{SqlJsonb, SqlQuery};

/// Backend-side cap on page size when none is configured.
pub const DEFAULT_MAX_LIMIT: u32 = 1000;

/// Which dialect a service renders its `filter` with.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DialectKind {
    #[default]
    Document,
    Sql,
}

/// Non-predicate parts of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    Sort { path: String, dir: SortDir },
    Page { limit: u32, offset: u32 },
    Projection(Vec<String>),
}

pub trait Dialect {
    type Predicate;
    type Output;

    /// `eq`, `ne`, `lt`, `lte`, `gt`, `gte`.
    fn render_compare(&self, path: &str, op: Operator, value: &Value) -> Self::Predicate;

    /// Half-open `[start, end)`.
    fn render_range(
        &self,
        path: &str,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> Self::Predicate;

    fn render_in(&self, path: &str, values: &[String]) -> Self::Predicate;

    /// Case-insensitive substring match.
    fn render_contains(&self, path: &str, needle: &str) -> Self::Predicate;

    fn max_limit(&self) -> u32;

    fn render_sort(&self, path: &str, dir: SortDir) -> Modifier {
        Modifier::Sort {
            path: path.to_string(),
            dir,
        }
    }

    /// Clamps the limit to [`Dialect::max_limit`]; no limit means the max.
    fn render_page(&self, limit: Option<u32>, offset: u32) -> Modifier {
        let max = self.max_limit();
        Modifier::Page {
            limit: limit.map_or(max, |l| l.min(max)),
            offset,
        }
    }

    fn render_projection(&self, fields: &[String]) -> Modifier {
        Modifier::Projection(fields.to_vec())
    }

    /// Combines predicates (implicit AND) and modifiers for `target`.
    fn finish(
        &self,
        target: &str,
        predicates: Vec<Self::Predicate>,
        modifiers: Vec<Modifier>,
    ) -> Self::Output;

    /// Dispatches a fragment by operator. Operator/value pairs that make no
    /// sense (a range operator on a scalar, say) render nothing.
    fn render_fragment(&self, fragment: &FilterFragment) -> Option<Self::Predicate> {
        let path = fragment.path.as_str();
        match (fragment.op, &fragment.value) {
            (Operator::Range, FilterValue::Range { start, end }) => {
                Some(self.render_range(path, start, end))
            }
            (Operator::In, FilterValue::Set(items)) => Some(self.render_in(path, items)),
            (Operator::In, FilterValue::Scalar(v)) => {
                Some(self.render_in(path, &[scalar_text(v)]))
            }
            (Operator::Contains, FilterValue::Scalar(v)) => {
                Some(self.render_contains(path, &scalar_text(v)))
            }
            (op, FilterValue::Scalar(v)) if op.is_comparison() => {
                Some(self.render_compare(path, op, v))
            }
            (op, _) => {
                tracing::debug!(path, %op, "operator does not fit value, skipping fragment");
                None
            }
        }
    }

    fn render(&self, parsed: &ParsedQuery, target: &str) -> Self::Output {
        let predicates = parsed
            .fragments()
            .filter_map(|fragment| self.render_fragment(fragment))
            .collect();

        let options = &parsed.options;
        let mut modifiers = Vec::new();
        if let Some(fields) = options.fields.as_deref().filter(|f| !f.is_empty()) {
            modifiers.push(self.render_projection(fields));
        }
        if let Some(path) = options.sort_by.as_deref() {
            modifiers.push(self.render_sort(path, options.sort_dir));
        }
        modifiers.push(self.render_page(options.limit, options.offset));

        self.finish(target, predicates, modifiers)
    }
}

/// A scalar as plain text (strings unquoted).
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Splits `data.a.b` into `("data", ["a", "b"])`.
pub fn split_path(path: &str) -> (&str, Vec<&str>) {
    let mut parts = path.split('.');
    let head = parts.next().unwrap_or(path);
    (head, parts.filter(|p| !p.is_empty()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse, QueryOverrides};
    use chrono::TimeZone;

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("data.a.b"), ("data", vec!["a", "b"]));
        assert_eq!(split_path("created_at"), ("created_at", vec![]));
    }

    #[test]
    fn test_page_is_clamped() {
        let store = DocumentStore::new(50);
        assert_eq!(store.render_page(Some(500), 3), Modifier::Page { limit: 50, offset: 3 });
        assert_eq!(store.render_page(None, 0), Modifier::Page { limit: 50, offset: 0 });
    }

    #[test]
    fn test_mismatched_fragment_renders_nothing() {
        let store = DocumentStore::default();
        let bad = FilterFragment::scalar("created_at", Operator::Range, serde_json::json!("x"));
        assert!(store.render_fragment(&bad).is_none());
    }

    #[test]
    fn test_both_dialects_render_the_same_parse() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        let overrides = QueryOverrides {
            fields: Some(vec!["data.name".into()]),
            ..Default::default()
        };
        let parsed = parse(
            "data.country equals US data.age >= 18 sort by data.age asc",
            now,
            Some(&overrides),
        );

        let sql = SqlJsonb::default().render(&parsed, "items");
        assert_eq!(sql.params.len(), 2);
        assert!(sql.sql.contains("ORDER BY"));

        let doc = DocumentStore::default().render(&parsed, "items");
        assert_eq!(doc.filter["data.country"]["$eq"], "US");
        assert_eq!(doc.sort, vec![("data.age".to_string(), 1)]);
    }
}
