//! Mongo-style query documents.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::{Dialect, Modifier, DEFAULT_MAX_LIMIT};
use crate::types::{Operator, SortDir};

#[derive(Debug, Clone)]
pub struct DocumentStore {
    max_limit: u32,
}

impl DocumentStore {
    pub fn new(max_limit: u32) -> Self {
        Self { max_limit }
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LIMIT)
    }
}

/// Everything a `find` plus `count_documents` needs.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentQuery {
    pub collection: String,
    pub filter: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Value>,
    /// `(field, 1 | -1)` pairs.
    pub sort: Vec<(String, i32)>,
    pub skip: u32,
    pub limit: u32,
}

fn extended_date(ts: &DateTime<Utc>) -> Value {
    json!({ "$date": ts.to_rfc3339_opts(SecondsFormat::Secs, true) })
}

impl Dialect for DocumentStore {
    type Predicate = (String, Value);
    type Output = DocumentQuery;

    fn render_compare(&self, path: &str, op: Operator, value: &Value) -> (String, Value) {
        let key = match op {
            Operator::Ne => "$ne",
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
            _ => "$eq",
        };
        (path.to_string(), json!({ key: value }))
    }

    fn render_range(
        &self,
        path: &str,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> (String, Value) {
        (
            path.to_string(),
            json!({ "$gte": extended_date(start), "$lt": extended_date(end) }),
        )
    }

    fn render_in(&self, path: &str, values: &[String]) -> (String, Value) {
        (path.to_string(), json!({ "$in": values }))
    }

    fn render_contains(&self, path: &str, needle: &str) -> (String, Value) {
        (
            path.to_string(),
            json!({ "$regex": regex::escape(needle), "$options": "i" }),
        )
    }

    fn max_limit(&self) -> u32 {
        self.max_limit
    }

    fn finish(
        &self,
        target: &str,
        predicates: Vec<(String, Value)>,
        modifiers: Vec<Modifier>,
    ) -> DocumentQuery {
        let mut filter = Map::new();
        for (path, condition) in predicates {
            match (filter.get_mut(&path), condition) {
                (Some(Value::Object(existing)), Value::Object(more)) => existing.extend(more),
                (_, condition) => {
                    filter.insert(path, condition);
                }
            }
        }

        let mut query = DocumentQuery {
            collection: target.to_string(),
            filter: Value::Object(filter),
            projection: None,
            sort: Vec::new(),
            skip: 0,
            limit: self.max_limit,
        };
        for modifier in modifiers {
            match modifier {
                Modifier::Projection(fields) => {
                    let mut projection: Map<String, Value> =
                        fields.into_iter().map(|f| (f, json!(1))).collect();
                    projection.entry("_id").or_insert(json!(1));
                    query.projection = Some(Value::Object(projection));
                }
                Modifier::Sort { path, dir } => {
                    let direction = match dir {
                        SortDir::Asc => 1,
                        SortDir::Desc => -1,
                    };
                    query.sort = vec![(path, direction)];
                }
                Modifier::Page { limit, offset } => {
                    query.limit = limit;
                    query.skip = offset;
                }
            }
        }
        query
    }
}
