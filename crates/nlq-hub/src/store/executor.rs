//! # Query Executor
//!
//! Evaluates a [`ParsedQuery`] against in-memory records with document-store
//! semantics: every fragment must hold, `ne` also matches a missing field,
//! and an array field matches `eq`/`in` when any element does.

use super::{Item, Page, PageMeta};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use nlq_core::{FilterFragment, FilterValue, Operator, ParsedQuery, SortDir};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;

pub fn execute(parsed: &ParsedQuery, items: &[Item], max_limit: u32) -> Page {
    let mut matched: Vec<&Item> = items
        .iter()
        .filter(|item| parsed.fragments().all(|fragment| matches(item, fragment)))
        .collect();
    let total = matched.len();

    let options = &parsed.options;
    if let Some(path) = options.sort_by.as_deref() {
        sort_items(&mut matched, path, options.sort_dir);
    }

    let limit = options.limit.map_or(max_limit, |l| l.min(max_limit));
    let offset = options.offset;
    let fields = options.fields.as_deref().filter(|f| !f.is_empty());

    let items = matched
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .map(|item| match fields {
            Some(fields) => project(item, fields),
            None => item.to_json(),
        })
        .collect();

    Page {
        items,
        meta: PageMeta {
            total,
            limit,
            offset,
        },
    }
}

// =============================================================================
// Field access
// =============================================================================

/// Resolves a dotted path. Unknown top-level names are looked up inside
/// `data`, so `category` finds `data.category`.
fn extract_field(item: &Item, path: &str) -> Option<Value> {
    match path {
        "_id" | "id" => return Some(Value::String(item.id.to_string())),
        "created_at" => return Some(Value::String(item.created_at.to_rfc3339())),
        "updated_at" => return Some(Value::String(item.updated_at.to_rfc3339())),
        "data" => return Some(item.data.clone()),
        _ => {}
    }

    let field = path.strip_prefix("data.").unwrap_or(path);
    let pointer = format!("/{}", field.replace('.', "/"));
    item.data.pointer(&pointer).filter(|v| !v.is_null()).cloned()
}

// =============================================================================
// Predicates
// =============================================================================

fn matches(item: &Item, fragment: &FilterFragment) -> bool {
    let Some(actual) = extract_field(item, &fragment.path) else {
        return fragment.op == Operator::Ne;
    };

    match (fragment.op, &fragment.value) {
        (Operator::Range, FilterValue::Range { start, end }) => {
            as_timestamp(&actual).map_or(false, |ts| *start <= ts && ts < *end)
        }
        (Operator::In, FilterValue::Set(set)) => {
            any_element(&actual, |v| set.iter().any(|s| *s == value_to_string(v)))
        }
        (Operator::In, FilterValue::Scalar(expected)) => {
            any_element(&actual, |v| values_equal(v, expected))
        }
        (Operator::Contains, FilterValue::Scalar(needle)) => value_to_string(&actual)
            .to_lowercase()
            .contains(&value_to_string(needle).to_lowercase()),
        (op, FilterValue::Scalar(expected)) => compare(&actual, op, expected),
        _ => false,
    }
}

fn compare(a: &Value, op: Operator, b: &Value) -> bool {
    match op {
        Operator::Eq => any_element(a, |v| values_equal(v, b)),
        Operator::Ne => !any_element(a, |v| values_equal(v, b)),
        Operator::Gt => numeric_cmp(a, b).map_or(false, |o| o == Ordering::Greater),
        Operator::Gte => numeric_cmp(a, b).map_or(false, |o| o != Ordering::Less),
        Operator::Lt => numeric_cmp(a, b).map_or(false, |o| o == Ordering::Less),
        Operator::Lte => numeric_cmp(a, b).map_or(false, |o| o != Ordering::Greater),
        _ => false,
    }
}

fn any_element(value: &Value, pred: impl Fn(&Value) -> bool) -> bool {
    match value {
        Value::Array(items) => items.iter().any(&pred),
        other => pred(other),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(an), Some(bn)) = (value_to_f64(a), value_to_f64(b)) {
        return (an - bn).abs() < f64::EPSILON;
    }
    value_to_string(a) == value_to_string(b)
}

fn numeric_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    let an = value_to_f64(a)?;
    let bn = value_to_f64(b)?;
    an.partial_cmp(&bn)
}

fn value_to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// RFC 3339 or a bare `YYYY-MM-DD` (midnight UTC).
fn as_timestamp(v: &Value) -> Option<DateTime<Utc>> {
    let s = v.as_str()?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

// =============================================================================
// Sort & projection
// =============================================================================

/// Missing values go last in either direction.
fn sort_items(items: &mut [&Item], path: &str, dir: SortDir) {
    items.sort_by_cached_key(|item| SortKey::of(extract_field(item, path)));
    if dir == SortDir::Desc {
        let present = items
            .iter()
            .position(|item| extract_field(item, path).is_none())
            .unwrap_or(items.len());
        items[..present].reverse();
    }
}

/// Ranked so mixed payloads still form a total order: numbers (including
/// numeric strings), then other strings, then any other JSON, then missing.
#[derive(Debug)]
enum SortKey {
    Number(f64),
    Text(String),
    Other(String),
    Missing,
}

impl SortKey {
    fn of(value: Option<Value>) -> Self {
        match value {
            None => SortKey::Missing,
            Some(v) => match value_to_f64(&v) {
                Some(n) => SortKey::Number(n),
                None => match v {
                    Value::String(s) => SortKey::Text(s),
                    other => SortKey::Other(other.to_string()),
                },
            },
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Number(_) => 0,
            SortKey::Text(_) => 1,
            SortKey::Other(_) => 2,
            SortKey::Missing => 3,
        }
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) | (SortKey::Other(a), SortKey::Other(b)) => {
                a.cmp(b)
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey {}

/// `{_id, data: {requested...}}`. When none of the requested payload fields
/// exist the full payload is returned instead.
fn project(item: &Item, fields: &[String]) -> Value {
    let mut out = Map::new();
    out.insert("_id".into(), json!(item.id));
    let mut data = Map::new();

    for field in fields {
        match field.as_str() {
            "_id" | "id" | "data" => {}
            "created_at" => {
                out.insert("created_at".into(), json!(item.created_at));
            }
            "updated_at" => {
                out.insert("updated_at".into(), json!(item.updated_at));
            }
            path => {
                if let Some(value) = extract_field(item, path) {
                    insert_path(&mut data, path.strip_prefix("data.").unwrap_or(path), value);
                }
            }
        }
    }

    let data = if data.is_empty() {
        item.data.clone()
    } else {
        Value::Object(data)
    };
    out.insert("data".into(), data);
    Value::Object(out)
}

fn insert_path(target: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(inner) = entry {
                insert_path(inner, rest, value);
            }
        }
    }
}
