//! Postgres rendering over a table with a JSONB payload column.
//!
//! The table is `(id, data, created_at, updated_at)`. Those columns render as
//! quoted identifiers; every other path (`data.country`, or bare `country`)
//! becomes a `->>` / `#>>` extraction from the payload. Operands always travel
//! as positional `$n` parameters.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use super::{scalar_text, split_path, Dialect, Modifier, DEFAULT_MAX_LIMIT};
use crate::types::{Operator, SortDir};

/// Columns of the items table other than the payload.
const TABLE_COLUMNS: &[&str] = &["id", "created_at", "updated_at"];

#[derive(Debug, Clone)]
pub struct SqlJsonb {
    json_column: String,
    max_limit: u32,
}

impl SqlJsonb {
    pub fn new(json_column: impl Into<String>, max_limit: u32) -> Self {
        Self {
            json_column: json_column.into(),
            max_limit,
        }
    }

    /// Table columns render as themselves (`_id` is `id`); every other path
    /// resolves inside the payload column, with or without its prefix.
    fn column(&self, path: &str) -> Column {
        if path == "_id" {
            return Column::Plain(quote_ident("id"));
        }
        if path == self.json_column || TABLE_COLUMNS.contains(&path) {
            return Column::Plain(quote_ident(path));
        }
        let (head, mut keys) = split_path(path);
        if head != self.json_column {
            keys.insert(0, head);
        }
        let json = quote_ident(&self.json_column);
        let expr = match keys.as_slice() {
            [] => return Column::Plain(quote_ident(path)),
            [key] => format!("({} ->> {})", json, quote_literal(key)),
            _ => {
                let pointer = format!("{{{}}}", keys.join(","));
                format!("({} #>> {})", json, quote_literal(&pointer))
            }
        };
        Column::Json(expr)
    }
}

impl Default for SqlJsonb {
    fn default() -> Self {
        Self::new("data", DEFAULT_MAX_LIMIT)
    }
}

enum Column {
    Plain(String),
    /// Text extracted from the payload column.
    Json(String),
}

impl Column {
    fn text(&self) -> &str {
        match self {
            Self::Plain(c) | Self::Json(c) => c.as_str(),
        }
    }

    fn cast(&self, ty: &str) -> String {
        match self {
            Self::Plain(c) => c.clone(),
            Self::Json(e) => format!("{}::{}", e, ty),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Text(String),
    Param(Value),
}

/// A predicate whose parameters are numbered when the query is finished.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlPredicate {
    parts: Vec<Part>,
}

impl SqlPredicate {
    fn new() -> Self {
        Self { parts: Vec::new() }
    }

    fn text(mut self, s: impl Into<String>) -> Self {
        self.parts.push(Part::Text(s.into()));
        self
    }

    fn param(mut self, v: Value) -> Self {
        self.parts.push(Part::Param(v));
        self
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub count_sql: String,
    /// Boolean expression shared by both statements (`TRUE` when unfiltered).
    pub where_clause: String,
    pub params: Vec<Value>,
}

impl Dialect for SqlJsonb {
    type Predicate = SqlPredicate;
    type Output = SqlQuery;

    fn render_compare(&self, path: &str, op: Operator, value: &Value) -> SqlPredicate {
        let column = self.column(path);
        let symbol = match op {
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            _ => "=",
        };
        let ordered = matches!(op, Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte);
        if ordered && value.is_number() {
            SqlPredicate::new()
                .text(format!("{} {} ", column.cast("numeric"), symbol))
                .param(value.clone())
        } else {
            // ->> yields text, so equality compares text.
            SqlPredicate::new()
                .text(format!("{} {} ", column.text(), symbol))
                .param(Value::String(scalar_text(value)))
        }
    }

    fn render_range(&self, path: &str, start: &DateTime<Utc>, end: &DateTime<Utc>) -> SqlPredicate {
        let lhs = self.column(path).cast("timestamptz");
        SqlPredicate::new()
            .text(format!("({} >= ", lhs))
            .param(Value::String(start.to_rfc3339_opts(SecondsFormat::Secs, true)))
            .text(format!(" AND {} < ", lhs))
            .param(Value::String(end.to_rfc3339_opts(SecondsFormat::Secs, true)))
            .text(")")
    }

    fn render_in(&self, path: &str, values: &[String]) -> SqlPredicate {
        let items = values.iter().cloned().map(Value::String).collect();
        SqlPredicate::new()
            .text(format!("{} = ANY(", self.column(path).text()))
            .param(Value::Array(items))
            .text(")")
    }

    fn render_contains(&self, path: &str, needle: &str) -> SqlPredicate {
        SqlPredicate::new()
            .text(format!("{} ILIKE '%' || ", self.column(path).text()))
            .param(Value::String(escape_like(needle)))
            .text(" || '%'")
    }

    fn max_limit(&self) -> u32 {
        self.max_limit
    }

    fn finish(
        &self,
        target: &str,
        predicates: Vec<SqlPredicate>,
        modifiers: Vec<Modifier>,
    ) -> SqlQuery {
        let mut params = Vec::new();
        let mut clauses = Vec::with_capacity(predicates.len());
        for predicate in predicates {
            let mut clause = String::new();
            for part in predicate.parts {
                match part {
                    Part::Text(t) => clause.push_str(&t),
                    Part::Param(v) => {
                        params.push(v);
                        clause.push_str(&format!("${}", params.len()));
                    }
                }
            }
            clauses.push(clause);
        }
        let where_clause = if clauses.is_empty() {
            "TRUE".to_string()
        } else {
            clauses.join(" AND ")
        };

        let mut select = "*".to_string();
        let mut order = String::new();
        let mut page = String::new();
        for modifier in modifiers {
            match modifier {
                Modifier::Projection(fields) => {
                    let mut columns = Vec::with_capacity(fields.len() + 1);
                    if !fields.iter().any(|f| f == "id" || f == "_id") {
                        columns.push(quote_ident("id"));
                    }
                    for field in &fields {
                        columns.push(format!(
                            "{} AS {}",
                            self.column(field).text(),
                            quote_ident(field)
                        ));
                    }
                    select = columns.join(", ");
                }
                Modifier::Sort { path, dir } => {
                    let dir = match dir {
                        SortDir::Asc => "ASC",
                        SortDir::Desc => "DESC",
                    };
                    order = format!(" ORDER BY {} {}", self.column(&path).text(), dir);
                }
                Modifier::Page { limit, offset } => {
                    page = format!(" LIMIT {} OFFSET {}", limit, offset);
                }
            }
        }

        let table = quote_ident(target);
        SqlQuery {
            sql: format!(
                "SELECT {} FROM {} WHERE {}{}{}",
                select, table, where_clause, order, page
            ),
            count_sql: format!("SELECT COUNT(*) FROM {} WHERE {}", table, where_clause),
            where_clause,
            params,
        }
    }
}

fn quote_ident(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
