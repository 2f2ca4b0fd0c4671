//! Whole-pipeline behavior: text in, ParsedQuery and rendered queries out.

use chrono::{DateTime, TimeZone, Utc};
use nlq_core::backend::{Dialect, DocumentStore, SqlJsonb};
use nlq_core::{parse, FilterValue, NlqParser, Operator, ParserConfig, QueryOverrides, SortDir};
use serde_json::json;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap()
}

#[test]
fn test_customer_report_query() {
    let parsed = parse(
        "top 5 customers where data.country equals US sort by data.revenue desc fields data.name,data.revenue",
        now(),
        None,
    );

    assert_eq!(parsed.filter.len(), 1);
    let country = &parsed.filter["data.country"];
    assert_eq!(country.op, Operator::Eq);
    assert_eq!(country.value, FilterValue::Scalar(json!("US")));

    assert_eq!(parsed.options.limit, Some(5));
    assert_eq!(parsed.options.offset, 0);
    assert_eq!(parsed.options.sort_by.as_deref(), Some("data.revenue"));
    assert_eq!(parsed.options.sort_dir, SortDir::Desc);
    assert_eq!(
        parsed.options.fields,
        Some(vec!["data.name".to_string(), "data.revenue".to_string()])
    );
    assert_eq!(parsed.unmatched, vec!["customers"]);
}

#[test]
fn test_last_seven_days() {
    let parsed = parse("last 7 days", now(), None);
    let fragment = &parsed.filter["created_at"];
    assert_eq!(fragment.op, Operator::Range);
    assert_eq!(
        fragment.value,
        FilterValue::Range {
            start: Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap(),
            end: now(),
        }
    );
}

#[test]
fn test_non_numeric_comparison_yields_empty_filter() {
    assert!(parse("age > abc", now(), None).filter.is_empty());
}

#[test]
fn test_empty_text_defaults() {
    let parsed = parse("", now(), None);
    assert!(parsed.filter.is_empty());
    assert_eq!(parsed.options.limit, Some(20));
    assert_eq!(parsed.options.offset, 0);
    assert_eq!(parsed.options.sort_dir, SortDir::Desc);
}

#[test]
fn test_override_limit_keeps_parsed_sort() {
    let overrides = QueryOverrides {
        limit: Some(10),
        ..Default::default()
    };
    let parsed = parse("top 5 sort by data.revenue asc", now(), Some(&overrides));
    assert_eq!(parsed.options.limit, Some(10));
    assert_eq!(parsed.options.sort_by.as_deref(), Some("data.revenue"));
    assert_eq!(parsed.options.sort_dir, SortDir::Asc);
}

#[test]
fn test_mixed_clauses() {
    let parsed = parse(
        "orders from the last 2 weeks with data.total at least 100 and data.note contains Gift Wrap category: books, toys skip 40",
        now(),
        None,
    );

    assert_eq!(parsed.filter["created_at"].op, Operator::Range);
    assert_eq!(parsed.filter["data.total"].op, Operator::Gte);
    assert_eq!(parsed.filter["data.total"].value, FilterValue::Scalar(json!(100)));
    assert_eq!(parsed.filter["data.note"].op, Operator::Contains);
    assert_eq!(parsed.filter["data.note"].value, FilterValue::Scalar(json!("Gift Wrap")));
    assert_eq!(
        parsed.filter["category"].value,
        FilterValue::Set(vec!["books".into(), "toys".into()])
    );
    assert_eq!(parsed.options.offset, 40);
}

#[test]
fn test_configured_parser_renders_document_query() {
    let parser = NlqParser::new(ParserConfig {
        default_limit: 50,
        temporal_path: "data.signed_up".into(),
        ..Default::default()
    });
    let parsed = parser.parse("yesterday data.plan in pro,team", now(), None);

    let query = DocumentStore::new(25).render(&parsed, "users");
    assert_eq!(query.collection, "users");
    assert_eq!(query.limit, 25);
    assert_eq!(query.filter["data.plan"], json!({ "$in": ["pro", "team"] }));
    assert_eq!(query.filter["data.signed_up"]["$gte"]["$date"], "2024-03-09T00:00:00Z");
    assert_eq!(query.filter["data.signed_up"]["$lt"]["$date"], "2024-03-10T00:00:00Z");
}

#[test]
fn test_sql_rendering_numbers_params_in_path_order() {
    let parsed = parse("data.age >= 21 data.country = 'US' limit 3 offset 6", now(), None);
    let query = SqlJsonb::default().render(&parsed, "items");

    // Filter keys are ordered, so params follow path order.
    assert_eq!(query.params, vec![json!(21), json!("US")]);
    assert_eq!(
        query.sql,
        "SELECT * FROM \"items\" WHERE (\"data\" ->> 'age')::numeric >= $1 AND (\"data\" ->> 'country') = $2 LIMIT 3 OFFSET 6"
    );
    assert_eq!(
        query.count_sql,
        "SELECT COUNT(*) FROM \"items\" WHERE (\"data\" ->> 'age')::numeric >= $1 AND (\"data\" ->> 'country') = $2"
    );
}

#[test]
fn test_sql_bare_paths_target_payload_like_the_document_filter() {
    let parsed = parse("category: toys country is US", now(), None);

    let sql = SqlJsonb::default().render(&parsed, "items");
    assert_eq!(
        sql.where_clause,
        "(\"data\" ->> 'category') = ANY($1) AND (\"data\" ->> 'country') = $2"
    );
    assert_eq!(sql.params, vec![json!(["toys"]), json!("US")]);

    let doc = DocumentStore::default().render(&parsed, "items");
    assert_eq!(doc.filter["category"], json!({ "$in": ["toys"] }));
    assert_eq!(doc.filter["country"], json!({ "$eq": "US" }));
}
