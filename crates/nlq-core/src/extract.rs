//! # Clause Extractors
//!
//! Precedence is data: [`EXTRACTORS`] is an ordered table of pattern +
//! handler pairs. Each extractor scans the folded text left to right, hands
//! every match to its handler, and masks the span the handler claims so later
//! extractors cannot see it. A handler that returns `None` leaves the text
//! untouched.
//!
//! Order:
//! ```text
//! relative dates > numeric comparisons > equality > inclusion > contains
//!   > sort > limit/offset > projection
//! ```

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use regex::{Captures, Regex};
use serde_json::Value;
use std::ops::Range;
use std::sync::OnceLock;

use crate::config::ParserConfig;
use crate::normalize::Scan;
use crate::types::{FilterFragment, FilterValue, Operator, SortDir};
use crate::values;

macro_rules! path_re {
    () => {
        r"[a-z_][a-z0-9_]*(?:\.[a-z0-9_]+)*"
    };
}

macro_rules! value_re {
    () => {
        r#"(?:"(?P<dq>[^"\x1f]*)"|'(?P<sq>[^'\x1f]*)'|(?P<bare>[^\s\x1f]+))"#
    };
}

macro_rules! list_re {
    () => {
        r"[^\s\x1f,]+(?:\s*,\s*[^\s\x1f,]+)*"
    };
}

macro_rules! date_lead_re {
    () => {
        r"(?:(?:in|within|during|over|from|for|since)\s+(?:the\s+)?)?"
    };
}

/// Words that end a free-text `contains` operand.
const CLAUSE_KEYWORDS: &[&str] = &[
    "sort", "order", "top", "limit", "first", "offset", "skip", "fields", "select", "columns",
    "and", "where", "with",
];

/// Words that can never be a field path.
const RESERVED_PATHS: &[&str] = &[
    "is", "not", "in", "by", "sort", "order", "top", "limit", "first", "offset", "skip", "fields",
    "select", "columns", "where", "and", "with", "last", "past", "today", "yesterday", "the",
];

/// Bare words that can never be an equality operand.
const RESERVED_VALUES: &[&str] = &[
    "greater", "less", "more", "above", "below", "under", "over", "at", "not", "than", "in", "one",
    "like", "contains", "containing",
];

/// Filler words not worth reporting as unmatched.
pub const FILLER_WORDS: &[&str] = &[
    "show", "me", "all", "where", "and", "with", "the", "find", "list", "get", "by", "of", "for",
    "a", "an",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseFamily {
    RelativeDate,
    Comparison,
    Equality,
    Inclusion,
    Contains,
    Sort,
    Shape,
    Projection,
}

/// A change to the result options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionUpdate {
    Limit(u32),
    Offset(u32),
    Sort { path: String, dir: SortDir },
    Fields(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Filter(FilterFragment),
    Options(OptionUpdate),
}

/// A clause plus where it started in the normalized text.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub position: usize,
    pub extractor: &'static str,
    pub clause: Clause,
}

/// Per-parse inputs shared by every handler.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    /// Single reading of the clock for the whole parse.
    pub now: DateTime<Utc>,
    pub config: &'a ParserConfig,
}

/// What a handler accepted and how much text it consumed.
#[derive(Debug)]
pub struct Claim {
    clause: Clause,
    span: Range<usize>,
}

/// A pattern match with access to both the folded and the raw text.
pub struct ClauseMatch<'t> {
    caps: Captures<'t>,
    raw: &'t str,
}

impl<'t> ClauseMatch<'t> {
    fn span(&self) -> Range<usize> {
        self.caps.get(0).map_or(0..0, |m| m.range())
    }

    fn range(&self, group: &str) -> Option<Range<usize>> {
        self.caps.name(group).map(|m| m.range())
    }

    fn folded(&self, group: &str) -> Option<&'t str> {
        self.caps.name(group).map(|m| m.as_str())
    }

    fn raw(&self, group: &str) -> Option<&'t str> {
        let raw = self.raw;
        self.range(group).map(|r| &raw[r])
    }

    fn claim(&self, clause: Clause) -> Option<Claim> {
        Some(Claim {
            clause,
            span: self.span(),
        })
    }

    fn claim_until(&self, end: usize, clause: Clause) -> Option<Claim> {
        Some(Claim {
            clause,
            span: self.span().start..end,
        })
    }
}

type Handler = fn(&ClauseMatch<'_>, &ParseContext<'_>) -> Option<Claim>;

/// One row of the precedence table.
pub struct ExtractorDef {
    pub name: &'static str,
    pub family: ClauseFamily,
    pub pattern: &'static str,
    handler: Handler,
}

/// Extractors in the order they run.
pub static EXTRACTORS: &[ExtractorDef] = &[
    ExtractorDef {
        name: "relative_day",
        family: ClauseFamily::RelativeDate,
        pattern: concat!(r"\b", date_lead_re!(), r"(?P<day>today|yesterday)\b"),
        handler: relative_day,
    },
    ExtractorDef {
        name: "relative_span",
        family: ClauseFamily::RelativeDate,
        pattern: concat!(
            r"\b",
            date_lead_re!(),
            r"(?:last|past)\s+(?:(?P<n>\d+)\s+)?(?P<unit>days?|weeks?|months?)\b"
        ),
        handler: relative_span,
    },
    ExtractorDef {
        name: "comparison_symbol",
        family: ClauseFamily::Comparison,
        pattern: concat!(
            r"\b(?P<path>",
            path_re!(),
            r")\s*(?P<op>>=|<=|>|<)\s*(?P<value>[^\s\x1f]+)"
        ),
        handler: symbolic_comparison,
    },
    ExtractorDef {
        name: "comparison_words",
        family: ClauseFamily::Comparison,
        pattern: concat!(
            r"\b(?P<path>",
            path_re!(),
            r")\s+(?:is\s+)?(?P<op>greater\s+than\s+or\s+equal\s+to|less\s+than\s+or\s+equal\s+to|greater\s+than|more\s+than|less\s+than|at\s+least|at\s+most|above|over|below|under)\s+(?P<value>[^\s\x1f]+)"
        ),
        handler: worded_comparison,
    },
    ExtractorDef {
        name: "equality_symbol",
        family: ClauseFamily::Equality,
        pattern: concat!(
            r"\b(?P<path>",
            path_re!(),
            r")\s*(?P<op>!=|==|=)\s*",
            value_re!()
        ),
        handler: symbolic_equality,
    },
    ExtractorDef {
        name: "equality_words",
        family: ClauseFamily::Equality,
        pattern: concat!(
            r"\b(?P<path>",
            path_re!(),
            r")\s+(?P<op>is\s+not|isn't|not\s+equals?|does\s+not\s+equal|doesn't\s+equal|equals?|is)\s+",
            value_re!()
        ),
        handler: worded_equality,
    },
    ExtractorDef {
        name: "category_shorthand",
        family: ClauseFamily::Inclusion,
        pattern: concat!(r"\bcategory\s*:\s*(?P<values>", list_re!(), ")"),
        handler: category_shorthand,
    },
    ExtractorDef {
        name: "inclusion",
        family: ClauseFamily::Inclusion,
        pattern: concat!(
            r"\b(?P<path>",
            path_re!(),
            r")\s+(?:is\s+)?(?:in|one\s+of)\s+(?P<values>",
            list_re!(),
            ")"
        ),
        handler: inclusion,
    },
    ExtractorDef {
        name: "contains",
        family: ClauseFamily::Contains,
        pattern: concat!(
            r"\b(?P<path>",
            path_re!(),
            r")\s+(?:contains|containing|like)\s+(?P<value>[^\x1f]+)"
        ),
        handler: contains,
    },
    ExtractorDef {
        name: "sort",
        family: ClauseFamily::Sort,
        pattern: concat!(
            r"\b(?:sort(?:ed)?|order(?:ed)?)\s+by\s+(?P<path>",
            path_re!(),
            r")(?:\s+(?P<dir>ascending|descending|asc|desc)\b)?"
        ),
        handler: sort,
    },
    ExtractorDef {
        name: "limit",
        family: ClauseFamily::Shape,
        pattern: r"\b(?:top|limit|first)\s+(?P<n>\d+)\b",
        handler: limit,
    },
    ExtractorDef {
        name: "offset",
        family: ClauseFamily::Shape,
        pattern: r"\b(?:offset|skip)\s+(?P<n>\d+)\b",
        handler: offset,
    },
    ExtractorDef {
        name: "projection",
        family: ClauseFamily::Projection,
        pattern: concat!(
            r"\b(?:fields|select|columns)\s+(?P<list>",
            path_re!(),
            r"(?:\s*,\s*",
            path_re!(),
            ")*)"
        ),
        handler: projection,
    },
];

/// An [`ExtractorDef`] with its pattern compiled.
pub struct Extractor {
    def: &'static ExtractorDef,
    regex: Regex,
}

impl Extractor {
    pub fn name(&self) -> &'static str {
        self.def.name
    }

    pub fn family(&self) -> ClauseFamily {
        self.def.family
    }

    /// Runs this extractor over `scan`, returning the remaining text and
    /// what was found, in text order.
    pub fn extract(&self, scan: &Scan, ctx: &ParseContext<'_>) -> (Scan, Vec<Extracted>) {
        let text = scan.folded();
        let mut spans = Vec::new();
        let mut found = Vec::new();
        let mut at = 0;

        while at < text.len() {
            let Some(caps) = self.regex.captures_at(text, at) else {
                break;
            };
            let m = ClauseMatch {
                caps,
                raw: scan.raw(),
            };
            let whole = m.span();

            match (self.def.handler)(&m, ctx) {
                Some(claim) => {
                    tracing::debug!(
                        extractor = self.def.name,
                        clause = &text[claim.span.clone()],
                        "clause extracted"
                    );
                    at = advance(text, whole.start, claim.span.end);
                    found.push(Extracted {
                        position: claim.span.start,
                        extractor: self.def.name,
                        clause: claim.clause,
                    });
                    spans.push(claim.span);
                }
                None => {
                    tracing::debug!(
                        extractor = self.def.name,
                        clause = &text[whole.clone()],
                        "clause rejected"
                    );
                    at = advance(text, whole.start, whole.start);
                }
            }
        }

        (scan.masked(&spans), found)
    }
}

/// The compiled table, built once per process.
pub fn extractors() -> &'static [Extractor] {
    static COMPILED: OnceLock<Vec<Extractor>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        EXTRACTORS
            .iter()
            .map(|def| Extractor {
                def,
                regex: Regex::new(def.pattern).expect("extractor pattern must compile"),
            })
            .collect()
    })
}

/// Runs every extractor in order over the shrinking text.
pub fn run(scan: Scan, ctx: &ParseContext<'_>) -> (Scan, Vec<Extracted>) {
    extractors()
        .iter()
        .fold((scan, Vec::new()), |(scan, mut all), extractor| {
            let (rest, found) = extractor.extract(&scan, ctx);
            all.extend(found);
            (rest, all)
        })
}

/// Next search position: `to` if it moves forward, else one char past `from`.
fn advance(text: &str, from: usize, to: usize) -> usize {
    if to > from {
        to
    } else {
        from + text[from..].chars().next().map_or(1, char::len_utf8)
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn field_path(m: &ClauseMatch<'_>) -> Option<String> {
    let path = m.folded("path")?;
    (!RESERVED_PATHS.contains(&path)).then(|| path.to_string())
}

fn filter(path: String, op: Operator, value: FilterValue) -> Clause {
    Clause::Filter(FilterFragment::new(path, op, value))
}

fn date_range(ctx: &ParseContext<'_>, start: DateTime<Utc>, end: DateTime<Utc>) -> Clause {
    filter(
        ctx.config.temporal_path.clone(),
        Operator::Range,
        FilterValue::Range { start, end },
    )
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN))
}

fn relative_day(m: &ClauseMatch<'_>, ctx: &ParseContext<'_>) -> Option<Claim> {
    let midnight = start_of_day(ctx.now);
    let one_day = Duration::try_days(1)?;
    let (start, end) = match m.folded("day")? {
        "today" => (midnight, midnight.checked_add_signed(one_day)?),
        "yesterday" => (midnight.checked_sub_signed(one_day)?, midnight),
        _ => return None,
    };
    m.claim(date_range(ctx, start, end))
}

/// `last N weeks` is N×7 days and `last N months` N×30 days.
fn relative_span(m: &ClauseMatch<'_>, ctx: &ParseContext<'_>) -> Option<Claim> {
    let n = match m.folded("n") {
        Some(digits) => values::parse_count(digits)?,
        None => 1,
    };
    let unit = m.folded("unit")?;
    let days_per_unit: i64 = if unit.starts_with("week") {
        7
    } else if unit.starts_with("month") {
        30
    } else {
        1
    };
    let days = i64::from(n).checked_mul(days_per_unit)?;
    let start = ctx.now.checked_sub_signed(Duration::try_days(days)?)?;
    m.claim(date_range(ctx, start, ctx.now))
}

fn symbolic_comparison(m: &ClauseMatch<'_>, _ctx: &ParseContext<'_>) -> Option<Claim> {
    let op = match m.folded("op")? {
        ">=" => Operator::Gte,
        "<=" => Operator::Lte,
        ">" => Operator::Gt,
        "<" => Operator::Lt,
        _ => return None,
    };
    numeric_comparison(m, op)
}

fn worded_comparison(m: &ClauseMatch<'_>, _ctx: &ParseContext<'_>) -> Option<Claim> {
    let op = match m.folded("op")? {
        "greater than" | "more than" | "above" | "over" => Operator::Gt,
        "less than" | "below" | "under" => Operator::Lt,
        "at least" | "greater than or equal to" => Operator::Gte,
        "at most" | "less than or equal to" => Operator::Lte,
        _ => return None,
    };
    numeric_comparison(m, op)
}

/// Non-numeric operands reject the whole clause.
fn numeric_comparison(m: &ClauseMatch<'_>, op: Operator) -> Option<Claim> {
    let path = field_path(m)?;
    let value = values::parse_number(m.folded("value")?)?;
    m.claim(filter(path, op, FilterValue::Scalar(value)))
}

fn symbolic_equality(m: &ClauseMatch<'_>, _ctx: &ParseContext<'_>) -> Option<Claim> {
    let op = match m.folded("op")? {
        "=" | "==" => Operator::Eq,
        "!=" => Operator::Ne,
        _ => return None,
    };
    equality(m, op)
}

fn worded_equality(m: &ClauseMatch<'_>, _ctx: &ParseContext<'_>) -> Option<Claim> {
    let op = match m.folded("op")? {
        "is" | "equal" | "equals" => Operator::Eq,
        "is not" | "isn't" | "not equal" | "not equals" | "does not equal" | "doesn't equal" => {
            Operator::Ne
        }
        _ => return None,
    };
    equality(m, op)
}

fn equality(m: &ClauseMatch<'_>, op: Operator) -> Option<Claim> {
    let path = field_path(m)?;
    let value = literal(m)?;
    m.claim(filter(path, op, FilterValue::Scalar(value)))
}

/// Quoted operands stay strings; bare ones become numbers when they parse.
fn literal(m: &ClauseMatch<'_>) -> Option<Value> {
    if let Some(quoted) = m.raw("dq").or_else(|| m.raw("sq")) {
        return Some(Value::String(quoted.to_string()));
    }
    let bare = m.folded("bare")?;
    if RESERVED_VALUES.contains(&bare) || CLAUSE_KEYWORDS.contains(&bare) {
        return None;
    }
    Some(values::parse_scalar(m.raw("bare")?))
}

fn set_values(raw: &str) -> Option<Vec<String>> {
    let items = values::dedup_preserving(
        values::split_list(raw)
            .iter()
            .map(|v| values::unquote(v))
            .filter(|v| !v.is_empty()),
    );
    (!items.is_empty()).then_some(items)
}

fn category_shorthand(m: &ClauseMatch<'_>, ctx: &ParseContext<'_>) -> Option<Claim> {
    let items = set_values(m.raw("values")?)?;
    m.claim(filter(
        ctx.config.category_path.clone(),
        Operator::In,
        FilterValue::Set(items),
    ))
}

fn inclusion(m: &ClauseMatch<'_>, _ctx: &ParseContext<'_>) -> Option<Claim> {
    let path = field_path(m)?;
    let items = set_values(m.raw("values")?)?;
    m.claim(filter(path, Operator::In, FilterValue::Set(items)))
}

/// The operand runs to the next clause keyword, consumed text, or the end.
fn contains(m: &ClauseMatch<'_>, _ctx: &ParseContext<'_>) -> Option<Claim> {
    let path = field_path(m)?;
    let range = m.range("value")?;
    let folded = m.folded("value")?;
    let cut = values::keyword_cut(folded, CLAUSE_KEYWORDS);
    let kept = folded[..cut].trim_end().len();
    let end = range.start + kept;
    let needle = values::unquote(&m.raw[range.start..end]);
    if needle.is_empty() {
        return None;
    }
    let clause = filter(
        path,
        Operator::Contains,
        FilterValue::Scalar(Value::String(needle.to_string())),
    );
    m.claim_until(end, clause)
}

fn sort(m: &ClauseMatch<'_>, _ctx: &ParseContext<'_>) -> Option<Claim> {
    let path = field_path(m)?;
    let dir = m
        .folded("dir")
        .and_then(SortDir::from_keyword)
        .unwrap_or_default();
    m.claim(Clause::Options(OptionUpdate::Sort { path, dir }))
}

fn limit(m: &ClauseMatch<'_>, _ctx: &ParseContext<'_>) -> Option<Claim> {
    let n = values::parse_count(m.folded("n")?)?;
    m.claim(Clause::Options(OptionUpdate::Limit(n)))
}

fn offset(m: &ClauseMatch<'_>, _ctx: &ParseContext<'_>) -> Option<Claim> {
    let n = values::parse_offset(m.folded("n")?)?;
    m.claim(Clause::Options(OptionUpdate::Offset(n)))
}

fn projection(m: &ClauseMatch<'_>, _ctx: &ParseContext<'_>) -> Option<Claim> {
    let fields = values::split_list(m.folded("list")?);
    if fields.is_empty() {
        return None;
    }
    m.claim(Clause::Options(OptionUpdate::Fields(fields)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 15, 30, 0).unwrap()
    }

    fn run_text(text: &str) -> (Scan, Vec<Extracted>) {
        let config = ParserConfig::default();
        let ctx = ParseContext {
            now: now(),
            config: &config,
        };
        run(Scan::new(text), &ctx)
    }

    fn filters(text: &str) -> Vec<FilterFragment> {
        run_text(text)
            .1
            .into_iter()
            .filter_map(|e| match e.clause {
                Clause::Filter(f) => Some(f),
                Clause::Options(_) => None,
            })
            .collect()
    }

    fn updates(text: &str) -> Vec<OptionUpdate> {
        run_text(text)
            .1
            .into_iter()
            .filter_map(|e| match e.clause {
                Clause::Options(u) => Some(u),
                Clause::Filter(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(extractors().len(), EXTRACTORS.len());
    }

    #[test]
    fn test_table_order_puts_specific_before_generic() {
        let families: Vec<ClauseFamily> = extractors().iter().map(|e| e.family()).collect();
        let pos = |f: ClauseFamily| families.iter().position(|x| *x == f).unwrap();
        assert!(pos(ClauseFamily::RelativeDate) < pos(ClauseFamily::Comparison));
        assert!(pos(ClauseFamily::Comparison) < pos(ClauseFamily::Equality));
        assert!(pos(ClauseFamily::Equality) < pos(ClauseFamily::Contains));
    }

    #[test]
    fn test_today_and_yesterday() {
        let f = filters("orders today");
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].path, "created_at");
        assert_eq!(
            f[0].value,
            FilterValue::Range {
                start: Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap(),
            }
        );

        let f = filters("yesterday");
        assert_eq!(
            f[0].value,
            FilterValue::Range {
                start: Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap(),
            }
        );
    }

    #[test]
    fn test_last_weeks_and_months_use_fixed_days() {
        let f = filters("last 2 weeks");
        assert_eq!(
            f[0].value,
            FilterValue::Range {
                start: now() - Duration::days(14),
                end: now()
            }
        );

        let f = filters("in the past 3 months");
        assert_eq!(
            f[0].value,
            FilterValue::Range {
                start: now() - Duration::days(90),
                end: now()
            }
        );
    }

    #[test]
    fn test_last_without_count_means_one() {
        let f = filters("last week");
        assert_eq!(
            f[0].value,
            FilterValue::Range {
                start: now() - Duration::days(7),
                end: now()
            }
        );
    }

    #[test]
    fn test_date_lead_is_not_read_as_inclusion() {
        let (rest, found) = run_text("created_at in the last 7 days");
        assert_eq!(found.len(), 1);
        assert_eq!(rest.remaining_words(), vec!["created_at"]);
    }

    #[test]
    fn test_absurd_span_is_dropped() {
        assert!(filters("last 4000000000 months").is_empty());
        assert!(filters("last 0 days").is_empty());
    }

    #[test]
    fn test_symbolic_comparisons() {
        let f = filters("age >= 21 score<9.5");
        assert_eq!(f[0], FilterFragment::scalar("age", Operator::Gte, serde_json::json!(21)));
        assert_eq!(f[1], FilterFragment::scalar("score", Operator::Lt, serde_json::json!(9.5)));
    }

    #[test]
    fn test_worded_comparisons() {
        let f = filters("data.revenue is greater than 1000 and age at most 30");
        assert_eq!(f[0].op, Operator::Gt);
        assert_eq!(f[0].path, "data.revenue");
        assert_eq!(f[1].op, Operator::Lte);
        assert_eq!(f[1].value, FilterValue::Scalar(serde_json::json!(30)));
    }

    #[test]
    fn test_non_numeric_comparison_is_left_unconsumed() {
        let (rest, found) = run_text("age > abc");
        assert!(found.is_empty());
        assert_eq!(rest.remaining_words(), vec!["age", ">", "abc"]);
    }

    #[test]
    fn test_equality_keeps_value_case() {
        let f = filters("Data.Country equals US");
        assert_eq!(
            f[0],
            FilterFragment::scalar("data.country", Operator::Eq, serde_json::json!("US"))
        );
    }

    #[test]
    fn test_equality_variants() {
        let f = filters("status is not closed tier = 2 name is \"Ada Lovelace\" code equals '42'");
        assert_eq!(f[0].op, Operator::Eq);
        assert_eq!(f[0].path, "tier");
        assert_eq!(f[1].op, Operator::Ne);
        assert_eq!(f[1].path, "status");
        // Matches are collected per extractor, symbol forms first.
        assert_eq!(f[2].value, FilterValue::Scalar(serde_json::json!("Ada Lovelace")));
        assert_eq!(f[3].value, FilterValue::Scalar(serde_json::json!("42")));
    }

    #[test]
    fn test_keyword_is_not_a_path_or_value() {
        assert!(filters("sort is x").is_empty());
        assert!(filters("status is in").is_empty());
    }

    #[test]
    fn test_inclusion_and_category() {
        let f = filters("data.country in US, CA ,US category: Books");
        assert_eq!(f[0].path, "category");
        assert_eq!(f[0].value, FilterValue::Set(vec!["Books".into()]));
        assert_eq!(f[1].path, "data.country");
        assert_eq!(f[1].op, Operator::In);
        assert_eq!(f[1].value, FilterValue::Set(vec!["US".into(), "CA".into()]));
    }

    #[test]
    fn test_status_is_in_list() {
        let f = filters("status is in open,pending");
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].op, Operator::In);
    }

    #[test]
    fn test_contains_stops_at_keyword() {
        let (rest, found) = run_text("name contains Red Shoes sort by price asc");
        let f: Vec<_> = found
            .iter()
            .filter_map(|e| match &e.clause {
                Clause::Filter(f) => Some(f.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            f[0],
            FilterFragment::scalar("name", Operator::Contains, serde_json::json!("Red Shoes"))
        );
        assert!(rest.remaining_words().is_empty());
    }

    #[test]
    fn test_contains_keeps_leading_keyword_word() {
        let f = filters("name contains top gun");
        assert_eq!(
            f,
            vec![FilterFragment::scalar("name", Operator::Contains, serde_json::json!("top gun"))]
        );
        let (rest, found) = run_text("title contains first light top 3");
        assert_eq!(found.len(), 2);
        assert!(rest.remaining_words().is_empty());
    }

    #[test]
    fn test_contains_stops_at_consumed_clause() {
        let f = filters("title contains rust age > 3 tags contains async");
        let contains: Vec<_> = f.iter().filter(|f| f.op == Operator::Contains).collect();
        assert_eq!(contains.len(), 2);
        assert_eq!(contains[0].value, FilterValue::Scalar(serde_json::json!("rust")));
        assert_eq!(contains[1].value, FilterValue::Scalar(serde_json::json!("async")));
    }

    #[test]
    fn test_sort_defaults_to_desc() {
        assert_eq!(
            updates("sort by data.revenue"),
            vec![OptionUpdate::Sort { path: "data.revenue".into(), dir: SortDir::Desc }]
        );
        assert_eq!(
            updates("order by name ascending"),
            vec![OptionUpdate::Sort { path: "name".into(), dir: SortDir::Asc }]
        );
    }

    #[test]
    fn test_shape_directives() {
        assert_eq!(
            updates("top 5 skip 10"),
            vec![OptionUpdate::Limit(5), OptionUpdate::Offset(10)]
        );
        assert!(updates("top 0").is_empty());
    }

    #[test]
    fn test_projection_dedups() {
        assert_eq!(
            updates("select data.name, data.age,data.name"),
            vec![OptionUpdate::Fields(vec!["data.name".into(), "data.age".into()])]
        );
    }

    #[test]
    fn test_positions_follow_text() {
        let (_, found) = run_text("a equals 1 a equals 2");
        assert_eq!(found.len(), 2);
        assert!(found[0].position < found[1].position);
    }
}
