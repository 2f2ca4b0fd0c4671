//! Value-parsing helpers shared by the extractors.

use serde_json::{Number, Value};

/// Integer first, then finite float.
pub fn parse_number(s: &str) -> Option<Value> {
    if let Ok(n) = s.parse::<i64>() {
        return Some(Value::Number(n.into()));
    }
    s.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// A number when `s` parses as one, the string itself otherwise.
pub fn parse_scalar(s: &str) -> Value {
    parse_number(s).unwrap_or_else(|| Value::String(s.to_string()))
}

/// Strips one pair of matching surrounding quotes.
pub fn unquote(s: &str) -> &str {
    let s = s.trim();
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// Comma-separated list, trimmed, empties dropped, first occurrence kept.
pub fn split_list(s: &str) -> Vec<String> {
    dedup_preserving(s.split(',').map(str::trim).filter(|v| !v.is_empty()))
}

pub fn dedup_preserving<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for item in items {
        let item = item.as_ref();
        if !out.iter().any(|seen| seen == item) {
            out.push(item.to_string());
        }
    }
    out
}

/// Positive count; `0` and overflow are rejected.
pub fn parse_count(s: &str) -> Option<u32> {
    s.parse::<u32>().ok().filter(|n| *n > 0)
}

pub fn parse_offset(s: &str) -> Option<u32> {
    s.parse::<u32>().ok()
}

/// Byte offset of the first word after the leading one that is one of
/// `keywords`, or `text.len()` when none is. The leading word always stays so
/// an operand like `top gun` survives. `text` is expected to be single-spaced.
pub fn keyword_cut(text: &str, keywords: &[&str]) -> usize {
    let mut offset = 0;
    for (i, word) in text.split(' ').enumerate() {
        if i > 0 && keywords.contains(&word) {
            return offset;
        }
        offset += word.len() + 1;
    }
    text.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("42"), Some(json!(42)));
        assert_eq!(parse_number("-3.5"), Some(json!(-3.5)));
        assert_eq!(parse_number("1e3"), Some(json!(1000.0)));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("nan"), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn test_parse_scalar_falls_back_to_string() {
        assert_eq!(parse_scalar("US"), json!("US"));
        assert_eq!(parse_scalar("7"), json!(7));
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"new york\""), "new york");
        assert_eq!(unquote("'x'"), "x");
        assert_eq!(unquote("\"x'"), "\"x'");
        assert_eq!(unquote("\""), "\"");
    }

    #[test]
    fn test_split_list_dedups_in_order() {
        assert_eq!(split_list(" b, a ,b,,c "), vec!["b", "a", "c"]);
        assert!(split_list(" , ").is_empty());
    }

    #[test]
    fn test_parse_count_rejects_zero_and_overflow() {
        assert_eq!(parse_count("5"), Some(5));
        assert_eq!(parse_count("0"), None);
        assert_eq!(parse_count("99999999999"), None);
        assert_eq!(parse_offset("0"), Some(0));
    }

    #[test]
    fn test_keyword_cut() {
        assert_eq!(keyword_cut("red shoes sort by x", &["sort"]), 10);
        assert_eq!(keyword_cut("red shoes", &["sort"]), 9);
        assert_eq!(keyword_cut("sorted shoes", &["sort"]), 12);
        assert_eq!(keyword_cut("top gun sort by x", &["top", "sort"]), 8);
        assert_eq!(keyword_cut("top", &["top"]), 3);
    }
}
