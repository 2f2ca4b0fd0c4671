//! # nlq-core: natural-language query translation
//!
//! Turns free text such as
//!
//! ```text
//! top 5 customers where data.country equals US sort by data.revenue desc
//! ```
//!
//! into a [`ParsedQuery`]: a conjunctive filter keyed by field path plus
//! pagination, sort and projection options. The pipeline is
//! [`normalize`] → [`extract`] → [`assemble`], and the result is rendered for a
//! store by one of the [`backend`] dialects.
//!
//! Parsing is pure: no I/O, no clock reads (the caller passes `now`), no
//! shared mutable state. It never fails; text it does not understand is
//! dropped and listed in [`ParsedQuery::unmatched`].

pub mod assemble;
pub mod backend;
pub mod config;
pub mod extract;
pub mod normalize;
pub mod types;
pub mod values;

use chrono::{DateTime, Utc};

pub use config::ParserConfig;
pub use normalize::normalize;
pub use types::{
    FilterFragment, FilterValue, Operator, Options, ParsedQuery, QueryOverrides, SortDir,
    DEFAULT_LIMIT,
};

use extract::{FILLER_WORDS, ParseContext};
use normalize::Scan;

/// A parser bound to a configuration.
#[derive(Debug, Clone, Default)]
pub struct NlqParser {
    config: ParserConfig,
}

impl NlqParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse `query_text` as of `now`, applying `overrides` last.
    pub fn parse(
        &self,
        query_text: &str,
        now: DateTime<Utc>,
        overrides: Option<&QueryOverrides>,
    ) -> ParsedQuery {
        let scan = Scan::new(query_text);
        let original_text = scan.raw().to_string();
        let ctx = ParseContext {
            now,
            config: &self.config,
        };

        let (rest, extracted) = extract::run(scan, &ctx);
        let unmatched: Vec<String> = rest
            .remaining_words()
            .into_iter()
            .filter(|w| !FILLER_WORDS.contains(w))
            .map(str::to_string)
            .collect();
        if !unmatched.is_empty() {
            tracing::debug!(?unmatched, "dropping unrecognized text");
        }

        assemble::assemble(original_text, extracted, unmatched, overrides, &self.config)
    }
}

/// Parse with the default configuration.
pub fn parse(
    query_text: &str,
    now: DateTime<Utc>,
    overrides: Option<&QueryOverrides>,
) -> ParsedQuery {
    NlqParser::default().parse(query_text, now, overrides)
}
