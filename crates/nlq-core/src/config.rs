//! Parser configuration.

use serde::{Deserialize, Serialize};

use crate::types::DEFAULT_LIMIT;

/// Knobs the extractors and the assembler read.
///
/// Deserializes from a `[nlq]` TOML section; every key is optional.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParserConfig {
    /// Limit used when the text and the caller are silent. `0` disables it.
    #[serde(default = "default_limit")]
    pub default_limit: u32,
    /// Path that relative-date clauses filter on.
    #[serde(default = "default_temporal_path")]
    pub temporal_path: String,
    /// Path used by the `category: X` shorthand.
    #[serde(default = "default_category_path")]
    pub category_path: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            temporal_path: default_temporal_path(),
            category_path: default_category_path(),
        }
    }
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}
fn default_temporal_path() -> String {
    "created_at".into()
}
fn default_category_path() -> String {
    "category".into()
}
