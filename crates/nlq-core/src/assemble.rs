//! # Filter Assembler
//!
//! Folds extracted clauses into a [`ParsedQuery`]: filter fragments by text
//! position with last-writer-wins per path, option updates in extractor
//! order, then caller overrides field by field.

use std::collections::BTreeMap;

use crate::config::ParserConfig;
use crate::extract::{Clause, Extracted, OptionUpdate};
use crate::types::{FilterFragment, Options, ParsedQuery, QueryOverrides};
use crate::values;

pub fn assemble(
    original_text: String,
    extracted: Vec<Extracted>,
    unmatched: Vec<String>,
    overrides: Option<&QueryOverrides>,
    config: &ParserConfig,
) -> ParsedQuery {
    let mut fragments: Vec<(usize, FilterFragment)> = Vec::new();
    let mut options = base_options(config);

    for item in extracted {
        match item.clause {
            Clause::Filter(fragment) => fragments.push((item.position, fragment)),
            Clause::Options(update) => apply_update(&mut options, update),
        }
    }

    // Stable, so equal positions keep extractor order.
    fragments.sort_by_key(|(position, _)| *position);
    let mut filter = BTreeMap::new();
    for (_, fragment) in fragments {
        if let Some(previous) = filter.insert(fragment.path.clone(), fragment) {
            tracing::debug!(path = %previous.path, "fragment replaced by a later clause");
        }
    }

    if let Some(overrides) = overrides {
        apply_overrides(&mut options, overrides);
    }

    ParsedQuery {
        original_text,
        filter,
        options,
        unmatched,
    }
}

fn base_options(config: &ParserConfig) -> Options {
    Options {
        limit: (config.default_limit > 0).then_some(config.default_limit),
        ..Options::default()
    }
}

fn apply_update(options: &mut Options, update: OptionUpdate) {
    match update {
        OptionUpdate::Limit(n) => options.limit = Some(n),
        OptionUpdate::Offset(n) => options.offset = n,
        OptionUpdate::Sort { path, dir } => {
            options.sort_by = Some(path);
            options.sort_dir = dir;
        }
        OptionUpdate::Fields(fields) => options.fields = Some(fields),
    }
}

fn apply_overrides(options: &mut Options, overrides: &QueryOverrides) {
    match overrides.limit {
        Some(0) => tracing::warn!("ignoring override limit=0"),
        Some(n) => options.limit = Some(n),
        None => {}
    }
    if let Some(offset) = overrides.offset {
        options.offset = offset;
    }
    if let Some(sort_by) = overrides.sort_by.as_deref().map(str::trim) {
        if !sort_by.is_empty() {
            options.sort_by = Some(sort_by.to_string());
        }
    }
    if let Some(dir) = overrides.sort_dir {
        options.sort_dir = dir;
    }
    if let Some(fields) = &overrides.fields {
        let fields = values::dedup_preserving(
            fields.iter().map(|f| f.trim()).filter(|f| !f.is_empty()),
        );
        options.fields = (!fields.is_empty()).then_some(fields);
    }
}
