//! # Normalizer
//!
//! Lower-cases, trims and collapses whitespace. The result is a [`Scan`]:
//! a folded string the extractors match against plus a case-preserving twin
//! with the exact same byte layout, so a match in one can be sliced out of
//! the other.

use std::ops::Range;

/// Replacement byte for consumed clauses. Not whitespace and not a word
/// character, so patterns never match across it.
pub(crate) const MASK: char = '\u{1f}';

/// Case-folded, whitespace-collapsed form of `input`.
pub fn normalize(input: &str) -> String {
    Scan::new(input).folded
}

/// The text an extractor runs over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    folded: String,
    raw: String,
}

impl Scan {
    pub fn new(input: &str) -> Self {
        let mut folded = String::with_capacity(input.len());
        let mut raw = String::with_capacity(input.len());
        let mut pending_space = false;

        for c in input.chars() {
            if c.is_whitespace() || c == MASK {
                pending_space = !folded.is_empty();
                continue;
            }
            if pending_space {
                folded.push(' ');
                raw.push(' ');
                pending_space = false;
            }
            folded.push(fold_char(c));
            raw.push(c);
        }

        Self { folded, raw }
    }

    pub fn folded(&self) -> &str {
        &self.folded
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.folded.is_empty()
    }

    /// Copy of this scan with every span blanked out.
    pub fn masked(&self, spans: &[Range<usize>]) -> Self {
        let mut next = self.clone();
        for span in spans {
            let blank: String = std::iter::repeat(MASK).take(span.len()).collect();
            next.folded.replace_range(span.clone(), &blank);
            next.raw.replace_range(span.clone(), &blank);
        }
        next
    }

    /// Words left over once every extractor has run.
    pub fn remaining_words(&self) -> Vec<&str> {
        self.folded
            .split(|c: char| c == ' ' || c == MASK)
            .filter(|w| !w.is_empty())
            .collect()
    }
}

/// Lower-cases `c` unless that would change its encoded length.
fn fold_char(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) if l.len_utf8() == c.len_utf8() => l,
        _ => c,
    }
}
