//! Folding edition records into per-work publication year lists.

use std::collections::HashSet;

use crate::models::EditionRecord;

// ─── LanguageFilter ───────────────────────────────────────

/// Ordinals of the hits whose language label is not exactly `expected`.
pub fn excluded_ordinals<'a>(records: &'a [EditionRecord], expected: &str) -> HashSet<&'a str> {
    records
        .iter()
        .filter(|r| !language_matches(r, expected))
        .map(|r| r.ordinal.as_str())
        .collect()
}

fn language_matches(record: &EditionRecord, expected: &str) -> bool {
    record.language == expected
}

// ─── YearAggregator ───────────────────────────────────────

/// Normalized publication years of one work, accumulated across its pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicationYears {
    years: Vec<i32>,
}

impl PublicationYears {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the years of every hit on one page that is not excluded.
    fn extend_page(&mut self, records: &[EditionRecord], excluded: &HashSet<&str>) {
        self.years.extend(
            records
                .iter()
                .filter(|r| !excluded.contains(r.ordinal.as_str()))
                .map(EditionRecord::normalized_year),
        );
    }

    /// Language filter and accumulation in one step.
    pub fn extend_filtered(&mut self, records: &[EditionRecord], expected_language: &str) {
        let excluded = excluded_ordinals(records, expected_language);
        self.extend_page(records, &excluded);
    }

    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}

/// Fold the pages of one work, given in sequence order, into its year list.
pub fn fold_pages<'a, I>(pages: I, expected_language: &str) -> PublicationYears
where
    I: IntoIterator<Item = &'a [EditionRecord]>,
{
    let mut acc = PublicationYears::new();
    for records in pages {
        acc.extend_filtered(records, expected_language);
    }
    acc
}
