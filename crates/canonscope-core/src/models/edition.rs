use serde::{Deserialize, Serialize};

use crate::years::normalize_year;

/// One catalog hit (a published edition) found on a result page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditionRecord {
    /// Hit number as printed by the catalog; unique within a page.
    pub ordinal: String,
    /// Language label as printed by the catalog.
    pub language: String,
    /// First number found in the publisher/date field, `None` if there was none.
    pub year: Option<u64>,
}

impl EditionRecord {
    pub fn new(ordinal: impl Into<String>, language: impl Into<String>, year: Option<u64>) -> Self {
        Self {
            ordinal: ordinal.into(),
            language: language.into(),
            year,
        }
    }

    /// Matrix key for this edition.
    pub fn normalized_year(&self) -> i32 {
        normalize_year(self.year)
    }
}
